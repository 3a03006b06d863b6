// JPEG 编码 - 把一帧画面转为可上传的字节

use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage};
use serde::Serialize;
use uuid::Uuid;

pub const JPEG_MIME: &str = "image/jpeg";
pub const CAPTURE_FILENAME: &str = "capture.jpg";

/// 已编码的图片，交给调用方后所有权随之转移
#[derive(Clone, Debug, Serialize)]
pub struct EncodedImage {
    /// 唯一ID
    pub id: Uuid,
    /// 编码后的字节
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// MIME 类型
    pub mime_type: String,
    /// 建议文件名
    pub suggested_filename: String,
    pub width: u32,
    pub height: u32,
    /// 采集时间
    pub captured_at: DateTime<Utc>,
}

impl EncodedImage {
    pub fn new(
        bytes: Vec<u8>,
        mime_type: impl Into<String>,
        suggested_filename: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            bytes,
            mime_type: mime_type.into(),
            suggested_filename: suggested_filename.into(),
            width,
            height,
            captured_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// 把帧画到与其原始分辨率一致的离屏画布上（只做格式转换，不缩放），再编码为 JPEG
pub fn encode_frame(frame: &DynamicImage, quality: u8) -> Result<EncodedImage, image::ImageError> {
    let canvas = frame.to_rgb8();
    let (width, height) = canvas.dimensions();

    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
    encoder.encode(canvas.as_raw(), width, height, ColorType::Rgb8)?;

    Ok(EncodedImage::new(
        bytes,
        JPEG_MIME,
        CAPTURE_FILENAME,
        width,
        height,
    ))
}
