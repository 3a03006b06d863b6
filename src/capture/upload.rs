// 本地图片上传 - 校验文件类型与大小后转为待分类图片

use std::path::Path;
use tracing::{debug, info};

use super::encoder::EncodedImage;

/// 默认的单文件大小上限（MB）
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 10;

/// 上传错误
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("请选择图片文件")]
    NotAnImage,
    #[error("文件大小不能超过 {max_mb}MB")]
    TooLarge { max_mb: u64 },
    #[error("读取文件失败: {0}")]
    Io(#[from] std::io::Error),
}

/// 校验字节内容，返回识别出的 MIME 类型
pub fn validate_image_bytes(bytes: &[u8], max_mb: u64) -> Result<&'static str, UploadError> {
    let format = image::guess_format(bytes).map_err(|_| UploadError::NotAnImage)?;
    let mime = mime_for(format).ok_or(UploadError::NotAnImage)?;

    if bytes.len() as u64 > max_mb * 1024 * 1024 {
        return Err(UploadError::TooLarge { max_mb });
    }

    Ok(mime)
}

/// 读取本地图片文件
pub async fn load_image_file(path: &Path, max_mb: u64) -> Result<EncodedImage, UploadError> {
    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > max_mb * 1024 * 1024 {
        return Err(UploadError::TooLarge { max_mb });
    }

    let bytes = tokio::fs::read(path).await?;
    let mime = validate_image_bytes(&bytes, max_mb)?;

    let (width, height) = image::load_from_memory(&bytes)
        .map(|img| (img.width(), img.height()))
        .unwrap_or((0, 0));
    debug!("图片尺寸: {}x{}", width, height);

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string());

    info!("已选择图片: {} ({}, {} 字节)", file_name, mime, bytes.len());
    Ok(EncodedImage::new(bytes, mime, file_name, width, height))
}

fn mime_for(format: image::ImageFormat) -> Option<&'static str> {
    use image::ImageFormat;

    match format {
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::Tiff => Some("image/tiff"),
        _ => None,
    }
}
