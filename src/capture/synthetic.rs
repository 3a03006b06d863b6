// 合成摄像头 - 生成滚动测试图案的内置采集后端
//
// 没有真实硬件时用于演示和测试，按约束向下协商分辨率，并统计设备的申请与释放次数

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::platform::{DeviceStream, MediaDevices, PlatformError, VideoConstraints};

/// 设备使用统计
#[derive(Debug, Default)]
pub struct CameraStats {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl CameraStats {
    /// 成功申请的次数
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    /// 释放次数
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// 当前仍被占用的流数量
    pub fn open_streams(&self) -> usize {
        self.acquired().saturating_sub(self.released())
    }
}

/// 合成摄像头
#[derive(Clone)]
pub struct SyntheticCamera {
    native_width: u32,
    native_height: u32,
    supported: bool,
    failure: Arc<Mutex<Option<PlatformError>>>,
    stats: Arc<CameraStats>,
}

impl SyntheticCamera {
    /// 创建指定原生分辨率的摄像头
    pub fn new(native_width: u32, native_height: u32) -> Self {
        Self {
            native_width,
            native_height,
            supported: true,
            failure: Arc::new(Mutex::new(None)),
            stats: Arc::new(CameraStats::default()),
        }
    }

    /// 之后的申请都以指定错误失败
    pub fn failing_with(self, err: PlatformError) -> Self {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(err);
        }
        self
    }

    pub fn clear_failure(&self) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = None;
        }
    }

    /// 模拟没有采集能力的平台
    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    pub fn stats(&self) -> Arc<CameraStats> {
        self.stats.clone()
    }
}

#[async_trait]
impl MediaDevices for SyntheticCamera {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn get_user_media(
        &self,
        constraints: &VideoConstraints,
    ) -> Result<Box<dyn DeviceStream>, PlatformError> {
        let failure = self.failure.lock().ok().and_then(|f| f.clone());
        if let Some(err) = failure {
            return Err(err);
        }

        let width = constraints.ideal_width.min(self.native_width);
        let height = constraints.ideal_height.min(self.native_height);

        self.stats.acquired.fetch_add(1, Ordering::SeqCst);
        info!(
            "合成摄像头已打开: {:?} {}x{}",
            constraints.facing_mode, width, height
        );

        Ok(Box::new(SyntheticStream {
            width,
            height,
            frame_index: 0,
            stopped: false,
            stats: self.stats.clone(),
        }))
    }
}

struct SyntheticStream {
    width: u32,
    height: u32,
    frame_index: u32,
    stopped: bool,
    stats: Arc<CameraStats>,
}

#[async_trait]
impl DeviceStream for SyntheticStream {
    fn label(&self) -> String {
        format!("synthetic {}x{}", self.width, self.height)
    }

    async fn ready(&mut self) -> Result<(), PlatformError> {
        tokio::task::yield_now().await;
        Ok(())
    }

    fn grab_frame(&mut self) -> Result<DynamicImage, PlatformError> {
        if self.stopped {
            return Err(PlatformError::Other("轨道已停止".to_string()));
        }

        self.frame_index = self.frame_index.wrapping_add(1);
        let offset = self.frame_index.wrapping_mul(7);
        let (w, h) = (self.width.max(1), self.height.max(1));

        let frame = RgbImage::from_fn(self.width, self.height, |x, y| {
            let r = (u64::from(x.wrapping_add(offset) % w) * 255 / u64::from(w)) as u8;
            let g = (u64::from(y.wrapping_add(offset) % h) * 255 / u64::from(h)) as u8;
            let b = ((x ^ y).wrapping_add(offset) & 0xFF) as u8;
            Rgb([r, g, b])
        });

        debug!("合成帧 #{}", self.frame_index);
        Ok(DynamicImage::ImageRgb8(frame))
    }

    fn stop_tracks(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.stats.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_negotiates_down_to_native() {
        let camera = SyntheticCamera::new(640, 480);
        let mut stream = camera
            .get_user_media(&VideoConstraints::default())
            .await
            .unwrap();

        let frame = stream.grab_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (640, 480));
        assert_eq!(camera.stats().open_streams(), 1);

        stream.stop_tracks();
        stream.stop_tracks();
        assert_eq!(camera.stats().released(), 1);
        assert!(stream.grab_frame().is_err());
    }

    #[tokio::test]
    async fn test_frames_change_over_time() {
        let camera = SyntheticCamera::new(320, 240);
        let mut stream = camera
            .get_user_media(&VideoConstraints::default())
            .await
            .unwrap();

        let a = stream.grab_frame().unwrap();
        let b = stream.grab_frame().unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }
}
