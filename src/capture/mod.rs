// 拍照模块 - 负责摄像头会话：申请设备流、实时预览、截取单帧、释放设备

use image::DynamicImage;
use reqwest::Url;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::models::{CaptureProfile, CaptureSettings};

pub mod encoder;
pub mod platform;
pub mod synthetic;
pub mod upload;

pub use encoder::EncodedImage;
pub use platform::{
    is_secure_origin, DeviceStream, FacingMode, MediaDevices, PlatformError, StreamGuard,
    VideoConstraints,
};

/// 采集错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// 平台不支持摄像头
    #[error("当前环境不支持摄像头")]
    Unsupported,
    /// 非安全来源
    #[error("摄像头需要 HTTPS 或 localhost 访问")]
    InsecureContext,
    /// 权限被拒绝
    #[error("摄像头权限被拒绝")]
    PermissionDenied,
    /// 没有可用设备
    #[error("未找到摄像头")]
    DeviceNotFound,
    /// 其他设备错误，原样透传
    #[error("{0}")]
    DeviceError(String),
    /// 会话未激活
    #[error("摄像头未启动")]
    NotActive,
    /// 编码失败
    #[error("图像编码失败")]
    EncodeFailed,
}

impl CaptureError {
    /// 面向用户的提示，不同原因给出不同的处理建议
    pub fn user_message(&self) -> String {
        match self {
            Self::Unsupported => "无法访问摄像头：当前环境不支持摄像头。".to_string(),
            Self::InsecureContext => {
                "无法访问摄像头：请通过 https:// 或 localhost 访问后重试。".to_string()
            }
            Self::PermissionDenied => "无法访问摄像头：请允许摄像头权限后重试。".to_string(),
            Self::DeviceNotFound => "无法访问摄像头：未检测到摄像头，请连接摄像头。".to_string(),
            Self::DeviceError(message) => format!("无法访问摄像头：{}", message),
            Self::NotActive => "请先启动摄像头。".to_string(),
            Self::EncodeFailed => "拍照失败：无法生成图像，请重试。".to_string(),
        }
    }
}

impl From<PlatformError> for CaptureError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::NotAllowed => Self::PermissionDenied,
            PlatformError::NotFound => Self::DeviceNotFound,
            PlatformError::NotSupported => Self::Unsupported,
            PlatformError::Other(message) => Self::DeviceError(message),
        }
    }
}

/// 会话状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum CaptureStatus {
    Idle,
    Active,
    Error(String),
}

/// 驱动状态转换的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// 设备流申请成功且就绪
    Acquired,
    /// 启动失败
    Failed(String),
    /// 停止（包括视图销毁）
    Stopped,
    /// 截取了一帧
    Captured,
}

impl CaptureStatus {
    /// 状态转换表，`None` 表示该事件在当前状态下无效
    pub fn apply(&self, event: &CaptureEvent) -> Option<CaptureStatus> {
        match (self, event) {
            (Self::Idle | Self::Error(_), CaptureEvent::Acquired) => Some(Self::Active),
            (Self::Idle | Self::Error(_), CaptureEvent::Failed(message)) => {
                Some(Self::Error(message.clone()))
            }
            (Self::Active, CaptureEvent::Failed(message)) => Some(Self::Error(message.clone())),
            (_, CaptureEvent::Stopped) => Some(Self::Idle),
            (Self::Active, CaptureEvent::Captured) => Some(Self::Active),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// 会话参数
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// 设备流约束
    pub constraints: VideoConstraints,
    /// JPEG 质量(1-100)
    pub jpeg_quality: u8,
    /// 页面来源，`None` 表示本地原生环境
    pub origin: Option<Url>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self::from_settings(&CaptureSettings::default(), None)
    }
}

impl CaptureOptions {
    pub fn from_settings(settings: &CaptureSettings, origin: Option<Url>) -> Self {
        let (ideal_width, ideal_height) = settings.profile.ideal_resolution();
        Self {
            constraints: VideoConstraints {
                facing_mode: settings.facing_mode,
                ideal_width,
                ideal_height,
            },
            jpeg_quality: settings.jpeg_quality(),
            origin,
        }
    }

    /// 切换采集档位，分辨率与质量一并替换
    pub fn with_profile(mut self, profile: CaptureProfile) -> Self {
        let (ideal_width, ideal_height) = profile.ideal_resolution();
        self.constraints.ideal_width = ideal_width;
        self.constraints.ideal_height = ideal_height;
        self.jpeg_quality = profile.default_quality();
        self
    }
}

/// 摄像头会话
///
/// 独占持有设备流；会话被丢弃时设备随之释放。
pub struct CaptureSession {
    devices: Arc<dyn MediaDevices>,
    options: CaptureOptions,
    stream: Option<StreamGuard>,
    status: CaptureStatus,
}

impl CaptureSession {
    pub fn new(devices: Arc<dyn MediaDevices>, options: CaptureOptions) -> Self {
        Self {
            devices,
            options,
            stream: None,
            status: CaptureStatus::Idle,
        }
    }

    pub fn status(&self) -> &CaptureStatus {
        &self.status
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    /// 当前设备名称
    pub fn device_label(&self) -> Option<String> {
        self.stream.as_ref().map(|guard| guard.label())
    }

    /// 更新参数，下次 `start()` 生效
    pub fn set_options(&mut self, options: CaptureOptions) {
        self.options = options;
    }

    fn transition(&mut self, event: CaptureEvent) {
        match self.status.apply(&event) {
            Some(next) => {
                debug!("采集状态: {:?} -> {:?} ({:?})", self.status, next, event);
                self.status = next;
            }
            None => warn!("忽略无效的状态转换: {:?} + {:?}", self.status, event),
        }
    }

    fn fail(&mut self, err: CaptureError) -> CaptureError {
        warn!("摄像头启动失败: {}", err);
        self.transition(CaptureEvent::Failed(err.to_string()));
        err
    }

    /// 启动摄像头
    ///
    /// 已在运行时直接返回；处于错误状态时视为用户手动重试。
    pub async fn start(&mut self) -> Result<(), CaptureError> {
        if self.status.is_active() {
            debug!("摄像头已在运行");
            return Ok(());
        }

        if !self.devices.is_supported() {
            return Err(self.fail(CaptureError::Unsupported));
        }

        if !is_secure_origin(self.options.origin.as_ref()) {
            return Err(self.fail(CaptureError::InsecureContext));
        }

        info!(
            "申请摄像头: {:?} {}x{}",
            self.options.constraints.facing_mode,
            self.options.constraints.ideal_width,
            self.options.constraints.ideal_height
        );

        let stream = match self.devices.get_user_media(&self.options.constraints).await {
            Ok(stream) => stream,
            Err(err) => return Err(self.fail(err.into())),
        };

        // 从这里开始由 guard 负责释放，future 被丢弃时同样生效
        let mut guard = StreamGuard::new(stream);

        if let Err(err) = guard.ready().await {
            guard.release();
            return Err(self.fail(err.into()));
        }

        info!("摄像头已启动: {}", guard.label());
        self.stream = Some(guard);
        self.transition(CaptureEvent::Acquired);
        Ok(())
    }

    /// 停止摄像头，幂等
    pub fn stop(&mut self) {
        if let Some(mut guard) = self.stream.take() {
            guard.release();
            info!("摄像头已停止");
        }
        if self.status != CaptureStatus::Idle {
            self.transition(CaptureEvent::Stopped);
        }
    }

    /// 读取当前帧用于预览
    pub fn preview_frame(&mut self) -> Result<DynamicImage, CaptureError> {
        match self.stream.as_mut() {
            Some(guard) if self.status.is_active() => Ok(guard.grab_frame()?),
            _ => Err(CaptureError::NotActive),
        }
    }

    /// 截取当前帧（同步完成，不占用设备到编码结束）
    pub fn snapshot(&mut self) -> Result<FrameSnapshot, CaptureError> {
        let frame = match self.stream.as_mut() {
            Some(guard) if self.status.is_active() => guard.grab_frame()?,
            _ => return Err(CaptureError::NotActive),
        };

        self.transition(CaptureEvent::Captured);
        Ok(FrameSnapshot {
            frame,
            quality: self.options.jpeg_quality,
        })
    }

    /// 截取当前帧并编码为 JPEG，不会停止会话
    pub async fn capture(&mut self) -> Result<EncodedImage, CaptureError> {
        self.snapshot()?.encode().await
    }
}

/// 截取到的原始帧，等待编码
pub struct FrameSnapshot {
    frame: DynamicImage,
    quality: u8,
}

impl FrameSnapshot {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.frame.width(), self.frame.height())
    }

    /// 在阻塞线程上编码为 JPEG
    pub async fn encode(self) -> Result<EncodedImage, CaptureError> {
        let (width, height) = self.dimensions();
        if width == 0 || height == 0 {
            warn!("当前帧尺寸为 0，无法编码");
            return Err(CaptureError::EncodeFailed);
        }

        let Self { frame, quality } = self;
        let encoded = tokio::task::spawn_blocking(move || encoder::encode_frame(&frame, quality))
            .await
            .map_err(|e| {
                warn!("编码任务异常: {}", e);
                CaptureError::EncodeFailed
            })?
            .map_err(|e| {
                warn!("JPEG 编码失败: {}", e);
                CaptureError::EncodeFailed
            })?;

        if encoded.is_empty() {
            return Err(CaptureError::EncodeFailed);
        }

        debug!(
            "拍照成功: {} {}x{} {} 字节",
            encoded.id,
            encoded.width,
            encoded.height,
            encoded.len()
        );
        Ok(encoded)
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.stream.is_some() {
            info!("采集会话销毁，释放摄像头");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::synthetic::SyntheticCamera;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn session(camera: &SyntheticCamera) -> CaptureSession {
        CaptureSession::new(Arc::new(camera.clone()), CaptureOptions::default())
    }

    #[tokio::test]
    async fn test_start_stop_releases_once() {
        let camera = SyntheticCamera::new(1920, 1080);
        let mut session = session(&camera);

        for round in 1..=3 {
            session.start().await.unwrap();
            assert_eq!(session.status(), &CaptureStatus::Active);
            session.stop();
            session.stop();
            assert_eq!(session.status(), &CaptureStatus::Idle);
            assert_eq!(camera.stats().acquired(), round);
            assert_eq!(camera.stats().released(), round);
        }
    }

    #[tokio::test]
    async fn test_start_twice_keeps_one_stream() {
        let camera = SyntheticCamera::new(1280, 720);
        let mut session = session(&camera);

        session.start().await.unwrap();
        session.start().await.unwrap();
        assert_eq!(camera.stats().acquired(), 1);
        session.stop();
        assert_eq!(camera.stats().released(), 1);
    }

    #[tokio::test]
    async fn test_capture_requires_active() {
        let camera = SyntheticCamera::new(1280, 720);
        let mut session = session(&camera);

        assert_eq!(session.capture().await.unwrap_err(), CaptureError::NotActive);

        session.start().await.unwrap();
        session.stop();
        assert_eq!(session.capture().await.unwrap_err(), CaptureError::NotActive);
        assert_eq!(session.preview_frame().unwrap_err(), CaptureError::NotActive);
    }

    #[tokio::test]
    async fn test_capture_twice_stays_active() {
        let camera = SyntheticCamera::new(1920, 1080);
        let mut session = session(&camera);
        session.start().await.unwrap();

        let first = session.capture().await.unwrap();
        assert_eq!(session.status(), &CaptureStatus::Active);
        let second = session.capture().await.unwrap();
        assert_eq!(session.status(), &CaptureStatus::Active);

        assert_ne!(first.id, second.id);
        assert_ne!(first.bytes, second.bytes);
        // 协商到理想分辨率，编码时不缩放
        assert_eq!((first.width, first.height), (1280, 720));
        assert_eq!(first.mime_type, "image/jpeg");
        assert_eq!(first.suggested_filename, "capture.jpg");
    }

    #[tokio::test]
    async fn test_resolution_negotiated_downward() {
        let camera = SyntheticCamera::new(800, 600);
        let mut session = session(&camera);
        session.start().await.unwrap();

        let image = session.capture().await.unwrap();
        assert_eq!((image.width, image.height), (800, 600));
    }

    #[tokio::test]
    async fn test_lightweight_profile() {
        let camera = SyntheticCamera::new(1920, 1080);
        let options = CaptureOptions::default().with_profile(CaptureProfile::Lightweight);
        assert_eq!(options.jpeg_quality, 80);

        let mut session = CaptureSession::new(Arc::new(camera.clone()), options);
        session.start().await.unwrap();
        let image = session.capture().await.unwrap();
        assert_eq!((image.width, image.height), (640, 480));
    }

    #[tokio::test]
    async fn test_insecure_origin_never_acquires() {
        let camera = SyntheticCamera::new(1280, 720);
        let options = CaptureOptions {
            origin: Some(Url::parse("http://bins.example.com").unwrap()),
            ..CaptureOptions::default()
        };
        let mut session = CaptureSession::new(Arc::new(camera.clone()), options);

        let err = session.start().await.unwrap_err();
        assert_eq!(err, CaptureError::InsecureContext);
        assert!(matches!(session.status(), CaptureStatus::Error(_)));
        assert_eq!(camera.stats().acquired(), 0);
    }

    #[tokio::test]
    async fn test_platform_errors_are_mapped() {
        let cases = [
            (PlatformError::NotAllowed, CaptureError::PermissionDenied),
            (PlatformError::NotFound, CaptureError::DeviceNotFound),
            (PlatformError::NotSupported, CaptureError::Unsupported),
            (
                PlatformError::Other("设备忙".to_string()),
                CaptureError::DeviceError("设备忙".to_string()),
            ),
        ];

        for (platform_err, expected) in cases {
            let camera = SyntheticCamera::new(1280, 720).failing_with(platform_err);
            let mut session = session(&camera);

            assert_eq!(session.start().await.unwrap_err(), expected);
            assert_eq!(session.status(), &CaptureStatus::Error(expected.to_string()));

            session.stop();
            assert_eq!(session.status(), &CaptureStatus::Idle);
        }
    }

    #[tokio::test]
    async fn test_unsupported_platform() {
        let camera = SyntheticCamera::new(1280, 720).unsupported();
        let mut session = session(&camera);

        assert_eq!(session.start().await.unwrap_err(), CaptureError::Unsupported);
        assert_eq!(camera.stats().acquired(), 0);
    }

    #[tokio::test]
    async fn test_retry_after_error() {
        let camera = SyntheticCamera::new(1280, 720).failing_with(PlatformError::NotAllowed);
        let mut session = session(&camera);
        assert!(session.start().await.is_err());

        camera.clear_failure();
        session.start().await.unwrap();
        assert_eq!(session.status(), &CaptureStatus::Active);
    }

    #[tokio::test]
    async fn test_drop_releases_device() {
        let camera = SyntheticCamera::new(1280, 720);
        {
            let mut session = session(&camera);
            session.start().await.unwrap();
        }
        assert_eq!(camera.stats().released(), 1);
    }

    #[tokio::test]
    async fn test_zero_size_frame_fails_to_encode() {
        let camera = SyntheticCamera::new(0, 0);
        let mut session = session(&camera);
        session.start().await.unwrap();

        assert_eq!(session.capture().await.unwrap_err(), CaptureError::EncodeFailed);
        assert_eq!(session.status(), &CaptureStatus::Active);
    }

    #[tokio::test]
    async fn test_stop_while_encoding() {
        let camera = SyntheticCamera::new(1280, 720);
        let mut session = session(&camera);
        session.start().await.unwrap();

        let snapshot = session.snapshot().unwrap();
        session.stop();
        assert_eq!(camera.stats().released(), 1);

        let image = snapshot.encode().await.unwrap();
        assert_eq!((image.width, image.height), (1280, 720));
    }

    #[test]
    fn test_transition_table() {
        let idle = CaptureStatus::Idle;
        let active = CaptureStatus::Active;
        let error = CaptureStatus::Error("x".to_string());

        assert_eq!(idle.apply(&CaptureEvent::Acquired), Some(CaptureStatus::Active));
        assert_eq!(idle.apply(&CaptureEvent::Captured), None);
        assert_eq!(active.apply(&CaptureEvent::Captured), Some(CaptureStatus::Active));
        assert_eq!(active.apply(&CaptureEvent::Acquired), None);
        assert_eq!(active.apply(&CaptureEvent::Stopped), Some(CaptureStatus::Idle));
        assert_eq!(error.apply(&CaptureEvent::Stopped), Some(CaptureStatus::Idle));
        assert_eq!(
            idle.apply(&CaptureEvent::Failed("y".to_string())),
            Some(CaptureStatus::Error("y".to_string()))
        );
    }

    #[test]
    fn test_user_messages_are_distinct() {
        let messages = [
            CaptureError::DeviceNotFound.user_message(),
            CaptureError::PermissionDenied.user_message(),
            CaptureError::InsecureContext.user_message(),
        ];
        assert_ne!(messages[0], messages[1]);
        assert_ne!(messages[1], messages[2]);
        assert_ne!(messages[0], messages[2]);
    }

    /// 首帧永远不会就绪的设备，用来模拟启动途中视图被销毁
    struct StallingDevices {
        released: Arc<AtomicUsize>,
    }

    struct StallingStream {
        released: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MediaDevices for StallingDevices {
        fn is_supported(&self) -> bool {
            true
        }

        async fn get_user_media(
            &self,
            _constraints: &VideoConstraints,
        ) -> Result<Box<dyn DeviceStream>, PlatformError> {
            Ok(Box::new(StallingStream {
                released: self.released.clone(),
            }))
        }
    }

    #[async_trait]
    impl DeviceStream for StallingStream {
        fn label(&self) -> String {
            "stalling".to_string()
        }

        async fn ready(&mut self) -> Result<(), PlatformError> {
            std::future::pending::<()>().await;
            Ok(())
        }

        fn grab_frame(&mut self) -> Result<DynamicImage, PlatformError> {
            Err(PlatformError::Other("no frame".to_string()))
        }

        fn stop_tracks(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_abandoned_start_releases_late_stream() {
        let released = Arc::new(AtomicUsize::new(0));
        let devices = Arc::new(StallingDevices {
            released: released.clone(),
        });
        let mut session = CaptureSession::new(devices, CaptureOptions::default());

        let result = tokio::time::timeout(Duration::from_millis(20), session.start()).await;
        assert!(result.is_err());

        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(session.status(), &CaptureStatus::Idle);
        assert_eq!(session.capture().await.unwrap_err(), CaptureError::NotActive);
    }
}
