// 拍照领域管理器
//
// 独占持有唯一的摄像头会话，负责启动、停止、拍照并发布相应事件

use image::DynamicImage;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::InFlight;
use crate::capture::{
    CaptureError, CaptureOptions, CaptureSession, CaptureStatus, EncodedImage, MediaDevices,
};
use crate::event_bus::{AppEvent, EventBus};

/// 拍照领域管理器 - 负责摄像头会话
pub struct CaptureDomain {
    session: Mutex<CaptureSession>,
    encoding: InFlight,
    event_bus: Arc<EventBus>,
}

impl CaptureDomain {
    /// 创建新的拍照领域管理器
    pub fn new(
        devices: Arc<dyn MediaDevices>,
        options: CaptureOptions,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            session: Mutex::new(CaptureSession::new(devices, options)),
            encoding: InFlight::default(),
            event_bus,
        }
    }

    /// 当前状态
    pub async fn status(&self) -> CaptureStatus {
        self.session.lock().await.status().clone()
    }

    /// 当前采集参数
    pub async fn options(&self) -> CaptureOptions {
        self.session.lock().await.options().clone()
    }

    /// 更新采集参数，下次启动生效
    pub async fn reconfigure(&self, options: CaptureOptions) {
        self.session.lock().await.set_options(options);
    }

    /// 启动摄像头
    pub async fn start(&self) -> Result<(), CaptureError> {
        let mut session = self.session.lock().await;
        let was_active = session.status().is_active();

        match session.start().await {
            Ok(()) => {
                if !was_active {
                    self.event_bus.publish(AppEvent::CameraStarted {
                        device: session.device_label().unwrap_or_default(),
                    });
                }
                Ok(())
            }
            Err(err) => {
                self.event_bus.publish(AppEvent::CameraFailed {
                    error: err.user_message(),
                });
                Err(err)
            }
        }
    }

    /// 停止摄像头（正在编码的照片不受影响）
    pub async fn stop(&self) {
        let mut session = self.session.lock().await;
        let was_active = session.status().is_active();
        session.stop();
        if was_active {
            self.event_bus.publish(AppEvent::CameraStopped);
        }
    }

    /// 读取预览帧
    pub async fn preview_frame(&self) -> Result<DynamicImage, CaptureError> {
        self.session.lock().await.preview_frame()
    }

    /// 拍照
    ///
    /// 上一张照片仍在编码时忽略本次请求，返回 `Ok(None)`
    pub async fn capture(&self) -> Result<Option<EncodedImage>, CaptureError> {
        let Some(_guard) = self.encoding.try_begin() else {
            warn!("上一张照片仍在处理，忽略本次拍照");
            return Ok(None);
        };

        // 截帧后立即释放会话锁，编码期间仍可停止摄像头
        let snapshot = self.session.lock().await.snapshot()?;
        let image = snapshot.encode().await?;

        info!("拍照完成: {}x{}", image.width, image.height);
        self.event_bus.publish(AppEvent::ImageCaptured {
            image_id: image.id,
            width: image.width,
            height: image.height,
            size: image.len(),
            timestamp: image.captured_at,
        });
        Ok(Some(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::synthetic::SyntheticCamera;
    use crate::capture::PlatformError;

    fn domain(camera: &SyntheticCamera) -> (CaptureDomain, Arc<EventBus>) {
        let bus = Arc::new(EventBus::new(16));
        let domain = CaptureDomain::new(
            Arc::new(camera.clone()),
            CaptureOptions::default(),
            bus.clone(),
        );
        (domain, bus)
    }

    #[tokio::test]
    async fn test_start_capture_stop_publishes_events() {
        let camera = SyntheticCamera::new(1280, 720);
        let (domain, bus) = domain(&camera);
        let mut events = bus.subscribe();

        domain.start().await.unwrap();
        let image = domain.capture().await.unwrap().unwrap();
        domain.stop().await;

        assert!(matches!(events.try_recv(), Ok(AppEvent::CameraStarted { .. })));
        match events.try_recv() {
            Ok(AppEvent::ImageCaptured { image_id, .. }) => assert_eq!(image_id, image.id),
            other => panic!("未收到拍照事件: {:?}", other),
        }
        assert!(matches!(events.try_recv(), Ok(AppEvent::CameraStopped)));
        assert_eq!(domain.status().await, CaptureStatus::Idle);
        assert_eq!(camera.stats().open_streams(), 0);
    }

    #[tokio::test]
    async fn test_failure_event_carries_user_message() {
        let camera = SyntheticCamera::new(1280, 720).failing_with(PlatformError::NotAllowed);
        let (domain, bus) = domain(&camera);
        let mut events = bus.subscribe();

        assert_eq!(domain.start().await.unwrap_err(), CaptureError::PermissionDenied);
        match events.try_recv() {
            Ok(AppEvent::CameraFailed { error }) => {
                assert_eq!(error, CaptureError::PermissionDenied.user_message())
            }
            other => panic!("未收到失败事件: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_capture_rejected_while_encoding() {
        let camera = SyntheticCamera::new(1280, 720);
        let (domain, _bus) = domain(&camera);
        domain.start().await.unwrap();

        let guard = domain.encoding.try_begin().unwrap();
        assert!(domain.capture().await.unwrap().is_none());
        drop(guard);

        assert!(domain.capture().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_capture_before_start() {
        let camera = SyntheticCamera::new(1280, 720);
        let (domain, _bus) = domain(&camera);

        assert_eq!(domain.capture().await.unwrap_err(), CaptureError::NotActive);
        assert!(domain.preview_frame().await.is_err());
    }
}
