// 事件总线 - 用于模块间解耦通信
//
// 实现发布/订阅模式，前端据此弹出提示（toast），不影响会话状态本身
// 使用 tokio::sync::broadcast 实现高效的事件分发

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::api::Prediction;

/// 应用事件枚举 - 定义所有可能的系统事件
#[derive(Debug, Clone)]
pub enum AppEvent {
    // --- 摄像头事件 ---

    /// 摄像头已启动
    CameraStarted {
        device: String,
    },

    /// 摄像头已停止
    CameraStopped,

    /// 摄像头启动失败
    CameraFailed {
        error: String,
    },

    /// 拍照完成
    ImageCaptured {
        image_id: Uuid,
        width: u32,
        height: u32,
        size: usize,
        timestamp: DateTime<Utc>,
    },

    // --- 分类事件 ---

    /// 分类开始
    ClassificationStarted {
        image_id: Uuid,
    },

    /// 分类完成
    ClassificationCompleted {
        prediction: Prediction,
    },

    /// 分类失败
    ClassificationFailed {
        error: String,
    },

    /// 纠正已提交
    CorrectionSubmitted {
        original_label: String,
        corrected_label: String,
    },

    // --- 数据事件 ---

    /// 统计数据已刷新
    MetricsRefreshed {
        total: u64,
    },

    /// 会话数据已导出
    SessionExported {
        path: PathBuf,
    },

    /// 会话数据已导入
    SessionImported,

    /// 远端请求失败
    RequestFailed {
        operation: String,
        error: String,
    },

    // --- 登录事件 ---

    /// 登录成功
    LoggedIn {
        bin_id: String,
    },

    /// 退出登录
    LoggedOut,
}

/// 事件总线 - 用于模块间解耦通信
///
/// 使用 broadcast channel 实现发布/订阅模式
/// 支持多个订阅者同时接收事件
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// 创建新的事件总线
    ///
    /// # 参数
    /// - `capacity`: 事件缓冲区大小,建议 100-1000
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// 发布事件
    ///
    /// 如果没有订阅者,事件会被丢弃(这是正常的)
    pub fn publish(&self, event: AppEvent) {
        match self.sender.send(event) {
            Ok(receiver_count) => {
                tracing::trace!("事件已发布，订阅者数量: {}", receiver_count);
            }
            Err(_) => {
                tracing::trace!("事件已发布但无订阅者");
            }
        }
    }

    /// 订阅事件
    ///
    /// 返回一个接收器,可以用 `.recv().await` 接收事件
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// 获取当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_basic() {
        let bus = EventBus::new(100);

        let mut receiver = bus.subscribe();

        bus.publish(AppEvent::LoggedIn {
            bin_id: "2".to_string(),
        });

        match receiver.recv().await {
            Ok(AppEvent::LoggedIn { bin_id }) => {
                assert_eq!(bin_id, "2");
            }
            _ => panic!("未收到预期事件"),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(100);

        let mut receiver1 = bus.subscribe();
        let mut receiver2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(AppEvent::CameraStopped);

        assert!(receiver1.try_recv().is_ok());
        assert!(receiver2.try_recv().is_ok());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(10);
        bus.publish(AppEvent::SessionImported);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
