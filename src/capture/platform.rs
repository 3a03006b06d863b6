// 平台采集接口 - 摄像头设备流的抽象
//
// 相机硬件由平台提供，这里只定义会话需要的最小接口：
// 申请设备流、等待首帧就绪、读取当前帧、停止全部轨道

use async_trait::async_trait;
use image::DynamicImage;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use tracing::{debug, warn};

/// 摄像头朝向偏好
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// 前置摄像头
    User,
    /// 后置摄像头
    Environment,
}

impl Default for FacingMode {
    fn default() -> Self {
        Self::Environment
    }
}

/// 设备流请求约束（分辨率为理想值，平台可向下协商）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoConstraints {
    pub facing_mode: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            facing_mode: FacingMode::Environment,
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

/// 平台上报的采集错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    /// 用户拒绝了权限请求
    #[error("权限被拒绝")]
    NotAllowed,
    /// 没有匹配的设备
    #[error("未找到匹配的设备")]
    NotFound,
    /// 平台不支持采集
    #[error("平台不支持视频采集")]
    NotSupported,
    /// 其他平台错误，原样透传
    #[error("{0}")]
    Other(String),
}

/// 平台的媒体设备入口
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// 平台是否具备采集能力
    fn is_supported(&self) -> bool;

    /// 申请一个视频设备流（等待权限确认与硬件协商）
    async fn get_user_media(
        &self,
        constraints: &VideoConstraints,
    ) -> Result<Box<dyn DeviceStream>, PlatformError>;
}

/// 已打开的设备流
#[async_trait]
pub trait DeviceStream: Send + Sync {
    /// 设备名称
    fn label(&self) -> String;

    /// 等待元数据加载完成、首帧可用
    async fn ready(&mut self) -> Result<(), PlatformError>;

    /// 读取当前解码帧（原始分辨率）
    fn grab_frame(&mut self) -> Result<DynamicImage, PlatformError>;

    /// 停止全部轨道并释放设备
    fn stop_tracks(&mut self);
}

/// 设备流的作用域持有者
///
/// 设备一旦申请成功就立即交给 `StreamGuard`，无论是主动 `release()`、
/// 启动途中出错提前返回，还是 future 被丢弃，轨道都只会被停止一次。
pub struct StreamGuard {
    stream: Option<Box<dyn DeviceStream>>,
}

impl StreamGuard {
    pub fn new(stream: Box<dyn DeviceStream>) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    pub fn label(&self) -> String {
        self.stream
            .as_ref()
            .map(|stream| stream.label())
            .unwrap_or_default()
    }

    pub async fn ready(&mut self) -> Result<(), PlatformError> {
        match self.stream.as_mut() {
            Some(stream) => stream.ready().await,
            None => Err(PlatformError::Other("设备流已释放".to_string())),
        }
    }

    pub fn grab_frame(&mut self) -> Result<DynamicImage, PlatformError> {
        match self.stream.as_mut() {
            Some(stream) => stream.grab_frame(),
            None => Err(PlatformError::Other("设备流已释放".to_string())),
        }
    }

    /// 是否仍持有设备
    pub fn is_held(&self) -> bool {
        self.stream.is_some()
    }

    /// 释放设备，重复调用无副作用
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            debug!("释放设备流: {}", stream.label());
            stream.stop_tracks();
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if self.stream.is_some() {
            warn!("设备流未显式停止，随作用域结束释放");
            self.release();
        }
    }
}

/// 判断页面来源是否为安全上下文
///
/// HTTPS 或本地回环地址视为安全；`None` 表示本地原生环境。
pub fn is_secure_origin(origin: Option<&Url>) -> bool {
    let Some(origin) = origin else {
        return true;
    };

    if origin.scheme() == "https" {
        return true;
    }

    match origin.host_str() {
        Some("localhost") => true,
        Some(host) => host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_secure_origins() {
        assert!(is_secure_origin(None));
        assert!(is_secure_origin(Some(&origin("https://bins.example.com"))));
        assert!(is_secure_origin(Some(&origin("http://localhost:5173"))));
        assert!(is_secure_origin(Some(&origin("http://127.0.0.1:8080"))));
        assert!(is_secure_origin(Some(&origin("http://[::1]:3000"))));
    }

    #[test]
    fn test_insecure_origins() {
        assert!(!is_secure_origin(Some(&origin("http://bins.example.com"))));
        assert!(!is_secure_origin(Some(&origin("http://192.168.1.20:5173"))));
        assert!(!is_secure_origin(Some(&origin("file:///tmp/index.html"))));
    }
}
