// 数据模型模块 - 定义客户端配置结构

use serde::{Deserialize, Serialize};

pub use crate::capture::FacingMode;

/// 默认的分类服务地址
pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

/// 覆盖服务地址的环境变量
pub const API_BASE_ENV: &str = "ACUVERA_API_BASE";

/// 客户端配置（部分更新，字段为空表示不修改）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// 分类服务地址
    pub api_base: Option<String>,
    /// 请求超时（秒）
    pub request_timeout_secs: Option<u64>,
    /// 页面来源
    pub origin: Option<String>,
    /// 拍照配置
    pub capture_settings: Option<CaptureSettings>,
    /// 上传配置
    pub upload_settings: Option<UploadSettings>,
    /// UI设置
    pub ui_settings: Option<UISettings>,
    /// 导出目录
    pub export_dir: Option<String>,
}

/// 拍照设置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// 采集档位
    #[serde(default)]
    pub profile: CaptureProfile,
    /// 摄像头朝向
    #[serde(default)]
    pub facing_mode: FacingMode,
    /// 图片质量覆盖(1-100)，为空时使用档位默认值
    #[serde(default)]
    pub image_quality: Option<u8>,
}

impl CaptureSettings {
    /// 实际使用的 JPEG 质量
    pub fn jpeg_quality(&self) -> u8 {
        self.image_quality
            .map(|q| q.clamp(1, 100))
            .unwrap_or_else(|| self.profile.default_quality())
    }
}

/// 采集档位
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureProfile {
    /// 1280x720，质量 92
    #[default]
    Standard,
    /// 640x480，质量 80
    Lightweight,
}

impl CaptureProfile {
    pub fn ideal_resolution(&self) -> (u32, u32) {
        match self {
            Self::Standard => (1280, 720),
            Self::Lightweight => (640, 480),
        }
    }

    pub fn default_quality(&self) -> u8 {
        match self {
            Self::Standard => 92,
            Self::Lightweight => 80,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::Standard => "标准 (1280×720)",
            Self::Lightweight => "轻量 (640×480)",
        }
    }
}

/// 上传设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSettings {
    /// 单文件大小上限（MB）
    pub max_size_mb: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_size_mb: crate::capture::upload::DEFAULT_MAX_UPLOAD_MB,
        }
    }
}

/// UI设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UISettings {
    /// 深色模式
    pub dark_mode: bool,
}

impl Default for UISettings {
    fn default() -> Self {
        Self { dark_mode: true }
    }
}

/// 持久化的客户端配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedClientConfig {
    /// 分类服务地址
    pub api_base: String,
    /// 请求超时（秒）
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// 页面来源，本地运行时为空
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub capture_settings: CaptureSettings,
    #[serde(default)]
    pub upload_settings: UploadSettings,
    #[serde(default)]
    pub ui_settings: UISettings,
    /// 导出目录，为空时使用当前目录
    #[serde(default)]
    pub export_dir: Option<String>,
}

fn default_timeout() -> u64 {
    30
}

impl Default for PersistedClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout_secs: default_timeout(),
            origin: None,
            capture_settings: CaptureSettings::default(),
            upload_settings: UploadSettings::default(),
            ui_settings: UISettings::default(),
            export_dir: None,
        }
    }
}
