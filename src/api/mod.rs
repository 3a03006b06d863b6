// 分类服务接口 - 远端推理、纠错、统计与导入导出
//
// 所有推理与持久化都在远端完成，这里只定义数据结构和调用契约

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::capture::EncodedImage;

pub mod client;

pub use client::HttpClassificationClient;

/// 远端调用错误，消息原样展示给用户
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct RemoteError(pub String);

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError(err.to_string())
    }
}

/// 标签与得分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub label: String,
    pub score: f32,
}

/// 一次分类结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub top1: Score,
    pub topk: Vec<Score>,
    pub latency_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// 标签纠正请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelCorrection {
    pub original_label: String,
    pub corrected_label: String,
    pub topk: Vec<Score>,
}

/// 统计数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total: u64,
    pub per_class: BTreeMap<String, u64>,
    pub corrections: u64,
    pub accuracy_estimate: f64,
    pub avg_latency_ms: f64,
    pub last_n: Vec<Prediction>,
}

/// 会话导出数据（格式由服务端决定）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBlob {
    pub data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportAck {
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordCheck {
    pub valid: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model: String,
    pub task: String,
    pub top_k: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockPopulation {
    pub ok: bool,
    #[serde(default)]
    pub message: String,
}

/// 分类服务
#[async_trait]
pub trait ClassificationService: Send + Sync {
    /// 对图片分类
    async fn classify(&self, image: &EncodedImage) -> Result<Prediction, RemoteError>;

    /// 提交标签纠正
    async fn correct(&self, correction: &LabelCorrection) -> Result<Prediction, RemoteError>;

    /// 获取统计数据
    async fn metrics(&self) -> Result<Metrics, RemoteError>;

    /// 导出会话数据
    async fn export(&self) -> Result<ExportBlob, RemoteError>;

    /// 导入会话数据
    async fn import(&self, blob: &ExportBlob) -> Result<ImportAck, RemoteError>;

    /// 校验登录密码
    async fn validate_password(&self, password: &str) -> Result<PasswordCheck, RemoteError>;
}
