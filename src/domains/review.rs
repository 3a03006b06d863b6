// 回顾领域管理器
//
// 统计数据刷新，以及会话数据的导出与导入

use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use crate::api::{
    ClassificationService, ExportBlob, LabelCorrection, Metrics, Prediction, RemoteError,
};
use crate::event_bus::{AppEvent, EventBus};
use crate::store::SessionStore;
use crate::utils::validation;

/// 回顾页可纠正的最近结果数量
pub const RECENT_LIMIT: usize = 10;

/// 最近的结果，最新的排在最前
pub fn recent_first(history: &[Prediction]) -> impl Iterator<Item = &Prediction> {
    history.iter().rev().take(RECENT_LIMIT)
}

/// 回顾操作错误
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("文件读写失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("会话文件格式错误: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0}")]
    InvalidLabel(String),
    #[error("没有序号为 {0} 的最近结果")]
    NoSuchEntry(usize),
}

/// 导出文件名，按本地日期命名
pub fn export_file_name() -> String {
    format!("acuvera-session-{}.json", Local::now().format("%Y-%m-%d"))
}

/// 回顾领域管理器 - 负责统计与导入导出
pub struct ReviewDomain {
    service: Arc<dyn ClassificationService>,
    store: Arc<SessionStore>,
    event_bus: Arc<EventBus>,
}

impl ReviewDomain {
    pub fn new(
        service: Arc<dyn ClassificationService>,
        store: Arc<SessionStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            service,
            store,
            event_bus,
        }
    }

    /// 拉取统计数据并整体替换会话中的旧值
    pub async fn refresh_metrics(&self) -> Result<Metrics, ReviewError> {
        let metrics = self
            .service
            .metrics()
            .await
            .map_err(|e| self.record_failure("metrics", e))?;

        info!("统计数据已刷新: 共 {} 条", metrics.total);
        self.store.set_metrics(metrics.clone());
        self.event_bus.publish(AppEvent::MetricsRefreshed {
            total: metrics.total,
        });
        Ok(metrics)
    }

    /// 导出会话数据到目录，返回写入的文件路径
    pub async fn export_to(&self, dir: &Path) -> Result<PathBuf, ReviewError> {
        let blob = self
            .service
            .export()
            .await
            .map_err(|e| self.record_failure("export", e))?;

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(export_file_name());
        let content = serde_json::to_string_pretty(&blob)?;
        tokio::fs::write(&path, content).await?;

        info!("会话数据已导出: {:?}", path);
        self.event_bus
            .publish(AppEvent::SessionExported { path: path.clone() });
        Ok(path)
    }

    /// 从文件导入会话数据，成功后刷新统计
    pub async fn import_from(&self, path: &Path) -> Result<Metrics, ReviewError> {
        let content = tokio::fs::read_to_string(path).await?;
        let blob: ExportBlob = serde_json::from_str(&content)?;

        self.service
            .import(&blob)
            .await
            .map_err(|e| self.record_failure("import", e))?;

        info!("会话数据已导入: {:?}", path);
        self.event_bus.publish(AppEvent::SessionImported);
        self.refresh_metrics().await
    }

    /// 提交对任意一条历史结果的纠正，不追加到会话历史，成功后刷新统计
    pub async fn correct_prediction(
        &self,
        prediction: &Prediction,
        corrected_label: &str,
    ) -> Result<Metrics, ReviewError> {
        let corrected_label =
            validation::validate_label(corrected_label).map_err(ReviewError::InvalidLabel)?;

        let correction = LabelCorrection {
            original_label: prediction.top1.label.clone(),
            corrected_label,
            topk: prediction.topk.clone(),
        };

        self.service
            .correct(&correction)
            .await
            .map_err(|e| self.record_failure("correct", e))?;

        info!(
            "纠正已提交: {} -> {}",
            correction.original_label, correction.corrected_label
        );
        self.event_bus.publish(AppEvent::CorrectionSubmitted {
            original_label: correction.original_label,
            corrected_label: correction.corrected_label,
        });
        self.refresh_metrics().await
    }

    fn record_failure(&self, operation: &str, err: RemoteError) -> ReviewError {
        error!("{} 请求失败: {}", operation, err);
        self.store.set_error(Some(err.to_string()));
        self.event_bus.publish(AppEvent::RequestFailed {
            operation: operation.to_string(),
            error: err.to_string(),
        });
        ReviewError::Remote(err)
    }
}
