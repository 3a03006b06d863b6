// 分类领域管理器
//
// 把图片交给远端分类服务，结果写入会话状态；同一时刻只允许一个请求

use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

use super::InFlight;
use crate::api::{ClassificationService, LabelCorrection, Prediction, RemoteError};
use crate::capture::EncodedImage;
use crate::event_bus::{AppEvent, EventBus};
use crate::store::SessionStore;
use crate::utils::validation;

/// 分类错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassifyError {
    /// 已有请求在进行
    #[error("已有分类请求正在处理")]
    Busy,
    /// 没有可纠正的分类结果
    #[error("当前没有分类结果")]
    NoPrediction,
    /// 纠正标签无效
    #[error("{0}")]
    InvalidLabel(String),
    /// 远端错误
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// 分类领域管理器 - 负责分类与纠错
pub struct ClassifyDomain {
    service: Arc<dyn ClassificationService>,
    store: Arc<SessionStore>,
    event_bus: Arc<EventBus>,
    in_flight: InFlight,
}

impl ClassifyDomain {
    /// 创建新的分类领域管理器
    pub fn new(
        service: Arc<dyn ClassificationService>,
        store: Arc<SessionStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            service,
            store,
            event_bus,
            in_flight: InFlight::default(),
        }
    }

    /// 是否有请求正在进行
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_busy()
    }

    /// 对图片分类，成功后追加到历史
    pub async fn classify(&self, image: &EncodedImage) -> Result<Prediction, ClassifyError> {
        let Some(_guard) = self.in_flight.try_begin() else {
            warn!("分类请求进行中，拒绝重复提交");
            return Err(ClassifyError::Busy);
        };

        self.event_bus.publish(AppEvent::ClassificationStarted { image_id: image.id });
        let result = self.run_request(self.service.classify(image)).await;

        match &result {
            Ok(prediction) => {
                info!("图片分类成功: {}", prediction.top1.label);
                self.event_bus.publish(AppEvent::ClassificationCompleted {
                    prediction: prediction.clone(),
                });
            }
            Err(err) => {
                self.event_bus.publish(AppEvent::ClassificationFailed {
                    error: err.to_string(),
                });
            }
        }

        result.map_err(ClassifyError::from)
    }

    /// 纠正最近一次分类结果
    pub async fn correct(&self, corrected_label: &str) -> Result<Prediction, ClassifyError> {
        let corrected_label =
            validation::validate_label(corrected_label).map_err(ClassifyError::InvalidLabel)?;

        let last = self
            .store
            .snapshot()
            .last_prediction()
            .cloned()
            .ok_or(ClassifyError::NoPrediction)?;

        if !validation::is_known_category(&corrected_label) {
            info!("使用自定义标签: {}", corrected_label);
        }

        let Some(_guard) = self.in_flight.try_begin() else {
            warn!("请求进行中，拒绝重复提交纠正");
            return Err(ClassifyError::Busy);
        };

        let correction = LabelCorrection {
            original_label: last.top1.label.clone(),
            corrected_label,
            topk: last.topk.clone(),
        };

        let result = self.run_request(self.service.correct(&correction)).await;

        match &result {
            Ok(_) => {
                info!(
                    "纠正已提交: {} -> {}",
                    correction.original_label, correction.corrected_label
                );
                self.event_bus.publish(AppEvent::CorrectionSubmitted {
                    original_label: correction.original_label.clone(),
                    corrected_label: correction.corrected_label.clone(),
                });
            }
            Err(err) => {
                self.event_bus.publish(AppEvent::RequestFailed {
                    operation: "correct".to_string(),
                    error: err.to_string(),
                });
            }
        }

        result.map_err(ClassifyError::from)
    }

    /// 统一处理加载状态与错误记录，成功结果追加到历史
    async fn run_request(
        &self,
        request: impl Future<Output = Result<Prediction, RemoteError>>,
    ) -> Result<Prediction, RemoteError> {
        // 请求被取消时同样会清除加载标记
        let _loading = self.store.begin_loading();
        self.store.set_error(None);

        let result = request.await;

        match &result {
            Ok(prediction) => self.store.add_prediction(prediction.clone()),
            Err(err) => {
                warn!("远端请求失败: {}", err);
                self.store.set_error(Some(err.to_string()));
            }
        }

        result
    }
}
