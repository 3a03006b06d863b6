// 分类服务 HTTP 客户端
// 负责与后端 REST 接口交互，错误信息原样透传

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{
    ClassificationService, ExportBlob, HealthStatus, ImportAck, LabelCorrection, Metrics,
    MockPopulation, ModelInfo, PasswordCheck, Prediction, RemoteError,
};
use crate::capture::EncodedImage;

/// 一般接口的错误前缀
const API_ERROR: &str = "API Error";
/// 分类接口的错误前缀
const CLASSIFICATION_ERROR: &str = "Classification Error";

/// 分类服务客户端
#[derive(Clone)]
pub struct HttpClassificationClient {
    base_url: Url,
    client: Client,
}

impl HttpClassificationClient {
    /// 创建新的客户端
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| anyhow::anyhow!("无效的服务地址 {}: {}", base_url, e))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    /// 检查响应状态并解析 JSON
    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
        Self::parse_with(response, API_ERROR).await
    }

    /// 非 2xx 响应转为 `{prefix}: {status} - {body}`
    async fn parse_with<T: DeserializeOwned>(
        response: Response,
        prefix: &str,
    ) -> Result<T, RemoteError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API 请求失败: {} - {}", status.as_u16(), error_text);
            return Err(RemoteError(format!(
                "{}: {} - {}",
                prefix,
                status.as_u16(),
                error_text
            )));
        }

        Ok(response.json::<T>().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        let response = self.client.get(self.endpoint(path)).send().await?;
        Self::parse(response).await
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        let response = self.client.post(self.endpoint(path)).send().await?;
        Self::parse(response).await
    }

    /// 健康检查
    pub async fn health(&self) -> Result<HealthStatus, RemoteError> {
        self.get_json("/api/health").await
    }

    /// 获取模型信息
    pub async fn model_info(&self) -> Result<ModelInfo, RemoteError> {
        self.get_json("/api/model-info").await
    }

    /// 填充演示数据
    pub async fn populate_mock(&self) -> Result<MockPopulation, RemoteError> {
        self.post_empty("/api/populate-mock").await
    }
}

#[async_trait]
impl ClassificationService for HttpClassificationClient {
    async fn classify(&self, image: &EncodedImage) -> Result<Prediction, RemoteError> {
        debug!(
            "上传图片分类: {} ({} 字节)",
            image.suggested_filename,
            image.len()
        );

        let part = Part::bytes(image.bytes.clone())
            .file_name(image.suggested_filename.clone())
            .mime_str(&image.mime_type)?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoint("/api/classify"))
            .multipart(form)
            .send()
            .await?;

        let prediction: Prediction = Self::parse_with(response, CLASSIFICATION_ERROR).await?;
        info!(
            "分类完成: {} ({:.2}), 耗时 {:.0}ms",
            prediction.top1.label, prediction.top1.score, prediction.latency_ms
        );
        Ok(prediction)
    }

    async fn correct(&self, correction: &LabelCorrection) -> Result<Prediction, RemoteError> {
        let response = self
            .client
            .post(self.endpoint("/api/correct"))
            .json(correction)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn metrics(&self) -> Result<Metrics, RemoteError> {
        self.get_json("/api/metrics").await
    }

    async fn export(&self) -> Result<ExportBlob, RemoteError> {
        self.post_empty("/api/export").await
    }

    async fn import(&self, blob: &ExportBlob) -> Result<ImportAck, RemoteError> {
        let response = self
            .client
            .post(self.endpoint("/api/import"))
            .json(blob)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn validate_password(&self, password: &str) -> Result<PasswordCheck, RemoteError> {
        let response = self
            .client
            .post(self.endpoint("/api/validate-password"))
            .query(&[("password", password)])
            .send()
            .await?;
        Self::parse(response).await
    }
}
