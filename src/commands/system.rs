//! 系统命令
//!
//! 服务健康检查、模型信息、演示数据与配置管理

use clap::Subcommand;
use tracing::info;

use crate::api::HttpClassificationClient;
use crate::models::{CaptureProfile, ClientConfig, UISettings, UploadSettings};
use crate::AppState;

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigCommand {
    /// 显示当前生效的配置
    Show,
    /// 修改配置并保存
    Set(ConfigSetArgs),
}

#[derive(Debug, Clone, clap::Args)]
pub struct ConfigSetArgs {
    /// 分类服务地址
    #[arg(long)]
    pub api_base: Option<String>,

    /// 请求超时（秒）
    #[arg(long)]
    pub timeout: Option<u64>,

    /// 页面来源，传空字符串表示本地运行
    #[arg(long)]
    pub origin: Option<String>,

    /// 采集档位: standard / lightweight
    #[arg(long, value_parser = parse_profile)]
    pub profile: Option<CaptureProfile>,

    /// JPEG 质量 (1-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,

    /// 单文件上传上限（MB）
    #[arg(long)]
    pub max_upload_mb: Option<u64>,

    /// 深色模式
    #[arg(long)]
    pub dark_mode: Option<bool>,

    /// 导出目录
    #[arg(long)]
    pub export_dir: Option<String>,
}

fn parse_profile(value: &str) -> Result<CaptureProfile, String> {
    match value.to_ascii_lowercase().as_str() {
        "standard" => Ok(CaptureProfile::Standard),
        "lightweight" => Ok(CaptureProfile::Lightweight),
        other => Err(format!("未知的采集档位: {}", other)),
    }
}

/// 健康检查
pub async fn health(client: &HttpClassificationClient) -> anyhow::Result<()> {
    let status = client.health().await?;
    println!("{}: {}", client.base_url(), status.status);
    Ok(())
}

/// 模型信息
pub async fn model_info(client: &HttpClassificationClient) -> anyhow::Result<()> {
    let model = client.model_info().await?;
    println!("模型: {}", model.model);
    println!("任务: {}", model.task);
    println!("Top-K: {}", model.top_k);
    Ok(())
}

/// 填充演示数据
pub async fn populate_mock(client: &HttpClassificationClient) -> anyhow::Result<()> {
    let result = client.populate_mock().await?;
    if result.message.is_empty() {
        println!("演示数据已填充");
    } else {
        println!("{}", result.message);
    }
    Ok(())
}

/// 配置管理
pub async fn config(command: ConfigCommand, state: &AppState) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Show => {
            let config = state.settings.effective().await;
            println!("# {}", state.settings.path().display());
            println!("# {}", capture_summary(&config.capture_settings));
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommand::Set(args) => {
            let current = state.settings.get().await;
            let update = build_update(args, &current.capture_settings);
            let saved = state.settings.update(update).await?;
            info!("配置已更新");
            println!("{}", serde_json::to_string_pretty(&saved)?);
        }
    }
    Ok(())
}

/// 采集档位摘要，如 `采集档位: 轻量 (640×480)，JPEG 质量 80`
fn capture_summary(capture: &crate::models::CaptureSettings) -> String {
    format!(
        "采集档位: {}，JPEG 质量 {}",
        capture.profile.display_name(),
        capture.jpeg_quality()
    )
}

/// 把命令行参数转为部分更新
fn build_update(
    args: ConfigSetArgs,
    current_capture: &crate::models::CaptureSettings,
) -> ClientConfig {
    let capture_settings = if args.profile.is_some() || args.quality.is_some() {
        let mut capture = current_capture.clone();
        if let Some(profile) = args.profile {
            capture.profile = profile;
        }
        if args.quality.is_some() {
            capture.image_quality = args.quality;
        }
        Some(capture)
    } else {
        None
    };

    ClientConfig {
        api_base: args.api_base,
        request_timeout_secs: args.timeout,
        origin: args.origin,
        capture_settings,
        upload_settings: args
            .max_upload_mb
            .map(|max_size_mb| UploadSettings { max_size_mb }),
        ui_settings: args.dark_mode.map(|dark_mode| UISettings { dark_mode }),
        export_dir: args.export_dir,
    }
}
