//! 应用程序初始化和启动
//!
//! 负责命令行程序的完整启动流程，包括：
//! - 日志系统初始化
//! - 配置加载
//! - 各领域模块初始化
//! - 登录与命令分发

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::HttpClassificationClient;
use crate::capture::synthetic::SyntheticCamera;
use crate::commands::{self, Cli};
use crate::event_bus::{AppEvent, EventBus};
use crate::logger::{self, LogBroadcaster, LogMessage};
use crate::settings::{self, SettingsManager};
use crate::AppState;

/// 内置摄像头的原生分辨率
const CAMERA_NATIVE_SIZE: (u32, u32) = (1920, 1080);

/// 应用程序入口点
///
/// 1. 日志系统初始化
/// 2. 配置加载
/// 3. 领域模块初始化
/// 4. 登录（如提供了垃圾桶与密码）
/// 5. 执行命令
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_json = cli.log_json;

    // 创建日志广播器，仅在 JSON 日志模式下推送
    let log_broadcaster = Arc::new(logger::LogBroadcaster::new());
    log_broadcaster.set_enabled(log_json);
    let log_dir = cli.log_dir.clone().unwrap_or_else(logger::default_log_dir);
    // 持有到命令结束，退出前写完文件日志
    let _log_guard =
        logger::init_with_broadcaster(&log_dir, log_broadcaster.clone(), cli.verbose, !log_json)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let log_stream = log_json.then(|| spawn_log_stream(&log_broadcaster));

        let result = execute(cli).await;
        if let Err(e) = &result {
            error!("命令执行失败: {:#}", e);
        }

        if let Some((stop, handle)) = log_stream {
            let _ = stop.send(());
            let _ = handle.await;
        }
        result
    })
}

/// 以 JSON 行把日志输出到 stderr，供外部界面读取
fn spawn_log_stream(broadcaster: &LogBroadcaster) -> (oneshot::Sender<()>, JoinHandle<()>) {
    let mut receiver = broadcaster.subscribe();
    let (stop_tx, mut stop_rx) = oneshot::channel();

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                message = receiver.recv() => match message {
                    Ok(log) => print_log_line(&log),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return,
                },
                _ = &mut stop_rx => break,
            }
        }
        // 输出停止前已产生的日志
        while let Ok(log) = receiver.try_recv() {
            print_log_line(&log);
        }
    });

    (stop_tx, handle)
}

fn print_log_line(log: &LogMessage) {
    if let Ok(line) = serde_json::to_string(log) {
        eprintln!("{}", line);
    }
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(settings::default_config_path);
    let settings = Arc::new(SettingsManager::new(config_path).await?);
    let config = settings.effective().await;
    debug!("分类服务地址: {}", config.api_base);

    let client = Arc::new(HttpClassificationClient::new(
        &config.api_base,
        Duration::from_secs(config.request_timeout_secs),
    )?);
    let (width, height) = CAMERA_NATIVE_SIZE;
    let camera = Arc::new(SyntheticCamera::new(width, height));

    let state = AppState::new(settings, client.clone(), camera).await?;
    let notifier = spawn_notifier(&state.event_bus);

    if let Some(bin_id) = &cli.bin {
        let password = cli.password.as_deref().unwrap_or_default();
        state.auth_domain.login(bin_id, password).await?;
    }

    let result = commands::dispatch(cli.command, &state, &client).await;

    if state.auth_domain.is_logged_in() {
        state.auth_domain.logout();
    }
    notifier.abort();
    result
}

/// 把领域事件转为提示日志
fn spawn_notifier(event_bus: &EventBus) -> JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => notify(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("提示事件积压，跳过 {} 条", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn notify(event: &AppEvent) {
    match event {
        AppEvent::CameraStarted { device } => info!("摄像头已启动: {}", device),
        AppEvent::CameraStopped => info!("摄像头已停止"),
        AppEvent::CameraFailed { error } => warn!("{}", error),
        AppEvent::ImageCaptured {
            width,
            height,
            size,
            ..
        } => debug!("已拍照 {}x{} ({} 字节)", width, height, size),
        AppEvent::ClassificationStarted { image_id } => debug!("开始分类: {}", image_id),
        AppEvent::ClassificationCompleted { prediction } => {
            info!("分类完成: {}", prediction.top1.label)
        }
        AppEvent::ClassificationFailed { error } => warn!("分类失败: {}", error),
        AppEvent::CorrectionSubmitted {
            original_label,
            corrected_label,
        } => info!("已纠正: {} -> {}", original_label, corrected_label),
        AppEvent::MetricsRefreshed { total } => debug!("统计已刷新: {}", total),
        AppEvent::SessionExported { path } => info!("会话已导出: {:?}", path),
        AppEvent::SessionImported => info!("会话已导入"),
        AppEvent::RequestFailed { operation, error } => warn!("{} 失败: {}", operation, error),
        AppEvent::LoggedIn { bin_id } => info!("已登录垃圾桶 {}", bin_id),
        AppEvent::LoggedOut => debug!("已退出登录"),
    }
}
