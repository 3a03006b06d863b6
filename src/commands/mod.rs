//! 命令行命令模块
//!
//! 按功能分组：
//! - classify: 上传、拍照与纠错
//! - review: 统计与导入导出
//! - system: 服务状态与配置

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::api::HttpClassificationClient;
use crate::AppState;

pub mod classify;
pub mod review;
pub mod system;

pub use classify::{CaptureArgs, ClassifyArgs};
pub use review::{CorrectArgs, ExportArgs, ImportArgs};
pub use system::ConfigCommand;

/// Acuvera 垃圾分类客户端
#[derive(Debug, Parser)]
#[command(name = "acuvera", version)]
pub struct Cli {
    /// 配置文件路径
    #[arg(long, global = true, env = "ACUVERA_CONFIG")]
    pub config: Option<PathBuf>,

    /// 日志目录
    #[arg(long, global = true, env = "ACUVERA_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 日志以 JSON 行输出到 stderr（供外部界面读取）
    #[arg(long, global = true)]
    pub log_json: bool,

    /// 登录的垃圾桶编号 (1-8)
    #[arg(long, global = true, env = "ACUVERA_BIN")]
    pub bin: Option<String>,

    /// 登录密码
    #[arg(long, global = true, env = "ACUVERA_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 检查分类服务是否在线
    Health,
    /// 查看模型信息
    ModelInfo,
    /// 上传本地图片进行分类
    Classify(ClassifyArgs),
    /// 使用摄像头拍照并分类
    Capture(CaptureArgs),
    /// 查看统计数据
    Metrics,
    /// 纠正一条最近的分类结果
    Correct(CorrectArgs),
    /// 导出会话数据
    Export(ExportArgs),
    /// 导入会话数据
    Import(ImportArgs),
    /// 填充演示数据
    PopulateMock,
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Command {
    /// 是否需要先登录
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::Classify(_)
                | Self::Capture(_)
                | Self::Metrics
                | Self::Correct(_)
                | Self::Export(_)
                | Self::Import(_)
        )
    }
}

/// 执行命令
pub async fn dispatch(
    command: Command,
    state: &AppState,
    client: &HttpClassificationClient,
) -> anyhow::Result<()> {
    if command.requires_login() && !state.auth_domain.is_logged_in() {
        anyhow::bail!("该命令需要先登录，请提供 --bin 和 --password");
    }

    match command {
        Command::Health => system::health(client).await,
        Command::ModelInfo => system::model_info(client).await,
        Command::Classify(args) => classify::classify(args, state).await,
        Command::Capture(args) => classify::capture(args, state).await,
        Command::Metrics => review::metrics(state).await,
        Command::Correct(args) => review::correct(args, state).await,
        Command::Export(args) => review::export(args, state).await,
        Command::Import(args) => review::import(args, state).await,
        Command::PopulateMock => system::populate_mock(client).await,
        Command::Config(command) => system::config(command, state).await,
    }
}
