//! 回顾命令
//!
//! 统计数据查看与会话数据导入导出

use std::path::PathBuf;

use crate::api::{Metrics, Prediction};
use crate::domains::review::recent_first;
use crate::domains::ReviewError;
use crate::AppState;

#[derive(Debug, Clone, clap::Args)]
pub struct ExportArgs {
    /// 导出目录，默认使用配置中的导出目录或当前目录
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct ImportArgs {
    /// 之前导出的会话文件
    pub file: PathBuf,
}

#[derive(Debug, Clone, clap::Args)]
pub struct CorrectArgs {
    /// 最近结果的序号，0 为最新一条（见 `metrics` 输出）
    #[arg(long)]
    pub index: usize,

    /// 纠正后的标签
    #[arg(long)]
    pub to: String,
}

/// 查看统计数据
pub async fn metrics(state: &AppState) -> anyhow::Result<()> {
    let metrics = state.review_domain.refresh_metrics().await?;
    print_metrics(&metrics);
    Ok(())
}

/// 导出会话数据
pub async fn export(args: ExportArgs, state: &AppState) -> anyhow::Result<()> {
    let dir = match args.dir {
        Some(dir) => dir,
        None => state
            .settings
            .get()
            .await
            .export_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    let path = state.review_domain.export_to(&dir).await?;
    println!("已导出: {}", path.display());
    Ok(())
}

/// 导入会话数据
pub async fn import(args: ImportArgs, state: &AppState) -> anyhow::Result<()> {
    let metrics = state.review_domain.import_from(&args.file).await?;
    println!("已导入: {}", args.file.display());
    print_metrics(&metrics);
    Ok(())
}

/// 纠正一条最近结果
pub async fn correct(args: CorrectArgs, state: &AppState) -> anyhow::Result<()> {
    let current = state.review_domain.refresh_metrics().await?;
    let target: &Prediction = recent_first(&current.last_n)
        .nth(args.index)
        .ok_or(ReviewError::NoSuchEntry(args.index))?;

    let metrics = state
        .review_domain
        .correct_prediction(target, &args.to)
        .await?;
    println!("已纠正: {} -> {}", target.top1.label, args.to.trim());
    print_metrics(&metrics);
    Ok(())
}

fn print_metrics(metrics: &Metrics) {
    println!("分类总数: {}", metrics.total);
    println!("纠正次数: {}", metrics.corrections);
    println!("估计准确率: {:.1}%", metrics.accuracy_estimate * 100.0);
    println!("平均耗时: {:.0}ms", metrics.avg_latency_ms);

    if !metrics.per_class.is_empty() {
        println!("各类别数量:");
        for (label, count) in &metrics.per_class {
            println!("  {:<12} {}", label, count);
        }
    }

    if !metrics.last_n.is_empty() {
        println!("最近结果 (序号可用于 correct --index):");
        for (index, prediction) in recent_first(&metrics.last_n).enumerate() {
            println!(
                "  [{}] {:<12} {:>5.1}%",
                index,
                prediction.top1.label,
                prediction.top1.score * 100.0
            );
        }
    }
}
