//! 分类命令
//!
//! 上传本地图片或使用摄像头拍照，提交分类并可选地纠正结果

use anyhow::anyhow;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::api::Prediction;
use crate::capture::upload::load_image_file;
use crate::capture::EncodedImage;
use crate::models::CaptureProfile;
use crate::utils::validation::WASTE_CATEGORIES;
use crate::AppState;

#[derive(Debug, Clone, clap::Args)]
pub struct ClassifyArgs {
    /// 图片文件
    pub file: PathBuf,

    /// 分类后纠正为指定标签
    #[arg(long)]
    pub correct_to: Option<String>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct CaptureArgs {
    /// 拍照数量
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: u32,

    /// 使用轻量档位 (640×480)
    #[arg(long)]
    pub lightweight: bool,

    /// 最后一张照片纠正为指定标签
    #[arg(long)]
    pub correct_to: Option<String>,

    /// 照片保存目录
    #[arg(long)]
    pub save_dir: Option<PathBuf>,
}

/// 上传图片分类
pub async fn classify(args: ClassifyArgs, state: &AppState) -> anyhow::Result<()> {
    let max_mb = state.settings.get().await.upload_settings.max_size_mb;
    let image = load_image_file(&args.file, max_mb).await?;

    let prediction = state.classify_domain.classify(&image).await?;
    print_prediction(&prediction);

    finish(state, args.correct_to).await
}

/// 拍照分类
pub async fn capture(args: CaptureArgs, state: &AppState) -> anyhow::Result<()> {
    if args.lightweight {
        let options = state.capture_domain.options().await;
        state
            .capture_domain
            .reconfigure(options.with_profile(CaptureProfile::Lightweight))
            .await;
    }

    state
        .capture_domain
        .start()
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    // 无论成功与否都要释放摄像头
    let result = capture_loop(&args, state).await;
    state.capture_domain.stop().await;
    result?;

    finish(state, args.correct_to).await
}

async fn capture_loop(args: &CaptureArgs, state: &AppState) -> anyhow::Result<()> {
    for index in 1..=args.count {
        let Some(image) = state
            .capture_domain
            .capture()
            .await
            .map_err(|e| anyhow!(e.user_message()))?
        else {
            warn!("第 {} 张照片被跳过", index);
            continue;
        };

        if let Some(dir) = &args.save_dir {
            save_image(dir, &image).await?;
        }

        println!("[{}/{}] {}x{}", index, args.count, image.width, image.height);
        let prediction = state.classify_domain.classify(&image).await?;
        print_prediction(&prediction);
    }
    Ok(())
}

/// 纠正最近一次结果；未指定标签时列出可选类别
async fn finish(state: &AppState, correct_to: Option<String>) -> anyhow::Result<()> {
    match correct_to {
        Some(label) => correct(state, &label).await,
        None => {
            println!("可选纠正标签: {}", WASTE_CATEGORIES.join(", "));
            Ok(())
        }
    }
}

async fn correct(state: &AppState, label: &str) -> anyhow::Result<()> {
    let prediction = state.classify_domain.correct(label).await?;
    println!("已纠正为: {}", prediction.top1.label);
    Ok(())
}

async fn save_image(dir: &Path, image: &EncodedImage) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!(
        "capture-{}.jpg",
        image.captured_at.format("%Y%m%d-%H%M%S-%3f")
    ));
    tokio::fs::write(&path, &image.bytes).await?;
    info!("照片已保存: {:?}", path);
    Ok(())
}

fn print_prediction(prediction: &Prediction) {
    println!(
        "分类结果: {} ({:.1}%)  耗时 {:.0}ms",
        prediction.top1.label,
        prediction.top1.score * 100.0,
        prediction.latency_ms
    );
    for score in &prediction.topk {
        println!("  {:<12} {:>5.1}%", score.label, score.score * 100.0);
    }
    if let Some(reasoning) = &prediction.reasoning {
        println!("  说明: {}", reasoning);
    }
}
