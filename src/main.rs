use ambient_mix::config::Config;
use ambient_mix::{ffmpeg, init, pipeline, schedule};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Generates and publishes a long looped ambient mix from a folder of
/// audio tracks, either once or on a daily schedule.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Path to the JSON config
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Run the pipeline once and exit, ignoring the schedule
    #[arg(long)]
    once: bool,

    /// Test mode: skip the upload step
    #[arg(long)]
    test: bool,

    /// Test mode with a duration cap in minutes (implies --test)
    #[arg(long, value_name = "MINUTES")]
    test_minutes: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = Config::load(&args.config).await?;
    init::ensure_directories(&config).await?;
    if !ffmpeg::check_ffmpeg().await {
        warn!("ffmpeg not found in PATH; the pipeline will fail without it");
    }

    let test_mode = args.test || args.test_minutes.is_some();
    if args.once || test_mode || !config.schedule.enabled {
        match pipeline::run_once(&config, args.test_minutes, test_mode).await {
            Ok(result) => {
                info!(
                    "run complete: {} ({:.1} min, published: {}{})",
                    result.video_path.display(),
                    result.duration_seconds / 60.0,
                    result.published,
                    if result.test_only { ", test-only" } else { "" }
                );
            }
            Err(err) => {
                error!("run failed: {err}");
                std::process::exit(1);
            }
        }
    } else {
        schedule::run_daily(&config).await;
    }

    Ok(())
}
