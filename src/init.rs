use crate::config::Config;
use anyhow::Result;
use tokio::fs;
use tracing::info;

pub async fn ensure_directories(config: &Config) -> Result<()> {
    let dir = &config.project.output_dir;
    if !dir.exists() {
        fs::create_dir_all(dir).await?;
        info!("created output directory: {}", dir.display());
    }
    Ok(())
}
