use crate::error::PipelineError;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct UploadRequest<'a> {
    pub video_path: &'a Path,
    pub title: &'a str,
    pub description: &'a str,
    pub tags: &'a [String],
}

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub video_id: Option<String>,
}

#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload_video(&self, request: UploadRequest<'_>) -> Result<UploadResult, PipelineError>;
    async fn set_thumbnail(&self, video_id: &str, thumbnail_path: &Path)
        -> Result<(), PipelineError>;
}

/// Renders `{date}` in title/description templates as an ISO date.
pub fn render_template(template: &str, date: NaiveDate) -> String {
    template.replace("{date}", &date.format("%Y-%m-%d").to_string())
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PublishState {
    last_published_date: Option<NaiveDate>,
}

/// Persisted once-per-day marker. Separate process invocations read and
/// write the same small state file, so a scheduled run and a manual run
/// on the same day agree.
pub struct PublishGuard {
    state_file: PathBuf,
}

impl PublishGuard {
    pub fn new(state_file: PathBuf) -> Self {
        Self { state_file }
    }

    async fn load(&self) -> PublishState {
        match fs::read_to_string(&self.state_file).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => PublishState::default(),
        }
    }

    pub async fn already_published(&self, date: NaiveDate) -> bool {
        self.load().await.last_published_date == Some(date)
    }

    pub async fn record_published(&self, date: NaiveDate) -> Result<(), PipelineError> {
        let state = PublishState {
            last_published_date: Some(date),
        };
        let raw = serde_json::to_string_pretty(&state)
            .map_err(|e| PipelineError::upload(format!("failed to encode publish state: {e}")))?;
        if let Some(parent) = self.state_file.parent() {
            fs::create_dir_all(parent).await.ok();
        }
        fs::write(&self.state_file, raw)
            .await
            .map_err(|e| PipelineError::upload(format!("failed to write publish state: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_renders_iso_date() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(
            render_template("Daily Mix - {date}", date),
            "Daily Mix - 2025-06-01"
        );
        assert_eq!(render_template("no placeholder", date), "no placeholder");
    }

    #[tokio::test]
    async fn guard_blocks_second_publish_on_same_day() {
        let dir = tempfile::tempdir().unwrap();
        let guard = PublishGuard::new(dir.path().join("publish_state.json"));
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

        assert!(!guard.already_published(today).await);
        guard.record_published(today).await.unwrap();
        assert!(guard.already_published(today).await);

        let tomorrow = today.succ_opt().unwrap();
        assert!(!guard.already_published(tomorrow).await);
    }

    #[tokio::test]
    async fn separate_guard_instances_share_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("publish_state.json");
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

        PublishGuard::new(path.clone())
            .record_published(today)
            .await
            .unwrap();
        assert!(PublishGuard::new(path).already_published(today).await);
    }

    #[tokio::test]
    async fn corrupt_state_file_reads_as_unpublished() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("publish_state.json");
        fs::write(&path, "{not json").await.unwrap();
        let guard = PublishGuard::new(path);
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert!(!guard.already_published(today).await);
    }
}
