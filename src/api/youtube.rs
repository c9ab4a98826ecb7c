use crate::error::PipelineError;
use crate::publish::{UploadRequest, UploadResult, Uploader};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/youtube/v3";

#[derive(Debug, Deserialize)]
struct StoredToken {
    token: String,
}

/// YouTube Data API uploader. The bearer token is read from a token
/// file; refreshing it is the setup tooling's job, not the pipeline's.
pub struct YouTubeUploader {
    pub client: reqwest::Client,
    pub token_json: PathBuf,
    pub privacy_status: String,
    pub category_id: String,
}

impl YouTubeUploader {
    pub fn new(
        token_json: PathBuf,
        privacy_status: &str,
        category_id: &str,
    ) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(6 * 3600))
            .build()
            .map_err(|e| PipelineError::upload(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            token_json,
            privacy_status: privacy_status.to_string(),
            category_id: category_id.to_string(),
        })
    }

    async fn access_token(&self) -> Result<String, PipelineError> {
        let raw = fs::read_to_string(&self.token_json).await.map_err(|e| {
            PipelineError::upload(format!(
                "failed to read upload token {}: {e}",
                self.token_json.display()
            ))
        })?;
        let stored: StoredToken = serde_json::from_str(&raw)
            .map_err(|e| PipelineError::upload(format!("invalid upload token file: {e}")))?;
        Ok(stored.token)
    }

    async fn open_session(
        &self,
        token: &str,
        request: &UploadRequest<'_>,
        file_size: u64,
    ) -> Result<String, PipelineError> {
        let body = json!({
            "snippet": {
                "title": request.title,
                "description": request.description,
                "tags": request.tags,
                "categoryId": self.category_id,
            },
            "status": {"privacyStatus": self.privacy_status},
        });

        let resp = self
            .client
            .post(format!("{UPLOAD_BASE}/videos"))
            .query(&[
                ("uploadType", "resumable"),
                ("part", "snippet,status"),
            ])
            .bearer_auth(token)
            .header("X-Upload-Content-Type", "video/mp4")
            .header("X-Upload-Content-Length", file_size.to_string())
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::upload(format!("upload session request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let raw = resp.text().await.unwrap_or_default();
            let snippet: String = raw.chars().take(400).collect();
            warn!("upload session HTTP {}: {}", status.as_u16(), snippet);
            return Err(PipelineError::upload(format!(
                "upload session HTTP {}",
                status.as_u16()
            )));
        }

        resp.headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                PipelineError::upload("upload session response missing Location".to_string())
            })
    }

    async fn put_file(
        &self,
        token: &str,
        session_url: &str,
        video_path: &Path,
        file_size: u64,
    ) -> Result<String, PipelineError> {
        let file = fs::File::open(video_path)
            .await
            .map_err(|e| PipelineError::upload(format!("failed to open video file: {e}")))?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        let resp = self
            .client
            .put(session_url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "video/mp4")
            .header(reqwest::header::CONTENT_LENGTH, file_size)
            .body(body)
            .send()
            .await
            .map_err(|e| PipelineError::upload(format!("video upload failed: {e}")))?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            let snippet: String = raw.chars().take(400).collect();
            warn!("video upload HTTP {}: {}", status.as_u16(), snippet);
            return Err(PipelineError::upload(format!(
                "video upload HTTP {}",
                status.as_u16()
            )));
        }

        let root: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| PipelineError::upload(format!("upload response parse failed: {e}")))?;
        root.get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| PipelineError::upload("upload response missing video id".to_string()))
    }
}

#[async_trait]
impl Uploader for YouTubeUploader {
    async fn upload_video(&self, request: UploadRequest<'_>) -> Result<UploadResult, PipelineError> {
        let token = self.access_token().await?;
        let file_size = fs::metadata(request.video_path)
            .await
            .map_err(|e| PipelineError::upload(format!("failed to stat video file: {e}")))?
            .len();

        let session_url = self.open_session(&token, &request, file_size).await?;
        info!("upload session opened ({} bytes)", file_size);
        let video_id = self
            .put_file(&token, &session_url, request.video_path, file_size)
            .await?;
        info!("upload complete: video id {video_id}");
        Ok(UploadResult {
            video_id: Some(video_id),
        })
    }

    async fn set_thumbnail(
        &self,
        video_id: &str,
        thumbnail_path: &Path,
    ) -> Result<(), PipelineError> {
        let token = self.access_token().await?;
        let bytes = fs::read(thumbnail_path)
            .await
            .map_err(|e| PipelineError::upload(format!("failed to read thumbnail: {e}")))?;
        let mimetype = match thumbnail_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            _ => "image/png",
        };

        let resp = self
            .client
            .post(format!("{UPLOAD_BASE}/thumbnails/set"))
            .query(&[("videoId", video_id)])
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, mimetype)
            .body(bytes)
            .send()
            .await
            .map_err(|e| PipelineError::upload(format!("thumbnail request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(PipelineError::upload(format!(
                "thumbnail HTTP {}",
                resp.status().as_u16()
            )));
        }
        Ok(())
    }
}
