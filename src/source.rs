use crate::config::{AudioConfig, AudioOrdering, AudioSourceKind};
use crate::error::PipelineError;
use crate::ffmpeg;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::info;
use walkdir::WalkDir;

const DRIVE_BASE: &str = "https://www.googleapis.com/drive/v3";

/// One probed audio file. Created at scan time, never mutated.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub index: usize,
}

impl AudioClip {
    pub fn title(&self) -> String {
        self.path
            .file_stem()
            .and_then(OsStr::to_str)
            .unwrap_or("Untitled")
            .to_string()
    }
}

#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Resolves the configured audio set into local files with probed
    /// durations. `work_dir` receives any downloads.
    async fn collect(&self, work_dir: &Path) -> Result<Vec<AudioClip>, PipelineError>;
}

pub fn build_source(audio: &AudioConfig) -> Result<Box<dyn AudioSource>, PipelineError> {
    match audio.source {
        AudioSourceKind::Local => {
            let folder = audio
                .local_folder
                .clone()
                .ok_or_else(|| PipelineError::configuration("audio.local_folder is not set"))?;
            Ok(Box::new(LocalFolderSource {
                folder,
                ordering: audio.ordering,
                recursive: audio.recursive,
            }))
        }
        AudioSourceKind::Drive => {
            let folder_id = audio
                .drive_folder_id
                .clone()
                .ok_or_else(|| PipelineError::configuration("audio.drive_folder_id is not set"))?;
            let token_json = audio
                .drive_token_json
                .clone()
                .ok_or_else(|| PipelineError::configuration("audio.drive_token_json is not set"))?;
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(300))
                .build()
                .map_err(|e| PipelineError::source(format!("failed to build HTTP client: {e}")))?;
            Ok(Box::new(DriveFolderSource {
                folder_id,
                token_json,
                ordering: audio.ordering,
                client,
            }))
        }
    }
}

fn now_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn shuffle_paths(paths: &mut [PathBuf]) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(now_seed());
    paths.shuffle(&mut rng);
}

async fn probe_all(paths: Vec<PathBuf>) -> Result<Vec<AudioClip>, PipelineError> {
    let mut clips = Vec::with_capacity(paths.len());
    for (index, path) in paths.into_iter().enumerate() {
        let duration_seconds = ffmpeg::probe_duration_seconds(&path).await?;
        clips.push(AudioClip {
            path,
            duration_seconds,
            index,
        });
    }
    Ok(clips)
}

pub struct LocalFolderSource {
    pub folder: PathBuf,
    pub ordering: AudioOrdering,
    pub recursive: bool,
}

impl LocalFolderSource {
    fn scan(&self) -> Result<Vec<PathBuf>, PipelineError> {
        if !self.folder.is_dir() {
            return Err(PipelineError::source(format!(
                "audio folder not found: {}",
                self.folder.display()
            )));
        }

        let depth = if self.recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.folder).min_depth(1).max_depth(depth) {
            let entry =
                entry.map_err(|e| PipelineError::source(format!("audio folder scan: {e}")))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_mp3 = path
                .extension()
                .and_then(OsStr::to_str)
                .map(|ext| ext.eq_ignore_ascii_case("mp3"))
                .unwrap_or(false);
            if is_mp3 {
                files.push(path.to_path_buf());
            }
        }

        match self.ordering {
            AudioOrdering::Name => {
                files.sort_by_key(|p| {
                    p.file_name()
                        .map(|n| n.to_string_lossy().to_lowercase())
                        .unwrap_or_default()
                });
            }
            AudioOrdering::ModifiedTime => {
                files.sort_by_key(|p| {
                    p.metadata()
                        .and_then(|m| m.modified())
                        .unwrap_or(UNIX_EPOCH)
                });
            }
            AudioOrdering::Shuffle => shuffle_paths(&mut files),
        }

        Ok(files)
    }
}

#[async_trait]
impl AudioSource for LocalFolderSource {
    async fn collect(&self, _work_dir: &Path) -> Result<Vec<AudioClip>, PipelineError> {
        let files = self.scan()?;
        info!(
            "local audio scan: {} file(s) in {}",
            files.len(),
            self.folder.display()
        );
        probe_all(files).await
    }
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct StoredToken {
    token: String,
}

/// Lists and downloads MP3s from a shared Drive folder. The bearer token
/// is read from a token file; obtaining it is the setup tooling's job.
pub struct DriveFolderSource {
    pub folder_id: String,
    pub token_json: PathBuf,
    pub ordering: AudioOrdering,
    pub client: reqwest::Client,
}

impl DriveFolderSource {
    async fn access_token(&self) -> Result<String, PipelineError> {
        let raw = fs::read_to_string(&self.token_json).await.map_err(|e| {
            PipelineError::source(format!(
                "failed to read drive token {}: {e}",
                self.token_json.display()
            ))
        })?;
        let stored: StoredToken = serde_json::from_str(&raw)
            .map_err(|e| PipelineError::source(format!("invalid drive token file: {e}")))?;
        Ok(stored.token)
    }

    async fn list_mp3_files(&self, token: &str) -> Result<Vec<DriveFile>, PipelineError> {
        let order_by = match self.ordering {
            AudioOrdering::ModifiedTime => "modifiedTime",
            _ => "name",
        };
        let query = format!(
            "'{}' in parents and mimeType='audio/mpeg' and trashed=false",
            self.folder_id
        );

        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .client
                .get(format!("{DRIVE_BASE}/files"))
                .bearer_auth(token)
                .query(&[
                    ("q", query.as_str()),
                    ("orderBy", order_by),
                    ("fields", "nextPageToken, files(id, name)"),
                ]);
            if let Some(ref next) = page_token {
                request = request.query(&[("pageToken", next.as_str())]);
            }

            let resp = request
                .send()
                .await
                .map_err(|e| PipelineError::source(format!("drive list request failed: {e}")))?;
            let status = resp.status();
            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                return Err(PipelineError::source(format!(
                    "drive auth failure (HTTP {})",
                    status.as_u16()
                )));
            }
            if !status.is_success() {
                return Err(PipelineError::source(format!(
                    "drive list HTTP {}",
                    status.as_u16()
                )));
            }

            let page: DriveFileList = resp
                .json()
                .await
                .map_err(|e| PipelineError::source(format!("drive list parse failed: {e}")))?;
            files.extend(page.files);
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(files)
    }

    async fn download_file(
        &self,
        token: &str,
        file: &DriveFile,
        dest_path: &Path,
    ) -> Result<(), PipelineError> {
        let resp = self
            .client
            .get(format!("{DRIVE_BASE}/files/{}", file.id))
            .query(&[("alt", "media")])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PipelineError::source(format!("drive download failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(PipelineError::source(format!(
                "drive download HTTP {} for {}",
                resp.status().as_u16(),
                file.name
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| PipelineError::source(format!("drive download read failed: {e}")))?;
        fs::write(dest_path, &bytes)
            .await
            .map_err(|e| PipelineError::source(format!("failed to write download: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl AudioSource for DriveFolderSource {
    async fn collect(&self, work_dir: &Path) -> Result<Vec<AudioClip>, PipelineError> {
        let token = self.access_token().await?;
        let files = self.list_mp3_files(&token).await?;
        info!("drive listing: {} file(s)", files.len());

        fs::create_dir_all(work_dir)
            .await
            .map_err(|e| PipelineError::source(format!("failed to create audio dir: {e}")))?;

        let mut downloaded = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            let safe_name = file.name.replace('/', "_");
            let dest = work_dir.join(format!("{:03}_{}", index + 1, safe_name));
            self.download_file(&token, file, &dest).await?;
            downloaded.push(dest);
        }

        if self.ordering == AudioOrdering::Shuffle {
            shuffle_paths(&mut downloaded);
        }

        probe_all(downloaded).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn touch(dir: &Path, name: &str) {
        let mut f = File::create(dir.join(name)).unwrap();
        f.write_all(b"not really audio").unwrap();
    }

    #[test]
    fn scan_finds_mp3s_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "B_second.mp3");
        touch(dir.path(), "a_first.mp3");
        touch(dir.path(), "notes.txt");
        let source = LocalFolderSource {
            folder: dir.path().to_path_buf(),
            ordering: AudioOrdering::Name,
            recursive: false,
        };
        let files = source.scan().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a_first.mp3", "B_second.mp3"]);
    }

    #[test]
    fn scan_is_shallow_unless_recursive() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "top.mp3");
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        touch(&dir.path().join("nested"), "deep.mp3");

        let shallow = LocalFolderSource {
            folder: dir.path().to_path_buf(),
            ordering: AudioOrdering::Name,
            recursive: false,
        };
        assert_eq!(shallow.scan().unwrap().len(), 1);

        let recursive = LocalFolderSource {
            folder: dir.path().to_path_buf(),
            ordering: AudioOrdering::Name,
            recursive: true,
        };
        assert_eq!(recursive.scan().unwrap().len(), 2);
    }

    #[test]
    fn missing_folder_is_a_source_error() {
        let source = LocalFolderSource {
            folder: PathBuf::from("/definitely/not/here"),
            ordering: AudioOrdering::Name,
            recursive: false,
        };
        assert!(matches!(
            source.scan().unwrap_err(),
            PipelineError::Source(_)
        ));
    }

    #[test]
    fn clip_title_is_the_file_stem() {
        let clip = AudioClip {
            path: PathBuf::from("music/Evening Rain.mp3"),
            duration_seconds: 2400.0,
            index: 0,
        };
        assert_eq!(clip.title(), "Evening Rain");
    }
}
