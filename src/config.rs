use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

static RESOLUTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2,5}x\d{2,5}$").unwrap());
static DAILY_TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01]?\d|2[0-3]):[0-5]\d$").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    pub audio: AudioConfig,
    #[serde(default)]
    pub visuals: VisualsConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub text_overlay: OverlayConfig,
    #[serde(default)]
    pub tracklist: TracklistConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub test: TestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_project_name")]
    pub name: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_project_name(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_project_name() -> String {
    "daily_mix".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("runs")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioSourceKind {
    Local,
    Drive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AudioOrdering {
    #[default]
    Name,
    ModifiedTime,
    Shuffle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub source: AudioSourceKind,
    #[serde(default)]
    pub local_folder: Option<PathBuf>,
    #[serde(default)]
    pub drive_folder_id: Option<String>,
    #[serde(default)]
    pub drive_token_json: Option<PathBuf>,
    #[serde(default)]
    pub ordering: AudioOrdering,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default = "default_target_hours_min")]
    pub target_hours_min: f64,
    #[serde(default = "default_target_hours_max")]
    pub target_hours_max: Option<f64>,
    #[serde(default = "default_true")]
    pub repeat_playlist: bool,
    #[serde(default = "default_concat_codec")]
    pub concat_codec: String,
    #[serde(default = "default_concat_quality")]
    pub concat_quality: Option<u32>,
    #[serde(default)]
    pub concat_bitrate: Option<String>,
}

fn default_target_hours_min() -> f64 {
    8.0
}

fn default_target_hours_max() -> Option<f64> {
    Some(9.0)
}

fn default_true() -> bool {
    true
}

fn default_concat_codec() -> String {
    "libmp3lame".to_string()
}

fn default_concat_quality() -> Option<u32> {
    Some(2)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopProvider {
    Command,
    #[default]
    Ffmpeg,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionStyle {
    #[default]
    Smooth,
    Cinematic,
    Orbit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualsConfig {
    #[serde(default)]
    pub image_path: Option<PathBuf>,
    #[serde(default)]
    pub image_prompt: Option<String>,
    #[serde(default)]
    pub image_model: Option<String>,
    #[serde(default)]
    pub image_api_key_env: Option<String>,
    #[serde(default)]
    pub loop_video_path: Option<PathBuf>,
    #[serde(default)]
    pub loop_provider: LoopProvider,
    #[serde(default)]
    pub loop_command: Option<String>,
    #[serde(default)]
    pub video_prompt: Option<String>,
    #[serde(default = "default_loop_duration")]
    pub loop_duration_seconds: u32,
    #[serde(default)]
    pub fps: Option<u32>,
    #[serde(default = "default_zoom_amount")]
    pub loop_zoom_amount: f64,
    #[serde(default)]
    pub loop_pan_amount: f64,
    #[serde(default)]
    pub effects: Vec<String>,
    #[serde(default = "default_sway_degrees")]
    pub sway_degrees: f64,
    #[serde(default = "default_flicker_amount")]
    pub flicker_amount: f64,
    #[serde(default = "default_hue_degrees")]
    pub hue_degrees: f64,
    #[serde(default)]
    pub vignette_angle: Option<String>,
    #[serde(default)]
    pub motion_style: MotionStyle,
    #[serde(default)]
    pub auto_background: bool,
    #[serde(default = "default_background_color")]
    pub background_color: String,
    /// Fall back to a plain color background when generation fails.
    #[serde(default)]
    pub fallback_background: bool,
}

impl Default for VisualsConfig {
    fn default() -> Self {
        Self {
            image_path: None,
            image_prompt: None,
            image_model: None,
            image_api_key_env: None,
            loop_video_path: None,
            loop_provider: LoopProvider::default(),
            loop_command: None,
            video_prompt: None,
            loop_duration_seconds: default_loop_duration(),
            fps: None,
            loop_zoom_amount: default_zoom_amount(),
            loop_pan_amount: 0.0,
            effects: Vec::new(),
            sway_degrees: default_sway_degrees(),
            flicker_amount: default_flicker_amount(),
            hue_degrees: default_hue_degrees(),
            vignette_angle: None,
            motion_style: MotionStyle::default(),
            auto_background: false,
            background_color: default_background_color(),
            fallback_background: false,
        }
    }
}

fn default_loop_duration() -> u32 {
    5
}

fn default_zoom_amount() -> f64 {
    0.02
}

fn default_sway_degrees() -> f64 {
    1.5
}

fn default_flicker_amount() -> f64 {
    0.02
}

fn default_hue_degrees() -> f64 {
    8.0
}

fn default_background_color() -> String {
    "black".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    #[serde(default = "default_resolution")]
    pub resolution: String,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_video_bitrate")]
    pub video_bitrate: String,
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            fps: default_fps(),
            video_bitrate: default_video_bitrate(),
            audio_bitrate: default_audio_bitrate(),
        }
    }
}

fn default_resolution() -> String {
    "1920x1080".to_string()
}

fn default_fps() -> u32 {
    30
}

fn default_video_bitrate() -> String {
    "4500k".to_string()
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayAutoMode {
    #[default]
    Daily,
    Random,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub auto_texts: Vec<String>,
    #[serde(default)]
    pub auto_mode: OverlayAutoMode,
    #[serde(default)]
    pub fontfile: Option<PathBuf>,
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_font_color")]
    pub font_color: String,
    #[serde(default = "default_outline_color")]
    pub outline_color: String,
    #[serde(default = "default_outline_width")]
    pub outline_width: u32,
    #[serde(default)]
    pub box_color: Option<String>,
    #[serde(default)]
    pub box_borderw: Option<u32>,
    #[serde(default)]
    pub shadow_color: Option<String>,
    #[serde(default)]
    pub shadow_x: Option<i32>,
    #[serde(default)]
    pub shadow_y: Option<i32>,
    #[serde(default = "default_overlay_x")]
    pub x: String,
    #[serde(default = "default_overlay_y")]
    pub y: String,
    #[serde(default = "default_true")]
    pub apply_to_video: bool,
    #[serde(default = "default_true")]
    pub create_thumbnail: bool,
    #[serde(default)]
    pub upload_thumbnail: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            text: String::new(),
            auto_texts: Vec::new(),
            auto_mode: OverlayAutoMode::default(),
            fontfile: None,
            font: None,
            font_size: default_font_size(),
            font_color: default_font_color(),
            outline_color: default_outline_color(),
            outline_width: default_outline_width(),
            box_color: None,
            box_borderw: None,
            shadow_color: None,
            shadow_x: None,
            shadow_y: None,
            x: default_overlay_x(),
            y: default_overlay_y(),
            apply_to_video: true,
            create_thumbnail: true,
            upload_thumbnail: false,
        }
    }
}

fn default_font_size() -> u32 {
    96
}

fn default_font_color() -> String {
    "white".to_string()
}

fn default_outline_color() -> String {
    "black".to_string()
}

fn default_outline_width() -> u32 {
    4
}

fn default_overlay_x() -> String {
    "(w-text_w)/2".to_string()
}

fn default_overlay_y() -> String {
    "(h-text_h)/2".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracklistConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub embed_chapters: bool,
    #[serde(default = "default_true")]
    pub append_to_description: bool,
}

impl Default for TracklistConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            embed_chapters: true,
            append_to_description: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_upload_provider")]
    pub provider: String,
    #[serde(default)]
    pub token_json: Option<PathBuf>,
    #[serde(default = "default_title_template")]
    pub title_template: String,
    #[serde(default)]
    pub description_template: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_privacy_status")]
    pub privacy_status: String,
    #[serde(default = "default_category_id")]
    pub category_id: String,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: default_upload_provider(),
            token_json: None,
            title_template: default_title_template(),
            description_template: String::new(),
            tags: Vec::new(),
            privacy_status: default_privacy_status(),
            category_id: default_category_id(),
            state_file: default_state_file(),
        }
    }
}

fn default_upload_provider() -> String {
    "youtube".to_string()
}

fn default_title_template() -> String {
    "Daily Mix - {date}".to_string()
}

fn default_privacy_status() -> String {
    "public".to_string()
}

fn default_category_id() -> String {
    "10".to_string()
}

fn default_state_file() -> PathBuf {
    PathBuf::from("publish_state.json")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_daily_time")]
    pub daily_time: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            daily_time: default_daily_time(),
        }
    }
}

fn default_daily_time() -> String {
    "03:00".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub max_minutes: Option<f64>,
    #[serde(default)]
    pub repeat_playlist: bool,
    #[serde(default = "default_true")]
    pub disable_upload: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_minutes: None,
            repeat_playlist: false,
            disable_upload: true,
        }
    }
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self.audio.source {
            AudioSourceKind::Local => {
                if self.audio.local_folder.is_none() {
                    anyhow::bail!("config: audio.local_folder is required for audio.source=local");
                }
            }
            AudioSourceKind::Drive => {
                if self.audio.drive_folder_id.is_none() {
                    anyhow::bail!(
                        "config: audio.drive_folder_id is required for audio.source=drive"
                    );
                }
                if self.audio.drive_token_json.is_none() {
                    anyhow::bail!(
                        "config: audio.drive_token_json is required for audio.source=drive"
                    );
                }
            }
        }

        if self.audio.target_hours_min < 0.0 {
            anyhow::bail!("config: audio.target_hours_min must be >= 0");
        }
        if let Some(max) = self.audio.target_hours_max {
            if max < self.audio.target_hours_min {
                anyhow::bail!("config: audio.target_hours_max must be >= target_hours_min");
            }
        }

        if !RESOLUTION_RE.is_match(&self.video.resolution) {
            anyhow::bail!(
                "config: video.resolution must look like 1920x1080, got {}",
                self.video.resolution
            );
        }
        if self.video.fps == 0 {
            anyhow::bail!("config: video.fps must be > 0");
        }

        if !DAILY_TIME_RE.is_match(&self.schedule.daily_time) {
            anyhow::bail!(
                "config: schedule.daily_time must be HH:MM, got {}",
                self.schedule.daily_time
            );
        }

        if self.upload.enabled && self.upload.provider != "youtube" {
            anyhow::bail!(
                "config: unsupported upload.provider: {}",
                self.upload.provider
            );
        }

        Ok(())
    }

    pub fn target_min_seconds(&self) -> f64 {
        self.audio.target_hours_min * 3600.0
    }

    pub fn target_max_seconds(&self) -> Option<f64> {
        self.audio.target_hours_max.map(|h| h * 3600.0)
    }

    pub fn loop_fps(&self) -> u32 {
        self.visuals.fps.unwrap_or(self.video.fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> &'static str {
        r#"{
            "audio": {
                "source": "local",
                "local_folder": "music"
            }
        }"#
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let cfg: Config = serde_json::from_str(minimal_json()).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.project.name, "daily_mix");
        assert_eq!(cfg.audio.target_hours_min, 8.0);
        assert_eq!(cfg.audio.target_hours_max, Some(9.0));
        assert!(cfg.audio.repeat_playlist);
        assert_eq!(cfg.video.resolution, "1920x1080");
        assert_eq!(cfg.schedule.daily_time, "03:00");
        assert_eq!(cfg.target_min_seconds(), 8.0 * 3600.0);
    }

    #[test]
    fn local_source_requires_folder() {
        let cfg: Config = serde_json::from_str(r#"{"audio": {"source": "local"}}"#).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn drive_source_requires_folder_id_and_token() {
        let cfg: Config = serde_json::from_str(r#"{"audio": {"source": "drive"}}"#).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_bad_resolution() {
        let mut cfg: Config = serde_json::from_str(minimal_json()).unwrap();
        cfg.video.resolution = "widescreen".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_bad_daily_time() {
        let mut cfg: Config = serde_json::from_str(minimal_json()).unwrap();
        cfg.schedule.daily_time = "25:00".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_inverted_band() {
        let mut cfg: Config = serde_json::from_str(minimal_json()).unwrap();
        cfg.audio.target_hours_min = 9.0;
        cfg.audio.target_hours_max = Some(8.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn loop_fps_falls_back_to_video_fps() {
        let mut cfg: Config = serde_json::from_str(minimal_json()).unwrap();
        assert_eq!(cfg.loop_fps(), 30);
        cfg.visuals.fps = Some(24);
        assert_eq!(cfg.loop_fps(), 24);
    }
}
