use crate::api::youtube::YouTubeUploader;
use crate::config::Config;
use crate::error::PipelineError;
use crate::ffmpeg;
use crate::overlay;
use crate::playlist::{self, Chapter, TargetBand};
use crate::publish::{PublishGuard, UploadRequest, Uploader};
use crate::source;
use crate::visual;
use chrono::{Local, NaiveDate};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    SourcingAudio,
    AssemblingPlaylist,
    BuildingVisual,
    Overlaying,
    Muxing,
    Publishing,
    Done,
    Failed,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::SourcingAudio => "sourcing-audio",
            RunStage::AssemblingPlaylist => "assembling-playlist",
            RunStage::BuildingVisual => "building-visual",
            RunStage::Overlaying => "overlaying",
            RunStage::Muxing => "muxing",
            RunStage::Publishing => "publishing",
            RunStage::Done => "done",
            RunStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Terminal artifact of one run. Artifacts stay on disk whether the run
/// succeeded or not.
#[derive(Debug)]
pub struct RunResult {
    pub run_dir: PathBuf,
    pub video_path: PathBuf,
    pub thumbnail_path: Option<PathBuf>,
    pub chapters: Vec<Chapter>,
    pub title: String,
    pub description: String,
    pub duration_seconds: f64,
    pub published: bool,
    pub video_id: Option<String>,
    pub test_only: bool,
}

/// Effective run parameters once test-mode overrides are applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunPlan {
    pub band: TargetBand,
    /// Hard cap enforced at the container level after concat.
    pub trim_seconds: Option<f64>,
    pub skip_upload: bool,
}

/// Resolves the target band and upload gating from config plus the CLI
/// test switches. In test mode the band collapses to `[0, cap]` and the
/// publisher is disabled; a zero cap means one unbounded pass.
pub fn resolve_plan(config: &Config, test_minutes: Option<f64>, test_mode: bool) -> RunPlan {
    let test_enabled = test_mode || config.test.enabled || test_minutes.is_some();
    if test_enabled {
        let cap = test_minutes.or(config.test.max_minutes);
        let band = if config.test.repeat_playlist {
            TargetBand::new(config.target_min_seconds(), config.target_max_seconds())
        } else {
            TargetBand::test_cap(cap)
        };
        return RunPlan {
            band,
            trim_seconds: cap.filter(|m| *m > 0.0).map(|m| m * 60.0),
            skip_upload: config.test.disable_upload,
        };
    }

    let band = if config.audio.repeat_playlist {
        TargetBand::new(config.target_min_seconds(), config.target_max_seconds())
    } else {
        TargetBand::single_pass()
    };
    RunPlan {
        band,
        trim_seconds: config.target_max_seconds(),
        skip_upload: false,
    }
}

pub fn output_filename(project_name: &str, date: NaiveDate) -> String {
    format!("{}_{}.mp4", project_name, date.format("%Y-%m-%d"))
}

/// Drops chapters that start at or past the trimmed total.
pub fn clip_chapters(chapters: Vec<Chapter>, total_seconds: f64) -> Vec<Chapter> {
    chapters
        .into_iter()
        .filter(|c| c.start_seconds < total_seconds)
        .collect()
}

fn build_uploader(config: &Config) -> Result<YouTubeUploader, PipelineError> {
    let token_json = config.upload.token_json.clone().ok_or_else(|| {
        PipelineError::configuration("upload.token_json is required when upload is enabled")
    })?;
    YouTubeUploader::new(
        token_json,
        &config.upload.privacy_status,
        &config.upload.category_id,
    )
}

async fn create_run_dir(config: &Config) -> Result<PathBuf, PipelineError> {
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let run_dir = config.project.output_dir.join(stamp);
    fs::create_dir_all(&run_dir)
        .await
        .map_err(|e| PipelineError::configuration(format!("failed to create run dir: {e}")))?;
    Ok(run_dir)
}

/// One full pipeline run: source, assemble, render, mux, publish. Runs
/// strictly sequentially; a failure at any stage aborts the run and
/// leaves everything already produced in the run directory.
pub async fn run_once(
    config: &Config,
    test_minutes: Option<f64>,
    test_mode: bool,
) -> Result<RunResult, PipelineError> {
    match run_inner(config, test_minutes, test_mode).await {
        Ok(result) => Ok(result),
        Err(err) => {
            error!("stage: {} ({err})", RunStage::Failed);
            Err(err)
        }
    }
}

async fn run_inner(
    config: &Config,
    test_minutes: Option<f64>,
    test_mode: bool,
) -> Result<RunResult, PipelineError> {
    let plan = resolve_plan(config, test_minutes, test_mode);
    let today = Local::now().date_naive();
    let run_dir = create_run_dir(config).await?;
    info!("run dir: {}", run_dir.display());

    // SourcingAudio
    info!("stage: {}", RunStage::SourcingAudio);
    let audio_source = source::build_source(&config.audio)?;
    let clips = audio_source.collect(&run_dir.join("audio")).await?;

    // AssemblingPlaylist
    info!("stage: {}", RunStage::AssemblingPlaylist);
    let playlist = playlist::assemble(&clips, plan.band)?;
    info!(
        "playlist: {} entries, {} full pass(es), {:.1} min",
        playlist.entries.len(),
        playlist.passes,
        playlist.total_seconds / 60.0
    );

    let concat_list = run_dir.join("concat.txt");
    let entry_paths: Vec<&Path> = playlist.entries.iter().map(|c| c.path.as_path()).collect();
    ffmpeg::write_concat_list(&entry_paths, &concat_list).await?;

    let mut audio_path = run_dir.join("audio_full.mp3");
    ffmpeg::concat_audio(
        &concat_list,
        &audio_path,
        &config.audio.concat_codec,
        config.audio.concat_quality,
        config.audio.concat_bitrate.as_deref(),
    )
    .await?;
    let mut total_seconds = ffmpeg::probe_duration_seconds(&audio_path).await?;

    if let Some(max) = plan.trim_seconds {
        if total_seconds > max {
            let trimmed = run_dir.join("audio_trimmed.mp3");
            ffmpeg::trim_audio(
                &audio_path,
                &trimmed,
                max,
                &config.audio.concat_codec,
                config.audio.concat_quality,
                config.audio.concat_bitrate.as_deref(),
            )
            .await?;
            audio_path = trimmed;
            total_seconds = max;
            info!("audio trimmed to {:.1} min", max / 60.0);
        }
    }

    let chapters = clip_chapters(playlist::chapters(&playlist), total_seconds);

    // BuildingVisual
    info!("stage: {}", RunStage::BuildingVisual);
    let seed = visual::build_seed(config, &run_dir).await?;

    // Overlaying
    info!("stage: {}", RunStage::Overlaying);
    let overlay_plan = overlay::build_plan(&config.text_overlay, &run_dir, today).await?;
    let mut thumbnail_path = None;
    if let Some(ref plan) = overlay_plan {
        if plan.create_thumbnail {
            if let Some(ref image) = seed.image_path {
                let thumb = run_dir.join("thumbnail.png");
                ffmpeg::render_still_with_text(image, &thumb, &plan.filter).await?;
                thumbnail_path = Some(thumb);
            }
        }
    }

    // Muxing
    info!("stage: {}", RunStage::Muxing);
    let drawtext = overlay_plan
        .as_ref()
        .filter(|p| p.apply_to_video)
        .map(|p| p.filter.as_str());
    let rendered = run_dir.join("render.mp4");
    ffmpeg::render_video(
        &seed.loop_path,
        &audio_path,
        &rendered,
        &config.video.resolution,
        config.video.fps,
        &config.video.video_bitrate,
        &config.video.audio_bitrate,
        total_seconds,
        drawtext,
    )
    .await?;

    let video_path = run_dir.join(output_filename(&config.project.name, today));
    if config.tracklist.embed_chapters && !chapters.is_empty() {
        let metadata = run_dir.join("chapters.ffmeta");
        ffmpeg::write_chapter_metadata(&chapters, total_seconds, &metadata).await?;
        ffmpeg::mux_chapters(&rendered, &metadata, &video_path).await?;
        fs::remove_file(&rendered).await.ok();
    } else {
        fs::rename(&rendered, &video_path)
            .await
            .map_err(|e| PipelineError::media_tool(format!("failed to move output: {e}")))?;
    }
    info!("output: {} ({:.1} min)", video_path.display(), total_seconds / 60.0);

    let mut title = crate::publish::render_template(&config.upload.title_template, today);
    if title.trim().is_empty() {
        title = output_filename(&config.project.name, today);
    }
    let mut description =
        crate::publish::render_template(&config.upload.description_template, today);
    if config.tracklist.enabled {
        let tracklist = playlist::tracklist_text(&chapters);
        fs::write(run_dir.join("tracklist.txt"), &tracklist)
            .await
            .ok();
        if config.tracklist.append_to_description && !tracklist.is_empty() {
            if !description.is_empty() {
                description.push_str("\n\n");
            }
            description.push_str("Tracklist:\n");
            description.push_str(&tracklist);
        }
    }

    // Publishing
    let mut published = false;
    let mut video_id = None;
    let test_only = plan.skip_upload;
    if !config.upload.enabled || plan.skip_upload {
        info!("publish skipped ({})", if plan.skip_upload { "test mode" } else { "disabled" });
    } else {
        info!("stage: {}", RunStage::Publishing);
        let guard = PublishGuard::new(config.upload.state_file.clone());
        if guard.already_published(today).await {
            warn!("already published today; skipping upload");
        } else {
            let uploader = build_uploader(config)?;
            let result = uploader
                .upload_video(UploadRequest {
                    video_path: &video_path,
                    title: &title,
                    description: &description,
                    tags: &config.upload.tags,
                })
                .await?;
            if let Some(ref id) = result.video_id {
                let wants_thumb = overlay_plan
                    .as_ref()
                    .map(|p| p.upload_thumbnail)
                    .unwrap_or(false);
                if wants_thumb {
                    if let Some(ref thumb) = thumbnail_path {
                        if let Err(err) = uploader.set_thumbnail(id, thumb).await {
                            warn!("thumbnail upload failed: {err}");
                        }
                    }
                }
            }
            guard.record_published(today).await?;
            published = true;
            video_id = result.video_id;
        }
    }

    info!("stage: {}", RunStage::Done);
    Ok(RunResult {
        run_dir,
        video_path,
        thumbnail_path,
        chapters,
        title,
        description,
        duration_seconds: total_seconds,
        published,
        video_id,
        test_only,
    })
}
