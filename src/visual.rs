use crate::api::images::ImageClient;
use crate::api::loops::LoopCommand;
use crate::config::{Config, LoopProvider, VisualsConfig};
use crate::error::PipelineError;
use crate::ffmpeg;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Seed visual for a run: a short loop clip, plus the still it came from
/// when one exists (the thumbnail is rendered from it).
#[derive(Debug, Clone)]
pub struct VisualAsset {
    pub image_path: Option<PathBuf>,
    pub loop_path: PathBuf,
    pub generated: bool,
}

/// One strategy for producing the seed visual. Strategies are tried in
/// order; a GenerationError advances the chain, anything else aborts.
#[async_trait]
pub trait SeedProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn provide(&self, run_dir: &Path) -> Result<VisualAsset, PipelineError>;
}

/// Resolves the seed image: a supplied still, a prompt-generated one, or
/// a synthesized color frame.
async fn ensure_image(
    visuals: &VisualsConfig,
    resolution: &str,
    run_dir: &Path,
) -> Result<PathBuf, PipelineError> {
    if let Some(ref supplied) = visuals.image_path {
        if !supplied.is_file() {
            return Err(PipelineError::configuration(format!(
                "visuals.image_path not found: {}",
                supplied.display()
            )));
        }
        return Ok(supplied.clone());
    }

    let output = run_dir.join("visual.png");
    if let Some(ref prompt) = visuals.image_prompt {
        let client = ImageClient::new(
            visuals.image_model.as_deref(),
            visuals.image_api_key_env.as_deref(),
        )?;
        client.generate_image(prompt, &output).await?;
        return Ok(output);
    }

    if visuals.auto_background {
        ffmpeg::generate_color_image(&output, resolution, &visuals.background_color)
            .await
            .map_err(|e| PipelineError::generation(e.to_string()))?;
        return Ok(output);
    }

    Err(PipelineError::configuration(
        "provide visuals.image_path, visuals.image_prompt, or enable visuals.auto_background",
    ))
}

/// A pre-rendered loop clip supplied by the operator.
pub struct SuppliedLoop {
    pub loop_path: PathBuf,
    pub image_path: Option<PathBuf>,
}

#[async_trait]
impl SeedProvider for SuppliedLoop {
    fn name(&self) -> &'static str {
        "supplied"
    }

    async fn provide(&self, _run_dir: &Path) -> Result<VisualAsset, PipelineError> {
        if !self.loop_path.is_file() {
            return Err(PipelineError::configuration(format!(
                "visuals.loop_video_path not found: {}",
                self.loop_path.display()
            )));
        }
        Ok(VisualAsset {
            image_path: self.image_path.clone(),
            loop_path: self.loop_path.clone(),
            generated: false,
        })
    }
}

/// Seed loop produced by the external loop-generation command from a
/// seed image and prompt.
pub struct GeneratedLoop {
    pub visuals: VisualsConfig,
    pub resolution: String,
    pub fps: u32,
}

#[async_trait]
impl SeedProvider for GeneratedLoop {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn provide(&self, run_dir: &Path) -> Result<VisualAsset, PipelineError> {
        let prompt = self
            .visuals
            .video_prompt
            .as_deref()
            .or(self.visuals.image_prompt.as_deref())
            .ok_or_else(|| {
                PipelineError::configuration(
                    "visuals.video_prompt is required to generate the loop video",
                )
            })?;
        let command = self.visuals.loop_command.as_deref().ok_or_else(|| {
            PipelineError::configuration("visuals.loop_command is required for loop_provider=command")
        })?;

        let image_path = ensure_image(&self.visuals, &self.resolution, run_dir).await?;
        let loop_path = run_dir.join("loop.mp4");
        LoopCommand::new(command)
            .generate_loop_video(
                &image_path,
                &loop_path,
                prompt,
                self.visuals.loop_duration_seconds,
                self.fps,
            )
            .await?;
        if !loop_path.is_file() {
            return Err(PipelineError::generation(
                "loop command reported success but wrote no output",
            ));
        }
        Ok(VisualAsset {
            image_path: Some(image_path),
            loop_path,
            generated: true,
        })
    }
}

/// Seed loop synthesized from a still image with the zoompan motion
/// filter.
pub struct FfmpegLoop {
    pub visuals: VisualsConfig,
    pub resolution: String,
    pub fps: u32,
}

#[async_trait]
impl SeedProvider for FfmpegLoop {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn provide(&self, run_dir: &Path) -> Result<VisualAsset, PipelineError> {
        let image_path = ensure_image(&self.visuals, &self.resolution, run_dir).await?;
        let loop_path = run_dir.join("loop.mp4");
        ffmpeg::generate_loop_from_image(
            &image_path,
            &loop_path,
            &self.visuals,
            &self.resolution,
            self.fps,
        )
        .await
        .map_err(|e| PipelineError::generation(e.to_string()))?;
        Ok(VisualAsset {
            image_path: Some(image_path),
            loop_path,
            generated: true,
        })
    }
}

/// Last-resort fallback: a plain synthesized background looped with the
/// default motion.
pub struct ColorBackground {
    pub visuals: VisualsConfig,
    pub resolution: String,
    pub fps: u32,
}

#[async_trait]
impl SeedProvider for ColorBackground {
    fn name(&self) -> &'static str {
        "color-background"
    }

    async fn provide(&self, run_dir: &Path) -> Result<VisualAsset, PipelineError> {
        let image_path = run_dir.join("background.png");
        ffmpeg::generate_color_image(&image_path, &self.resolution, &self.visuals.background_color)
            .await
            .map_err(|e| PipelineError::generation(e.to_string()))?;
        let loop_path = run_dir.join("loop.mp4");
        ffmpeg::generate_loop_from_image(
            &image_path,
            &loop_path,
            &self.visuals,
            &self.resolution,
            self.fps,
        )
        .await
        .map_err(|e| PipelineError::generation(e.to_string()))?;
        Ok(VisualAsset {
            image_path: Some(image_path),
            loop_path,
            generated: true,
        })
    }
}

/// Orders the configured strategies. New providers slot in here without
/// touching the pipeline.
pub fn build_chain(config: &Config) -> Vec<Box<dyn SeedProvider>> {
    let visuals = &config.visuals;
    let resolution = config.video.resolution.clone();
    let fps = config.loop_fps();
    let mut chain: Vec<Box<dyn SeedProvider>> = Vec::new();

    if let Some(ref loop_path) = visuals.loop_video_path {
        chain.push(Box::new(SuppliedLoop {
            loop_path: loop_path.clone(),
            image_path: visuals.image_path.clone(),
        }));
    }

    let has_image_source =
        visuals.image_path.is_some() || visuals.image_prompt.is_some() || visuals.auto_background;

    if visuals.loop_provider == LoopProvider::Command && visuals.loop_command.is_some() {
        chain.push(Box::new(GeneratedLoop {
            visuals: visuals.clone(),
            resolution: resolution.clone(),
            fps,
        }));
    }

    if has_image_source {
        chain.push(Box::new(FfmpegLoop {
            visuals: visuals.clone(),
            resolution: resolution.clone(),
            fps,
        }));
    }

    if visuals.fallback_background {
        chain.push(Box::new(ColorBackground {
            visuals: visuals.clone(),
            resolution,
            fps,
        }));
    }

    chain
}

/// Tries each provider in order. Generation failures advance the chain;
/// configuration failures abort immediately; an exhausted chain is
/// fatal.
pub async fn build_seed(config: &Config, run_dir: &Path) -> Result<VisualAsset, PipelineError> {
    let chain = build_chain(config);
    if chain.is_empty() {
        return Err(PipelineError::configuration(
            "no visual source configured: set a loop path, an image source, or fallback_background",
        ));
    }

    let mut last_err = None;
    for provider in &chain {
        match provider.provide(run_dir).await {
            Ok(asset) => {
                info!("seed visual ready via {} provider", provider.name());
                return Ok(asset);
            }
            Err(err @ PipelineError::Generation(_)) => {
                warn!("{} provider failed: {err}", provider.name());
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_err
        .unwrap_or_else(|| PipelineError::generation("all seed visual providers failed")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        serde_json::from_str(
            r#"{"audio": {"source": "local", "local_folder": "music"}}"#,
        )
        .unwrap()
    }

    fn chain_names(config: &Config) -> Vec<&'static str> {
        build_chain(config).iter().map(|p| p.name()).collect()
    }

    #[test]
    fn empty_visuals_yields_empty_chain() {
        let config = base_config();
        assert!(chain_names(&config).is_empty());
    }

    #[test]
    fn supplied_loop_comes_first() {
        let mut config = base_config();
        config.visuals.loop_video_path = Some(PathBuf::from("seed.mp4"));
        config.visuals.image_prompt = Some("cozy cabin".to_string());
        assert_eq!(chain_names(&config), vec!["supplied", "ffmpeg"]);
    }

    #[test]
    fn command_provider_falls_back_to_ffmpeg_then_background() {
        let mut config = base_config();
        config.visuals.loop_provider = LoopProvider::Command;
        config.visuals.loop_command = Some("genloop {image_path} {output_path}".to_string());
        config.visuals.image_prompt = Some("rainy window".to_string());
        config.visuals.fallback_background = true;
        assert_eq!(
            chain_names(&config),
            vec!["command", "ffmpeg", "color-background"]
        );
    }

    #[test]
    fn auto_background_alone_enables_ffmpeg_loop() {
        let mut config = base_config();
        config.visuals.auto_background = true;
        assert_eq!(chain_names(&config), vec!["ffmpeg"]);
    }

    #[tokio::test]
    async fn missing_supplied_loop_is_a_configuration_error() {
        let provider = SuppliedLoop {
            loop_path: PathBuf::from("/no/such/loop.mp4"),
            image_path: None,
        };
        let err = provider.provide(Path::new(".")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[tokio::test]
    async fn empty_chain_fails_fast() {
        let config = base_config();
        let err = build_seed(&config, Path::new(".")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
