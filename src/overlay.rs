use crate::config::{OverlayAutoMode, OverlayConfig};
use crate::error::PipelineError;
use crate::ffmpeg::escape_drawtext_value;
use chrono::{Datelike, NaiveDate};
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;

/// Picks the overlay text for a run. A literal text always wins; with a
/// blank literal the rotation list is consulted. The daily pick is a pure
/// function of the date so reruns on the same day agree.
pub fn select_overlay_text(
    literal: &str,
    auto_texts: &[String],
    mode: OverlayAutoMode,
    date: NaiveDate,
) -> Option<String> {
    let literal = literal.trim();
    if !literal.is_empty() {
        return Some(literal.to_string());
    }
    if auto_texts.is_empty() {
        return None;
    }
    let index = match mode {
        OverlayAutoMode::Daily => date.num_days_from_ce() as usize % auto_texts.len(),
        OverlayAutoMode::Random => {
            let seed = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            rand::rngs::StdRng::seed_from_u64(seed).gen_range(0..auto_texts.len())
        }
    };
    Some(auto_texts[index].clone())
}

/// Builds the ffmpeg drawtext filter for the configured style. The text
/// itself is read from a file so quoting stays sane.
pub fn drawtext_filter(cfg: &OverlayConfig, textfile: &Path) -> String {
    let mut args = Vec::new();
    args.push(format!(
        "textfile={}",
        escape_drawtext_value(&textfile.display().to_string())
    ));
    if let Some(ref fontfile) = cfg.fontfile {
        args.push(format!(
            "fontfile={}",
            escape_drawtext_value(&fontfile.display().to_string())
        ));
    } else if let Some(ref font) = cfg.font {
        args.push(format!("font={}", escape_drawtext_value(font)));
    }
    args.push(format!("fontcolor={}", cfg.font_color));
    args.push(format!("fontsize={}", cfg.font_size));
    args.push(format!("x={}", cfg.x));
    args.push(format!("y={}", cfg.y));
    if cfg.outline_width > 0 {
        args.push(format!("bordercolor={}", cfg.outline_color));
        args.push(format!("borderw={}", cfg.outline_width));
    }
    if let (Some(box_color), Some(box_borderw)) = (&cfg.box_color, cfg.box_borderw) {
        args.push("box=1".to_string());
        args.push(format!("boxcolor={box_color}"));
        args.push(format!("boxborderw={box_borderw}"));
    }
    if let (Some(shadow_color), Some(sx), Some(sy)) =
        (&cfg.shadow_color, cfg.shadow_x, cfg.shadow_y)
    {
        args.push(format!("shadowcolor={shadow_color}"));
        args.push(format!("shadowx={sx}"));
        args.push(format!("shadowy={sy}"));
    }
    format!("drawtext={}", args.join(":"))
}

/// A resolved overlay for one run: the chosen text and its filter.
#[derive(Debug, Clone)]
pub struct OverlayPlan {
    pub text: String,
    pub filter: String,
    pub apply_to_video: bool,
    pub create_thumbnail: bool,
    pub upload_thumbnail: bool,
}

/// Resolves the overlay for today, writing the text file into the run
/// directory. Returns None when no overlay is configured. A configured
/// font file that does not exist is fatal.
pub async fn build_plan(
    cfg: &OverlayConfig,
    run_dir: &Path,
    date: NaiveDate,
) -> Result<Option<OverlayPlan>, PipelineError> {
    let text = match select_overlay_text(&cfg.text, &cfg.auto_texts, cfg.auto_mode, date) {
        Some(text) => text,
        None => return Ok(None),
    };

    if let Some(ref fontfile) = cfg.fontfile {
        if !fontfile.is_file() {
            return Err(PipelineError::configuration(format!(
                "overlay font file not found: {}",
                fontfile.display()
            )));
        }
    }

    let textfile = run_dir.join("overlay.txt");
    fs::write(&textfile, &text)
        .await
        .map_err(|e| PipelineError::configuration(format!("failed to write overlay text: {e}")))?;

    Ok(Some(OverlayPlan {
        text,
        filter: drawtext_filter(cfg, &textfile),
        apply_to_video: cfg.apply_to_video,
        create_thumbnail: cfg.create_thumbnail,
        upload_thumbnail: cfg.upload_thumbnail,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn texts() -> Vec<String> {
        vec!["LOCK IN".to_string(), "SLOW DOWN".to_string(), "REST".to_string()]
    }

    #[test]
    fn literal_text_wins_over_rotation() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let picked = select_overlay_text("FOCUS", &texts(), OverlayAutoMode::Daily, date);
        assert_eq!(picked.as_deref(), Some("FOCUS"));
    }

    #[test]
    fn blank_text_with_no_rotation_means_no_overlay() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(
            select_overlay_text("  ", &[], OverlayAutoMode::Daily, date),
            None
        );
    }

    #[test]
    fn daily_pick_is_deterministic_for_a_date() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let a = select_overlay_text("", &texts(), OverlayAutoMode::Daily, date);
        let b = select_overlay_text("", &texts(), OverlayAutoMode::Daily, date);
        assert_eq!(a, b);
    }

    #[test]
    fn daily_pick_rotates_across_consecutive_days() {
        let list = texts();
        let d1 = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let d3 = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        let picks: Vec<_> = [d1, d2, d3]
            .into_iter()
            .map(|d| select_overlay_text("", &list, OverlayAutoMode::Daily, d).unwrap())
            .collect();
        assert_ne!(picks[0], picks[1]);
        assert_ne!(picks[1], picks[2]);
        assert_ne!(picks[0], picks[2]);
    }

    #[test]
    fn filter_has_centered_defaults() {
        let cfg = OverlayConfig::default();
        let filter = drawtext_filter(&cfg, &PathBuf::from("runs/x/overlay.txt"));
        assert!(filter.starts_with("drawtext=textfile=runs/x/overlay.txt"));
        assert!(filter.contains("fontcolor=white"));
        assert!(filter.contains("fontsize=96"));
        assert!(filter.contains("x=(w-text_w)/2"));
        assert!(filter.contains("bordercolor=black:borderw=4"));
        assert!(!filter.contains("box=1"));
    }

    #[test]
    fn filter_includes_box_and_shadow_when_configured() {
        let cfg = OverlayConfig {
            box_color: Some("black@0.4".to_string()),
            box_borderw: Some(24),
            shadow_color: Some("black".to_string()),
            shadow_x: Some(2),
            shadow_y: Some(2),
            ..Default::default()
        };
        let filter = drawtext_filter(&cfg, &PathBuf::from("overlay.txt"));
        assert!(filter.contains("box=1:boxcolor=black@0.4:boxborderw=24"));
        assert!(filter.contains("shadowcolor=black:shadowx=2:shadowy=2"));
    }

    #[tokio::test]
    async fn missing_font_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = OverlayConfig {
            text: "HELLO".to_string(),
            fontfile: Some(PathBuf::from("/no/such/font.ttf")),
            ..Default::default()
        };
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let err = build_plan(&cfg, dir.path(), date).await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[tokio::test]
    async fn plan_writes_text_file_into_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = OverlayConfig {
            text: "DEEP WORK".to_string(),
            ..Default::default()
        };
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let plan = build_plan(&cfg, dir.path(), date).await.unwrap().unwrap();
        assert_eq!(plan.text, "DEEP WORK");
        let written = std::fs::read_to_string(dir.path().join("overlay.txt")).unwrap();
        assert_eq!(written, "DEEP WORK");
    }
}
