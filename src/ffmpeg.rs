use crate::config::{MotionStyle, VisualsConfig};
use crate::error::PipelineError;
use crate::playlist::Chapter;
use std::path::Path;
use tokio::fs;
use tokio::process::Command;

/// Runs ffmpeg with the given arguments. Any non-zero exit is a
/// MediaTool failure carrying the tail of stderr.
async fn run_ffmpeg(args: &[String]) -> Result<(), PipelineError> {
    run_tool("ffmpeg", args).await.map(|_| ())
}

async fn run_tool(tool: &str, args: &[String]) -> Result<String, PipelineError> {
    let output = Command::new(tool)
        .args(args)
        .output()
        .await
        .map_err(|e| PipelineError::media_tool(format!("{tool} failed to start: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr
            .lines()
            .rev()
            .take(6)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("\n");
        return Err(PipelineError::media_tool(format!(
            "{tool} exited with {}: {}",
            output.status, tail
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub async fn probe_duration_seconds(path: &Path) -> Result<f64, PipelineError> {
    let args = vec![
        "-v".to_string(),
        "error".to_string(),
        "-show_entries".to_string(),
        "format=duration".to_string(),
        "-of".to_string(),
        "default=noprint_wrappers=1:nokey=1".to_string(),
        path.display().to_string(),
    ];
    let text = run_tool("ffprobe", &args).await?;
    let duration = text.parse::<f64>().unwrap_or(-1.0);
    if duration <= 0.0 {
        return Err(PipelineError::media_tool(format!(
            "ffprobe returned invalid duration for {}",
            path.display()
        )));
    }
    Ok(duration)
}

pub fn concat_list_text<'a, I>(files: I) -> String
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut out = String::new();
    for file in files {
        let safe = file.display().to_string().replace('\'', r"'\''");
        out.push_str(&format!("file '{}'\n", safe));
    }
    out
}

pub async fn write_concat_list(files: &[&Path], list_path: &Path) -> Result<(), PipelineError> {
    fs::write(list_path, concat_list_text(files.iter().copied()))
        .await
        .map_err(|e| PipelineError::media_tool(format!("failed to write concat list: {e}")))
}

fn audio_codec_args(codec: &str, quality: Option<u32>, bitrate: Option<&str>) -> Vec<String> {
    let mut args = vec!["-c:a".to_string(), codec.to_string()];
    if codec == "libmp3lame" {
        if let Some(q) = quality {
            args.push("-q:a".to_string());
            args.push(q.to_string());
        }
    }
    if let Some(b) = bitrate {
        args.push("-b:a".to_string());
        args.push(b.to_string());
    }
    args
}

pub async fn concat_audio(
    list_path: &Path,
    output_path: &Path,
    codec: &str,
    quality: Option<u32>,
    bitrate: Option<&str>,
) -> Result<(), PipelineError> {
    let mut args = vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list_path.display().to_string(),
    ];
    args.extend(audio_codec_args(codec, quality, bitrate));
    args.push(output_path.display().to_string());
    run_ffmpeg(&args).await
}

pub async fn trim_audio(
    input_path: &Path,
    output_path: &Path,
    max_seconds: f64,
    codec: &str,
    quality: Option<u32>,
    bitrate: Option<&str>,
) -> Result<(), PipelineError> {
    let mut args = vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        input_path.display().to_string(),
        "-t".to_string(),
        format!("{:.3}", max_seconds),
    ];
    args.extend(audio_codec_args(codec, quality, bitrate));
    args.push(output_path.display().to_string());
    run_ffmpeg(&args).await
}

pub async fn generate_color_image(
    output_path: &Path,
    resolution: &str,
    color: &str,
) -> Result<(), PipelineError> {
    let args = vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        format!("color=c={}:s={}", color, resolution),
        "-frames:v".to_string(),
        "1".to_string(),
        output_path.display().to_string(),
    ];
    run_ffmpeg(&args).await
}

/// Builds the zoompan + effect filter chain for an image-based loop.
/// The motion is periodic over the clip length so repeats join seamlessly.
pub fn loop_filter(visuals: &VisualsConfig, resolution: &str, fps: u32) -> String {
    let duration = visuals.loop_duration_seconds.max(1);
    let frames = (duration * fps).max(1);
    let cycle = frames.saturating_sub(1).max(1);
    let phase = format!("(2*PI*on/{cycle})");
    let phase2 = format!("(4*PI*on/{cycle})");

    let (zoom_mix, pan_x_mix, pan_y_mix) = match visuals.motion_style {
        MotionStyle::Cinematic => (
            format!("(0.7*sin({phase})+0.3*sin({phase2}+PI/3))"),
            format!("(0.8*sin({phase}+PI/6)+0.2*sin({phase2}))"),
            format!("(0.8*cos({phase}+PI/3)+0.2*cos({phase2}+PI/4))"),
        ),
        MotionStyle::Orbit => (
            format!("sin({phase})"),
            format!("sin({phase})"),
            format!("sin({phase}+PI/2)"),
        ),
        MotionStyle::Smooth => (
            format!("sin({phase})"),
            format!("sin({phase})"),
            format!("cos({phase})"),
        ),
    };

    let zoom = visuals.loop_zoom_amount;
    let pan = visuals.loop_pan_amount;
    let zoom_expr = format!("{}+{}*{}", 1.0 + zoom, zoom, zoom_mix);
    let pan_x_expr = format!("((iw-iw/zoom)/2)*{pan}*{pan_x_mix}");
    let pan_y_expr = format!("((ih-ih/zoom)/2)*{pan}*{pan_y_mix}");

    let mut filters = vec![
        format!("scale={resolution}"),
        format!(
            "zoompan=z='{zoom_expr}':x='(iw-iw/zoom)/2+{pan_x_expr}':y='(ih-ih/zoom)/2+{pan_y_expr}':d=1:s={resolution}:fps={fps}"
        ),
    ];

    let effects: Vec<String> = visuals
        .effects
        .iter()
        .map(|e| e.trim().to_ascii_lowercase())
        .collect();
    let has = |name: &str| effects.iter().any(|e| e == name);
    let period = (duration as f64).max(0.1);

    if has("sway") && visuals.sway_degrees > 0.0 {
        let radians = visuals.sway_degrees.to_radians();
        filters.push(format!(
            "rotate='{radians}*sin(2*PI*t/{period})':c=black@0:ow=iw:oh=ih"
        ));
    }
    if has("flicker") && visuals.flicker_amount > 0.0 {
        filters.push(format!(
            "eq=brightness='{}*sin(2*PI*t/{period})'",
            visuals.flicker_amount
        ));
    }
    if (has("color_drift") || has("hue")) && visuals.hue_degrees > 0.0 {
        filters.push(format!(
            "hue=h='{}*sin(2*PI*t/{period})'",
            visuals.hue_degrees
        ));
    }
    if has("vignette") {
        let angle = visuals
            .vignette_angle
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("PI/5");
        filters.push(format!("vignette=angle={angle}"));
    }

    filters.join(",")
}

pub async fn generate_loop_from_image(
    image_path: &Path,
    output_path: &Path,
    visuals: &VisualsConfig,
    resolution: &str,
    fps: u32,
) -> Result<(), PipelineError> {
    let filter = loop_filter(visuals, resolution, fps);
    let args = vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-loop".to_string(),
        "1".to_string(),
        "-i".to_string(),
        image_path.display().to_string(),
        "-t".to_string(),
        visuals.loop_duration_seconds.max(1).to_string(),
        "-vf".to_string(),
        filter,
        "-r".to_string(),
        fps.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        output_path.display().to_string(),
    ];
    run_ffmpeg(&args).await
}

pub fn escape_drawtext_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

pub async fn render_still_with_text(
    input_path: &Path,
    output_path: &Path,
    drawtext_filter: &str,
) -> Result<(), PipelineError> {
    let args = vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        input_path.display().to_string(),
        "-vf".to_string(),
        drawtext_filter.to_string(),
        "-frames:v".to_string(),
        "1".to_string(),
        output_path.display().to_string(),
    ];
    run_ffmpeg(&args).await
}

/// Loops the seed clip for exactly `duration_seconds`, muxing in the
/// assembled audio. `-stream_loop -1` with an explicit `-t` repeats the
/// seed and trims the tail, so video and audio lengths agree to within
/// one frame interval for any seed length.
#[allow(clippy::too_many_arguments)]
pub async fn render_video(
    loop_video_path: &Path,
    audio_path: &Path,
    output_path: &Path,
    resolution: &str,
    fps: u32,
    video_bitrate: &str,
    audio_bitrate: &str,
    duration_seconds: f64,
    drawtext_filter: Option<&str>,
) -> Result<(), PipelineError> {
    let mut filters = vec![format!("scale={resolution}")];
    if let Some(drawtext) = drawtext_filter {
        filters.push(drawtext.to_string());
    }

    let args = vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-stream_loop".to_string(),
        "-1".to_string(),
        "-i".to_string(),
        loop_video_path.display().to_string(),
        "-i".to_string(),
        audio_path.display().to_string(),
        "-vf".to_string(),
        filters.join(","),
        "-r".to_string(),
        fps.to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-b:v".to_string(),
        video_bitrate.to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        audio_bitrate.to_string(),
        "-shortest".to_string(),
        "-t".to_string(),
        format!("{:.3}", duration_seconds),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output_path.display().to_string(),
    ];
    run_ffmpeg(&args).await
}

fn escape_ffmetadata(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('=', "\\=")
        .replace(';', "\\;")
}

pub fn chapter_metadata_text(chapters: &[Chapter], total_seconds: f64) -> String {
    let mut lines = vec![";FFMETADATA1".to_string()];
    for (i, chapter) in chapters.iter().enumerate() {
        let start_ms = (chapter.start_seconds * 1000.0).round() as i64;
        let end_ms = match chapters.get(i + 1) {
            Some(next) => (next.start_seconds * 1000.0).round() as i64,
            None => (total_seconds * 1000.0).round() as i64,
        };
        let end_ms = end_ms.max(start_ms + 1);
        lines.push("[CHAPTER]".to_string());
        lines.push("TIMEBASE=1/1000".to_string());
        lines.push(format!("START={start_ms}"));
        lines.push(format!("END={end_ms}"));
        lines.push(format!("title={}", escape_ffmetadata(&chapter.title)));
    }
    lines.join("\n") + "\n"
}

pub async fn write_chapter_metadata(
    chapters: &[Chapter],
    total_seconds: f64,
    output_path: &Path,
) -> Result<(), PipelineError> {
    fs::write(output_path, chapter_metadata_text(chapters, total_seconds))
        .await
        .map_err(|e| PipelineError::media_tool(format!("failed to write chapter metadata: {e}")))
}

/// Remuxes the container with chapter metadata attached. Streams are
/// copied, not re-encoded.
pub async fn mux_chapters(
    input_video_path: &Path,
    metadata_path: &Path,
    output_path: &Path,
) -> Result<(), PipelineError> {
    let args = vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        input_video_path.display().to_string(),
        "-f".to_string(),
        "ffmetadata".to_string(),
        "-i".to_string(),
        metadata_path.display().to_string(),
        "-map".to_string(),
        "0".to_string(),
        "-map_metadata".to_string(),
        "1".to_string(),
        "-codec".to_string(),
        "copy".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output_path.display().to_string(),
    ];
    run_ffmpeg(&args).await
}

pub async fn check_ffmpeg() -> bool {
    match Command::new("ffmpeg").arg("-version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn concat_list_escapes_quotes() {
        let a = PathBuf::from("audio/one.mp3");
        let b = PathBuf::from("audio/it's here.mp3");
        let text = concat_list_text([a.as_path(), b.as_path()]);
        assert_eq!(
            text,
            "file 'audio/one.mp3'\nfile 'audio/it'\\''s here.mp3'\n"
        );
    }

    #[test]
    fn drawtext_escaping() {
        assert_eq!(escape_drawtext_value("a:b'c"), "a\\:b\\'c");
    }

    #[test]
    fn loop_filter_defaults_to_smooth_zoompan() {
        let visuals = VisualsConfig::default();
        let filter = loop_filter(&visuals, "1920x1080", 30);
        assert!(filter.starts_with("scale=1920x1080,zoompan="));
        // 5 s at 30 fps -> 149-frame cycle
        assert!(filter.contains("(2*PI*on/149)"));
        assert!(!filter.contains("rotate"));
    }

    #[test]
    fn loop_filter_applies_configured_effects() {
        let visuals = VisualsConfig {
            effects: vec![
                "sway".to_string(),
                "flicker".to_string(),
                "color_drift".to_string(),
                "vignette".to_string(),
            ],
            ..Default::default()
        };
        let filter = loop_filter(&visuals, "1280x720", 24);
        assert!(filter.contains("rotate="));
        assert!(filter.contains("eq=brightness="));
        assert!(filter.contains("hue=h="));
        assert!(filter.contains("vignette=angle=PI/5"));
    }

    #[test]
    fn chapter_metadata_is_contiguous() {
        let chapters = vec![
            Chapter {
                title: "First Track".to_string(),
                start_seconds: 0.0,
            },
            Chapter {
                title: "Second = Track".to_string(),
                start_seconds: 125.5,
            },
        ];
        let text = chapter_metadata_text(&chapters, 300.0);
        assert!(text.starts_with(";FFMETADATA1\n"));
        assert!(text.contains("START=0\nEND=125500\ntitle=First Track"));
        assert!(text.contains("START=125500\nEND=300000\ntitle=Second \\= Track"));
    }
}
