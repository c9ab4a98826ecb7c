use crate::error::PipelineError;
use crate::source::AudioClip;

/// Acceptable total-duration band for one published mix, in seconds.
/// `min_seconds == 0` means a single pass with no repetition; a `max`
/// without a `min` only bounds the assembled prefix (test mode).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetBand {
    pub min_seconds: f64,
    pub max_seconds: Option<f64>,
}

impl TargetBand {
    pub fn new(min_seconds: f64, max_seconds: Option<f64>) -> Self {
        Self {
            min_seconds,
            max_seconds,
        }
    }

    /// Test-mode band: `[0, cap]`. A zero or missing cap means one full
    /// pass with no upper bound.
    pub fn test_cap(cap_minutes: Option<f64>) -> Self {
        let max = cap_minutes.filter(|m| *m > 0.0).map(|m| m * 60.0);
        Self {
            min_seconds: 0.0,
            max_seconds: max,
        }
    }

    pub fn single_pass() -> Self {
        Self {
            min_seconds: 0.0,
            max_seconds: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Playlist {
    pub entries: Vec<AudioClip>,
    pub total_seconds: f64,
    /// How many complete passes over the source set the playlist contains.
    pub passes: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub title: String,
    pub start_seconds: f64,
}

/// Orders and repeats clips until the total duration reaches the band.
///
/// Clips are never split: whole passes of the source sequence are
/// appended, then a prefix of it, until the minimum is reached. If a
/// single clip already exceeds the maximum the overshoot is accepted.
/// With `min == 0` a single pass is taken; a configured max then stops
/// the pass before it would be exceeded (always keeping at least one
/// clip) and the mux step enforces the cap exactly.
pub fn assemble(clips: &[AudioClip], band: TargetBand) -> Result<Playlist, PipelineError> {
    if clips.is_empty() {
        return Err(PipelineError::configuration("no audio available"));
    }

    let mut entries: Vec<AudioClip> = Vec::new();
    let mut total = 0.0;

    if band.min_seconds > 0.0 {
        let mut index = 0usize;
        while total < band.min_seconds {
            let clip = &clips[index % clips.len()];
            entries.push(clip.clone());
            total += clip.duration_seconds;
            index += 1;
        }
    } else {
        for clip in clips {
            if let Some(max) = band.max_seconds {
                if !entries.is_empty() && total + clip.duration_seconds > max {
                    break;
                }
            }
            entries.push(clip.clone());
            total += clip.duration_seconds;
        }
    }

    let passes = entries.len() / clips.len();
    Ok(Playlist {
        entries,
        total_seconds: total,
        passes,
    })
}

/// One chapter per playlist entry, at the entry's cumulative offset.
/// Starts are strictly increasing and the first is always 0.
pub fn chapters(playlist: &Playlist) -> Vec<Chapter> {
    let mut out = Vec::with_capacity(playlist.entries.len());
    let mut start = 0.0;
    for clip in &playlist.entries {
        out.push(Chapter {
            title: clip.title(),
            start_seconds: start,
        });
        start += clip.duration_seconds;
    }
    out
}

pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{}:{:02}:{:02}", hours, minutes, secs)
}

/// Renders the chapter list as a timestamped tracklist for the video
/// description.
pub fn tracklist_text(chapters: &[Chapter]) -> String {
    let mut out = String::new();
    for chapter in chapters {
        out.push_str(&format!(
            "{} {}\n",
            format_timestamp(chapter.start_seconds),
            chapter.title
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn clip(name: &str, index: usize, minutes: f64) -> AudioClip {
        AudioClip {
            path: PathBuf::from(format!("{name}.mp3")),
            duration_seconds: minutes * 60.0,
            index,
        }
    }

    fn five_forty_minute_clips() -> Vec<AudioClip> {
        (0..5)
            .map(|i| clip(&format!("track_{i}"), i, 40.0))
            .collect()
    }

    #[test]
    fn empty_clip_set_is_a_configuration_error() {
        let err = assemble(&[], TargetBand::new(60.0, None)).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn repeats_whole_passes_then_prefix_to_reach_band() {
        // 5 clips x 40 min = 200 min per pass; band [480, 540] min.
        // Two passes (400) plus two more clips (80) lands on 480 exactly.
        let clips = five_forty_minute_clips();
        let band = TargetBand::new(480.0 * 60.0, Some(540.0 * 60.0));
        let playlist = assemble(&clips, band).unwrap();
        assert_eq!(playlist.entries.len(), 12);
        assert_eq!(playlist.total_seconds, 480.0 * 60.0);
        assert_eq!(playlist.passes, 2);
        assert_eq!(playlist.entries[10].index, 0);
        assert_eq!(playlist.entries[11].index, 1);
    }

    #[test]
    fn never_splits_a_clip_to_fit() {
        // 3 x 50 min, min 120 min: two clips reach 100, a third whole
        // clip is appended for 150 even though 120 sits mid-clip.
        let clips: Vec<_> = (0..3).map(|i| clip(&format!("c{i}"), i, 50.0)).collect();
        let playlist = assemble(&clips, TargetBand::new(120.0 * 60.0, None)).unwrap();
        assert_eq!(playlist.entries.len(), 3);
        assert_eq!(playlist.total_seconds, 150.0 * 60.0);
    }

    #[test]
    fn single_overlong_clip_overshoots_the_band() {
        let clips = vec![clip("marathon", 0, 10.0 * 60.0)];
        let band = TargetBand::new(8.0 * 3600.0, Some(9.0 * 3600.0));
        let playlist = assemble(&clips, band).unwrap();
        assert_eq!(playlist.entries.len(), 1);
        assert_eq!(playlist.total_seconds, 10.0 * 3600.0);
    }

    #[test]
    fn zero_min_takes_one_full_pass() {
        let clips = five_forty_minute_clips();
        let playlist = assemble(&clips, TargetBand::single_pass()).unwrap();
        assert_eq!(playlist.entries.len(), 5);
        assert_eq!(playlist.passes, 1);
        assert_eq!(playlist.total_seconds, 200.0 * 60.0);
    }

    #[test]
    fn test_cap_stops_the_pass_before_exceeding() {
        let clips: Vec<_> = (0..5).map(|i| clip(&format!("c{i}"), i, 3.0)).collect();
        let playlist = assemble(&clips, TargetBand::test_cap(Some(10.0))).unwrap();
        assert_eq!(playlist.entries.len(), 3);
        assert_eq!(playlist.total_seconds, 9.0 * 60.0);
        assert_eq!(playlist.passes, 0);
    }

    #[test]
    fn test_cap_keeps_at_least_one_clip() {
        // Every clip is longer than the cap; the first is kept and the
        // mux step trims the container to the cap.
        let clips = five_forty_minute_clips();
        let playlist = assemble(&clips, TargetBand::test_cap(Some(10.0))).unwrap();
        assert_eq!(playlist.entries.len(), 1);
    }

    #[test]
    fn zero_cap_means_one_full_pass_unbounded() {
        let clips = five_forty_minute_clips();
        let playlist = assemble(&clips, TargetBand::test_cap(Some(0.0))).unwrap();
        assert_eq!(playlist.entries.len(), 5);
        let playlist = assemble(&clips, TargetBand::test_cap(None)).unwrap();
        assert_eq!(playlist.entries.len(), 5);
    }

    #[test]
    fn chapters_start_at_zero_and_strictly_increase() {
        let clips = five_forty_minute_clips();
        let band = TargetBand::new(480.0 * 60.0, Some(540.0 * 60.0));
        let playlist = assemble(&clips, band).unwrap();
        let chapters = chapters(&playlist);
        assert_eq!(chapters.len(), playlist.entries.len());
        assert_eq!(chapters[0].start_seconds, 0.0);
        for pair in chapters.windows(2) {
            assert!(pair[1].start_seconds > pair[0].start_seconds);
        }
    }

    #[test]
    fn timestamps_format_as_h_mm_ss() {
        assert_eq!(format_timestamp(0.0), "0:00:00");
        assert_eq!(format_timestamp(61.2), "0:01:01");
        assert_eq!(format_timestamp(2.0 * 3600.0 + 40.0 * 60.0), "2:40:00");
    }

    #[test]
    fn tracklist_lines_carry_titles_and_offsets() {
        let clips: Vec<_> = (0..2).map(|i| clip(&format!("song_{i}"), i, 40.0)).collect();
        let playlist = assemble(&clips, TargetBand::single_pass()).unwrap();
        let text = tracklist_text(&chapters(&playlist));
        assert_eq!(text, "0:00:00 song_0\n0:40:00 song_1\n");
    }
}
