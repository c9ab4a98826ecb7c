use crate::config::Config;
use crate::error::PipelineError;
use crate::pipeline;
use chrono::{Local, NaiveDateTime, TimeDelta};
use tracing::{error, info};

pub fn parse_daily_time(value: &str) -> Result<(u32, u32), PipelineError> {
    let mut parts = value.splitn(2, ':');
    let hour = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .filter(|h| *h < 24);
    let minute = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .filter(|m| *m < 60);
    match (hour, minute) {
        (Some(h), Some(m)) => Ok((h, m)),
        _ => Err(PipelineError::configuration(format!(
            "schedule.daily_time must be HH:MM, got {value}"
        ))),
    }
}

/// Next wall-clock occurrence of `hour:minute` strictly after `now`.
pub fn next_occurrence(now: NaiveDateTime, hour: u32, minute: u32) -> NaiveDateTime {
    let today = now.date().and_hms_opt(hour, minute, 0).unwrap_or(now);
    if today > now {
        today
    } else {
        today + TimeDelta::days(1)
    }
}

/// Blocks until the daily trigger, runs the pipeline once, repeats. A
/// failed run is logged and the scheduler waits for the next trigger;
/// runs never overlap because each is awaited to completion.
pub async fn run_daily(config: &Config) {
    let (hour, minute) = match parse_daily_time(&config.schedule.daily_time) {
        Ok(parsed) => parsed,
        Err(err) => {
            error!("{err}");
            return;
        }
    };

    loop {
        let now = Local::now().naive_local();
        let next = next_occurrence(now, hour, minute);
        let wait = (next - now).to_std().unwrap_or_default();
        info!("next run at {next} ({} min from now)", wait.as_secs() / 60);
        tokio::time::sleep(wait).await;

        match pipeline::run_once(config, None, false).await {
            Ok(result) => info!(
                "scheduled run complete: {} ({:.1} min, published: {})",
                result.video_path.display(),
                result.duration_seconds / 60.0,
                result.published
            ),
            Err(err) => error!("scheduled run failed: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn parses_well_formed_times() {
        assert_eq!(parse_daily_time("03:00").unwrap(), (3, 0));
        assert_eq!(parse_daily_time("23:59").unwrap(), (23, 59));
    }

    #[test]
    fn rejects_malformed_times() {
        assert!(parse_daily_time("24:00").is_err());
        assert!(parse_daily_time("3pm").is_err());
        assert!(parse_daily_time("12").is_err());
    }

    #[test]
    fn next_occurrence_is_later_today_when_still_ahead() {
        let next = next_occurrence(at(1, 30, 0), 3, 0);
        assert_eq!(next, at(3, 0, 0));
    }

    #[test]
    fn next_occurrence_rolls_to_tomorrow_once_passed() {
        let next = next_occurrence(at(3, 0, 0), 3, 0);
        assert_eq!(
            next,
            NaiveDate::from_ymd_opt(2025, 6, 2)
                .unwrap()
                .and_hms_opt(3, 0, 0)
                .unwrap()
        );
        let next = next_occurrence(at(12, 45, 10), 3, 0);
        assert_eq!(next.date(), NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
    }
}
