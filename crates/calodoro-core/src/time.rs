//! Time helpers.
//!
//! [`TimeWindow`] describes calendar query ranges and [`format_clock`]
//! renders timer values the way the menu bar shows them.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A time window for querying calendar events.
///
/// Represents a half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window.
    ///
    /// Returns `None` if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Creates a time window for a single calendar day in the given timezone.
    ///
    /// The day runs from local midnight to the next local midnight, so it is
    /// 23 or 25 hours long across DST changes. Returns `None` when midnight
    /// does not exist in `tz` on either boundary.
    pub fn for_date<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<Self> {
        let start = local_midnight(date, tz)?;
        let end = local_midnight(date.succ_opt()?, tz)?;
        Some(Self { start, end })
    }

    /// Returns the duration of this time window.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Checks if a datetime falls within this window.
    ///
    /// Uses half-open interval semantics: `[start, end)`.
    pub fn contains(&self, dt: DateTime<Utc>) -> bool {
        self.start <= dt && dt < self.end
    }
}

fn local_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<DateTime<Utc>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Formats a number of seconds as a positional clock.
///
/// Uses `MM:SS` below one hour and `HH:MM:SS` from one hour on.
pub fn format_clock(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_rejects_inverted_bounds() {
        assert!(TimeWindow::new(utc(2024, 1, 10, 10, 0, 0), utc(2024, 1, 10, 9, 0, 0)).is_none());
        assert!(TimeWindow::new(utc(2024, 1, 10, 9, 0, 0), utc(2024, 1, 10, 9, 0, 0)).is_some());
    }

    #[test]
    fn window_for_date_in_utc() {
        let window = TimeWindow::for_date(date(2024, 1, 10), &Utc).unwrap();
        assert_eq!(window.start, utc(2024, 1, 10, 0, 0, 0));
        assert_eq!(window.end, utc(2024, 1, 11, 0, 0, 0));
        assert_eq!(window.duration(), Duration::days(1));
    }

    #[test]
    fn window_for_date_with_offset() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let window = TimeWindow::for_date(date(2024, 1, 10), &tz).unwrap();
        assert_eq!(window.start, utc(2024, 1, 9, 22, 0, 0));
        assert_eq!(window.end, utc(2024, 1, 10, 22, 0, 0));
    }

    #[test]
    fn window_is_half_open() {
        let window = TimeWindow::for_date(date(2024, 1, 10), &Utc).unwrap();
        assert!(window.contains(utc(2024, 1, 10, 0, 0, 0)));
        assert!(window.contains(utc(2024, 1, 10, 23, 59, 59)));
        assert!(!window.contains(utc(2024, 1, 11, 0, 0, 0)));
    }

    #[test]
    fn clock_minutes_and_seconds() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(65), "01:05");
        assert_eq!(format_clock(25 * 60), "25:00");
    }

    #[test]
    fn clock_hours_when_needed() {
        assert_eq!(format_clock(3661), "01:01:01");
        insta::assert_snapshot!(format_clock(36_000 + 59), @"10:00:59");
    }
}
