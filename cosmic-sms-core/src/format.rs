//! Relative Time Formatter
//!
//! Renders message timestamps for the conversation list and the thread feed.
//!
//! Rules, checked in order against "now":
//!
//! 1. same calendar day: time of day, `3:45 PM`
//! 2. same calendar week: abbreviated weekday, `Tue`
//! 3. otherwise: abbreviated month and day, `Mar 4`
//!
//! "Same week" compares calendar weeks, not a rolling seven days. With
//! Monday-start weeks a Saturday message seen on the following Monday is
//! two days old but renders as a date.
//!
//! Formatting never fails. A timestamp that cannot be placed on the
//! calendar renders as [`FORMAT_FALLBACK`].

use chrono::{DateTime, Datelike, Days, Local, NaiveDate, TimeZone, Utc, Weekday};
use std::fmt::Display;
use tracing::debug;

/// Placeholder for timestamps that cannot be rendered
pub const FORMAT_FALLBACK: &str = "Unknown";

/// Current time in milliseconds since epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Formats timestamps relative to a reference time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelativeTimeFormatter {
    week_start: Weekday,
}

impl Default for RelativeTimeFormatter {
    fn default() -> Self {
        Self {
            week_start: Weekday::Mon,
        }
    }
}

impl RelativeTimeFormatter {
    /// Create a formatter whose calendar weeks begin on `week_start`
    pub fn new(week_start: Weekday) -> Self {
        Self { week_start }
    }

    pub fn week_start(&self) -> Weekday {
        self.week_start
    }

    /// Format in the local time zone
    pub fn format(&self, timestamp_millis: i64, now_millis: i64) -> String {
        self.format_in(timestamp_millis, now_millis, &Local)
    }

    /// Format in an explicit time zone
    pub fn format_in<Tz>(&self, timestamp_millis: i64, now_millis: i64, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let (Some(timestamp), Some(now)) = (
            to_datetime(timestamp_millis, tz),
            to_datetime(now_millis, tz),
        ) else {
            debug!(
                "Cannot format timestamp {} relative to {}",
                timestamp_millis, now_millis
            );
            return FORMAT_FALLBACK.to_string();
        };

        let date = timestamp.date_naive();
        let today = now.date_naive();

        if date == today {
            timestamp.format("%-I:%M %p").to_string()
        } else if self.same_week(date, today) {
            timestamp.format("%a").to_string()
        } else {
            timestamp.format("%b %-d").to_string()
        }
    }

    fn same_week(&self, a: NaiveDate, b: NaiveDate) -> bool {
        match (self.first_day_of_week(a), self.first_day_of_week(b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    fn first_day_of_week(&self, date: NaiveDate) -> Option<NaiveDate> {
        let offset = (7 + date.weekday().num_days_from_monday()
            - self.week_start.num_days_from_monday())
            % 7;
        date.checked_sub_days(Days::new(u64::from(offset)))
    }
}

fn to_datetime<Tz: TimeZone>(timestamp_millis: i64, tz: &Tz) -> Option<DateTime<Tz>> {
    tz.timestamp_millis_opt(timestamp_millis).single()
}

/// Format `timestamp_millis` relative to `now_millis` in the local time zone
pub fn format_relative(timestamp_millis: i64, now_millis: i64) -> String {
    RelativeTimeFormatter::default().format(timestamp_millis, now_millis)
}

/// Format `timestamp_millis` relative to `now_millis` in `tz`
pub fn format_relative_in<Tz>(timestamp_millis: i64, now_millis: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    RelativeTimeFormatter::default().format_in(timestamp_millis, now_millis, tz)
}

/// Clock time of a single message in the thread feed, e.g. `9:05 AM`
pub fn format_message_time(timestamp_millis: i64) -> String {
    format_message_time_in(timestamp_millis, &Local)
}

/// Clock time of a single message in `tz`
pub fn format_message_time_in<Tz>(timestamp_millis: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match to_datetime(timestamp_millis, tz) {
        Some(timestamp) => timestamp.format("%-I:%M %p").to_string(),
        None => FORMAT_FALLBACK.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).unwrap()
    }

    fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> i64 {
        tz().with_ymd_and_hms(year, month, day, hour, minute, 0)
            .unwrap()
            .timestamp_millis()
    }

    #[test]
    fn test_same_day_renders_time_of_day() {
        let now = at(2024, 3, 4, 15, 0);
        assert_eq!(format_relative_in(at(2024, 3, 4, 9, 0), now, &tz()), "9:00 AM");
        assert_eq!(format_relative_in(at(2024, 3, 4, 15, 45), now, &tz()), "3:45 PM");
    }

    #[test]
    fn test_same_week_renders_weekday() {
        // Thursday 2024-03-07; Tuesday is two days earlier in the same week
        let now = at(2024, 3, 7, 15, 0);
        assert_eq!(format_relative_in(at(2024, 3, 5, 12, 0), now, &tz()), "Tue");
    }

    #[test]
    fn test_older_renders_month_and_day() {
        let now = at(2024, 3, 14, 15, 0);
        assert_eq!(format_relative_in(at(2024, 3, 4, 15, 0), now, &tz()), "Mar 4");
    }

    #[test]
    fn test_week_boundary_uses_calendar_weeks() {
        // Monday 2024-03-04; Saturday 2024-03-02 belongs to the previous week
        let now = at(2024, 3, 4, 15, 0);
        assert_eq!(format_relative_in(at(2024, 3, 2, 15, 0), now, &tz()), "Mar 2");

        // With Saturday-start weeks the same two days share a week
        let formatter = RelativeTimeFormatter::new(Weekday::Sat);
        assert_eq!(formatter.format_in(at(2024, 3, 2, 15, 0), now, &tz()), "Sat");
    }

    #[test]
    fn test_sunday_start_week() {
        let formatter = RelativeTimeFormatter::new(Weekday::Sun);
        // Sunday 2024-03-03 and Monday 2024-03-04 share a Sunday-start week
        let now = at(2024, 3, 4, 15, 0);
        assert_eq!(formatter.format_in(at(2024, 3, 3, 10, 0), now, &tz()), "Sun");
    }

    #[test]
    fn test_day_is_judged_in_given_zone() {
        // 23:30 UTC on the 3rd is 01:30 on the 4th at UTC+2
        let now = at(2024, 3, 4, 15, 0);
        let late = Utc
            .with_ymd_and_hms(2024, 3, 3, 23, 30, 0)
            .unwrap()
            .timestamp_millis();
        assert_eq!(format_relative_in(late, now, &tz()), "1:30 AM");
    }

    #[test]
    fn test_out_of_range_falls_back() {
        let now = at(2024, 3, 4, 15, 0);
        assert_eq!(format_relative_in(i64::MAX, now, &tz()), FORMAT_FALLBACK);
        assert_eq!(format_relative_in(now, i64::MIN, &tz()), FORMAT_FALLBACK);
        assert_eq!(format_message_time_in(i64::MAX, &tz()), FORMAT_FALLBACK);
    }

    #[test]
    fn test_message_time() {
        assert_eq!(format_message_time_in(at(2024, 3, 4, 21, 7), &tz()), "9:07 PM");
    }

    #[test]
    fn test_local_formatting_does_not_panic() {
        let now = now_millis();
        assert!(!format_relative(now, now).is_empty());
        assert!(!format_message_time(now).is_empty());
    }
}
