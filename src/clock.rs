//! Human readable local timestamps.

use chrono::{DateTime, Local, TimeDelta};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %I:%M:%S %p";

pub type Timestamp = DateTime<Local>;

pub fn now() -> Timestamp {
    Local::now()
}

/// Current local time shifted `offset_minutes` into the future
pub fn now_plus_minutes(offset_minutes: i64) -> Timestamp {
    now() + TimeDelta::minutes(offset_minutes)
}

/// Format as `YYYY-MM-DD hh:mm:ss AM`
pub fn format(timestamp: &Timestamp) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_afternoon_in_twelve_hour_clock() {
        let timestamp = Local.with_ymd_and_hms(2024, 3, 7, 15, 4, 5).unwrap();
        assert_eq!(format(&timestamp), "2024-03-07 03:04:05 PM");
    }

    #[test]
    fn formats_midnight_as_twelve_am() {
        let timestamp = Local.with_ymd_and_hms(2024, 12, 31, 0, 0, 9).unwrap();
        assert_eq!(format(&timestamp), "2024-12-31 12:00:09 AM");
    }

    #[test]
    fn offset_moves_into_the_future() {
        let before = now();
        let later = now_plus_minutes(10);
        assert!(later - before >= TimeDelta::minutes(10));
    }
}
