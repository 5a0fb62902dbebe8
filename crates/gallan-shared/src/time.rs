//! Display-time formatting for chat summaries.

use chrono::{DateTime, Utc};

/// Clock time shown next to the last message in a chat list, e.g. `9:05 PM`.
pub fn format_message_time(at: DateTime<Utc>) -> String {
    at.format("%-I:%M %p").to_string()
}

/// Last-seen stamp for a chat counterpart, e.g. `2024-03-01T21:05:00`.
pub fn format_last_seen(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn message_time_uses_twelve_hour_clock() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 21, 5, 9).unwrap();
        assert_eq!(format_message_time(at), "9:05 PM");

        let midnight = Utc.with_ymd_and_hms(2024, 3, 1, 0, 30, 0).unwrap();
        assert_eq!(format_message_time(midnight), "12:30 AM");
    }

    #[test]
    fn last_seen_drops_subseconds() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 21, 5, 9).unwrap();
        assert_eq!(format_last_seen(at), "2024-03-01T21:05:09");
    }
}
