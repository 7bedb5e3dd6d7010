//! Time helpers for message timestamps.

use chrono::{DateTime, Utc};

/// Current UTC time, taken once per inbound message at generation.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for the outbound frame as `YYYY/MM/DD HH:MM:SS`.
pub fn format_wall_clock(at: DateTime<Utc>) -> String {
    at.format("%Y/%m/%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_wall_clock_pads_components() {
        // given:
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        // when:
        let formatted = format_wall_clock(at);

        // then:
        assert_eq!(formatted, "2024/01/02 03:04:05");
    }

    #[test]
    fn test_now_utc_is_monotonic_enough_for_ordering() {
        // given / when:
        let first = now_utc();
        let second = now_utc();

        // then:
        assert!(second >= first);
    }
}
