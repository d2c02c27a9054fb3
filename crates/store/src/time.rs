//! Timestamp formatting.
//!
//! All timestamps are stored as fixed-width UTC TEXT so that lexicographic
//! ordering matches chronological ordering.

use chrono::{DateTime, Utc};

/// Storage format: `2026-08-26T12:00:00.000000Z`.
const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Format a UTC instant for storage.
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.format(FORMAT).to_string()
}

/// The current instant, formatted for storage.
pub fn now() -> String {
    format_timestamp(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_is_fixed_width() {
        let a = Utc.with_ymd_and_hms(2026, 8, 26, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 8, 26, 23, 59, 59).unwrap();
        assert_eq!(format_timestamp(a).len(), format_timestamp(b).len());
        assert!(format_timestamp(a) < format_timestamp(b));
    }

    #[test]
    fn test_lexicographic_matches_chronological() {
        let earlier = Utc.with_ymd_and_hms(2026, 8, 25, 23, 59, 59).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 8, 26, 0, 0, 0).unwrap();
        assert!(format_timestamp(earlier) < format_timestamp(later));
    }
}
