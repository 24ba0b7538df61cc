//! General time utility functions

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Convert a unix timestamp into floating point seconds since the epoch.
pub fn timestamp_seconds(datetime: &chrono::DateTime<chrono::Utc>) -> f64 {
    datetime.timestamp() as f64
        + datetime.timestamp_subsec_nanos() as f64 / NANOS_PER_SECOND as f64
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_duration_to_seconds() {
        assert_eq!(
            duration_to_seconds(chrono::Duration::milliseconds(1500)),
            Some(1.5)
        );
        assert_eq!(duration_to_seconds(chrono::Duration::max_value()), None);
    }

    #[test]
    fn test_timestamp_seconds() {
        let dt = chrono::Utc.timestamp(1_700_000_000, 250_000_000);
        assert_eq!(timestamp_seconds(&dt), 1_700_000_000.25);
    }
}
