//! Wall-clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

const MS_PER_HOUR: u128 = 3_600_000;

/// Milliseconds since the Unix epoch. Returns 0 if the system clock is set before the epoch.
#[must_use]
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// UTC hour of day (0-23) for a millisecond timestamp.
#[must_use]
pub fn hour_of_day(ms: u128) -> u8 {
    // always < 24
    u8::try_from((ms / MS_PER_HOUR) % 24).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hour_of_day() {
        assert_eq!(hour_of_day(0), 0);
        assert_eq!(hour_of_day(MS_PER_HOUR * 14 + 59_000), 14);
        assert_eq!(hour_of_day(MS_PER_HOUR * 24 * 3 + MS_PER_HOUR * 23), 23);
    }

    #[test]
    fn test_now_ms_advances() {
        let a = now_ms();
        let b = now_ms();
        assert!(a > 0);
        assert!(b >= a);
    }
}
