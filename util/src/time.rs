//! General time utility functions

use std::time::Instant;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Milliseconds elapsed since `start`, wrapping like a microcontroller tick counter.
///
/// Consumers must compare these timestamps with `wrapping_sub`.
pub fn millis_since(start: Instant) -> u32 {
    (start.elapsed().as_millis() & u32::MAX as u128) as u32
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_to_seconds() {
        assert_eq!(
            duration_to_seconds(chrono::Duration::milliseconds(1500)),
            Some(1.5)
        );
        assert_eq!(duration_to_seconds(chrono::Duration::max_value()), None);
    }

    #[test]
    fn test_millis_since_starts_near_zero() {
        let start = Instant::now();
        assert!(millis_since(start) < 1000);
    }
}
