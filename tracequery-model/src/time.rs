//! Conversions between [`SystemTime`] and the integer epoch units used on
//! the wire: microseconds for the trace dialect, milliseconds for the
//! dependency and metrics dialects.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Microseconds since the Unix epoch. Times before the epoch clamp to 0.
pub fn to_epoch_micros(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// The instant `micros` microseconds after the Unix epoch.
pub fn from_epoch_micros(micros: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_micros(micros)
}

/// Milliseconds since the Unix epoch. Times before the epoch clamp to 0.
pub fn to_epoch_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The instant `millis` milliseconds after the Unix epoch.
pub fn from_epoch_millis(millis: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn micros_round_trip() {
        for micros in [0u64, 1, 1_000_000, 1_476_374_248_550_000] {
            assert_eq!(to_epoch_micros(from_epoch_micros(micros)), micros);
        }
    }

    #[test]
    fn pre_epoch_clamps_to_zero() {
        let before = UNIX_EPOCH - Duration::from_secs(1);
        assert_eq!(to_epoch_micros(before), 0);
        assert_eq!(to_epoch_millis(before), 0);
    }
}
