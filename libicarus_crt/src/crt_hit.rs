use serde::{Deserialize, Serialize};

use super::constants::{TIMESTAMP_ROLLOVER_NS, TIME_ROLLOVER_US};
use super::vector::Vector3;

/// Which CRT clock domain is used to time a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampMode {
    /// Absolute ts0 (PPS referenced), normalised against the trigger timestamp
    #[default]
    Ts0,
    /// ts1, already relative to the trigger
    Ts1,
}

/// A reconstructed CRT hit.
///
/// `position_err` holds the half-widths of the hit along each axis; the
/// smallest of the three is taken as the tagger plane normal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CrtHit {
    pub position: Vector3,
    pub position_err: Vector3,
    /// Total photoelectrons
    pub pe: f64,
    /// Absolute time (ns)
    pub ts0_ns: u64,
    /// Time relative to the trigger (ns)
    pub ts1_ns: i64,
    /// Name of the tagger plane, informational only
    #[serde(default)]
    pub tagger: String,
}

impl CrtHit {
    /// Time of the hit relative to the trigger (us)
    pub fn time(&self, trigger_timestamp: u64, mode: TimestampMode) -> f64 {
        match mode {
            TimestampMode::Ts1 => self.ts1_ns as f64 * 1e-3,
            TimestampMode::Ts0 => {
                let trigger_ns = (trigger_timestamp % TIMESTAMP_ROLLOVER_NS) as i64;
                let diff = self.ts0_ns as i64 - trigger_ns;
                wrap_time(diff as f64 / 1e3)
            }
        }
    }

    /// Raw time of the hit in its own clock domain (us)
    pub fn absolute_time(&self, mode: TimestampMode, correction: f64) -> f64 {
        match mode {
            TimestampMode::Ts1 => self.ts1_ns as f64 * 1e-3,
            TimestampMode::Ts0 => self.ts0_ns as f64 * 1e-3 + correction,
        }
    }
}

/// Fold a time difference (us) back into half a rollover period around zero
pub fn wrap_time(time: f64) -> f64 {
    if time < -0.5 * TIME_ROLLOVER_US {
        time + TIME_ROLLOVER_US
    } else if time > 0.5 * TIME_ROLLOVER_US {
        time - TIME_ROLLOVER_US
    } else {
        time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraparound() {
        assert!((wrap_time(0.6e6) - (-0.4e6)).abs() < 1e-6);
        assert!((wrap_time(-0.6e6) - 0.4e6).abs() < 1e-6);
        assert_eq!(wrap_time(1234.5), 1234.5);
    }

    #[test]
    fn test_hit_time_relative_to_trigger() {
        let trigger: u64 = 1_700_000_000_250_000_000; // .25 s past the second
        let mut hit = CrtHit {
            ts0_ns: 250_001_500,
            ts1_ns: -2_500,
            ..Default::default()
        };
        assert!((hit.time(trigger, TimestampMode::Ts0) - 1.5).abs() < 1e-9);
        assert!((hit.time(trigger, TimestampMode::Ts1) - (-2.5)).abs() < 1e-9);

        // Hit just after the PPS, trigger just before: crosses the second boundary
        hit.ts0_ns = 100_000;
        let trigger: u64 = 5_999_900_000;
        assert!((hit.time(trigger, TimestampMode::Ts0) - 200.0).abs() < 1e-6);
    }
}
