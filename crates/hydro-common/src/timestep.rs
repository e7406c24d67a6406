//! Time-step records and publication watermarks.

use serde::{Deserialize, Serialize};

/// One position along a store's time dimension.
///
/// `observation_time` is the day the values describe, `update_time` the day
/// they were last (re)computed upstream. The two are independent: a
/// reanalysis can give an old observation a fresh update time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeStep {
    /// Position along the time dimension (storage order).
    pub index: usize,
    /// Observation time, in day counts.
    pub observation_time: f64,
    /// Last update time, in day counts.
    pub update_time: f64,
}

impl TimeStep {
    pub fn new(index: usize, observation_time: f64, update_time: f64) -> Self {
        Self {
            index,
            observation_time,
            update_time,
        }
    }
}

/// Per-dataset high-water mark of what has been published.
///
/// Only `last_update_time_without_errors` gates change detection;
/// `last_update_time_seen` records how far the last run scanned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    pub last_update_time_seen: f64,
    pub last_update_time_without_errors: f64,
}

impl Default for Watermark {
    fn default() -> Self {
        Self::EPOCH
    }
}

impl Watermark {
    /// State of a dataset that has never been published.
    pub const EPOCH: Watermark = Watermark {
        last_update_time_seen: 0.0,
        last_update_time_without_errors: 0.0,
    };

    pub fn new(last_update_time_seen: f64, last_update_time_without_errors: f64) -> Self {
        Self {
            last_update_time_seen,
            last_update_time_without_errors,
        }
    }

    /// `last_update_time_without_errors <= last_update_time_seen`.
    ///
    /// Upstream recomputation can produce update times later than every
    /// observation time in a run, so this can legitimately be false; callers
    /// report it rather than reject the watermark.
    pub fn is_ordered(&self) -> bool {
        self.last_update_time_without_errors <= self.last_update_time_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_default() {
        let wm = Watermark::default();
        assert_eq!(wm, Watermark::EPOCH);
        assert!(wm.is_ordered());
    }

    #[test]
    fn test_ordering_check() {
        assert!(Watermark::new(30.0, 20.0).is_ordered());
        assert!(!Watermark::new(20.0, 30.0).is_ordered());
    }

    #[test]
    fn test_time_step_serializes() {
        let step = TimeStep::new(3, 25963.0, 25964.5);
        let json = serde_json::to_string(&step).unwrap();
        assert!(json.contains("\"index\":3"));
        let back: TimeStep = serde_json::from_str(&json).unwrap();
        assert_eq!(back, step);
    }
}
