//! Day-count calendar used by the simulation stores.
//!
//! Stores encode time as fractional days since a fixed epoch (CNES Julian
//! days: day 0 is 1950-01-01T00:00:00Z). The conversion keeps microsecond
//! precision so that `to_day_count(to_calendar(d)) == d` for every day count
//! representable at that resolution.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const MICROS_PER_DAY: f64 = 86_400_000_000.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Days from 1950-01-01 to the Unix epoch.
const CNES_DAYS_BEFORE_UNIX_EPOCH: i64 = 7305;

/// Result type for calendar conversions.
pub type CalendarResult<T> = Result<T, CalendarError>;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CalendarError {
    #[error("Day count is not a finite number: {0}")]
    NotFinite(f64),

    #[error("Day count {0} is outside the supported calendar range")]
    OutOfRange(f64),
}

/// Bidirectional conversion between day counts and calendar timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    epoch: DateTime<Utc>,
}

impl Default for Calendar {
    fn default() -> Self {
        Self::cnes()
    }
}

impl Calendar {
    /// Calendar anchored at an arbitrary epoch.
    pub fn new(epoch: DateTime<Utc>) -> Self {
        Self { epoch }
    }

    /// CNES Julian day calendar (day 0 = 1950-01-01 00:00 UTC).
    pub fn cnes() -> Self {
        Self {
            epoch: DateTime::<Utc>::UNIX_EPOCH - Duration::days(CNES_DAYS_BEFORE_UNIX_EPOCH),
        }
    }

    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    /// Convert a day count to a calendar timestamp at microsecond precision.
    pub fn to_calendar(&self, day_count: f64) -> CalendarResult<DateTime<Utc>> {
        if !day_count.is_finite() {
            return Err(CalendarError::NotFinite(day_count));
        }

        let micros = (day_count * MICROS_PER_DAY).round();
        if micros.abs() >= i64::MAX as f64 {
            return Err(CalendarError::OutOfRange(day_count));
        }

        self.epoch
            .checked_add_signed(Duration::microseconds(micros as i64))
            .ok_or(CalendarError::OutOfRange(day_count))
    }

    /// Legacy conversion: truncates toward zero to whole days first.
    ///
    /// This drops the sub-day part of the input and is therefore lossy; it
    /// exists for compatibility with tables populated with day-resolution
    /// timestamps.
    pub fn to_calendar_truncated(&self, day_count: f64) -> CalendarResult<DateTime<Utc>> {
        self.to_calendar(day_count.trunc())
    }

    /// Convert a calendar timestamp back to a (fractional) day count.
    pub fn to_day_count(&self, timestamp: DateTime<Utc>) -> f64 {
        let delta = timestamp - self.epoch;
        match delta.num_microseconds() {
            Some(us) => us as f64 / MICROS_PER_DAY,
            // Only reached for spans of more than ~292k years.
            None => delta.num_milliseconds() as f64 / MILLIS_PER_DAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    #[test]
    fn test_epoch_is_day_zero() {
        let cal = Calendar::cnes();
        let dt = cal.to_calendar(0.0).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(1950, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(cal.to_day_count(dt), 0.0);
    }

    #[test]
    fn test_known_day() {
        // Day 25963 of the HYFAA sample store.
        let dt = Calendar::cnes().to_calendar(25963.0).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2021, 1, 31));
    }

    #[test]
    fn test_fractional_day_keeps_time_of_day() {
        let cal = Calendar::cnes();
        let dt = cal.to_calendar(25963.75).unwrap();
        assert_eq!(dt.hour(), 18);
        assert_eq!(cal.to_day_count(dt), 25963.75);
    }

    #[test]
    fn test_truncated_drops_sub_day() {
        let cal = Calendar::cnes();
        let dt = cal.to_calendar_truncated(25963.75).unwrap();
        assert_eq!(dt.hour(), 0);
        assert_eq!(cal.to_day_count(dt), 25963.0);

        // Truncation is toward zero, as for whole-day integer casts.
        let before_epoch = cal.to_calendar_truncated(-1.5).unwrap();
        assert_eq!(cal.to_day_count(before_epoch), -1.0);
    }

    #[test]
    fn test_round_trip_day_counts() {
        let cal = Calendar::cnes();
        for d in [0.0, 1.0, -365.0, 0.5, 0.25, 18262.125, 25963.0, 27000.5] {
            let back = cal.to_day_count(cal.to_calendar(d).unwrap());
            assert_eq!(back, d, "round trip failed for {}", d);
        }
    }

    #[test]
    fn test_round_trip_timestamps() {
        let cal = Calendar::cnes();
        let ts = Utc.with_ymd_and_hms(2023, 6, 15, 7, 30, 12).unwrap()
            + Duration::microseconds(250);
        assert_eq!(cal.to_calendar(cal.to_day_count(ts)).unwrap(), ts);
    }

    #[test]
    fn test_rejects_non_finite() {
        let cal = Calendar::cnes();
        assert!(matches!(cal.to_calendar(f64::NAN), Err(CalendarError::NotFinite(_))));
        assert!(matches!(
            cal.to_calendar(f64::INFINITY),
            Err(CalendarError::NotFinite(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_range() {
        let cal = Calendar::cnes();
        assert!(matches!(cal.to_calendar(1.0e12), Err(CalendarError::OutOfRange(_))));
    }

    #[test]
    fn test_custom_epoch() {
        let cal = Calendar::new(Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap());
        let dt = cal.to_calendar(1.0).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2000, 1, 2, 0, 0, 0).unwrap());
    }
}
