//! Time-series primitives: points and calendar bucketing.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// One bucket of an aggregated series.
///
/// Series are ascending with at most one point per bucket. Missing buckets
/// are simply absent (no gap filling).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Calendar bucket size.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Day,
    Month,
}

impl Granularity {
    /// Start of the bucket containing `date` (month buckets start on day 1).
    pub fn bucket(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date),
        }
    }

    /// The bucket immediately after `bucket`; `None` past chrono's date range.
    pub fn next(&self, bucket: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Day => bucket.succ_opt(),
            Granularity::Month => {
                let (y, m) = if bucket.month() == 12 {
                    (bucket.year() + 1, 1)
                } else {
                    (bucket.year(), bucket.month() + 1)
                };
                NaiveDate::from_ymd_opt(y, m, 1)
            }
        }
    }

    /// Monotonic integer position of the bucket; consecutive buckets differ by 1.
    pub fn ordinal(&self, date: NaiveDate) -> i64 {
        match self {
            Granularity::Day => i64::from(date.num_days_from_ce()),
            Granularity::Month => i64::from(date.year()) * 12 + i64::from(date.month0()),
        }
    }

    /// Number of buckets from `from` to `to` (negative when `to` is earlier).
    pub fn steps_between(&self, from: NaiveDate, to: NaiveDate) -> i64 {
        self.ordinal(to) - self.ordinal(from)
    }
}

/// True when dates are strictly ascending (no duplicates).
pub fn is_strictly_ascending(points: &[TimeSeriesPoint]) -> bool {
    points.windows(2).all(|w| w[0].date < w[1].date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn month_buckets_start_on_the_first() {
        assert_eq!(Granularity::Month.bucket(d(2024, 2, 29)), d(2024, 2, 1));
        assert_eq!(Granularity::Day.bucket(d(2024, 2, 29)), d(2024, 2, 29));
    }

    #[test]
    fn next_month_rolls_over_the_year() {
        assert_eq!(Granularity::Month.next(d(2023, 12, 1)), Some(d(2024, 1, 1)));
        assert_eq!(Granularity::Day.next(d(2023, 12, 31)), Some(d(2024, 1, 1)));
    }

    #[test]
    fn ordinals_are_contiguous_across_boundaries() {
        assert_eq!(Granularity::Month.steps_between(d(2023, 11, 1), d(2024, 2, 1)), 3);
        assert_eq!(Granularity::Day.steps_between(d(2024, 2, 28), d(2024, 3, 1)), 2);
    }

    #[test]
    fn ascending_check_rejects_duplicates() {
        let a = TimeSeriesPoint::new(d(2024, 1, 1), 1.0);
        let b = TimeSeriesPoint::new(d(2024, 1, 2), 1.0);
        assert!(is_strictly_ascending(&[a, b]));
        assert!(!is_strictly_ascending(&[a, a]));
    }
}
