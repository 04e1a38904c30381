//! Additive trend + weekly seasonality model.
//!
//! Fitting is closed-form least squares over bucket ordinals, so identical
//! series and parameters always produce identical coefficients.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use insight_core::{Granularity, TimeSeriesPoint};

/// Daily points required before weekday offsets are estimated.
const MIN_SEASONAL_POINTS: usize = 14;
/// Calendar span (days, inclusive) required before weekday offsets are estimated.
const MIN_SEASONAL_SPAN_DAYS: i64 = 14;

/// Hyperparameters that shape training. Stored with every cached model; a
/// cached model trained under different parameters is not reused.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastParams {
    /// Series shorter than this are skipped (no points, no error).
    pub min_points: usize,
    /// Estimate day-of-week offsets for daily series.
    pub weekly_seasonality: bool,
}

impl Default for ForecastParams {
    fn default() -> Self {
        Self {
            min_points: 3,
            weekly_seasonality: true,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("need at least {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("series contains a non-finite value at {0}")]
    NonFinite(NaiveDate),

    #[error("series is not strictly ascending at {0}")]
    Unsorted(NaiveDate),
}

/// Fitted model coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeasonalModel {
    pub granularity: Granularity,
    /// Ordinal of the first training bucket; `x = ordinal - origin`.
    pub origin: i64,
    pub intercept: f64,
    pub slope: f64,
    /// Centred residual offsets indexed Monday = 0 .. Sunday = 6.
    pub weekly: Option<[f64; 7]>,
    pub first_bucket: NaiveDate,
    pub last_bucket: NaiveDate,
    pub n_points: usize,
}

impl TrendSeasonalModel {
    pub fn fit(
        series: &[TimeSeriesPoint],
        granularity: Granularity,
        params: &ForecastParams,
    ) -> Result<Self, ModelError> {
        let needed = params.min_points.max(1);
        if series.len() < needed {
            return Err(ModelError::InsufficientData {
                needed,
                got: series.len(),
            });
        }
        for (i, p) in series.iter().enumerate() {
            if !p.value.is_finite() {
                return Err(ModelError::NonFinite(p.date));
            }
            if i > 0 && series[i - 1].date >= p.date {
                return Err(ModelError::Unsorted(p.date));
            }
        }

        let first = series[0].date;
        let last = series[series.len() - 1].date;
        let origin = granularity.ordinal(first);

        let xs: Vec<f64> = series
            .iter()
            .map(|p| (granularity.ordinal(p.date) - origin) as f64)
            .collect();
        let ys: Vec<f64> = series.iter().map(|p| p.value).collect();
        let span_days = (last - first).num_days() + 1;
        let seasonal = params.weekly_seasonality
            && granularity == Granularity::Day
            && series.len() >= MIN_SEASONAL_POINTS
            && span_days >= MIN_SEASONAL_SPAN_DAYS;

        let (intercept, slope, weekly) = match seasonal.then(|| fit_with_weekdays(series, &xs, &ys)) {
            Some(Some((a, b, w))) => (a, b, Some(w)),
            _ => {
                let (a, b) = least_squares(&xs, &ys);
                (a, b, None)
            }
        };

        Ok(Self {
            granularity,
            origin,
            intercept,
            slope,
            weekly,
            first_bucket: first,
            last_bucket: last,
            n_points: series.len(),
        })
    }

    /// Raw prediction for the bucket containing `date`; may be negative.
    pub fn predict(&self, date: NaiveDate) -> f64 {
        let bucket = self.granularity.bucket(date);
        let x = (self.granularity.ordinal(bucket) - self.origin) as f64;
        let seasonal = match (&self.weekly, self.granularity) {
            (Some(w), Granularity::Day) => w[bucket.weekday().num_days_from_monday() as usize],
            _ => 0.0,
        };
        self.intercept + self.slope * x + seasonal
    }
}

/// Ordinary least squares line; flat line through the mean when x has no spread.
fn least_squares(xs: &[f64], ys: &[f64]) -> (f64, f64) {
    let n = xs.len() as f64;
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        sxx += (x - mx) * (x - mx);
        sxy += (x - mx) * (y - my);
    }
    if sxx <= f64::EPSILON {
        return (my, 0.0);
    }
    let slope = sxy / sxx;
    (my - slope * mx, slope)
}

/// Joint least squares of trend and weekday dummies.
///
/// Offsets are centred over the weekdays present in the series; absent
/// weekdays get 0. Returns `None` when fewer than two weekdays are present or
/// the normal equations are singular.
fn fit_with_weekdays(series: &[TimeSeriesPoint], xs: &[f64], ys: &[f64]) -> Option<(f64, f64, [f64; 7])> {
    let weekday = |p: &TimeSeriesPoint| p.date.weekday().num_days_from_monday() as usize;

    let mut seen = [false; 7];
    for p in series {
        seen[weekday(p)] = true;
    }
    let present: Vec<usize> = (0..7).filter(|d| seen[*d]).collect();
    if present.len() < 2 {
        return None;
    }
    let dummies = &present[1..];
    let k = 2 + dummies.len();

    let mut xtx = vec![vec![0.0f64; k]; k];
    let mut xty = vec![0.0f64; k];
    let mut row = vec![0.0f64; k];
    for ((p, x), y) in series.iter().zip(xs).zip(ys) {
        row[0] = 1.0;
        row[1] = *x;
        let d = weekday(p);
        for (j, dummy) in dummies.iter().enumerate() {
            row[2 + j] = if *dummy == d { 1.0 } else { 0.0 };
        }
        for i in 0..k {
            xty[i] += row[i] * y;
            for j in 0..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }

    let beta = solve_linear(xtx, xty)?;

    let mut offsets = [0.0f64; 7];
    for (j, dummy) in dummies.iter().enumerate() {
        offsets[*dummy] = beta[2 + j];
    }
    let centre = present.iter().map(|d| offsets[*d]).sum::<f64>() / present.len() as f64;
    for d in &present {
        offsets[*d] -= centre;
    }
    Some((beta[0] + centre, beta[1], offsets))
}

/// Gaussian elimination with partial pivoting.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|i, j| a[*i][col].abs().total_cmp(&a[*j][col].abs()))?;
        if a[pivot][col].abs() < 1e-9 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        let pivot_row = a[col].clone();
        let pivot_b = b[col];
        for r in (col + 1)..n {
            let factor = a[r][col] / pivot_row[col];
            if factor == 0.0 {
                continue;
            }
            for c in col..n {
                a[r][c] -= factor * pivot_row[c];
            }
            b[r] -= factor * pivot_b;
        }
    }

    let mut x = vec![0.0f64; n];
    for i in (0..n).rev() {
        let tail: f64 = ((i + 1)..n).map(|j| a[i][j] * x[j]).sum();
        x[i] = (b[i] - tail) / a[i][i];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daily(start: NaiveDate, values: &[f64]) -> Vec<TimeSeriesPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| TimeSeriesPoint::new(start + chrono::Duration::days(i as i64), *v))
            .collect()
    }

    fn start() -> NaiveDate {
        // A Monday.
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn constant_series_predicts_the_constant() {
        let series = daily(start(), &[10.0; 90]);
        let m = TrendSeasonalModel::fit(&series, Granularity::Day, &ForecastParams::default()).unwrap();
        let tomorrow = m.last_bucket.succ_opt().unwrap();
        assert!((m.predict(tomorrow) - 10.0).abs() < 1e-9);
        assert!(m.slope.abs() < 1e-9);
    }

    #[test]
    fn linear_trend_is_recovered_and_may_go_negative() {
        let values: Vec<f64> = (0..10).map(|i| 20.0 - 3.0 * i as f64).collect();
        let series = daily(start(), &values);
        let params = ForecastParams {
            weekly_seasonality: false,
            ..ForecastParams::default()
        };
        let m = TrendSeasonalModel::fit(&series, Granularity::Day, &params).unwrap();
        assert!((m.slope + 3.0).abs() < 1e-9);
        let later = start() + chrono::Duration::days(12);
        assert!(m.predict(later) < 0.0);
    }

    #[test]
    fn weekly_offsets_capture_a_weekend_spike() {
        let values: Vec<f64> = (0..28)
            .map(|i| if i % 7 == 5 || i % 7 == 6 { 30.0 } else { 10.0 })
            .collect();
        let series = daily(start(), &values);
        let m = TrendSeasonalModel::fit(&series, Granularity::Day, &ForecastParams::default()).unwrap();
        assert!(m.weekly.is_some());

        let next_saturday = start() + chrono::Duration::days(33);
        let next_tuesday = start() + chrono::Duration::days(29);
        assert!((m.predict(next_saturday) - 30.0).abs() < 1e-6);
        assert!((m.predict(next_tuesday) - 10.0).abs() < 1e-6);
    }

    #[test]
    fn short_or_monthly_series_fit_trend_only() {
        let series = daily(start(), &[1.0, 2.0, 3.0]);
        let m = TrendSeasonalModel::fit(&series, Granularity::Day, &ForecastParams::default()).unwrap();
        assert!(m.weekly.is_none());

        let monthly = vec![
            TimeSeriesPoint::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 100.0),
            TimeSeriesPoint::new(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(), 110.0),
            TimeSeriesPoint::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), 120.0),
        ];
        let m = TrendSeasonalModel::fit(&monthly, Granularity::Month, &ForecastParams::default()).unwrap();
        let april = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        assert!((m.predict(april) - 130.0).abs() < 1e-9);
    }

    #[test]
    fn unsorted_and_short_series_are_rejected() {
        let mut series = daily(start(), &[1.0, 2.0, 3.0]);
        series.swap(0, 1);
        match TrendSeasonalModel::fit(&series, Granularity::Day, &ForecastParams::default()) {
            Err(ModelError::Unsorted(_)) => {}
            other => panic!("expected Unsorted, got {other:?}"),
        }

        let short = daily(start(), &[1.0]);
        match TrendSeasonalModel::fit(&short, Granularity::Day, &ForecastParams::default()) {
            Err(ModelError::InsufficientData { needed: 3, got: 1 }) => {}
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }
}
