use chrono::{NaiveDate, NaiveDateTime};

use crate::data::model::{AxisValue, RegressionResult, Series};
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// median_by_x
// ---------------------------------------------------------------------------

/// Collapse duplicate x values to their median y, one point per distinct x.
/// The input is already sorted, so duplicates form contiguous runs. A run of
/// one returns its value unchanged; an even run takes the mean of the two
/// middle values (matching a spreadsheet median).
pub fn median_by_x<X>(series: &Series<X>) -> Series<X>
where
    X: AxisValue + PartialEq,
{
    let points = series.points();
    let mut out = Vec::new();
    let mut i = 0;
    while i < points.len() {
        let x = points[i].0;
        let mut ys: Vec<f64> = Vec::new();
        while i < points.len() && points[i].0 == x {
            ys.push(points[i].1);
            i += 1;
        }
        out.push((x, median(&mut ys)));
    }
    Series::from_points(out)
}

fn median(ys: &mut [f64]) -> f64 {
    ys.sort_by(f64::total_cmp);
    let n = ys.len();
    if n % 2 == 1 {
        ys[n / 2]
    } else {
        (ys[n / 2 - 1] + ys[n / 2]) / 2.0
    }
}

// ---------------------------------------------------------------------------
// resample_daily
// ---------------------------------------------------------------------------

/// Bucket a timestamped series into calendar days, `y` = arithmetic mean of
/// the bucket. Days with no points are omitted, never interpolated or
/// zero-filled.
pub fn resample_daily(series: &Series<NaiveDateTime>) -> Series<NaiveDate> {
    let mut out: Vec<(NaiveDate, f64)> = Vec::new();
    let mut current: Option<(NaiveDate, f64, usize)> = None;

    for &(ts, y) in series.points() {
        let day = ts.date();
        match current {
            Some((d, sum, n)) if d == day => current = Some((d, sum + y, n + 1)),
            Some((d, sum, n)) => {
                out.push((d, sum / n as f64));
                current = Some((day, y, 1));
            }
            None => current = Some((day, y, 1)),
        }
    }
    if let Some((d, sum, n)) = current {
        out.push((d, sum / n as f64));
    }
    Series::from_points(out)
}

// ---------------------------------------------------------------------------
// fit_linear
// ---------------------------------------------------------------------------

/// Ordinary least squares of y on x.
///
/// Fails with [`PipelineError::InsufficientData`] below two distinct x
/// values, since a degenerate fit is undefined. `r_squared` is `1 - RSS/TSS`;
/// when TSS is zero it is 1.0 if the residuals are also zero, `NaN`
/// otherwise.
pub fn fit_linear<X: AxisValue>(series: &Series<X>) -> Result<RegressionResult> {
    let xs: Vec<f64> = series.iter().map(|p| p.0.to_f64()).collect();
    let ys: Vec<f64> = series.iter().map(|p| p.1).collect();

    let mut distinct = xs.clone();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    if distinct.len() < 2 {
        return Err(PipelineError::InsufficientData {
            context: "linear fit".to_string(),
            needed: 2,
            got: distinct.len(),
        });
    }

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (&x, &y) in xs.iter().zip(&ys) {
        sxx += (x - mean_x) * (x - mean_x);
        sxy += (x - mean_x) * (y - mean_y);
    }
    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let mut rss = 0.0;
    let mut tss = 0.0;
    for (&x, &y) in xs.iter().zip(&ys) {
        let predicted = slope * x + intercept;
        rss += (y - predicted) * (y - predicted);
        tss += (y - mean_y) * (y - mean_y);
    }
    let r_squared = if tss == 0.0 {
        if rss == 0.0 {
            1.0
        } else {
            f64::NAN
        }
    } else {
        1.0 - rss / tss
    };

    Ok(RegressionResult {
        slope,
        intercept,
        r_squared,
        domain: (distinct[0], distinct[distinct.len() - 1]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::parse_datetime;

    #[test]
    fn median_collapses_duplicate_depths() {
        let s = Series::from_points(vec![
            (1.0, 2.0),
            (1.0, 4.0),
            (1.0, 9.0),
            (2.0, 5.0),
        ]);
        let m = median_by_x(&s);
        assert_eq!(m.points(), &[(1.0, 4.0), (2.0, 5.0)]);
    }

    #[test]
    fn median_of_even_group_averages_the_middle_pair() {
        let s = Series::from_points(vec![(1.0, 1.0), (1.0, 3.0)]);
        assert_eq!(median_by_x(&s).points(), &[(1.0, 2.0)]);
    }

    #[test]
    fn median_is_idempotent() {
        let s = Series::from_points(vec![(1.0, 2.0), (1.0, 4.0), (2.0, 5.0)]);
        let once = median_by_x(&s);
        let twice = median_by_x(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn resample_daily_means_each_day() {
        let s = Series::from_points(vec![
            (parse_datetime("2024-03-01 06:00").unwrap(), 10.0),
            (parse_datetime("2024-03-01 18:00").unwrap(), 14.0),
            (parse_datetime("2024-03-03 12:00").unwrap(), 20.0),
        ]);
        let daily = resample_daily(&s);
        assert_eq!(daily.len(), 2); // 2024-03-02 is omitted, not zero-filled
        assert_eq!(daily.points()[0].1, 12.0);
        assert_eq!(daily.points()[1].1, 20.0);
    }

    #[test]
    fn resample_daily_is_identity_on_one_point_per_day() {
        let s = Series::from_points(vec![
            (parse_datetime("2024-03-01").unwrap(), 10.0),
            (parse_datetime("2024-03-02").unwrap(), 14.0),
        ]);
        let daily = resample_daily(&s);
        let days: Vec<_> = daily.iter().map(|p| p.0).collect();
        let ys: Vec<_> = daily.iter().map(|p| p.1).collect();
        assert_eq!(
            days,
            vec![
                parse_datetime("2024-03-01").unwrap().date(),
                parse_datetime("2024-03-02").unwrap().date()
            ]
        );
        assert_eq!(ys, vec![10.0, 14.0]);
    }

    #[test]
    fn fit_linear_exact_line() {
        let s = Series::from_points(vec![(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)]);
        let fit = fit_linear(&s).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!(fit.intercept.abs() < 1e-12);
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
        assert_eq!(fit.domain, (1.0, 3.0));
    }

    #[test]
    fn fit_linear_single_point_is_insufficient() {
        let s = Series::from_points(vec![(1.0, 2.0)]);
        assert!(matches!(
            fit_linear(&s),
            Err(PipelineError::InsufficientData { .. })
        ));
    }

    #[test]
    fn fit_linear_needs_distinct_x() {
        let s = Series::from_points(vec![(1.0, 2.0), (1.0, 3.0)]);
        assert!(matches!(
            fit_linear(&s),
            Err(PipelineError::InsufficientData { .. })
        ));
    }

    #[test]
    fn flat_y_with_zero_residuals_reports_unit_r_squared() {
        let s = Series::from_points(vec![(1.0, 5.0), (2.0, 5.0), (3.0, 5.0)]);
        let fit = fit_linear(&s).unwrap();
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.r_squared, 1.0);
    }
}
