//! Hourly resampling of irregular boundary series.

use chrono::{Duration, NaiveDateTime};

use super::timeseries::TimeSeries;

/// Fixed output cadence.
pub const RESAMPLE_STEP: Duration = Duration::hours(1);

/// Resamples `series` onto a one-hour grid anchored at its first timestamp.
///
/// The grid runs from the first timestamp while `t <= last`; each grid value
/// is linearly interpolated between its two bracketing input samples. Grid
/// points that coincide with an input sample take that sample's value
/// exactly. An empty series yields an empty series and a single point is
/// returned unchanged.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use floodcast::series::{TimeSeries, resample_hourly};
///
/// let t0 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let t1 = t0 + chrono::Duration::hours(4);
/// let series: TimeSeries = [(t0, 0.0), (t1, 8.0)].into_iter().collect();
///
/// let hourly = resample_hourly(&series);
/// assert_eq!(hourly.len(), 5);
/// assert_eq!(hourly.get(&(t0 + chrono::Duration::hours(1))), Some(2.0));
/// ```
pub fn resample_hourly(series: &TimeSeries) -> TimeSeries {
    let Some((first, last)) = series.span() else {
        return TimeSeries::new();
    };
    if first == last {
        return series.clone();
    }

    let mut out = TimeSeries::new();
    let mut t = first;
    while t <= last {
        if let Some(v) = interpolate_at(series, t) {
            out.insert(t, v);
        }
        t += RESAMPLE_STEP;
    }
    out
}

/// Linear interpolation between the samples bracketing `t`.
fn interpolate_at(series: &TimeSeries, t: NaiveDateTime) -> Option<f64> {
    let (t0, v0) = series.floor(t)?;
    if t0 == t {
        return Some(v0);
    }
    let (t1, v1) = series.ceil(t)?;
    let span = (t1 - t0).num_milliseconds() as f64;
    let offset = (t - t0).num_milliseconds() as f64;
    Some(v0 + (v1 - v0) * offset / span)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid date")
    }

    fn hours(h: i64) -> NaiveDateTime {
        t0() + Duration::hours(h)
    }

    #[test]
    fn empty_in_empty_out() {
        assert!(resample_hourly(&TimeSeries::new()).is_empty());
    }

    #[test]
    fn single_point_is_returned_as_is() {
        let series: TimeSeries = [(t0(), 3.5)].into_iter().collect();
        assert_eq!(resample_hourly(&series), series);
    }

    #[test]
    fn two_point_series_lies_on_the_line() {
        let series: TimeSeries = [(hours(0), 2.0), (hours(6), 14.0)].into_iter().collect();
        let out = resample_hourly(&series);

        assert_eq!(out.len(), 7);
        assert_eq!(out.get(&hours(0)), Some(2.0));
        assert_eq!(out.get(&hours(6)), Some(14.0));
        for h in 1..6 {
            let expected = 2.0 + 2.0 * h as f64;
            let got = out.get(&hours(h)).unwrap_or(f64::NAN);
            assert!((got - expected).abs() < 1e-9, "hour {h}: {got} != {expected}");
        }
    }

    #[test]
    fn irregular_input_lands_on_hourly_grid() {
        let series: TimeSeries = [
            (hours(0), 0.0),
            (hours(0) + Duration::minutes(90), 3.0),
            (hours(5), 3.0),
        ]
        .into_iter()
        .collect();
        let out = resample_hourly(&series);

        let keys: Vec<NaiveDateTime> = out.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, (0..=5).map(hours).collect::<Vec<_>>());
        assert_eq!(out.get(&hours(1)), Some(2.0));
        assert_eq!(out.get(&hours(3)), Some(3.0));
    }

    #[test]
    fn grid_stops_before_an_off_grid_last_point() {
        let series: TimeSeries = [(hours(0), 0.0), (hours(2) + Duration::minutes(30), 5.0)]
            .into_iter()
            .collect();
        let out = resample_hourly(&series);
        assert_eq!(out.len(), 3);
        assert_eq!(out.get(&hours(2)), Some(4.0));
    }

    #[test]
    fn resampling_an_hourly_series_is_idempotent() {
        let series: TimeSeries = [(hours(0), 1.0), (hours(3), 7.0), (hours(12), -2.0)]
            .into_iter()
            .collect();
        let once = resample_hourly(&series);
        let twice = resample_hourly(&once);
        assert_eq!(once, twice);
    }
}
