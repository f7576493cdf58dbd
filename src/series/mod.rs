//! Boundary time series: parsing, hourly resampling, synthetic scenarios.

pub mod resample;
pub mod synthetic;
pub mod timefmt;
pub mod timeseries;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub use resample::resample_hourly;
pub use synthetic::SyntheticBoundaries;
pub use timeseries::{RawSeries, RawValue, TimeSeries};

use crate::error::{PipelineError, Result};

/// Start/end pair of one simulation run. `end` is strictly after `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimulationWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl SimulationWindow {
    /// Builds a window, rejecting empty or inverted ranges.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Format`] keyed on `end_date` when `end <= start`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if end <= start {
            return Err(PipelineError::format(
                "end_date",
                format!(
                    "must be after start_date ({} <= {})",
                    timefmt::format_timestamp(&end),
                    timefmt::format_timestamp(&start)
                ),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Position of `t` within the window, clamped to `[0, 1]`.
    pub fn fraction(&self, t: NaiveDateTime) -> f64 {
        let total = self.duration().num_seconds() as f64;
        if total <= 0.0 {
            return 0.0;
        }
        ((t - self.start).num_seconds() as f64 / total).clamp(0.0, 1.0)
    }
}

/// The four boundary series that drive one run, in canonical order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Boundaries<T> {
    /// Precipitation.
    #[serde(default)]
    pub rain: T,
    /// First upstream inflow.
    #[serde(default, alias = "inflow_dautieng")]
    pub inflow_a: T,
    /// Second upstream inflow.
    #[serde(default, alias = "inflow_trian")]
    pub inflow_b: T,
    /// Downstream tide level.
    #[serde(default)]
    pub tide: T,
}

impl<T> Boundaries<T> {
    /// Field names in canonical order.
    pub const NAMES: [&'static str; 4] = ["rain", "inflow_a", "inflow_b", "tide"];

    /// Borrows the series in canonical order, paired with their names.
    pub fn named(&self) -> [(&'static str, &T); 4] {
        [
            (Self::NAMES[0], &self.rain),
            (Self::NAMES[1], &self.inflow_a),
            (Self::NAMES[2], &self.inflow_b),
            (Self::NAMES[3], &self.tide),
        ]
    }

    /// Applies a fallible conversion to every series, stopping at the first error.
    pub fn try_map<U>(&self, mut f: impl FnMut(&'static str, &T) -> Result<U>) -> Result<Boundaries<U>> {
        Ok(Boundaries {
            rain: f(Self::NAMES[0], &self.rain)?,
            inflow_a: f(Self::NAMES[1], &self.inflow_a)?,
            inflow_b: f(Self::NAMES[2], &self.inflow_b)?,
            tide: f(Self::NAMES[3], &self.tide)?,
        })
    }
}

impl Boundaries<RawSeries> {
    /// Parses and resamples every raw series onto the hourly grid.
    ///
    /// # Errors
    ///
    /// Returns the first [`crate::error::PipelineError::Format`] encountered.
    pub fn resample(&self) -> Result<Boundaries<TimeSeries>> {
        self.try_map(|name, raw| TimeSeries::parse(name, raw).map(|ts| resample_hourly(&ts)))
    }
}

impl Boundaries<TimeSeries> {
    /// Converts back to the wire form.
    pub fn to_raw(&self) -> Boundaries<RawSeries> {
        Boundaries {
            rain: self.rain.to_raw(),
            inflow_a: self.inflow_a.to_raw(),
            inflow_b: self.inflow_b.to_raw(),
            tide: self.tide.to_raw(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_rejects_inverted_range() {
        let start = timefmt::parse_timestamp("01/02/2024 00:00").expect("valid");
        let end = timefmt::parse_timestamp("01/01/2024 00:00").expect("valid");
        assert!(SimulationWindow::new(start, end).is_err());
        assert!(SimulationWindow::new(start, start).is_err());

        let window = SimulationWindow::new(end, start).expect("valid window");
        assert_eq!(window.fraction(end + Duration::hours(6)), 0.25);
        assert_eq!(window.fraction(start + Duration::hours(6)), 1.0);
    }

    #[test]
    fn accepts_legacy_field_names() {
        let json = r#"{
            "rain": {"01/01/2024 00:00": 1.0},
            "inflow_dautieng": {"01/01/2024 00:00": 24.0},
            "inflow_trian": {"01/01/2024 00:00": "800"},
            "tide": {}
        }"#;
        let b: Boundaries<RawSeries> = serde_json::from_str(json).expect("should parse");
        assert_eq!(b.inflow_a.len(), 1);
        assert_eq!(b.inflow_b.len(), 1);
        assert!(b.tide.is_empty());
    }

    #[test]
    fn resample_reports_the_failing_series() {
        let mut b = Boundaries::<RawSeries>::default();
        b.tide.insert("not a time".into(), RawValue::Number(0.0));
        let err = b.resample().expect_err("must fail");
        assert!(err.to_string().contains("tide"));
    }
}
