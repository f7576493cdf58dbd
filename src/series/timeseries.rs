//! Timestamp-keyed series and their raw (wire) form.

use std::collections::BTreeMap;
use std::collections::btree_map;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::timefmt::{format_timestamp, parse_timestamp};
use crate::error::{PipelineError, Result};

/// A raw series value as it arrives over the wire: JSON numbers or numeric text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// Already numeric.
    Number(f64),
    /// Numeric text, parsed on ingestion.
    Text(String),
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

/// Unparsed series: timestamp text mapped to a raw value.
pub type RawSeries = BTreeMap<String, RawValue>;

/// Ordered mapping of timestamp to value. Keys are unique by construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    points: BTreeMap<NaiveDateTime, f64>,
}

impl TimeSeries {
    /// Creates an empty series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a raw series, rejecting the first unparsable key or value.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Format`] naming the offending key when a
    /// timestamp or value cannot be parsed, or when two keys denote the same
    /// instant.
    pub fn parse(name: &str, raw: &RawSeries) -> Result<Self> {
        let mut points = BTreeMap::new();
        for (key, value) in raw {
            let ts = parse_timestamp(key).ok_or_else(|| {
                PipelineError::format(key.as_str(), format!("{name}: invalid timestamp"))
            })?;
            let v = match value {
                RawValue::Number(n) => *n,
                RawValue::Text(text) => text.trim().parse::<f64>().map_err(|_| {
                    PipelineError::format(
                        key.as_str(),
                        format!("{name}: value \"{text}\" is not a number"),
                    )
                })?,
            };
            if !v.is_finite() {
                return Err(PipelineError::format(
                    key.as_str(),
                    format!("{name}: value must be finite"),
                ));
            }
            if points.insert(ts, v).is_some() {
                return Err(PipelineError::format(
                    key.as_str(),
                    format!("{name}: duplicate timestamp"),
                ));
            }
        }
        Ok(Self { points })
    }

    /// Inserts a point, replacing any value already stored at `ts`.
    pub fn insert(&mut self, ts: NaiveDateTime, value: f64) {
        self.points.insert(ts, value);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, ts: &NaiveDateTime) -> Option<f64> {
        self.points.get(ts).copied()
    }

    /// Iterates points in timestamp order.
    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDateTime, &f64)> {
        self.points.iter()
    }

    /// First and last timestamps, if any.
    pub fn span(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let first = self.points.keys().next()?;
        let last = self.points.keys().next_back()?;
        Some((*first, *last))
    }

    /// Latest point at or before `ts`.
    pub(crate) fn floor(&self, ts: NaiveDateTime) -> Option<(NaiveDateTime, f64)> {
        self.points.range(..=ts).next_back().map(|(k, v)| (*k, *v))
    }

    /// Earliest point at or after `ts`.
    pub(crate) fn ceil(&self, ts: NaiveDateTime) -> Option<(NaiveDateTime, f64)> {
        self.points.range(ts..).next().map(|(k, v)| (*k, *v))
    }

    /// Converts back to the wire form with canonical timestamp keys.
    pub fn to_raw(&self) -> RawSeries {
        self.points
            .iter()
            .map(|(ts, v)| (format_timestamp(ts), RawValue::Number(*v)))
            .collect()
    }
}

impl FromIterator<(NaiveDateTime, f64)> for TimeSeries {
    fn from_iter<I: IntoIterator<Item = (NaiveDateTime, f64)>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a TimeSeries {
    type Item = (&'a NaiveDateTime, &'a f64);
    type IntoIter = btree_map::Iter<'a, NaiveDateTime, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, RawValue)]) -> RawSeries {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn parses_numbers_and_numeric_text_in_time_order() {
        let series = TimeSeries::parse(
            "rain",
            &raw(&[
                ("01/02/2024 00:00", RawValue::Text(" 2.5 ".into())),
                ("01/01/2024 00:00", RawValue::Number(1.0)),
            ]),
        )
        .expect("series should parse");
        let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1.0, 2.5]);
    }

    #[test]
    fn bad_timestamp_names_the_key() {
        let err = TimeSeries::parse("tide", &raw(&[("13/45/2024 00:00", 1.0.into())]))
            .expect_err("must fail");
        match err {
            PipelineError::Format { key, .. } => assert_eq!(key, "13/45/2024 00:00"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn bad_value_names_the_key() {
        let err = TimeSeries::parse(
            "rain",
            &raw(&[("01/01/2024 03:00", RawValue::Text("heavy".into()))]),
        )
        .expect_err("must fail");
        assert!(err.to_string().contains("01/01/2024 03:00"));
    }

    #[test]
    fn equivalent_keys_are_duplicates() {
        let err = TimeSeries::parse(
            "rain",
            &raw(&[
                ("01/01/2024 03:00", 1.0.into()),
                ("2024-01-01T03:00:00", 2.0.into()),
            ]),
        )
        .expect_err("must fail");
        assert!(err.to_string().contains("duplicate"));
    }
}
