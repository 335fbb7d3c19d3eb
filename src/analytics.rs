//! Period-ordered derived columns: percent change, simple and exponential
//! moving averages.
//!
//! Every transform sorts a copy of its input by the period field, appends one
//! column to each record and returns the new list; the input is never touched.
//! Missing values propagate as `null` in the derived column.

use crate::error::{Error, Result};
use crate::models::{DataResponse, Record, json_number};
use serde_json::Value;
use std::cmp::Ordering;

const LOG_TARGET: &str = "ine_rs::analytics";

pub const DEFAULT_VALUE_FIELD: &str = "value";
pub const DEFAULT_PERIOD_FIELD: &str = "Period";

pub const YOY_COLUMN: &str = "yoy_growth";
pub const MOM_COLUMN: &str = "mom_change";
pub const MOVING_AVG_COLUMN: &str = "moving_avg";
pub const EMA_COLUMN: &str = "ema";

fn require_fields(records: &[Record], value_field: &str, period_field: &str) -> Result<()> {
    let Some(first) = records.first() else {
        return Ok(());
    };
    for field in [value_field, period_field] {
        if !first.has_field(field) {
            return Err(Error::Validation(format!(
                "Data must contain '{value_field}' and '{period_field}' fields; '{field}' is missing"
            )));
        }
    }
    Ok(())
}

fn period_of<'a>(record: &'a Record, field: &str) -> Option<&'a Value> {
    record.field(field).filter(|v| !v.is_null())
}

/// Numbers before strings, missing periods last.
pub(crate) fn compare_periods(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::Number(_)), Some(_)) => Ordering::Less,
        (Some(_), Some(Value::Number(_))) => Ordering::Greater,
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

/// Stable sort of a copy of `records` by `period_field`.
pub fn sort_by_period(records: &[Record], period_field: &str) -> Vec<Record> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| compare_periods(period_of(a, period_field), period_of(b, period_field)));
    sorted
}

fn with_column(
    records: &[Record],
    value_field: &str,
    period_field: &str,
    column: &str,
    derive: impl FnOnce(&[Option<f64>]) -> Vec<Option<f64>>,
) -> Result<Vec<Record>> {
    require_fields(records, value_field, period_field)?;
    let mut sorted = sort_by_period(records, period_field);
    let values: Vec<Option<f64>> = sorted.iter().map(|r| r.numeric(value_field)).collect();
    let derived = derive(&values);
    for (record, d) in sorted.iter_mut().zip(derived) {
        record.fields.insert(column.to_string(), json_number(d));
    }
    log::debug!(target: LOG_TARGET, "Calculated {column} for {} data points", sorted.len());
    Ok(sorted)
}

fn pct_change(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let change = match (i.checked_sub(1).and_then(|p| values[p]), values[i]) {
            (Some(prev), Some(cur)) if prev != 0.0 => Some((cur - prev) / prev * 100.0),
            _ => None,
        };
        out.push(change);
    }
    out
}

fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let slice = &values[i + 1 - window..=i];
            let sum = slice.iter().try_fold(0.0, |acc, v| v.map(|v| acc + v))?;
            Some(sum / window as f64)
        })
        .collect()
}

fn ewm(values: &[Option<f64>], span: usize) -> Vec<Option<f64>> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut current: Option<f64> = None;
    values
        .iter()
        .map(|v| {
            current = match (current, *v) {
                (None, v) => v,
                (Some(prev), Some(x)) => Some(alpha * x + (1.0 - alpha) * prev),
                (Some(prev), None) => Some(prev),
            };
            current
        })
        .collect()
}

/// Percent change against the previous record in period order (`yoy_growth`).
pub fn calculate_yoy_growth(
    records: &[Record],
    value_field: &str,
    period_field: &str,
) -> Result<Vec<Record>> {
    with_column(records, value_field, period_field, YOY_COLUMN, pct_change)
}

/// Same formula as [`calculate_yoy_growth`], stored as `mom_change`.
pub fn calculate_mom_change(
    records: &[Record],
    value_field: &str,
    period_field: &str,
) -> Result<Vec<Record>> {
    with_column(records, value_field, period_field, MOM_COLUMN, pct_change)
}

/// Trailing mean over `window` records (`moving_avg`); the first `window - 1`
/// records, and any window containing a missing value, get `null`.
pub fn calculate_moving_average(
    records: &[Record],
    window: usize,
    value_field: &str,
    period_field: &str,
) -> Result<Vec<Record>> {
    if window < 1 {
        return Err(Error::Validation("Window size must be at least 1".into()));
    }
    with_column(records, value_field, period_field, MOVING_AVG_COLUMN, |v| {
        rolling_mean(v, window)
    })
}

/// Exponential moving average with `alpha = 2 / (span + 1)` (`ema`), seeded by
/// the first observed value.
pub fn calculate_exponential_moving_average(
    records: &[Record],
    span: usize,
    value_field: &str,
    period_field: &str,
) -> Result<Vec<Record>> {
    if span < 1 {
        return Err(Error::Validation("Span must be at least 1".into()));
    }
    with_column(records, value_field, period_field, EMA_COLUMN, |v| ewm(v, span))
}

impl DataResponse {
    pub fn calculate_yoy_growth(&self) -> Result<DataResponse> {
        self.calculate_yoy_growth_by(DEFAULT_VALUE_FIELD, DEFAULT_PERIOD_FIELD)
    }

    pub fn calculate_yoy_growth_by(&self, value_field: &str, period_field: &str) -> Result<DataResponse> {
        Ok(self.with_data(calculate_yoy_growth(&self.data, value_field, period_field)?))
    }

    pub fn calculate_mom_change(&self) -> Result<DataResponse> {
        self.calculate_mom_change_by(DEFAULT_VALUE_FIELD, DEFAULT_PERIOD_FIELD)
    }

    pub fn calculate_mom_change_by(&self, value_field: &str, period_field: &str) -> Result<DataResponse> {
        Ok(self.with_data(calculate_mom_change(&self.data, value_field, period_field)?))
    }

    pub fn calculate_moving_average(&self, window: usize) -> Result<DataResponse> {
        self.calculate_moving_average_by(window, DEFAULT_VALUE_FIELD, DEFAULT_PERIOD_FIELD)
    }

    pub fn calculate_moving_average_by(
        &self,
        window: usize,
        value_field: &str,
        period_field: &str,
    ) -> Result<DataResponse> {
        Ok(self.with_data(calculate_moving_average(&self.data, window, value_field, period_field)?))
    }

    pub fn calculate_exponential_moving_average(&self, span: usize) -> Result<DataResponse> {
        self.calculate_exponential_moving_average_by(span, DEFAULT_VALUE_FIELD, DEFAULT_PERIOD_FIELD)
    }

    pub fn calculate_exponential_moving_average_by(
        &self,
        span: usize,
        value_field: &str,
        period_field: &str,
    ) -> Result<DataResponse> {
        Ok(self.with_data(calculate_exponential_moving_average(
            &self.data,
            span,
            value_field,
            period_field,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[Option<f64>]) -> Vec<Record> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Record::new(*v).with_field("Period", format!("2020-{:02}", i + 1)))
            .collect()
    }

    fn column(records: &[Record], name: &str) -> Vec<Option<f64>> {
        records.iter().map(|r| r.numeric(name)).collect()
    }

    #[test]
    fn pct_change_skips_missing_and_zero() {
        let out = pct_change(&[Some(0.0), Some(5.0), None, Some(10.0)]);
        assert_eq!(out, vec![None, None, None, None]);
    }

    #[test]
    fn moving_average_needs_full_window() {
        let out = rolling_mean(&[Some(1.0), Some(2.0), None, Some(4.0), Some(6.0), Some(8.0)], 2);
        assert_eq!(out, vec![None, Some(1.5), None, None, Some(5.0), Some(7.0)]);
    }

    #[test]
    fn ema_span_one_is_identity() {
        let out = ewm(&[Some(3.0), Some(7.0), Some(1.0)], 1);
        assert_eq!(out, vec![Some(3.0), Some(7.0), Some(1.0)]);
    }

    #[test]
    fn ema_carries_forward_over_gaps() {
        let out = ewm(&[None, Some(10.0), None, Some(20.0)], 3);
        assert_eq!(out, vec![None, Some(10.0), Some(10.0), Some(15.0)]);
    }

    #[test]
    fn sorts_numbers_before_strings_and_missing_last() {
        let recs = vec![
            Record::new(Some(1.0)).with_field("Period", "b"),
            Record::new(Some(2.0)),
            Record::new(Some(3.0)).with_field("Period", 2020),
            Record::new(Some(4.0)).with_field("Period", "a"),
        ];
        let sorted = sort_by_period(&recs, "Period");
        assert_eq!(column(&sorted, "value"), vec![Some(3.0), Some(4.0), Some(1.0), Some(2.0)]);
    }

    #[test]
    fn invalid_window_and_span_are_rejected() {
        let recs = series(&[Some(1.0)]);
        assert!(matches!(
            calculate_moving_average(&recs, 0, "value", "Period"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            calculate_exponential_moving_average(&recs, 0, "value", "Period"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn missing_period_field_is_rejected() {
        let recs = vec![Record::new(Some(1.0)).with_field("Ano", "2020")];
        let err = calculate_yoy_growth(&recs, "value", "Period").unwrap_err();
        assert!(err.to_string().contains("Period"));
        assert!(calculate_yoy_growth(&recs, "value", "Ano").is_ok());
    }
}
