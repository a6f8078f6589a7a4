pub mod bollinger;
pub mod forecast;
pub mod ma;
pub mod macd;
pub mod rsi;

use error_stack::{Report, bail};
use serde::Serialize;

use crate::error::IndicatorError;
use crate::model::Series;

/// A sequence aligned 1:1 with the input series. `None` marks positions
/// where not enough history has accumulated yet.
pub type Line = Vec<Option<f64>>;

/// A technical analysis indicator computed over a price series.
pub trait Indicator: Send + Sync {
    /// Human-readable label, e.g. `"SMA(20)"`.
    fn name(&self) -> String;

    /// Minimum number of bars required to produce a result.
    fn required_bars(&self) -> usize;

    fn calculate(&self, series: &Series) -> Result<IndicatorOutput, Report<IndicatorError>>;
}

/// Typed result of one indicator computation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum IndicatorOutput {
    Line {
        values: Line,
    },
    Macd {
        macd: Line,
        signal: Line,
        histogram: Line,
    },
    Bands {
        upper: Line,
        middle: Line,
        lower: Line,
    },
    /// Predicted closes for the bars following the series; not aligned.
    Forecast {
        slope: f64,
        intercept: f64,
        predictions: Vec<f64>,
    },
}

/// A labelled scalar: the latest defined value of one output line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub label: String,
    pub value: Option<f64>,
}

impl Reading {
    fn new(label: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

impl IndicatorOutput {
    /// Reduce the output to its latest readings.
    pub fn latest(&self) -> Vec<Reading> {
        match self {
            Self::Line { values } => vec![Reading::new("value", last_defined(values))],
            Self::Macd {
                macd,
                signal,
                histogram,
            } => vec![
                Reading::new("macd", last_defined(macd)),
                Reading::new("signal", last_defined(signal)),
                Reading::new("histogram", last_defined(histogram)),
            ],
            Self::Bands {
                upper,
                middle,
                lower,
            } => vec![
                Reading::new("upper", last_defined(upper)),
                Reading::new("middle", last_defined(middle)),
                Reading::new("lower", last_defined(lower)),
            ],
            Self::Forecast { predictions, .. } => predictions
                .iter()
                .enumerate()
                .map(|(i, &p)| Reading::new(format!("t+{}", i + 1), Some(p)))
                .collect(),
        }
    }

    /// Whether the output lines up 1:1 with the input bars.
    pub fn is_aligned(&self) -> bool {
        !matches!(self, Self::Forecast { .. })
    }
}

/// Last defined entry of an aligned line.
pub fn last_defined(values: &[Option<f64>]) -> Option<f64> {
    values.iter().rev().find_map(|v| *v)
}

/// Pad `values` with leading `None`s so it has `total_len` entries.
pub fn align_series(total_len: usize, values: Vec<f64>) -> Line {
    let offset = total_len.saturating_sub(values.len());
    let mut output = vec![None; total_len];
    for (index, value) in values.into_iter().enumerate() {
        output[offset + index] = Some(value);
    }
    output
}

/// Largest accepted window, period or span: about forty years of daily bars.
pub const MAX_WINDOW: usize = 10_000;
/// Largest accepted forecast horizon, in bars.
pub const MAX_HORIZON: usize = 1_000;

pub(crate) fn ensure_in_range(
    value: usize,
    name: &str,
    max: usize,
) -> Result<(), Report<IndicatorError>> {
    if value == 0 || value > max {
        bail!(IndicatorError::InvalidParameter {
            name: format!("{name} must be in 1..={max}, got {value}"),
        });
    }
    Ok(())
}

pub(crate) fn ensure_window(value: usize, name: &str) -> Result<(), Report<IndicatorError>> {
    ensure_in_range(value, name, MAX_WINDOW)
}

pub(crate) fn ensure_history(
    required: usize,
    available: usize,
) -> Result<(), Report<IndicatorError>> {
    if available < required {
        bail!(IndicatorError::InsufficientData {
            required,
            available,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_series_pads_leading_entries() {
        let aligned = align_series(4, vec![2.0, 3.0]);
        assert_eq!(aligned, vec![None, None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn last_defined_skips_undefined_tail() {
        assert_eq!(last_defined(&[Some(1.0), Some(2.0), None]), Some(2.0));
        assert_eq!(last_defined(&[None, None]), None);
    }

    #[test]
    fn macd_latest_has_three_readings() {
        let output = IndicatorOutput::Macd {
            macd: vec![Some(1.0), Some(2.0)],
            signal: vec![Some(0.5), Some(1.5)],
            histogram: vec![Some(0.5), Some(0.5)],
        };
        let readings = output.latest();
        let labels: Vec<&str> = readings.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, ["macd", "signal", "histogram"]);
        assert_eq!(readings[0].value, Some(2.0));
        assert!(output.is_aligned());
    }

    #[test]
    fn forecast_latest_labels_steps() {
        let output = IndicatorOutput::Forecast {
            slope: 1.0,
            intercept: 0.0,
            predictions: vec![5.0, 6.0],
        };
        let readings = output.latest();
        assert_eq!(readings[0].label, "t+1");
        assert_eq!(readings[1].value, Some(6.0));
        assert!(!output.is_aligned());
    }
}
