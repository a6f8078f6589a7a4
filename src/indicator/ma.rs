use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::{
    Indicator, IndicatorOutput, Line, align_series, ensure_history, ensure_window,
};
use crate::model::Series;

/// Simple Moving Average.
#[derive(Debug, Clone)]
pub struct Sma {
    window: usize,
}

impl Sma {
    pub fn new(window: usize) -> Result<Self, Report<IndicatorError>> {
        ensure_window(window, "window")?;
        Ok(Self { window })
    }

    /// Trailing means aligned with `prices`; undefined for the first
    /// `window - 1` positions.
    pub fn calculate_prices(&self, prices: &[f64]) -> Result<Line, Report<IndicatorError>> {
        ensure_history(self.window, prices.len())?;
        let means = prices
            .windows(self.window)
            .map(|w| w.iter().sum::<f64>() / self.window as f64)
            .collect();
        Ok(align_series(prices.len(), means))
    }
}

impl Indicator for Sma {
    fn name(&self) -> String {
        format!("SMA({})", self.window)
    }

    fn required_bars(&self) -> usize {
        self.window
    }

    fn calculate(&self, series: &Series) -> Result<IndicatorOutput, Report<IndicatorError>> {
        Ok(IndicatorOutput::Line {
            values: self.calculate_prices(&series.closes())?,
        })
    }
}

/// Exponential Moving Average with recursive smoothing seeded by the first
/// price (no bias correction, no warm-up region).
#[derive(Debug, Clone)]
pub struct Ema {
    span: usize,
}

impl Ema {
    pub fn new(span: usize) -> Result<Self, Report<IndicatorError>> {
        ensure_window(span, "span")?;
        Ok(Self { span })
    }

    pub fn alpha(&self) -> f64 {
        2.0 / (self.span as f64 + 1.0)
    }

    /// One EMA value per price.
    pub fn calculate_prices(&self, prices: &[f64]) -> Result<Vec<f64>, Report<IndicatorError>> {
        ensure_history(1, prices.len())?;
        Ok(smooth(prices, self.alpha()))
    }
}

impl Indicator for Ema {
    fn name(&self) -> String {
        format!("EMA({})", self.span)
    }

    fn required_bars(&self) -> usize {
        1
    }

    fn calculate(&self, series: &Series) -> Result<IndicatorOutput, Report<IndicatorError>> {
        let values = self.calculate_prices(&series.closes())?;
        Ok(IndicatorOutput::Line {
            values: values.into_iter().map(Some).collect(),
        })
    }
}

/// `out[0] = xs[0]`, `out[i] = alpha * xs[i] + (1 - alpha) * out[i - 1]`.
pub(crate) fn smooth(xs: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(xs.len());
    let mut prev: Option<f64> = None;
    for &x in xs {
        let next = match prev {
            None => x,
            Some(p) => alpha * x + (1.0 - alpha) * p,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_util::series_from_closes;

    const SCENARIO: [f64; 17] = [
        10.0, 11.0, 12.0, 11.0, 10.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 17.0, 18.0,
        19.0, 20.0,
    ];

    fn line(output: IndicatorOutput) -> Line {
        match output {
            IndicatorOutput::Line { values } => values,
            other => panic!("expected line, got {other:?}"),
        }
    }

    #[test]
    fn windows_above_cap_invalid() {
        let too_big = crate::indicator::MAX_WINDOW + 1;
        assert!(Sma::new(too_big).is_err());
        assert!(Ema::new(usize::MAX).is_err());
        assert!(Sma::new(crate::indicator::MAX_WINDOW).is_ok());
    }

    #[test]
    fn sma_window_zero_invalid() {
        let err = Sma::new(0).unwrap_err();
        assert!(matches!(
            err.current_context(),
            IndicatorError::InvalidParameter { .. }
        ));
    }

    #[test]
    fn sma_insufficient_data() {
        let sma = Sma::new(5).unwrap();
        let err = sma.calculate(&series_from_closes(&[1.0; 4])).unwrap_err();
        assert!(matches!(
            err.current_context(),
            IndicatorError::InsufficientData {
                required: 5,
                available: 4
            }
        ));
    }

    #[test]
    fn sma_flat_prices() {
        let sma = Sma::new(3).unwrap();
        let values = line(sma.calculate(&series_from_closes(&[10.0; 5])).unwrap());
        assert_eq!(values.len(), 5);
        assert_eq!(values[..2], [None, None]);
        for v in values.iter().skip(2) {
            assert_eq!(*v, Some(10.0));
        }
    }

    #[test]
    fn sma_scenario_value_is_exact() {
        let sma = Sma::new(5).unwrap();
        let values = line(sma.calculate(&series_from_closes(&SCENARIO)).unwrap());
        assert_eq!(values.len(), SCENARIO.len());
        assert!(values[..4].iter().all(Option::is_none));
        assert_eq!(values[4], Some(10.8));
        // last window: 16..=20
        assert_eq!(values[16], Some(18.0));
    }

    #[test]
    fn sma_window_equal_to_length_defines_last_only() {
        let sma = Sma::new(3).unwrap();
        let values = sma.calculate_prices(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(values, vec![None, None, Some(2.0)]);
    }

    #[test]
    fn ema_span_zero_invalid() {
        assert!(Ema::new(0).is_err());
    }

    #[test]
    fn ema_first_value_equals_first_price() {
        let ema = Ema::new(5).unwrap();
        let values = ema.calculate_prices(&SCENARIO).unwrap();
        assert_eq!(values.len(), SCENARIO.len());
        assert_eq!(values[0], SCENARIO[0]);
    }

    #[test]
    fn ema_follows_recurrence() {
        let ema = Ema::new(3).unwrap();
        // alpha = 0.5
        let values = ema.calculate_prices(&[2.0, 4.0, 8.0]).unwrap();
        assert_eq!(values, vec![2.0, 3.0, 5.5]);
    }

    #[test]
    fn ema_defined_everywhere_even_with_short_series() {
        let ema = Ema::new(20).unwrap();
        let values = line(ema.calculate(&series_from_closes(&[5.0, 6.0])).unwrap());
        assert!(values.iter().all(Option::is_some));
    }

    #[test]
    fn ema_flat_prices() {
        let ema = Ema::new(3).unwrap();
        for v in ema.calculate_prices(&[10.0; 6]).unwrap() {
            assert!((v - 10.0).abs() < 1e-12);
        }
    }

    #[test]
    fn ema_empty_prices_insufficient() {
        let ema = Ema::new(3).unwrap();
        assert!(ema.calculate_prices(&[]).is_err());
    }
}
