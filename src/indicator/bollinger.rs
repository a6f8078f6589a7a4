use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::ma::Sma;
use crate::indicator::{Indicator, IndicatorOutput, Line, MAX_WINDOW, ensure_history};
use crate::model::Series;

/// Aligned band lines plus the sample standard deviation they were built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Bands {
    pub upper: Line,
    pub middle: Line,
    pub lower: Line,
    pub std_dev: Line,
}

/// Bollinger Bands around an SMA, using the sample (n - 1) standard deviation.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    period: usize,
    multiplier: f64,
}

impl BollingerBands {
    pub fn new(period: usize, multiplier: f64) -> Result<Self, Report<IndicatorError>> {
        if !(2..=MAX_WINDOW).contains(&period) {
            bail!(IndicatorError::InvalidParameter {
                name: format!("period must be in 2..={MAX_WINDOW}, got {period}"),
            });
        }
        if !multiplier.is_finite() || multiplier <= 0.0 {
            bail!(IndicatorError::InvalidParameter {
                name: "multiplier must be a positive number".into(),
            });
        }
        Ok(Self { period, multiplier })
    }

    pub fn calculate_prices(&self, prices: &[f64]) -> Result<Bands, Report<IndicatorError>> {
        ensure_history(self.period, prices.len())?;

        let middle = Sma::new(self.period)?.calculate_prices(prices)?;
        let std_dev: Line = middle
            .iter()
            .enumerate()
            .map(|(i, mid)| {
                mid.map(|m| {
                    let window = &prices[i + 1 - self.period..=i];
                    let sum_sq = window.iter().map(|&p| (p - m).powi(2)).sum::<f64>();
                    (sum_sq / (self.period - 1) as f64).sqrt()
                })
            })
            .collect();

        let band = |sign: f64| -> Line {
            middle
                .iter()
                .zip(&std_dev)
                .map(|(&m, &s)| Some(m? + sign * self.multiplier * s?))
                .collect()
        };
        let upper = band(1.0);
        let lower = band(-1.0);

        Ok(Bands {
            upper,
            middle,
            lower,
            std_dev,
        })
    }
}

impl Indicator for BollingerBands {
    fn name(&self) -> String {
        format!("Bollinger({}, {})", self.period, self.multiplier)
    }

    fn required_bars(&self) -> usize {
        self.period
    }

    fn calculate(&self, series: &Series) -> Result<IndicatorOutput, Report<IndicatorError>> {
        let bands = self.calculate_prices(&series.closes())?;
        Ok(IndicatorOutput::Bands {
            upper: bands.upper,
            middle: bands.middle,
            lower: bands.lower,
        })
    }
}
