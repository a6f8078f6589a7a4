use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::ma::smooth;
use crate::indicator::{Indicator, IndicatorOutput, Line, ensure_history, ensure_window};
use crate::model::Series;

/// RSI when both average gain and average loss are zero (flat prices).
pub const FLAT_RSI: f64 = 50.0;

/// How average gains and losses are formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RsiSmoothing {
    /// Recursive smoothing with alpha = 1/period, seeded by the first change.
    #[default]
    Exponential,
    /// Plain mean of the last `period` gains and losses.
    RollingMean,
}

/// Relative Strength Index.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    smoothing: RsiSmoothing,
}

impl Rsi {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        Self::with_smoothing(period, RsiSmoothing::Exponential)
    }

    pub fn with_smoothing(
        period: usize,
        smoothing: RsiSmoothing,
    ) -> Result<Self, Report<IndicatorError>> {
        ensure_window(period, "period")?;
        Ok(Self { period, smoothing })
    }

    /// RSI aligned with `prices`. Position 0 has no price change and is
    /// always undefined.
    pub fn calculate_prices(&self, prices: &[f64]) -> Result<Line, Report<IndicatorError>> {
        let required = self.period.checked_add(1).ok_or_else(|| {
            Report::new(IndicatorError::InvalidParameter {
                name: format!("period {} too large", self.period),
            })
        })?;
        ensure_history(required, prices.len())?;

        let (gains, losses): (Vec<f64>, Vec<f64>) = prices
            .windows(2)
            .map(|w| {
                let delta = w[1] - w[0];
                (delta.max(0.0), (-delta).max(0.0))
            })
            .unzip();

        let (avg_gain, avg_loss) = match self.smoothing {
            RsiSmoothing::Exponential => {
                let alpha = 1.0 / self.period as f64;
                let g: Line = smooth(&gains, alpha).into_iter().map(Some).collect();
                let l: Line = smooth(&losses, alpha).into_iter().map(Some).collect();
                (g, l)
            }
            RsiSmoothing::RollingMean => (
                rolling_mean(&gains, self.period),
                rolling_mean(&losses, self.period),
            ),
        };

        let mut output = Vec::with_capacity(prices.len());
        output.push(None);
        output.extend(
            avg_gain
                .into_iter()
                .zip(avg_loss)
                .map(|(g, l): (Option<f64>, Option<f64>)| Some(rsi_value(g?, l?))),
        );
        Ok(output)
    }
}

impl Indicator for Rsi {
    fn name(&self) -> String {
        match self.smoothing {
            RsiSmoothing::Exponential => format!("RSI({})", self.period),
            RsiSmoothing::RollingMean => format!("RSI({}, rolling)", self.period),
        }
    }

    fn required_bars(&self) -> usize {
        self.period.saturating_add(1)
    }

    fn calculate(&self, series: &Series) -> Result<IndicatorOutput, Report<IndicatorError>> {
        Ok(IndicatorOutput::Line {
            values: self.calculate_prices(&series.closes())?,
        })
    }
}

fn rolling_mean(xs: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..xs.len())
        .map(|i| {
            (i + 1 >= period)
                .then(|| xs[i + 1 - period..=i].iter().sum::<f64>() / period as f64)
        })
        .collect()
}

/// A zero average loss resolves to 100, or to [`FLAT_RSI`] when the average
/// gain is zero too.
fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { FLAT_RSI } else { 100.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
