use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::ma::Ema;
use crate::indicator::{Indicator, IndicatorOutput, Line, ensure_history};
use crate::model::Series;

/// MACD line, signal line and histogram, one value of each per price.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdLines {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
    spans: (usize, usize, usize),
}

impl Macd {
    pub fn new(
        fast_span: usize,
        slow_span: usize,
        signal_span: usize,
    ) -> Result<Self, Report<IndicatorError>> {
        if fast_span == 0 || slow_span == 0 || signal_span == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "all spans must be > 0".into(),
            });
        }
        if fast_span >= slow_span {
            bail!(IndicatorError::InvalidParameter {
                name: "fast span must be < slow span".into(),
            });
        }
        Ok(Self {
            fast: Ema::new(fast_span)?,
            slow: Ema::new(slow_span)?,
            signal: Ema::new(signal_span)?,
            spans: (fast_span, slow_span, signal_span),
        })
    }

    /// Both EMAs are seeded by the first price, so every position is defined.
    pub fn calculate_prices(&self, prices: &[f64]) -> Result<MacdLines, Report<IndicatorError>> {
        ensure_history(1, prices.len())?;

        let fast = self.fast.calculate_prices(prices)?;
        let slow = self.slow.calculate_prices(prices)?;
        let macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = self.signal.calculate_prices(&macd)?;
        let histogram = macd.iter().zip(&signal).map(|(m, s)| m - s).collect();

        Ok(MacdLines {
            macd,
            signal,
            histogram,
        })
    }
}

impl Indicator for Macd {
    fn name(&self) -> String {
        let (fast, slow, signal) = self.spans;
        format!("MACD({fast}, {slow}, {signal})")
    }

    fn required_bars(&self) -> usize {
        1
    }

    fn calculate(&self, series: &Series) -> Result<IndicatorOutput, Report<IndicatorError>> {
        let lines = self.calculate_prices(&series.closes())?;
        let wrap = |xs: Vec<f64>| -> Line { xs.into_iter().map(Some).collect() };
        Ok(IndicatorOutput::Macd {
            macd: wrap(lines.macd),
            signal: wrap(lines.signal),
            histogram: wrap(lines.histogram),
        })
    }
}
