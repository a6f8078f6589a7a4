//! Naive linear-trend extrapolation.
//!
//! Fits an ordinary least squares line of close against bar index and
//! extends it past the end of the series. No confidence intervals and no
//! stationarity checks; treat the output as an illustration, not a forecast
//! anyone should trade on.

use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::{
    Indicator, IndicatorOutput, MAX_HORIZON, ensure_history, ensure_in_range,
};
use crate::model::Series;

/// `close ≈ intercept + slope * index`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendLine {
    pub slope: f64,
    pub intercept: f64,
}

impl TrendLine {
    /// Closed-form least squares over indices `0..prices.len()`.
    pub fn fit(prices: &[f64]) -> Result<Self, Report<IndicatorError>> {
        ensure_history(2, prices.len())?;

        let n = prices.len() as f64;
        let mean_x = (n - 1.0) / 2.0;
        let mean_y = prices.iter().sum::<f64>() / n;

        let (sxy, sxx) = prices
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(sxy, sxx), (i, &y)| {
                let dx = i as f64 - mean_x;
                (sxy + dx * (y - mean_y), sxx + dx * dx)
            });

        // sxx > 0 whenever n >= 2
        let slope = sxy / sxx;
        Ok(Self {
            slope,
            intercept: mean_y - slope * mean_x,
        })
    }

    pub fn at(&self, index: usize) -> f64 {
        self.intercept + self.slope * index as f64
    }
}

#[derive(Debug, Clone)]
pub struct LinearForecast {
    horizon: usize,
}

impl LinearForecast {
    pub fn new(horizon: usize) -> Result<Self, Report<IndicatorError>> {
        ensure_in_range(horizon, "horizon", MAX_HORIZON)?;
        Ok(Self { horizon })
    }

    /// Predicted closes for indices `n..n + horizon`.
    pub fn calculate_prices(
        &self,
        prices: &[f64],
    ) -> Result<(TrendLine, Vec<f64>), Report<IndicatorError>> {
        let line = TrendLine::fit(prices)?;
        let n = prices.len();
        let end = n.checked_add(self.horizon).ok_or_else(|| {
            Report::new(IndicatorError::InvalidParameter {
                name: format!("horizon {} past the end of {n} bars", self.horizon),
            })
        })?;
        let predictions = (n..end).map(|x| line.at(x)).collect();
        Ok((line, predictions))
    }
}

impl Indicator for LinearForecast {
    fn name(&self) -> String {
        format!("LinearForecast({})", self.horizon)
    }

    fn required_bars(&self) -> usize {
        2
    }

    fn calculate(&self, series: &Series) -> Result<IndicatorOutput, Report<IndicatorError>> {
        let (line, predictions) = self.calculate_prices(&series.closes())?;
        Ok(IndicatorOutput::Forecast {
            slope: line.slope,
            intercept: line.intercept,
            predictions,
        })
    }
}
