use std::fmt;

use error_stack::Report;
use serde::Serialize;

use crate::config::IndicatorDefaults;
use crate::error::IndicatorError;
use crate::facts::Fact;
use crate::indicator::Indicator;
use crate::indicator::bollinger::BollingerBands;
use crate::indicator::ma::{Ema, Sma};
use crate::indicator::macd::Macd;
use crate::indicator::rsi::{Rsi, RsiSmoothing};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Sma,
    Ema,
    Rsi,
    Macd,
    Bollinger,
}

impl IndicatorKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sma" => Some(Self::Sma),
            "ema" => Some(Self::Ema),
            "rsi" => Some(Self::Rsi),
            "macd" => Some(Self::Macd),
            "bollinger" | "bb" => Some(Self::Bollinger),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sma => "sma",
            Self::Ema => "ema",
            Self::Rsi => "rsi",
            Self::Macd => "macd",
            Self::Bollinger => "bollinger",
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Optional overrides; anything unset falls back to [`IndicatorDefaults`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorParams {
    pub period: Option<usize>,
    pub fast_period: Option<usize>,
    pub slow_period: Option<usize>,
    pub signal_period: Option<usize>,
    pub std_dev_multiplier: Option<f64>,
    pub rolling_rsi: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSpec {
    pub kind: IndicatorKind,
    pub params: IndicatorParams,
}

impl IndicatorSpec {
    pub fn new(kind: IndicatorKind) -> Self {
        Self {
            kind,
            params: IndicatorParams::default(),
        }
    }

    pub fn with_period(mut self, period: usize) -> Self {
        self.params.period = Some(period);
        self
    }

    /// Window/period the indicator will run with after defaults apply.
    /// MACD has no single period.
    pub fn effective_period(&self, defaults: &IndicatorDefaults) -> Option<usize> {
        let fallback = match self.kind {
            IndicatorKind::Sma => defaults.sma_window,
            IndicatorKind::Ema => defaults.ema_window,
            IndicatorKind::Rsi => defaults.rsi_period,
            IndicatorKind::Bollinger => defaults.bollinger_period,
            IndicatorKind::Macd => return None,
        };
        Some(self.params.period.unwrap_or(fallback))
    }

    /// Build the configured indicator. Invalid parameters are reported,
    /// never replaced by defaults.
    pub fn build(
        &self,
        defaults: &IndicatorDefaults,
    ) -> Result<Box<dyn Indicator>, Report<IndicatorError>> {
        let p = &self.params;
        let period = self.effective_period(defaults).unwrap_or_default();

        let indicator: Box<dyn Indicator> = match self.kind {
            IndicatorKind::Sma => Box::new(Sma::new(period)?),
            IndicatorKind::Ema => Box::new(Ema::new(period)?),
            IndicatorKind::Rsi => {
                let smoothing = if p.rolling_rsi {
                    RsiSmoothing::RollingMean
                } else {
                    RsiSmoothing::Exponential
                };
                Box::new(Rsi::with_smoothing(period, smoothing)?)
            }
            IndicatorKind::Macd => Box::new(Macd::new(
                p.fast_period.unwrap_or(defaults.macd_fast),
                p.slow_period.unwrap_or(defaults.macd_slow),
                p.signal_period.unwrap_or(defaults.macd_signal),
            )?),
            IndicatorKind::Bollinger => Box::new(BollingerBands::new(
                period,
                p.std_dev_multiplier
                    .unwrap_or(defaults.bollinger_multiplier),
            )?),
        };
        Ok(indicator)
    }
}

/// What the caller wants to know about a ticker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Fact {
        fact: Fact,
    },
    Indicator {
        spec: IndicatorSpec,
        /// Include the full aligned series, not just the latest readings.
        full: bool,
    },
    Forecast {
        horizon: Option<usize>,
    },
    Overview,
}

/// A request bound to a ticker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    pub ticker: String,
    pub request: Request,
}

impl Query {
    pub fn new(ticker: impl Into<String>, request: Request) -> Self {
        Self {
            ticker: ticker.into().to_uppercase(),
            request,
        }
    }
}
