use std::fmt;

use chrono::{DateTime, Utc};
use error_stack::{Report, bail};
use serde::{Deserialize, Serialize};

use crate::error::SeriesError;

/// One OHLCV bar. Every close-derived indicator reads `close` only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// `None` when the source reported no volume for the bar.
    pub volume: Option<f64>,
}

/// Ordered bar history for one ticker, oldest first.
///
/// Constructed fresh per request and never mutated. A `Series` is always
/// non-empty and its timestamps are strictly increasing.
#[derive(Debug, Clone)]
pub struct Series {
    ticker: String,
    bars: Vec<PriceBar>,
}

impl Series {
    pub fn new(ticker: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, Report<SeriesError>> {
        if bars.is_empty() {
            bail!(SeriesError::Empty);
        }
        if let Some(index) = bars
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            bail!(SeriesError::OutOfOrder { index: index + 1 });
        }
        Ok(Self {
            ticker: ticker.into(),
            bars,
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn latest(&self) -> &PriceBar {
        // non-empty by construction
        &self.bars[self.bars.len() - 1]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }
}

/// History window requested from a series provider.
///
/// String representations match the config file format (e.g. `"1y"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lookback {
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "5d")]
    Day5,
    #[serde(rename = "1mo")]
    Month1,
    #[serde(rename = "3mo")]
    Month3,
    #[serde(rename = "6mo")]
    Month6,
    #[serde(rename = "1y")]
    Year1,
    #[serde(rename = "2y")]
    Year2,
    #[serde(rename = "5y")]
    Year5,
    #[serde(rename = "10y")]
    Year10,
    #[serde(rename = "ytd")]
    YearToDate,
    #[serde(rename = "max")]
    Max,
}

impl Lookback {
    /// Parse a config-format string into a `Lookback`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1d" => Some(Self::Day1),
            "5d" => Some(Self::Day5),
            "1mo" => Some(Self::Month1),
            "3mo" => Some(Self::Month3),
            "6mo" => Some(Self::Month6),
            "1y" => Some(Self::Year1),
            "2y" => Some(Self::Year2),
            "5y" => Some(Self::Year5),
            "10y" => Some(Self::Year10),
            "ytd" => Some(Self::YearToDate),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day1 => "1d",
            Self::Day5 => "5d",
            Self::Month1 => "1mo",
            Self::Month3 => "3mo",
            Self::Month6 => "6mo",
            Self::Year1 => "1y",
            Self::Year2 => "2y",
            Self::Year5 => "5y",
            Self::Year10 => "10y",
            Self::YearToDate => "ytd",
            Self::Max => "max",
        }
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time scalar facts relayed by the fundamentals adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundamentalField {
    SharesOutstanding,
    ForwardPe,
    DividendYield,
}

impl FundamentalField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SharesOutstanding => "shares_outstanding",
            Self::ForwardPe => "forward_pe",
            Self::DividendYield => "dividend_yield",
        }
    }
}

impl fmt::Display for FundamentalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}


#[cfg(test)]
mod tests {
    use super::test_util::bars_from_closes;
    use super::*;

    #[test]
    fn lookback_round_trip() {
        let windows = [
            ("1d", Lookback::Day1),
            ("5d", Lookback::Day5),
            ("1mo", Lookback::Month1),
            ("3mo", Lookback::Month3),
            ("6mo", Lookback::Month6),
            ("1y", Lookback::Year1),
            ("2y", Lookback::Year2),
            ("5y", Lookback::Year5),
            ("10y", Lookback::Year10),
            ("ytd", Lookback::YearToDate),
            ("max", Lookback::Max),
        ];
        for (s, lb) in windows {
            assert_eq!(Lookback::from_str(s), Some(lb));
            assert_eq!(lb.as_str(), s);
        }
    }

    #[test]
    fn lookback_invalid_string_returns_none() {
        assert_eq!(Lookback::from_str("3y"), None);
        assert_eq!(Lookback::from_str(""), None);
    }

    #[test]
    fn empty_series_rejected() {
        let err = Series::new("AAPL", vec![]).unwrap_err();
        assert!(matches!(err.current_context(), SeriesError::Empty));
    }

    #[test]
    fn duplicate_timestamp_rejected() {
        let mut bars = bars_from_closes(&[1.0, 2.0, 3.0]);
        bars[2].timestamp = bars[1].timestamp;
        let err = Series::new("AAPL", bars).unwrap_err();
        assert!(matches!(
            err.current_context(),
            SeriesError::OutOfOrder { index: 2 }
        ));
    }

    #[test]
    fn series_accessors() {
        let series = Series::new("AAPL", bars_from_closes(&[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(series.ticker(), "AAPL");
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![1.0, 2.0, 3.0]);
        assert_eq!(series.latest().close, 3.0);
    }

    #[test]
    fn fundamental_field_serde_uses_snake_case() {
        let json = serde_json::to_string(&FundamentalField::ForwardPe).unwrap();
        assert_eq!(json, "\"forward_pe\"");
        assert_eq!(FundamentalField::DividendYield.to_string(), "dividend_yield");
    }

    #[test]
    fn market_cap_is_derived_not_fetched() {
        assert!(serde_json::from_str::<FundamentalField>("\"market_cap\"").is_err());
        let shares: FundamentalField = serde_json::from_str("\"shares_outstanding\"").unwrap();
        assert_eq!(shares, FundamentalField::SharesOutstanding);
    }
}
