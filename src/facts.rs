use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::Series;

/// Scalar facts about a ticker: relayed from the fundamentals adapter or
/// read off the latest bar, combined with at most one multiplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fact {
    Price,
    Volume,
    MarketCap,
    PeRatio,
    DividendYield,
}

impl Fact {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "price" => Some(Self::Price),
            "volume" => Some(Self::Volume),
            "market_cap" | "market-cap" | "marketcap" => Some(Self::MarketCap),
            "pe" | "pe_ratio" | "pe-ratio" | "p/e" => Some(Self::PeRatio),
            "dividend_yield" | "dividend-yield" | "dividend" => Some(Self::DividendYield),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Volume => "volume",
            Self::MarketCap => "market_cap",
            Self::PeRatio => "pe_ratio",
            Self::DividendYield => "dividend_yield",
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn latest_price(series: &Series) -> f64 {
    series.latest().close
}

/// `None` when the latest bar carries no volume.
pub fn latest_volume(series: &Series) -> Option<f64> {
    series.latest().volume
}

/// Latest close times shares outstanding.
pub fn market_cap(series: &Series, shares_outstanding: f64) -> f64 {
    latest_price(series) * shares_outstanding
}

/// The adapter reports yield as a fraction; facts are quoted in percent.
pub fn dividend_yield_percent(fraction: f64) -> f64 {
    fraction * 100.0
}
