pub mod yahoo;

use std::sync::Arc;

use error_stack::{Report, bail};
use futures::future::BoxFuture;

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::model::{FundamentalField, Lookback, Series};
use crate::provider::yahoo::YahooProvider;

/// Source of price history and fundamentals for a ticker.
///
/// Uses `BoxFuture` (from `futures` crate) instead of `async fn` in trait
/// to keep the trait object-safe (`dyn MarketDataProvider`).
pub trait MarketDataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Daily bars covering `lookback`, oldest first.
    fn fetch_series(
        &self,
        ticker: &str,
        lookback: Lookback,
    ) -> BoxFuture<'_, Result<Series, Report<ProviderError>>>;

    /// A single point-in-time fact. Absent values fail with
    /// [`ProviderError::MissingField`].
    fn fetch_fundamental(
        &self,
        ticker: &str,
        field: FundamentalField,
    ) -> BoxFuture<'_, Result<f64, Report<ProviderError>>>;
}

pub fn build_provider(
    config: &ProviderConfig,
) -> Result<Arc<dyn MarketDataProvider>, Report<ProviderError>> {
    match config.name.as_str() {
        "yahoo" => Ok(Arc::new(YahooProvider::new(config)?)),
        other => bail!(ProviderError::Unsupported {
            name: other.to_owned(),
        }),
    }
}

#[cfg(test)]
pub mod memory {
    use std::collections::HashMap;

    use error_stack::Report;
    use futures::future::BoxFuture;

    use super::MarketDataProvider;
    use crate::error::ProviderError;
    use crate::model::{FundamentalField, Lookback, PriceBar, Series};

    /// Serves fixed bars and fundamentals; ignores the lookback.
    #[derive(Default)]
    pub struct MemoryProvider {
        bars: HashMap<String, Vec<PriceBar>>,
        fundamentals: HashMap<(String, FundamentalField), f64>,
    }

    impl MemoryProvider {
        pub fn with_bars(mut self, ticker: &str, bars: Vec<PriceBar>) -> Self {
            self.bars.insert(ticker.to_owned(), bars);
            self
        }

        pub fn with_fundamental(mut self, ticker: &str, field: FundamentalField, v: f64) -> Self {
            self.fundamentals.insert((ticker.to_owned(), field), v);
            self
        }
    }

    impl MarketDataProvider for MemoryProvider {
        fn name(&self) -> &str {
            "memory"
        }

        fn fetch_series(
            &self,
            ticker: &str,
            _lookback: Lookback,
        ) -> BoxFuture<'_, Result<Series, Report<ProviderError>>> {
            let ticker = ticker.to_owned();
            Box::pin(async move {
                let bars = self.bars.get(&ticker).cloned().ok_or_else(|| {
                    Report::new(ProviderError::UnknownTicker {
                        provider: "memory".into(),
                        ticker: ticker.clone(),
                    })
                })?;
                Series::new(&ticker, bars).map_err(|e| {
                    e.change_context(ProviderError::InvalidSeries {
                        provider: "memory".into(),
                        ticker: ticker.clone(),
                    })
                })
            })
        }

        fn fetch_fundamental(
            &self,
            ticker: &str,
            field: FundamentalField,
        ) -> BoxFuture<'_, Result<f64, Report<ProviderError>>> {
            let ticker = ticker.to_owned();
            Box::pin(async move {
                self.fundamentals
                    .get(&(ticker.clone(), field))
                    .copied()
                    .ok_or_else(|| Report::new(ProviderError::MissingField { ticker, field }))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_yahoo() {
        let provider = build_provider(&ProviderConfig::default()).unwrap();
        assert_eq!(provider.name(), "yahoo");
    }

    #[test]
    fn unknown_name_is_unsupported() {
        let config = ProviderConfig {
            name: "nope".into(),
            ..ProviderConfig::default()
        };
        let err = build_provider(&config).err().unwrap();
        match err.current_context() {
            ProviderError::Unsupported { name } => assert_eq!(name, "nope"),
            other => panic!("expected Unsupported, got {other}"),
        }
    }
}
