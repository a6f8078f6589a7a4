use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{StatusCode, Url};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::model::{FundamentalField, Lookback, PriceBar, Series};
use crate::provider::MarketDataProvider;

const PROVIDER: &str = "yahoo";
const SUMMARY_MODULES: &str = "defaultKeyStatistics,summaryDetail";
/// Used only if a zero quota slips past config validation.
const FALLBACK_REQUESTS_PER_SECOND: NonZeroU32 = nonzero!(2u32);

/// Yahoo Finance chart and quote-summary endpoints.
pub struct YahooProvider {
    client: reqwest::Client,
    base_url: Url,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl YahooProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, Report<ProviderError>> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(key)
                .change_context(request_error())
                .attach("api_key is not a valid header value")?;
            headers.insert("x-api-key", value);
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .change_context(request_error())?;

        let base_url = Url::parse(&config.base_url)
            .change_context(request_error())
            .attach_with(|| format!("base_url: {}", config.base_url))?;
        if base_url.cannot_be_a_base() {
            return Err(Report::new(request_error())
                .attach(format!("base_url cannot carry a path: {base_url}")));
        }

        let per_second =
            NonZeroU32::new(config.requests_per_second).unwrap_or(FALLBACK_REQUESTS_PER_SECOND);

        Ok(Self {
            client,
            base_url,
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
        })
    }

    /// `base_url` + `segments` + the ticker as one percent-encoded segment.
    fn endpoint(&self, segments: &[&str], ticker: &str) -> Result<Url, Report<ProviderError>> {
        if !is_symbol(ticker) {
            return Err(Report::new(unknown_ticker(ticker)).attach("not a ticker symbol"));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Report::new(request_error()))?
            .pop_if_empty()
            .extend(segments)
            .push(ticker);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        params: &[(&str, &str)],
        ticker: &str,
    ) -> Result<T, Report<ProviderError>> {
        // Wait for rate limiter before making the request
        self.rate_limiter.until_ready().await;
        debug!(url = %url, ?params, "yahoo request");

        let response = self
            .client
            .get(url.clone())
            .query(params)
            .send()
            .await
            .change_context(request_error())
            .attach_with(|| format!("url: {url}"))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Report::new(unknown_ticker(ticker)));
        }
        if !status.is_success() {
            return Err(Report::new(ProviderError::Status {
                provider: PROVIDER.into(),
                status: status.as_u16(),
            })
            .attach(format!("url: {url}")));
        }

        response
            .json::<T>()
            .await
            .change_context(ProviderError::ResponseParse {
                provider: PROVIDER.into(),
            })
    }
}

impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn fetch_series(
        &self,
        ticker: &str,
        lookback: Lookback,
    ) -> BoxFuture<'_, Result<Series, Report<ProviderError>>> {
        let ticker = ticker.to_owned();
        Box::pin(async move {
            let url = self.endpoint(&["v8", "finance", "chart"], &ticker)?;
            let params = [("range", lookback.as_str()), ("interval", "1d")];

            let envelope: ChartEnvelope = self.get_json(url, &params, &ticker).await?;
            let result = envelope.chart.into_result(&ticker)?;
            let bars = result.into_bars();

            info!(
                ticker = %ticker,
                lookback = %lookback,
                bars = bars.len(),
                "yahoo series fetch complete"
            );

            Series::new(&ticker, bars).change_context(ProviderError::InvalidSeries {
                provider: PROVIDER.into(),
                ticker: ticker.clone(),
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
            let url = self.endpoint(&["v10", "finance", "quoteSummary"], &ticker)?;
            let params = [("modules", SUMMARY_MODULES)];

            let envelope: SummaryEnvelope = self.get_json(url, &params, &ticker).await?;
            let result = envelope.quote_summary.into_result(&ticker)?;

            let value = result.field(field).ok_or_else(|| {
                Report::new(ProviderError::MissingField {
                    ticker: ticker.clone(),
                    field,
                })
            })?;

            debug!(ticker = %ticker, field = %field, value, "yahoo fundamental fetched");
            Ok(value)
        })
    }
}

fn request_error() -> ProviderError {
    ProviderError::Request {
        provider: PROVIDER.into(),
    }
}

/// Letters, digits and the `.`, `-`, `^`, `=` used by Yahoo symbols
/// (`BRK-B`, `0700.HK`, `^GSPC`, `EURUSD=X`).
fn is_symbol(ticker: &str) -> bool {
    ticker.chars().any(|c| c.is_ascii_alphanumeric())
        && ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
}

fn unknown_ticker(ticker: &str) -> ProviderError {
    ProviderError::UnknownTicker {
        provider: PROVIDER.into(),
        ticker: ticker.to_owned(),
    }
}

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct YahooErrorBody {
    code: String,
    #[serde(default)]
    description: String,
}

/// Both endpoints wrap their payload as `{ "result": [..] | null, "error": .. }`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: Option<Vec<T>>,
    error: Option<YahooErrorBody>,
}

impl<T> Envelope<T> {
    fn into_result(self, ticker: &str) -> Result<T, Report<ProviderError>> {
        if let Some(err) = self.error {
            warn!(ticker, code = %err.code, description = %err.description, "yahoo error body");
            return Err(Report::new(unknown_ticker(ticker))
                .attach(format!("{}: {}", err.code, err.description)));
        }
        self.result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| Report::new(unknown_ticker(ticker)))
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Envelope<ChartResult>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    /// Bar open times (unix seconds); absent when the range has no bars.
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

/// Column-oriented OHLCV; Yahoo writes `null` for bars without trades.
#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

impl ChartResult {
    /// Rows without a close are dropped. A row whose timestamp does not move
    /// forward replaces the previous one (Yahoo repeats the live bar).
    fn into_bars(self) -> Vec<PriceBar> {
        let quote = self.indicators.quote.into_iter().next().unwrap_or_default();
        let column = |col: &[Option<f64>], i: usize| col.get(i).copied().flatten();

        let mut bars: Vec<PriceBar> = Vec::with_capacity(self.timestamp.len());
        for (i, &ts) in self.timestamp.iter().enumerate() {
            let Some(close) = column(&quote.close, i) else {
                continue;
            };
            let Some(timestamp) = DateTime::from_timestamp(ts, 0) else {
                continue;
            };
            let bar = PriceBar {
                timestamp,
                open: column(&quote.open, i).unwrap_or(close),
                high: column(&quote.high, i).unwrap_or(close),
                low: column(&quote.low, i).unwrap_or(close),
                close,
                volume: column(&quote.volume, i),
            };
            match bars.last_mut() {
                Some(prev) if prev.timestamp >= bar.timestamp => *prev = bar,
                _ => bars.push(bar),
            }
        }
        bars
    }
}

#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: Envelope<SummaryResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResult {
    default_key_statistics: Option<KeyStatistics>,
    summary_detail: Option<SummaryDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatistics {
    shares_outstanding: Option<RawValue>,
    #[serde(rename = "forwardPE")]
    forward_pe: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetail {
    #[serde(rename = "forwardPE")]
    forward_pe: Option<RawValue>,
    dividend_yield: Option<RawValue>,
}

/// `{ "raw": 123.4, "fmt": "123.40" }`, or `{}` when Yahoo has no value.
#[derive(Debug, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

impl SummaryResult {
    fn field(&self, field: FundamentalField) -> Option<f64> {
        let stats = self.default_key_statistics.as_ref();
        let detail = self.summary_detail.as_ref();
        let raw = |v: Option<&RawValue>| v.and_then(|v| v.raw);

        match field {
            FundamentalField::SharesOutstanding => {
                raw(stats.and_then(|s| s.shares_outstanding.as_ref()))
            }
            FundamentalField::ForwardPe => raw(detail.and_then(|d| d.forward_pe.as_ref()))
                .or_else(|| raw(stats.and_then(|s| s.forward_pe.as_ref()))),
            FundamentalField::DividendYield => {
                raw(detail.and_then(|d| d.dividend_yield.as_ref()))
            }
        }
    }
}
