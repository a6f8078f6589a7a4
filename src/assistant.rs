use std::sync::Arc;

use chrono::{DateTime, Utc};
use error_stack::{Report, ResultExt};
use serde::Serialize;
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use crate::config::{AppConfig, IndicatorDefaults};
use crate::error::{AssistantError, ProviderError};
use crate::facts::{self, Fact};
use crate::indicator::forecast::LinearForecast;
use crate::indicator::{IndicatorOutput, Reading};
use crate::model::{FundamentalField, Lookback, Series};
use crate::provider::MarketDataProvider;
use crate::request::{IndicatorKind, IndicatorSpec, Query, Request};

/// Latest-bar facts only look at the last close, so a short window is enough.
const FACT_LOOKBACK: Lookback = Lookback::Day5;

#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub request_id: Uuid,
    pub ticker: String,
    pub generated_at: DateTime<Utc>,
    pub answer: Answer,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Answer {
    Fact(FactAnswer),
    Indicator(IndicatorAnswer),
    Forecast(ForecastAnswer),
    Overview(OverviewAnswer),
}

#[derive(Debug, Clone, Serialize)]
pub struct FactAnswer {
    pub fact: Fact,
    pub value: f64,
    /// Timestamp of the bar the value was read from, for series-based facts.
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorAnswer {
    pub kind: IndicatorKind,
    pub name: String,
    pub period: Option<usize>,
    pub as_of: DateTime<Utc>,
    pub readings: Vec<Reading>,
    pub history: Option<History>,
}

/// Full indicator output with the bar timestamps it is aligned to.
#[derive(Debug, Clone, Serialize)]
pub struct History {
    pub timestamps: Vec<DateTime<Utc>>,
    pub output: IndicatorOutput,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastAnswer {
    pub lookback: Lookback,
    pub bars: usize,
    pub last_close: f64,
    pub as_of: DateTime<Utc>,
    pub slope: f64,
    pub intercept: f64,
    /// Predicted closes for the next `predictions.len()` bars.
    pub predictions: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverviewAnswer {
    pub price: f64,
    pub as_of: DateTime<Utc>,
    pub market_cap: f64,
    pub sma: IndicatorAnswer,
    pub ema: IndicatorAnswer,
    pub rsi: IndicatorAnswer,
    pub macd: IndicatorAnswer,
    pub forecast: ForecastAnswer,
}

/// Runs requests against a market data provider.
pub struct Assistant {
    provider: Arc<dyn MarketDataProvider>,
    defaults: IndicatorDefaults,
    lookback: Lookback,
    forecast_lookback: Lookback,
    forecast_horizon: usize,
}

impl Assistant {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: &AppConfig) -> Self {
        Self {
            provider,
            defaults: config.defaults.clone(),
            lookback: config.general.lookback(),
            forecast_lookback: config.general.forecast_lookback(),
            forecast_horizon: config.general.forecast_horizon,
        }
    }

    /// Override the history window used for indicators.
    pub fn with_lookback(mut self, lookback: Lookback) -> Self {
        self.lookback = lookback;
        self
    }

    pub async fn handle(&self, query: &Query) -> Result<Response, Report<AssistantError>> {
        let request_id = Uuid::new_v4();
        let span = info_span!("request", %request_id, ticker = %query.ticker);

        async move {
            info!(request = ?query.request, provider = self.provider.name(), "handling request");
            let answer = self.answer(&query.ticker, &query.request).await?;
            info!("request complete");
            Ok(Response {
                request_id,
                ticker: query.ticker.clone(),
                generated_at: Utc::now(),
                answer,
            })
        }
        .instrument(span)
        .await
    }

    async fn answer(
        &self,
        ticker: &str,
        request: &Request,
    ) -> Result<Answer, Report<AssistantError>> {
        match request {
            Request::Fact { fact } => self.fact(ticker, *fact).await.map(Answer::Fact),
            Request::Indicator { spec, full } => {
                let series = self.series(ticker, self.lookback).await?;
                self.indicator(&series, spec, *full).map(Answer::Indicator)
            }
            Request::Forecast { horizon } => {
                let series = self.series(ticker, self.forecast_lookback).await?;
                let horizon = horizon.unwrap_or(self.forecast_horizon);
                self.forecast(&series, horizon).map(Answer::Forecast)
            }
            Request::Overview => self.overview(ticker).await.map(Answer::Overview),
        }
    }

    async fn fact(&self, ticker: &str, fact: Fact) -> Result<FactAnswer, Report<AssistantError>> {
        let (value, as_of) = match fact {
            Fact::Price => {
                let series = self.series(ticker, FACT_LOOKBACK).await?;
                (facts::latest_price(&series), Some(series.latest().timestamp))
            }
            Fact::Volume => {
                let series = self.series(ticker, FACT_LOOKBACK).await?;
                let volume = facts::latest_volume(&series).ok_or_else(|| {
                    Report::new(ProviderError::MissingVolume {
                        ticker: ticker.to_owned(),
                    })
                    .change_context(AssistantError::Provider {
                        ticker: ticker.to_owned(),
                    })
                })?;
                (volume, Some(series.latest().timestamp))
            }
            Fact::MarketCap => {
                let (series, shares) = tokio::try_join!(
                    self.series(ticker, FACT_LOOKBACK),
                    self.fundamental(ticker, FundamentalField::SharesOutstanding),
                )?;
                (
                    facts::market_cap(&series, shares),
                    Some(series.latest().timestamp),
                )
            }
            Fact::PeRatio => (
                self.fundamental(ticker, FundamentalField::ForwardPe).await?,
                None,
            ),
            Fact::DividendYield => {
                let fraction = self
                    .fundamental(ticker, FundamentalField::DividendYield)
                    .await?;
                (facts::dividend_yield_percent(fraction), None)
            }
        };
        debug!(fact = %fact, value, "fact resolved");
        Ok(FactAnswer { fact, value, as_of })
    }

    fn indicator(
        &self,
        series: &Series,
        spec: &IndicatorSpec,
        full: bool,
    ) -> Result<IndicatorAnswer, Report<AssistantError>> {
        let indicator = spec
            .build(&self.defaults)
            .change_context(indicator_error(series))
            .attach_with(|| format!("indicator: {}", spec.kind))?;
        let output = indicator
            .calculate(series)
            .change_context(indicator_error(series))
            .attach_with(|| format!("indicator: {}", indicator.name()))?;

        let readings = output.latest();
        debug!(indicator = %indicator.name(), ?readings, "indicator computed");

        let history = (full && output.is_aligned()).then(|| History {
            timestamps: series.timestamps(),
            output,
        });
        Ok(IndicatorAnswer {
            kind: spec.kind,
            name: indicator.name(),
            period: spec.effective_period(&self.defaults),
            as_of: series.latest().timestamp,
            readings,
            history,
        })
    }

    fn forecast(
        &self,
        series: &Series,
        horizon: usize,
    ) -> Result<ForecastAnswer, Report<AssistantError>> {
        let (line, predictions) = LinearForecast::new(horizon)
            .and_then(|model| model.calculate_prices(&series.closes()))
            .change_context(indicator_error(series))
            .attach_with(|| format!("forecast horizon: {horizon}"))?;

        debug!(
            bars = series.len(),
            horizon,
            slope = line.slope,
            "trend line fitted"
        );
        Ok(ForecastAnswer {
            lookback: self.forecast_lookback,
            bars: series.len(),
            last_close: series.latest().close,
            as_of: series.latest().timestamp,
            slope: line.slope,
            intercept: line.intercept,
            predictions,
        })
    }

    /// Every part must succeed; one failure fails the whole overview.
    async fn overview(&self, ticker: &str) -> Result<OverviewAnswer, Report<AssistantError>> {
        let (series, forecast_series, shares) = tokio::try_join!(
            self.series(ticker, self.lookback),
            self.series(ticker, self.forecast_lookback),
            self.fundamental(ticker, FundamentalField::SharesOutstanding),
        )?;

        let line = |kind| self.indicator(&series, &IndicatorSpec::new(kind), false);
        Ok(OverviewAnswer {
            price: facts::latest_price(&series),
            as_of: series.latest().timestamp,
            market_cap: facts::market_cap(&series, shares),
            sma: line(IndicatorKind::Sma)?,
            ema: line(IndicatorKind::Ema)?,
            rsi: line(IndicatorKind::Rsi)?,
            macd: line(IndicatorKind::Macd)?,
            forecast: self.forecast(&forecast_series, self.forecast_horizon)?,
        })
    }

    async fn series(
        &self,
        ticker: &str,
        lookback: Lookback,
    ) -> Result<Series, Report<AssistantError>> {
        let series = self
            .provider
            .fetch_series(ticker, lookback)
            .await
            .change_context(AssistantError::Provider {
                ticker: ticker.to_owned(),
            })
            .attach_with(|| format!("lookback: {lookback}"))?;
        debug!(ticker, lookback = %lookback, bars = series.len(), "series fetched");
        Ok(series)
    }

    async fn fundamental(
        &self,
        ticker: &str,
        field: FundamentalField,
    ) -> Result<f64, Report<AssistantError>> {
        self.provider
            .fetch_fundamental(ticker, field)
            .await
            .change_context(AssistantError::Provider {
                ticker: ticker.to_owned(),
            })
    }
}

fn indicator_error(series: &Series) -> AssistantError {
    AssistantError::Indicator {
        ticker: series.ticker().to_owned(),
    }
}
