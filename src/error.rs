use derive_more::{Display, Error};

use crate::model::FundamentalField;

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum SeriesError {
    #[display("series is empty")]
    Empty,
    #[display("timestamps not strictly increasing at index {index}")]
    OutOfOrder { index: usize },
}

#[derive(Debug, Display, Error)]
pub enum ProviderError {
    #[display("unsupported provider \"{name}\"")]
    Unsupported { name: String },
    #[display("request to {provider} failed")]
    Request { provider: String },
    #[display("{provider} answered with HTTP {status}")]
    Status { provider: String, status: u16 },
    #[display("failed to parse response from {provider}")]
    ResponseParse { provider: String },
    #[display("{provider} has no data for ticker {ticker}")]
    UnknownTicker { provider: String, ticker: String },
    #[display("{provider} returned an unusable series for {ticker}")]
    InvalidSeries { provider: String, ticker: String },
    #[display("latest bar for {ticker} has no volume")]
    MissingVolume { ticker: String },
    #[display("field {field} missing for {ticker}")]
    MissingField {
        ticker: String,
        field: FundamentalField,
    },
}

#[derive(Debug, Display, Error)]
pub enum IndicatorError {
    #[display("insufficient data: need {required}, got {available}")]
    InsufficientData { required: usize, available: usize },
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
}

#[derive(Debug, Display, Error)]
pub enum QueryError {
    #[display("query is empty")]
    Empty,
    #[display("could not identify the ticker symbol")]
    MissingTicker,
    #[display("could not understand the request")]
    UnknownIntent,
}

#[derive(Debug, Display, Error)]
pub enum AssistantError {
    #[display("market data unavailable for {ticker}")]
    Provider { ticker: String },
    #[display("indicator computation failed for {ticker}")]
    Indicator { ticker: String },
}

#[derive(Debug, Display, Error)]
pub enum ChatError {
    #[display("failed to read from the console")]
    Read,
    #[display("failed to write to the console")]
    Write,
}

#[derive(Debug, Display, Error)]
pub enum PresentError {
    #[display("failed to serialize response")]
    Serialize,
}
