use std::collections::BTreeMap;
use std::path::Path;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::indicator::{MAX_HORIZON, MAX_WINDOW};
use crate::model::Lookback;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_lookback() -> String {
    "1y".into()
}

fn default_forecast_lookback() -> String {
    "5y".into()
}

fn default_forecast_horizon() -> usize {
    30
}

fn default_provider_name() -> String {
    "yahoo".into()
}

fn default_base_url() -> String {
    "https://query1.finance.yahoo.com".into()
}

fn default_requests_per_second() -> u32 {
    2
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; stock-assistant)".into()
}

fn default_window() -> usize {
    20
}

fn default_rsi_period() -> usize {
    14
}

fn default_macd_fast() -> usize {
    12
}

fn default_macd_slow() -> usize {
    26
}

fn default_macd_signal() -> usize {
    9
}

fn default_bollinger_multiplier() -> f64 {
    2.0
}

fn default_aliases() -> BTreeMap<String, String> {
    [
        ("apple", "AAPL"),
        ("microsoft", "MSFT"),
        ("google", "GOOGL"),
        ("alphabet", "GOOGL"),
        ("amazon", "AMZN"),
        ("facebook", "META"),
        ("meta", "META"),
        ("tesla", "TSLA"),
        ("netflix", "NFLX"),
        ("nvidia", "NVDA"),
    ]
    .into_iter()
    .map(|(name, ticker)| (name.to_owned(), ticker.to_owned()))
    .collect()
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub defaults: IndicatorDefaults,
    /// Lowercase company name -> ticker symbol, used by the query interpreter.
    #[serde(default = "default_aliases")]
    pub aliases: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_lookback")]
    pub lookback: String,
    #[serde(default = "default_forecast_lookback")]
    pub forecast_lookback: String,
    #[serde(default = "default_forecast_horizon")]
    pub forecast_horizon: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            lookback: default_lookback(),
            forecast_lookback: default_forecast_lookback(),
            forecast_horizon: default_forecast_horizon(),
        }
    }
}

impl GeneralConfig {
    /// Validated by [`load`]; falls back to one year otherwise.
    pub fn lookback(&self) -> Lookback {
        Lookback::from_str(&self.lookback).unwrap_or(Lookback::Year1)
    }

    pub fn forecast_lookback(&self) -> Lookback {
        Lookback::from_str(&self.forecast_lookback).unwrap_or(Lookback::Year5)
    }
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_name")]
    pub name: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Sent as `X-API-KEY` when set; public Yahoo endpoints need none.
    pub api_key: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_url: default_base_url(),
            requests_per_second: default_requests_per_second(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorDefaults {
    #[serde(default = "default_window")]
    pub sma_window: usize,
    #[serde(default = "default_window")]
    pub ema_window: usize,
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,
    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,
    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,
    #[serde(default = "default_window")]
    pub bollinger_period: usize,
    #[serde(default = "default_bollinger_multiplier")]
    pub bollinger_multiplier: f64,
}

impl Default for IndicatorDefaults {
    fn default() -> Self {
        Self {
            sma_window: default_window(),
            ema_window: default_window(),
            rsi_period: default_rsi_period(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
            bollinger_period: default_window(),
            bollinger_multiplier: default_bollinger_multiplier(),
        }
    }
}

/// Built-in configuration, identical to an empty file.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            provider: ProviderConfig::default(),
            defaults: IndicatorDefaults::default(),
            aliases: default_aliases(),
        }
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

const VALID_LOG_FORMATS: &[&str] = &["text", "json"];
const VALID_PROVIDERS: &[&str] = &["yahoo"];

pub(crate) fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(config)?;
    validate_provider(config)?;
    validate_defaults(config)?;
    validate_aliases(config)?;
    Ok(())
}

fn invalid(field: String) -> Report<ConfigError> {
    Report::new(ConfigError::Validation { field })
}

fn validate_general(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let general = &config.general;
    if !VALID_LOG_FORMATS.contains(&general.log_format.as_str()) {
        return Err(invalid(format!(
            "general.log_format \"{}\" is not one of {VALID_LOG_FORMATS:?}",
            general.log_format
        )));
    }
    for (key, value) in [
        ("lookback", &general.lookback),
        ("forecast_lookback", &general.forecast_lookback),
    ] {
        if Lookback::from_str(value).is_none() {
            return Err(invalid(format!(
                "general.{key}: unknown lookback \"{value}\""
            )));
        }
    }
    if !(1..=MAX_HORIZON).contains(&general.forecast_horizon) {
        return Err(invalid(format!(
            "general.forecast_horizon must be in 1..={MAX_HORIZON}"
        )));
    }
    Ok(())
}

fn validate_provider(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let provider = &config.provider;
    if !VALID_PROVIDERS.contains(&provider.name.as_str()) {
        return Err(invalid(format!(
            "provider.name \"{}\" is not supported",
            provider.name
        )));
    }
    if !provider.base_url.starts_with("http://") && !provider.base_url.starts_with("https://") {
        return Err(invalid(format!(
            "provider.base_url \"{}\" must be an http(s) URL",
            provider.base_url
        )));
    }
    if provider.requests_per_second == 0 {
        return Err(invalid("provider.requests_per_second must be > 0".into()));
    }
    if provider.timeout_secs == 0 {
        return Err(invalid("provider.timeout_secs must be > 0".into()));
    }
    Ok(())
}

fn validate_defaults(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let d = &config.defaults;
    for (key, value) in [
        ("sma_window", d.sma_window),
        ("ema_window", d.ema_window),
        ("rsi_period", d.rsi_period),
        ("macd_fast", d.macd_fast),
        ("macd_slow", d.macd_slow),
        ("macd_signal", d.macd_signal),
    ] {
        if !(1..=MAX_WINDOW).contains(&value) {
            return Err(invalid(format!("defaults.{key} must be in 1..={MAX_WINDOW}")));
        }
    }
    if d.macd_fast >= d.macd_slow {
        return Err(invalid(
            "defaults.macd_fast must be smaller than defaults.macd_slow".into(),
        ));
    }
    if !(2..=MAX_WINDOW).contains(&d.bollinger_period) {
        return Err(invalid(format!(
            "defaults.bollinger_period must be in 2..={MAX_WINDOW}"
        )));
    }
    if !d.bollinger_multiplier.is_finite() || d.bollinger_multiplier <= 0.0 {
        return Err(invalid(
            "defaults.bollinger_multiplier must be a positive number".into(),
        ));
    }
    Ok(())
}

fn validate_aliases(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    for (name, ticker) in &config.aliases {
        if name.is_empty() || name.chars().any(|c| c.is_uppercase()) {
            return Err(invalid(format!(
                "aliases: name \"{name}\" must be non-empty lowercase"
            )));
        }
        if ticker.is_empty() || ticker.chars().any(char::is_whitespace) {
            return Err(invalid(format!(
                "aliases[\"{name}\"]: ticker \"{ticker}\" is not a symbol"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> AppConfig {
        toml::from_str(toml).expect("parse failed")
    }

    #[test]
    fn valid_full_config_parses() {
        let toml = r#"
[general]
log_level = "debug"
log_format = "json"
lookback = "6mo"
forecast_lookback = "2y"
forecast_horizon = 10

[provider]
name = "yahoo"
base_url = "http://localhost:8080"
requests_per_second = 5
timeout_secs = 3
api_key = "secret"

[defaults]
sma_window = 50
rsi_period = 7
bollinger_multiplier = 2.5

[aliases]
apple = "AAPL"
"#;
        let config = parse(toml);
        assert!(validate(&config).is_ok());
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.lookback(), Lookback::Month6);
        assert_eq!(config.general.forecast_lookback(), Lookback::Year2);
        assert_eq!(config.provider.api_key.as_deref(), Some("secret"));
        assert_eq!(config.defaults.sma_window, 50);
        assert_eq!(config.defaults.ema_window, 20);
        assert_eq!(config.aliases.len(), 1);
    }

    #[test]
    fn defaults_applied_when_sections_omitted() {
        let config = parse("");
        assert!(validate(&config).is_ok());
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "text");
        assert_eq!(config.general.lookback(), Lookback::Year1);
        assert_eq!(config.general.forecast_horizon, 30);
        assert_eq!(config.provider.name, "yahoo");
        assert_eq!(config.provider.requests_per_second, 2);
        assert_eq!(config.defaults.rsi_period, 14);
        assert_eq!(config.defaults.bollinger_multiplier, 2.0);
        assert_eq!(config.aliases.get("apple").map(String::as_str), Some("AAPL"));
    }

    #[test]
    fn default_matches_empty_file() {
        let config = AppConfig::default();
        assert!(validate(&config).is_ok());
        assert_eq!(config.aliases, default_aliases());
        assert_eq!(config.defaults.macd_slow, 26);
    }

    #[test]
    fn invalid_lookback_rejected() {
        let config = parse("[general]\nlookback = \"3y\"\n");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn oversized_horizon_and_window_rejected() {
        let config = parse("[general]\nforecast_horizon = 1000000000000\n");
        assert!(validate(&config).is_err());
        let config = parse("[defaults]\nrsi_period = 10001\n");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn invalid_log_format_rejected() {
        let config = parse("[general]\nlog_format = \"xml\"\n");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_rate_limit_rejected() {
        let config = parse("[provider]\nrequests_per_second = 0\n");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn unknown_provider_rejected() {
        let config = parse("[provider]\nname = \"bloomberg\"\n");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn macd_fast_not_below_slow_rejected() {
        let config = parse("[defaults]\nmacd_fast = 26\nmacd_slow = 12\n");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn bollinger_period_one_rejected() {
        let config = parse("[defaults]\nbollinger_period = 1\n");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn uppercase_alias_rejected() {
        let config = parse("[aliases]\nApple = \"AAPL\"\n");
        assert!(validate(&config).is_err());
    }
}
