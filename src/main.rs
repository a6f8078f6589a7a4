mod assistant;
mod chat;
mod config;
mod error;
mod facts;
mod indicator;
mod model;
mod presenter;
mod provider;
mod query;
mod request;

use std::path::Path;

use clap::{Parser, Subcommand};
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

use assistant::Assistant;
use chat::Chat;
use config::AppConfig;
use facts::Fact;
use indicator::{MAX_HORIZON, MAX_WINDOW};
use model::Lookback;
use presenter::{OutputFormat, build_presenter};
use query::QueryInterpreter;
use request::{IndicatorKind, IndicatorParams, IndicatorSpec, Query, Request};

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("market data provider error")]
    Provider,
    #[display("could not interpret the question")]
    Query,
    #[display("request failed")]
    Assistant,
    #[display("failed to render the answer")]
    Present,
    #[display("chat session failed")]
    Chat,
}

#[derive(Parser)]
#[command(
    name = "stock-assistant",
    about = "Stock prices, technical indicators and simple forecasts"
)]
struct Cli {
    /// Path to the TOML configuration file; built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// History window for indicators: 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd, max
    #[arg(short, long, value_parser = parse_lookback, global = true)]
    lookback: Option<Lookback>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Latest closing price
    Price { ticker: String },

    /// Technical indicator: sma, ema, rsi, macd, bollinger
    Indicator {
        ticker: String,
        #[arg(value_parser = parse_indicator)]
        kind: IndicatorKind,
        /// Window / period (sma, ema, rsi, bollinger)
        #[arg(short, long, value_parser = parse_window)]
        period: Option<usize>,
        #[arg(long, value_parser = parse_window)]
        fast: Option<usize>,
        #[arg(long, value_parser = parse_window)]
        slow: Option<usize>,
        #[arg(long, value_parser = parse_window)]
        signal: Option<usize>,
        /// Bollinger standard deviation multiplier
        #[arg(long)]
        multiplier: Option<f64>,
        /// RSI from plain rolling means instead of exponential smoothing
        #[arg(long)]
        rolling: bool,
        /// Print the whole aligned series, not just the latest value
        #[arg(long)]
        full: bool,
    },

    /// Linear trend extrapolation of the close
    Forecast {
        ticker: String,
        /// Trading days ahead
        #[arg(short, long, value_parser = parse_horizon)]
        days: Option<usize>,
    },

    /// price, volume, market_cap, pe_ratio, dividend_yield
    Fact {
        ticker: String,
        #[arg(value_parser = parse_fact)]
        fact: Fact,
    },

    /// Price, market cap, moving averages, RSI, MACD and a forecast at once
    Overview { ticker: String },

    /// Free-text question, e.g. "what is the 50 day sma of apple"
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Interactive session: one question per line, `exit` or `quit` to leave
    Chat,
}

fn parse_lookback(s: &str) -> Result<Lookback, String> {
    Lookback::from_str(s).ok_or_else(|| format!("unknown lookback '{s}'"))
}

fn parse_window(s: &str) -> Result<usize, String> {
    parse_bounded(s, MAX_WINDOW)
}

fn parse_horizon(s: &str) -> Result<usize, String> {
    parse_bounded(s, MAX_HORIZON)
}

fn parse_bounded(s: &str, max: usize) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a positive whole number"))?;
    if value == 0 || value > max {
        return Err(format!("{value} is outside 1..={max}"));
    }
    Ok(value)
}

fn parse_indicator(s: &str) -> Result<IndicatorKind, String> {
    IndicatorKind::from_str(&s.to_lowercase()).ok_or_else(|| format!("unknown indicator '{s}'"))
}

fn parse_fact(s: &str) -> Result<Fact, String> {
    Fact::from_str(&s.to_lowercase()).ok_or_else(|| format!("unknown fact '{s}'"))
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => config::load(Path::new(path)).change_context(AppError::Config)?,
        None => AppConfig::default(),
    };

    init_tracing(&config);

    let provider = provider::build_provider(&config.provider).change_context(AppError::Provider)?;
    info!(provider = provider.name(), "provider ready");

    let mut assistant = Assistant::new(provider, &config);
    if let Some(lookback) = cli.lookback {
        assistant = assistant.with_lookback(lookback);
    }

    let presenter = build_presenter(cli.format);

    let query = match cli.command {
        Command::Chat => {
            let chat = Chat::new(
                &assistant,
                QueryInterpreter::new(&config.aliases),
                presenter.as_ref(),
            );
            chat.run(BufReader::new(tokio::io::stdin()), &mut tokio::io::stdout())
                .await
                .change_context(AppError::Chat)?;
            return Ok(());
        }
        command => build_query(command, &config)?,
    };
    let response = assistant
        .handle(&query)
        .await
        .change_context(AppError::Assistant)?;

    let output = presenter
        .render(&response)
        .change_context(AppError::Present)?;
    println!("{output}");
    Ok(())
}

/// Logs go to stderr; stdout carries only the answer.
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn build_query(command: Command, config: &AppConfig) -> Result<Query, Report<AppError>> {
    let query = match command {
        Command::Price { ticker } => Query::new(ticker, Request::Fact { fact: Fact::Price }),
        Command::Indicator {
            ticker,
            kind,
            period,
            fast,
            slow,
            signal,
            multiplier,
            rolling,
            full,
        } => {
            let spec = IndicatorSpec {
                kind,
                params: IndicatorParams {
                    period,
                    fast_period: fast,
                    slow_period: slow,
                    signal_period: signal,
                    std_dev_multiplier: multiplier,
                    rolling_rsi: rolling,
                },
            };
            Query::new(ticker, Request::Indicator { spec, full })
        }
        Command::Forecast { ticker, days } => {
            Query::new(ticker, Request::Forecast { horizon: days })
        }
        Command::Fact { ticker, fact } => Query::new(ticker, Request::Fact { fact }),
        Command::Overview { ticker } => Query::new(ticker, Request::Overview),
        Command::Ask { question } => {
            let question = question.join(" ");
            let query = QueryInterpreter::new(&config.aliases)
                .interpret(&question)
                .change_context(AppError::Query)?;
            info!(ticker = %query.ticker, request = ?query.request, "question interpreted");
            query
        }
        Command::Chat => {
            return Err(Report::new(AppError::Query).attach("chat reads its questions from stdin"));
        }
    };
    Ok(query)
}
