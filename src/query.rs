//! Keyword-based interpretation of free-text questions such as
//! "what is the 50 day sma of apple?".

use std::collections::BTreeMap;

use error_stack::{Report, ResultExt, bail};

use crate::error::QueryError;
use crate::facts::Fact;
use crate::request::{IndicatorKind, IndicatorSpec, Query, Request};

/// Words that look like tickers (short, alphabetic) but never are.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "at", "be", "can", "day", "days", "do", "for", "from", "get", "give",
    "how", "i", "in", "is", "it", "me", "much", "my", "next", "now", "of", "on", "over", "per",
    "say", "show", "tell", "the", "to", "today", "us", "was", "what", "whats", "which", "will",
    "with", "you", "your", "week", "weeks", "ahead", "stock", "share", "index", "line",
    "bands", "band", "cap", "ratio", "yield", "trend", "latest", "value", "about", "full", "please", "shares",
];

/// Words that name a request; excluded from ticker detection.
const KEYWORDS: &[&str] = &[
    "price", "sma", "ema", "rsi", "macd", "bollinger", "pe", "p/e", "dividend", "volume",
    "market", "forecast", "predict", "overview", "summary", "simple", "moving", "average",
    "exponential", "relative", "strength", "signal", "capitalization", "earnings", "rolling",
    "history", "series",
];

pub struct QueryInterpreter<'a> {
    aliases: &'a BTreeMap<String, String>,
}

impl<'a> QueryInterpreter<'a> {
    pub fn new(aliases: &'a BTreeMap<String, String>) -> Self {
        Self { aliases }
    }

    pub fn interpret(&self, message: &str) -> Result<Query, Report<QueryError>> {
        let original = tokenize(message);
        if original.is_empty() {
            bail!(QueryError::Empty);
        }
        let tokens: Vec<String> = original.iter().map(|t| t.to_lowercase()).collect();
        let text = tokens.join(" ");

        let ticker = self
            .find_ticker(&original, &tokens)
            .ok_or_else(|| Report::new(QueryError::MissingTicker))
            .attach_with(|| format!("message: {message:?}"))?;
        let number = first_number(&tokens);
        let request = classify(&tokens, &text, number)
            .ok_or_else(|| Report::new(QueryError::UnknownIntent))
            .attach_with(|| format!("message: {message:?}"))?;

        Ok(Query::new(ticker, request))
    }

    fn find_ticker(&self, original: &[String], tokens: &[String]) -> Option<String> {
        if let Some(ticker) = tokens.iter().find_map(|t| self.aliases.get(t)) {
            return Some(ticker.clone());
        }
        let candidate = |t: &&String| {
            (1..=6).contains(&t.len())
                && t.chars().all(|c| c.is_ascii_alphabetic() || c == '.')
                && !STOPWORDS.contains(&t.to_lowercase().as_str())
                && !KEYWORDS.contains(&t.to_lowercase().as_str())
        };
        // Symbols typed in upper case win over lowercase guesses.
        original
            .iter()
            .filter(candidate)
            .find(|t| t.chars().all(|c| c.is_ascii_uppercase()) && t.len() > 1)
            .or_else(|| original.iter().find(candidate))
            .map(|t| t.to_uppercase())
    }
}

/// Split on anything that is not alphanumeric, keeping `/`, `-` and `.`
/// inside words ("p/e", "price-to-earnings", "brk.b").
fn tokenize(message: &str) -> Vec<String> {
    message
        .split(|c: char| !(c.is_alphanumeric() || matches!(c, '/' | '-' | '.')))
        .map(|t| t.trim_matches(|c: char| matches!(c, '/' | '-' | '.')))
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

fn first_number(tokens: &[String]) -> Option<usize> {
    tokens.iter().find_map(|t| t.parse::<usize>().ok())
}

fn classify(tokens: &[String], text: &str, number: Option<usize>) -> Option<Request> {
    let has = |word: &str| tokens.iter().any(|t| t == word);
    let phrase = |p: &str| text.contains(p);
    let indicator = |kind: IndicatorKind| {
        let spec = match number {
            Some(n) if kind != IndicatorKind::Macd => IndicatorSpec::new(kind).with_period(n),
            _ => IndicatorSpec::new(kind),
        };
        Some(Request::Indicator {
            spec,
            full: has("history") || has("series") || has("full"),
        })
    };

    if has("forecast") || has("predict") || has("prediction") || has("projection") {
        return Some(Request::Forecast { horizon: number });
    }
    if has("macd") || phrase("convergence divergence") {
        return indicator(IndicatorKind::Macd);
    }
    if has("bollinger") {
        return indicator(IndicatorKind::Bollinger);
    }
    if has("sma") || phrase("simple moving average") {
        return indicator(IndicatorKind::Sma);
    }
    if has("ema") || phrase("exponential moving average") {
        return indicator(IndicatorKind::Ema);
    }
    if has("rsi") || phrase("relative strength") {
        let mut request = indicator(IndicatorKind::Rsi)?;
        if let Request::Indicator { spec, .. } = &mut request {
            spec.params.rolling_rsi = has("rolling");
        }
        return Some(request);
    }
    if has("p/e") || has("pe") || has("price-to-earnings") || phrase("price to earnings") {
        return Some(Request::Fact { fact: Fact::PeRatio });
    }
    if has("dividend") {
        return Some(Request::Fact {
            fact: Fact::DividendYield,
        });
    }
    if has("volume") {
        return Some(Request::Fact { fact: Fact::Volume });
    }
    if phrase("market cap") || has("capitalization") || has("marketcap") {
        return Some(Request::Fact {
            fact: Fact::MarketCap,
        });
    }
    if has("overview") || has("summary") || has("report") {
        return Some(Request::Overview);
    }
    if has("price") || has("quote") || has("trading") {
        return Some(Request::Fact { fact: Fact::Price });
    }
    None
}
