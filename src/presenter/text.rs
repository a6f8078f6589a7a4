use chrono::{DateTime, Utc};
use error_stack::Report;

use crate::assistant::{
    Answer, FactAnswer, ForecastAnswer, History, IndicatorAnswer, OverviewAnswer, Response,
};
use crate::error::PresentError;
use crate::facts::Fact;
use crate::indicator::{IndicatorOutput, Line};
use crate::presenter::Presenter;
use crate::request::IndicatorKind;

const OVERBOUGHT: f64 = 70.0;
const OVERSOLD: f64 = 30.0;

/// Plain-English sentences, one answer per response.
pub struct TextPresenter;

impl Presenter for TextPresenter {
    fn render(&self, response: &Response) -> Result<String, Report<PresentError>> {
        let ticker = response.ticker.as_str();
        Ok(match &response.answer {
            Answer::Fact(answer) => fact_sentence(ticker, answer),
            Answer::Indicator(answer) => match &answer.history {
                Some(history) => format!(
                    "{}\n\n{}",
                    indicator_sentence(ticker, answer),
                    history_table(history)
                ),
                None => indicator_sentence(ticker, answer),
            },
            Answer::Forecast(answer) => forecast_sentence(ticker, answer),
            Answer::Overview(overview) => overview_text(ticker, overview),
        })
    }
}

fn fact_sentence(ticker: &str, answer: &FactAnswer) -> String {
    let value = answer.value;
    let sentence = match answer.fact {
        Fact::Price => format!("The latest price of {ticker} is {}", money(value, 2)),
        Fact::Volume => format!(
            "The latest trading volume of {ticker} is {} shares",
            number(value, 0)
        ),
        Fact::MarketCap => format!(
            "The market capitalization of {ticker} is {}",
            money(value, 0)
        ),
        Fact::PeRatio => format!("The forward P/E ratio of {ticker} is {}", number(value, 2)),
        Fact::DividendYield => format!("The dividend yield of {ticker} is {}%", number(value, 2)),
    };
    match answer.as_of {
        Some(as_of) => format!("{sentence} (as of {}).", date(as_of)),
        None => format!("{sentence}."),
    }
}

fn indicator_sentence(ticker: &str, answer: &IndicatorAnswer) -> String {
    let reading = |i: usize| answer.readings.get(i).and_then(|r| r.value);
    let price = |v: Option<f64>| or_na(v, |x| money(x, 2));
    let plain = |v: Option<f64>| or_na(v, |x| number(x, 2));
    let period = answer.period.unwrap_or_default();

    match answer.kind {
        IndicatorKind::Sma | IndicatorKind::Ema => format!(
            "The {period}-day {} of {ticker} is {}.",
            answer.kind.as_str().to_uppercase(),
            price(reading(0))
        ),
        IndicatorKind::Rsi => format!(
            "The {period}-day RSI of {ticker} is {}{}.",
            plain(reading(0)),
            rsi_zone(reading(0))
        ),
        IndicatorKind::Macd => format!(
            "The {} of {ticker} is {} with signal line {} (histogram {}).",
            answer.name,
            plain(reading(0)),
            plain(reading(1)),
            plain(reading(2))
        ),
        IndicatorKind::Bollinger => format!(
            "The {} bands of {ticker} are: upper {}, middle {}, lower {}.",
            answer.name,
            price(reading(0)),
            price(reading(1)),
            price(reading(2))
        ),
    }
}

fn history_table(history: &History) -> String {
    let columns: Vec<(&str, &Line)> = match &history.output {
        IndicatorOutput::Line { values } => vec![("value", values)],
        IndicatorOutput::Macd {
            macd,
            signal,
            histogram,
        } => vec![("macd", macd), ("signal", signal), ("histogram", histogram)],
        IndicatorOutput::Bands {
            upper,
            middle,
            lower,
        } => vec![("upper", upper), ("middle", middle), ("lower", lower)],
        IndicatorOutput::Forecast { predictions, .. } => {
            return predictions
                .iter()
                .enumerate()
                .map(|(i, p)| format!("t+{:<8} {:>12.2}", i + 1, p))
                .collect::<Vec<_>>()
                .join("\n");
        }
    };

    let mut table = format!("{:<10}", "date");
    for (name, _) in &columns {
        table.push_str(&format!(" {name:>12}"));
    }
    for (i, timestamp) in history.timestamps.iter().enumerate() {
        table.push('\n');
        table.push_str(&date(*timestamp));
        for (_, values) in &columns {
            let cell = or_dash(values.get(i).copied().flatten());
            table.push_str(&format!(" {cell:>12}"));
        }
    }
    table
}

fn forecast_sentence(ticker: &str, answer: &ForecastAnswer) -> String {
    let Some(&target) = answer.predictions.last() else {
        return format!("No forecast is available for {ticker}.");
    };
    format!(
        "Linear trend forecast for {ticker}: {} in {} trading days \
         (last close {} on {}, trend {:+.2} per day over {} bars). \
         This is a naive extrapolation, not investment advice.",
        money(target, 2),
        answer.predictions.len(),
        money(answer.last_close, 2),
        date(answer.as_of),
        answer.slope,
        answer.bars
    )
}

fn overview_text(ticker: &str, overview: &OverviewAnswer) -> String {
    let latest = |answer: &IndicatorAnswer, i: usize| answer.readings.get(i).and_then(|r| r.value);
    let forecast = &overview.forecast;

    let rows = [
        ("Price".to_owned(), money(overview.price, 2)),
        ("Market cap".to_owned(), money(overview.market_cap, 0)),
        (
            overview.sma.name.clone(),
            or_na(latest(&overview.sma, 0), |v| money(v, 2)),
        ),
        (
            overview.ema.name.clone(),
            or_na(latest(&overview.ema, 0), |v| money(v, 2)),
        ),
        (
            overview.rsi.name.clone(),
            format!(
                "{}{}",
                or_na(latest(&overview.rsi, 0), |v| number(v, 2)),
                rsi_zone(latest(&overview.rsi, 0))
            ),
        ),
        (
            overview.macd.name.clone(),
            format!(
                "{} (signal {})",
                or_na(latest(&overview.macd, 0), |v| number(v, 2)),
                or_na(latest(&overview.macd, 1), |v| number(v, 2))
            ),
        ),
        (
            "Forecast".to_owned(),
            match forecast.predictions.last() {
                Some(&target) => format!(
                    "{} in {} trading days (trend {:+.2} per day)",
                    money(target, 2),
                    forecast.predictions.len(),
                    forecast.slope
                ),
                None => "n/a".to_owned(),
            },
        ),
    ];

    let mut text = format!("{ticker} overview as of {}", date(overview.as_of));
    for (label, value) in rows {
        text.push_str(&format!("\n  {label:<18}{value}"));
    }
    text
}

fn rsi_zone(value: Option<f64>) -> &'static str {
    match value {
        Some(v) if v >= OVERBOUGHT => " (overbought)",
        Some(v) if v <= OVERSOLD => " (oversold)",
        _ => "",
    }
}

fn date(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d").to_string()
}

fn or_na(value: Option<f64>, format: impl Fn(f64) -> String) -> String {
    value.map_or_else(|| "n/a".to_owned(), format)
}

fn or_dash(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_owned(), |v| format!("{v:.2}"))
}

fn money(value: f64, decimals: usize) -> String {
    let (sign, digits) = split_sign(value, decimals);
    format!("{sign}${digits}")
}

fn number(value: f64, decimals: usize) -> String {
    let (sign, digits) = split_sign(value, decimals);
    format!("{sign}{digits}")
}

/// Sign and thousands-grouped magnitude. Values that round to zero carry no sign.
fn split_sign(value: f64, decimals: usize) -> (&'static str, String) {
    let digits = format!("{:.*}", decimals, value.abs());
    let is_zero = digits.chars().all(|c| matches!(c, '0' | '.'));
    let sign = if value < 0.0 && !is_zero { "-" } else { "" };
    (sign, group_thousands(&digits))
}

fn group_thousands(digits: &str) -> String {
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };
    let mut grouped = String::with_capacity(digits.len() + int.len() / 3);
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if let Some(frac) = frac {
        grouped.push('.');
        grouped.push_str(frac);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    use super::*;
    use crate::indicator::Reading;
    use crate::model::Lookback;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 21, 0, 0).unwrap()
    }

    fn respond(answer: Answer) -> String {
        let response = Response {
            request_id: Uuid::nil(),
            ticker: "AAPL".into(),
            generated_at: as_of(),
            answer,
        };
        TextPresenter.render(&response).unwrap()
    }

    fn reading(label: &str, value: Option<f64>) -> Reading {
        Reading {
            label: label.into(),
            value,
        }
    }

    fn indicator(kind: IndicatorKind, name: &str, readings: Vec<Reading>) -> IndicatorAnswer {
        IndicatorAnswer {
            kind,
            name: name.into(),
            period: Some(20),
            as_of: as_of(),
            readings,
            history: None,
        }
    }

    fn forecast() -> ForecastAnswer {
        ForecastAnswer {
            lookback: Lookback::Year5,
            bars: 1_250,
            last_close: 180.0,
            as_of: as_of(),
            slope: 0.12,
            intercept: 20.0,
            predictions: vec![180.1, 180.2, 184.5],
        }
    }

    #[test]
    fn price_sentence() {
        let text = respond(Answer::Fact(FactAnswer {
            fact: Fact::Price,
            value: 123.45,
            as_of: Some(as_of()),
        }));
        assert_eq!(text, "The latest price of AAPL is $123.45 (as of 2024-03-01).");
    }

    #[test]
    fn market_cap_is_grouped() {
        let text = respond(Answer::Fact(FactAnswer {
            fact: Fact::MarketCap,
            value: 2_345_678_901.4,
            as_of: None,
        }));
        assert_eq!(text, "The market capitalization of AAPL is $2,345,678,901.");
    }

    #[test]
    fn dividend_yield_in_percent() {
        let text = respond(Answer::Fact(FactAnswer {
            fact: Fact::DividendYield,
            value: 0.52,
            as_of: None,
        }));
        assert_eq!(text, "The dividend yield of AAPL is 0.52%.");
    }

    #[test]
    fn sma_sentence() {
        let answer = indicator(
            IndicatorKind::Sma,
            "SMA(20)",
            vec![reading("value", Some(123.454))],
        );
        assert_eq!(
            respond(Answer::Indicator(answer)),
            "The 20-day SMA of AAPL is $123.45."
        );
    }

    #[test]
    fn rsi_flags_overbought() {
        let mut answer = indicator(IndicatorKind::Rsi, "RSI(14)", vec![reading("value", Some(100.0))]);
        answer.period = Some(14);
        assert_eq!(
            respond(Answer::Indicator(answer)),
            "The 14-day RSI of AAPL is 100.00 (overbought)."
        );
    }

    #[test]
    fn undefined_reading_is_na() {
        let answer = indicator(
            IndicatorKind::Macd,
            "MACD(12, 26, 9)",
            vec![
                reading("macd", Some(-1.5)),
                reading("signal", None),
                reading("histogram", Some(0.25)),
            ],
        );
        assert_eq!(
            respond(Answer::Indicator(answer)),
            "The MACD(12, 26, 9) of AAPL is -1.50 with signal line n/a (histogram 0.25)."
        );
    }

    #[test]
    fn history_table_has_a_row_per_bar() {
        let timestamps: Vec<_> = (0..3).map(|i| as_of() + Duration::days(i)).collect();
        let mut answer = indicator(
            IndicatorKind::Sma,
            "SMA(2)",
            vec![reading("value", Some(2.5))],
        );
        answer.history = Some(History {
            timestamps,
            output: IndicatorOutput::Line {
                values: vec![None, Some(1.5), Some(2.5)],
            },
        });
        let text = respond(Answer::Indicator(answer));
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[2].starts_with("date"));
        assert!(lines[3].starts_with("2024-03-01") && lines[3].ends_with('-'));
        assert!(lines[5].starts_with("2024-03-03") && lines[5].ends_with("2.50"));
    }

    #[test]
    fn forecast_sentence_mentions_horizon() {
        let text = respond(Answer::Forecast(forecast()));
        assert!(text.starts_with("Linear trend forecast for AAPL: $184.50 in 3 trading days"));
        assert!(text.contains("trend +0.12 per day over 1250 bars"));
        assert!(text.contains("naive extrapolation"));
    }

    #[test]
    fn overview_lists_every_part() {
        let overview = OverviewAnswer {
            price: 180.0,
            as_of: as_of(),
            market_cap: 2_800_000_000_000.0,
            sma: indicator(IndicatorKind::Sma, "SMA(20)", vec![reading("value", Some(175.0))]),
            ema: indicator(IndicatorKind::Ema, "EMA(20)", vec![reading("value", Some(176.0))]),
            rsi: indicator(IndicatorKind::Rsi, "RSI(14)", vec![reading("value", Some(25.0))]),
            macd: indicator(
                IndicatorKind::Macd,
                "MACD(12, 26, 9)",
                vec![
                    reading("macd", Some(1.0)),
                    reading("signal", Some(0.5)),
                    reading("histogram", Some(0.5)),
                ],
            ),
            forecast: forecast(),
        };
        let text = respond(Answer::Overview(overview));
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "AAPL overview as of 2024-03-01");
        assert_eq!(lines.len(), 8);
        assert!(lines[2].ends_with("$2,800,000,000,000"));
        assert!(lines[5].ends_with("25.00 (oversold)"));
        assert!(lines[6].ends_with("1.00 (signal 0.50)"));
    }

    #[test]
    fn grouping_and_signs() {
        assert_eq!(number(1_234_567.891, 2), "1,234,567.89");
        assert_eq!(number(999.0, 0), "999");
        assert_eq!(number(-0.001, 2), "0.00");
        assert_eq!(money(-1_500.0, 2), "-$1,500.00");
    }
}
