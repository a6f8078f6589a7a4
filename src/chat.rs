//! Interactive question loop behind the `chat` subcommand.

use std::error::Error;

use error_stack::{Report, ResultExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::assistant::Assistant;
use crate::error::{ChatError, IndicatorError, ProviderError};
use crate::presenter::Presenter;
use crate::query::QueryInterpreter;

const EXAMPLES: &[&str] = &[
    "What is the price of AAPL?",
    "Show me the 50 day SMA for MSFT",
    "RSI for NVDA",
    "MACD of AMZN",
    "Bollinger bands for TSLA",
    "Predict the price of GOOGL 10 days ahead",
    "Market cap of Netflix",
    "P/E ratio of Google",
    "Dividend yield of KO",
    "Overview of IBM",
];

/// One chat session: questions in, rendered answers out.
pub struct Chat<'a> {
    assistant: &'a Assistant,
    interpreter: QueryInterpreter<'a>,
    presenter: &'a dyn Presenter,
}

impl<'a> Chat<'a> {
    pub fn new(
        assistant: &'a Assistant,
        interpreter: QueryInterpreter<'a>,
        presenter: &'a dyn Presenter,
    ) -> Self {
        Self {
            assistant,
            interpreter,
            presenter,
        }
    }

    /// Answers one question per line of `input` until `exit`, `quit` or end
    /// of input. A question that fails gets an apology and the loop goes on.
    pub async fn run<R, W>(&self, input: R, output: &mut W) -> Result<usize, Report<ChatError>>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        write(output, &welcome()).await?;

        let mut lines = input.lines();
        let mut answered = 0;
        loop {
            write(output, "\nYou: ").await?;
            let Some(line) = lines.next_line().await.change_context(ChatError::Read)? else {
                break;
            };
            let question = line.trim();
            if question.is_empty() {
                continue;
            }
            if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
                break;
            }

            let reply = self.reply(question).await;
            write(output, &format!("Bot: {reply}\n")).await?;
            answered += 1;
        }

        write(output, "\nGoodbye!\n").await?;
        info!(answered, "chat session closed");
        Ok(answered)
    }

    async fn reply(&self, question: &str) -> String {
        let query = match self.interpreter.interpret(question) {
            Ok(query) => query,
            Err(report) => return apology(&report),
        };
        debug!(ticker = %query.ticker, request = ?query.request, "question interpreted");

        let response = match self.assistant.handle(&query).await {
            Ok(response) => response,
            Err(report) => return apology(&report),
        };

        self.presenter
            .render(&response)
            .unwrap_or_else(|report| apology(&report))
    }
}

fn welcome() -> String {
    let mut text = String::from(
        "Welcome to the stock assistant!\n\
         Ask about prices, volumes, market cap, P/E ratios, dividend yields, \
         SMA, EMA, RSI, MACD, Bollinger bands, forecasts or an overview.\n\
         Examples:\n",
    );
    for example in EXAMPLES {
        text.push_str(&format!("- {example}\n"));
    }
    text.push_str("Type 'exit' or 'quit' to leave.\n");
    text
}

/// The most specific reason the report carries, as a sentence.
fn apology<C>(report: &Report<C>) -> String
where
    C: Error + Send + Sync + 'static,
{
    warn!(error = ?report, "chat question failed");
    let reason = report
        .downcast_ref::<ProviderError>()
        .map(ToString::to_string)
        .or_else(|| report.downcast_ref::<IndicatorError>().map(ToString::to_string))
        .unwrap_or_else(|| report.current_context().to_string());
    format!("Sorry, {reason}.")
}

async fn write<W>(output: &mut W, text: &str) -> Result<(), Report<ChatError>>
where
    W: AsyncWrite + Unpin,
{
    output
        .write_all(text.as_bytes())
        .await
        .change_context(ChatError::Write)?;
    output.flush().await.change_context(ChatError::Write)
}
