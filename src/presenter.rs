pub mod json;
pub mod text;

use clap::ValueEnum;
use error_stack::Report;

use crate::assistant::Response;
use crate::error::PresentError;
use crate::presenter::json::JsonPresenter;
use crate::presenter::text::TextPresenter;

/// Renders an assistant response for the terminal.
pub trait Presenter: Send + Sync {
    fn render(&self, response: &Response) -> Result<String, Report<PresentError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn build_presenter(format: OutputFormat) -> Box<dyn Presenter> {
    match format {
        OutputFormat::Text => Box::new(TextPresenter),
        OutputFormat::Json => Box::new(JsonPresenter),
    }
}
