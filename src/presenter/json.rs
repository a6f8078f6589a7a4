use error_stack::{Report, ResultExt};

use crate::assistant::Response;
use crate::error::PresentError;
use crate::presenter::Presenter;

pub struct JsonPresenter;

impl Presenter for JsonPresenter {
    fn render(&self, response: &Response) -> Result<String, Report<PresentError>> {
        serde_json::to_string_pretty(response)
            .change_context(PresentError::Serialize)
            .attach_with(|| format!("request_id: {}", response.request_id))
    }
}
