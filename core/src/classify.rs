//! Turns raw responses into a payload or a [`ClassifiedFailure`].

use tracing::error;

use crate::error::{ApiError, ClassifiedFailure};
use crate::format::OutputFormat;
use crate::http::HttpResponse;
use crate::response::ApiResponse;

/// Classifies responses; `raw_output` drops the parsed error message from
/// the composed text and leaves only the raw body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseClassifier {
    raw_output: bool,
}

impl ResponseClassifier {
    pub fn new(raw_output: bool) -> Self {
        Self { raw_output }
    }

    pub fn raw_output(&self) -> bool {
        self.raw_output
    }

    /// Parse and classify. Error-flagged responses are logged at error
    /// severity and returned as [`ApiError::Api`].
    pub fn classify(
        &self,
        response: HttpResponse,
        format: OutputFormat,
    ) -> Result<ApiResponse, ApiError> {
        let parsed = ApiResponse::parse(response, format)?;
        if !parsed.is_error() {
            return Ok(parsed);
        }

        let message = self.compose_message(&parsed);
        error!("{message}");
        Err(ApiError::Api(ClassifiedFailure {
            message,
            status_code: parsed.status_code(),
            response: Box::new(parsed),
        }))
    }

    fn compose_message(&self, response: &ApiResponse) -> String {
        let mut message = String::new();
        if !self.raw_output {
            if let Some(text) = response.error_message() {
                message.push_str(text);
            }
        }
        message.push_str(response.body());
        message
    }
}
