//! Error types for the management API client.
//!
//! # Design
//! Local failures (unknown action, missing upload file, bad format or
//! request shape) are raised before any network I/O. `Api` carries the
//! classified remote failure together with the original response, and
//! `Transport` wraps whatever the transport layer reported without
//! reinterpreting it. Nothing here is retried.

use std::path::PathBuf;

use thiserror::Error;

use crate::response::ApiResponse;

/// Errors returned by the dispatcher, negotiator and configuration loaders.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The action name is absent from the route table.
    #[error("unknown API action: {0}")]
    UnknownAction(String),

    /// A declared file-upload parameter does not point at a readable file.
    #[error("file not readable or non existent: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Output format outside {xml, json}.
    #[error("invalid output format '{0}'. Supported formats are: xml,json")]
    InvalidFormat(String),

    /// The request combines a verb and payload the wire format cannot carry.
    #[error("invalid request shape: {0}")]
    InvalidRequestShape(String),

    /// Target endpoint URL could not be parsed or uses an unsupported scheme.
    #[error("invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// The route table document could not be read or understood.
    #[error("route configuration error: {0}")]
    RouteConfig(String),

    /// The client configuration document could not be read or understood.
    #[error("configuration error: {0}")]
    Config(String),

    /// A success-status response whose body is not valid xml/json.
    #[error("malformed {format} response: {reason}")]
    MalformedResponse { format: String, reason: String },

    /// The remote service flagged the response as an error.
    #[error(transparent)]
    Api(#[from] ClassifiedFailure),

    /// The transport could not complete the exchange.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A terminal, error-flagged remote response.
///
/// `message` is the composed, human-readable text that was logged at error
/// severity before the failure was raised.
#[derive(Debug, Error)]
#[error("API error (HTTP {status_code}): {message}")]
pub struct ClassifiedFailure {
    pub message: String,
    pub status_code: u16,
    pub response: Box<ApiResponse>,
}

impl ClassifiedFailure {
    /// Remote error code from `errorData`, if the service sent one.
    pub fn error_code(&self) -> Option<&str> {
        self.response.error_code()
    }
}

/// Failure reported by a [`crate::Transport`] implementation.
#[derive(Debug, Error)]
#[error("transport error: {message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io;

    #[test]
    fn transport_error_preserves_source() {
        let inner = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
        let err = TransportError::with_source("send failed", inner);
        let source = err.source().expect("source should be kept");
        let io_err = source.downcast_ref::<io::Error>().unwrap();
        assert_eq!(io_err.kind(), io::ErrorKind::ConnectionRefused);
    }

    #[test]
    fn transport_error_is_transparent_in_api_error() {
        let err = ApiError::from(TransportError::new("dns failure"));
        assert_eq!(err.to_string(), "transport error: dns failure");
    }

    #[test]
    fn invalid_format_lists_supported_formats() {
        let err = ApiError::InvalidFormat("yaml".to_string());
        assert!(err.to_string().contains("xml,json"));
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = ApiError::FileNotFound(PathBuf::from("/tmp/missing.zpk"));
        assert_eq!(
            err.to_string(),
            "file not readable or non existent: /tmp/missing.zpk"
        );
    }
}
