//! HTTP transport seam for the host-does-IO pattern.
//!
//! # Design
//! The core builds [`ApiRequest`] values and classifies [`HttpResponse`]
//! values; the actual network round-trip happens behind [`Transport`]. A
//! transport owns connection handling, timeouts and file streams for
//! uploads. The core never retries a failed send.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{ApiError, TransportError};
use crate::request::ApiRequest;

/// HTTP verb of an API action. Only POST requests carry a body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            _ => Err(ApiError::InvalidRequestShape(format!(
                "unsupported HTTP method '{s}'"
            ))),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP response described as plain data.
///
/// Produced by a [`Transport`] after executing an [`ApiRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes one request and returns the raw response.
///
/// Implementations must return non-2xx responses as `Ok`; only failures to
/// complete the exchange (connection refused, timeout, DNS) are `Err`.
pub trait Transport {
    fn send(&self, request: &ApiRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &ApiRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &ApiRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &ApiRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}
