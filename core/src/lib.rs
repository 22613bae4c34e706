//! Table-driven client core for the Zend Server management API.
//!
//! # Overview
//! Any API action is invoked by name through [`Dispatcher::invoke`]. A
//! declarative [`RouteTable`] says which verb the action uses and which
//! arguments are file uploads; the dispatcher builds an immutable
//! [`ApiRequest`], hands it to a [`Transport`], and classifies the raw
//! response into an [`ApiResponse`] or an [`ApiError`].
//!
//! # Design
//! - The core performs no network I/O itself (host-does-IO pattern). The
//!   `ureq` feature ships a blocking [`UreqTransport`]; tests can plug in
//!   any other implementation.
//! - Verbose "raw output" mode is an explicit flag on the dispatcher and
//!   the telemetry setup. Only [`ClientConfig::apply_env`] reads the
//!   `RAW_ZS_OUTPUT` variable.
//! - xml and json payloads are normalised into one `serde_json::Value`
//!   tree so field paths work the same for both.

pub mod classify;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod format;
pub mod http;
pub mod negotiate;
pub mod request;
pub mod response;
pub mod routes;
pub mod telemetry;
#[cfg(test)]
mod test_support;
#[cfg(feature = "ureq")]
pub mod transport;
pub mod types;

pub use classify::ResponseClassifier;
pub use config::{ClientConfig, LogSettings};
pub use dispatcher::Dispatcher;
pub use error::{ApiError, ClassifiedFailure, TransportError};
pub use format::OutputFormat;
pub use http::{HttpMethod, HttpResponse, Transport};
pub use negotiate::{parse_supported_versions, VersionInfo, VersionNegotiator};
pub use request::{ApiRequest, Args, FileAttachment, Files, ParamValue, RequestParts};
pub use response::ApiResponse;
pub use routes::{RouteEntry, RouteTable};
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
pub use types::{ApiKey, Endpoint};
