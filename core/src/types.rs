//! Long-lived inputs owned by the caller: the target server and the API key.
//!
//! # Design
//! Both are created once (usually from configuration) and borrowed by every
//! dispatch. The key is opaque to the core; only the transport reads the
//! secret, to sign outgoing requests.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ApiError;

/// Path prefix under which every management API action is served.
pub const API_PATH: &str = "/ZendServer/Api";

/// Base URL of the target server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_url: String,
    host: String,
    base_path: String,
}

impl Endpoint {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let parsed = Url::parse(trimmed).map_err(|e| ApiError::InvalidEndpoint {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidEndpoint {
                url: base_url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        let host = match (parsed.host_str(), parsed.port_or_known_default()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(ApiError::InvalidEndpoint {
                    url: base_url.to_string(),
                    reason: "missing host".to_string(),
                })
            }
        };
        Ok(Self {
            base_url: trimmed.to_string(),
            host,
            base_path: parsed.path().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `host:port` as used in request signatures.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Full URL of an action, e.g. `http://zs:10081/ZendServer/Api/getSystemInfo`.
    pub fn action_url(&self, action: &str) -> String {
        format!("{}{API_PATH}/{action}", self.base_url)
    }

    /// Path component of [`action_url`](Self::action_url), including any
    /// prefix in the base URL.
    pub fn action_path(&self, action: &str) -> String {
        format!("{}{API_PATH}/{action}", self.base_path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url)
    }
}

/// Named API key. Passed through to the transport unmodified.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub name: String,
    pub secret: String,
}

impl ApiKey {
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .finish()
    }
}
