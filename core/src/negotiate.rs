//! API version negotiation through `getSystemInfo`.
//!
//! # Design
//! This is a fixed dispatch that bypasses the route table: always GET,
//! always xml. The server advertises its versions oldest-first, one media
//! type per line; [`parse_supported_versions`] returns them newest-first.
//! Results are not cached here.

use tracing::info;

use crate::classify::ResponseClassifier;
use crate::error::ApiError;
use crate::format::{OutputFormat, MEDIA_TYPE_PREFIX};
use crate::http::{HttpMethod, HttpResponse, Transport};
use crate::request::{ApiRequest, Args, Files, RequestParts, DEFAULT_API_VERSION};
use crate::types::{ApiKey, Endpoint};

pub const SYSTEM_INFO_ACTION: &str = "getSystemInfo";

const VERSION_PREFIX: &str = ";version=";

/// What the server reported about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub server_version: String,
    pub client_runtime_version: String,
    /// Most-preferred first.
    pub supported_api_versions: Vec<String>,
}

impl VersionInfo {
    pub fn preferred(&self) -> Option<&str> {
        self.supported_api_versions.first().map(String::as_str)
    }
}

/// Strip the media-type prefix from each line, drop blanks, reverse.
pub fn parse_supported_versions(advertised: &str) -> Vec<String> {
    let prefix = format!("{MEDIA_TYPE_PREFIX}{VERSION_PREFIX}");
    let mut versions: Vec<String> = advertised
        .lines()
        .map(|line| line.replace(&prefix, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    versions.reverse();
    versions
}

/// Fixed `getSystemInfo` call, split into build and parse halves so a
/// host can drive it over its own transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionNegotiator {
    classifier: ResponseClassifier,
}

impl VersionNegotiator {
    pub fn new(classifier: ResponseClassifier) -> Self {
        Self { classifier }
    }

    pub fn build_request(&self, endpoint: &Endpoint, credential: &ApiKey) -> Result<ApiRequest, ApiError> {
        ApiRequest::build(RequestParts {
            endpoint,
            action: SYSTEM_INFO_ACTION,
            credential,
            verb: HttpMethod::Get,
            parameters: Args::new(),
            files: Files::new(),
            output_format: OutputFormat::Xml,
            api_version: DEFAULT_API_VERSION,
        })
    }

    pub fn parse_response(&self, response: HttpResponse) -> Result<VersionInfo, ApiError> {
        let parsed = self.classifier.classify(response, OutputFormat::Xml)?;
        let read = |name: &str| {
            parsed
                .field_str(&format!("responseData.systemInfo.{name}"))
                .unwrap_or_default()
        };
        Ok(VersionInfo {
            server_version: read("zendServerVersion"),
            client_runtime_version: read("phpVersion"),
            supported_api_versions: parse_supported_versions(&read("supportedApiVersions")),
        })
    }

    pub fn negotiate<T: Transport>(
        &self,
        transport: &T,
        endpoint: &Endpoint,
        credential: &ApiKey,
    ) -> Result<VersionInfo, ApiError> {
        let request = self.build_request(endpoint, credential)?;
        info!("{}", request.uri_string());
        let response = transport.send(&request)?;
        self.parse_response(response)
    }
}
