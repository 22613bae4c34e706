//! Table-driven entry point for every API action.
//!
//! # Design
//! `invoke(action, args)` resolves the action in the shared [`RouteTable`],
//! builds an [`ApiRequest`], sends it through the injected [`Transport`]
//! and classifies the result. All local checks (unknown action, missing
//! upload file, bad output format) run before the transport is touched.
//!
//! The default output format is the only mutable field. A dispatcher is
//! meant to be owned by one caller; `set_output_format` takes `&mut self`
//! and a per-call override is available through the `outputFormatOverride`
//! argument (or its short alias `zsoutput`).

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::classify::ResponseClassifier;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::format::OutputFormat;
use crate::http::{HttpMethod, Transport};
use crate::negotiate::{VersionInfo, VersionNegotiator};
use crate::request::{ApiRequest, Args, FileAttachment, Files, RequestParts, DEFAULT_API_VERSION};
use crate::response::ApiResponse;
use crate::routes::{RouteEntry, RouteTable};
#[cfg(feature = "ureq")]
use crate::transport::UreqTransport;
use crate::types::{ApiKey, Endpoint};

/// Argument selecting the output format for a single call.
pub const OUTPUT_FORMAT_KEY: &str = "outputFormatOverride";

/// Alias of [`OUTPUT_FORMAT_KEY`] used by console route files. Loses when
/// both are given.
pub const OUTPUT_FORMAT_ALIAS: &str = "zsoutput";

/// Reserved argument stripped from upload requests.
pub const FILES_KEY: &str = "files";

/// Invokes any action named in its route table against one server.
///
/// Owns the endpoint, credential and transport; the route table is shared.
/// Build one with [`Dispatcher::new`], [`Dispatcher::from_config`] or, with
/// the `ureq` feature, [`Dispatcher::open`].
pub struct Dispatcher<T> {
    routes: Arc<RouteTable>,
    endpoint: Endpoint,
    credential: ApiKey,
    transport: T,
    output_format: OutputFormat,
    api_version: String,
    classifier: ResponseClassifier,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(routes: Arc<RouteTable>, endpoint: Endpoint, credential: ApiKey, transport: T) -> Self {
        Self {
            routes,
            endpoint,
            credential,
            transport,
            output_format: OutputFormat::default(),
            api_version: DEFAULT_API_VERSION.to_string(),
            classifier: ResponseClassifier::default(),
        }
    }

    /// Wire a dispatcher from configuration.
    pub fn from_config(config: &ClientConfig, routes: Arc<RouteTable>, transport: T) -> Result<Self, ApiError> {
        let endpoint = Endpoint::new(&config.endpoint)?;
        Ok(Self::new(routes, endpoint, config.api_key.clone(), transport)
            .with_output_format(config.output_format)
            .with_api_version(config.api_version.clone())
            .with_raw_output(config.raw_output))
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_raw_output(mut self, raw_output: bool) -> Self {
        self.classifier = ResponseClassifier::new(raw_output);
        self
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    /// Change the default format. An invalid value leaves it unchanged.
    pub fn set_output_format(&mut self, format: &str) -> Result<(), ApiError> {
        self.output_format = format.parse()?;
        Ok(())
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Resolve `action` and build its request without sending it.
    pub fn build_request(&self, action: &str, args: Option<Args>) -> Result<ApiRequest, ApiError> {
        let route = self
            .routes
            .get(action)
            .ok_or_else(|| ApiError::UnknownAction(action.to_string()))?;
        let verb = route.default_verb();

        let mut parameters = args.unwrap_or_default();
        let files = if verb == HttpMethod::Post {
            extract_files(route, &mut parameters)?
        } else {
            Files::new()
        };

        let requested = parameters.remove(OUTPUT_FORMAT_KEY);
        let alias = parameters.remove(OUTPUT_FORMAT_ALIAS);
        let output_format = match requested.or(alias) {
            Some(value) => value
                .as_text()
                .ok_or_else(|| ApiError::InvalidFormat(format!("{OUTPUT_FORMAT_KEY}[]")))?
                .parse::<OutputFormat>()?,
            None => self.output_format,
        };

        ApiRequest::build(RequestParts {
            endpoint: &self.endpoint,
            action,
            credential: &self.credential,
            verb,
            parameters,
            files,
            output_format,
            api_version: &self.api_version,
        })
    }

    /// Build, send and classify one action call.
    pub fn invoke(&self, action: &str, args: Option<Args>) -> Result<ApiResponse, ApiError> {
        let request = self.build_request(action, args)?;
        info!("{}", request.uri_string());
        let response = self.transport.send(&request)?;
        self.classifier.classify(response, request.output_format())
    }

    /// Query `getSystemInfo` and return the advertised versions.
    pub fn negotiate(&self) -> Result<VersionInfo, ApiError> {
        VersionNegotiator::new(self.classifier).negotiate(&self.transport, &self.endpoint, &self.credential)
    }
}

#[cfg(feature = "ureq")]
impl Dispatcher<UreqTransport> {
    /// Load the configured route document and build a `ureq` transport
    /// with the configured timeout.
    pub fn open(config: &ClientConfig) -> Result<Self, ApiError> {
        let routes = Arc::new(config.load_routes()?);
        Self::from_config(config, routes, UreqTransport::from_config(config))
    }
}

/// Move declared file parameters out of `parameters` into attachments.
fn extract_files(route: &RouteEntry, parameters: &mut Args) -> Result<Files, ApiError> {
    let mut files = Files::new();
    if route.file_parameters().is_empty() {
        return Ok(files);
    }
    for name in route.file_parameters() {
        let Some(value) = parameters.remove(name) else {
            continue;
        };
        let Some(raw_path) = value.as_text() else {
            return Err(ApiError::InvalidRequestShape(format!(
                "file parameter '{name}' must be a single path"
            )));
        };
        let path = PathBuf::from(raw_path);
        validate_upload(&path)?;
        let file_base_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        files.insert(
            path,
            FileAttachment {
                form_field_name: name.clone(),
                file_base_name,
            },
        );
    }
    parameters.remove(FILES_KEY);
    Ok(files)
}

/// The path must name a regular file we can open. The handle is dropped
/// right away; the transport reopens it when sending.
fn validate_upload(path: &Path) -> Result<(), ApiError> {
    let readable = File::open(path)
        .and_then(|file| file.metadata())
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if readable {
        Ok(())
    } else {
        Err(ApiError::FileNotFound(path.to_path_buf()))
    }
}
