//! Immutable request values and the pure request builder.
//!
//! # Design
//! An [`ApiRequest`] is assembled once per dispatch by [`ApiRequest::build`]
//! and never changes after that. It only *describes* file uploads (path,
//! form field, base name); opening and streaming the files is left to the
//! transport. A GET request can never carry files: the builder rejects the
//! combination instead of silently dropping the attachments.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use url::form_urlencoded;

use crate::error::ApiError;
use crate::format::OutputFormat;
use crate::http::HttpMethod;
use crate::types::{ApiKey, Endpoint};

/// API version sent in the `Accept` header unless configured otherwise.
pub const DEFAULT_API_VERSION: &str = "1.3";

/// A single request parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    /// Encoded as `name[0]=a&name[1]=b`.
    List(Vec<String>),
}

impl ParamValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(value) => Some(value),
            ParamValue::List(_) => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<&Path> for ParamValue {
    fn from(value: &Path) -> Self {
        ParamValue::Text(value.to_string_lossy().into_owned())
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        ParamValue::List(values)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(values: Vec<&str>) -> Self {
        ParamValue::List(values.into_iter().map(str::to_string).collect())
    }
}

/// Caller arguments in insertion order.
///
/// Re-inserting an existing name replaces the value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    entries: Vec<(String, ParamValue)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
        let index = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flattened name/value pairs; list items get `[i]` suffixes.
    pub fn flatten(&self) -> Vec<(String, &str)> {
        let mut pairs = Vec::with_capacity(self.entries.len());
        for (name, value) in self.iter() {
            match value {
                ParamValue::Text(text) => pairs.push((name.to_string(), text.as_str())),
                ParamValue::List(items) => {
                    for (i, item) in items.iter().enumerate() {
                        pairs.push((format!("{name}[{i}]"), item.as_str()));
                    }
                }
            }
        }
        pairs
    }

    /// `application/x-www-form-urlencoded` serialization, order preserved.
    pub fn to_urlencoded(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.flatten())
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Args
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = Args::new();
        for (k, v) in iter {
            args.insert(k, v);
        }
        args
    }
}

/// Multipart part description for one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    pub form_field_name: String,
    pub file_base_name: String,
}

/// Uploads keyed by their original filesystem path.
pub type Files = BTreeMap<PathBuf, FileAttachment>;

/// Inputs of [`ApiRequest::build`].
#[derive(Debug, Clone)]
pub struct RequestParts<'a> {
    pub endpoint: &'a Endpoint,
    pub action: &'a str,
    pub credential: &'a ApiKey,
    pub verb: HttpMethod,
    pub parameters: Args,
    pub files: Files,
    pub output_format: OutputFormat,
    pub api_version: &'a str,
}

/// A fully resolved API request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    endpoint: Endpoint,
    action: String,
    credential: ApiKey,
    verb: HttpMethod,
    parameters: Args,
    files: Files,
    output_format: OutputFormat,
    api_version: String,
}

impl ApiRequest {
    /// Build a request. No I/O; fails on a GET carrying files, or on a
    /// line break in a name that becomes a multipart part header.
    pub fn build(parts: RequestParts<'_>) -> Result<Self, ApiError> {
        if !parts.files.is_empty() {
            if parts.verb == HttpMethod::Get {
                return Err(ApiError::InvalidRequestShape(format!(
                    "{}: file uploads require POST",
                    parts.action
                )));
            }
            let mut header_names = parts.parameters.iter().map(|(name, _)| name).chain(
                parts
                    .files
                    .values()
                    .flat_map(|f| [f.form_field_name.as_str(), f.file_base_name.as_str()]),
            );
            if let Some(bad) = header_names.find(|name| name.contains(['\r', '\n'])) {
                return Err(ApiError::InvalidRequestShape(format!(
                    "{}: line break in multipart name {bad:?}",
                    parts.action
                )));
            }
        }
        Ok(Self {
            endpoint: parts.endpoint.clone(),
            action: parts.action.to_string(),
            credential: parts.credential.clone(),
            verb: parts.verb,
            parameters: parts.parameters,
            files: parts.files,
            output_format: parts.output_format,
            api_version: parts.api_version.to_string(),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn credential(&self) -> &ApiKey {
        &self.credential
    }

    pub fn verb(&self) -> HttpMethod {
        self.verb
    }

    pub fn parameters(&self) -> &Args {
        &self.parameters
    }

    pub fn files(&self) -> &Files {
        &self.files
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Action URL without query string.
    pub fn url(&self) -> String {
        self.endpoint.action_url(&self.action)
    }

    /// Path component used in request signatures.
    pub fn path(&self) -> String {
        self.endpoint.action_path(&self.action)
    }

    /// Canonical URI: the query string is included only for GET.
    pub fn uri_string(&self) -> String {
        let url = self.url();
        if self.verb == HttpMethod::Get && !self.parameters.is_empty() {
            format!("{url}?{}", self.parameters.to_urlencoded())
        } else {
            url
        }
    }

    /// Url-encoded body for a POST without files.
    pub fn form_body(&self) -> Option<String> {
        (self.verb == HttpMethod::Post && self.files.is_empty())
            .then(|| self.parameters.to_urlencoded())
    }

    pub fn accept(&self) -> String {
        self.output_format.media_type(&self.api_version)
    }

    /// Headers the core knows about. Transports add date, signature and
    /// the multipart content type themselves.
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("Accept".to_string(), self.accept())];
        if self.form_body().is_some() {
            headers.push((
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            ));
        }
        headers
    }
}
