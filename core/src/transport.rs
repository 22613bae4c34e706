//! Blocking [`Transport`] backed by `ureq`.
//!
//! # Design
//! Non-2xx statuses come back as ordinary responses so the classifier can
//! read `errorData`. Upload files are read here, at send time, and their
//! buffers are dropped as soon as the request has been written. Every
//! request is signed with the API key: the `X-Zend-Signature` header is
//! `<key name>; hex(HMAC-SHA256(secret, "<host>:<path>:<user agent>:<date>"))`.

use std::io;
use std::time::{Duration, SystemTime};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::http::{HttpMethod, HttpResponse, Transport};
use crate::request::ApiRequest;
use crate::types::ApiKey;

type HmacSha256 = Hmac<Sha256>;

pub const USER_AGENT: &str = concat!("zsapi-core/", env!("CARGO_PKG_VERSION"));

/// Sends requests over a shared `ureq` agent. `None` means no timeout.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Option<Duration>) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self { agent }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.timeout())
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &ApiRequest) -> Result<HttpResponse, TransportError> {
        let date = httpdate::fmt_http_date(SystemTime::now());
        let signature = sign(
            request.credential(),
            request.endpoint().host(),
            &request.path(),
            USER_AGENT,
            &date,
        )?;
        let headers = request.headers();

        let result = match request.verb() {
            HttpMethod::Get => {
                let mut builder = self.agent.get(&request.uri_string());
                for (name, value) in &headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder
                    .header("Date", date.as_str())
                    .header("User-Agent", USER_AGENT)
                    .header("X-Zend-Signature", signature.as_str())
                    .call()
            }
            HttpMethod::Post => {
                let mut builder = self.agent.post(&request.url());
                for (name, value) in &headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                let builder = builder
                    .header("Date", date.as_str())
                    .header("User-Agent", USER_AGENT)
                    .header("X-Zend-Signature", signature.as_str());
                match request.form_body() {
                    Some(form) => builder.send(form.as_bytes()),
                    None => {
                        let boundary = format!("----zsapi{}", Uuid::new_v4().simple());
                        let body = encode_multipart(request, &boundary)
                            .map_err(|e| TransportError::with_source("cannot read upload", e))?;
                        builder
                            .content_type(format!("multipart/form-data; boundary={boundary}"))
                            .send(&body[..])
                    }
                }
            }
        };

        let mut response =
            result.map_err(|e| TransportError::with_source(format!("{} failed", request.url()), e))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| TransportError::with_source("cannot read response body", e))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Request signature header value.
pub fn sign(
    key: &ApiKey,
    host: &str,
    path: &str,
    user_agent: &str,
    date: &str,
) -> Result<String, TransportError> {
    let mut mac = HmacSha256::new_from_slice(key.secret.as_bytes())
        .map_err(|e| TransportError::new(format!("invalid API key: {e}")))?;
    mac.update(format!("{host}:{path}:{user_agent}:{date}").as_bytes());
    let digest: String = mac
        .finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    Ok(format!("{}; {digest}", key.name))
}

/// `multipart/form-data` body with every parameter followed by every file.
pub fn encode_multipart(request: &ApiRequest, boundary: &str) -> io::Result<Vec<u8>> {
    let mut body = Vec::new();
    for (name, value) in request.parameters().flatten() {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{value}\r\n",
                quote_safe(&name)
            )
            .as_bytes(),
        );
    }
    for (path, attachment) in request.files() {
        let contents = std::fs::read(path)?;
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                quote_safe(&attachment.form_field_name),
                quote_safe(&attachment.file_base_name)
            )
            .as_bytes(),
        );
        body.extend_from_slice(&contents);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    Ok(body)
}

/// Percent-encode the characters that would end a quoted part header value.
fn quote_safe(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
