//! Structured response payload.
//!
//! # Design
//! Both wire formats are normalised into one `serde_json::Value` tree so
//! callers navigate xml and json responses with the same field paths.
//! For xml the document element (`zendServerAPIResponse`) is dropped,
//! attributes are ignored, text-only elements become strings and repeated
//! sibling elements become arrays. A list with a single element therefore
//! reads as an object, not a one-item array.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::format::OutputFormat;
use crate::http::HttpResponse;

/// A raw response together with its parsed payload.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    http: HttpResponse,
    format: OutputFormat,
    data: Value,
}

impl ApiResponse {
    /// Parse `http` as `requested` format, unless the `Content-Type` header
    /// names the other one.
    ///
    /// An unparsable body is only an error for a 2xx status; error
    /// responses keep an empty payload so the body can still be reported.
    pub fn parse(http: HttpResponse, requested: OutputFormat) -> Result<Self, ApiError> {
        let format = detect_format(&http, requested);
        let parsed = match format {
            OutputFormat::Json => parse_json(&http.body),
            OutputFormat::Xml => xml_to_value(&http.body),
        };
        let data = match parsed {
            Ok(data) => data,
            Err(_) if !http.is_success() => Value::Null,
            Err(reason) => {
                return Err(ApiError::MalformedResponse {
                    format: format.to_string(),
                    reason,
                })
            }
        };
        Ok(Self { http, format, data })
    }

    pub fn is_error(&self) -> bool {
        !self.http.is_success() || self.data.get("errorData").is_some()
    }

    pub fn error_code(&self) -> Option<&str> {
        self.data.pointer("/errorData/errorCode").and_then(Value::as_str)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.data
            .pointer("/errorData/errorMessage")
            .and_then(Value::as_str)
    }

    pub fn status_code(&self) -> u16 {
        self.http.status
    }

    pub fn body(&self) -> &str {
        &self.http.body
    }

    pub fn http_response(&self) -> &HttpResponse {
        &self.http
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Dotted path lookup, e.g. `responseData.systemInfo.phpVersion`.
    /// Numeric segments index into arrays.
    pub fn field(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(&self.data, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// Like [`field`](Self::field) but rendered as a string; scalars only.
    pub fn field_str(&self, path: &str) -> Option<String> {
        match self.field(path)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

fn detect_format(http: &HttpResponse, requested: OutputFormat) -> OutputFormat {
    match http.header("content-type") {
        Some(ct) if ct.contains("json") => OutputFormat::Json,
        Some(ct) if ct.contains("xml") => OutputFormat::Xml,
        _ => requested,
    }
}

fn parse_json(body: &str) -> Result<Value, String> {
    serde_json::from_str(body).map_err(|e| e.to_string())
}

struct Frame {
    name: String,
    children: Map<String, Value>,
    text: String,
}

fn insert_child(children: &mut Map<String, Value>, name: String, value: Value) {
    match children.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            children.insert(name, value);
        }
    }
}

/// Convert an xml document into a value tree rooted below the document element.
pub fn xml_to_value(body: &str) -> Result<Value, String> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(start) => stack.push(Frame {
                name: String::from_utf8_lossy(start.name().local_name().as_ref()).into_owned(),
                children: Map::new(),
                text: String::new(),
            }),
            Event::Empty(empty) => {
                let name = String::from_utf8_lossy(empty.name().local_name().as_ref()).into_owned();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.children, name, Value::String(String::new())),
                    None => root = Some(Value::Object(Map::new())),
                }
            }
            Event::Text(text) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text.unescape().map_err(|e| e.to_string())?);
                }
            }
            Event::CData(cdata) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&cdata.into_inner()));
                }
            }
            Event::End(_) => {
                let frame = stack.pop().ok_or_else(|| "unbalanced end tag".to_string())?;
                let value = if frame.children.is_empty() {
                    Value::String(frame.text)
                } else {
                    Value::Object(frame.children)
                };
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.children, frame.name, value),
                    None => root = Some(value),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err("unexpected end of document".to_string());
    }
    root.ok_or_else(|| "document has no root element".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYSTEM_INFO_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<zendServerAPIResponse xmlns="http://www.zend.com/server/api/1.0">
  <requestData>
    <apiKeyName>admin</apiKeyName>
    <method>getSystemInfo</method>
  </requestData>
  <responseData>
    <systemInfo>
      <status>OK</status>
      <zendServerVersion>9.1.0</zendServerVersion>
      <phpVersion>7.1.3</phpVersion>
      <supportedApiVersions><![CDATA[application/vnd.zend.serverapi;version=1.0]]></supportedApiVersions>
    </systemInfo>
  </responseData>
</zendServerAPIResponse>"#;

    const ERROR_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<zendServerAPIResponse xmlns="http://www.zend.com/server/api/1.0">
  <errorData>
    <errorCode>authError</errorCode>
    <errorMessage>Unknown API key &amp; signature</errorMessage>
  </errorData>
</zendServerAPIResponse>"#;

    #[test]
    fn xml_root_is_dropped() {
        let resp = ApiResponse::parse(HttpResponse::new(200, SYSTEM_INFO_XML), OutputFormat::Xml).unwrap();
        assert!(!resp.is_error());
        assert_eq!(
            resp.field_str("responseData.systemInfo.zendServerVersion").as_deref(),
            Some("9.1.0")
        );
        assert_eq!(
            resp.field_str("responseData.systemInfo.supportedApiVersions").as_deref(),
            Some("application/vnd.zend.serverapi;version=1.0")
        );
        assert_eq!(resp.field_str("requestData.method").as_deref(), Some("getSystemInfo"));
    }

    #[test]
    fn xml_error_data_is_detected() {
        let resp = ApiResponse::parse(HttpResponse::new(401, ERROR_XML), OutputFormat::Xml).unwrap();
        assert!(resp.is_error());
        assert_eq!(resp.error_code(), Some("authError"));
        assert_eq!(resp.error_message(), Some("Unknown API key & signature"));
    }

    #[test]
    fn repeated_elements_become_arrays() {
        let xml = "<r><responseData><applicationsList>\
            <applicationInfo><id>1</id></applicationInfo>\
            <applicationInfo><id>2</id></applicationInfo>\
            </applicationsList></responseData></r>";
        let value = xml_to_value(xml).unwrap();
        let apps = value
            .pointer("/responseData/applicationsList/applicationInfo")
            .and_then(Value::as_array)
            .unwrap();
        assert_eq!(apps.len(), 2);
        let resp = ApiResponse::parse(HttpResponse::new(200, xml), OutputFormat::Xml).unwrap();
        assert_eq!(
            resp.field_str("responseData.applicationsList.applicationInfo.1.id").as_deref(),
            Some("2")
        );
    }

    #[test]
    fn empty_elements_are_empty_strings() {
        let value = xml_to_value("<r><messageList/><a>x</a></r>").unwrap();
        assert_eq!(value["messageList"], "");
        assert_eq!(value["a"], "x");
    }

    #[test]
    fn truncated_xml_is_rejected() {
        assert!(xml_to_value("<r><a>x</a>").is_err());
        assert!(xml_to_value("").is_err());
    }

    #[test]
    fn json_payload_is_parsed() {
        let body = r#"{"responseData":{"systemInfo":{"phpVersion":"8.2.0","maxApps":5}}}"#;
        let resp = ApiResponse::parse(HttpResponse::new(200, body), OutputFormat::Json).unwrap();
        assert_eq!(resp.format(), OutputFormat::Json);
        assert_eq!(resp.field_str("responseData.systemInfo.phpVersion").as_deref(), Some("8.2.0"));
        assert_eq!(resp.field_str("responseData.systemInfo.maxApps").as_deref(), Some("5"));
        assert!(resp.field("responseData.missing").is_none());
    }

    #[test]
    fn content_type_overrides_requested_format() {
        let mut http = HttpResponse::new(200, r#"{"responseData":{}}"#);
        http.headers.push((
            "Content-Type".to_string(),
            "application/vnd.zend.serverapi+json;version=1.3".to_string(),
        ));
        let resp = ApiResponse::parse(http, OutputFormat::Xml).unwrap();
        assert_eq!(resp.format(), OutputFormat::Json);
    }

    #[test]
    fn malformed_success_body_is_an_error() {
        let err = ApiResponse::parse(HttpResponse::new(200, "not json"), OutputFormat::Json).unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse { .. }));
    }

    #[test]
    fn malformed_error_body_is_kept() {
        let resp = ApiResponse::parse(HttpResponse::new(500, "Internal Server Error"), OutputFormat::Xml).unwrap();
        assert!(resp.is_error());
        assert!(resp.error_message().is_none());
        assert_eq!(resp.body(), "Internal Server Error");
    }
}
