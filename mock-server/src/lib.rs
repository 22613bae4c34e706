//! In-memory imitation of the management API under `/ZendServer/Api/{action}`.
//!
//! Answers in xml or json depending on the `Accept` header and only checks
//! that `X-Zend-Signature` names a known key; the digest itself is not
//! verified.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Form, Router,
};
use serde::Serialize;
use quick_xml::escape::escape;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub const API_KEY_NAME: &str = "admin";

pub const SUPPORTED_API_VERSIONS: &str = "application/vnd.zend.serverapi;version=1.0\n\
     application/vnd.zend.serverapi;version=1.1\n\
     application/vnd.zend.serverapi;version=1.2\n\
     application/vnd.zend.serverapi;version=1.3\n";

/// A deployed package as reported by `applicationGetStatus`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: u32,
    pub app_name: String,
    pub base_url: String,
    pub status: String,
    pub package_size: usize,
}

#[derive(Debug, Default)]
pub struct ServerState {
    next_id: u32,
    applications: HashMap<u32, Application>,
}

/// Shared server state, one per [`app`] instance.
pub type Db = Arc<RwLock<ServerState>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(ServerState::default()));
    Router::new()
        .route("/ZendServer/Api/{action}", get(handle_get).post(handle_post))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Format {
    Xml,
    Json,
}

impl Format {
    fn from_headers(headers: &HeaderMap) -> Self {
        let accept = headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if accept.contains("+json") {
            Format::Json
        } else {
            Format::Xml
        }
    }

    fn content_type(self) -> &'static str {
        match self {
            Format::Xml => "application/vnd.zend.serverapi+xml;version=1.3",
            Format::Json => "application/vnd.zend.serverapi+json;version=1.3",
        }
    }
}

struct Call {
    action: String,
    key_name: String,
    format: Format,
}

impl Call {
    fn respond(&self, status: StatusCode, section: &str, data: Value) -> Response {
        let mut doc = Map::new();
        doc.insert(
            "requestData".to_string(),
            json!({ "apiKeyName": self.key_name, "method": self.action }),
        );
        doc.insert(section.to_string(), data);
        let doc = Value::Object(doc);

        let body = match self.format {
            Format::Json => doc.to_string(),
            Format::Xml => {
                let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
                write_xml(&mut out, "zendServerAPIResponse", &doc);
                out
            }
        };
        (status, [(header::CONTENT_TYPE, self.format.content_type())], body).into_response()
    }

    fn ok(&self, data: Value) -> Response {
        self.respond(StatusCode::OK, "responseData", data)
    }

    fn error(&self, status: StatusCode, code: &str, message: &str) -> Response {
        self.respond(
            status,
            "errorData",
            json!({ "errorCode": code, "errorMessage": message }),
        )
    }
}

fn write_xml(out: &mut String, name: &str, value: &Value) {
    match value {
        Value::Array(items) => {
            for item in items {
                write_xml(out, name, item);
            }
        }
        Value::Object(map) => {
            out.push_str(&format!("<{name}>"));
            for (key, child) in map {
                write_xml(out, key, child);
            }
            out.push_str(&format!("</{name}>"));
        }
        Value::Null => out.push_str(&format!("<{name}/>")),
        Value::String(text) => out.push_str(&format!("<{name}>{}</{name}>", escape(text.as_str()))),
        other => out.push_str(&format!("<{name}>{other}</{name}>")),
    }
}

/// Check the signature header and work out the response format.
fn authenticate(action: String, headers: &HeaderMap) -> Result<Call, Response> {
    let format = Format::from_headers(headers);
    let key_name = headers
        .get("x-zend-signature")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split_once(';'))
        .map(|(name, _)| name.trim().to_string());
    match key_name {
        Some(key_name) if key_name == API_KEY_NAME => Ok(Call {
            action,
            key_name,
            format,
        }),
        other => {
            let call = Call {
                action,
                key_name: other.unwrap_or_default(),
                format,
            };
            Err(call.error(StatusCode::UNAUTHORIZED, "authError", "Unknown or missing API key"))
        }
    }
}

fn system_info() -> Value {
    json!({
        "systemInfo": {
            "status": "OK",
            "edition": "ZendServer",
            "zendServerVersion": "9.1.0",
            "phpVersion": "7.1.3",
            "operatingSystem": "Linux",
            "supportedApiVersions": SUPPORTED_API_VERSIONS,
        }
    })
}

async fn handle_get(
    State(db): State<Db>,
    Path(action): Path<String>,
    Query(_params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let call = match authenticate(action, &headers) {
        Ok(call) => call,
        Err(response) => return response,
    };
    match call.action.as_str() {
        "getSystemInfo" => call.ok(system_info()),
        "applicationGetStatus" => {
            let state = db.read().await;
            let mut apps: Vec<&Application> = state.applications.values().collect();
            apps.sort_by_key(|a| a.id);
            let apps = serde_json::to_value(apps).unwrap_or(Value::Null);
            call.ok(json!({ "applicationsList": { "applicationInfo": apps } }))
        }
        "applicationDeploy" | "applicationRemove" | "restartPhp" => call.error(
            StatusCode::METHOD_NOT_ALLOWED,
            "wrongHttpMethod",
            "This method requires POST",
        ),
        _ => call.error(StatusCode::NOT_FOUND, "unknownMethod", "Unknown API method"),
    }
}

async fn handle_post(State(db): State<Db>, Path(action): Path<String>, request: Request) -> Response {
    let call = match authenticate(action, request.headers()) {
        Ok(call) => call,
        Err(response) => return response,
    };
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    match call.action.as_str() {
        "applicationDeploy" if is_multipart => {
            let multipart = match Multipart::from_request(request, &()).await {
                Ok(m) => m,
                Err(rejection) => return rejection.into_response(),
            };
            deploy(&call, &db, multipart).await
        }
        "applicationDeploy" => call.error(
            StatusCode::BAD_REQUEST,
            "missingParameter",
            "appPackage upload is required",
        ),
        "applicationRemove" | "restartPhp" => {
            let Form(params) = match Form::<HashMap<String, String>>::from_request(request, &()).await {
                Ok(form) => form,
                Err(rejection) => return rejection.into_response(),
            };
            if call.action == "restartPhp" {
                call.ok(json!({ "serversList": { "serverInfo": { "id": 0, "status": "restarting" } } }))
            } else {
                remove(&call, &db, &params).await
            }
        }
        "getSystemInfo" | "applicationGetStatus" => call.error(
            StatusCode::METHOD_NOT_ALLOWED,
            "wrongHttpMethod",
            "This method requires GET",
        ),
        _ => call.error(StatusCode::NOT_FOUND, "unknownMethod", "Unknown API method"),
    }
}

async fn deploy(call: &Call, db: &Db, mut multipart: Multipart) -> Response {
    let mut package: Option<(String, usize)> = None;
    let mut base_url = String::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return call.error(StatusCode::BAD_REQUEST, "invalidParameter", &e.to_string())
            }
        };
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                return call.error(StatusCode::BAD_REQUEST, "invalidParameter", &e.to_string())
            }
        };
        match (name.as_str(), file_name) {
            ("appPackage", Some(file_name)) => package = Some((file_name, bytes.len())),
            ("baseUrl", _) => base_url = String::from_utf8_lossy(&bytes).into_owned(),
            _ => {}
        }
    }

    let Some((file_name, package_size)) = package else {
        return call.error(
            StatusCode::BAD_REQUEST,
            "missingParameter",
            "appPackage upload is required",
        );
    };

    let mut state = db.write().await;
    state.next_id += 1;
    let app = Application {
        id: state.next_id,
        app_name: file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or(file_name),
        base_url,
        status: "staging".to_string(),
        package_size,
    };
    state.applications.insert(app.id, app.clone());
    call.ok(json!({ "applicationInfo": app }))
}

async fn remove(call: &Call, db: &Db, params: &HashMap<String, String>) -> Response {
    let Some(id) = params.get("appId").and_then(|v| v.parse::<u32>().ok()) else {
        return call.error(StatusCode::BAD_REQUEST, "missingParameter", "appId is required");
    };
    let mut state = db.write().await;
    match state.applications.remove(&id) {
        Some(mut app) => {
            app.status = "removing".to_string();
            call.ok(json!({ "applicationInfo": app }))
        }
        None => call.error(
            StatusCode::NOT_FOUND,
            "noSuchApplication",
            &format!("No application with id {id}"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_repeats_array_items() {
        let mut out = String::new();
        write_xml(&mut out, "list", &json!({ "item": [{"id": 1}, {"id": 2}] }));
        assert_eq!(out, "<list><item><id>1</id></item><item><id>2</id></item></list>");
    }

    #[test]
    fn xml_escapes_text() {
        let mut out = String::new();
        write_xml(&mut out, "m", &json!("a < b & c"));
        assert_eq!(out, "<m>a &lt; b &amp; c</m>");
    }

    #[test]
    fn application_serializes_camel_case() {
        let app = Application {
            id: 1,
            app_name: "demo".to_string(),
            base_url: "http://demo/".to_string(),
            status: "staging".to_string(),
            package_size: 3,
        };
        let value = serde_json::to_value(&app).unwrap();
        assert_eq!(value["appName"], "demo");
        assert_eq!(value["baseUrl"], "http://demo/");
        assert_eq!(value["packageSize"], 3);
    }

    #[test]
    fn json_accept_selects_json() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            "application/vnd.zend.serverapi+json;version=1.3".parse().unwrap(),
        );
        assert!(Format::from_headers(&headers) == Format::Json);
        assert!(Format::from_headers(&HeaderMap::new()) == Format::Xml);
    }

    #[test]
    fn signature_must_name_known_key() {
        let mut headers = HeaderMap::new();
        headers.insert("x-zend-signature", "admin; deadbeef".parse().unwrap());
        assert!(authenticate("getSystemInfo".to_string(), &headers).is_ok());

        headers.insert("x-zend-signature", "guest; deadbeef".parse().unwrap());
        let response = authenticate("getSystemInfo".to_string(), &headers).err().unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
