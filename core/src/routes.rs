//! Route table: action name → request-shape metadata.
//!
//! # Design
//! The table is read from a declarative document at startup and never
//! mutated afterwards; dispatchers share it through an `Arc`. The document
//! keeps the console-router layout of the upstream tool configuration, so
//! an existing route file can be fed in as is:
//!
//! ```yaml
//! routes:
//!   applicationDeploy:
//!     options:
//!       defaults:
//!         apiMethod: post
//!       files: [appPackage]
//! ```
//!
//! The same map may also appear under `console.router.routes`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ApiError;
use crate::http::HttpMethod;

/// Metadata for one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    action: String,
    default_verb: HttpMethod,
    file_parameters: Vec<String>,
}

impl RouteEntry {
    pub fn new(action: impl Into<String>, default_verb: HttpMethod) -> Self {
        Self {
            action: action.into(),
            default_verb,
            file_parameters: Vec::new(),
        }
    }

    /// Declare upload parameters. Duplicates are dropped, first one wins.
    pub fn with_file_parameters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.file_parameters.contains(&name) {
                self.file_parameters.push(name);
            }
        }
        self
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn default_verb(&self) -> HttpMethod {
        self.default_verb
    }

    pub fn file_parameters(&self) -> &[String] {
        &self.file_parameters
    }

    pub fn is_file_parameter(&self, name: &str) -> bool {
        self.file_parameters.iter().any(|p| p == name)
    }
}

/// Immutable lookup table of known actions.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: BTreeMap<String, RouteEntry>,
}

impl RouteTable {
    pub fn from_entries<I: IntoIterator<Item = RouteEntry>>(entries: I) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.action.clone(), entry))
                .collect(),
        }
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, ApiError> {
        let doc: RouteDocument =
            serde_yaml::from_str(source).map_err(|e| ApiError::RouteConfig(e.to_string()))?;
        doc.into_table()
    }

    pub fn from_json_str(source: &str) -> Result<Self, ApiError> {
        let doc: RouteDocument =
            serde_json::from_str(source).map_err(|e| ApiError::RouteConfig(e.to_string()))?;
        doc.into_table()
    }

    /// Load from a file; `.json` is parsed as JSON, everything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| ApiError::RouteConfig(format!("{}: {e}", path.display())))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&source)
        } else {
            Self::from_yaml_str(&source)
        }
    }

    pub fn get(&self, action: &str) -> Option<&RouteEntry> {
        self.entries.get(action)
    }

    pub fn contains(&self, action: &str) -> bool {
        self.entries.contains_key(action)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.values()
    }
}

// ---------------------------------------------------------------------------
// Document model
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RouteDocument {
    #[serde(default)]
    routes: Option<BTreeMap<String, RouteSpec>>,
    #[serde(default)]
    console: Option<ConsoleSection>,
}

#[derive(Debug, Deserialize)]
struct ConsoleSection {
    router: RouterSection,
}

#[derive(Debug, Deserialize)]
struct RouterSection {
    routes: BTreeMap<String, RouteSpec>,
}

#[derive(Debug, Default, Deserialize)]
struct RouteSpec {
    #[serde(default)]
    options: RouteOptions,
}

#[derive(Debug, Default, Deserialize)]
struct RouteOptions {
    #[serde(default)]
    defaults: RouteDefaults,
    #[serde(default)]
    files: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RouteDefaults {
    #[serde(rename = "apiMethod")]
    api_method: Option<String>,
}

impl RouteDocument {
    fn into_table(self) -> Result<RouteTable, ApiError> {
        let specs = match (self.routes, self.console) {
            (Some(routes), _) => routes,
            (None, Some(console)) => console.router.routes,
            (None, None) => {
                return Err(ApiError::RouteConfig(
                    "document has neither `routes` nor `console.router.routes`".to_string(),
                ))
            }
        };

        let mut entries = Vec::with_capacity(specs.len());
        for (action, spec) in specs {
            let verb = match spec.options.defaults.api_method.as_deref() {
                None => HttpMethod::Get,
                Some(raw) => raw.parse::<HttpMethod>().map_err(|_| {
                    ApiError::RouteConfig(format!("{action}: unsupported apiMethod '{raw}'"))
                })?,
            };
            entries.push(RouteEntry::new(action, verb).with_file_parameters(spec.options.files));
        }
        Ok(RouteTable::from_entries(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTES_YAML: &str = r#"
routes:
  getSystemInfo:
    options:
      route: getSystemInfo
  applicationDeploy:
    options:
      defaults:
        apiMethod: POST
      files: [appPackage, appPackage]
  restartPhp:
    options:
      defaults:
        apiMethod: post
"#;

    #[test]
    fn yaml_routes_default_to_get() {
        let table = RouteTable::from_yaml_str(ROUTES_YAML).unwrap();
        assert_eq!(table.len(), 3);
        let entry = table.get("getSystemInfo").unwrap();
        assert_eq!(entry.default_verb(), HttpMethod::Get);
        assert!(entry.file_parameters().is_empty());
    }

    #[test]
    fn yaml_routes_read_verb_and_files() {
        let table = RouteTable::from_yaml_str(ROUTES_YAML).unwrap();
        let deploy = table.get("applicationDeploy").unwrap();
        assert_eq!(deploy.default_verb(), HttpMethod::Post);
        assert_eq!(deploy.file_parameters(), ["appPackage".to_string()]);
        assert_eq!(table.get("restartPhp").unwrap().default_verb(), HttpMethod::Post);
    }

    #[test]
    fn console_router_nesting_is_accepted() {
        let json = r#"{
            "console": {"router": {"routes": {
                "monitorGetIssuesListPredefinedFilter": {"options": {}},
                "libraryVersionDeploy": {"options": {
                    "defaults": {"apiMethod": "post"},
                    "files": ["libPackage"]
                }}
            }}}
        }"#;
        let table = RouteTable::from_json_str(json).unwrap();
        assert!(table.contains("monitorGetIssuesListPredefinedFilter"));
        assert!(table
            .get("libraryVersionDeploy")
            .unwrap()
            .is_file_parameter("libPackage"));
    }

    #[test]
    fn unsupported_verb_is_a_config_error() {
        let yaml = "routes:\n  x:\n    options:\n      defaults:\n        apiMethod: delete\n";
        let err = RouteTable::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ApiError::RouteConfig(ref m) if m.contains("delete")));
    }

    #[test]
    fn document_without_routes_is_rejected() {
        assert!(matches!(
            RouteTable::from_yaml_str("other: 1\n").unwrap_err(),
            ApiError::RouteConfig(_)
        ));
    }

    #[test]
    fn load_picks_parser_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("routes.json");
        std::fs::write(&json_path, r#"{"routes": {"getSystemInfo": {}}}"#).unwrap();
        assert!(RouteTable::load(&json_path).unwrap().contains("getSystemInfo"));

        let yaml_path = dir.path().join("routes.yml");
        std::fs::write(&yaml_path, ROUTES_YAML).unwrap();
        assert_eq!(RouteTable::load(&yaml_path).unwrap().len(), 3);
    }

    #[test]
    fn load_missing_file_is_a_config_error() {
        let err = RouteTable::load("/nonexistent/routes.yml").unwrap_err();
        assert!(matches!(err, ApiError::RouteConfig(_)));
    }
}
