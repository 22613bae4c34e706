//! Client configuration document.
//!
//! Loaded once at startup from YAML (or JSON, which YAML parses too):
//!
//! ```yaml
//! endpoint: http://localhost:10081
//! api_key:
//!   name: admin
//!   secret: 5f1b...
//! output_format: xml
//! routes: routes.yml
//! log:
//!   file: /var/log/zsapi.log
//!   priority: info
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ApiError;
use crate::format::OutputFormat;
use crate::request::DEFAULT_API_VERSION;
use crate::routes::RouteTable;
use crate::types::ApiKey;

/// Presence of this variable switches to raw output mode.
pub const RAW_OUTPUT_ENV: &str = "RAW_ZS_OUTPUT";

/// Everything needed to wire a dispatcher: target server, credential,
/// defaults for each call, the route document and logging.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub endpoint: String,
    pub api_key: ApiKey,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Route document; relative paths resolve against the config file.
    #[serde(default)]
    pub routes: Option<PathBuf>,
    #[serde(default)]
    pub raw_output: bool,
    /// Whole-request timeout; unset means no limit.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub log: LogSettings,
}

/// `log` section of [`ClientConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LogSettings {
    /// Append to this file instead of stderr.
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Filter directive, e.g. `info` or `zsapi_core=debug`.
    #[serde(default)]
    pub priority: Option<String>,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

impl ClientConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self, ApiError> {
        serde_yaml::from_str(source).map_err(|e| ApiError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| ApiError::Config(format!("{}: {e}", path.display())))?;
        let mut config = Self::from_yaml_str(&source)?;
        if let (Some(routes), Some(dir)) = (config.routes.as_ref(), path.parent()) {
            if routes.is_relative() {
                config.routes = Some(dir.join(routes));
            }
        }
        Ok(config)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Read the route document named by `routes`.
    pub fn load_routes(&self) -> Result<RouteTable, ApiError> {
        let path = self
            .routes
            .as_ref()
            .ok_or_else(|| ApiError::Config("no `routes` document configured".to_string()))?;
        RouteTable::load(path)
    }

    /// Turn on raw output when `RAW_ZS_OUTPUT` is set. Never turns it off.
    pub fn apply_env(mut self) -> Self {
        if std::env::var_os(RAW_OUTPUT_ENV).is_some() {
            self.raw_output = true;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "endpoint: http://localhost:10081\napi_key:\n  name: admin\n  secret: abc\n";

    #[test]
    fn minimal_config_uses_defaults() {
        let config = ClientConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.endpoint, "http://localhost:10081");
        assert_eq!(config.api_key, ApiKey::new("admin", "abc"));
        assert_eq!(config.output_format, OutputFormat::Xml);
        assert_eq!(config.api_version, "1.3");
        assert!(!config.raw_output);
        assert_eq!(config.log, LogSettings::default());
    }

    #[test]
    fn output_format_is_validated() {
        let yaml = format!("{MINIMAL}output_format: Json\n");
        assert_eq!(
            ClientConfig::from_yaml_str(&yaml).unwrap().output_format,
            OutputFormat::Json
        );
        let yaml = format!("{MINIMAL}output_format: yaml\n");
        assert!(matches!(
            ClientConfig::from_yaml_str(&yaml).unwrap_err(),
            ApiError::Config(_)
        ));
    }

    #[test]
    fn missing_key_is_rejected() {
        let err = ClientConfig::from_yaml_str("endpoint: http://x\n").unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn relative_routes_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.yml");
        std::fs::write(
            &path,
            format!("{MINIMAL}routes: routes.yml\nlog:\n  priority: debug\n"),
        )
        .unwrap();
        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.routes, Some(dir.path().join("routes.yml")));
        assert_eq!(config.log.priority.as_deref(), Some("debug"));
    }

    #[test]
    fn timeout_comes_from_seconds() {
        assert_eq!(ClientConfig::from_yaml_str(MINIMAL).unwrap().timeout(), None);
        let yaml = format!("{MINIMAL}timeout_secs: 30\n");
        assert_eq!(
            ClientConfig::from_yaml_str(&yaml).unwrap().timeout(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn configured_routes_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("routes.yml"),
            "routes:\n  restartPhp:\n    options:\n      defaults:\n        apiMethod: post\n",
        )
        .unwrap();
        let path = dir.path().join("client.yml");
        std::fs::write(&path, format!("{MINIMAL}routes: routes.yml\n")).unwrap();

        let routes = ClientConfig::load(&path).unwrap().load_routes().unwrap();
        assert!(routes.contains("restartPhp"));
    }

    #[test]
    fn missing_routes_setting_is_a_config_error() {
        let err = ClientConfig::from_yaml_str(MINIMAL).unwrap().load_routes().unwrap_err();
        assert!(matches!(err, ApiError::Config(ref m) if m.contains("routes")));
    }

    #[test]
    fn raw_output_env_switches_mode() {
        std::env::set_var(RAW_OUTPUT_ENV, "1");
        let config = ClientConfig::from_yaml_str(MINIMAL).unwrap().apply_env();
        std::env::remove_var(RAW_OUTPUT_ENV);
        assert!(config.raw_output);
    }

    #[test]
    fn json_documents_are_accepted() {
        let json = r#"{"endpoint":"http://zs","api_key":{"name":"a","secret":"b"},"raw_output":true}"#;
        let config = ClientConfig::from_yaml_str(json).unwrap();
        assert!(config.raw_output);
    }
}
