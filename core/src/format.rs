//! Output format negotiated through the `Accept` header.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ApiError;

/// Media type prefix shared by every format and API version.
pub const MEDIA_TYPE_PREFIX: &str = "application/vnd.zend.serverapi";

/// Response format requested from the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    #[default]
    Xml,
    Json,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Xml => "xml",
            OutputFormat::Json => "json",
        }
    }

    /// `Accept` value, e.g. `application/vnd.zend.serverapi+xml;version=1.3`.
    pub fn media_type(self, api_version: &str) -> String {
        format!("{MEDIA_TYPE_PREFIX}+{};version={api_version}", self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xml" => Ok(OutputFormat::Xml),
            "json" => Ok(OutputFormat::Json),
            _ => Err(ApiError::InvalidFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OutputFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OutputFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("XML".parse::<OutputFormat>().unwrap(), OutputFormat::Xml);
        assert_eq!("Json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
    }

    #[test]
    fn unknown_format_is_rejected() {
        let err = "yaml".parse::<OutputFormat>().unwrap_err();
        assert!(matches!(err, ApiError::InvalidFormat(ref f) if f == "yaml"));
    }

    #[test]
    fn media_type_carries_format_and_version() {
        assert_eq!(
            OutputFormat::Json.media_type("1.3"),
            "application/vnd.zend.serverapi+json;version=1.3"
        );
    }

    #[test]
    fn deserializes_from_config_value() {
        let format: OutputFormat = serde_json::from_str(r#""JSON""#).unwrap();
        assert_eq!(format, OutputFormat::Json);
        assert!(serde_json::from_str::<OutputFormat>(r#""csv""#).is_err());
    }
}
