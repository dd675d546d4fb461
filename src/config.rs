use serde::Deserialize;
use tracing::warn;

use crate::error::ConfigError;
use crate::http::Encoding;
use crate::http::status::HttpStatus;

/// Per-host defaults applied to every [`Response`](crate::http::response::Response).
///
/// There is no process-wide instance: the config is handed to
/// [`Host`](crate::server::Host), which builds one response per request from it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Hold non-empty writes until an explicit start or flush.
    pub buffer_output: bool,

    pub encoding: Encoding,

    pub default_status: String,

    /// Sent as the `Server` header when set.
    pub server_name: Option<String>,

    pub default_content_type: Option<String>,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            buffer_output: false,
            encoding: Encoding::Utf8,
            default_status: HttpStatus::Ok.status_line(),
            server_name: None,
            default_content_type: None,
        }
    }
}

impl ResponseConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str::<ResponseConfig>(content)?)
    }

    pub fn try_from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Loads `path`, falling back to the defaults when it cannot be read or parsed.
    pub fn from_file(path: &str) -> Self {
        match Self::try_from_file(path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path, error = %err, "fall back to default response config");
                ResponseConfig::default()
            }
        }
    }
}
