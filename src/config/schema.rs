//! Configuration schema definitions.
//!
//! All types derive Serde traits and default every field, so an empty file
//! is a valid configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::routing::{CallbackSpec, Verb};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Listener and request settings.
    pub server: ServerConfig,

    /// Log filter and output format.
    pub logging: LoggingConfig,

    /// Capabilities installed at startup.
    pub capabilities: Vec<CapabilityConfig>,

    /// Declarative routes.
    pub routes: Vec<RouteConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host (e.g., "0.0.0.0").
    pub host: String,

    pub port: u16,

    /// Whole-request timeout.
    pub request_timeout_secs: u64,

    /// Startup message; defaults to "Server is running on port {port}".
    pub message: Option<String>,

    /// Log the startup message.
    pub log_startup: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            request_timeout_secs: 30,
            message: None,
            log_startup: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence.
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "fluent_router=info,tower_http=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// One capability to install.
///
/// ```toml
/// [[capabilities]]
/// name = "cors"
/// order = 1
/// options = { origins = ["https://example.com"] }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CapabilityConfig {
    /// Capability name (e.g. `session`, `body-parser`).
    pub name: String,

    pub enabled: bool,

    /// Installation order, ascending. Middleware runs in this order.
    pub order: i32,

    /// Passed verbatim to the capability.
    pub options: Value,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            enabled: true,
            order: 0,
            options: Value::Null,
        }
    }
}

/// One declarative route.
///
/// ```toml
/// [[routes]]
/// method = "get"
/// path = "/"
/// send = "hi"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RouteConfig {
    pub method: Verb,
    pub path: String,
    #[serde(flatten)]
    pub spec: CallbackSpec,
}
