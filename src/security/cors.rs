//! CORS capability, backed by `tower_http::cors::CorsLayer`.
//!
//! # Responsibilities
//! - Answer every `OPTIONS` request as a preflight with the allowed methods,
//!   headers and max age; the handler never runs
//! - Add `Access-Control-Allow-Origin`, credentials and exposed headers to
//!   every other response from an allowed origin
//!
//! Origins not on the list get no `Access-Control-*-Origin` header; the
//! browser enforces the rest.

use std::str::FromStr;
use std::time::Duration;

use axum::{
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::Response,
};
use serde::{Deserialize, Serialize};
use tower::util::MapResponseLayer;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use crate::capability::{Capability, CapabilityError};
use crate::routing::Middleware;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; `*` allows any.
    pub origins: Vec<String>,
    pub methods: Vec<String>,
    /// Allowed request headers; empty reflects `Access-Control-Request-Headers`.
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    pub credentials: bool,
    pub max_age_secs: Option<u64>,
    /// Status of preflight responses.
    pub preflight_status: u16,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: vec!["*".to_string()],
            methods: ["GET", "HEAD", "PUT", "PATCH", "POST", "DELETE"]
                .map(String::from)
                .to_vec(),
            allowed_headers: Vec::new(),
            exposed_headers: Vec::new(),
            credentials: false,
            max_age_secs: None,
            preflight_status: 204,
        }
    }
}

/// CORS middleware for `config`.
pub fn cors(config: CorsConfig) -> Result<Middleware, CapabilityError> {
    let layer = cors_layer(&config)?;
    let preflight_status = StatusCode::from_u16(config.preflight_status)
        .map_err(|e| invalid(format!("invalid preflight_status: {e}")))?;

    // Only preflight responses carry `Access-Control-Allow-Methods`.
    let status = MapResponseLayer::new(move |mut res: Response| {
        if res.status() == StatusCode::OK
            && res.headers().contains_key(header::ACCESS_CONTROL_ALLOW_METHODS)
        {
            *res.status_mut() = preflight_status;
        }
        res
    });

    Ok(Middleware::from_layer("cors", (status, layer)))
}

/// Translate `config` into a `CorsLayer`.
///
/// With credentials enabled, `*` origins and an empty header list mirror the
/// request instead, since browsers reject wildcards on credentialed requests.
pub fn cors_layer(config: &CorsConfig) -> Result<CorsLayer, CapabilityError> {
    if config.methods.is_empty() {
        return Err(invalid("methods must not be empty".to_string()));
    }

    let origin = if config.origins.iter().any(|o| o == "*") {
        if config.credentials {
            AllowOrigin::mirror_request()
        } else {
            AllowOrigin::any()
        }
    } else {
        let origins = parse_all(&config.origins, HeaderValue::from_str, "origin")?;
        AllowOrigin::list(origins)
    };

    let methods = parse_all(&config.methods, |m| Method::from_bytes(m.as_bytes()), "method")?;

    let headers = if config.allowed_headers.is_empty() {
        AllowHeaders::mirror_request()
    } else {
        AllowHeaders::list(parse_all(&config.allowed_headers, HeaderName::from_str, "header")?)
    };

    let exposed = parse_all(&config.exposed_headers, HeaderName::from_str, "header")?;

    let mut layer = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(methods)
        .allow_headers(headers)
        .expose_headers(exposed)
        .allow_credentials(config.credentials);
    if let Some(secs) = config.max_age_secs {
        layer = layer.max_age(Duration::from_secs(secs));
    }
    Ok(layer)
}

fn parse_all<T, E: std::fmt::Display>(
    values: &[String],
    parse: impl Fn(&str) -> Result<T, E>,
    what: &str,
) -> Result<Vec<T>, CapabilityError> {
    values
        .iter()
        .map(|v| parse(v.as_str()).map_err(|e| invalid(format!("invalid {what} `{v}`: {e}"))))
        .collect()
}

fn invalid(reason: String) -> CapabilityError {
    CapabilityError::InvalidConfig {
        capability: Capability::Cors,
        reason,
    }
}
