//! Request enhancer.
//!
//! [`EnhancedRequest`] is an extractor that buffers the body once and then
//! answers lookups as pure projections over the request. Nothing is cached:
//! every accessor recomputes from the headers, URI and body bytes.
//!
//! # Design Decisions
//! - Query and body maps keep the first value of a repeated key, so
//!   `has_*` and the single-value getters always agree
//! - Body parsing follows `Content-Type` and the body-parser settings found
//!   in the request extensions (defaults when the capability is absent)
//! - Header lookups are case-insensitive

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};

use axum::{
    body::Bytes,
    extract::{ConnectInfo, FromRequest, Request},
    http::{header, request::Parts, Extensions, HeaderMap, Method, Uri},
};
use mime::Mime;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::cookie;
use super::response::ApiResponse;
use super::validation::{Rules, ValidationErrors};
use super::X_REQUEST_ID;
use crate::body::BodyParserConfig;

/// Request parts plus the buffered body.
#[derive(Debug, Clone)]
pub struct EnhancedRequest {
    parts: Parts,
    body: Bytes,
}

impl<S> FromRequest<S> for EnhancedRequest
where
    S: Send + Sync,
{
    type Rejection = ApiResponse;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let limit = req
            .extensions()
            .get::<BodyParserConfig>()
            .map_or(BodyParserConfig::DEFAULT_LIMIT, |config| config.limit);

        let (parts, body) = req.into_parts();
        let body = axum::body::to_bytes(body, limit).await.map_err(|e| {
            tracing::debug!(error = %e, limit, "Failed to buffer request body");
            ApiResponse::PayloadTooLarge("request entity too large".into())
        })?;

        Ok(Self { parts, body })
    }
}

impl EnhancedRequest {
    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        Self { parts, body }
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    // query

    pub fn query_params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        if let Some(query) = self.parts.uri.query() {
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                params
                    .entry(key.into_owned())
                    .or_insert_with(|| value.into_owned());
            }
        }
        params
    }

    pub fn query_param(&self, key: &str) -> Option<String> {
        self.query_params().remove(key)
    }

    pub fn has_query_param(&self, key: &str) -> bool {
        self.query_param(key).is_some()
    }

    // body

    /// Body fields for JSON objects and urlencoded forms; empty otherwise.
    pub fn body_params(&self) -> Map<String, Value> {
        let config = self.body_config();
        if self.body.is_empty() {
            return Map::new();
        }

        if config.json && self.is_json() {
            return match serde_json::from_slice::<Value>(&self.body) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            };
        }

        if config.urlencoded && self.is(mime::APPLICATION_WWW_FORM_URLENCODED.essence_str()) {
            let mut map = Map::new();
            for (key, value) in url::form_urlencoded::parse(&self.body) {
                map.entry(key.into_owned())
                    .or_insert_with(|| Value::String(value.into_owned()));
            }
            return map;
        }

        Map::new()
    }

    pub fn body_param(&self, key: &str) -> Option<Value> {
        self.body_params().remove(key)
    }

    pub fn has_body_param(&self, key: &str) -> bool {
        self.body_param(key).is_some()
    }

    /// Deserialize the whole body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    fn body_config(&self) -> BodyParserConfig {
        self.parts
            .extensions
            .get::<BodyParserConfig>()
            .cloned()
            .unwrap_or_default()
    }

    // cookies

    pub fn cookies(&self) -> BTreeMap<String, String> {
        cookie::parse(&self.parts.headers)
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        cookie::get(&self.parts.headers, name)
    }

    pub fn has_cookie(&self, name: &str) -> bool {
        self.cookie(name).is_some()
    }

    // headers

    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts
            .headers
            .get(name.to_ascii_lowercase())
            .and_then(|v| v.to_str().ok())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.parts.headers.contains_key(name.to_ascii_lowercase())
    }

    // content negotiation

    pub fn content_type(&self) -> Option<Mime> {
        self.header(header::CONTENT_TYPE.as_str())?.parse().ok()
    }

    /// Whether `Content-Type` matches `pattern`: a full type
    /// (`application/json`), a wildcard (`text/*`) or a bare subtype or
    /// suffix (`json`).
    pub fn is(&self, pattern: &str) -> bool {
        self.content_type()
            .is_some_and(|content_type| mime_matches(&content_type, pattern))
    }

    pub fn is_json(&self) -> bool {
        self.is("json")
    }

    /// The best of `offered` according to `Accept`, or `None` when the
    /// client accepts none of them. A missing `Accept` accepts the first.
    pub fn accepts<'a>(&self, offered: &[&'a str]) -> Option<&'a str> {
        let Some(accept) = self.header(header::ACCEPT.as_str()) else {
            return offered.first().copied();
        };

        let mut ranges: Vec<(Mime, f32)> = accept
            .split(',')
            .filter_map(|range| {
                let range: Mime = range.trim().parse().ok()?;
                let q = range
                    .get_param("q")
                    .and_then(|q| q.as_str().parse::<f32>().ok())
                    .unwrap_or(1.0);
                Some((range, q))
            })
            .filter(|(_, q)| *q > 0.0)
            .collect();
        ranges.sort_by(|a, b| b.1.total_cmp(&a.1));

        ranges.iter().find_map(|(range, _)| {
            offered.iter().copied().find(|candidate| {
                candidate
                    .parse::<Mime>()
                    .is_ok_and(|candidate| range_matches(range, &candidate))
            })
        })
    }

    // connection

    /// Client address: first `X-Forwarded-For` hop, else the peer address.
    pub fn ip(&self) -> Option<IpAddr> {
        client_ip(&self.parts.headers, &self.parts.extensions)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.header(X_REQUEST_ID)
    }

    // capabilities

    /// Session attached by the session capability.
    #[cfg(feature = "session")]
    pub fn session(&self) -> Option<crate::session::Session> {
        self.parts.extensions.get::<crate::session::Session>().cloned()
    }

    /// CSRF token for this session, created on first use.
    #[cfg(feature = "csrf")]
    pub fn csrf_token(&self) -> Option<String> {
        self.session().map(|session| crate::security::csrf::token(&session))
    }

    /// Claims verified by the JWT `authenticate` middleware.
    #[cfg(feature = "jwt")]
    pub fn claims(&self) -> Option<&crate::security::jwt::Claims> {
        self.parts.extensions.get::<crate::security::jwt::Claims>()
    }

    /// Check `rules` against body fields, falling back to query parameters.
    pub fn validate(&self, rules: &Rules) -> Result<(), ValidationErrors> {
        let body = self.body_params();
        let query = self.query_params();
        rules
            .check(|field| {
                body.get(field)
                    .and_then(value_as_string)
                    .or_else(|| query.get(field).cloned())
            })
            .into_result()
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn mime_matches(content_type: &Mime, pattern: &str) -> bool {
    if !pattern.contains('/') {
        return content_type.subtype() == pattern
            || content_type.suffix().is_some_and(|suffix| suffix == pattern);
    }
    pattern
        .parse::<Mime>()
        .is_ok_and(|pattern| range_matches(&pattern, content_type))
}

fn range_matches(range: &Mime, candidate: &Mime) -> bool {
    (range.type_() == mime::STAR || range.type_() == candidate.type_())
        && (range.subtype() == mime::STAR || range.subtype() == candidate.subtype())
}

/// Client address from `X-Forwarded-For` or the connection info.
pub(crate) fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok());

    forwarded.or_else(|| peer_ip(extensions))
}

/// Address of the connected peer; ignores forwarding headers.
pub(crate) fn peer_ip(extensions: &Extensions) -> Option<IpAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}
