//! Single-path route handler.
//!
//! A `RouteHandler` binds one URL path to a target router (the application
//! handle or a route manager) and registers verbs on it, either with regular
//! axum handlers or with a declarative [`CallbackSpec`].

use std::collections::BTreeMap;

use axum::{
    handler::Handler,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

use super::cell::RouterCell;
use super::descriptor::{RouteDescriptor, Verb};
use super::path;
use super::RouteError;

/// Something a [`RouteHandler`] can register routes into.
#[derive(Debug, Clone)]
pub struct RouteTarget {
    cell: RouterCell,
}

impl RouteTarget {
    pub(crate) fn new(cell: RouterCell) -> Self {
        Self { cell }
    }
}

/// Binds one path to a target and registers verbs on it.
#[derive(Debug, Clone)]
pub struct RouteHandler {
    path: String,
    target: Option<RouteTarget>,
}

impl RouteHandler {
    /// Handler for `path`, bound to `target`.
    pub fn new(target: impl Into<RouteTarget>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            target: Some(target.into()),
        }
    }

    /// Handler for `path` with no target yet; verbs fail until [`bind`](Self::bind).
    pub fn unbound(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            target: None,
        }
    }

    pub fn bind(&mut self, target: impl Into<RouteTarget>) -> &mut Self {
        self.target = Some(target.into());
        self
    }

    pub fn is_bound(&self) -> bool {
        self.target.is_some()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Register `handler` for `verb` on this path.
    pub fn route<H, T>(&self, verb: Verb, handler: H) -> Result<RouteDescriptor, RouteError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        let target = self.target.as_ref().ok_or_else(|| RouteError::TargetNotBound {
            path: self.path.clone(),
        })?;
        let path = path::normalize(&self.path)?;
        target
            .cell
            .register(RouteDescriptor::new(path, verb, Vec::new()), verb.route(handler))
    }

    pub fn get<H, T>(&self, handler: H) -> Result<&Self, RouteError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Verb::Get, handler).map(|_| self)
    }

    pub fn post<H, T>(&self, handler: H) -> Result<&Self, RouteError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Verb::Post, handler).map(|_| self)
    }

    pub fn put<H, T>(&self, handler: H) -> Result<&Self, RouteError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Verb::Put, handler).map(|_| self)
    }

    pub fn patch<H, T>(&self, handler: H) -> Result<&Self, RouteError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Verb::Patch, handler).map(|_| self)
    }

    pub fn delete<H, T>(&self, handler: H) -> Result<&Self, RouteError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Verb::Delete, handler).map(|_| self)
    }

    pub fn all<H, T>(&self, handler: H) -> Result<&Self, RouteError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Verb::All, handler).map(|_| self)
    }

    /// Register a canned response described by `spec` for `verb`.
    pub fn apply_callbacks(&self, verb: Verb, spec: CallbackSpec) -> Result<&Self, RouteError> {
        let response = spec.into_response_parts()?;
        self.route(verb, move || {
            let response = response.clone();
            async move { response }
        })
        .map(|_| self)
    }
}

/// Declarative response shorthand.
///
/// ```toml
/// send = "hi"                      # 200 text/html "hi"
/// json = { ok = true }             # 200 application/json
/// redirect = "/login"              # 302 Location: /login
/// status = 201                     # optional status override
/// headers = { x-powered-by = "fluent-router" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallbackSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl CallbackSpec {
    pub fn send(value: impl Into<serde_json::Value>) -> Self {
        Self {
            send: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn json(value: impl Into<serde_json::Value>) -> Self {
        Self {
            json: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            redirect: Some(location.into()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Check status, headers and body shape without registering a route.
    pub fn validate(&self) -> Result<(), RouteError> {
        self.clone().into_response_parts().map(|_| ())
    }

    fn into_response_parts(self) -> Result<CallbackResponse, RouteError> {
        let status = self
            .status
            .map(StatusCode::from_u16)
            .transpose()
            .map_err(|e| RouteError::InvalidCallbackSpec(format!("invalid status: {e}")))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::try_from(name.as_str()).map_err(|e| {
                RouteError::InvalidCallbackSpec(format!("invalid header name `{name}`: {e}"))
            })?;
            let value = HeaderValue::try_from(value.as_str()).map_err(|e| {
                RouteError::InvalidCallbackSpec(format!("invalid header value: {e}"))
            })?;
            headers.insert(name, value);
        }

        let body = match (self.send, self.json, self.redirect) {
            (Some(serde_json::Value::String(text)), None, None) => CallbackBody::Html(text),
            (Some(value), None, None) | (None, Some(value), None) => CallbackBody::Json(value),
            (None, None, Some(location)) => {
                let location = HeaderValue::try_from(location.as_str()).map_err(|e| {
                    RouteError::InvalidCallbackSpec(format!("invalid redirect: {e}"))
                })?;
                headers.insert(header::LOCATION, location);
                CallbackBody::Redirect
            }
            (None, None, None) => {
                return Err(RouteError::InvalidCallbackSpec(
                    "one of `send`, `json` or `redirect` is required".into(),
                ))
            }
            _ => {
                return Err(RouteError::InvalidCallbackSpec(
                    "only one of `send`, `json` or `redirect` may be given".into(),
                ))
            }
        };

        Ok(CallbackResponse {
            status,
            headers,
            body,
        })
    }
}

#[derive(Debug, Clone)]
enum CallbackBody {
    Html(String),
    Json(serde_json::Value),
    Redirect,
}

#[derive(Debug, Clone)]
struct CallbackResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: CallbackBody,
}

impl IntoResponse for CallbackResponse {
    fn into_response(self) -> Response {
        let (default_status, mut response) = match self.body {
            CallbackBody::Html(text) => (StatusCode::OK, Html(text).into_response()),
            CallbackBody::Json(value) => (StatusCode::OK, Json(value).into_response()),
            CallbackBody::Redirect => (StatusCode::FOUND, Response::default()),
        };
        *response.status_mut() = self.status.unwrap_or(default_status);
        response.headers_mut().extend(self.headers);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn target() -> (RouterCell, RouteTarget) {
        let cell = RouterCell::default();
        (cell.clone(), RouteTarget::new(cell))
    }

    async fn call(cell: &RouterCell, method: &str, uri: &str) -> Response {
        let req = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        cell.router().oneshot(req).await.unwrap()
    }

    #[tokio::test]
    async fn test_send_spec() {
        let (cell, target) = target();
        RouteHandler::new(target, "/")
            .apply_callbacks(Verb::Get, CallbackSpec::send("hi"))
            .unwrap();

        let res = call(&cell, "GET", "/").await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hi");
    }

    #[tokio::test]
    async fn test_json_spec_with_status_and_header() {
        let (cell, target) = target();
        let spec: CallbackSpec = serde_json::from_value(serde_json::json!({
            "json": { "ok": true },
            "status": 201,
            "headers": { "x-powered-by": "fluent-router" }
        }))
        .unwrap();
        RouteHandler::new(target, "/items").apply_callbacks(Verb::Post, spec).unwrap();

        let res = call(&cell, "POST", "/items").await;
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.headers()["x-powered-by"], "fluent-router");
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, serde_json::json!({ "ok": true }));
    }

    #[tokio::test]
    async fn test_redirect_spec() {
        let (cell, target) = target();
        RouteHandler::new(target, "/old")
            .apply_callbacks(Verb::Get, CallbackSpec::redirect("/new"))
            .unwrap();

        let res = call(&cell, "GET", "/old").await;
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()[header::LOCATION], "/new");
    }

    #[test]
    fn test_invalid_specs() {
        let (_, target) = target();
        let handler = RouteHandler::new(target, "/");

        let empty = handler.apply_callbacks(Verb::Get, CallbackSpec::default());
        assert!(matches!(empty, Err(RouteError::InvalidCallbackSpec(_))));

        let both = CallbackSpec {
            json: Some(serde_json::json!(1)),
            ..CallbackSpec::send("x")
        };
        assert!(matches!(
            handler.apply_callbacks(Verb::Get, both),
            Err(RouteError::InvalidCallbackSpec(_))
        ));

        let unknown =
            serde_json::from_value::<CallbackSpec>(serde_json::json!({ "render": "index" }));
        assert!(unknown.is_err());
    }

    #[test]
    fn test_unbound_handler_fails() {
        async fn ok() -> &'static str {
            "ok"
        }

        let mut handler = RouteHandler::unbound("/users");
        let err = handler.get(ok).unwrap_err();
        assert!(matches!(err, RouteError::TargetNotBound { ref path } if path == "/users"));

        let (cell, target) = target();
        handler.bind(target);
        assert!(handler.get(ok).is_ok());
        assert_eq!(cell.routes().len(), 1);
    }
}
