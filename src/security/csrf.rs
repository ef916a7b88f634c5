//! CSRF capability.
//!
//! The token lives in the session under [`SESSION_KEY`] and is created the
//! first time a handler asks for it ([`token`]), so anonymous traffic that
//! never renders a form leaves no session behind. Safe methods pass; every
//! other method must echo the token in one of the configured headers or in
//! the `_csrf` field of a JSON or urlencoded body.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::Request,
    http::{header, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::body::BodyParserConfig;
use crate::http::ApiResponse;
use crate::routing::Middleware;
use crate::session::Session;

/// Session key holding the token.
pub const SESSION_KEY: &str = "_csrf";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Headers checked in order.
    pub header_names: Vec<String>,
    /// Body field checked when no header carries the token.
    pub field: String,
    /// Methods that never need a token.
    pub ignore_methods: Vec<String>,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            header_names: vec!["x-csrf-token".to_string(), "csrf-token".to_string()],
            field: "_csrf".to_string(),
            ignore_methods: ["GET", "HEAD", "OPTIONS"].map(String::from).to_vec(),
        }
    }
}

/// CSRF middleware. Must run after the session middleware.
pub fn csrf(config: CsrfConfig) -> Middleware {
    let config = Arc::new(config);
    Middleware::from_fn("csrf", move |req: Request, next: Next| {
        let config = Arc::clone(&config);
        async move { handle(&config, req, next).await }
    })
}

async fn handle(config: &CsrfConfig, req: Request, next: Next) -> Response {
    let Some(session) = req.extensions().get::<Session>().cloned() else {
        tracing::error!("CSRF middleware installed without the session capability");
        return ApiResponse::InternalServerError("csrf requires the session capability".into())
            .into_response();
    };

    if config
        .ignore_methods
        .iter()
        .any(|m| Method::from_bytes(m.as_bytes()).is_ok_and(|m| m == req.method()))
    {
        return next.run(req).await;
    }

    let from_header = config.header_names.iter().find_map(|name| {
        req.headers()
            .get(name.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    });

    let (req, provided) = match from_header {
        Some(token) => (req, Some(token)),
        None => match token_from_body(config, req).await {
            Ok(found) => found,
            Err(response) => return response,
        },
    };

    let expected = session.get::<String>(SESSION_KEY);
    if provided.is_some() && provided == expected {
        next.run(req).await
    } else {
        tracing::warn!(method = %req.method(), path = %req.uri().path(), "CSRF token mismatch");
        ApiResponse::Forbidden("invalid csrf token".into()).into_response()
    }
}

/// The session's token, created and stored on first use.
pub fn token(session: &Session) -> String {
    if let Some(token) = session.get::<String>(SESSION_KEY) {
        return token;
    }
    let token = uuid::Uuid::new_v4().simple().to_string();
    if let Err(e) = session.insert(SESSION_KEY, &token) {
        tracing::error!(error = %e, "Failed to store CSRF token");
    }
    token
}

/// Buffer the body, look for the token field and rebuild the request.
async fn token_from_body(
    config: &CsrfConfig,
    req: Request,
) -> Result<(Request, Option<String>), Response> {
    let limit = req
        .extensions()
        .get::<BodyParserConfig>()
        .map_or(BodyParserConfig::DEFAULT_LIMIT, |c| c.limit);
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<mime::Mime>().ok());

    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, limit).await.map_err(|_| {
        ApiResponse::PayloadTooLarge("request entity too large".into()).into_response()
    })?;

    let token = match content_type {
        Some(ct) if ct.subtype() == mime::JSON || ct.suffix() == Some(mime::JSON) => {
            serde_json::from_slice::<serde_json::Value>(&bytes)
                .ok()
                .and_then(|v| v.get(&config.field)?.as_str().map(str::to_owned))
        }
        Some(ct) if ct.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str() => {
            url::form_urlencoded::parse(&bytes)
                .find(|(key, _)| key == config.field.as_str())
                .map(|(_, value)| value.into_owned())
        }
        _ => None,
    };

    Ok((Request::from_parts(parts, Body::from(bytes)), token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RouteManager;
    use crate::session::{session, MemorySessionStore, SessionConfig};
    use crate::http::EnhancedRequest;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn router() -> axum::Router {
        router_with(MemorySessionStore::new())
    }

    fn router_with(store: MemorySessionStore) -> axum::Router {
        let mut manager = RouteManager::new();
        manager
            .use_middleware(session(Arc::new(store), SessionConfig::default()))
            .use_middleware(csrf(CsrfConfig::default()));
        manager
            .set_route("/form")
            .get(|req: EnhancedRequest| async move { req.csrf_token().unwrap_or_default() })
            .unwrap();
        manager.set_route("/ping").get(|| async { "pong" }).unwrap();
        manager
            .set_route("/submit")
            .post(|req: EnhancedRequest| async move {
                req.body_param("name")
                    .and_then(|v| v.as_str().map(str::to_owned))
                    .unwrap_or_default()
            })
            .unwrap();
        manager.into_router()
    }

    async fn fetch_token(router: &axum::Router) -> (String, String) {
        let req = axum::http::Request::builder().uri("/form").body(Body::empty()).unwrap();
        let res = router.clone().oneshot(req).await.unwrap();
        let cookie = res.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (cookie, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_post_without_token_is_forbidden() {
        let router = router();
        let (cookie, _) = fetch_token(&router).await;

        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/submit")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let res = router.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, serde_json::json!({ "message": "invalid csrf token" }));
    }

    #[tokio::test]
    async fn test_token_accepted_from_header_and_body() {
        let router = router();
        let (cookie, token) = fetch_token(&router).await;
        assert_eq!(token.len(), 32);

        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/submit")
            .header(header::COOKIE, &cookie)
            .header("x-csrf-token", &token)
            .body(Body::empty())
            .unwrap();
        assert_eq!(router.clone().oneshot(req).await.unwrap().status(), StatusCode::OK);

        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/submit")
            .header(header::COOKIE, &cookie)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(format!("_csrf={token}&name=ada")))
            .unwrap();
        let res = router.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ada");
    }

    #[tokio::test]
    async fn test_anonymous_requests_leave_no_session() {
        let store = MemorySessionStore::new();
        let router = router_with(store.clone());

        for _ in 0..3 {
            let req = axum::http::Request::builder().uri("/ping").body(Body::empty()).unwrap();
            let res = router.clone().oneshot(req).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
            assert!(res.headers().get(header::SET_COOKIE).is_none());
        }
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/submit")
            .body(Body::empty())
            .unwrap();
        assert_eq!(router.clone().oneshot(req).await.unwrap().status(), StatusCode::FORBIDDEN);
        assert!(store.is_empty());

        fetch_token(&router).await;
        assert_eq!(store.len(), 1);
    }
}
