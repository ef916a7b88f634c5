//! Body-parser capability.
//!
//! The middleware publishes its [`BodyParserConfig`] in the request
//! extensions, where [`EnhancedRequest`](crate::http::EnhancedRequest) picks
//! up the byte limit and enabled formats, and rejects requests whose
//! `Content-Length` already exceeds the limit. The same limit replaces
//! axum's default extractor cap, so `Json`, `Form`, `Bytes` and `Multipart`
//! read up to `limit` bytes.

use std::convert::Infallible;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::header,
    middleware::Next,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tower::{Layer, ServiceExt};

use crate::http::ApiResponse;
use crate::routing::Middleware;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyParserConfig {
    /// Maximum body size in bytes.
    pub limit: usize,
    pub json: bool,
    pub urlencoded: bool,
}

impl BodyParserConfig {
    pub const DEFAULT_LIMIT: usize = 1024 * 1024;
}

impl Default for BodyParserConfig {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            json: true,
            urlencoded: true,
        }
    }
}

/// Middleware enforcing and publishing `config`.
pub fn body_parser(config: BodyParserConfig) -> Middleware {
    Middleware::from_fn("body-parser", move |mut req: Request, next: Next| {
        let config = config.clone();
        async move {
            let declared = req
                .headers()
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<usize>().ok());

            if declared.is_some_and(|len| len > config.limit) {
                tracing::debug!(
                    content_length = ?declared,
                    limit = config.limit,
                    "Request body exceeds limit"
                );
                return ApiResponse::PayloadTooLarge("request entity too large".into())
                    .into_response();
            }

            let limit = DefaultBodyLimit::max(config.limit);
            req.extensions_mut().insert(config);
            let result: Result<_, Infallible> = limit.layer(next).oneshot(req).await;
            match result {
                Ok(response) => response,
                Err(never) => match never {},
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::EnhancedRequest;
    use crate::routing::RouteManager;
    use axum::{body::Body, http::StatusCode};
    use tower::ServiceExt;

    fn router(config: BodyParserConfig) -> axum::Router {
        let mut manager = RouteManager::new();
        manager
            .use_middleware(body_parser(config))
            .set_route("/echo")
            .post(|req: EnhancedRequest| async move {
                axum::Json(serde_json::Value::Object(req.body_params()))
            })
            .unwrap();
        manager.into_router()
    }

    #[tokio::test]
    async fn test_oversize_content_length_is_413() {
        let config = BodyParserConfig {
            limit: 8,
            ..BodyParserConfig::default()
        };
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/echo")
            .header("content-type", "application/json")
            .header("content-length", "32")
            .body(Body::from(r#"{"message":"far too long body"}"#))
            .unwrap();

        let res = router(config).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_disabled_urlencoded_is_ignored() {
        let config = BodyParserConfig {
            urlencoded: false,
            ..BodyParserConfig::default()
        };
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/echo")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("a=1"))
            .unwrap();

        let res = router(config).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"{}");
    }

    #[tokio::test]
    async fn test_limit_applies_to_extractors() {
        let mut manager = RouteManager::new();
        manager
            .use_middleware(body_parser(BodyParserConfig {
                limit: 4 * 1024 * 1024,
                ..BodyParserConfig::default()
            }))
            .set_route("/raw")
            .post(|body: axum::body::Bytes| async move { body.len().to_string() })
            .unwrap();
        let router = manager.into_router();

        // Above axum's 2 MiB default, within the configured limit.
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/raw")
            .body(Body::from(vec![b'a'; 3 * 1024 * 1024]))
            .unwrap();
        let res = router.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"3145728");

        // No Content-Length header, so only the extractor can stop it.
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/raw")
            .body(Body::from(vec![b'a'; 5 * 1024 * 1024]))
            .unwrap();
        let res = router.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
