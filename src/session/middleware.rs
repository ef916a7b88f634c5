use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{Session, SessionConfig, SessionData, SessionStore};
use crate::http::{cookie, ApiResponse};
use crate::routing::Middleware;

/// Session middleware over `store`.
pub fn session(store: Arc<dyn SessionStore>, config: SessionConfig) -> Middleware {
    let config = Arc::new(config);
    Middleware::from_fn("session", move |req: Request, next: Next| {
        let store = Arc::clone(&store);
        let config = Arc::clone(&config);
        async move { handle(store, config, req, next).await }
    })
}

async fn handle(
    store: Arc<dyn SessionStore>,
    config: Arc<SessionConfig>,
    mut req: Request,
    next: Next,
) -> Response {
    let existing = match cookie::get(req.headers(), &config.cookie_name) {
        Some(id) => match store.load(&id).await {
            Ok(Some(data)) => Some((id, data)),
            Ok(None) => None,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load session");
                return ApiResponse::ServiceUnavailable("session store unavailable".into())
                    .into_response();
            }
        },
        None => None,
    };

    let session = match existing {
        Some((id, data)) => Session::new(id, data, false),
        None => Session::new(uuid::Uuid::new_v4().to_string(), SessionData::new(), true),
    };
    req.extensions_mut().insert(session.clone());

    let mut response = next.run(req).await;

    let (id, data, is_new, modified, destroyed) = {
        let state = session.lock();
        (
            state.id.clone(),
            state.data.clone(),
            state.is_new,
            state.modified,
            state.destroyed,
        )
    };

    if destroyed {
        if let Err(e) = store.destroy(&id).await {
            tracing::error!(session = %id, error = %e, "Failed to destroy session");
        }
        if !is_new {
            append_cookie(&mut response, cookie::render_clear(&config.cookie_name, &config.cookie));
        }
        return response;
    }

    if modified {
        if let Err(e) = store.store(&id, data, Some(config.ttl())).await {
            tracing::error!(session = %id, error = %e, "Failed to save session");
            return ApiResponse::ServiceUnavailable("session store unavailable".into())
                .into_response();
        }
        if is_new {
            tracing::debug!(session = %id, "Session created");
            append_cookie(&mut response, cookie::render(&config.cookie_name, &id, &config.cookie));
        }
    }

    response
}

fn append_cookie(response: &mut Response, rendered: String) {
    match HeaderValue::try_from(rendered) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::warn!(error = %e, "Invalid session cookie"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RouteManager;
    use crate::session::MemorySessionStore;
    use axum::{body::Body, http::StatusCode};
    use tower::ServiceExt;

    fn router(store: MemorySessionStore) -> axum::Router {
        let mut manager = RouteManager::new();
        manager.use_middleware(session(Arc::new(store), SessionConfig::default()));
        manager
            .set_route("/visit")
            .get(|session: Session| async move {
                let visits = session.get::<u32>("visits").unwrap_or(0) + 1;
                session.insert("visits", visits).unwrap();
                visits.to_string()
            })
            .unwrap();
        manager
            .set_route("/peek")
            .get(|session: Session| async move {
                session.get::<u32>("visits").unwrap_or(0).to_string()
            })
            .unwrap();
        manager
            .set_route("/logout")
            .post(|session: Session| async move {
                session.destroy();
                StatusCode::NO_CONTENT
            })
            .unwrap();
        manager.into_router()
    }

    async fn call(
        router: &axum::Router,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
    ) -> Response {
        let mut req = axum::http::Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        router.clone().oneshot(req.body(Body::empty()).unwrap()).await.unwrap()
    }

    async fn text(response: Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let store = MemorySessionStore::new();
        let router = router(store.clone());

        let res = call(&router, "GET", "/visit", None).await;
        let set_cookie = res.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(set_cookie.starts_with("sid="));
        assert!(set_cookie.contains("HttpOnly"));
        assert_eq!(text(res).await, "1");
        assert_eq!(store.len(), 1);

        let cookie = set_cookie.split(';').next().unwrap().to_string();
        let res = call(&router, "GET", "/visit", Some(&cookie)).await;
        assert!(res.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(text(res).await, "2");

        let res = call(&router, "POST", "/logout", Some(&cookie)).await;
        assert!(res.headers()[header::SET_COOKIE].to_str().unwrap().contains("Max-Age=0"));
        assert!(store.is_empty());

        let res = call(&router, "GET", "/peek", Some(&cookie)).await;
        assert_eq!(text(res).await, "0");
    }

    #[tokio::test]
    async fn test_unmodified_session_is_not_stored() {
        let store = MemorySessionStore::new();
        let router = router(store.clone());

        let res = call(&router, "GET", "/peek", None).await;
        assert!(res.headers().get(header::SET_COOKIE).is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_extractor_without_middleware_is_500() {
        let mut manager = RouteManager::new();
        manager
            .set_route("/")
            .get(|_session: Session| async { "unreachable" })
            .unwrap();

        let res = call(&manager.into_router(), "GET", "/", None).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
