//! Named, cloneable middleware functions.
//!
//! A [`Middleware`] is an async function `(Request, Next) -> Response` in the
//! shape of `axum::middleware::from_fn`. It short-circuits the chain simply by
//! returning without calling `next.run(req)`. Tower layers whose service
//! never fails can be carried too, through [`Middleware::from_layer`].

use std::borrow::Cow;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::{
    extract::Request,
    middleware::{from_fn, Next},
    response::{IntoResponse, Response},
    routing::MethodRouter,
    Router,
};
use tower::{Layer, Service, ServiceExt};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type MiddlewareFn = dyn Fn(Request, Next) -> BoxFuture<Response> + Send + Sync;

/// One step of a middleware chain.
#[derive(Clone)]
pub struct Middleware {
    name: Cow<'static, str>,
    func: Arc<MiddlewareFn>,
}

impl Middleware {
    /// Wrap an async function as middleware.
    ///
    /// ```rust,ignore
    /// let audit = Middleware::from_fn("audit", |req: Request, next: Next| async move {
    ///     tracing::info!(path = %req.uri().path(), "audit");
    ///     next.run(req).await
    /// });
    /// ```
    pub fn from_fn<F, Fut, Out>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Out> + Send + 'static,
        Out: IntoResponse + 'static,
    {
        let func: Arc<MiddlewareFn> = Arc::new(move |req, next| {
            let fut = f(req, next);
            Box::pin(async move { fut.await.into_response() })
        });
        Self {
            name: name.into(),
            func,
        }
    }

    /// Wrap a tower layer as middleware. The layer is applied to the rest of
    /// the chain on every request.
    ///
    /// ```rust,ignore
    /// let cors = Middleware::from_layer("cors", CorsLayer::permissive());
    /// ```
    pub fn from_layer<L, Out>(name: impl Into<Cow<'static, str>>, layer: L) -> Self
    where
        L: Layer<Next> + Send + Sync + 'static,
        L::Service: Service<Request, Response = Out, Error = Infallible> + Send + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
        Out: IntoResponse + 'static,
    {
        Self::from_fn(name, move |req: Request, next: Next| {
            let service = layer.layer(next);
            async move {
                match service.oneshot(req).await {
                    Ok(response) => response,
                    Err(never) => match never {},
                }
            }
        })
    }

    /// Name used in route descriptors and logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wrap a single method router.
    pub(crate) fn apply(&self, route: MethodRouter) -> MethodRouter {
        let func = Arc::clone(&self.func);
        route.layer(from_fn(move |req: Request, next: Next| func(req, next)))
    }

    /// Wrap every route currently in `router`.
    pub(crate) fn apply_to_router(&self, router: Router) -> Router {
        let func = Arc::clone(&self.func);
        router.layer(from_fn(move |req: Request, next: Next| func(req, next)))
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware").field("name", &self.name).finish()
    }
}

/// Wrap `route` so that `chain[0]` runs first and the handler runs last.
///
/// axum layers run outermost-last-applied, so the chain is applied in
/// reverse.
pub(crate) fn wrap(route: MethodRouter, chain: &[Middleware]) -> MethodRouter {
    chain
        .iter()
        .rev()
        .fold(route, |route, middleware| middleware.apply(route))
}

/// Same as [`wrap`] for a whole router.
pub(crate) fn wrap_router(router: Router, chain: &[Middleware]) -> Router {
    chain
        .iter()
        .rev()
        .fold(router, |router, middleware| middleware.apply_to_router(router))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderValue, StatusCode};
    use tower::util::MapResponseLayer;

    #[tokio::test]
    async fn test_layer_runs_in_chain_order() {
        let tag = Middleware::from_layer(
            "tag",
            MapResponseLayer::new(|mut res: Response| {
                res.headers_mut().insert("x-tag", HeaderValue::from_static("layer"));
                res
            }),
        );
        let deny = Middleware::from_fn("deny", |req: Request, next: Next| async move {
            if req.headers().contains_key("x-deny") {
                return StatusCode::FORBIDDEN.into_response();
            }
            next.run(req).await
        });
        assert_eq!(tag.name(), "tag");

        let router = wrap_router(
            Router::new().route("/", axum::routing::get(|| async { "ok" })),
            &[tag, deny],
        );

        let req = axum::http::Request::builder().uri("/").body(Body::empty()).unwrap();
        let res = router.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-tag"], "layer");

        // The layer sits outside `deny`, so it still sees the short-circuit.
        let req = axum::http::Request::builder()
            .uri("/")
            .header("x-deny", "1")
            .body(Body::empty())
            .unwrap();
        let res = router.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(res.headers()["x-tag"], "layer");
    }
}
