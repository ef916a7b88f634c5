//! Composable route manager.
//!
//! # State
//! ```text
//! base path:   unset ──set_route──▶ set (last call wins)
//! middleware:  empty ──use──▶ appended (insertion order = execution order)
//! ```
//!
//! Every verb registration wraps its handler in the current middleware chain
//! exactly once and registers it under the current base path. Groups build a
//! fresh child manager and mount its router under a prefix.

use axum::{handler::Handler, Router};

use super::cell::RouterCell;
use super::descriptor::{RouteDescriptor, Verb};
use super::handler::{RouteHandler, RouteTarget};
use super::middleware::{self, Middleware};
use super::path;
use super::RouteError;
use crate::app::AppHandle;

/// A router node with its own middleware chain and base path.
#[derive(Debug, Default)]
pub struct RouteManager {
    cell: RouterCell,
    middleware: Vec<Middleware>,
    base_path: Option<String>,
}

impl RouteManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `middleware` to this node's chain.
    pub fn use_middleware(&mut self, middleware: Middleware) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    pub fn has_middleware(&self) -> bool {
        !self.middleware.is_empty()
    }

    /// Names of the chain, in execution order.
    pub fn middleware_names(&self) -> Vec<String> {
        self.middleware.iter().map(|m| m.name().to_string()).collect()
    }

    /// Set the path subsequent verb registrations apply to.
    pub fn set_route(&mut self, path: impl Into<String>) -> &mut Self {
        self.base_path = Some(path.into());
        self
    }

    pub fn base_path(&self) -> Option<&str> {
        self.base_path.as_deref()
    }

    /// Register `handler` for `verb` on the base path, behind the chain.
    pub fn route<H, T>(&mut self, verb: Verb, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route_with(verb, Vec::new(), handler)
    }

    /// Like [`route`](Self::route), with extra middleware that runs after
    /// this node's chain and before the handler.
    pub fn route_with<H, T>(
        &mut self,
        verb: Verb,
        extra: impl IntoIterator<Item = Middleware>,
        handler: H,
    ) -> Result<&mut Self, RouteError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        let raw = self.base_path.as_deref().ok_or(RouteError::RouteNotSet)?;
        let path = path::normalize(raw)?;

        let chain: Vec<Middleware> = self.middleware.iter().cloned().chain(extra).collect();
        let names = chain.iter().map(|m| m.name().to_string()).collect();
        let route = middleware::wrap(verb.route(handler), &chain);

        self.cell.register(RouteDescriptor::new(path, verb, names), route)?;
        Ok(self)
    }

    pub fn get<H, T>(&mut self, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Verb::Get, handler)
    }

    pub fn post<H, T>(&mut self, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Verb::Post, handler)
    }

    pub fn put<H, T>(&mut self, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Verb::Put, handler)
    }

    pub fn patch<H, T>(&mut self, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Verb::Patch, handler)
    }

    pub fn del<H, T>(&mut self, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Verb::Delete, handler)
    }

    pub fn all<H, T>(&mut self, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Verb::All, handler)
    }

    pub fn get_with<H, T>(
        &mut self,
        extra: impl IntoIterator<Item = Middleware>,
        handler: H,
    ) -> Result<&mut Self, RouteError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route_with(Verb::Get, extra, handler)
    }

    pub fn post_with<H, T>(
        &mut self,
        extra: impl IntoIterator<Item = Middleware>,
        handler: H,
    ) -> Result<&mut Self, RouteError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route_with(Verb::Post, extra, handler)
    }

    pub fn put_with<H, T>(
        &mut self,
        extra: impl IntoIterator<Item = Middleware>,
        handler: H,
    ) -> Result<&mut Self, RouteError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route_with(Verb::Put, extra, handler)
    }

    pub fn patch_with<H, T>(
        &mut self,
        extra: impl IntoIterator<Item = Middleware>,
        handler: H,
    ) -> Result<&mut Self, RouteError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route_with(Verb::Patch, extra, handler)
    }

    pub fn del_with<H, T>(
        &mut self,
        extra: impl IntoIterator<Item = Middleware>,
        handler: H,
    ) -> Result<&mut Self, RouteError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route_with(Verb::Delete, extra, handler)
    }

    /// Declare nested routes under `prefix`.
    ///
    /// `build` receives a fresh child manager; once it returns, the child's
    /// router is mounted under `prefix` on this node's router. The child does
    /// not inherit this node's middleware.
    pub fn group<F>(&mut self, prefix: &str, build: F) -> Result<&mut Self, RouteError>
    where
        F: FnOnce(&mut RouteManager) -> Result<(), RouteError>,
    {
        let prefix = path::normalize(prefix)?;
        let mut child = RouteManager::new();
        build(&mut child)?;
        self.cell.nest(&prefix, child.cell)?;
        Ok(self)
    }

    /// A [`RouteHandler`] registering into this node's router.
    pub fn handler(&self, path: impl Into<String>) -> RouteHandler {
        RouteHandler::new(self, path)
    }

    /// Every route registered on this node, including mounted groups.
    pub fn routes(&self) -> Vec<RouteDescriptor> {
        self.cell.routes()
    }

    /// Mount this node's router onto the application.
    pub fn attach_to(self, app: &AppHandle) -> Result<(), RouteError> {
        app.mount(self.cell)
    }

    pub(crate) fn into_cell(self) -> RouterCell {
        self.cell
    }

    /// The axum router built so far.
    pub fn into_router(self) -> Router {
        self.cell.router()
    }
}

impl From<&RouteManager> for RouteTarget {
    fn from(manager: &RouteManager) -> Self {
        RouteTarget::new(manager.cell.clone())
    }
}

impl From<&mut RouteManager> for RouteTarget {
    fn from(manager: &mut RouteManager) -> Self {
        RouteTarget::new(manager.cell.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::Request,
        http::StatusCode,
        middleware::Next,
        response::{IntoResponse, Response},
    };
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn recorder(name: &'static str, log: &Log) -> Middleware {
        let log = Arc::clone(log);
        Middleware::from_fn(name, move |req: Request, next: Next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(name);
                next.run(req).await
            }
        })
    }

    async fn send(router: Router, method: &str, uri: &str) -> Response {
        let req = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        router.oneshot(req).await.unwrap()
    }

    #[tokio::test]
    async fn test_overlapping_express_paths_are_errors() {
        let mut manager = RouteManager::new();
        manager.set_route("/u/:id").get(|| async { "user" }).unwrap();

        let err = manager.set_route("/u/*").get(|| async { "any" }).unwrap_err();
        assert!(matches!(err, RouteError::PathConflict { .. }));

        let err = manager.set_route("/a/{oops").get(|| async { "x" }).unwrap_err();
        assert!(matches!(err, RouteError::InvalidPath { .. }));

        assert_eq!(manager.routes().len(), 1);
        let res = send(manager.into_router(), "GET", "/u/1").await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_all_registered_first_keeps_precedence() {
        let mut manager = RouteManager::new();
        manager.set_route("/x").all(|| async { "all" }).unwrap();
        assert!(matches!(
            manager.get(|| async { "get" }),
            Err(RouteError::Conflict { verb: Verb::Get, .. })
        ));

        let res = send(manager.into_router(), "GET", "/x").await;
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"all");
    }

    #[tokio::test]
    async fn test_middleware_runs_in_insertion_order() {
        let log: Log = Arc::default();
        let handler_log = Arc::clone(&log);

        let mut manager = RouteManager::new();
        manager
            .use_middleware(recorder("m1", &log))
            .use_middleware(recorder("m2", &log))
            .set_route("/")
            .get(move || async move {
                handler_log.lock().unwrap().push("handler");
                "ok"
            })
            .unwrap();

        let routes = manager.routes();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].middleware(), ["m1".to_string(), "m2".to_string()]);

        let res = send(manager.into_router(), "GET", "/").await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(*log.lock().unwrap(), ["m1", "m2", "handler"]);
    }

    #[tokio::test]
    async fn test_chain_applied_exactly_once() {
        let log: Log = Arc::default();
        let mut manager = RouteManager::new();
        manager.use_middleware(recorder("auth", &log)).set_route("/items");
        manager.get(|| async { "list" }).unwrap();
        manager.post(|| async { "created" }).unwrap();

        assert_eq!(manager.routes().len(), 2);
        let err = manager.get(|| async { "again" }).unwrap_err();
        assert!(matches!(err, RouteError::Conflict { verb: Verb::Get, .. }));

        let router = manager.into_router();
        send(router.clone(), "GET", "/items").await;
        send(router, "POST", "/items").await;
        assert_eq!(*log.lock().unwrap(), ["auth", "auth"]);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_handler() {
        let reached: Log = Arc::default();
        let handler_log = Arc::clone(&reached);

        let mut manager = RouteManager::new();
        manager
            .use_middleware(Middleware::from_fn("deny", |_req: Request, _next: Next| async {
                StatusCode::UNAUTHORIZED.into_response()
            }))
            .set_route("/secret")
            .get(move || async move {
                handler_log.lock().unwrap().push("handler");
                "secret"
            })
            .unwrap();

        let res = send(manager.into_router(), "GET", "/secret").await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(reached.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_per_call_middleware_runs_after_chain() {
        let log: Log = Arc::default();
        let mut manager = RouteManager::new();
        manager
            .use_middleware(recorder("chain", &log))
            .set_route("/x")
            .get_with([recorder("extra", &log)], || async { "x" })
            .unwrap();

        assert_eq!(manager.routes()[0].middleware(), ["chain".to_string(), "extra".to_string()]);
        send(manager.into_router(), "GET", "/x").await;
        assert_eq!(*log.lock().unwrap(), ["chain", "extra"]);
    }

    #[test]
    fn test_verb_requires_route() {
        let mut manager = RouteManager::new();
        let err = manager.get(|| async { "x" }).unwrap_err();
        assert!(matches!(err, RouteError::RouteNotSet));
    }

    #[test]
    fn test_set_route_last_call_wins() {
        let log: Log = Arc::default();
        let mut manager = RouteManager::new();
        manager
            .use_middleware(recorder("m", &log))
            .set_route("/a")
            .set_route("/b/:id");
        manager.put(|| async { "x" }).unwrap();

        let routes = manager.routes();
        assert_eq!(routes[0].path(), "/b/{id}");
        assert_eq!(routes[0].middleware(), ["m".to_string()]);
        assert!(manager.has_middleware());
    }

    #[tokio::test]
    async fn test_group_mounts_nested_routes() {
        let mut manager = RouteManager::new();
        manager
            .group("/api", |api| {
                api.set_route("/users").get(|| async { "users" })?;
                api.group("/v1", |v1| {
                    v1.set_route("/items/:id").get(|| async { "item" })?;
                    Ok(())
                })?;
                Ok(())
            })
            .unwrap();

        let paths: Vec<_> = manager.routes().iter().map(|d| d.path().to_string()).collect();
        assert_eq!(paths, ["/api/users", "/api/v1/items/{id}"]);

        let router = manager.into_router();
        let res = send(router.clone(), "GET", "/api/users").await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"users");

        let res = send(router.clone(), "GET", "/api/v1/items/7").await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = send(router, "GET", "/users").await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_group_does_not_inherit_chain() {
        let log: Log = Arc::default();
        let mut manager = RouteManager::new();
        manager.use_middleware(recorder("parent", &log));
        manager
            .group("/child", |child| {
                child.use_middleware(recorder("child", &log));
                child.set_route("/").get(|| async { "c" })?;
                Ok(())
            })
            .unwrap();

        send(manager.into_router(), "GET", "/child").await;
        assert_eq!(*log.lock().unwrap(), ["child"]);
    }

    #[tokio::test]
    async fn test_handler_registers_into_manager() {
        let mut manager = RouteManager::new();
        manager.set_route("/a").get(|| async { "a" }).unwrap();
        manager.handler("/b").post(|| async { "b" }).unwrap();

        assert_eq!(manager.routes().len(), 2);
        let res = send(manager.into_router(), "POST", "/b").await;
        assert_eq!(res.status(), StatusCode::OK);
    }
}
