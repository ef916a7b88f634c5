//! Application handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::OriginalUri,
    http::Method,
    Router,
};

use crate::http::response::ApiResponse;
use crate::routing::{
    middleware, path, Middleware, RouteDescriptor, RouteError, RouteHandler, RouteManager,
    RouteTarget, RouterCell,
};

static NEXT_APP_ID: AtomicU64 = AtomicU64::new(1);

/// Cloneable reference to one application under construction.
///
/// Clones share the same router and middleware; two handles are equal when
/// they refer to the same application.
#[derive(Clone)]
pub struct AppHandle {
    inner: Arc<AppInner>,
}

struct AppInner {
    id: u64,
    cell: RouterCell,
    middleware: Mutex<Vec<Middleware>>,
}

impl AppHandle {
    /// A fresh application with no routes.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AppInner {
                id: NEXT_APP_ID.fetch_add(1, Ordering::Relaxed),
                cell: RouterCell::default(),
                middleware: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Process-unique id of this application.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Add application-wide middleware.
    ///
    /// App middleware wraps every route and the not-found fallback, in
    /// insertion order, regardless of when routes were registered.
    pub fn use_middleware(&self, middleware: Middleware) -> &Self {
        tracing::debug!(app = self.id(), middleware = middleware.name(), "App middleware added");
        self.lock_middleware().push(middleware);
        self
    }

    pub fn middleware_names(&self) -> Vec<String> {
        self.lock_middleware()
            .iter()
            .map(|m| m.name().to_string())
            .collect()
    }

    /// A [`RouteHandler`] bound to this application.
    pub fn route(&self, path: impl Into<String>) -> RouteHandler {
        RouteHandler::new(self, path)
    }

    /// Mount `manager` under `prefix` (Express `app.use(prefix, router)`).
    pub fn mount_at(&self, prefix: &str, manager: RouteManager) -> Result<(), RouteError> {
        let prefix = path::normalize(prefix)?;
        self.inner.cell.nest(&prefix, manager.into_cell())
    }

    pub(crate) fn mount(&self, cell: RouterCell) -> Result<(), RouteError> {
        self.inner.cell.merge(cell)
    }

    /// Every route registered on the application.
    pub fn routes(&self) -> Vec<RouteDescriptor> {
        self.inner.cell.routes()
    }

    /// Build the axum router: routes, JSON not-found fallback, then app
    /// middleware.
    pub fn router(&self) -> Router {
        let router = self.inner.cell.router().fallback(not_found);
        middleware::wrap_router(router, &self.lock_middleware())
    }

    fn lock_middleware(&self) -> std::sync::MutexGuard<'_, Vec<Middleware>> {
        self.inner
            .middleware
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for AppHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for AppHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for AppHandle {}

impl std::fmt::Debug for AppHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppHandle")
            .field("id", &self.inner.id)
            .field("routes", &self.inner.cell)
            .finish()
    }
}

impl From<&AppHandle> for RouteTarget {
    fn from(app: &AppHandle) -> Self {
        RouteTarget::new(app.inner.cell.clone())
    }
}

async fn not_found(method: Method, OriginalUri(uri): OriginalUri) -> ApiResponse {
    ApiResponse::NotFound(format!("Cannot {} {}", method, uri.path()))
}
