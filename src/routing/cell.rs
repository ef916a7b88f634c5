//! Shared router cell.
//!
//! axum's `Router` is a by-value builder, while the fluent API hands out
//! several objects (route handlers, managers, the app handle) that all
//! register into the same router. A `RouterCell` owns the router behind a
//! mutex and keeps an index of registered `(path, verb)` pairs plus a
//! `matchit` mirror of the router's path tree, so that conflicts surface as
//! [`RouteError`]s instead of axum panics.
//!
//! A verb registered after `ALL` on the same path is a conflict: `ALL`
//! registered first answers every method.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{routing::MethodRouter, Router};

use super::descriptor::{RouteDescriptor, Verb};
use super::path;
use super::RouteError;

#[derive(Clone, Default)]
pub(crate) struct RouterCell {
    inner: Arc<Mutex<CellState>>,
}

#[derive(Default)]
struct CellState {
    router: Router,
    routes: Vec<RouteDescriptor>,
    /// path shape -> (raw path, verbs registered on it)
    index: HashMap<String, (String, BTreeSet<Verb>)>,
    /// Same paths as `router`, inserted with the matcher axum uses.
    matcher: matchit::Router<()>,
}

impl CellState {
    fn check(&self, path: &str, verb: Verb) -> Result<(), RouteError> {
        match self.index.get(&path::shape(path)) {
            Some((existing, _)) if existing != path => Err(RouteError::PathConflict {
                path: path.to_string(),
                existing: existing.clone(),
            }),
            Some((_, verbs)) if verbs.contains(&verb) || verbs.contains(&Verb::All) => {
                Err(RouteError::Conflict {
                    verb,
                    path: path.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Matcher with every new path of `paths` inserted. `self.matcher` is
    /// left untouched on error.
    fn matcher_with<'a>(
        &self,
        paths: impl IntoIterator<Item = &'a str>,
    ) -> Result<matchit::Router<()>, RouteError> {
        let mut matcher = self.matcher.clone();
        let mut added = BTreeSet::new();
        for path in paths {
            if self.index.contains_key(&path::shape(path)) || !added.insert(path) {
                continue;
            }
            matcher.insert(path, ()).map_err(|e| match e {
                matchit::InsertError::Conflict { with } => RouteError::PathConflict {
                    path: path.to_string(),
                    existing: with,
                },
                other => RouteError::InvalidPath {
                    path: path.to_string(),
                    reason: other.to_string(),
                },
            })?;
        }
        Ok(matcher)
    }

    fn record(&mut self, descriptor: RouteDescriptor) {
        let entry = self
            .index
            .entry(path::shape(descriptor.path()))
            .or_insert_with(|| (descriptor.path().to_string(), BTreeSet::new()));
        entry.1.insert(descriptor.verb());
        self.routes.push(descriptor);
    }

    /// Check every incoming descriptor against this state and against each
    /// other before anything is mutated.
    fn check_all(&self, incoming: &[RouteDescriptor]) -> Result<(), RouteError> {
        let mut scratch = CellState::default();
        for descriptor in incoming {
            self.check(descriptor.path(), descriptor.verb())?;
            scratch.check(descriptor.path(), descriptor.verb())?;
            scratch.record(descriptor.clone());
        }
        Ok(())
    }
}

impl std::fmt::Debug for RouterCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterCell")
            .field("routes", &self.lock().routes.len())
            .finish()
    }
}

impl RouterCell {
    fn lock(&self) -> MutexGuard<'_, CellState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register one method router under `path` (already normalized).
    pub(crate) fn register(
        &self,
        descriptor: RouteDescriptor,
        route: MethodRouter,
    ) -> Result<RouteDescriptor, RouteError> {
        let mut state = self.lock();
        state.check(descriptor.path(), descriptor.verb())?;
        state.matcher = state.matcher_with([descriptor.path()])?;

        let router = std::mem::take(&mut state.router);
        state.router = router.route(descriptor.path(), route);
        state.record(descriptor.clone());

        tracing::debug!(
            verb = %descriptor.verb(),
            path = %descriptor.path(),
            middleware = ?descriptor.middleware(),
            "Route registered"
        );
        Ok(descriptor)
    }

    /// Move every route of `child` under `prefix` (already normalized).
    ///
    /// A root prefix merges instead, since axum does not nest at `/`.
    pub(crate) fn nest(&self, prefix: &str, child: RouterCell) -> Result<(), RouteError> {
        if prefix.contains("{*") {
            return Err(RouteError::InvalidPath {
                path: prefix.to_string(),
                reason: "cannot mount a router under a wildcard".into(),
            });
        }

        let child = std::mem::take(&mut *child.lock());
        if child.routes.is_empty() {
            return Ok(());
        }
        let incoming: Vec<RouteDescriptor> = child
            .routes
            .iter()
            .map(|descriptor| descriptor.prefixed(prefix))
            .collect();

        let mut state = self.lock();
        state.check_all(&incoming)?;
        state.matcher = state.matcher_with(incoming.iter().map(RouteDescriptor::path))?;

        let router = std::mem::take(&mut state.router);
        state.router = if prefix == "/" {
            router.merge(child.router)
        } else {
            router.nest(prefix, child.router)
        };
        for descriptor in incoming {
            state.record(descriptor);
        }

        tracing::debug!(prefix = %prefix, routes = child.routes.len(), "Router mounted");
        Ok(())
    }

    /// Merge every route of `other` at the root.
    pub(crate) fn merge(&self, other: RouterCell) -> Result<(), RouteError> {
        self.nest("/", other)
    }

    /// All descriptors registered so far, in registration order.
    pub(crate) fn routes(&self) -> Vec<RouteDescriptor> {
        self.lock().routes.clone()
    }

    /// Clone of the router built so far.
    pub(crate) fn router(&self) -> Router {
        self.lock().router.clone()
    }
}
