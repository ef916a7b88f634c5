//! Route descriptors and HTTP verbs.

use std::fmt;
use std::str::FromStr;

use axum::{
    handler::Handler,
    routing::{self, MethodRouter},
};
use serde::{Deserialize, Serialize};

/// HTTP verb a route is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    #[serde(alias = "del")]
    Delete,
    Head,
    Options,
    /// Matches every method.
    All,
}

impl Verb {
    /// Upper-case method name (`ALL` for [`Verb::All`]).
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
            Verb::Head => "HEAD",
            Verb::Options => "OPTIONS",
            Verb::All => "ALL",
        }
    }

    /// Build the axum method router for `handler` under this verb.
    pub(crate) fn route<H, T>(self, handler: H) -> MethodRouter
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        match self {
            Verb::Get => routing::get(handler),
            Verb::Post => routing::post(handler),
            Verb::Put => routing::put(handler),
            Verb::Patch => routing::patch(handler),
            Verb::Delete => routing::delete(handler),
            Verb::Head => routing::head(handler),
            Verb::Options => routing::options(handler),
            Verb::All => routing::any(handler),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Verb::Get),
            "post" => Ok(Verb::Post),
            "put" => Ok(Verb::Put),
            "patch" => Ok(Verb::Patch),
            "delete" | "del" => Ok(Verb::Delete),
            "head" => Ok(Verb::Head),
            "options" => Ok(Verb::Options),
            "all" | "any" => Ok(Verb::All),
            other => Err(format!("unknown HTTP verb `{other}`")),
        }
    }
}

/// A registered route: path, verb and the names of the middleware wrapping
/// its handler, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDescriptor {
    path: String,
    verb: Verb,
    middleware: Vec<String>,
}

impl RouteDescriptor {
    pub(crate) fn new(path: String, verb: Verb, middleware: Vec<String>) -> Self {
        Self {
            path,
            verb,
            middleware,
        }
    }

    /// Full (normalized) path within the router that owns the descriptor.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    /// Middleware names in the order they run.
    pub fn middleware(&self) -> &[String] {
        &self.middleware
    }

    /// Same descriptor, mounted under `prefix`.
    pub(crate) fn prefixed(&self, prefix: &str) -> Self {
        Self {
            path: super::path::join(prefix, &self.path),
            ..self.clone()
        }
    }
}
