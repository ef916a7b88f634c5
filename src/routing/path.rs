//! Route path normalization.
//!
//! Paths are accepted in either Express style (`/users/:id`, `/files/*`) or
//! axum style (`/users/{id}`, `/files/{*path}`) and normalized to the axum
//! form before they reach the router.

use super::RouteError;

/// Name given to an anonymous trailing `*` segment.
const DEFAULT_WILDCARD: &str = "wildcard";

/// Normalize a route path into axum syntax.
///
/// - an empty path becomes `/`
/// - trailing slashes are dropped (except for the root)
/// - `:name` becomes `{name}`
/// - a trailing `*` / `*name` becomes `{*wildcard}` / `{*name}`
pub fn normalize(path: &str) -> Result<String, RouteError> {
    if path.is_empty() || path == "/" {
        return Ok("/".to_string());
    }
    if !path.starts_with('/') {
        return Err(invalid(path, "paths must start with `/`"));
    }

    let segments: Vec<&str> = path
        .trim_end_matches('/')
        .split('/')
        .skip(1)
        .collect();
    if segments.is_empty() {
        return Ok("/".to_string());
    }

    let last = segments.len() - 1;
    let mut normalized = String::with_capacity(path.len() + 4);
    for (i, segment) in segments.iter().enumerate() {
        normalized.push('/');
        if segment.is_empty() {
            return Err(invalid(path, "empty path segment"));
        }
        if let Some(name) = segment.strip_prefix(':') {
            if name.is_empty() || name.ends_with('?') {
                return Err(invalid(path, "parameters must be named and cannot be optional"));
            }
            normalized.push('{');
            normalized.push_str(name);
            normalized.push('}');
        } else if let Some(name) = segment.strip_prefix('*') {
            if i != last {
                return Err(invalid(path, "wildcards are only allowed in the last segment"));
            }
            let name = if name.is_empty() { DEFAULT_WILDCARD } else { name };
            normalized.push_str("{*");
            normalized.push_str(name);
            normalized.push('}');
        } else if segment.starts_with("{*") && i != last {
            return Err(invalid(path, "wildcards are only allowed in the last segment"));
        } else {
            normalized.push_str(segment);
        }
    }

    Ok(normalized)
}

/// Join a normalized prefix and a normalized path.
pub fn join(prefix: &str, path: &str) -> String {
    match (prefix, path) {
        ("/", path) => path.to_string(),
        (prefix, "/") => prefix.to_string(),
        (prefix, path) => format!("{prefix}{path}"),
    }
}

/// Shape of a path with parameter names erased.
///
/// Two paths with the same shape but different raw text (e.g. `/u/{id}` and
/// `/u/{name}`) cannot live in the same router.
pub(crate) fn shape(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.starts_with("{*") {
                "{*}"
            } else if segment.starts_with('{') {
                "{}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn invalid(path: &str, reason: &'static str) -> RouteError {
    RouteError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}
