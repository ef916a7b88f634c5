//! Cookie parsing and `Set-Cookie` rendering.

use std::collections::BTreeMap;
use std::fmt::Write;

use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes rendered into `Set-Cookie`, verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieOptions {
    pub path: Option<String>,
    pub domain: Option<String>,
    /// Seconds.
    pub max_age: Option<i64>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: Some("/".to_string()),
            domain: None,
            max_age: None,
            http_only: true,
            secure: false,
            same_site: None,
        }
    }
}

/// Render a `Set-Cookie` value.
pub fn render(name: &str, value: &str, options: &CookieOptions) -> String {
    let mut out = format!("{name}={value}");
    if let Some(path) = &options.path {
        let _ = write!(out, "; Path={path}");
    }
    if let Some(domain) = &options.domain {
        let _ = write!(out, "; Domain={domain}");
    }
    if let Some(max_age) = options.max_age {
        let _ = write!(out, "; Max-Age={max_age}");
    }
    if options.http_only {
        out.push_str("; HttpOnly");
    }
    if options.secure {
        out.push_str("; Secure");
    }
    if let Some(same_site) = options.same_site {
        let _ = write!(out, "; SameSite={}", same_site.as_str());
    }
    out
}

/// Render a `Set-Cookie` value that expires `name` immediately.
pub fn render_clear(name: &str, options: &CookieOptions) -> String {
    let options = CookieOptions {
        max_age: Some(0),
        ..options.clone()
    };
    render(name, "", &options)
}

/// Every cookie sent with the request. Later duplicates do not override
/// earlier ones.
pub fn parse(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut cookies = BTreeMap::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else { continue };
        for pair in value.split(';') {
            let Some((name, value)) = pair.split_once('=') else { continue };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let value = value.trim().trim_matches('"');
            cookies
                .entry(name.to_string())
                .or_insert_with(|| value.to_string());
        }
    }
    cookies
}

/// Value of one cookie.
pub fn get(headers: &HeaderMap, name: &str) -> Option<String> {
    parse(headers).remove(name)
}
