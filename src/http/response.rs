//! Response senders.
//!
//! [`ApiResponse`] is the closed set of semantic JSON responses with their
//! fixed status codes. [`Reply`] is an extractor that accumulates status,
//! headers and cookies and ends in exactly one terminal sender; senders take
//! `self`, so a second send on the same reply does not compile.
//!
//! | sender | status | body |
//! |---|---|---|
//! | success | 200 | `{message}` / `{message, data}` |
//! | created / updated / deleted | 201 / 200 / 200 | object |
//! | validation_failed | 400 | errors map |
//! | bad_request | 400 | `{message}` |
//! | auth_required | 401 | `{message}` |
//! | forbidden | 403 | `{message}` |
//! | not_found | 404 | `{message}` |
//! | payload_too_large | 413 | `{message}` |
//! | rate_limit_exceeded | 429 | fixed `{message}` |
//! | internal_server_error | 500 | `{message}` |
//! | service_unavailable | 503 | `{message}` |

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Value};

use super::cookie::{self, CookieOptions};
use super::validation::ValidationErrors;

/// Body of every 429 response.
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests, please try again later.";

/// Semantic JSON responses.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Success { message: String, data: Option<Value> },
    Created(Value),
    Updated(Value),
    Deleted(Value),
    ValidationFailed(ValidationErrors),
    BadRequest(String),
    AuthRequired(String),
    Forbidden(String),
    NotFound(String),
    PayloadTooLarge(String),
    RateLimitExceeded,
    InternalServerError(String),
    ServiceUnavailable(String),
}

impl ApiResponse {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiResponse::Success { .. } | ApiResponse::Updated(_) | ApiResponse::Deleted(_) => {
                StatusCode::OK
            }
            ApiResponse::Created(_) => StatusCode::CREATED,
            ApiResponse::ValidationFailed(_) | ApiResponse::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiResponse::AuthRequired(_) => StatusCode::UNAUTHORIZED,
            ApiResponse::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiResponse::NotFound(_) => StatusCode::NOT_FOUND,
            ApiResponse::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiResponse::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiResponse::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiResponse::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn body(&self) -> Value {
        match self {
            ApiResponse::Success { message, data: None } => json!({ "message": message }),
            ApiResponse::Success {
                message,
                data: Some(data),
            } => json!({ "message": message, "data": data }),
            ApiResponse::Created(object)
            | ApiResponse::Updated(object)
            | ApiResponse::Deleted(object) => {
                object.clone()
            }
            ApiResponse::ValidationFailed(errors) => Value::Object(
                errors
                    .iter()
                    .map(|(field, message)| (field.to_string(), Value::from(message)))
                    .collect(),
            ),
            ApiResponse::RateLimitExceeded => json!({ "message": RATE_LIMIT_MESSAGE }),
            ApiResponse::BadRequest(message)
            | ApiResponse::AuthRequired(message)
            | ApiResponse::Forbidden(message)
            | ApiResponse::NotFound(message)
            | ApiResponse::PayloadTooLarge(message)
            | ApiResponse::InternalServerError(message)
            | ApiResponse::ServiceUnavailable(message) => json!({ "message": message }),
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// Pending response state plus terminal senders.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    status: Option<StatusCode>,
    headers: HeaderMap,
}

impl<S> FromRequestParts<S> for Reply
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(_parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Reply::new())
    }
}

impl Reply {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status used by `send`/`json`; semantic senders keep their own.
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Set a response header. Invalid names or values are logged and skipped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Skipping invalid response header"),
        }
        self
    }

    pub fn cookie(self, name: &str, value: &str, options: &CookieOptions) -> Self {
        self.set_cookie(cookie::render(name, value, options))
    }

    pub fn clear_cookie(self, name: &str, options: &CookieOptions) -> Self {
        self.set_cookie(cookie::render_clear(name, options))
    }

    fn set_cookie(mut self, rendered: String) -> Self {
        match HeaderValue::try_from(rendered) {
            Ok(value) => {
                self.headers.append(header::SET_COOKIE, value);
            }
            Err(_) => tracing::warn!("Skipping invalid Set-Cookie value"),
        }
        self
    }

    fn finish(self, default_status: StatusCode, response: impl IntoResponse) -> Response {
        let mut response = response.into_response();
        *response.status_mut() = self.status.unwrap_or(default_status);
        response.headers_mut().extend(self.headers);
        response
    }

    fn finish_api(self, api: ApiResponse) -> Response {
        let status = api.status();
        Reply { status: Some(status), ..self }.finish(status, api)
    }

    /// `text/html` body.
    pub fn send(self, body: impl Into<String>) -> Response {
        self.finish(StatusCode::OK, Html(body.into()))
    }

    /// JSON body; a value that fails to serialize becomes a 500.
    pub fn json<T: Serialize>(self, body: &T) -> Response {
        match serde_json::to_value(body) {
            Ok(value) => self.finish(StatusCode::OK, Json(value)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response body");
                self.finish_api(ApiResponse::InternalServerError(
                    "failed to serialize response".into(),
                ))
            }
        }
    }

    /// 302 to `location`.
    pub fn redirect(self, location: &str) -> Response {
        let reply = self.header(header::LOCATION.as_str(), location);
        reply.finish(StatusCode::FOUND, ())
    }

    pub fn respond(self, api: ApiResponse) -> Response {
        self.finish_api(api)
    }

    pub fn success(self, message: impl Into<String>) -> Response {
        self.finish_api(ApiResponse::Success {
            message: message.into(),
            data: None,
        })
    }

    pub fn success_with<T: Serialize>(self, message: impl Into<String>, data: &T) -> Response {
        match serde_json::to_value(data) {
            Ok(data) => self.finish_api(ApiResponse::Success {
                message: message.into(),
                data: Some(data),
            }),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response data");
                self.internal_server_error("failed to serialize response")
            }
        }
    }

    pub fn created<T: Serialize>(self, object: &T) -> Response {
        self.object(object, ApiResponse::Created)
    }

    pub fn updated<T: Serialize>(self, object: &T) -> Response {
        self.object(object, ApiResponse::Updated)
    }

    pub fn deleted<T: Serialize>(self, object: &T) -> Response {
        self.object(object, ApiResponse::Deleted)
    }

    fn object<T: Serialize>(self, object: &T, wrap: fn(Value) -> ApiResponse) -> Response {
        match serde_json::to_value(object) {
            Ok(value) => self.finish_api(wrap(value)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response object");
                self.internal_server_error("failed to serialize response")
            }
        }
    }

    pub fn validation_failed(self, errors: ValidationErrors) -> Response {
        self.finish_api(ApiResponse::ValidationFailed(errors))
    }

    pub fn bad_request(self, message: impl Into<String>) -> Response {
        self.finish_api(ApiResponse::BadRequest(message.into()))
    }

    pub fn auth_required(self, message: impl Into<String>) -> Response {
        self.finish_api(ApiResponse::AuthRequired(message.into()))
    }

    pub fn forbidden(self, message: impl Into<String>) -> Response {
        self.finish_api(ApiResponse::Forbidden(message.into()))
    }

    pub fn not_found(self, message: impl Into<String>) -> Response {
        self.finish_api(ApiResponse::NotFound(message.into()))
    }

    pub fn rate_limit_exceeded(self) -> Response {
        self.finish_api(ApiResponse::RateLimitExceeded)
    }

    pub fn internal_server_error(self, message: impl Into<String>) -> Response {
        self.finish_api(ApiResponse::InternalServerError(message.into()))
    }

    pub fn service_unavailable(self, message: impl Into<String>) -> Response {
        self.finish_api(ApiResponse::ServiceUnavailable(message.into()))
    }
}
