//! HTTP request/response enhancers and the server.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request id, trace, timeout layers)
//!     → application router (app middleware, route middleware)
//!     → handler extracts EnhancedRequest (request.rs) and Reply (response.rs)
//!     → ApiResponse / Reply sender → client
//! ```

pub mod cookie;
pub mod request;
pub mod response;
pub mod server;
pub mod validation;

pub use cookie::{CookieOptions, SameSite};
pub use request::EnhancedRequest;
pub use response::{ApiResponse, Reply, RATE_LIMIT_MESSAGE};
pub use server::HttpServer;
pub use validation::{Rule, Rules, ValidationErrors};

/// Header carrying the per-request id.
pub const X_REQUEST_ID: &str = "x-request-id";
