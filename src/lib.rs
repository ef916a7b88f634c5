//! Fluent route and middleware composition over axum.
//!
//! ```text
//! AppRegistry::init → AppHandle
//!     → PackageManager::install (session, csrf, cors, ...)
//!     → RouteManager / RouteHandler register routes
//!     → AppRegistry::launch → HttpServer
//! ```

pub mod app;
pub mod body;
pub mod capability;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;
#[cfg(feature = "session")]
pub mod session;

pub use app::{AppHandle, AppRegistry, LaunchOptions};
pub use capability::{Capability, CapabilityRegistry, PackageManager};
pub use config::AppConfig;
pub use error::{Error, Result};
pub use http::{ApiResponse, EnhancedRequest, HttpServer, Reply};
pub use lifecycle::Shutdown;
pub use routing::{CallbackSpec, Middleware, RouteHandler, RouteManager, Verb};
