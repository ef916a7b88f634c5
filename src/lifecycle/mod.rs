//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! AppConfig
//!     → startup::build_app (capabilities, then routes)
//!     → AppRegistry::launch
//!
//! SIGTERM / Ctrl-C (signals.rs)
//!     → Shutdown::trigger (shutdown.rs)
//!     → HttpServer stops accepting and drains in-flight requests
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::build_app;
