//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize the application in the registry
//! - Install configured capabilities in order
//! - Register declarative routes
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Capabilities install before routes, so the chain is complete before
//!   the first request
//! - Listening is left to the caller (`AppRegistry::launch`)

use crate::app::{AppHandle, AppRegistry};
use crate::capability::{CapabilityRegistry, PackageManager};
use crate::config::AppConfig;
use crate::error::Result;
use crate::routing::RouteHandler;

/// Build the application described by `config` and make it the registry's
/// active app.
pub fn build_app(
    config: &AppConfig,
    registry: &mut AppRegistry,
    capabilities: CapabilityRegistry,
) -> Result<AppHandle> {
    let app = registry.init();

    let mut packages = PackageManager::new(app.clone(), capabilities);
    packages.install_all(&config.capabilities)?;

    for route in &config.routes {
        RouteHandler::new(&app, route.path.as_str())
            .apply_callbacks(route.method, route.spec.clone())?;
    }

    tracing::info!(
        app = app.id(),
        capabilities = packages.installed().len(),
        routes = config.routes.len(),
        "Application built from configuration"
    );
    Ok(app)
}
