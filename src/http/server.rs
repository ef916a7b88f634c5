//! HTTP server setup.
//!
//! # Responsibilities
//! - Wrap the application router with the server-wide layers
//!   (request timeout, request id, tracing)
//! - Serve a bound listener with graceful shutdown

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::app::AppError;
use crate::config::ServerConfig;

/// HTTP server for one application router.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Wrap `app` with the server layers described by `config`.
    pub fn new(app: Router, config: &ServerConfig) -> Self {
        Self {
            router: Self::build_router(app, config),
        }
    }

    /// Layers run outermost first: set request id, trace, propagate
    /// request id, timeout.
    #[allow(deprecated)]
    fn build_router(app: Router, config: &ServerConfig) -> Router {
        app.layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), AppError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router.
    pub fn into_router(self) -> Router {
        self.router
    }
}
