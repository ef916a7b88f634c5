//! Holder of the active application.

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use super::{AppError, AppHandle};
use crate::config::ServerConfig;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};

/// Options for [`AppRegistry::launch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub port: u16,
    /// Startup message; defaults to `Server is running on port {port}`.
    pub message: Option<String>,
    pub should_log: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            port: 3000,
            message: None,
            should_log: true,
        }
    }
}

impl From<&ServerConfig> for LaunchOptions {
    fn from(config: &ServerConfig) -> Self {
        Self {
            port: config.port,
            message: config.message.clone(),
            should_log: config.log_startup,
        }
    }
}

/// Owns the single active [`AppHandle`] and serves it.
#[derive(Debug, Default)]
pub struct AppRegistry {
    current: Option<AppHandle>,
    running: bool,
    server: ServerConfig,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose server settings (host, request timeout) come from `server`.
    pub fn with_server_config(server: ServerConfig) -> Self {
        Self {
            server,
            ..Self::default()
        }
    }

    /// Create, store and return a fresh application.
    pub fn init(&mut self) -> AppHandle {
        let app = AppHandle::new();
        if let Some(previous) = self.current.replace(app.clone()) {
            tracing::warn!(
                previous = previous.id(),
                current = app.id(),
                "Application already initialized; replacing it"
            );
        }
        self.running = true;
        tracing::debug!(app = app.id(), "Application initialized");
        app
    }

    pub fn get(&self) -> Option<AppHandle> {
        self.current.clone()
    }

    /// The active application, or `NotInitialized`.
    pub fn app(&self) -> Result<AppHandle, AppError> {
        self.current.clone().ok_or(AppError::NotInitialized)
    }

    /// Replace the stored application.
    pub fn set(&mut self, app: AppHandle) {
        self.current = Some(app);
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Drop the stored application and clear the running flag.
    pub fn shutdown(&mut self) -> Option<AppHandle> {
        self.running = false;
        let app = self.current.take();
        if let Some(app) = &app {
            tracing::debug!(app = app.id(), "Application shut down");
        }
        app
    }

    pub fn server_config(&self) -> &ServerConfig {
        &self.server
    }

    /// Bind `host:port` and serve the active application until Ctrl-C or
    /// SIGTERM.
    pub async fn listen(
        &self,
        port: u16,
        message: Option<&str>,
        should_log: bool,
    ) -> Result<(), AppError> {
        let app = self.app()?;

        let address = format!("{}:{}", self.server.host, port);
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| AppError::Bind { address, source })?;
        let port = listener.local_addr()?.port();

        if should_log {
            let message = message
                .map(str::to_owned)
                .unwrap_or_else(|| format!("Server is running on port {port}"));
            tracing::info!(port, "{message}");
        }

        let shutdown = Shutdown::new();
        let receiver = shutdown.subscribe();
        tokio::spawn(async move {
            signals::wait_for_signal().await;
            shutdown.trigger();
        });

        HttpServer::new(app.router(), &self.server)
            .run(listener, receiver)
            .await
    }

    /// [`listen`](Self::listen) with [`LaunchOptions`].
    pub async fn launch(&self, options: LaunchOptions) -> Result<(), AppError> {
        self.listen(options.port, options.message.as_deref(), options.should_log)
            .await
    }

    /// Serve the active application on an already bound listener until
    /// `shutdown` fires.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), AppError> {
        let app = self.app()?;
        HttpServer::new(app.router(), &self.server)
            .run(listener, shutdown)
            .await
    }
}
