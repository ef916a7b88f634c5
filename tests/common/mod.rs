//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use fluent_router::{AppRegistry, Shutdown};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A registry served on an ephemeral local port.
pub struct RunningServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub task: JoinHandle<Result<(), fluent_router::app::AppError>>,
}

impl RunningServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server task to finish.
    pub async fn stop(self) {
        self.shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("server did not shut down in time")
            .expect("server task panicked");
        result.expect("server returned an error");
    }
}

/// Serve `registry` on `127.0.0.1:0`.
pub async fn spawn_server(registry: AppRegistry) -> RunningServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();

    let task = tokio::spawn(async move { registry.serve(listener, receiver).await });

    RunningServer { addr, shutdown, task }
}
