//! End-to-end tests against a live server.

use std::sync::{Arc, Mutex};

use axum::extract::Request;
use axum::middleware::Next;
use fluent_router::app::AppError;
use fluent_router::config::parse_config;
use fluent_router::lifecycle::build_app;
use fluent_router::{
    AppRegistry, Capability, CapabilityRegistry, EnhancedRequest, Middleware, PackageManager, Reply,
    RouteManager, Shutdown,
};
use serde_json::{json, Value};

mod common;

fn recorder(name: &'static str, log: Arc<Mutex<Vec<&'static str>>>) -> Middleware {
    Middleware::from_fn(name, move |req: Request, next: Next| {
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(name);
            next.run(req).await
        }
    })
}

#[tokio::test]
async fn test_live_round_trip() {
    let mut registry = AppRegistry::new();
    let app = registry.init();
    app.route("/").get(|| async { "hi" }).unwrap();

    let server = common::spawn_server(registry).await;

    let res = reqwest::get(server.url("/")).await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "hi");

    let res = reqwest::get(server.url("/missing")).await.unwrap();
    assert_eq!(res.status(), 404);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "message": "Cannot GET /missing" }));

    server.stop().await;
}

#[tokio::test]
async fn test_serve_before_init_fails() {
    let registry = AppRegistry::new();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let shutdown = Shutdown::new();

    let err = registry.serve(listener, shutdown.subscribe()).await.unwrap_err();
    assert!(matches!(err, AppError::NotInitialized));
    assert_eq!(err.to_string(), "Express app has not been initialized yet.");
}

#[tokio::test]
async fn test_group_middleware_runs_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut registry = AppRegistry::new();
    let app = registry.init();
    app.use_middleware(recorder("app", Arc::clone(&log)));

    let mut api = RouteManager::new();
    api.use_middleware(recorder("first", Arc::clone(&log)))
        .use_middleware(recorder("second", Arc::clone(&log)));
    api.set_route("/users/:id")
        .get(|reply: Reply, req: EnhancedRequest| async move {
            let id = req.uri().path().rsplit('/').next().unwrap_or_default().to_string();
            reply.success_with("found", &json!({ "id": id }))
        })
        .unwrap();
    app.mount_at("/api", api).unwrap();

    let server = common::spawn_server(registry).await;

    let res = reqwest::get(server.url("/api/users/7")).await.unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "message": "found", "data": { "id": "7" } }));
    assert_eq!(*log.lock().unwrap(), vec!["app", "first", "second"]);

    server.stop().await;
}

#[tokio::test]
async fn test_config_driven_app() {
    let config = parse_config(
        r#"
[[capabilities]]
name = "cors"
order = 0
options = { origins = ["https://example.com"], max_age_secs = 600 }

[[capabilities]]
name = "rate-limit"
order = 1
options = { requests_per_second = 0.001, burst_size = 2 }

[[routes]]
method = "get"
path = "/"
send = "hi"

[[routes]]
method = "post"
path = "/items"
status = 201
json = { created = true }
"#,
    )
    .unwrap();

    let mut registry = AppRegistry::new();
    build_app(&config, &mut registry, CapabilityRegistry::with_defaults()).unwrap();
    let server = common::spawn_server(registry).await;
    let client = reqwest::Client::new();

    let res = client
        .request(reqwest::Method::OPTIONS, server.url("/items"))
        .header("origin", "https://example.com")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 204);
    assert_eq!(
        res.headers()["access-control-allow-origin"],
        "https://example.com"
    );

    let res = client.post(server.url("/items")).send().await.unwrap();
    assert_eq!(res.status(), 201);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "created": true }));

    // The preflight never reached the limiter; this spends the second token.
    let res = client.get(server.url("/")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "hi");

    // The bucket refills far slower than the test runs.
    let res = client.get(server.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 429);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "message": "Too many requests, please try again later." })
    );

    drop(client);
    server.stop().await;
}

#[test]
fn test_missing_capability_is_reported_by_name() {
    let mut registry = AppRegistry::new();
    let app = registry.init();
    let mut packages = PackageManager::new(app, CapabilityRegistry::with_defaults());

    let err = packages
        .install(Capability::MongoSessionStore, json!({ "uri": "mongodb://localhost/app" }))
        .unwrap_err();
    assert!(err.to_string().contains("mongo-session-store"));
}
