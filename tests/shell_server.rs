use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use axum::response::Redirect;
use axum::routing::get;
use axum::Router;
use serde_json::Value;

use savepixie::settings::ShellConfig;
use savepixie::shell::cache::CacheStorage;
use savepixie::shell::network::{Network, Upstream};
use savepixie::shell::server::router;
use savepixie::shell::worker::{ShellWorker, WorkerState};
use savepixie::shell::{ResponseKind, ShellError, ShellRequest, ShellResponse};

#[derive(Default)]
struct FakeOrigin {
    pages: HashMap<String, &'static str>,
    offline: AtomicBool,
    seen: Mutex<Vec<(Method, String)>>,
}

impl FakeOrigin {
    fn site() -> Arc<Self> {
        let pages = [
            ("/", "root"),
            ("/index.html", "<html>shell</html>"),
            ("/manifest.webmanifest", "{}"),
            ("/app.js", "console.log('pixie')"),
        ];
        Arc::new(Self {
            pages: pages.iter().map(|(url, body)| (url.to_string(), *body)).collect(),
            ..Self::default()
        })
    }
}

#[async_trait]
impl Network for FakeOrigin {
    async fn fetch(&self, request: &ShellRequest) -> Result<ShellResponse, ShellError> {
        self.seen
            .lock()
            .unwrap()
            .push((request.method.clone(), request.url.clone()));
        if self.offline.load(Ordering::SeqCst) {
            return Err(ShellError::Network("connection refused".to_string()));
        }

        Ok(match self.pages.get(&request.url) {
            Some(body) if request.method == Method::GET => ShellResponse::new(StatusCode::OK, *body),
            Some(_) => ShellResponse::new(StatusCode::ACCEPTED, "posted"),
            None => ShellResponse::new(StatusCode::NOT_FOUND, "not found"),
        })
    }
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn shell(origin: Arc<FakeOrigin>, storage: Arc<CacheStorage>) -> (String, Arc<ShellWorker>) {
    let worker = Arc::new(ShellWorker::from_config(
        &ShellConfig::default(),
        storage,
        origin.clone(),
    ));
    let _ = worker.start().await;
    (serve(router(worker.clone(), origin)).await, worker)
}

#[tokio::test]
async fn health_reports_activated_cache() {
    let (url, _) = shell(FakeOrigin::site(), Arc::new(CacheStorage::new())).await;

    let health: Value = reqwest::get(format!("{}/__shell/health", url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(health["state"], "activated");
    assert_eq!(health["cache"], "savepixie-shell-v1");
    assert_eq!(health["entries"], 3);
}

#[tokio::test]
async fn navigation_boots_offline() {
    let origin = FakeOrigin::site();
    let (url, _) = shell(origin.clone(), Arc::new(CacheStorage::new())).await;
    origin.offline.store(true, Ordering::SeqCst);

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/goals/trip", url))
        .header("sec-fetch-mode", "navigate")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "<html>shell</html>");

    let html = client
        .get(format!("{}/dashboard", url))
        .header("accept", "text/html")
        .send()
        .await
        .unwrap();
    assert_eq!(html.text().await.unwrap(), "<html>shell</html>");
}

#[tokio::test]
async fn assets_are_cached_after_first_fetch() {
    let origin = FakeOrigin::site();
    let (url, _) = shell(origin.clone(), Arc::new(CacheStorage::new())).await;

    let first = reqwest::get(format!("{}/app.js", url)).await.unwrap();
    assert_eq!(first.text().await.unwrap(), "console.log('pixie')");

    origin.offline.store(true, Ordering::SeqCst);
    let second = reqwest::get(format!("{}/app.js", url)).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.text().await.unwrap(), "console.log('pixie')");
}

#[tokio::test]
async fn not_found_is_passed_through_and_not_stored() {
    let origin = FakeOrigin::site();
    let storage = Arc::new(CacheStorage::new());
    let (url, _) = shell(origin.clone(), storage.clone()).await;

    let response = reqwest::get(format!("{}/missing.css", url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(storage.match_url("/missing.css").is_none());
}

#[tokio::test]
async fn writes_go_straight_to_the_origin() {
    let origin = FakeOrigin::site();
    let storage = Arc::new(CacheStorage::new());
    let (url, _) = shell(origin.clone(), storage.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/app.js", url))
        .body("payload")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(origin
        .seen
        .lock()
        .unwrap()
        .contains(&(Method::POST, "/app.js".to_string())));
    assert_eq!(storage.open("savepixie-shell-v1").len(), 3);
}

#[tokio::test]
async fn failed_install_falls_back_to_network_only() {
    let origin = Arc::new(FakeOrigin::default());
    let storage = Arc::new(CacheStorage::new());
    let (url, worker) = shell(origin.clone(), storage.clone()).await;

    assert_eq!(worker.state().await, WorkerState::Redundant);
    assert!(storage.keys().is_empty());

    origin.offline.store(true, Ordering::SeqCst);
    let response = reqwest::get(format!("{}/index.html", url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["description"], "Network error: connection refused");
}

#[tokio::test]
async fn activation_replaces_older_caches() {
    let storage = Arc::new(CacheStorage::new());
    storage
        .open("savepixie-shell-v0")
        .put("/old.js", ShellResponse::new(StatusCode::OK, "old"));

    let (_, worker) = shell(FakeOrigin::site(), storage.clone()).await;

    assert_eq!(worker.state().await, WorkerState::Activated);
    assert_eq!(storage.keys(), vec!["savepixie-shell-v1"]);
    assert!(storage.match_url("/old.js").is_none());
}

#[tokio::test]
async fn upstream_tags_same_origin_responses() {
    let other = serve(Router::new().route("/lib.js", get(|| async { "external" }))).await;
    let redirect_to = format!("{}/lib.js", other);
    let origin = serve(
        Router::new()
            .route("/index.html", get(|| async { "<html>origin</html>" }))
            .route(
                "/cdn/lib.js",
                get(move || {
                    let target = redirect_to.clone();
                    async move { Redirect::temporary(&target) }
                }),
            ),
    )
    .await;

    let upstream = Upstream::new(&origin, Duration::from_secs(5)).unwrap();

    let page = upstream.fetch(&ShellRequest::get("/index.html")).await.unwrap();
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.kind, ResponseKind::Basic);
    assert_eq!(page.body, "<html>origin</html>");

    let cdn = upstream.fetch(&ShellRequest::get("/cdn/lib.js")).await.unwrap();
    assert_eq!(cdn.kind, ResponseKind::Cors);
    assert_eq!(cdn.body, "external");
}

#[tokio::test]
async fn upstream_reports_unreachable_origin() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let upstream = Upstream::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    let error = upstream.fetch(&ShellRequest::get("/")).await.unwrap_err();
    assert!(matches!(error, ShellError::Network(_)));
}
