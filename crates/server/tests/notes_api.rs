use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use configs::AppConfig;
use reqwest::StatusCode as HttpStatusCode;
use serde_json::{json, Value};
use server::routes;
use server::state::AppState;
use service::storage::{InMemoryNoteRepository, NoteRepository};
use service::NoteService;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

struct TestApp {
    base_url: String,
}

async fn start_server() -> anyhow::Result<TestApp> {
    let repo: Arc<dyn NoteRepository> = Arc::new(InMemoryNoteRepository::new());
    let state = AppState::new(NoteService::new(repo), Duration::from_secs(5));
    let app: Router = routes::build_router(state, CorsLayer::very_permissive());

    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    let base_url = format!("http://{}:{}", addr.ip(), addr.port());

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("server error: {}", e);
        }
    });

    Ok(TestApp { base_url })
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().build().expect("reqwest client")
}

#[tokio::test]
async fn e2e_health() -> anyhow::Result<()> {
    let app = start_server().await?;
    let res = client().get(format!("{}/health", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(res.json::<Value>().await?, json!({ "status": "ok" }));
    Ok(())
}

#[tokio::test]
async fn e2e_notes_crud() -> anyhow::Result<()> {
    let app = start_server().await?;
    let http = client();
    let notes = format!("{}/api/notes", app.base_url);

    let res = http.post(&notes).json(&json!({ "title": "Test Note", "content": "This is a test note" })).send().await?;
    assert_eq!(res.status(), HttpStatusCode::CREATED);
    let created: Value = res.json().await?;
    let id = created["id"].as_str().expect("id").to_string();

    let res = http.get(format!("{notes}/{id}")).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(res.json::<Value>().await?["title"], "Test Note");

    let res = http
        .put(format!("{notes}/{id}"))
        .json(&json!({ "title": "Updated Title", "content": "Updated content" }))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let updated: Value = res.json().await?;
    assert_eq!(updated["title"], "Updated Title");
    assert_eq!(updated["id"], id.as_str());

    let all: Vec<Value> = http.get(&notes).send().await?.json().await?;
    assert_eq!(all.len(), 1);

    let res = http.delete(format!("{notes}/{id}")).send().await?;
    assert_eq!(res.status(), HttpStatusCode::NO_CONTENT);
    let res = http.get(format!("{notes}/{id}")).send().await?;
    assert_eq!(res.status(), HttpStatusCode::NOT_FOUND);
    let body: Value = res.json().await?;
    assert!(body["error"].is_string());
    Ok(())
}

#[tokio::test]
async fn e2e_rejects_invalid_input() -> anyhow::Result<()> {
    let app = start_server().await?;
    let http = client();

    let too_long = "a".repeat(256);
    for path in ["bad%20id", "semi;colon", too_long.as_str()] {
        let res = http.get(format!("{}/api/notes/{path}", app.base_url)).send().await?;
        assert_eq!(res.status(), HttpStatusCode::BAD_REQUEST, "{path}");
    }

    let res = http
        .post(format!("{}/api/notes", app.base_url))
        .header("content-type", "application/json")
        .body("{\"title\": ")
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn serve_seeds_and_shuts_down_gracefully() -> anyhow::Result<()> {
    let mut cfg = AppConfig::default();
    cfg.server.host = "127.0.0.1".into();
    cfg.server.grpc_port = 0;
    cfg.server.seed_sample_notes = true;

    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let base_url = format!("http://{}", listener.local_addr()?);
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(server::serve(cfg, listener, async move {
        let _ = stop_rx.await;
    }));

    let http = client();
    let mut seeded = Vec::new();
    for _ in 0..50 {
        if let Ok(res) = http.get(format!("{base_url}/api/notes")).send().await {
            seeded = res.json::<Vec<Value>>().await?;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(seeded.len(), 3);
    assert_eq!(seeded[0]["title"], "Welcome to Notes API");

    stop_tx.send(()).expect("server still running");
    tokio::time::timeout(Duration::from_secs(5), server).await???;
    Ok(())
}
