use anyhow::anyhow;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use backend_api::{create_router, AppState, FileLedgerRepository, LedgerRepository, MemoryLedgerRepository};
use fx_rates::{FxService, RateProvider};
use serde_json::Value;
use snapshot_sync::{SnapshotProvider, SnapshotSync};
use std::{sync::Arc, time::Duration};
use tokio::{sync::Notify, task::JoinSet};
use tower::ServiceExt;
use utils::LedgerDatabase;

const FUTURES_LOG: &str = "uid,dateTime,type,symbol,contract,change,trade price,realized pnl,fee,realized funding
u-1,2024-01-05T10:00:00.000Z,futures trade,PF_XBTUSD,,0.01,42000,12.5,-0.75,0
u-2,2024-01-05T11:00:00.000Z,funding rate change,PF_XBTUSD,,0,,0,0,0.25
";

const SNAPSHOT: &str = r#"{"generated_at":"2024-01-06T00:00:00Z","rows":[
    {"datetime":"2024-01-05T12:00:00Z","exchange":"BLOFIN","symbol":"BTC-USDT","marketType":"FUTURES",
     "netPnlUsd":3.0,"tradeKey":"r-1"}]}"#;

struct FixedRate(f64);

#[async_trait]
impl RateProvider for FixedRate {
    fn name(&self) -> &str {
        "fixed"
    }
    async fn fetch_rate(&self, _base: &str, _target: &str) -> anyhow::Result<f64> {
        Ok(self.0)
    }
}

/// Answers only once the gate is opened.
struct GatedRate(Arc<Notify>);

#[async_trait]
impl RateProvider for GatedRate {
    fn name(&self) -> &str {
        "gated"
    }
    async fn fetch_rate(&self, _base: &str, _target: &str) -> anyhow::Result<f64> {
        self.0.notified().await;
        Ok(0.5)
    }
}

struct Canned(Result<&'static str, &'static str>);

#[async_trait]
impl SnapshotProvider for Canned {
    fn name(&self) -> &str {
        "canned"
    }
    async fn fetch(&self, _cursor: Option<&str>) -> anyhow::Result<String> {
        self.0.map(str::to_string).map_err(|e| anyhow!(e))
    }
}

fn app_with(
    fx: FxService,
    sync: Option<SnapshotSync>,
) -> (Router, AppState, Arc<MemoryLedgerRepository>) {
    let repo = Arc::new(MemoryLedgerRepository::default());
    let state = AppState::from_database(LedgerDatabase::default(), repo.clone(), fx, sync);
    (create_router(state.clone()), state, repo)
}

fn app() -> (Router, AppState, Arc<MemoryLedgerRepository>) {
    app_with(FxService::new("USD", "USD", Vec::new()), None)
}

async fn send(app: &Router, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body.to_string()))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn import_persists_and_is_idempotent() {
    let (app, _state, repo) = app();

    let (status, report) = send(&app, Method::POST, "/api/import", FUTURES_LOG).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["format"], "FORMAT_B_FUTURES_LOG");
    assert_eq!(report["merge"]["added"], 2);
    assert_eq!(repo.load().await.unwrap().entries.len(), 2);

    let (_, again) = send(&app, Method::POST, "/api/import", FUTURES_LOG).await;
    assert_eq!(again["merge"]["added"], 0);

    let (status, entries) = send(&app, Method::GET, "/api/entries", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entries["count"], 2);
    // Newest first.
    assert_eq!(entries["entries"][0]["key"], "KRAKEN|u-2");
}

#[tokio::test]
async fn unknown_csv_is_422_with_headers() {
    let (app, state, _) = app();
    let (status, body) = send(&app, Method::POST, "/api/import", "Date,Amount\n2024-01-01,5\n").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["headers"], serde_json::json!(["Date", "Amount"]));
    assert!(body["error"].as_str().unwrap().contains("Date, Amount"));
    assert!(state.store.read().await.is_empty());
}

#[tokio::test]
async fn dashboard_and_calendar_views() {
    let (app, _, _) = app();
    send(&app, Method::POST, "/api/import", FUTURES_LOG).await;

    let (status, d) = send(&app, Method::GET, "/api/dashboard?range=all&anchor=latest", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(d["kpis"]["count"], 2);
    assert_eq!(d["kpis"]["net"], 12.0);
    assert_eq!(d["percent_of_base"], Value::Null);

    let (status, _) = send(&app, Method::GET, "/api/dashboard?range=fortnight", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, cal) = send(&app, Method::GET, "/api/calendar?year=2024&month=1&granularity=day", "").await;
    assert_eq!(status, StatusCode::OK);
    let cells = cal["cells"].as_array().unwrap();
    assert_eq!(cells.len(), 31);
    assert_eq!(cells[4]["key"], "2024-01-05");
    assert_eq!(cells[4]["class"], "gain");

    let (status, _) = send(&app, Method::GET, "/api/calendar?year=2024&month=13", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn export_is_csv() {
    let (app, _, _) = app();
    send(&app, Method::POST, "/api/import", FUTURES_LOG).await;
    let req = Request::builder().uri("/api/export").body(Body::empty()).unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "text/csv; charset=utf-8");
    let text = String::from_utf8(to_bytes(res.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap();
    assert_eq!(text.lines().count(), 3);
    assert!(text.starts_with("\"key\""));
}

#[tokio::test]
async fn reset_clears_store_and_disk() {
    let (app, _, repo) = app();
    send(&app, Method::POST, "/api/import", FUTURES_LOG).await;
    let (status, body) = send(&app, Method::DELETE, "/api/ledger", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 2);
    assert!(repo.load().await.unwrap().entries.is_empty());
}

#[tokio::test]
async fn sync_requires_configuration() {
    let (app, _, _) = app();
    let (status, _) = send(&app, Method::POST, "/api/sync", "").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn sync_merges_and_stores_cursor() {
    let sync = SnapshotSync::new(Box::new(Canned(Ok(SNAPSHOT))), Duration::from_secs(5));
    let (app, _, repo) = app_with(FxService::new("USD", "USD", Vec::new()), Some(sync));

    let (status, body) = send(&app, Method::POST, "/api/sync", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "synced");
    assert_eq!(body["report"]["merge"]["added"], 1);

    let db = repo.load().await.unwrap();
    assert_eq!(db.entries.len(), 1);
    assert_eq!(db.sync_cursor.as_deref(), Some("2024-01-06T00:00:00Z"));
}

#[tokio::test]
async fn offline_sync_is_not_an_error() {
    let sync = SnapshotSync::new(Box::new(Canned(Err("connection refused"))), Duration::from_secs(5));
    let (app, _, _) = app_with(FxService::new("USD", "USD", Vec::new()), Some(sync));
    let (status, body) = send(&app, Method::POST, "/api/sync", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "offline");
}

#[tokio::test]
async fn fx_refresh_converts_dashboard() {
    let fx = FxService::new("USD", "EUR", vec![Box::new(FixedRate(0.5))]);
    let (app, _, repo) = app_with(fx, None);
    send(&app, Method::POST, "/api/import", FUTURES_LOG).await;

    let (_, before) = send(&app, Method::GET, "/api/dashboard", "").await;
    assert_eq!(before["metadata"]["display_currency"], "USD");

    let (status, fx) = send(&app, Method::POST, "/api/fx/refresh", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fx["status"], "fresh");
    assert!(repo.load().await.unwrap().fx_cache.is_some());

    let (_, after) = send(&app, Method::GET, "/api/dashboard", "").await;
    assert_eq!(after["metadata"]["display_currency"], "EUR");
    assert_eq!(after["kpis"]["net"], 6.0);
}

#[tokio::test]
async fn cursor_survives_without_sync() {
    let repo = Arc::new(MemoryLedgerRepository::default());
    let db = LedgerDatabase {
        sync_cursor: Some("2024-01-06T00:00:00Z".to_string()),
        ..LedgerDatabase::default()
    };
    let state = AppState::from_database(db, repo.clone(), FxService::new("USD", "USD", Vec::new()), None);
    let app = create_router(state);

    send(&app, Method::POST, "/api/import", FUTURES_LOG).await;
    assert_eq!(repo.load().await.unwrap().sync_cursor.as_deref(), Some("2024-01-06T00:00:00Z"));

    send(&app, Method::DELETE, "/api/ledger", "").await;
    assert_eq!(repo.load().await.unwrap().sync_cursor, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_imports_all_persist() {
    let dir = std::env::temp_dir().join(format!("api-concurrent-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let repo = Arc::new(FileLedgerRepository::new(dir.join("ledger.json")));
    let state = AppState::from_database(
        LedgerDatabase::default(),
        repo.clone(),
        FxService::new("USD", "USD", Vec::new()),
        None,
    );
    let app = create_router(state);

    let mut tasks = JoinSet::new();
    for i in 0..8 {
        let app = app.clone();
        let csv = format!(
            "uid,dateTime,type,symbol,contract,change,trade price,realized pnl,fee,realized funding\n\
             c-{i},2024-01-0{}T10:00:00.000Z,futures trade,PF_XBTUSD,,0.01,42000,1,0,0\n",
            i + 1
        );
        tasks.spawn(async move { send(&app, Method::POST, "/api/import", &csv).await.0 });
    }
    while let Some(status) = tasks.join_next().await {
        assert_eq!(status.unwrap(), StatusCode::OK);
    }

    assert_eq!(repo.load().await.unwrap().entries.len(), 8);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn dashboard_is_served_during_fx_refresh() {
    let gate = Arc::new(Notify::new());
    let fx = FxService::new("USD", "EUR", vec![Box::new(GatedRate(gate.clone()))]);
    let (app, _, _) = app_with(fx, None);
    send(&app, Method::POST, "/api/import", FUTURES_LOG).await;

    let (refresh, during) = tokio::join!(send(&app, Method::POST, "/api/fx/refresh", ""), async {
        let seen = send(&app, Method::GET, "/api/dashboard", "").await;
        gate.notify_one();
        seen
    });

    assert_eq!(during.0, StatusCode::OK);
    assert_eq!(during.1["metadata"]["display_currency"], "USD");
    assert_eq!(refresh.1["status"], "fresh");

    let (_, after) = send(&app, Method::GET, "/api/dashboard", "").await;
    assert_eq!(after["metadata"]["display_currency"], "EUR");
}
