use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Datelike, Utc};
use dashboard_engine::{
    build_dashboard, calendar_aggregate, filtered_view, CalendarCell, CalendarGranularity, EngineContext, RangeAnchor,
    SortOrder, TimeRange, ViewFilters,
};
use logger::RunRecord;
use models::{CanonicalLedgerEntry, Exchange, MarketType};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, state::AppState, Result};

/// Filter parameters shared by the read endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    pub range: Option<String>,
    pub anchor: Option<String>,
    pub exchange: Option<String>,
    pub market: Option<String>,
    pub q: Option<String>,
}

fn is_all(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s.eq_ignore_ascii_case("all")
}

impl ViewQuery {
    pub fn filters(&self) -> Result<ViewFilters> {
        let range = match self.range.as_deref() {
            Some(r) => TimeRange::parse(r).ok_or_else(|| ApiError::BadRequest(format!("range={r}")))?,
            None => TimeRange::All,
        };
        let anchor = match self.anchor.as_deref() {
            Some(a) => RangeAnchor::parse(a).ok_or_else(|| ApiError::BadRequest(format!("anchor={a}")))?,
            None => RangeAnchor::Now,
        };
        Ok(ViewFilters {
            range,
            anchor,
            exchange: self.exchange.as_deref().filter(|e| !is_all(e)).map(Exchange::from_label),
            market_type: self.market.as_deref().filter(|m| !is_all(m)).map(MarketType::from_label),
            search: self.q.clone().filter(|q| !q.trim().is_empty()),
        })
    }
}

async fn engine_context(state: &AppState) -> EngineContext {
    EngineContext {
        conversion: state.fx.conversion().await,
        baselines: state.baselines.read().await.clone(),
    }
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let entries = state.store.read().await.len();
    Json(serde_json::json!({
        "status": "healthy",
        "service": "trading-ledger-api",
        "entries": entries,
        "sync_configured": state.sync.is_some(),
    }))
}

#[derive(Debug, Serialize)]
pub struct EntriesResponse {
    pub count: usize,
    /// Entries are always reported in the ledger's base currency.
    pub currency: String,
    pub entries: Vec<CanonicalLedgerEntry>,
}

/// GET /api/entries
/// Newest first.
pub async fn get_entries(State(state): State<AppState>, Query(query): Query<ViewQuery>) -> Result<impl IntoResponse> {
    let filters = query.filters()?;
    let currency = state.fx.conversion().await.base;
    let entries = {
        let store = state.store.read().await;
        filtered_view(store.entries(), &filters, Utc::now(), SortOrder::Descending)
    };
    Ok(Json(EntriesResponse {
        count: entries.len(),
        currency,
        entries,
    }))
}

/// GET /api/dashboard
pub async fn get_dashboard(State(state): State<AppState>, Query(query): Query<ViewQuery>) -> Result<impl IntoResponse> {
    let filters = query.filters()?;
    let ctx = engine_context(&state).await;
    let dashboard = {
        let store = state.store.read().await;
        build_dashboard(store.entries(), &filters, &ctx, Utc::now())
    };
    Ok((
        [(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"))],
        Json(dashboard),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct CalendarQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub granularity: Option<String>,
    pub exchange: Option<String>,
    pub market: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CalendarResponse {
    pub year: i32,
    pub month: u32,
    pub granularity: CalendarGranularity,
    pub currency: String,
    pub cells: Vec<CalendarCell>,
}

/// GET /api/calendar
/// Defaults to the current month, one cell per day.
pub async fn get_calendar(
    State(state): State<AppState>,
    Query(query): Query<CalendarQuery>,
) -> Result<impl IntoResponse> {
    let today = Utc::now();
    let year = query.year.unwrap_or(today.year());
    let month = query.month.unwrap_or(today.month());
    if !(1..=12).contains(&month) {
        return Err(ApiError::BadRequest(format!("month={month}")));
    }
    let granularity = match query.granularity.as_deref() {
        Some(g) => CalendarGranularity::parse(g).ok_or_else(|| ApiError::BadRequest(format!("granularity={g}")))?,
        None => CalendarGranularity::Day,
    };
    let filters = ViewQuery {
        exchange: query.exchange.clone(),
        market: query.market.clone(),
        q: query.q.clone(),
        ..ViewQuery::default()
    }
    .filters()?;

    let conversion = state.fx.conversion().await;
    let mut cells = {
        let store = state.store.read().await;
        let view = filtered_view(store.entries(), &filters, today, SortOrder::Ascending);
        calendar_aggregate(&view, year, month, granularity)
    };
    for cell in cells.iter_mut() {
        cell.net = conversion.convert(cell.net);
    }

    Ok(Json(CalendarResponse {
        year,
        month,
        granularity,
        currency: conversion.display_currency().to_string(),
        cells,
    }))
}

/// POST /api/import
/// Body is the raw CSV text. Nothing is written when the format is unknown.
pub async fn import_csv(State(state): State<AppState>, body: String) -> Result<impl IntoResponse> {
    let batch = match data_import::prepare_csv(&body) {
        Ok(batch) => batch,
        Err(err) => {
            state.record(RunRecord::new("import", "http", false, serde_json::json!({ "error": err.to_string() })));
            return Err(err.into());
        }
    };
    let report = {
        let mut store = state.store.write().await;
        batch.commit(&mut store)
    };
    state.persist().await?;
    state.record(RunRecord::new(
        "import",
        report.format.as_str(),
        true,
        serde_json::to_value(&report).map_err(|e| ApiError::Internal(e.to_string()))?,
    ));
    Ok(Json(report))
}

/// POST /api/sync
/// Runs one snapshot cycle now. Offline is a normal 200 response.
pub async fn sync_now(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let sync = state.sync.clone().ok_or(ApiError::SyncNotConfigured)?;
    let status = sync.run_cycle(&state.store).await;
    state.after_sync(&status).await?;
    Ok(Json(status))
}

/// POST /api/fx/refresh
/// Read endpoints keep serving the previous quote while providers are queried.
pub async fn refresh_fx(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let status = state.fx.refresh().await;
    state.persist().await?;
    Ok(Json(status))
}

/// GET /api/export
pub async fn export_ledger(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let csv = {
        let store = state.store.read().await;
        let entries = filtered_view(store.entries(), &ViewFilters::default(), Utc::now(), SortOrder::Ascending);
        utils::export_csv(&entries)?
    };
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_static("attachment; filename=\"ledger.csv\""),
            ),
        ],
        csv,
    ))
}

/// DELETE /api/ledger
/// Drops every entry and the sync cursor. Baselines and the FX cache stay.
pub async fn reset_ledger(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let removed = {
        let mut store = state.store.write().await;
        let n = store.len();
        store.clear();
        n
    };
    state.reset_cursor().await;
    state.persist().await?;
    state.record(RunRecord::new("reset", "http", true, serde_json::json!({ "removed": removed })));
    tracing::info!(removed, "ledger reset");
    Ok(Json(serde_json::json!({ "status": "reset", "removed": removed })))
}
