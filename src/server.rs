//! HTTP surface of the dashboard.

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::charts::build_charts;
use crate::config::Config;
use crate::data::analyze_static;
use crate::logging::{debug, info, obj, v_num, v_str, warn, Domain};
use crate::pipeline::{DashboardData, HazardFilter, Pipeline};
use crate::render::{render_page, CSV_FILENAME};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    /// Fixed "today" for tests; `None` uses the current UTC date.
    today: Option<NaiveDate>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            today: None,
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FilterQuery {
    hazardous: Option<String>,
}

impl FilterQuery {
    fn filter(&self) -> Result<HazardFilter, AppError> {
        match self.hazardous.as_deref() {
            None | Some("") => Ok(HazardFilter::All),
            Some(raw) => raw.parse().map_err(AppError::BadRequest),
        }
    }
}

/// Handler failure mapped to a plain-text response.
pub enum AppError {
    BadRequest(anyhow::Error),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, err) = match self {
            AppError::BadRequest(e) => (StatusCode::BAD_REQUEST, e),
            AppError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, e),
        };
        warn(
            Domain::Http,
            "request_failed",
            obj(&[("status", v_num(status.as_u16() as f64)), ("error", v_str(&format!("{:#}", err)))]),
        );
        (status, format!("{:#}", err)).into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/download", get(download_handler))
        .route("/api/charts", get(charts_handler))
        .route("/api/quality", get(quality_handler))
        .route("/api/refresh", post(refresh_handler))
        .route("/api/health", get(health_handler))
        .with_state(state)
}

pub async fn run_server(cfg: Config, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = cfg.bind_addr();
    info(
        Domain::System,
        "server_start",
        obj(&[("addr", v_str(&addr)), ("static_csv", v_str(&cfg.static_csv))]),
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn render(state: &AppState, query: &FilterQuery) -> Result<DashboardData, AppError> {
    let filter = query.filter()?;
    Ok(state.pipeline.render(filter, state.today()).await?)
}

async fn index_handler(
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
) -> Result<Html<String>, AppError> {
    let data = render(&state, &query).await?;
    let charts = build_charts(&data.table);
    debug(
        Domain::Render,
        "page_rendered",
        obj(&[
            ("filter", v_str(data.filter.as_str())),
            ("rows", v_num(data.table.len() as f64)),
            ("points", v_num(charts.iter().map(|c| c.point_count()).sum::<usize>() as f64)),
        ]),
    );
    Ok(Html(render_page(&data, &charts)))
}

async fn download_handler(
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
) -> Result<Response, AppError> {
    let data = render(&state, &query).await?;
    let body = data.table.to_csv_bytes()?;
    info(
        Domain::Render,
        "csv_export",
        obj(&[("filter", v_str(data.filter.as_str())), ("bytes", v_num(body.len() as f64))]),
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", CSV_FILENAME),
            ),
        ],
        body,
    )
        .into_response())
}

async fn charts_handler(
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let data = render(&state, &query).await?;
    let charts: Vec<serde_json::Value> = build_charts(&data.table)
        .iter()
        .map(|c| serde_json::json!({"id": c.id, "points": c.point_count(), "figure": c.to_plotly()}))
        .collect();
    Ok(Json(serde_json::json!({
        "filter": data.filter,
        "rows": data.table.len(),
        "live_warning": data.live_warning,
        "charts": charts,
    })))
}

async fn quality_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let now_ts = Utc::now().timestamp().max(0) as u64;
    let path = state.pipeline.static_path().clone();
    let (manifest, report) = tokio::task::spawn_blocking(move || analyze_static(&path, now_ts))
        .await
        .context("quality task")??;
    Ok(Json(serde_json::json!({
        "manifest": manifest,
        "report": report,
    })))
}

async fn refresh_handler(State(state): State<AppState>) -> StatusCode {
    state.pipeline.refresh().await;
    info(Domain::Http, "cache_cleared", obj(&[]));
    StatusCode::NO_CONTENT
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}
