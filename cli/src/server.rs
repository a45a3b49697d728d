use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use crate::gemini::GeminiClient;
use sugartrack_core::backup::{ImportError, backup_file_name};
use sugartrack_core::insight;
use sugartrack_core::models::{
    Category, NewRecord, Overview, Preferences, Record, Theme, Unit, validate_value,
};
use sugartrack_core::service::SugarService;

const BODY_LIMIT: usize = 10 * 1024 * 1024; // 10 MB

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<SugarService>>,
    insight: Arc<GeminiClient>,
    api_key: Option<String>,
}

impl AppState {
    fn svc(&self) -> MutexGuard<'_, SugarService> {
        self.svc.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct RecordsQuery {
    q: Option<String>,
    category: Option<String>,
}

#[derive(Deserialize)]
struct CreateRecordRequest {
    /// Epoch milliseconds; defaults to now.
    timestamp: Option<i64>,
    category: Category,
    value: f64,
    /// Defaults to the stored default unit.
    unit: Option<Unit>,
    #[serde(default)]
    notes: String,
}

#[derive(Deserialize)]
struct UpdateRecordRequest {
    timestamp: i64,
    category: Category,
    value: f64,
    unit: Unit,
    #[serde(default)]
    notes: String,
}

#[derive(Deserialize)]
struct BulkDeleteRequest {
    ids: Vec<String>,
}

#[derive(Deserialize)]
struct UpdateSettingsRequest {
    theme: Option<Theme>,
    default_unit: Option<Unit>,
}

#[derive(Serialize)]
struct UpdateRecordResponse {
    updated: bool,
    record: Option<Record>,
}

#[derive(Serialize)]
struct InsightResponse {
    analysis: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                tracing::error!(error = %format!("{err:#}"), "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            tracing::debug!(path = %request.uri().path(), "rejected unauthenticated request");
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Record handlers ---

async fn list_records(
    State(state): State<AppState>,
    Query(params): Query<RecordsQuery>,
) -> Result<Json<Vec<Record>>, ApiError> {
    let category = params
        .category
        .as_deref()
        .filter(|c| !c.is_empty())
        .map(str::parse::<Category>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;

    let svc = state.svc();
    let records = svc.search(params.q.as_deref().unwrap_or(""), category, &Local);
    Ok(Json(records))
}

async fn create_record(
    State(state): State<AppState>,
    Json(req): Json<CreateRecordRequest>,
) -> Result<(StatusCode, Json<Record>), ApiError> {
    let value = validate_value(req.value).map_err(|e| ApiError::BadRequest(format!("{e}")))?;

    let mut svc = state.svc();
    let new = NewRecord {
        timestamp: req.timestamp.unwrap_or_else(|| Utc::now().timestamp_millis()),
        category: req.category,
        value,
        unit: req.unit.unwrap_or(svc.preferences().default_unit),
        notes: req.notes,
    };
    let record = svc.add_record(new).context("failed to add record")?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRecordRequest>,
) -> Result<Json<UpdateRecordResponse>, ApiError> {
    let value = validate_value(req.value).map_err(|e| ApiError::BadRequest(format!("{e}")))?;

    let record = Record {
        id,
        timestamp: req.timestamp,
        category: req.category,
        value,
        unit: req.unit,
        notes: req.notes,
    };

    let mut svc = state.svc();
    let updated = svc
        .update_record(record.clone())
        .context("failed to update record")?;
    Ok(Json(UpdateRecordResponse {
        updated,
        record: updated.then_some(record),
    }))
}

async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut svc = state.svc();
    let deleted = svc.delete_record(&id).context("failed to delete record")?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

async fn delete_records(
    State(state): State<AppState>,
    Json(req): Json<BulkDeleteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut svc = state.svc();
    let deleted = svc
        .delete_records(&req.ids)
        .context("failed to delete records")?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

async fn get_overview(State(state): State<AppState>) -> Json<Overview> {
    Json(state.svc().overview(&Local))
}

// --- Export / Import handlers ---

async fn export_data(State(state): State<AppState>) -> Result<Response, ApiError> {
    let json = state.svc().export_json().context("failed to export data")?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        backup_file_name(Local::now().date_naive())
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        json,
    )
        .into_response())
}

/// The body is the backup document itself, taken as raw text so the
/// truthiness checks see exactly what the file holds.
async fn import_data(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut svc = state.svc();
    match svc.import_json(&body) {
        Ok(count) => Ok(Json(serde_json::json!({ "imported": count }))),
        Err(ImportError::Storage(e)) => {
            Err(ApiError::Internal(e.context("failed to import data")))
        }
        Err(e) => Err(ApiError::BadRequest(format!("Invalid file format: {e}"))),
    }
}

// --- Settings handlers ---

async fn get_settings(State(state): State<AppState>) -> Json<Preferences> {
    Json(state.svc().preferences())
}

async fn update_settings(
    State(state): State<AppState>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Json<Preferences>, ApiError> {
    let mut svc = state.svc();
    if let Some(theme) = req.theme {
        svc.set_theme(theme).context("failed to save theme")?;
    }
    if let Some(unit) = req.default_unit {
        svc.set_default_unit(unit)
            .context("failed to save default unit")?;
    }
    Ok(Json(svc.preferences()))
}

async fn toggle_theme(State(state): State<AppState>) -> Result<Json<Preferences>, ApiError> {
    let mut svc = state.svc();
    svc.toggle_theme().context("failed to save theme")?;
    Ok(Json(svc.preferences()))
}

// --- Insight handler ---

async fn generate_insight(State(state): State<AppState>) -> Json<InsightResponse> {
    // The lock must not be held across the model request.
    let prompt = state.svc().insight_prompt(&Local);

    let analysis = match prompt {
        Ok(prompt) => insight::resolve(state.insight.generate_async(&prompt).await),
        Err(fallback) => fallback.to_string(),
    };
    Json(InsightResponse { analysis })
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/records",
            get(list_records)
                .post(create_record)
                .delete(delete_records),
        )
        .route(
            "/api/records/{id}",
            put(update_record).delete(delete_record),
        )
        .route("/api/overview", get(get_overview))
        .route("/api/export", get(export_data))
        .route("/api/import", post(import_data))
        .route("/api/settings", get(get_settings).put(update_settings))
        .route("/api/settings/theme/toggle", post(toggle_theme))
        .route("/api/insight", post(generate_insight))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

/// First and last four characters of the key, or just a mask when it is too
/// short to reveal any of it.
fn mask_key(key: &str) -> String {
    let head = key.get(..4);
    let tail = key.len().checked_sub(4).and_then(|start| key.get(start..));
    match (head, tail) {
        (Some(head), Some(tail)) if key.len() >= 8 => format!("{head}...{tail}"),
        _ => "****".to_string(),
    }
}

pub async fn start_server(
    svc: SugarService,
    insight: GeminiClient,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
        insight: Arc::new(insight),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        eprintln!(
            "API key: {} (see api_key file in data directory)",
            mask_key(key)
        );
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    tracing::info!(%bind, port, auth = api_key.is_some(), "server listening");
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
