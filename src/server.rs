//! HTTP transport: REST tool endpoints plus the MCP JSON-RPC endpoint.

use std::{io, sync::Arc, time::Instant};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::RwLock;

use crate::{
    config::Config,
    drive::LocalDrive,
    mcp,
    service::{ServiceSettings, TableService},
    tools::{self, Tool, ToolError},
};

pub struct AppState {
    pub service: RwLock<TableService>,
    pub auth_token: Option<String>,
}

impl AppState {
    pub fn new(service: TableService, auth_token: Option<String>) -> Self {
        Self {
            service: RwLock::new(service),
            auth_token: auth_token.filter(|token| !token.trim().is_empty()),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Tool failure rendered as `{ "error": message }` with a matching status.
pub struct ApiError(ToolError);

impl From<ToolError> for ApiError {
    fn from(err: ToolError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            ToolError::Table(err) if err.is_not_found() => StatusCode::NOT_FOUND,
            ToolError::Table(_) | ToolError::InvalidParams(_) => StatusCode::BAD_REQUEST,
            ToolError::UnknownTool(_) => StatusCode::NOT_FOUND,
            ToolError::Internal(err) if is_missing_file(err) => StatusCode::NOT_FOUND,
            ToolError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn is_missing_file(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|io| io.kind() == io::ErrorKind::NotFound)
    })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Tool failed: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ToolResponse = std::result::Result<Json<Value>, ApiError>;

async fn invoke(state: &AppState, tool: Tool, arguments: Value) -> ToolResponse {
    Ok(Json(tools::call(&state.service, tool, arguments).await?))
}

async fn list_files(State(state): State<Arc<AppState>>) -> ToolResponse {
    invoke(&state, Tool::ListDriveFiles, Value::Null).await
}

async fn load(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> ToolResponse {
    invoke(&state, Tool::LoadArchive, body).await
}

async fn query(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> ToolResponse {
    invoke(&state, Tool::QueryTable, body).await
}

async fn analyze(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> ToolResponse {
    invoke(&state, Tool::AnalyzeData, body).await
}

async fn export(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> ToolResponse {
    invoke(&state, Tool::ExportTable, body).await
}

async fn list_tables(State(state): State<Arc<AppState>>) -> ToolResponse {
    invoke(&state, Tool::ListTables, Value::Null).await
}

async fn rpc(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request = match mcp::parse_request(&body) {
        Ok(request) => request,
        Err(response) => {
            warn!("Rejected malformed MCP request");
            return Json(response).into_response();
        }
    };
    match mcp::handle(&state.service, request).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn require_token(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let Some(expected) = state.auth_token.as_deref() else {
        return next.run(request).await;
    };
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);
    if presented == Some(expected) {
        next.run(request).await
    } else {
        warn!(
            "Rejected {} {}: missing or invalid bearer token",
            request.method(),
            request.uri().path()
        );
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Missing or invalid bearer token" })),
        )
            .into_response()
    }
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    info!(
        "{method} {path} -> {} in {:.2?}",
        response.status().as_u16(),
        started.elapsed()
    );
    response
}

/// Builds the application router. `/health` stays open; every other route
/// goes through the bearer-token check.
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/tools/files", get(list_files))
        .route("/tools/load", post(load))
        .route("/tools/query", post(query))
        .route("/tools/analyze", post(analyze))
        .route("/tools/export", post(export))
        .route("/tools/tables", get(list_tables))
        .route("/mcp", post(rpc))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

pub async fn serve(config: Config) -> Result<()> {
    let drive = LocalDrive::new(config.drive_root.clone())?;
    let service = TableService::new(Arc::new(drive), ServiceSettings::from(&config));
    if config.auth_token.is_none() {
        warn!("No auth token configured; tool endpoints are open");
    }
    let state = Arc::new(AppState::new(service, config.auth_token.clone()));

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Binding {}", config.bind))?;
    info!(
        "drive-tables listening on {} (drive root {:?})",
        config.bind, config.drive_root
    );
    axum::serve(listener, router(state))
        .await
        .context("Serving HTTP")
}
