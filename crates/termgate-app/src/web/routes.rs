use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get},
    Router,
};
use std::sync::Arc;
use termgate_terminal::{GatewayError, SessionRegistry};

use crate::config::GatewayConfig;
use crate::web::terminal::{self, is_valid_session_id};

/// Application state shared across routes
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub config: Arc<GatewayConfig>,
}

/// Create router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        // API routes
        .route("/api/terminals", get(list_terminals))
        .route("/api/terminals/:session_id", delete(close_terminal))
        // WebSocket endpoints; /ws/terminal is the older path
        .route("/terminal/:session_id", get(terminal::terminal_handler))
        .route("/ws/terminal/:session_id", get(terminal::terminal_handler))
        .with_state(state)
}

/// GET / - liveness
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/terminals - List live sessions
async fn list_terminals(State(state): State<AppState>) -> Json<serde_json::Value> {
    let terminals = state.registry.list().await;
    Json(serde_json::json!({ "terminals": terminals }))
}

/// DELETE /api/terminals/:session_id - Close a session
async fn close_terminal(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !is_valid_session_id(&session_id) {
        return Err(AppError::BadRequest(format!("Invalid session id '{}'", session_id)));
    }

    let existed = state.registry.contains(&session_id).await;
    let exit_code = state.registry.close(&session_id).await?;

    Ok(Json(serde_json::json!({
        "closed": existed,
        "exit_code": exit_code,
    })))
}

/// Error type for API handlers
pub enum AppError {
    Gateway(GatewayError),
    BadRequest(String),
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::Gateway(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Gateway(err @ GatewayError::NotFound(_)) => (StatusCode::NOT_FOUND, err.to_string()),
            AppError::Gateway(err @ GatewayError::CapacityReached(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            AppError::Gateway(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
