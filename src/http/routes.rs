//! HTTP route definitions

use axum::{
    extract::{Extension, Path, State},
    http::{header, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::app::{AppState, BridgeSession};
use crate::game::runtime::{AdminCommand, AdminReply, RuntimeError};
use crate::game::{MatchError, RuntimeStatus};
use crate::host::Position;
use crate::http::middleware::{require_admin, AuthenticatedOperator};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    // Public routes; the bridge authenticates with a query token
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler));

    let admin_routes = Router::new()
        .route("/matches", get(list_matches_handler).post(create_match_handler))
        .route("/matches/:id", delete(delete_match_handler))
        .route("/matches/:id/start", post(start_match_handler))
        .route("/matches/:id/reset", post(reset_match_handler))
        .route("/start", post(start_any_handler))
        .route("/reset", post(reset_all_handler))
        .route("/arena", put(set_arena_handler))
        .route("/arena/corners/:corner", post(set_corner_handler))
        .route("/lobby", put(set_lobby_handler))
        .route("/settings/reload", post(reload_settings_handler))
        .route("/journal/discard", post(discard_journal_handler))
        .route("/bridges", get(bridges_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    runtime: RuntimeStatus,
    bridges: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        runtime: state.runtime.status(),
        bridges: state.bridges.len(),
    })
}

// ============================================================================
// Match endpoints
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct CreateMatchRequest {
    #[serde(default)]
    max_players: Option<usize>,
    #[serde(default)]
    min_players: Option<usize>,
}

async fn create_match_handler(
    State(state): State<AppState>,
    Extension(operator): Extension<AuthenticatedOperator>,
    Json(req): Json<CreateMatchRequest>,
) -> Result<Json<AdminReply>, AppError> {
    info!(operator = %operator.name, ?req, "Create match");
    admin(
        &state,
        AdminCommand::CreateMatch {
            max_players: req.max_players,
            min_players: req.min_players,
        },
    )
    .await
}

async fn list_matches_handler(State(state): State<AppState>) -> Result<Json<AdminReply>, AppError> {
    admin(&state, AdminCommand::ListMatches).await
}

async fn delete_match_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AdminReply>, AppError> {
    admin(&state, AdminCommand::DeleteMatch { id }).await
}

async fn start_match_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AdminReply>, AppError> {
    admin(&state, AdminCommand::StartMatch { id: Some(id) }).await
}

/// Start the only open match
async fn start_any_handler(State(state): State<AppState>) -> Result<Json<AdminReply>, AppError> {
    admin(&state, AdminCommand::StartMatch { id: None }).await
}

async fn reset_match_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AdminReply>, AppError> {
    admin(&state, AdminCommand::ResetMatch { id }).await
}

async fn reset_all_handler(State(state): State<AppState>) -> Result<Json<AdminReply>, AppError> {
    admin(&state, AdminCommand::ResetAll).await
}

// ============================================================================
// Arena endpoints
// ============================================================================

#[derive(Deserialize)]
struct SetArenaRequest {
    center: Position,
    size: f64,
}

async fn set_arena_handler(
    State(state): State<AppState>,
    Json(req): Json<SetArenaRequest>,
) -> Result<Json<AdminReply>, AppError> {
    admin(
        &state,
        AdminCommand::SetArenaCenter {
            center: req.center,
            size: req.size,
        },
    )
    .await
}

async fn set_corner_handler(
    State(state): State<AppState>,
    Path(corner): Path<u8>,
    Json(position): Json<Position>,
) -> Result<Json<AdminReply>, AppError> {
    admin(&state, AdminCommand::SetArenaCorner { corner, position }).await
}

async fn set_lobby_handler(
    State(state): State<AppState>,
    Json(position): Json<Position>,
) -> Result<Json<AdminReply>, AppError> {
    admin(&state, AdminCommand::SetLobby { position }).await
}

async fn reload_settings_handler(State(state): State<AppState>) -> Result<Json<AdminReply>, AppError> {
    admin(&state, AdminCommand::ReloadSettings).await
}

async fn discard_journal_handler(State(state): State<AppState>) -> Result<Json<AdminReply>, AppError> {
    admin(&state, AdminCommand::DiscardJournal).await
}

async fn bridges_handler(State(state): State<AppState>) -> Json<Vec<BridgeSession>> {
    Json(state.bridge_sessions())
}

async fn admin(state: &AppState, command: AdminCommand) -> Result<Json<AdminReply>, AppError> {
    Ok(Json(state.runtime.admin(command).await?))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Denied(#[from] MatchError),

    #[error("Arena runtime unavailable")]
    Unavailable,
}

impl From<RuntimeError> for AppError {
    fn from(e: RuntimeError) -> Self {
        match e {
            RuntimeError::Denied(e) => AppError::Denied(e),
            RuntimeError::Stopped => AppError::Unavailable,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            AppError::Denied(e) => {
                let status = match e {
                    MatchError::MatchNotFound(_) => StatusCode::NOT_FOUND,
                    MatchError::InvalidArenaGeometry(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    MatchError::SpecifyMatch | MatchError::NoMatchesAvailable => {
                        StatusCode::BAD_REQUEST
                    }
                    _ => StatusCode::CONFLICT,
                };
                (status, e.code())
            }
            AppError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
