//! HTTP mutation boundary.
//!
//! Thin JSON layer over the directory: request parsing, status codes and
//! error rendering only.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use frostwatch_core::{AppError, DeviceToken, DirectoryError, Location, TemperatureUnit};
use frostwatch_directory::{AddOutcome, Directory, RegisterOutcome, RemoveOutcome};
use frostwatch_sweep::{SchedulerState, SweepReport, SweepScheduler};

#[derive(Clone)]
pub struct ApiState {
    pub directory: Arc<Directory>,
    pub scheduler: Arc<SweepScheduler>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct AddLocationRequest {
    pub token: String,
    pub location: Location,
}

/// Removal target. With `name` and `unit` the match is structural; with
/// coordinates alone the first entry at those coordinates goes.
#[derive(Debug, Deserialize)]
pub struct RemoveTarget {
    pub latitude: String,
    pub longitude: String,
    pub name: Option<String>,
    pub unit: Option<TemperatureUnit>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveLocationRequest {
    pub token: String,
    pub location: RemoveTarget,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub tokens: usize,
    pub locations: usize,
    pub scheduler: &'static str,
    pub sweeps_completed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sweep: Option<SweepReport>,
}

type ApiResult = Result<(StatusCode, Json<ApiResponse>), ApiError>;

fn reply(code: StatusCode, status: &'static str) -> ApiResult {
    Ok((code, Json(ApiResponse { status, message: None })))
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    App(AppError),
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        ApiError::App(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, status, message) = match &self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, "invalid_request", message.clone())
            }
            ApiError::App(e @ AppError::Directory(DirectoryError::UnknownToken(_))) => (
                StatusCode::NOT_FOUND,
                "unknown_token",
                e.user_message().to_string(),
            ),
            ApiError::App(e) => {
                tracing::error!("Request failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "error",
                    e.user_message().to_string(),
                )
            }
        };

        (
            code,
            Json(ApiResponse {
                status,
                message: Some(message),
            }),
        )
            .into_response()
    }
}

/// Tokens are opaque and stored exactly as sent.
fn parse_token(raw: String) -> Result<DeviceToken, ApiError> {
    let token = DeviceToken::new(raw);
    if token.is_blank() {
        return Err(ApiError::BadRequest("token must not be empty".to_string()));
    }
    if token.as_str().trim() != token.as_str() {
        return Err(ApiError::BadRequest(
            "token must not have leading or trailing whitespace".to_string(),
        ));
    }
    Ok(token)
}

fn check_coordinates(latitude: &str, longitude: &str) -> Result<(), ApiError> {
    Location::validate_coordinates(latitude, longitude).map_err(ApiError::BadRequest)
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/register", post(handle_register))
        .route("/add_location", post(handle_add_location))
        .route("/remove_location", post(handle_remove_location))
        .route("/health", get(handle_health))
        .with_state(state)
}

async fn handle_register(
    State(state): State<ApiState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult {
    let token = parse_token(request.token)?;

    match state.directory.register(&token).await? {
        RegisterOutcome::Registered => reply(StatusCode::CREATED, "registered"),
        RegisterOutcome::AlreadyExists => reply(StatusCode::OK, "already_exists"),
    }
}

async fn handle_add_location(
    State(state): State<ApiState>,
    Json(request): Json<AddLocationRequest>,
) -> ApiResult {
    let token = parse_token(request.token)?;
    let location = request.location;
    check_coordinates(&location.latitude, &location.longitude)?;

    match state.directory.add_location(&token, location).await? {
        AddOutcome::Added => reply(StatusCode::CREATED, "added"),
        AddOutcome::AlreadyPresent => reply(StatusCode::OK, "already_present"),
    }
}

async fn handle_remove_location(
    State(state): State<ApiState>,
    Json(request): Json<RemoveLocationRequest>,
) -> ApiResult {
    let token = parse_token(request.token)?;
    let target = request.location;

    let outcome = match (target.name, target.unit) {
        (Some(name), Some(unit)) => {
            let location = Location::new(target.latitude, target.longitude, name, unit);
            state.directory.remove_location(&token, &location).await?
        }
        _ => {
            state
                .directory
                .remove_coordinates(&token, &target.latitude, &target.longitude)
                .await?
        }
    };

    match outcome {
        RemoveOutcome::Removed => reply(StatusCode::OK, "removed"),
        RemoveOutcome::NotFound => reply(StatusCode::OK, "not_found"),
    }
}

async fn handle_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let snapshot = state.directory.snapshot();
    let scheduler = match state.scheduler.state() {
        SchedulerState::Idle => "idle",
        SchedulerState::Sweeping => "sweeping",
    };

    Json(HealthResponse {
        status: "ok",
        tokens: snapshot.len(),
        locations: snapshot.location_count(),
        scheduler,
        sweeps_completed: state.scheduler.sweeps_completed(),
        last_sweep: state.scheduler.last_report(),
    })
}
