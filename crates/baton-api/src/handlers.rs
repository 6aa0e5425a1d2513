//! REST API handlers.
//!
//! Each handler makes exactly one scheduler call and renders its outcome.
//! Expected races (releasing after eviction, heartbeating after being
//! dropped) are answered with `200` and a negative flag, not an error.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::debug;

use baton_core::{ClientIdentity, Role, Tier};
use baton_scheduler::{HeartbeatOutcome, ReleaseOutcome, RequestOutcome, Status};

use crate::ApiState;

/// Longest display name kept, in characters.
const MAX_DISPLAY_NAME: usize = 64;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn parse_identity(raw: &str) -> Result<ClientIdentity, axum::response::Response> {
    ClientIdentity::new(raw)
        .map_err(|e| error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response())
}

fn clean_display_name(name: Option<String>) -> Option<String> {
    let name = name?;
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_DISPLAY_NAME).collect())
}

// ── Views ──────────────────────────────────────────────────────

/// Where a client stands, as rendered to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Participation {
    Active,
    Queued,
    Idle,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusView {
    pub role: Participation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

impl From<Status> for StatusView {
    fn from(status: Status) -> Self {
        match status {
            Status::Active { remaining, tier } => StatusView {
                role: Participation::Active,
                tier: Some(tier),
                remaining_seconds: Some(remaining.as_secs()),
                position: None,
            },
            Status::Queued { position, tier } => StatusView {
                role: Participation::Queued,
                tier: Some(tier),
                remaining_seconds: None,
                position: Some(position),
            },
            Status::Idle => StatusView {
                role: Participation::Idle,
                tier: None,
                remaining_seconds: None,
                position: None,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ControlView {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

impl From<RequestOutcome> for ControlView {
    fn from(outcome: RequestOutcome) -> Self {
        match outcome {
            RequestOutcome::Active { remaining } => ControlView {
                role: Role::Active,
                remaining_seconds: Some(remaining.as_secs()),
                position: None,
            },
            RequestOutcome::Queued { position } => ControlView {
                role: Role::Queued,
                remaining_seconds: None,
                position: Some(position),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReleaseView {
    pub released: bool,
    /// Display name of whoever took over, if they gave one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_owner: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaveView {
    pub left: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HeartbeatView {
    pub recorded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Whether a client may issue commands right now.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizedView {
    pub authorized: bool,
}

/// The current owner. Identities are never exposed to other clients; only
/// display names are.
#[derive(Debug, Serialize, Deserialize)]
pub struct OwnerView {
    pub display_name: Option<String>,
    pub tier: Tier,
    pub remaining_seconds: u64,
    pub session_timeout_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WaiterView {
    pub position: usize,
    pub display_name: Option<String>,
    pub tier: Tier,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub current_owner: Option<OwnerView>,
    pub waiting: Vec<WaiterView>,
    pub standard_budget_seconds: u64,
    pub elevated_budget_seconds: u64,
}

/// Control request body.
#[derive(Debug, Default, Deserialize)]
pub struct ControlRequest {
    #[serde(default)]
    pub tier: Tier,
    pub display_name: Option<String>,
}

// ── Control ────────────────────────────────────────────────────

/// POST /api/v1/clients/:id/control
pub async fn request_control(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<ControlRequest>,
) -> impl IntoResponse {
    let identity = match parse_identity(&id) {
        Ok(identity) => identity,
        Err(resp) => return resp,
    };

    let outcome = state.scheduler.request_control_named(
        &identity,
        req.tier,
        clean_display_name(req.display_name),
    );
    ApiResponse::ok(ControlView::from(outcome)).into_response()
}

/// DELETE /api/v1/clients/:id/control
pub async fn release_control(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let identity = match parse_identity(&id) {
        Ok(identity) => identity,
        Err(resp) => return resp,
    };

    let view = match state.scheduler.release_control(&identity) {
        ReleaseOutcome::Released { promoted_name, .. } => ReleaseView {
            released: true,
            next_owner: promoted_name,
        },
        ReleaseOutcome::NotActive => {
            debug!(client = %identity, "release by non-active client");
            ReleaseView {
                released: false,
                next_owner: None,
            }
        }
    };
    ApiResponse::ok(view).into_response()
}

/// DELETE /api/v1/clients/:id/queue
pub async fn leave_queue(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let identity = match parse_identity(&id) {
        Ok(identity) => identity,
        Err(resp) => return resp,
    };

    let left = state.scheduler.leave_queue(&identity);
    ApiResponse::ok(LeaveView { left }).into_response()
}

// ── Liveness ───────────────────────────────────────────────────

/// POST /api/v1/clients/:id/heartbeat
pub async fn heartbeat(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let identity = match parse_identity(&id) {
        Ok(identity) => identity,
        Err(resp) => return resp,
    };

    let view = match state.scheduler.heartbeat(&identity) {
        HeartbeatOutcome::Recorded { role } => HeartbeatView {
            recorded: true,
            role: Some(role),
        },
        HeartbeatOutcome::Unknown => HeartbeatView {
            recorded: false,
            role: None,
        },
    };
    ApiResponse::ok(view).into_response()
}

// ── Status ─────────────────────────────────────────────────────

/// GET /api/v1/clients/:id/status
pub async fn query_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let identity = match parse_identity(&id) {
        Ok(identity) => identity,
        Err(resp) => return resp,
    };

    let status = state.scheduler.query_status(&identity);
    ApiResponse::ok(StatusView::from(status)).into_response()
}

/// GET /api/v1/clients/:id/authorized
pub async fn authorized(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let identity = match parse_identity(&id) {
        Ok(identity) => identity,
        Err(resp) => return resp,
    };

    let authorized = state.scheduler.is_active(&identity);
    ApiResponse::ok(AuthorizedView { authorized }).into_response()
}

/// GET /api/v1/session
pub async fn session_overview(State(state): State<ApiState>) -> impl IntoResponse {
    let overview = state.scheduler.overview();
    let config = state.scheduler.config();

    let view = SessionView {
        current_owner: overview.active.map(|a| OwnerView {
            display_name: a.display_name,
            tier: a.tier,
            remaining_seconds: a.remaining.as_secs(),
            session_timeout_seconds: a.budget.as_secs(),
        }),
        waiting: overview
            .waiting
            .into_iter()
            .map(|w| WaiterView {
                position: w.position,
                display_name: w.display_name,
                tier: w.tier,
            })
            .collect(),
        standard_budget_seconds: config.standard_budget.as_secs(),
        elevated_budget_seconds: config.elevated_budget.as_secs(),
    };
    ApiResponse::ok(view)
}

/// GET /api/v1/stats
pub async fn stats(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.scheduler.stats())
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = crate::prometheus::render_prometheus(&state.scheduler.stats());
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
