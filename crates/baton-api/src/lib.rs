//! baton-api: REST API for Baton.
//!
//! A thin adapter that maps HTTP requests onto scheduler operations and
//! scheduler outcomes onto JSON. Clients poll their status; nothing here
//! holds state of its own.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/clients/{id}/control` | Request control (or join the queue) |
//! | DELETE | `/api/v1/clients/{id}/control` | Release control |
//! | DELETE | `/api/v1/clients/{id}/queue` | Leave the queue |
//! | POST | `/api/v1/clients/{id}/heartbeat` | Liveness signal |
//! | GET | `/api/v1/clients/{id}/status` | Role, remaining time, or position |
//! | GET | `/api/v1/clients/{id}/authorized` | May this client send commands now |
//! | GET | `/api/v1/session` | Current owner and waiting list |
//! | GET | `/api/v1/stats` | Scheduler counters |
//! | GET | `/metrics` | Prometheus exposition |

pub mod handlers;
pub mod prometheus;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use baton_scheduler::Scheduler;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub scheduler: Arc<Scheduler>,
}

/// Build the complete API router (REST + metrics).
pub fn build_router(scheduler: Arc<Scheduler>) -> Router {
    let api_state = ApiState { scheduler };

    let api_routes = Router::new()
        .route(
            "/clients/{id}/control",
            post(handlers::request_control).delete(handlers::release_control),
        )
        .route("/clients/{id}/queue", delete(handlers::leave_queue))
        .route("/clients/{id}/heartbeat", post(handlers::heartbeat))
        .route("/clients/{id}/status", get(handlers::query_status))
        .route("/clients/{id}/authorized", get(handlers::authorized))
        .route("/session", get(handlers::session_overview))
        .route("/stats", get(handlers::stats))
        .with_state(api_state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::prometheus_metrics).with_state(api_state))
}
