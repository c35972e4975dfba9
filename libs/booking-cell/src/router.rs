use std::sync::Arc;

use axum::{routing::post, Router};

use shared_config::AppConfig;

use crate::handlers;

pub fn booking_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/{meeting_id}/propose", post(handlers::propose_meeting))
        .route("/{meeting_id}/confirm", post(handlers::confirm_booking))
        .route("/manage/{public_token}", post(handlers::manage_booking))
        .with_state(state)
}
