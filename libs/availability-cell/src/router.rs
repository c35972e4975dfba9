use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;

use crate::handlers;

pub fn availability_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/check", post(handlers::check_availability))
        .route("/day-slots", get(handlers::day_slots))
        .with_state(state)
}
