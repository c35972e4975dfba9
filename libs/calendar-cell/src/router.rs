use std::sync::Arc;

use axum::{
    routing::{delete, get},
    Router,
};

use shared_config::AppConfig;

use crate::handlers;

pub fn calendar_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route(
            "/connections/{user_id}/verify",
            get(handlers::verify_connection),
        )
        .route("/connections/{user_id}", delete(handlers::disconnect))
        .with_state(state)
}
