use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{CalendarError, VerificationOutcome};
use crate::services::{CalendarEventService, ConnectionService};

/// Verify a user's calendar connection by listing their calendars and
/// recording the outcome on the connection row.
#[axum::debug_handler]
pub async fn verify_connection(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let connections = ConnectionService::new(&state);
    let events = CalendarEventService::new(&state);

    let connection = connections
        .get_connection(user_id, "google")
        .await
        .map_err(map_calendar_error)?;

    let outcome = match events.count_calendars(&connection).await {
        Ok(count) => VerificationOutcome {
            ok: true,
            calendar_count: count,
            error: None,
        },
        Err(e) => VerificationOutcome {
            ok: false,
            calendar_count: 0,
            error: Some(e.to_string()),
        },
    };

    connections
        .record_verification(connection.id, &outcome)
        .await
        .map_err(map_calendar_error)?;

    Ok(Json(json!({
        "connection_id": connection.id,
        "verification": outcome,
    })))
}

#[axum::debug_handler]
pub async fn disconnect(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let connections = ConnectionService::new(&state);

    let connection = connections
        .get_connection(user_id, "google")
        .await
        .map_err(map_calendar_error)?;

    connections
        .delete_connection(connection.id)
        .await
        .map_err(map_calendar_error)?;

    Ok(Json(json!({ "disconnected": true })))
}

pub fn map_calendar_error(e: CalendarError) -> AppError {
    match e {
        CalendarError::NoConnection => {
            AppError::NotFound("No calendar connection for user".to_string())
        }
        CalendarError::Database(msg) => AppError::Database(msg),
        other => AppError::ExternalService(other.to_string()),
    }
}
