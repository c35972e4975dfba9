use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{
    BookingError, ConfirmBookingRequest, ManageBookingRequest, ProposeSlotsRequest,
};
use crate::services::BookingService;

#[axum::debug_handler]
pub async fn propose_meeting(
    State(state): State<Arc<AppConfig>>,
    Path(meeting_id): Path<Uuid>,
    Json(request): Json<ProposeSlotsRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);

    let meeting = service
        .propose_meeting(meeting_id, request)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "meeting_id": meeting.id,
        "status": meeting.status,
    })))
}

#[axum::debug_handler]
pub async fn confirm_booking(
    State(state): State<Arc<AppConfig>>,
    Path(meeting_id): Path<Uuid>,
    Json(request): Json<ConfirmBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);

    let response = service
        .confirm_booking(meeting_id, request, Utc::now())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(serde_json::to_value(response).map_err(|e| {
        AppError::Internal(format!("Response serialization failed: {}", e))
    })?))
}

#[axum::debug_handler]
pub async fn manage_booking(
    State(state): State<Arc<AppConfig>>,
    Path(public_token): Path<String>,
    Json(request): Json<ManageBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);

    let response = service
        .manage_booking(&public_token, request.action, Utc::now())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(serde_json::to_value(response).map_err(|e| {
        AppError::Internal(format!("Response serialization failed: {}", e))
    })?))
}

pub fn map_booking_error(e: BookingError) -> AppError {
    match e {
        BookingError::MeetingNotFound => AppError::NotFound("Meeting not found".to_string()),
        BookingError::RequestNotFound => {
            AppError::NotFound("Booking request not found".to_string())
        }
        BookingError::PreconditionFailed(msg) => AppError::PreconditionFailed(msg),
        BookingError::InvalidStatusTransition { .. } => {
            AppError::PreconditionFailed(e.to_string())
        }
        BookingError::SlotTaken => {
            AppError::Conflict("Selected slot is no longer available".to_string())
        }
        BookingError::Availability(msg) => AppError::BadRequest(msg),
        BookingError::Database(msg) => AppError::Database(msg),
    }
}
