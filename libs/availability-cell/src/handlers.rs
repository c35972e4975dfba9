use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{
    AvailabilityConstraints, AvailabilityError, CheckAvailabilityRequest, DateRange,
    DaySlotsResponse,
};
use crate::services::AvailabilityOrchestrator;

#[derive(Debug, Deserialize)]
pub struct DaySlotsQuery {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub duration_minutes: i64,
    pub business_start: Option<NaiveTime>,
    pub business_end: Option<NaiveTime>,
    pub timezone: Option<String>,
    /// Comma-separated calendar ids; defaults to the connection's selection.
    pub calendar_ids: Option<String>,
}

/// Group availability across participants and an optional room.
#[axum::debug_handler]
pub async fn check_availability(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<CheckAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    if request.participant_ids.is_empty() {
        return Err(AppError::BadRequest(
            "At least one participant is required".to_string(),
        ));
    }

    let constraints = request.constraints.unwrap_or_default();
    let orchestrator = AvailabilityOrchestrator::new(&state);

    let response = orchestrator
        .check_availability(
            &request.participant_ids,
            request.room_resource_id.as_deref(),
            DateRange {
                start: request.start_date,
                end: request.end_date,
            },
            request.duration_minutes,
            &constraints,
            Utc::now(),
        )
        .await
        .map_err(map_availability_error)?;

    Ok(Json(json!(response)))
}

/// Single-user, single-day slot listing. Calendar-read failures degrade to
/// an empty slot list with an error string rather than a hard failure.
#[axum::debug_handler]
pub async fn day_slots(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<DaySlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let mut constraints = AvailabilityConstraints::default();
    if let Some(start) = query.business_start {
        constraints.business_start = start;
    }
    if let Some(end) = query.business_end {
        constraints.business_end = end;
    }
    if let Some(ref timezone) = query.timezone {
        constraints.timezone = timezone.clone();
    }

    let calendar_ids: Option<Vec<String>> = query.calendar_ids.as_deref().map(|ids| {
        ids.split(',')
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect()
    });

    let orchestrator = AvailabilityOrchestrator::new(&state);
    let range = DateRange {
        start: query.date,
        end: query.date,
    };

    let response = match orchestrator
        .check_availability_with_calendars(
            &[query.user_id],
            calendar_ids.as_deref(),
            None,
            range,
            query.duration_minutes,
            &constraints,
            Utc::now(),
        )
        .await
    {
        Ok(result) if result.participants_checked == 0 => {
            warn!("Day-slot check read no calendars for user {}", query.user_id);
            DaySlotsResponse {
                slots: vec![],
                error: Some(
                    result
                        .warnings
                        .first()
                        .cloned()
                        .unwrap_or_else(|| "Calendar could not be read".to_string()),
                ),
            }
        }
        Ok(result) => DaySlotsResponse {
            slots: result.slots,
            error: None,
        },
        Err(e) => return Err(map_availability_error(e)),
    };

    Ok(Json(json!(response)))
}

pub fn map_availability_error(e: AvailabilityError) -> AppError {
    match e {
        AvailabilityError::InvalidTimezone(tz) => {
            AppError::BadRequest(format!("Unknown timezone: {}", tz))
        }
        AvailabilityError::InvalidRange(msg) | AvailabilityError::InvalidConstraints(msg) => {
            AppError::BadRequest(msg)
        }
    }
}
