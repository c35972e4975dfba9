// libs/availability-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use calendar_cell::models::{BusyInterval, BusySource};

// ==============================================================================
// CONSTRAINTS & SLOTS
// ==============================================================================

/// Scheduling constraints applied per availability request. A single
/// structure replaces the near-duplicate per-call-site variants the
/// original system grew.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityConstraints {
    /// Business-hours window, wall-clock in `timezone`.
    pub business_start: NaiveTime,
    pub business_end: NaiveTime,
    /// Optional lunch block, treated as busy for every day.
    pub lunch_start: Option<NaiveTime>,
    pub lunch_end: Option<NaiveTime>,
    /// Candidates before `now + minimum_notice_minutes` are excluded.
    pub minimum_notice_minutes: i64,
    /// IANA timezone identifier, e.g. "America/Chicago".
    pub timezone: String,
    pub include_weekends: bool,
    /// Candidate start times are generated at this stride.
    pub slot_increment_minutes: i64,
    pub max_results: usize,
    #[serde(default)]
    pub busy_source: BusySource,
}

impl Default for AvailabilityConstraints {
    fn default() -> Self {
        Self {
            business_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            business_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            lunch_start: None,
            lunch_end: None,
            minimum_notice_minutes: 0,
            timezone: "UTC".to_string(),
            include_weekends: false,
            slot_increment_minutes: 30,
            max_results: 30,
            busy_source: BusySource::FreeBusy,
        }
    }
}

/// A candidate bookable time range satisfying all constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Human-readable label formatted in the request timezone.
    pub label: String,
}

/// Inclusive calendar-day range, interpreted in the request timezone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CheckAvailabilityRequest {
    pub participant_ids: Vec<Uuid>,
    pub room_resource_id: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_minutes: i64,
    #[serde(default)]
    pub constraints: Option<AvailabilityConstraints>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckAvailabilityResponse {
    pub slots: Vec<Slot>,
    pub busy_intervals: Vec<BusyInterval>,
    /// How many participants' calendars were actually read. Lets callers
    /// distinguish "everyone free, nothing fits" from "nobody's calendar
    /// could be read".
    pub participants_checked: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySlotsResponse {
    pub slots: Vec<Slot>,
    pub error: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AvailabilityError {
    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Invalid constraints: {0}")]
    InvalidConstraints(String),
}
