// libs/booking-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use availability_cell::models::Slot;

// ==============================================================================
// CORE MEETING MODELS
// ==============================================================================

/// The booking aggregate. Mutated at every lifecycle transition, never
/// hard-deleted; participant deletion nulls the user references instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: Uuid,
    pub meeting_type: String,
    pub duration_minutes: i64,
    pub location: LocationMode,
    pub room_resource_id: Option<String>,
    pub host_user_id: Option<Uuid>,
    #[serde(default)]
    pub support_user_ids: Vec<Uuid>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    pub timezone: String,
    /// Constraints and proposed slots captured at request time.
    pub preferences: Option<Value>,
    pub status: MeetingStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub calendar_event_id: Option<String>,
    pub crm_contact_id: Option<String>,
    pub crm_matter_id: Option<String>,
    pub crm_appointment_id: Option<String>,
    /// Test bookings run the production lifecycle but tag the calendar
    /// event and skip CRM sync.
    #[serde(default)]
    pub is_test: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendee {
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LocationMode {
    Zoom,
    InPerson,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Draft,
    Proposed,
    Booked,
    Rescheduled,
    Cancelled,
    Failed,
}

impl fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeetingStatus::Draft => write!(f, "draft"),
            MeetingStatus::Proposed => write!(f, "proposed"),
            MeetingStatus::Booked => write!(f, "booked"),
            MeetingStatus::Rescheduled => write!(f, "rescheduled"),
            MeetingStatus::Cancelled => write!(f, "cancelled"),
            MeetingStatus::Failed => write!(f, "failed"),
        }
    }
}

impl MeetingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MeetingStatus::Cancelled | MeetingStatus::Failed)
    }
}

// ==============================================================================
// BOOKING REQUEST MODELS
// ==============================================================================

/// Public, token-addressable façade over one Meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub public_token: String,
    pub status: BookingRequestStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingRequestStatus {
    Open,
    Completed,
    Expired,
}

impl fmt::Display for BookingRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingRequestStatus::Open => write!(f, "open"),
            BookingRequestStatus::Completed => write!(f, "completed"),
            BookingRequestStatus::Expired => write!(f, "expired"),
        }
    }
}

// ==============================================================================
// PROGRESS LOG MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

/// One append-only audit row. A shared run id groups all entries for a
/// single lifecycle attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressLogEntry {
    pub meeting_id: Uuid,
    pub run_id: Uuid,
    pub step: String,
    pub level: LogLevel,
    pub message: String,
    pub details: Option<Value>,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ProposeSlotsRequest {
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmBookingRequest {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmBookingResponse {
    pub success: bool,
    pub warnings: Vec<String>,
    /// True when any best-effort side effect failed, even though the
    /// booking itself succeeded.
    pub has_errors: bool,
    pub calendar_event_id: Option<String>,
    pub crm_appointment_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManageBookingRequest {
    pub action: ManageAction,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ManageAction {
    Reschedule,
    Cancel,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManageBookingResponse {
    pub success: bool,
    pub warnings: Vec<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum BookingError {
    #[error("Meeting not found")]
    MeetingNotFound,

    #[error("Booking request not found")]
    RequestNotFound,

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Meeting cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: MeetingStatus,
        to: MeetingStatus,
    },

    #[error("Selected slot is no longer available")]
    SlotTaken,

    #[error("Availability check failed: {0}")]
    Availability(String),

    #[error("Database error: {0}")]
    Database(String),
}
