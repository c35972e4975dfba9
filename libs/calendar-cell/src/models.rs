// libs/calendar-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// CALENDAR CONNECTION MODELS
// ==============================================================================

/// Stored OAuth credential set for one (user, provider) pair.
/// At most one active row exists per pair; refreshes rewrite the row in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConnection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expiry: DateTime<Utc>,
    #[serde(default)]
    pub selected_calendar_ids: Vec<String>,
    pub last_verification: Option<VerificationOutcome>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub ok: bool,
    pub calendar_count: i32,
    pub error: Option<String>,
}

/// A time range during which a calendar or resource is unavailable.
/// Always absolute UTC instants, never wall-clock. Invariant: start < end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusyInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Half-open overlap check: touching endpoints do not overlap.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }
}

/// How busy intervals are derived from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusySource {
    /// Trust the provider's free/busy computation directly.
    FreeBusy,
    /// Derive busy intervals from an events listing; every non-cancelled,
    /// non-transparent event counts as busy.
    EventsDerived,
}

impl Default for BusySource {
    fn default() -> Self {
        BusySource::FreeBusy
    }
}

// ==============================================================================
// PROVIDER WIRE MODELS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FreeBusyResponse {
    #[serde(default)]
    pub calendars: std::collections::HashMap<String, FreeBusyCalendar>,
}

#[derive(Debug, Deserialize)]
pub struct FreeBusyCalendar {
    #[serde(default)]
    pub busy: Vec<FreeBusyPeriod>,
    #[serde(default)]
    pub errors: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct FreeBusyPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct EventsListResponse {
    #[serde(default)]
    pub items: Vec<EventResource>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventResource {
    pub id: Option<String>,
    pub status: Option<String>,
    pub transparency: Option<String>,
    pub start: Option<EventTime>,
    pub end: Option<EventTime>,
}

/// Timed events carry `dateTime`; all-day events carry `date` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTime {
    #[serde(rename = "dateTime", skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<chrono::NaiveDate>,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatedEventResponse {
    pub id: String,
    pub status: Option<String>,
}

/// Input for creating a provider-side event during booking confirmation.
#[derive(Debug, Clone, Serialize)]
pub struct CalendarEventInput {
    pub summary: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub timezone: String,
    pub attendee_emails: Vec<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum CalendarError {
    #[error("No calendar connection for user")]
    NoConnection,

    #[error("Access token expired or rejected")]
    AuthExpired,

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Provider API error ({status}): {excerpt}")]
    ProviderApi { status: u16, excerpt: String },

    #[error("Database error: {0}")]
    Database(String),
}

impl CalendarError {
    pub fn from_provider_status(status: u16, body: &str) -> Self {
        if status == 401 || status == 403 {
            CalendarError::AuthExpired
        } else {
            // Keep only a short excerpt of the provider body for diagnostics
            let excerpt: String = body.chars().take(200).collect();
            CalendarError::ProviderApi { status, excerpt }
        }
    }
}
