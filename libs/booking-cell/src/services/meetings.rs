// libs/booking-cell/src/services/meetings.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::{return_representation, SupabaseClient};

use crate::models::{BookingError, BookingRequest, BookingRequestStatus, Meeting};

/// Store access for meetings and their public booking requests.
pub struct MeetingService {
    supabase: Arc<SupabaseClient>,
}

impl MeetingService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn get_meeting(&self, meeting_id: Uuid) -> Result<Meeting, BookingError> {
        debug!("Fetching meeting {}", meeting_id);

        let path = format!("/rest/v1/meetings?id=eq.{}&limit=1", meeting_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| BookingError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(BookingError::MeetingNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::Database(format!("Failed to parse meeting: {}", e)))
    }

    /// Patch a meeting row and return the updated aggregate. `updated_at`
    /// is stamped here so callers never have to remember it.
    pub async fn update_meeting(
        &self,
        meeting_id: Uuid,
        mut update: serde_json::Map<String, Value>,
    ) -> Result<Meeting, BookingError> {
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/meetings?id=eq.{}", meeting_id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(Value::Object(update)),
                Some(return_representation()),
            )
            .await
            .map_err(|e| BookingError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(BookingError::MeetingNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::Database(format!("Failed to parse meeting: {}", e)))
    }

    pub async fn get_booking_request_by_token(
        &self,
        public_token: &str,
    ) -> Result<BookingRequest, BookingError> {
        let path = format!(
            "/rest/v1/booking_requests?public_token=eq.{}&limit=1",
            urlencoding::encode(public_token)
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| BookingError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(BookingError::RequestNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::Database(format!("Failed to parse booking request: {}", e)))
    }

    pub async fn update_booking_request_status(
        &self,
        request_id: Uuid,
        status: BookingRequestStatus,
    ) -> Result<(), BookingError> {
        debug!("Marking booking request {} as {}", request_id, status);

        let update = json!({
            "status": status,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let path = format!("/rest/v1/booking_requests?id=eq.{}", request_id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(update),
                Some(return_representation()),
            )
            .await
            .map_err(|e| BookingError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(BookingError::RequestNotFound);
        }

        Ok(())
    }
}
