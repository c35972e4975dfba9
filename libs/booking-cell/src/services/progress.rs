// libs/booking-cell/src/services/progress.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use shared_database::supabase::{return_representation, SupabaseClient};

use crate::models::LogLevel;

/// Append-only audit trail for one lifecycle attempt. Entries share a run
/// id so operators can reconstruct a partial failure step by step. Writing
/// a log row must never sink the operation it describes, so failures here
/// degrade to a trace warning.
pub struct ProgressLogger {
    supabase: Arc<SupabaseClient>,
    meeting_id: Uuid,
    run_id: Uuid,
}

impl ProgressLogger {
    pub fn new(supabase: Arc<SupabaseClient>, meeting_id: Uuid) -> Self {
        Self {
            supabase,
            meeting_id,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub async fn info(&self, step: &str, message: &str) {
        self.log(step, LogLevel::Info, message, None).await;
    }

    pub async fn success(&self, step: &str, message: &str) {
        self.log(step, LogLevel::Success, message, None).await;
    }

    pub async fn warn(&self, step: &str, message: &str, details: Option<Value>) {
        self.log(step, LogLevel::Warn, message, details).await;
    }

    pub async fn error(&self, step: &str, message: &str, details: Option<Value>) {
        self.log(step, LogLevel::Error, message, details).await;
    }

    pub async fn log(&self, step: &str, level: LogLevel, message: &str, details: Option<Value>) {
        let entry = json!({
            "meeting_id": self.meeting_id,
            "run_id": self.run_id,
            "step": step,
            "level": level,
            "message": message,
            "details": details,
            "created_at": Utc::now().to_rfc3339(),
        });

        let result: Result<Vec<Value>, _> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/progress_log_entries",
                Some(entry),
                Some(return_representation()),
            )
            .await;

        if let Err(e) = result {
            warn!(
                "Failed to write progress log entry for meeting {} step {}: {}",
                self.meeting_id, step, e
            );
        }
    }
}
