// libs/calendar-cell/src/services/connections.rs
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};

use crate::models::{CalendarConnection, CalendarError, VerificationOutcome};

pub struct ConnectionService {
    supabase: SupabaseClient,
}

impl ConnectionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Fetch the active connection for a (user, provider) pair.
    pub async fn get_connection(
        &self,
        user_id: Uuid,
        provider: &str,
    ) -> Result<CalendarConnection, CalendarError> {
        debug!("Fetching {} connection for user {}", provider, user_id);

        let path = format!(
            "/rest/v1/calendar_connections?user_id=eq.{}&provider=eq.{}&limit=1",
            user_id, provider
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| CalendarError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(CalendarError::NoConnection);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| CalendarError::Database(format!("Failed to parse connection: {}", e)))
    }

    /// Persist refreshed credentials. A single PATCH keeps the row consistent:
    /// the new access token, expiry and rotated refresh token land together.
    pub async fn update_tokens(
        &self,
        connection_id: Uuid,
        access_token: &str,
        token_expiry: DateTime<Utc>,
        rotated_refresh_token: Option<&str>,
    ) -> Result<CalendarConnection, CalendarError> {
        debug!("Persisting refreshed tokens for connection {}", connection_id);

        let mut update = serde_json::Map::new();
        update.insert("access_token".to_string(), json!(access_token));
        update.insert("token_expiry".to_string(), json!(token_expiry.to_rfc3339()));
        if let Some(refresh) = rotated_refresh_token {
            update.insert("refresh_token".to_string(), json!(refresh));
        }
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/calendar_connections?id=eq.{}", connection_id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(Value::Object(update)),
                Some(return_representation()),
            )
            .await
            .map_err(|e| CalendarError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(CalendarError::Database(
                "Connection row vanished during token update".to_string(),
            ));
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| CalendarError::Database(format!("Failed to parse connection: {}", e)))
    }

    /// Record the outcome of a manual verification run.
    pub async fn record_verification(
        &self,
        connection_id: Uuid,
        outcome: &VerificationOutcome,
    ) -> Result<(), CalendarError> {
        let update = json!({
            "last_verification": outcome,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let path = format!("/rest/v1/calendar_connections?id=eq.{}", connection_id);
        let _: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(update),
                Some(return_representation()),
            )
            .await
            .map_err(|e| CalendarError::Database(e.to_string()))?;

        Ok(())
    }

    /// Remove a connection on disconnect or user deletion.
    pub async fn delete_connection(&self, connection_id: Uuid) -> Result<(), CalendarError> {
        debug!("Deleting connection {}", connection_id);

        let path = format!("/rest/v1/calendar_connections?id=eq.{}", connection_id);
        let _: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::DELETE,
                &path,
                None,
                Some(return_representation()),
            )
            .await
            .map_err(|e| CalendarError::Database(e.to_string()))?;

        Ok(())
    }
}
