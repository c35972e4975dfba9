// libs/calendar-cell/src/services/token.rs
use chrono::{Duration, Utc};
use reqwest::Client;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::models::{CalendarConnection, CalendarError, TokenRefreshResponse};
use crate::services::connections::ConnectionService;

/// Tokens expiring within this margin are refreshed before use.
const EXPIRY_SAFETY_MARGIN_MINUTES: i64 = 5;

pub struct TokenManager {
    client: Client,
    connections: ConnectionService,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl TokenManager {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            connections: ConnectionService::new(config),
            token_url: config.google_token_url.clone(),
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
        }
    }

    /// Return a token valid for at least the safety margin, refreshing once
    /// if needed. The returned connection reflects any persisted refresh.
    pub async fn get_valid_token(
        &self,
        connection: &CalendarConnection,
    ) -> Result<(String, CalendarConnection), CalendarError> {
        let margin = Duration::minutes(EXPIRY_SAFETY_MARGIN_MINUTES);
        if connection.token_expiry > Utc::now() + margin {
            return Ok((connection.access_token.clone(), connection.clone()));
        }

        debug!(
            "Token for connection {} expires at {}, refreshing",
            connection.id, connection.token_expiry
        );
        self.refresh(connection).await
    }

    /// Perform exactly one refresh-grant exchange and persist the result
    /// before returning. Callers needing retry-after-401 re-invoke explicitly.
    pub async fn refresh(
        &self,
        connection: &CalendarConnection,
    ) -> Result<(String, CalendarConnection), CalendarError> {
        let refresh_token = connection
            .refresh_token
            .as_deref()
            .ok_or_else(|| {
                CalendarError::TokenRefreshFailed("No refresh credential stored".to_string())
            })?;

        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| CalendarError::TokenRefreshFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                "Token refresh rejected for connection {} ({}): {}",
                connection.id, status, body
            );
            let excerpt: String = body.chars().take(200).collect();
            return Err(CalendarError::TokenRefreshFailed(format!(
                "{}: {}",
                status, excerpt
            )));
        }

        let grant: TokenRefreshResponse = response
            .json()
            .await
            .map_err(|e| CalendarError::TokenRefreshFailed(e.to_string()))?;

        let expiry = Utc::now() + Duration::seconds(grant.expires_in);
        let updated = self
            .connections
            .update_tokens(
                connection.id,
                &grant.access_token,
                expiry,
                grant.refresh_token.as_deref(),
            )
            .await?;

        info!(
            "Refreshed token for connection {} (expires {})",
            connection.id, expiry
        );
        Ok((grant.access_token, updated))
    }
}
