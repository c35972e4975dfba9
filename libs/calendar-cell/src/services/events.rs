// libs/calendar-cell/src/services/events.rs
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;

use crate::models::{
    CalendarConnection, CalendarError, CalendarEventInput, CreatedEventResponse,
};
use crate::services::token::TokenManager;

pub struct CalendarEventService {
    client: Client,
    tokens: TokenManager,
    api_base: String,
}

impl CalendarEventService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            tokens: TokenManager::new(config),
            api_base: config.google_api_base.clone(),
        }
    }

    /// Create an event on the given calendar, inviting the listed attendees.
    /// Uses the same refresh-once-on-401 pattern as busy fetching.
    pub async fn create_event(
        &self,
        connection: &CalendarConnection,
        calendar_id: &str,
        input: &CalendarEventInput,
    ) -> Result<String, CalendarError> {
        let (token, connection) = self.tokens.get_valid_token(connection).await?;

        match self.create_event_once(&token, calendar_id, input).await {
            Err(CalendarError::AuthExpired) => {
                let (token, _) = self.tokens.refresh(&connection).await?;
                self.create_event_once(&token, calendar_id, input).await
            }
            other => other,
        }
    }

    async fn create_event_once(
        &self,
        token: &str,
        calendar_id: &str,
        input: &CalendarEventInput,
    ) -> Result<String, CalendarError> {
        let attendees: Vec<_> = input
            .attendee_emails
            .iter()
            .map(|email| json!({ "email": email }))
            .collect();

        let body = json!({
            "summary": input.summary,
            "description": input.description,
            "start": { "dateTime": input.start.to_rfc3339(), "timeZone": input.timezone },
            "end": { "dateTime": input.end.to_rfc3339(), "timeZone": input.timezone },
            "attendees": attendees,
        });

        let url = format!(
            "{}/calendars/{}/events?sendUpdates=all",
            self.api_base,
            urlencoding::encode(calendar_id)
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CalendarError::ProviderApi {
                status: 0,
                excerpt: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CalendarError::from_provider_status(status.as_u16(), &body));
        }

        let created: CreatedEventResponse = response.json().await.map_err(|e| {
            CalendarError::ProviderApi {
                status: status.as_u16(),
                excerpt: format!("Unparseable event response: {}", e),
            }
        })?;

        info!("Created calendar event {} on {}", created.id, calendar_id);
        Ok(created.id)
    }

    /// Delete an event. Already-gone events (404/410) count as success so
    /// cancellation cleanup stays idempotent.
    pub async fn delete_event(
        &self,
        connection: &CalendarConnection,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<(), CalendarError> {
        let (token, connection) = self.tokens.get_valid_token(connection).await?;

        match self.delete_event_once(&token, calendar_id, event_id).await {
            Err(CalendarError::AuthExpired) => {
                let (token, _) = self.tokens.refresh(&connection).await?;
                self.delete_event_once(&token, calendar_id, event_id).await
            }
            other => other,
        }
    }

    async fn delete_event_once(
        &self,
        token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<(), CalendarError> {
        let url = format!(
            "{}/calendars/{}/events/{}?sendUpdates=all",
            self.api_base,
            urlencoding::encode(calendar_id),
            urlencoding::encode(event_id)
        );
        let response = self
            .client
            .delete(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| CalendarError::ProviderApi {
                status: 0,
                excerpt: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() || status.as_u16() == 404 || status.as_u16() == 410 {
            debug!("Deleted calendar event {} on {}", event_id, calendar_id);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(CalendarError::from_provider_status(status.as_u16(), &body))
    }

    /// Count the calendars visible to this connection. Used by manual
    /// connection verification.
    pub async fn count_calendars(
        &self,
        connection: &CalendarConnection,
    ) -> Result<i32, CalendarError> {
        let (token, connection) = self.tokens.get_valid_token(connection).await?;

        match self.count_calendars_once(&token).await {
            Err(CalendarError::AuthExpired) => {
                let (token, _) = self.tokens.refresh(&connection).await?;
                self.count_calendars_once(&token).await
            }
            other => other,
        }
    }

    async fn count_calendars_once(&self, token: &str) -> Result<i32, CalendarError> {
        let url = format!("{}/users/me/calendarList?maxResults=250", self.api_base);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| CalendarError::ProviderApi {
                status: 0,
                excerpt: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CalendarError::from_provider_status(status.as_u16(), &body));
        }

        let listing: Value = response.json().await.map_err(|e| {
            CalendarError::ProviderApi {
                status: status.as_u16(),
                excerpt: format!("Unparseable calendar list: {}", e),
            }
        })?;

        let count = listing["items"]
            .as_array()
            .map(|items| items.len() as i32)
            .unwrap_or(0);
        Ok(count)
    }
}
