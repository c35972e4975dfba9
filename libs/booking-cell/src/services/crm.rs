// libs/booking-cell/src/services/crm.rs
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;

/// Lawmatics REST client used for post-booking CRM sync. Every call here
/// is best-effort from the booking flow's point of view; the caller turns
/// failures into warnings rather than aborting.
pub struct LawmaticsClient {
    client: Client,
    base_url: String,
    api_token: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CrmError {
    #[error("CRM not configured")]
    NotConfigured,

    #[error("CRM API error ({status}): {excerpt}")]
    Api { status: u16, excerpt: String },

    #[error("CRM request failed: {0}")]
    Transport(String),
}

impl CrmError {
    fn from_status(status: u16, body: &str) -> Self {
        let excerpt: String = body.chars().take(200).collect();
        CrmError::Api { status, excerpt }
    }
}

impl LawmaticsClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.lawmatics_base_url.clone(),
            api_token: config.lawmatics_api_token.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_token.is_empty()
    }

    /// Look up a contact by email. Returns None when no match exists.
    pub async fn find_contact_by_email(&self, email: &str) -> Result<Option<String>, CrmError> {
        let url = format!(
            "{}/contacts?email={}",
            self.base_url,
            urlencoding::encode(email)
        );
        let body = self.get(&url).await?;

        let id = body["data"]
            .as_array()
            .and_then(|contacts| contacts.first())
            .and_then(|contact| contact["id"].as_str())
            .map(|id| id.to_string());

        debug!(
            "CRM contact lookup for {}: {}",
            email,
            if id.is_some() { "found" } else { "not found" }
        );
        Ok(id)
    }

    pub async fn create_contact(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> Result<String, CrmError> {
        let (first_name, last_name) = split_name(name);
        let payload = json!({
            "email": email,
            "first_name": first_name,
            "last_name": last_name,
        });

        let url = format!("{}/contacts", self.base_url);
        let body = self.post(&url, &payload).await?;
        let id = extract_id(&body)?;

        info!("Created CRM contact {} for {}", id, email);
        Ok(id)
    }

    pub async fn create_matter(
        &self,
        contact_id: &str,
        matter_name: &str,
    ) -> Result<String, CrmError> {
        let payload = json!({
            "contact_id": contact_id,
            "name": matter_name,
        });

        let url = format!("{}/matters", self.base_url);
        let body = self.post(&url, &payload).await?;
        let id = extract_id(&body)?;

        info!("Created CRM matter {} for contact {}", id, contact_id);
        Ok(id)
    }

    pub async fn create_appointment(
        &self,
        contact_id: &str,
        matter_id: Option<&str>,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<String, CrmError> {
        let mut payload = json!({
            "contact_id": contact_id,
            "name": name,
            "starts_at": start.to_rfc3339(),
            "ends_at": end.to_rfc3339(),
        });
        if let Some(matter_id) = matter_id {
            payload["matter_id"] = json!(matter_id);
        }

        let url = format!("{}/appointments", self.base_url);
        let body = self.post(&url, &payload).await?;
        let id = extract_id(&body)?;

        info!("Created CRM appointment {} for contact {}", id, contact_id);
        Ok(id)
    }

    async fn get(&self, url: &str) -> Result<Value, CrmError> {
        if !self.is_configured() {
            return Err(CrmError::NotConfigured);
        }

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| CrmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CrmError::from_status(status.as_u16(), &body));
        }

        response
            .json()
            .await
            .map_err(|e| CrmError::Transport(format!("Unparseable CRM response: {}", e)))
    }

    async fn post(&self, url: &str, payload: &Value) -> Result<Value, CrmError> {
        if !self.is_configured() {
            return Err(CrmError::NotConfigured);
        }

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_token)
            .json(payload)
            .send()
            .await
            .map_err(|e| CrmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CrmError::from_status(status.as_u16(), &body));
        }

        response
            .json()
            .await
            .map_err(|e| CrmError::Transport(format!("Unparseable CRM response: {}", e)))
    }
}

fn extract_id(body: &Value) -> Result<String, CrmError> {
    body["data"]["id"]
        .as_str()
        .or_else(|| body["id"].as_str())
        .map(|id| id.to_string())
        .ok_or_else(|| CrmError::Transport("CRM response missing id".to_string()))
}

fn split_name(name: Option<&str>) -> (String, String) {
    match name {
        Some(full) => match full.split_once(' ') {
            Some((first, last)) => (first.to_string(), last.to_string()),
            None => (full.to_string(), String::new()),
        },
        None => ("Unknown".to_string(), String::new()),
    }
}
