use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub google_token_url: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_api_base: String,
    pub lawmatics_base_url: String,
    pub lawmatics_api_token: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            google_token_url: env::var("GOOGLE_TOKEN_URL")
                .unwrap_or_else(|_| "https://oauth2.googleapis.com/token".to_string()),
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .unwrap_or_else(|_| {
                    warn!("GOOGLE_CLIENT_ID not set, using empty value");
                    String::new()
                }),
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("GOOGLE_CLIENT_SECRET not set, using empty value");
                    String::new()
                }),
            google_api_base: env::var("GOOGLE_CALENDAR_API_BASE")
                .unwrap_or_else(|_| "https://www.googleapis.com/calendar/v3".to_string()),
            lawmatics_base_url: env::var("LAWMATICS_BASE_URL")
                .unwrap_or_else(|_| "https://api.lawmatics.com/v1".to_string()),
            lawmatics_api_token: env::var("LAWMATICS_API_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("LAWMATICS_API_TOKEN not set, CRM sync will be skipped");
                    String::new()
                }),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
    }

    pub fn is_calendar_configured(&self) -> bool {
        !self.google_client_id.is_empty() && !self.google_client_secret.is_empty()
    }

    pub fn is_crm_configured(&self) -> bool {
        !self.lawmatics_api_token.is_empty()
    }
}
