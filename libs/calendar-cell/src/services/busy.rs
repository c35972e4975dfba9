// libs/calendar-cell/src/services/busy.rs
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::models::{
    BusyInterval, BusySource, CalendarConnection, CalendarError, EventsListResponse,
    FreeBusyResponse,
};
use crate::services::token::TokenManager;

pub struct BusyFetcher {
    client: Client,
    tokens: TokenManager,
    api_base: String,
}

impl BusyFetcher {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            tokens: TokenManager::new(config),
            api_base: config.google_api_base.clone(),
        }
    }

    /// Fetch busy intervals for the given calendars over [start, end).
    ///
    /// On a 401-class response the token is refreshed once and the call
    /// retried once; any other non-2xx is surfaced without retry. Output is
    /// aggregated across calendars and normalized to UTC.
    pub async fn fetch_busy(
        &self,
        connection: &CalendarConnection,
        calendar_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        source: BusySource,
    ) -> Result<Vec<BusyInterval>, CalendarError> {
        let (token, connection) = self.tokens.get_valid_token(connection).await?;

        match self
            .fetch_busy_once(&token, calendar_ids, start, end, source)
            .await
        {
            Err(CalendarError::AuthExpired) => {
                debug!(
                    "Provider rejected token for connection {}, refreshing and retrying once",
                    connection.id
                );
                let (token, _) = self.tokens.refresh(&connection).await?;
                self.fetch_busy_once(&token, calendar_ids, start, end, source)
                    .await
            }
            other => other,
        }
    }

    async fn fetch_busy_once(
        &self,
        token: &str,
        calendar_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        source: BusySource,
    ) -> Result<Vec<BusyInterval>, CalendarError> {
        match source {
            BusySource::FreeBusy => self.query_freebusy(token, calendar_ids, start, end).await,
            BusySource::EventsDerived => {
                let mut intervals = Vec::new();
                for calendar_id in calendar_ids {
                    let derived = self
                        .derive_from_events(token, calendar_id, start, end)
                        .await?;
                    intervals.extend(derived);
                }
                Ok(intervals)
            }
        }
    }

    async fn query_freebusy(
        &self,
        token: &str,
        calendar_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, CalendarError> {
        let items: Vec<_> = calendar_ids.iter().map(|id| json!({ "id": id })).collect();
        let body = json!({
            "timeMin": start.to_rfc3339(),
            "timeMax": end.to_rfc3339(),
            "items": items,
        });

        let url = format!("{}/freeBusy", self.api_base);
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

        let parsed: FreeBusyResponse = response.json().await.map_err(|e| {
            CalendarError::ProviderApi {
                status: status.as_u16(),
                excerpt: format!("Unparseable free/busy response: {}", e),
            }
        })?;

        let mut intervals = Vec::new();
        for (calendar_id, calendar) in parsed.calendars {
            if !calendar.errors.is_empty() {
                warn!(
                    "Free/busy lookup reported {} error(s) for calendar {}",
                    calendar.errors.len(),
                    calendar_id
                );
            }
            for period in calendar.busy {
                if period.start < period.end {
                    intervals.push(BusyInterval::new(period.start, period.end));
                }
            }
        }

        debug!("Free/busy query returned {} intervals", intervals.len());
        Ok(intervals)
    }

    /// Derive busy intervals from an events listing. Cancelled and transparent
    /// events are ignored; all-day events expand to full-day intervals.
    async fn derive_from_events(
        &self,
        token: &str,
        calendar_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, CalendarError> {
        let mut intervals = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!(
                "{}/calendars/{}/events?timeMin={}&timeMax={}&singleEvents=true&maxResults=2500",
                self.api_base,
                urlencoding::encode(calendar_id),
                urlencoding::encode(&start.to_rfc3339()),
                urlencoding::encode(&end.to_rfc3339()),
            );
            if let Some(ref token_value) = page_token {
                url.push_str(&format!("&pageToken={}", urlencoding::encode(token_value)));
            }

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

            let page: EventsListResponse = response.json().await.map_err(|e| {
                CalendarError::ProviderApi {
                    status: status.as_u16(),
                    excerpt: format!("Unparseable events response: {}", e),
                }
            })?;

            for event in &page.items {
                if event.status.as_deref() == Some("cancelled") {
                    continue;
                }
                if event.transparency.as_deref() == Some("transparent") {
                    continue;
                }

                let (Some(event_start), Some(event_end)) = (&event.start, &event.end) else {
                    continue;
                };

                let interval = match (event_start.date_time, event_end.date_time) {
                    (Some(s), Some(e)) => Some((s, e)),
                    _ => match (event_start.date, event_end.date) {
                        // All-day events carry dates only; expand to full days.
                        (Some(start_date), Some(end_date)) => {
                            let s = start_date.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
                            let e = end_date.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
                            match (s, e) {
                                (Some(s), Some(e)) if s < e => Some((s, e)),
                                (Some(s), _) => Some((s, s + Duration::days(1))),
                                _ => None,
                            }
                        }
                        _ => None,
                    },
                };

                if let Some((s, e)) = interval {
                    if s < e {
                        intervals.push(BusyInterval::new(s, e));
                    }
                }
            }

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        debug!(
            "Derived {} busy intervals from events on {}",
            intervals.len(),
            calendar_id
        );
        Ok(intervals)
    }
}
