use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use calendar_cell::models::{BusySource, CalendarConnection};
use calendar_cell::services::BusyFetcher;
use shared_config::AppConfig;

fn test_config(mock_uri: &str) -> AppConfig {
    AppConfig {
        supabase_url: mock_uri.to_string(),
        supabase_service_key: "test-service-key".to_string(),
        google_token_url: format!("{}/token", mock_uri),
        google_client_id: "test-client-id".to_string(),
        google_client_secret: "test-client-secret".to_string(),
        google_api_base: format!("{}/gcal", mock_uri),
        lawmatics_base_url: format!("{}/crm", mock_uri),
        lawmatics_api_token: "test-crm-token".to_string(),
    }
}

fn test_connection() -> CalendarConnection {
    let now = Utc::now();
    CalendarConnection {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        provider: "google".to_string(),
        access_token: "stored-access-token".to_string(),
        refresh_token: Some("stored-refresh-token".to_string()),
        token_expiry: now + Duration::hours(1),
        selected_calendar_ids: vec![],
        last_verification: None,
        created_at: now,
        updated_at: now,
    }
}

fn window() -> (DateTime<Utc>, DateTime<Utc>) {
    let start = "2030-01-15T00:00:00Z".parse().unwrap();
    let end = "2030-01-16T00:00:00Z".parse().unwrap();
    (start, end)
}

#[tokio::test]
async fn freebusy_periods_are_collected_across_calendars() {
    let mock_server = MockServer::start().await;
    let (start, end) = window();

    Mock::given(method("POST"))
        .and(path("/gcal/freeBusy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "calendars": {
                "primary": {
                    "busy": [
                        { "start": "2030-01-15T10:00:00Z", "end": "2030-01-15T11:00:00Z" }
                    ]
                },
                "team": {
                    "busy": [
                        { "start": "2030-01-15T14:00:00Z", "end": "2030-01-15T15:30:00Z" }
                    ]
                }
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = BusyFetcher::new(&test_config(&mock_server.uri()));
    let calendars = vec!["primary".to_string(), "team".to_string()];

    let intervals = fetcher
        .fetch_busy(&test_connection(), &calendars, start, end, BusySource::FreeBusy)
        .await
        .unwrap();

    assert_eq!(intervals.len(), 2);
}

#[tokio::test]
async fn provider_401_triggers_exactly_one_refresh_and_retry() {
    let mock_server = MockServer::start().await;
    let connection = test_connection();
    let (start, end) = window();

    // First free/busy attempt is rejected; the retry succeeds.
    Mock::given(method("POST"))
        .and(path("/gcal/freeBusy"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/gcal/freeBusy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "calendars": {
                "primary": {
                    "busy": [
                        { "start": "2030-01-15T09:00:00Z", "end": "2030-01-15T09:30:00Z" }
                    ]
                }
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access-token",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/calendar_connections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": connection.id,
            "user_id": connection.user_id,
            "provider": "google",
            "access_token": "fresh-access-token",
            "refresh_token": "stored-refresh-token",
            "token_expiry": (Utc::now() + Duration::hours(1)).to_rfc3339(),
            "selected_calendar_ids": [],
            "last_verification": null,
            "created_at": connection.created_at.to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339(),
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = BusyFetcher::new(&test_config(&mock_server.uri()));
    let calendars = vec!["primary".to_string()];

    let intervals = fetcher
        .fetch_busy(&connection, &calendars, start, end, BusySource::FreeBusy)
        .await
        .unwrap();

    assert_eq!(intervals.len(), 1);
}

#[tokio::test]
async fn events_derivation_skips_cancelled_and_transparent_and_expands_all_day() {
    let mock_server = MockServer::start().await;
    let (start, end) = window();

    Mock::given(method("GET"))
        .and(path("/gcal/calendars/work/events"))
        .and(query_param("singleEvents", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {
                    "id": "timed",
                    "status": "confirmed",
                    "start": { "dateTime": "2030-01-15T10:00:00Z" },
                    "end": { "dateTime": "2030-01-15T10:45:00Z" }
                },
                {
                    "id": "cancelled",
                    "status": "cancelled",
                    "start": { "dateTime": "2030-01-15T11:00:00Z" },
                    "end": { "dateTime": "2030-01-15T12:00:00Z" }
                },
                {
                    "id": "ooo-marker",
                    "status": "confirmed",
                    "transparency": "transparent",
                    "start": { "dateTime": "2030-01-15T13:00:00Z" },
                    "end": { "dateTime": "2030-01-15T14:00:00Z" }
                },
                {
                    "id": "all-day",
                    "status": "confirmed",
                    "start": { "date": "2030-01-15" },
                    "end": { "date": "2030-01-16" }
                }
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = BusyFetcher::new(&test_config(&mock_server.uri()));
    let calendars = vec!["work".to_string()];

    let intervals = fetcher
        .fetch_busy(
            &test_connection(),
            &calendars,
            start,
            end,
            BusySource::EventsDerived,
        )
        .await
        .unwrap();

    assert_eq!(intervals.len(), 2);

    let all_day = intervals
        .iter()
        .find(|interval| (interval.end - interval.start) == Duration::days(1))
        .expect("all-day event should expand to a full day");
    assert_eq!(all_day.start, start);
}
