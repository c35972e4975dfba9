use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use assert_matches::assert_matches;

use calendar_cell::models::{CalendarConnection, CalendarError};
use calendar_cell::services::TokenManager;
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

fn test_connection(expires_in: Duration) -> CalendarConnection {
    let now = Utc::now();
    CalendarConnection {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        provider: "google".to_string(),
        access_token: "stored-access-token".to_string(),
        refresh_token: Some("stored-refresh-token".to_string()),
        token_expiry: now + expires_in,
        selected_calendar_ids: vec![],
        last_verification: None,
        created_at: now,
        updated_at: now,
    }
}

fn connection_row(connection: &CalendarConnection, access_token: &str) -> serde_json::Value {
    json!({
        "id": connection.id,
        "user_id": connection.user_id,
        "provider": "google",
        "access_token": access_token,
        "refresh_token": "stored-refresh-token",
        "token_expiry": (Utc::now() + Duration::hours(1)).to_rfc3339(),
        "selected_calendar_ids": [],
        "last_verification": null,
        "created_at": connection.created_at.to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339(),
    })
}

#[tokio::test]
async fn fresh_token_is_returned_without_refresh() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let manager = TokenManager::new(&test_config(&mock_server.uri()));
    let connection = test_connection(Duration::hours(1));

    let (token, _) = manager.get_valid_token(&connection).await.unwrap();
    assert_eq!(token, "stored-access-token");
}

#[tokio::test]
async fn token_expiring_within_margin_is_refreshed() {
    let mock_server = MockServer::start().await;
    let connection = test_connection(Duration::minutes(2));

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access-token",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/calendar_connections"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([connection_row(&connection, "fresh-access-token")])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let manager = TokenManager::new(&test_config(&mock_server.uri()));

    let (token, updated) = manager.get_valid_token(&connection).await.unwrap();
    assert_eq!(token, "fresh-access-token");
    assert_eq!(updated.access_token, "fresh-access-token");
}

#[tokio::test]
async fn rejected_refresh_grant_surfaces_as_refresh_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
        })))
        .mount(&mock_server)
        .await;

    let manager = TokenManager::new(&test_config(&mock_server.uri()));
    let connection = test_connection(Duration::minutes(2));

    let result = manager.get_valid_token(&connection).await;
    assert_matches!(result, Err(CalendarError::TokenRefreshFailed(_)));
}

#[tokio::test]
async fn missing_refresh_credential_fails_without_network_calls() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let manager = TokenManager::new(&test_config(&mock_server.uri()));
    let mut connection = test_connection(Duration::minutes(2));
    connection.refresh_token = None;

    let result = manager.get_valid_token(&connection).await;
    assert_matches!(result, Err(CalendarError::TokenRefreshFailed(_)));
}
