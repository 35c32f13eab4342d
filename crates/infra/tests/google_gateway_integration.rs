//! Wiremock integration tests for the Google Calendar gateway: optimistic
//! concurrency, pagination, idempotency lookup, and auth failure mapping.

use chrono::{TimeZone, Utc};
use voxcal_core::CalendarGateway;
use voxcal_domain::{EventDraft, EventPatch, TimeRange, TimeSpec, VoxCalError};
use voxcal_infra::config::GoogleConfig;
use voxcal_infra::integrations::google::{GoogleAuthManager, GoogleCalendarGateway};
use voxcal_infra::HttpClient;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn google_config() -> GoogleConfig {
    GoogleConfig {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        refresh_token: "refresh-token".to_string(),
    }
}

async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-token",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

fn gateway(server: &MockServer) -> GoogleCalendarGateway {
    let http = HttpClient::builder().max_attempts(1).build().expect("http client");
    let auth = GoogleAuthManager::new(&google_config(), http.clone())
        .with_token_endpoint(format!("{}/token", server.uri()));
    GoogleCalendarGateway::new(http, auth, "primary").with_api_base(server.uri())
}

fn wire_event(id: &str, etag: &str, summary: &str, start: &str, end: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "etag": etag,
        "summary": summary,
        "start": { "dateTime": start },
        "end": { "dateTime": end }
    })
}

#[tokio::test]
async fn create_sends_idempotency_key_and_maps_event() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .and(header("authorization", "Bearer access-token"))
        .and(body_partial_json(serde_json::json!({
            "summary": "Call with Maria",
            "extendedProperties": { "private": { "voxcalIdempotencyKey": "key-123" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(wire_event(
            "evt-1",
            "\"etag-1\"",
            "Call with Maria",
            "2024-06-11T14:00:00-04:00",
            "2024-06-11T15:00:00-04:00",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let draft = EventDraft {
        title: "Call with Maria".to_string(),
        description: None,
        start: Utc.with_ymd_and_hms(2024, 6, 11, 18, 0, 0).single().expect("valid"),
        end: Utc.with_ymd_and_hms(2024, 6, 11, 19, 0, 0).single().expect("valid"),
        attendees: vec![],
        timezone: Some("America/New_York".to_string()),
    };

    let created = gateway(&server).create(&draft, Some("key-123")).await.expect("create");
    assert_eq!(created.id, "evt-1");
    assert_eq!(created.version, "\"etag-1\"");
    assert_eq!(created.start, Utc.with_ymd_and_hms(2024, 6, 11, 18, 0, 0).single().expect("valid"));
}

#[tokio::test]
async fn stale_version_update_maps_to_conflict() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("PATCH"))
        .and(path("/calendars/primary/events/evt-1"))
        .and(header("if-match", "\"etag-stale\""))
        .respond_with(ResponseTemplate::new(412).set_body_string("Precondition Failed"))
        .mount(&server)
        .await;

    let patch = EventPatch {
        start: Some(TimeSpec::Absolute(
            Utc.with_ymd_and_hms(2024, 6, 12, 18, 0, 0).single().expect("valid"),
        )),
        ..Default::default()
    };

    let result = gateway(&server).update("evt-1", &patch, "\"etag-stale\"").await;
    assert!(matches!(result, Err(VoxCalError::Conflict(_))), "got: {result:?}");
}

#[tokio::test]
async fn stale_version_delete_maps_to_conflict() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("DELETE"))
        .and(path("/calendars/primary/events/evt-1"))
        .and(header("if-match", "\"etag-stale\""))
        .respond_with(ResponseTemplate::new(412))
        .mount(&server)
        .await;

    let result = gateway(&server).delete("evt-1", "\"etag-stale\"").await;
    assert!(matches!(result, Err(VoxCalError::Conflict(_))));
}

#[tokio::test]
async fn delete_succeeds_on_no_content() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("DELETE"))
        .and(path("/calendars/primary/events/evt-1"))
        .and(header("if-match", "\"etag-1\""))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    gateway(&server).delete("evt-1", "\"etag-1\"").await.expect("delete should succeed");
}

#[tokio::test]
async fn query_passes_page_token_and_returns_next() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .and(query_param("singleEvents", "true"))
        .and(query_param("orderBy", "startTime"))
        .and(query_param("pageToken", "cursor-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [wire_event(
                "evt-2",
                "\"etag-2\"",
                "Standup",
                "2024-06-10T09:30:00-04:00",
                "2024-06-10T09:45:00-04:00",
            )],
            "nextPageToken": "cursor-2"
        })))
        .mount(&server)
        .await;

    let range = TimeRange::new(
        Utc.with_ymd_and_hms(2024, 6, 10, 4, 0, 0).single().expect("valid"),
        Utc.with_ymd_and_hms(2024, 6, 11, 4, 0, 0).single().expect("valid"),
    );

    let page = gateway(&server).query(range, None, Some("cursor-1")).await.expect("query");
    assert_eq!(page.events.len(), 1);
    assert_eq!(page.events[0].title, "Standup");
    assert_eq!(page.next_page_token.as_deref(), Some("cursor-2"));
}

#[tokio::test]
async fn query_skips_unreadable_events() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                wire_event(
                    "evt-good",
                    "\"etag-1\"",
                    "Standup",
                    "2024-06-10T09:30:00-04:00",
                    "2024-06-10T09:45:00-04:00",
                ),
                { "id": "evt-bad", "etag": "\"etag-2\"", "start": {}, "end": {} }
            ]
        })))
        .mount(&server)
        .await;

    let range = TimeRange::new(
        Utc.with_ymd_and_hms(2024, 6, 10, 4, 0, 0).single().expect("valid"),
        Utc.with_ymd_and_hms(2024, 6, 11, 4, 0, 0).single().expect("valid"),
    );

    let page = gateway(&server).query(range, None, None).await.expect("query");
    assert_eq!(page.events.len(), 1);
    assert_eq!(page.events[0].id, "evt-good");
}

#[tokio::test]
async fn idempotency_lookup_finds_existing_event() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .and(query_param("privateExtendedProperty", "voxcalIdempotencyKey=key-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [wire_event(
                "evt-1",
                "\"etag-1\"",
                "Call with Maria",
                "2024-06-11T14:00:00-04:00",
                "2024-06-11T15:00:00-04:00",
            )]
        })))
        .mount(&server)
        .await;

    let found = gateway(&server).find_by_idempotency_key("key-123").await.expect("lookup");
    assert_eq!(found.expect("event should exist").id, "evt-1");
}

#[tokio::test]
async fn idempotency_lookup_returns_none_when_absent() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "items": [] })))
        .mount(&server)
        .await;

    let found = gateway(&server).find_by_idempotency_key("key-404").await.expect("lookup");
    assert!(found.is_none());
}

#[tokio::test]
async fn primary_timezone_reads_calendar_metadata() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/calendars/primary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "primary",
            "timeZone": "America/New_York"
        })))
        .mount(&server)
        .await;

    let zone = gateway(&server).primary_timezone().await.expect("timezone");
    assert_eq!(zone, "America/New_York");
}

#[tokio::test]
async fn revoked_token_maps_to_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&server)
        .await;

    let range = TimeRange::new(
        Utc.with_ymd_and_hms(2024, 6, 10, 4, 0, 0).single().expect("valid"),
        Utc.with_ymd_and_hms(2024, 6, 11, 4, 0, 0).single().expect("valid"),
    );

    let result = gateway(&server).query(range, None, None).await;
    assert!(matches!(result, Err(VoxCalError::Auth(_))));
}

#[tokio::test]
async fn forbidden_api_call_maps_to_auth_error() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(403).set_body_string("insufficient scope"))
        .mount(&server)
        .await;

    let range = TimeRange::new(
        Utc.with_ymd_and_hms(2024, 6, 10, 4, 0, 0).single().expect("valid"),
        Utc.with_ymd_and_hms(2024, 6, 11, 4, 0, 0).single().expect("valid"),
    );

    let result = gateway(&server).query(range, None, None).await;
    assert!(matches!(result, Err(VoxCalError::Auth(_))));
}
