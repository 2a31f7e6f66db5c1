//! Tests of the accessor over actual HTTP, against a local mock server

use std::time::{Duration, Instant};

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use osm_accessor::accessor::{fields, Fields};
use osm_accessor::credential::{LegacyCredential, OAuthCredential};
use osm_accessor::{Accessor, Cache, Credential, OsmError, TransportFailure};

fn legacy() -> Credential {
    Credential::Legacy(LegacyCredential::new("1", "tok").with_user("2", "sec"))
}

#[tokio::test]
async fn legacy_credentials_are_posted_and_answers_cached() {
    let _ = env_logger::builder().is_test(true).try_init();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api.php"))
        .and(query_param("action", "getTerms"))
        .and(body_string_contains("apiid=1"))
        .and(body_string_contains("secret=sec"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"15797": []})))
        .expect(1)
        .mount(&server)
        .await;

    let accessor = Accessor::new(&server.uri(), legacy(), Cache::in_memory()).unwrap();
    let first = accessor.call("api.php?action=getTerms", &Fields::new()).await.unwrap();
    let second = accessor.call("api.php?action=getTerms", &Fields::new()).await.unwrap();

    assert_eq!(first, json!({"15797": []}));
    assert_eq!(first, second);
    assert_eq!(accessor.cache_stats(), (1, 1));
}

#[tokio::test]
async fn error_strings_are_not_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("\"Invalid secret\""))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/programme.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "No access"})))
        .mount(&server)
        .await;

    let accessor = Accessor::new(&server.uri(), legacy(), Cache::in_memory()).unwrap();

    let query = fields(&[("sectionid", "15797")]);
    match accessor.call("api.php?action=getUserRoles", &query).await {
        Err(OsmError::MalformedResponse { url, fields, body }) => {
            assert!(url.ends_with("/api.php?action=getUserRoles"));
            assert_eq!(fields, query);
            assert_eq!(body, "\"Invalid secret\"");
        },
        other => panic!("expected a malformed response, got {:?}", other),
    }

    match accessor.call("programme.php?action=getProgrammeSummary", &query).await {
        Err(OsmError::Api { message, .. }) => assert_eq!(message, "No access"),
        other => panic!("expected an API error, got {:?}", other),
    }
}

#[tokio::test]
async fn csv_exports_are_returned_as_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ext/finances/onlinepayments/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("name,amount\nAlex,12.50\n"))
        .mount(&server)
        .await;

    let accessor = Accessor::new(&server.uri(), legacy(), Cache::in_memory()).unwrap();
    let text = accessor.call_text("ext/finances/onlinepayments/?action=exportCharges", &fields(&[("schedule", "3")])).await.unwrap();
    assert_eq!(text, "name,amount\nAlex,12.50\n");
}

#[tokio::test]
async fn oauth_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "abc", "expires_in": 3600})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api.php"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&server)
        .await;

    let credential = Credential::OAuth(OAuthCredential::new("client", "shh"));
    let accessor = Accessor::new(&server.uri(), credential, Cache::in_memory()).unwrap();
    accessor.call("api.php?action=getUserRoles", &Fields::new()).await.unwrap();
    accessor.call("api.php?action=getTerms", &Fields::new()).await.unwrap();
}

#[tokio::test]
async fn rate_limited_requests_are_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api.php"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let accessor = Accessor::new(&server.uri(), legacy(), Cache::in_memory()).unwrap();
    let start = Instant::now();
    let value = accessor.call("api.php?action=getTerms", &Fields::new()).await.unwrap();
    assert_eq!(value, json!({"ok": true}));
    assert!(start.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn rate_limit_budget_is_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .expect(2)
        .mount(&server)
        .await;

    let accessor = Accessor::new(&server.uri(), legacy(), Cache::in_memory()).unwrap();
    match accessor.call("api.php?action=getTerms", &Fields::new()).await {
        Err(OsmError::Transport { source: TransportFailure::RateLimitExhausted { attempts }, .. }) => assert_eq!(attempts, 2),
        other => panic!("expected the rate limit to win, got {:?}", other),
    }
}

#[tokio::test]
async fn cache_survives_a_restart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"sectionid": "1"}])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache_file = dir.path().join("osm.cache");

    let accessor = Accessor::new(&server.uri(), legacy(), Cache::new(&cache_file)).unwrap();
    accessor.call("api.php?action=getUserRoles", &Fields::new()).await.unwrap();
    accessor.save_cache().unwrap();

    let accessor = Accessor::new(&server.uri(), legacy(), Cache::from_file(&cache_file).unwrap()).unwrap();
    let roles = accessor.call("api.php?action=getUserRoles", &Fields::new()).await.unwrap();
    assert_eq!(roles, json!([{"sectionid": "1"}]));
}

#[tokio::test]
async fn server_errors_are_transport_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;

    let accessor = Accessor::new(&server.uri(), legacy(), Cache::in_memory()).unwrap();
    let err = accessor.call("api.php?action=getTerms", &Fields::new()).await.unwrap_err();
    assert!(err.is_transport());
    assert!(matches!(err, OsmError::Transport { source: TransportFailure::Status { status: 503, .. }, .. }));
}
