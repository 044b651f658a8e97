//! Integration tests for the API client against mocked endpoints
//!
//! These exercise status classification, ETag capture, the retry policy
//! and task polling over a real HTTP round-trip.

use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vela_client::{
    ApiClient, ApiDialect, ApiError, Credentials, Deadline, EntityRef, PollCadence,
    ReqwestTransport, Resolver, RetryPolicy, TaskError, wait_for_task, ETAG_KEY,
};

fn client_for(server: &MockServer, timeout: Duration) -> ApiClient {
    let transport = ReqwestTransport::new(
        Credentials::Basic {
            username: "admin".to_string(),
            password: "secret".to_string(),
        },
        true,
    )
    .unwrap();
    let base = Url::parse(&server.uri()).unwrap();
    ApiClient::new(Box::new(transport), base, Deadline::after(timeout)).with_retry(RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
    })
}

#[tokio::test]
async fn get_captures_etag_into_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/networking/v4/config/address-groups/AG1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"3:abc\"")
                .set_body_json(json!({"data": {"extId": "AG1", "name": "g1"}})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(10));
    let body = client
        .get("/api/networking/v4/config/address-groups/AG1", &[])
        .await
        .unwrap();
    assert_eq!(body[ETAG_KEY], json!("\"3:abc\""));
    assert_eq!(body["data"]["name"], json!("g1"));
}

#[tokio::test]
async fn statuses_map_to_error_kinds() {
    let server = MockServer::start().await;
    for (route, status) in [
        ("/auth", 401),
        ("/missing", 404),
        ("/stale", 412),
        ("/bad", 422),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({"message": "no"})))
            .mount(&server)
            .await;
    }

    let client = client_for(&server, Duration::from_secs(10));
    assert_eq!(client.get("/auth", &[]).await.unwrap_err().kind(), "AuthError");
    assert_eq!(client.get("/missing", &[]).await.unwrap_err().kind(), "NotFound");
    assert_eq!(client.get("/stale", &[]).await.unwrap_err().kind(), "Conflict");
    assert_eq!(
        client.get("/bad", &[]).await.unwrap_err().kind(),
        "ValidationError"
    );
}

#[tokio::test]
async fn get_retries_transient_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(10));
    let body = client.get("/flaky", &[]).await.unwrap();
    assert_eq!(body["ok"], json!(true));
}

#[tokio::test]
async fn post_is_never_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/things"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(10));
    let err = client.post("/things", &json!({"name": "x"})).await.unwrap_err();
    assert_eq!(err.kind(), "ServerError");
    server.verify().await;
}

#[tokio::test]
async fn rate_limit_honors_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(10));
    let body = client.get("/busy", &[]).await.unwrap();
    assert_eq!(body["ok"], json!(true));
}

#[tokio::test]
async fn delete_sends_if_match_header() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/networking/v4/config/address-groups/AG1"))
        .and(header("If-Match", "\"3:abc\""))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "data": {"extId": "T1", "$objectType": "prism.v4.config.TaskReference"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(10));
    let body = client
        .delete("/api/networking/v4/config/address-groups/AG1", Some("\"3:abc\""))
        .await
        .unwrap();
    assert_eq!(body["data"]["extId"], json!("T1"));
    server.verify().await;
}

#[tokio::test]
async fn task_polling_reaches_terminal_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/prism/v4/config/tasks/T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"extId": "T1", "status": "RUNNING"}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/prism/v4/config/tasks/T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "extId": "T1",
                "status": "SUCCEEDED",
                "entitiesAffected": [{"extId": "E1", "rel": "networking:config:address-group"}]
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(10));
    let cadence = PollCadence {
        initial: Duration::from_millis(5),
        cap: Duration::from_millis(20),
    };
    let handle = wait_for_task(
        &client,
        "/api/prism/v4/config/tasks",
        "T1",
        cadence,
        Deadline::after(Duration::from_secs(5)),
    )
    .await
    .unwrap();
    assert_eq!(
        handle.entity_for_rel("networking:config:address-group"),
        Some("E1")
    );
}

#[tokio::test]
async fn deadline_shorter_than_first_interval_polls_zero_times() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/prism/v4/config/tasks/T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"extId": "T2", "status": "RUNNING"}
        })))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(10));
    let cadence = PollCadence {
        initial: Duration::from_secs(2),
        cap: Duration::from_secs(10),
    };
    let err = wait_for_task(
        &client,
        "/api/prism/v4/config/tasks",
        "T2",
        cadence,
        Deadline::after(Duration::from_millis(50)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, TaskError::Timeout { last: None }));
    server.verify().await;
}

#[tokio::test]
async fn failed_task_surfaces_error_messages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/prism/v4/config/tasks/T3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "extId": "T3",
                "status": "FAILED",
                "errorMessages": [{"message": "address space exhausted"}]
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(10));
    let cadence = PollCadence {
        initial: Duration::from_millis(5),
        cap: Duration::from_millis(20),
    };
    let err = wait_for_task(
        &client,
        "/api/prism/v4/config/tasks",
        "T3",
        cadence,
        Deadline::after(Duration::from_secs(5)),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "TaskFailed");
    assert!(err.to_string().contains("address space exhausted"));
}

#[tokio::test]
async fn resolver_finds_unique_name_and_memoizes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/networking/v4/config/address-groups"))
        .and(query_param("$filter", "name eq 'g1'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"extId": "AG1", "name": "g1"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(10));
    let resolver = Resolver::new();
    let entity = EntityRef {
        name: Some("g1".to_string()),
        ext_id: None,
    };

    for _ in 0..2 {
        let ext_id = resolver
            .resolve(
                &client,
                ApiDialect::V4,
                "/api/networking/v4/config/address-groups",
                "address_group",
                &entity,
            )
            .await
            .unwrap();
        assert_eq!(ext_id, "AG1");
    }
    server.verify().await;
}

#[tokio::test]
async fn resolver_rejects_ambiguous_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/networking/v4/config/address-groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"extId": "AG1"}, {"extId": "AG2"}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(10));
    let resolver = Resolver::new();
    let entity = EntityRef {
        name: Some("dup".to_string()),
        ext_id: None,
    };

    let err = resolver
        .resolve(
            &client,
            ApiDialect::V4,
            "/api/networking/v4/config/address-groups",
            "address_group",
            &entity,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "ResolutionError");
    assert!(err.to_string().contains("dup"));
}

#[tokio::test]
async fn stalled_response_fails_at_the_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ok": true}))
                .set_delay(Duration::from_millis(1500)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_millis(200));
    let started = std::time::Instant::now();
    let err = client.get("/slow", &[]).await.unwrap_err();
    assert!(matches!(err, ApiError::DeadlineExceeded));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn expired_deadline_fails_before_sending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/anything"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_millis(0));
    tokio::time::sleep(Duration::from_millis(5)).await;
    let err = client.get("/anything", &[]).await.unwrap_err();
    assert!(matches!(err, ApiError::DeadlineExceeded));
    server.verify().await;
}
