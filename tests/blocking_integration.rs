//! The blocking client must work from plain synchronous code.

use infinity_stats::{BotStats, ClientConfig, RetryPolicy, SyncInfinityClient};
use serde_json::json;
use std::time::Duration;
use tokio::runtime::Runtime;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mock_server(runtime: &Runtime) -> MockServer {
    let server = runtime.block_on(MockServer::start());
    runtime.block_on(
        Mock::given(method("POST"))
            .and(path("/bots/123456789/stats"))
            .and(body_json(json!({"servers": 250, "users": 9000})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server),
    );
    runtime.block_on(
        Mock::given(method("GET"))
            .and(path("/bots/123456789"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-RateLimit-Remaining", "42")
                    .set_body_json(json!({"bot_id": "123456789"})),
            )
            .expect(1)
            .mount(&server),
    );
    runtime.block_on(
        Mock::given(method("GET"))
            .and(path("/users/99"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Not Found"})))
            .expect(1)
            .mount(&server),
    );
    server
}

#[test]
fn blocking_client_round_trips_through_mock_api() {
    let _ = env_logger::try_init();
    let runtime = Runtime::new().unwrap();
    let server = mock_server(&runtime);

    let client = SyncInfinityClient::with_config(
        ClientConfig::new("test_token", "123456789")
            .with_base_url(server.uri())
            .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(10))),
    )
    .unwrap();

    let posted = client
        .post_bot_stats(BotStats::new(250).with_users(9000))
        .unwrap();
    assert_eq!(posted, json!({"success": true}));

    let info = client.get_bot_info().unwrap();
    assert_eq!(info, json!({"bot_id": "123456789"}));
    assert_eq!(client.get_rate_limit_info().remaining, 42);

    let err = client.get_user_info("99").unwrap_err();
    assert_eq!(err.status_code(), Some(404));

    // Each call runs in its own session, so nothing stays open in between.
    assert!(!client.client().is_session_open());
    assert!(!client.client().is_auto_refresh_running());
    assert!(client.get_auto_refresh_info().has_stats_cached);

    drop(client);
    runtime.block_on(server.verify());
}
