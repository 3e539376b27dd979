// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use courier_client::capability::MetricsConfiguration;
use courier_client::errors::{CallError, TransportError};
use courier_client::transport::{ConnectionLimits, HttpTransport, ReqwestTransport};
use courier_client::{BeanRegistry, ClientCatalog, Registrar};
use courier_config::{ClientFragment, ClientProperties};

use common::{Payload, Remote};

fn remote_at(fragment: ClientFragment, beans: BeanRegistry) -> Arc<Remote> {
    Registrar::new(ClientProperties::new().with_client("remote", fragment))
        .with_beans(beans)
        .with_metrics(MetricsConfiguration { enabled: false })
        .register(&ClientCatalog::new().declare::<Remote>())
        .into_result()
        .expect("registers")
        .get::<Remote>()
        .expect("published")
}

#[tokio::test]
async fn test_post_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/echo"))
        .and(header("content-type", "application/json"))
        .and(header("X-Tenant", "acme"))
        .and(body_json(json!({"field": "ping"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"field": "pong"})))
        .expect(1)
        .mount(&server)
        .await;

    let remote = remote_at(
        ClientFragment::default()
            .with_url(&server.uri())
            .with_default_header("X-Tenant", "acme"),
        BeanRegistry::new(),
    );

    let reply = remote.call(Payload::new("ping")).await.expect("call succeeds");
    assert_eq!(reply, Payload::new("pong"));
}

#[tokio::test]
async fn test_path_query_and_static_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items/42"))
        .and(query_param("verbose", "true"))
        .and(header("X-Trace", "method"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42})))
        .expect(1)
        .mount(&server)
        .await;

    let remote = remote_at(
        ClientFragment::default().with_url(&server.uri()),
        BeanRegistry::new(),
    );

    let item = remote.item(42, true).await.expect("call succeeds");
    assert_eq!(item, json!({"id": 42}));
}

#[tokio::test]
async fn test_read_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"field": "late"}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let remote = remote_at(
        ClientFragment::default()
            .with_url(&server.uri())
            .with_read_timeout(200),
        BeanRegistry::new(),
    );

    let err = remote
        .call(Payload::new("p"))
        .await
        .expect_err("server is too slow");
    assert!(
        matches!(err, CallError::Transport(TransportError::Timeout(_))),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_read_timeout_covers_the_whole_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"field": "in time"}))
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&server)
        .await;

    let within = remote_at(
        ClientFragment::default()
            .with_url(&server.uri())
            .with_read_timeout(2_000),
        BeanRegistry::new(),
    );
    let reply = within
        .call(Payload::new("p"))
        .await
        .expect("response arrives before the deadline");
    assert_eq!(reply, Payload::new("in time"));

    // the deadline starts with the request, not with the first byte
    let past = remote_at(
        ClientFragment::default()
            .with_url(&server.uri())
            .with_read_timeout(50),
        BeanRegistry::new(),
    );
    let err = past
        .call(Payload::new("p"))
        .await
        .expect_err("deadline elapses first");
    assert!(
        matches!(err, CallError::Transport(TransportError::Timeout(_))),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_connection_refused() {
    // nothing listens on the discard port
    let remote = remote_at(
        ClientFragment::default()
            .with_url("http://127.0.0.1:9")
            .with_connect_timeout(500),
        BeanRegistry::new(),
    );

    let err = remote
        .call(Payload::new("p"))
        .await
        .expect_err("no server");
    assert!(matches!(err, CallError::Transport(_)), "unexpected error: {err:?}");
    assert!(err.is_retryable());
}

async fn redirecting_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items/1"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/items/2"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 2})))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_redirects_followed_by_default() {
    let server = redirecting_server().await;
    let remote = remote_at(
        ClientFragment::default().with_url(&server.uri()),
        BeanRegistry::new(),
    );

    let item = remote.item(1, false).await.expect("redirect is followed");
    assert_eq!(item, json!({"id": 2}));
}

#[tokio::test]
async fn test_redirects_not_followed() {
    let server = redirecting_server().await;
    let remote = remote_at(
        ClientFragment::default()
            .with_url(&server.uri())
            .with_follow_redirects(false),
        BeanRegistry::new(),
    );

    let err = remote.item(1, false).await.expect_err("redirect is surfaced");
    assert_eq!(err.status(), Some(302));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pool_exhaustion_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"field": "slow"}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(
        ConnectionLimits::default()
            .with_max_connections(1)
            .with_max_pending(0),
    );
    let remote = remote_at(
        ClientFragment::default().with_url(&server.uri()),
        BeanRegistry::new().with_default::<dyn HttpTransport>(Arc::new(transport)),
    );

    let first = {
        let remote = remote.clone();
        tokio::spawn(async move { remote.call(Payload::new("a")).await })
    };
    // let the first call take the only connection slot
    tokio::time::sleep(Duration::from_millis(100)).await;

    let err = remote
        .call(Payload::new("b"))
        .await
        .expect_err("no slot and no queue");
    assert!(
        matches!(err, CallError::ResourceExhausted(_)),
        "unexpected error: {err:?}"
    );

    let reply = first.await.expect("task joins").expect("first call succeeds");
    assert_eq!(reply, Payload::new("slow"));
}
