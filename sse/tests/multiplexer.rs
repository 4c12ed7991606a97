mod common;

use common::{wait_until, Inbox, TestServer};
use sse::error::resolve_error;
use sse::{
    ConnectionBuilder, ConnectionConfig, ConnectionRegistry, ConnectionStatus, Headers,
    SubscriptionHandle, SubscriptionOptions,
};
use std::sync::Arc;
use std::time::Duration;

fn builder() -> ConnectionBuilder {
    ConnectionBuilder::http(
        ConnectionConfig::new().with_reconnect_delay(Duration::from_millis(50)),
    )
    .unwrap()
}

fn tenant_headers() -> Headers {
    Headers::from([("x-tenant".to_string(), "acme".to_string())])
}

#[tokio::test]
async fn test_subscribers_share_one_request_and_see_events_in_order() {
    let server = TestServer::start().await;
    let registry = Arc::new(ConnectionRegistry::new());
    let builder = builder();
    let (first, second) = (Inbox::default(), Inbox::default());

    let a = SubscriptionHandle::new(
        registry.clone(),
        builder.clone(),
        SubscriptionOptions::new(server.url("orders")).with_headers(tenant_headers()),
        first.handler(),
    );
    let b = SubscriptionHandle::new(
        registry.clone(),
        builder,
        SubscriptionOptions::new(server.url("orders")).with_headers(tenant_headers()),
        second.handler(),
    );
    wait_until(|| a.status() == ConnectionStatus::Connected).await;
    assert_eq!(b.status(), ConnectionStatus::Connected);

    for n in 1..=3 {
        server.send("orders", "order", &format!("{{\"n\":{n}}}"), &n.to_string());
    }
    wait_until(|| first.len() == 3 && second.len() == 3).await;

    assert_eq!(first.ids(), vec!["1", "2", "3"]);
    assert_eq!(first.data(), second.data());
    assert_eq!(registry.len(), 1);
    assert_eq!(server.request_count("orders"), 1);

    let request = &server.requests_for("orders")[0];
    assert_eq!(request.get("accept").unwrap(), "text/event-stream");
    assert_eq!(request.get("x-tenant").unwrap(), "acme");

    registry.clear();
}

#[tokio::test]
async fn test_remove_stops_delivery() {
    let server = TestServer::start().await;
    let registry = Arc::new(ConnectionRegistry::new());
    let inbox = Inbox::default();

    let handle = SubscriptionHandle::new(
        registry.clone(),
        builder(),
        SubscriptionOptions::new(server.url("alerts")),
        inbox.handler(),
    );
    wait_until(|| handle.status() == ConnectionStatus::Connected).await;

    server.send("alerts", "alert", "before", "1");
    wait_until(|| inbox.len() == 1).await;

    registry.remove(&server.url("alerts"));
    assert_eq!(handle.status(), ConnectionStatus::Idle);

    server.send("alerts", "alert", "after", "2");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(inbox.data(), vec!["before"]);
}

#[tokio::test]
async fn test_clear_disconnects_every_url() {
    let server = TestServer::start().await;
    let registry = Arc::new(ConnectionRegistry::new());
    let builder = builder();

    let handles: Vec<SubscriptionHandle> = ["orders", "alerts"]
        .iter()
        .map(|feed| {
            SubscriptionHandle::new(
                registry.clone(),
                builder.clone(),
                SubscriptionOptions::new(server.url(feed)),
                |_| {},
            )
        })
        .collect();
    wait_until(|| {
        handles
            .iter()
            .all(|handle| handle.status() == ConnectionStatus::Connected)
    })
    .await;
    assert_eq!(registry.len(), 2);

    registry.clear();

    assert!(registry.is_empty());
    assert!(handles
        .iter()
        .all(|handle| handle.status() == ConnectionStatus::Idle));
}

#[tokio::test]
async fn test_server_finishing_stream_does_not_reconnect() {
    let server = TestServer::start().await;
    let registry = Arc::new(ConnectionRegistry::new());
    let inbox = Inbox::default();

    let handle = SubscriptionHandle::new(
        registry.clone(),
        builder(),
        SubscriptionOptions::new(server.url("orders")),
        inbox.handler(),
    );
    wait_until(|| handle.status() == ConnectionStatus::Connected).await;

    server.send("orders", "order", "last", "9");
    wait_until(|| inbox.len() == 1).await;
    server.finish("orders");

    wait_until(|| handle.status() == ConnectionStatus::Idle).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.request_count("orders"), 1);
    assert_eq!(handle.status(), ConnectionStatus::Idle);
}

#[tokio::test]
async fn test_rejected_url_never_opens_a_request() {
    let server = TestServer::start().await;
    let registry = Arc::new(ConnectionRegistry::new());

    let handle = SubscriptionHandle::new(
        registry.clone(),
        builder(),
        SubscriptionOptions::pending_url(async { Err(resolve_error("token expired")) }),
        |_| {},
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handle.status(), ConnectionStatus::Idle);
    assert!(registry.is_empty());
    assert_eq!(server.request_count("orders"), 0);
}

#[tokio::test]
async fn test_pending_url_connects_once_resolved() {
    let server = TestServer::start().await;
    let registry = Arc::new(ConnectionRegistry::new());
    let url = server.url("orders");

    let handle = SubscriptionHandle::new(
        registry.clone(),
        builder(),
        SubscriptionOptions::pending_url(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(Some(url))
        }),
        |_| {},
    );

    wait_until(|| handle.status() == ConnectionStatus::Connected).await;
    assert_eq!(handle.resolved_url(), Some(server.url("orders")));
    assert_eq!(server.request_count("orders"), 1);

    registry.clear();
}
