//! End-to-end pipeline tests
//!
//! Each test plays the backend over the in-memory transport while the real
//! gateway runtime, registry, and timelines run.
//!
//! Run with: cargo test -p integration-tests --test pipeline_tests

use std::time::Duration;

use integration_tests::*;
use livechat_common::{GatewayConfig, TimelineConfig};
use livechat_core::{MessageFlags, Topic};
use livechat_gateway::{ConnectionState, GatewayEvent, SubscriptionStatus};

// ============================================================================
// Room lifecycle
// ============================================================================

#[tokio::test]
async fn test_end_to_end_room_scenario() {
    let client = TestClient::start(TestRouter).await.unwrap();
    let timeline = client.open_room("room:1").await.unwrap();

    // One connection dialed immediately, subscribe sent once it opens
    let dials = client.network.dials();
    assert_eq!(dials.len(), 1);
    assert_eq!(dials[0].delay, Duration::ZERO);
    client.open(conn(1)).await.unwrap();
    let sent = client.network.sent(conn(1));
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("pusher:subscribe") && sent[0].contains("room:1"));

    client
        .backend_sends(conn(1), subscription_succeeded("room:1"))
        .await
        .unwrap();
    let assignment = client
        .gateway
        .assignments()
        .assignment(&Topic::new("room:1"))
        .unwrap();
    assert_eq!(assignment.connection, conn(1));
    assert_eq!(assignment.status, SubscriptionStatus::Active);

    client
        .backend_sends(conn(1), test_message("room:1", "m1", 100))
        .await
        .unwrap();
    let snapshot = timeline.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, "m1");
    assert_eq!(snapshot[0].server_time.timestamp(), 100);

    client
        .backend_sends(conn(1), test_moderation("room:1", "m1"))
        .await
        .unwrap();
    let snapshot = timeline.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, "m1");
    assert!(snapshot[0].flags.contains(MessageFlags::DISABLED));

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_reopening_room_sends_one_subscribe() {
    let client = TestClient::start(TestRouter).await.unwrap();
    let first = client.open_room("room:1").await.unwrap();
    let second = client.open_room("room:1").await.unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));

    client.open(conn(1)).await.unwrap();
    let subscribes = client
        .network
        .sent(conn(1))
        .iter()
        .filter(|frame| frame.contains("pusher:subscribe"))
        .count();
    assert_eq!(subscribes, 1);
}

#[tokio::test]
async fn test_closed_room_ignores_late_frames() {
    let client = TestClient::start(TestRouter).await.unwrap();
    let timeline = client.open_room("room:1").await.unwrap();
    client.open_room("room:2").await.unwrap();
    client.open(conn(1)).await.unwrap();

    assert!(client.registry.close_room(&Topic::new("room:1")).await);
    client.settle().await.unwrap();

    // Connection still serves room:2
    assert_eq!(client.owner("room:2"), Some(conn(1)));
    assert_eq!(client.owner("room:1"), None);
    assert!(client
        .network
        .sent(conn(1))
        .iter()
        .any(|frame| frame.contains("pusher:unsubscribe") && frame.contains("room:1")));

    client
        .backend_sends(conn(1), test_message("room:1", "late", 1))
        .await
        .unwrap();
    assert!(timeline.is_empty());
}

// ============================================================================
// Multiplexing
// ============================================================================

#[tokio::test]
async fn test_rooms_spread_across_connections() {
    let config = GatewayConfig {
        max_subscriptions_per_connection: 2,
        ..GatewayConfig::default()
    };
    let client = TestClient::start_with_config(config, TimelineConfig::default(), TestRouter)
        .await
        .unwrap();

    for room in ["a", "b", "c", "d", "e"] {
        client.open_room(room).await.unwrap();
    }

    assert_eq!(client.network.dials().len(), 3);
    assert_eq!(client.owner("a"), Some(conn(1)));
    assert_eq!(client.owner("b"), Some(conn(1)));
    assert_eq!(client.owner("c"), Some(conn(2)));
    assert_eq!(client.owner("d"), Some(conn(2)));
    assert_eq!(client.owner("e"), Some(conn(3)));

    let view = client.gateway.assignments();
    assert_eq!(view.topic_count(), 5);
    assert_eq!(view.connection_count(), 3);
    assert!(view.is_consistent());
}

#[tokio::test]
async fn test_remote_close_replays_subscriptions() {
    let client = TestClient::start(TestRouter).await.unwrap();
    let timeline = client.open_room("room:1").await.unwrap();
    client.open_room("room:2").await.unwrap();
    client.open(conn(1)).await.unwrap();
    client.network.take_sent(conn(1));

    let mut events = client.gateway.events();
    client.drop_connection(conn(1)).await.unwrap();

    // Topics stay on the same connection, which redials after the backoff
    let dials = client.network.dials();
    assert_eq!(dials.len(), 2);
    assert_eq!(dials[1].connection, conn(1));
    assert_eq!(dials[1].delay, Duration::from_secs(1));
    assert_eq!(
        client.gateway.assignments().connection_state(conn(1)),
        Some(ConnectionState::Connecting)
    );
    let reassigned: Vec<GatewayEvent> = drain_events(&mut events)
        .into_iter()
        .filter(|event| matches!(event, GatewayEvent::TopicAssigned { .. }))
        .collect();
    assert_eq!(reassigned.len(), 2);

    client.open(conn(1)).await.unwrap();
    let sent = client.network.sent(conn(1));
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|frame| frame.contains("pusher:subscribe")));

    client
        .backend_sends(conn(1), test_message("room:1", "after-reconnect", 5))
        .await
        .unwrap();
    assert_eq!(timeline.last().unwrap().id, "after-reconnect");
    assert_eq!(client.gateway.diag().connections_closed(), 1);
}

#[tokio::test]
async fn test_subscription_error_surfaces_once() {
    let client = TestClient::start(TestRouter).await.unwrap();
    client.open_room("private").await.unwrap();
    client.open_room("public").await.unwrap();
    client.open(conn(1)).await.unwrap();

    let mut events = client.gateway.events();
    client
        .backend_sends(conn(1), subscription_error("private", "Forbidden"))
        .await
        .unwrap();

    let event = wait_for_event(&mut events, |event| {
        matches!(event, GatewayEvent::SubscriptionRejected { .. })
    })
    .await
    .unwrap();
    let GatewayEvent::SubscriptionRejected { topic, reason } = event else {
        panic!("expected rejection");
    };
    assert_eq!(topic.as_str(), "private");
    assert_eq!(reason, "Forbidden");

    // No retry loop; the other room is untouched
    assert_eq!(client.owner("private"), None);
    assert_eq!(client.owner("public"), Some(conn(1)));
    assert_eq!(client.network.dials().len(), 1);
    assert_eq!(client.gateway.diag().subscription_errors(), 1);
}

// ============================================================================
// Liveness
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_silent_connection_is_replaced() {
    let client = TestClient::start(TestRouter).await.unwrap();
    client.open_room("room:1").await.unwrap();
    client.open(conn(1)).await.unwrap();
    let mut events = client.gateway.events();

    // No liveness response for longer than 1.5x the 20s interval
    tokio::time::advance(Duration::from_secs(41)).await;
    wait_for_event(&mut events, |event| {
        matches!(
            event,
            GatewayEvent::TopicAssigned { connection, .. } if *connection == conn(1)
        )
    })
    .await
    .unwrap();
    client.settle().await.unwrap();

    assert_eq!(client.gateway.diag().liveness_timeouts(), 1);
    assert_eq!(
        client.gateway.assignments().connection_state(conn(1)),
        Some(ConnectionState::Connecting)
    );
    assert_eq!(client.owner("room:1"), Some(conn(1)));
}

#[tokio::test(start_paused = true)]
async fn test_answered_probes_keep_connection_open() {
    let client = TestClient::start(TestRouter).await.unwrap();
    client.open_room("room:1").await.unwrap();
    client.open(conn(1)).await.unwrap();

    for _ in 0..5 {
        tokio::time::advance(Duration::from_secs(20)).await;
        client.settle().await.unwrap();
        client.backend_sends(conn(1), pong()).await.unwrap();
    }

    assert_eq!(client.gateway.diag().liveness_timeouts(), 0);
    assert_eq!(
        client.gateway.assignments().connection_state(conn(1)),
        Some(ConnectionState::Open)
    );
    assert_eq!(client.network.dials().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_advertised_interval_shortens_timeout() {
    let client = TestClient::start(TestRouter).await.unwrap();
    client.open_room("room:1").await.unwrap();
    client.open(conn(1)).await.unwrap();
    client
        .backend_sends(conn(1), connection_established(10))
        .await
        .unwrap();
    let mut events = client.gateway.events();

    // 21s is within the default 30s timeout but past 1.5x the advertised 10s
    tokio::time::advance(Duration::from_secs(21)).await;
    wait_for_event(&mut events, |event| {
        matches!(
            event,
            GatewayEvent::ConnectionStateChanged {
                state: ConnectionState::Closed,
                ..
            }
        )
    })
    .await
    .unwrap();

    assert_eq!(client.gateway.diag().liveness_timeouts(), 1);
}
