//! Kick event flow into room timelines
//!
//! Run with: cargo test -p integration-tests --test timeline_tests

use integration_tests::*;
use livechat_common::{GatewayConfig, TimelineConfig};
use livechat_core::MessageFlags;
use livechat_service::{KickRoom, KickRouter};
use livechat_timeline::TimelineEvent;

const ROOM: &str = "chatrooms.42.v2";

#[tokio::test]
async fn test_kick_chat_and_moderation() {
    let client = TestClient::start(KickRouter::new()).await.unwrap();
    let timeline = client.open_room(ROOM).await.unwrap();
    client.open(conn(1)).await.unwrap();
    client
        .backend_sends(conn(1), subscription_succeeded(ROOM))
        .await
        .unwrap();

    for (id, user) in [("m1", "alice"), ("m2", "spammer"), ("m3", "spammer")] {
        client
            .backend_sends(conn(1), kick_chat_message(ROOM, id, user, "hello"))
            .await
            .unwrap();
    }
    client
        .backend_sends(conn(1), kick_user_banned(ROOM, "spammer", "mod"))
        .await
        .unwrap();
    client
        .backend_sends(conn(1), kick_message_deleted(ROOM, "m1"))
        .await
        .unwrap();

    let snapshot = timeline.snapshot();
    assert_eq!(snapshot.len(), 4);
    assert!(snapshot[0].is_disabled());
    assert!(snapshot[0].flags.contains(MessageFlags::INVALID_REPLY_TARGET));
    assert!(snapshot[1].is_disabled());
    assert!(snapshot[2].is_disabled());
    assert!(snapshot[3].flags.contains(MessageFlags::TIMEOUT));
    assert_eq!(snapshot[3].content, "mod permanently banned spammer.");

    // A second ban inside the window stacks onto the same notice
    client
        .backend_sends(conn(1), kick_user_banned(ROOM, "spammer", "mod"))
        .await
        .unwrap();
    assert_eq!(timeline.len(), 4);
    assert_eq!(timeline.last().unwrap().count, 2);
}

#[tokio::test]
async fn test_kick_room_receives_channel_topic_events() {
    let client = TestClient::start(KickRouter::new()).await.unwrap();
    let room = KickRoom::new(42, 7);
    let timeline = client.open_kick_room(room).await.unwrap();
    client.open(conn(1)).await.unwrap();

    // One connection carries all six topics
    let subscribes = client.network.sent(conn(1));
    assert_eq!(subscribes.len(), 6);
    for topic in room.topics() {
        assert_eq!(client.owner(topic.as_str()), Some(conn(1)));
    }

    client
        .backend_sends(conn(1), kick_chat_message(ROOM, "m1", "alice", "hello"))
        .await
        .unwrap();
    client
        .backend_sends(conn(1), kick_stream_host("channel.7", "raider", 12))
        .await
        .unwrap();
    client
        .backend_sends(conn(1), kick_chat_message("chatrooms.99.v2", "m2", "bob", "elsewhere"))
        .await
        .unwrap();

    let snapshot = timeline.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].id, "m1");
    assert!(snapshot[1].is_system());
    assert_eq!(snapshot[1].content, "raider hosted the stream with 12 viewers.");

    assert!(client.registry.close_room(&room.key()).await);
    client.settle().await.unwrap();
    assert_eq!(client.gateway.assignments().topic_count(), 0);
}

#[tokio::test]
async fn test_timeline_notifications_follow_frames() {
    let client = TestClient::start(TestRouter).await.unwrap();
    let timeline = client.open_room("room:1").await.unwrap();
    let mut changes = timeline.subscribe();
    client.open(conn(1)).await.unwrap();

    client
        .backend_sends(conn(1), test_message("room:1", "m10", 10))
        .await
        .unwrap();
    client
        .backend_sends(conn(1), test_message("room:1", "m30", 30))
        .await
        .unwrap();
    client
        .backend_sends(conn(1), test_history("room:1", "m20", 20))
        .await
        .unwrap();
    client
        .backend_sends(conn(1), test_moderation("room:1", "m10"))
        .await
        .unwrap();

    let times: Vec<i64> = timeline
        .snapshot()
        .iter()
        .map(|m| m.server_time.timestamp())
        .collect();
    assert_eq!(times, vec![10, 20, 30]);

    let mut seen = Vec::new();
    while let Ok(change) = changes.try_recv() {
        seen.push(change);
    }
    assert_eq!(seen.len(), 4);
    assert!(matches!(&seen[0], TimelineEvent::Appended(m) if m.id == "m10"));
    assert!(matches!(&seen[1], TimelineEvent::Appended(m) if m.id == "m30"));
    assert!(matches!(&seen[2], TimelineEvent::HistoricalBatchAdded(batch) if batch.len() == 1));
    assert!(matches!(&seen[3], TimelineEvent::Replaced { index: 0, .. }));
}

#[tokio::test]
async fn test_scrollback_limit_applies_per_room() {
    let client = TestClient::start_with_config(
        GatewayConfig::default(),
        TimelineConfig {
            scrollback_limit: 3,
        },
        TestRouter,
    )
    .await
    .unwrap();
    let busy = client.open_room("busy").await.unwrap();
    let quiet = client.open_room("quiet").await.unwrap();
    client.open(conn(1)).await.unwrap();

    for i in 0..10 {
        client
            .backend_sends(conn(1), test_message("busy", &format!("m{i}"), i))
            .await
            .unwrap();
    }
    client
        .backend_sends(conn(1), test_message("quiet", "only", 1))
        .await
        .unwrap();

    let ids: Vec<String> = busy.snapshot().iter().map(|m| m.id.clone()).collect();
    assert_eq!(ids, vec!["m7", "m8", "m9"]);
    assert!(!busy.resolve("m0").is_live());
    assert_eq!(quiet.len(), 1);
}
