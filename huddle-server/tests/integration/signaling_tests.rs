use huddle_core::{ClientEvent, ServerEvent, UserId};
use serde_json::json;

use crate::integration::init_tracing;
use crate::utils::TestHarness;

#[tokio::test]
async fn test_signals_keep_sender_order() {
    init_tracing();
    let harness = TestHarness::new();
    harness.add_meeting("r1", "a");

    let mut a = harness.connect("a").await.unwrap();
    let mut b = harness.connect("b").await.unwrap();
    let mut c = harness.connect("c").await.unwrap();
    for conn in [&mut a, &mut b, &mut c] {
        harness.join(conn, "r1").await.unwrap();
    }
    b.drain();

    let from_a = {
        let coordinator = harness.coordinator.clone();
        let (a_id, b_id) = (a.id, b.id);
        tokio::spawn(async move {
            for seq in 0..100 {
                coordinator
                    .handle(
                        &a_id,
                        ClientEvent::SignalIce {
                            target_connection_id: b_id,
                            payload: json!({ "seq": seq }),
                        },
                    )
                    .await;
                tokio::task::yield_now().await;
            }
        })
    };
    let from_c = {
        let coordinator = harness.coordinator.clone();
        let (c_id, b_id) = (c.id, b.id);
        tokio::spawn(async move {
            for seq in 0..100 {
                coordinator
                    .handle(
                        &c_id,
                        ClientEvent::SignalIce {
                            target_connection_id: b_id,
                            payload: json!({ "seq": seq }),
                        },
                    )
                    .await;
                tokio::task::yield_now().await;
            }
        })
    };
    from_a.await.unwrap();
    from_c.await.unwrap();

    let mut seen_a = Vec::new();
    let mut seen_c = Vec::new();
    for event in b.drain() {
        match event {
            ServerEvent::SignalIce {
                from_connection_id,
                payload,
                ..
            } => {
                let seq = payload["seq"].as_u64().unwrap();
                if from_connection_id == a.id {
                    seen_a.push(seq);
                } else if from_connection_id == c.id {
                    seen_c.push(seq);
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    let expected: Vec<u64> = (0..100).collect();
    assert_eq!(seen_a, expected);
    assert_eq!(seen_c, expected);
}

#[tokio::test]
async fn test_offer_and_answer_carry_sender_identity() {
    init_tracing();
    let harness = TestHarness::new();
    harness.add_meeting("r1", "a");

    let mut a = harness.connect("a").await.unwrap();
    let mut b = harness.connect("b").await.unwrap();
    harness.join(&mut a, "r1").await.unwrap();
    harness.join(&mut b, "r1").await.unwrap();
    a.drain();

    let offer = json!({"type": "offer", "sdp": "v=0\r\n"});
    harness
        .send(
            &a,
            ClientEvent::SignalOffer {
                target_connection_id: b.id,
                payload: offer.clone(),
            },
        )
        .await;

    match b.recv().await.unwrap() {
        ServerEvent::SignalOffer {
            from_connection_id,
            from_user,
            payload,
        } => {
            assert_eq!(from_connection_id, a.id);
            assert_eq!(from_user.id, UserId::from("a"));
            assert_eq!(payload, offer);
        }
        other => panic!("expected signal-offer, got {:?}", other),
    }

    harness
        .send(
            &b,
            ClientEvent::SignalAnswer {
                target_connection_id: a.id,
                payload: json!({"type": "answer", "sdp": "v=0\r\n"}),
            },
        )
        .await;
    assert!(matches!(
        a.recv().await.unwrap(),
        ServerEvent::SignalAnswer { from_connection_id, .. } if from_connection_id == b.id
    ));
}

#[tokio::test]
async fn test_signal_across_rooms_is_dropped_silently() {
    init_tracing();
    let harness = TestHarness::new();
    harness.add_meeting("r1", "a");
    harness.add_meeting("r2", "b");

    let mut a = harness.connect("a").await.unwrap();
    let mut b = harness.connect("b").await.unwrap();
    harness.join(&mut a, "r1").await.unwrap();
    harness.join(&mut b, "r2").await.unwrap();

    harness
        .send(
            &a,
            ClientEvent::SignalOffer {
                target_connection_id: b.id,
                payload: json!({}),
            },
        )
        .await;

    a.assert_quiet();
    b.assert_quiet();
}

#[tokio::test]
async fn test_media_toggles_reach_other_participants() {
    init_tracing();
    let harness = TestHarness::new();
    harness.add_meeting("r1", "a");

    let mut a = harness.connect("a").await.unwrap();
    let mut b = harness.connect("b").await.unwrap();
    harness.join(&mut a, "r1").await.unwrap();
    harness.join(&mut b, "r1").await.unwrap();
    a.drain();

    harness.send(&b, ClientEvent::ToggleMute { enabled: true }).await;
    harness
        .send(&b, ClientEvent::ToggleScreenshare { enabled: true })
        .await;

    let updates: Vec<_> = a
        .drain()
        .into_iter()
        .map(|event| match event {
            ServerEvent::ParticipantUpdated { media, .. } => media,
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(updates.len(), 2);
    assert!(updates[1].is_muted && updates[1].is_screen_sharing);
    b.assert_quiet();
}

#[tokio::test]
async fn test_screen_share_can_be_disallowed() {
    init_tracing();
    let harness = TestHarness::new();
    harness.add_meeting_with(
        "r1",
        "a",
        huddle_core::MeetingSettings {
            allow_screen_share: false,
            ..Default::default()
        },
    );

    let mut a = harness.connect("a").await.unwrap();
    let mut b = harness.connect("b").await.unwrap();
    harness.join(&mut a, "r1").await.unwrap();
    harness.join(&mut b, "r1").await.unwrap();
    a.drain();

    harness
        .send(&b, ClientEvent::ToggleScreenshare { enabled: true })
        .await;

    assert!(matches!(b.recv().await.unwrap(), ServerEvent::Error { .. }));
    a.assert_quiet();
}

#[tokio::test]
async fn test_toggle_outside_room_is_an_error() {
    init_tracing();
    let harness = TestHarness::new();
    let mut a = harness.connect("a").await.unwrap();

    harness.send(&a, ClientEvent::ToggleVideo { enabled: true }).await;

    match a.recv().await.unwrap() {
        ServerEvent::Error { message } => assert!(message.contains("not in a room")),
        other => panic!("expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ephemeral_room_signals() {
    init_tracing();
    let harness = TestHarness::new();
    harness.add_meeting("r1", "a");

    let mut a = harness.connect("a").await.unwrap();
    let mut b = harness.connect("b").await.unwrap();
    harness.join(&mut a, "r1").await.unwrap();
    harness.join(&mut b, "r1").await.unwrap();
    a.drain();

    harness.send(&b, ClientEvent::HandRaise { is_raised: true }).await;
    harness.send(&b, ClientEvent::ChatTyping { is_typing: true }).await;
    harness.send(&b, ClientEvent::RecordingStarted).await;
    harness
        .send(
            &b,
            ClientEvent::Reaction {
                emoji: "🎉".into(),
            },
        )
        .await;

    let events = a.drain();
    assert!(matches!(
        &events[..],
        [
            ServerEvent::HandRaised { is_raised: true, .. },
            ServerEvent::UserTyping { is_typing: true, .. },
            ServerEvent::RecordingStarted { .. },
            ServerEvent::Reaction { .. },
        ]
    ));

    // Reactions are echoed to the sender as well.
    let own = b.drain();
    assert!(matches!(&own[..], [ServerEvent::Reaction { emoji, .. }] if emoji == "🎉"));
}
