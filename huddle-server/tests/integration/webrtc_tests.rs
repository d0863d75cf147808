use huddle_core::{ClientEvent, ServerEvent};
use webrtc::peer_connection::signaling_state::RTCSignalingState;

use crate::integration::init_tracing;
use crate::utils::{RtcPeer, TestHarness};

/// Two real peer connections negotiate through the coordinator without it touching the SDP.
#[tokio::test]
async fn test_offer_answer_through_relay() {
    init_tracing();
    let harness = TestHarness::new();
    harness.add_meeting("r1", "a");

    let mut a = harness.connect("a").await.unwrap();
    let mut b = harness.connect("b").await.unwrap();
    harness.join(&mut a, "r1").await.unwrap();
    harness.join(&mut b, "r1").await.unwrap();
    a.drain();

    let peer_a = RtcPeer::new().await.expect("Failed to create peer a");
    let peer_b = RtcPeer::new().await.expect("Failed to create peer b");

    let offer = peer_a.create_offer().await.expect("Failed to create offer");
    let offer_sdp = offer["sdp"].as_str().unwrap().to_owned();
    harness
        .send(
            &a,
            ClientEvent::SignalOffer {
                target_connection_id: b.id,
                payload: offer,
            },
        )
        .await;

    let relayed_offer = match b.recv().await.unwrap() {
        ServerEvent::SignalOffer {
            from_connection_id,
            payload,
            ..
        } => {
            assert_eq!(from_connection_id, a.id);
            payload
        }
        other => panic!("expected signal-offer, got {:?}", other),
    };

    let answer = peer_b
        .accept_offer(relayed_offer)
        .await
        .expect("Failed to answer");
    harness
        .send(
            &b,
            ClientEvent::SignalAnswer {
                target_connection_id: a.id,
                payload: answer,
            },
        )
        .await;

    let relayed_answer = match a.recv().await.unwrap() {
        ServerEvent::SignalAnswer { payload, .. } => payload,
        other => panic!("expected signal-answer, got {:?}", other),
    };
    peer_a
        .apply_answer(relayed_answer)
        .await
        .expect("Failed to apply answer");

    assert_eq!(peer_a.signaling_state(), RTCSignalingState::Stable);
    assert_eq!(peer_b.signaling_state(), RTCSignalingState::Stable);
    assert_eq!(peer_b.remote_sdp().await.as_deref(), Some(offer_sdp.as_str()));

    // Trickle a's candidates to b; each arrives once, in order, and is accepted.
    let candidates = peer_a.gather_candidates().await.unwrap();
    for candidate in &candidates {
        harness
            .send(
                &a,
                ClientEvent::SignalIce {
                    target_connection_id: b.id,
                    payload: candidate.clone(),
                },
            )
            .await;
    }

    let mut relayed = Vec::new();
    for event in b.drain() {
        match event {
            ServerEvent::SignalIce { payload, .. } => relayed.push(payload),
            other => panic!("unexpected {:?}", other),
        }
    }
    assert_eq!(relayed, candidates);
    for candidate in relayed {
        peer_b
            .add_candidate(candidate)
            .await
            .expect("Relayed candidate rejected");
    }

    peer_a.close().await.unwrap();
    peer_b.close().await.unwrap();
}
