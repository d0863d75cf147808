use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;

/// Timeout for ICE gathering (ms).
pub const ICE_GATHERING_TIMEOUT_MS: u64 = 3000;

/// A browser stand-in: one `RTCPeerConnection` whose SDP and ICE travel through the
/// coordinator as opaque JSON payloads.
pub struct RtcPeer {
    peer_connection: Arc<RTCPeerConnection>,
    candidates: Arc<Mutex<Vec<Value>>>,
}

impl RtcPeer {
    pub async fn new() -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let peer_connection = Arc::new(api.new_peer_connection(RTCConfiguration::default()).await?);
        let candidates = Arc::new(Mutex::new(Vec::new()));

        let candidates_clone = Arc::clone(&candidates);
        peer_connection.on_ice_candidate(Box::new(move |candidate| {
            let candidates = Arc::clone(&candidates_clone);
            Box::pin(async move {
                let Some(candidate) = candidate else { return };
                if let Ok(init) = candidate.to_json() {
                    if let Ok(value) = serde_json::to_value(&init) {
                        candidates.lock().await.push(value);
                    }
                }
            })
        }));

        Ok(Self {
            peer_connection,
            candidates,
        })
    }

    /// Opens a data channel and returns the local offer as JSON.
    pub async fn create_offer(&self) -> Result<Value> {
        self.peer_connection
            .create_data_channel("huddle", None)
            .await
            .context("Failed to create data channel")?;

        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .context("Failed to create offer")?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await
            .context("Failed to set local description")?;

        Ok(serde_json::to_value(&offer)?)
    }

    /// Applies a remote offer and returns the local answer as JSON.
    pub async fn accept_offer(&self, offer: Value) -> Result<Value> {
        let offer: RTCSessionDescription =
            serde_json::from_value(offer).context("Offer payload is not a session description")?;
        self.peer_connection
            .set_remote_description(offer)
            .await
            .context("Failed to set remote offer")?;

        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .context("Failed to create answer")?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await
            .context("Failed to set local description")?;

        Ok(serde_json::to_value(&answer)?)
    }

    pub async fn apply_answer(&self, answer: Value) -> Result<()> {
        let answer: RTCSessionDescription =
            serde_json::from_value(answer).context("Answer payload is not a session description")?;
        self.peer_connection
            .set_remote_description(answer)
            .await
            .context("Failed to set remote answer")?;
        Ok(())
    }

    /// Waits for gathering to finish (or time out) and returns the local candidates.
    pub async fn gather_candidates(&self) -> Result<Vec<Value>> {
        let mut done = self.peer_connection.gathering_complete_promise().await;
        let gathering = Duration::from_millis(ICE_GATHERING_TIMEOUT_MS);
        let _ = tokio::time::timeout(gathering, done.recv()).await;
        Ok(self.candidates.lock().await.clone())
    }

    pub async fn add_candidate(&self, candidate: Value) -> Result<()> {
        let init: RTCIceCandidateInit =
            serde_json::from_value(candidate).context("Failed to parse ICE candidate")?;
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .context("Failed to add ICE candidate")?;
        Ok(())
    }

    pub fn signaling_state(&self) -> RTCSignalingState {
        self.peer_connection.signaling_state()
    }

    pub async fn remote_sdp(&self) -> Option<String> {
        self.peer_connection
            .remote_description()
            .await
            .map(|description| description.sdp)
    }

    pub async fn close(&self) -> Result<()> {
        self.peer_connection
            .close()
            .await
            .context("Failed to close peer connection")?;
        Ok(())
    }
}
