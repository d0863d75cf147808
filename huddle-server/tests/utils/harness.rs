use anyhow::{Context, Result, bail};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use huddle_core::{
    ClientEvent, ConnectionId, IceServerConfig, MeetingInfo, MeetingSettings, MeetingStatus,
    Participant, RoomId, ServerEvent, UserId, UserIdentity,
};
use huddle_server::{Coordinator, InMemoryMeetingStore, JwtVerifier, MeetingStore};

/// Timeout for a single expected event (ms).
pub const EVENT_TIMEOUT_MS: u64 = 2000;

pub const TEST_SECRET: &str = "integration-test-secret";

pub fn identity(user: &str) -> UserIdentity {
    UserIdentity {
        id: UserId::from(user),
        name: format!("User {user}"),
        email: format!("{user}@example.test"),
        avatar: None,
    }
}

/// Coordinator wired to an in-memory meeting store.
pub struct TestHarness {
    pub coordinator: Coordinator,
    pub store: Arc<InMemoryMeetingStore>,
    pub jwt: Arc<JwtVerifier>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_store(|store| store as Arc<dyn MeetingStore>)
    }

    /// Coordinator backed by whatever `wrap` builds around the in-memory store.
    pub fn with_store<F>(wrap: F) -> Self
    where
        F: FnOnce(Arc<InMemoryMeetingStore>) -> Arc<dyn MeetingStore>,
    {
        let store = Arc::new(InMemoryMeetingStore::new());
        let jwt = Arc::new(JwtVerifier::new(TEST_SECRET));
        let ice_servers = vec![IceServerConfig {
            urls: vec!["stun:stun.example.test:3478".into()],
            username: None,
            credential: None,
        }];
        let coordinator = Coordinator::new(wrap(store.clone()), jwt.clone(), ice_servers, 32);

        Self {
            coordinator,
            store,
            jwt,
        }
    }

    pub fn add_meeting(&self, room: &str, host: &str) -> MeetingInfo {
        self.add_meeting_with(room, host, MeetingSettings::default())
    }

    pub fn add_meeting_with(
        &self,
        room: &str,
        host: &str,
        settings: MeetingSettings,
    ) -> MeetingInfo {
        let meeting = MeetingInfo {
            room_id: RoomId::from(room),
            meeting_id: format!("meeting-{room}"),
            title: format!("Meeting {room}"),
            host: UserId::from(host),
            status: MeetingStatus::Active,
            settings,
        };
        self.store.insert(meeting.clone());
        meeting
    }

    pub fn token(&self, user: &str) -> String {
        self.jwt
            .issue(&identity(user), 3600)
            .expect("failed to issue test token")
    }

    /// Registers a connection and consumes its `welcome` and `ice-config`.
    pub async fn connect(&self, user: &str) -> Result<TestConnection> {
        let (id, rx) = self
            .coordinator
            .connect(identity(user))
            .context("Failed to register connection")?;
        let mut conn = TestConnection {
            id,
            user_id: UserId::from(user),
            rx,
        };

        match conn.recv().await? {
            ServerEvent::Welcome { connection_id, .. } if connection_id == id => {}
            other => bail!("Expected welcome, got {:?}", other),
        }
        match conn.recv().await? {
            ServerEvent::IceConfig { .. } => {}
            other => bail!("Expected ice-config, got {:?}", other),
        }
        Ok(conn)
    }

    pub async fn send(&self, conn: &TestConnection, event: ClientEvent) {
        self.coordinator.handle(&conn.id, event).await;
    }

    /// Joins `room` and returns the `room-participants` payload.
    pub async fn join(
        &self,
        conn: &mut TestConnection,
        room: &str,
    ) -> Result<(Vec<Participant>, bool)> {
        self.send(
            conn,
            ClientEvent::JoinRoom {
                room_id: RoomId::from(room),
            },
        )
        .await;

        match conn.recv().await? {
            ServerEvent::RoomParticipants {
                participants,
                is_host,
                ..
            } => Ok((participants, is_host)),
            other => bail!("Expected room-participants, got {:?}", other),
        }
    }

    pub async fn participant_count(&self, room: &str) -> usize {
        self.coordinator
            .room_snapshot(&RoomId::from(room))
            .await
            .map(|snapshot| snapshot.participants.len())
            .unwrap_or(0)
    }

    /// Polls until the room is gone from the room table.
    pub async fn wait_for_room_closed(&self, room: &str) -> Result<()> {
        let room = RoomId::from(room);
        for _ in 0..100 {
            if self.coordinator.room_snapshot(&room).await.is_none() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        bail!("Room {} still open", room)
    }
}

pub struct TestConnection {
    pub id: ConnectionId,
    pub user_id: UserId,
    rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl TestConnection {
    pub async fn recv(&mut self) -> Result<ServerEvent> {
        match tokio::time::timeout(Duration::from_millis(EVENT_TIMEOUT_MS), self.rx.recv()).await {
            Ok(Some(event)) => Ok(event),
            Ok(None) => bail!("Outbound queue closed"),
            Err(_) => bail!("Timeout waiting for event"),
        }
    }

    /// Everything queued right now.
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn assert_quiet(&mut self) {
        let events = self.drain();
        assert!(events.is_empty(), "unexpected events: {:?}", events);
    }
}
