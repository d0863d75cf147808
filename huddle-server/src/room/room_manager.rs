use crate::registry::ConnectionRegistry;
use crate::room::{Room, RoomHandle};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use huddle_core::{MeetingInfo, RoomId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// How many ended rooms are remembered before the oldest are forgotten.
const ENDED_ROOMS_RETAINED: usize = 1024;

/// Rooms whose meeting was ended by the host, stamped with a sequence number.
///
/// A join reads [`EndedRooms::seq`] before fetching meeting metadata. If the room ends after
/// that point, the metadata may predate the end and must not be used to open a fresh room.
#[derive(Default)]
pub struct EndedRooms {
    rooms: DashMap<RoomId, u64>,
    seq: AtomicU64,
    /// Joins that read `seq` below this may have missed a forgotten entry.
    floor: AtomicU64,
}

impl EndedRooms {
    pub fn seq(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    /// Called by the room actor before it removes its room table entry.
    pub(crate) fn record(&self, room_id: &RoomId) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.rooms.insert(room_id.clone(), seq);

        if self.rooms.len() > ENDED_ROOMS_RETAINED {
            let cutoff = seq.saturating_sub((ENDED_ROOMS_RETAINED / 2) as u64);
            self.floor.fetch_max(cutoff, Ordering::SeqCst);
            self.rooms.retain(|_, ended_at| *ended_at > cutoff);
        }
    }

    /// Whether metadata read at `since` may be older than an end of `room_id`.
    pub fn is_stale(&self, room_id: &RoomId, since: u64) -> bool {
        if since < self.floor.load(Ordering::SeqCst) {
            return true;
        }
        self.rooms
            .get(room_id)
            .is_some_and(|ended_at| *ended_at > since)
    }

    fn forget(&self, room_id: &RoomId) {
        self.rooms.remove(room_id);
    }
}

/// Live rooms by id. A room actor removes its own entry when it shuts down.
#[derive(Clone)]
pub struct RoomManager {
    rooms: Arc<DashMap<RoomId, RoomHandle>>,
    ended: Arc<EndedRooms>,
    registry: Arc<ConnectionRegistry>,
    queue_capacity: usize,
    next_instance: Arc<AtomicU64>,
}

impl RoomManager {
    pub fn new(registry: Arc<ConnectionRegistry>, queue_capacity: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            ended: Arc::new(EndedRooms::default()),
            registry,
            queue_capacity,
            next_instance: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn get(&self, room_id: &RoomId) -> Option<RoomHandle> {
        self.rooms.get(room_id).map(|entry| entry.value().clone())
    }

    /// Sequence to pass to [`RoomManager::get_or_create`]; read it before resolving metadata.
    pub fn end_seq(&self) -> u64 {
        self.ended.seq()
    }

    /// Returns the live room for `meeting.room_id`, spawning an actor for it when absent.
    ///
    /// `None` when no room is live and the room was ended after `since`: `meeting` may be
    /// stale and has to be resolved again.
    pub fn get_or_create(&self, meeting: &MeetingInfo, since: u64) -> Option<RoomHandle> {
        if let Some(handle) = self.get(&meeting.room_id) {
            return Some(handle);
        }

        match self.rooms.entry(meeting.room_id.clone()) {
            Entry::Occupied(entry) => Some(entry.get().clone()),
            Entry::Vacant(entry) => {
                if self.ended.is_stale(&meeting.room_id, since) {
                    debug!(room = %meeting.room_id, "Room ended after metadata was read");
                    return None;
                }
                self.ended.forget(&meeting.room_id);
                Some(entry.insert(self.spawn_room(meeting)).value().clone())
            }
        }
    }

    fn spawn_room(&self, meeting: &MeetingInfo) -> RoomHandle {
        let instance = self.next_instance.fetch_add(1, Ordering::Relaxed);
        info!("Creating new room: {} (instance {})", meeting.room_id, instance);

        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let room = Room::new(
            meeting.clone(),
            instance,
            rx,
            self.registry.clone(),
            self.rooms.clone(),
            self.ended.clone(),
        );
        tokio::spawn(room.run());

        RoomHandle::new(meeting.room_id.clone(), instance, tx)
    }

    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
