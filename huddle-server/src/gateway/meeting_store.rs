use crate::error::StoreError;
use async_trait::async_trait;
use huddle_core::{
    ChatMessage, MeetingInfo, NewChatMessage, RoomId, ScheduledMeeting, TeamId, TeamInfo,
};

/// Access to the durable meeting store.
///
/// Calls may block on the network; the coordinator never makes them from inside a room actor.
#[async_trait]
pub trait MeetingStore: Send + Sync {
    /// Metadata for the meeting behind `room_id`, or `None` if there is no such meeting.
    async fn resolve_meeting(&self, room_id: &RoomId) -> Result<Option<MeetingInfo>, StoreError>;

    /// Record that the meeting has ended.
    async fn mark_ended(&self, room_id: &RoomId) -> Result<(), StoreError>;

    /// Persist a chat message and return the stored record.
    async fn save_chat_message(&self, message: NewChatMessage) -> Result<ChatMessage, StoreError>;

    async fn resolve_team(&self, team_id: &TeamId) -> Result<Option<TeamInfo>, StoreError>;

    /// Meetings still in `scheduled` status that have a start time.
    async fn scheduled_meetings(&self) -> Result<Vec<ScheduledMeeting>, StoreError>;

    /// Flag `reminders[reminder]` of the meeting as sent.
    async fn mark_reminder_sent(&self, room_id: &RoomId, reminder: usize) -> Result<(), StoreError>;

    async fn mark_start_notified(&self, room_id: &RoomId) -> Result<(), StoreError>;
}
