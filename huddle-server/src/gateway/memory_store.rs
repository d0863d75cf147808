use crate::error::StoreError;
use crate::gateway::MeetingStore;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use huddle_core::{
    ChatMessage, MeetingInfo, MeetingStatus, NewChatMessage, RoomId, ScheduledMeeting, TeamId,
    TeamInfo,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

/// Process-local meeting store for development and tests.
#[derive(Default)]
pub struct InMemoryMeetingStore {
    meetings: DashMap<RoomId, MeetingInfo>,
    messages: DashMap<RoomId, Vec<ChatMessage>>,
    teams: DashMap<TeamId, TeamInfo>,
    schedule: DashMap<RoomId, ScheduledMeeting>,
    resolve_calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryMeetingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, meeting: MeetingInfo) {
        self.meetings.insert(meeting.room_id.clone(), meeting);
    }

    pub fn insert_team(&self, team: TeamInfo) {
        self.teams.insert(team.team_id.clone(), team);
    }

    /// Adds or replaces the schedule of a not yet started meeting.
    pub fn schedule(&self, meeting: ScheduledMeeting) {
        self.schedule.insert(meeting.room_id.clone(), meeting);
    }

    pub fn scheduled(&self, room_id: &RoomId) -> Option<ScheduledMeeting> {
        self.schedule.get(room_id).map(|m| m.clone())
    }

    pub fn meeting(&self, room_id: &RoomId) -> Option<MeetingInfo> {
        self.meetings.get(room_id).map(|m| m.clone())
    }

    pub fn messages(&self, room_id: &RoomId) -> Vec<ChatMessage> {
        self.messages
            .get(room_id)
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// How many times `resolve_meeting` has been called.
    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    /// Simulate an outage: every call fails with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store marked down".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl MeetingStore for InMemoryMeetingStore {
    async fn resolve_meeting(&self, room_id: &RoomId) -> Result<Option<MeetingInfo>, StoreError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.meeting(room_id))
    }

    async fn mark_ended(&self, room_id: &RoomId) -> Result<(), StoreError> {
        self.check_available()?;
        let mut meeting = self
            .meetings
            .get_mut(room_id)
            .ok_or_else(|| StoreError::NotFound(room_id.clone()))?;
        meeting.status = MeetingStatus::Ended;
        drop(meeting);
        self.schedule.remove(room_id);
        Ok(())
    }

    async fn save_chat_message(&self, message: NewChatMessage) -> Result<ChatMessage, StoreError> {
        self.check_available()?;
        let stored = ChatMessage {
            id: Uuid::new_v4().to_string(),
            room_id: message.room_id.clone(),
            sender: message.sender,
            content: message.content,
            is_private: message.recipient.is_some(),
            recipient: message.recipient,
            created_at: Utc::now(),
        };
        self.messages
            .entry(message.room_id)
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn resolve_team(&self, team_id: &TeamId) -> Result<Option<TeamInfo>, StoreError> {
        self.check_available()?;
        Ok(self.teams.get(team_id).map(|t| t.clone()))
    }

    async fn scheduled_meetings(&self) -> Result<Vec<ScheduledMeeting>, StoreError> {
        self.check_available()?;
        Ok(self.schedule.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn mark_reminder_sent(
        &self,
        room_id: &RoomId,
        reminder: usize,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        let mut meeting = self
            .schedule
            .get_mut(room_id)
            .ok_or_else(|| StoreError::NotFound(room_id.clone()))?;
        if let Some(reminder) = meeting.reminders.get_mut(reminder) {
            reminder.sent = true;
        }
        Ok(())
    }

    async fn mark_start_notified(&self, room_id: &RoomId) -> Result<(), StoreError> {
        self.check_available()?;
        let mut meeting = self
            .schedule
            .get_mut(room_id)
            .ok_or_else(|| StoreError::NotFound(room_id.clone()))?;
        meeting.start_notified = true;
        Ok(())
    }
}
