use crate::model::{RoomId, TeamId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReminderUnit {
    Minutes,
    Hours,
    Days,
}

/// "Remind `time` `unit` before the start".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reminder {
    pub time: u32,
    pub unit: ReminderUnit,
    #[serde(default)]
    pub sent: bool,
}

impl Reminder {
    pub fn offset_minutes(&self) -> i64 {
        let time = i64::from(self.time);
        match self.unit {
            ReminderUnit::Minutes => time,
            ReminderUnit::Hours => time * 60,
            ReminderUnit::Days => time * 60 * 24,
        }
    }

    /// e.g. `15 minutes`
    pub fn label(&self) -> String {
        let unit = match self.unit {
            ReminderUnit::Minutes => "minutes",
            ReminderUnit::Hours => "hours",
            ReminderUnit::Days => "days",
        };
        format!("{} {}", self.time, unit)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Invitee {
    pub user_id: UserId,
    #[serde(default)]
    pub status: InviteStatus,
}

/// A meeting that has not started yet, with its reminder bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledMeeting {
    pub room_id: RoomId,
    pub meeting_id: String,
    #[serde(default)]
    pub title: String,
    pub host: UserId,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamId>,
    #[serde(default)]
    pub invitees: Vec<Invitee>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(default)]
    pub start_notified: bool,
}

impl ScheduledMeeting {
    /// The host followed by every invitee who accepted, without duplicates.
    pub fn attendees(&self) -> Vec<UserId> {
        let mut users = vec![self.host.clone()];
        for invitee in &self.invitees {
            if invitee.status == InviteStatus::Accepted && !users.contains(&invitee.user_id) {
                users.push(invitee.user_id.clone());
            }
        }
        users
    }
}
