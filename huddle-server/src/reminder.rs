use crate::error::StoreError;
use crate::fanout::Fanout;
use crate::gateway::MeetingStore;
use chrono::{DateTime, TimeDelta, Utc};
use huddle_core::{Reminder, ReminderUnit, ScheduledMeeting, ServerEvent, UserId};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(60);

/// What one scan delivered.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    pub reminders: usize,
    pub starts: usize,
}

/// Periodically scans scheduled meetings and pushes `meeting_reminder` and
/// `meeting_started` notifications to the users' personal fanout targets.
///
/// Users without a live connection miss the notification; each reminder is sent once.
pub struct ReminderService {
    store: Arc<dyn MeetingStore>,
    fanout: Fanout,
    interval: Duration,
}

impl ReminderService {
    pub fn new(store: Arc<dyn MeetingStore>, fanout: Fanout) -> Self {
        Self {
            store,
            fanout,
            interval: DEFAULT_SCAN_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval = ?self.interval, "Reminder service started");
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                match self.scan(Utc::now()).await {
                    Ok(report) if report != ScanReport::default() => {
                        info!(
                            reminders = report.reminders,
                            starts = report.starts,
                            "Meeting notifications sent"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Reminder scan failed: {}", e),
                }
            }
        })
    }

    pub async fn scan(&self, now: DateTime<Utc>) -> Result<ScanReport, StoreError> {
        let meetings = self.store.scheduled_meetings().await?;
        let mut report = ScanReport::default();

        for meeting in &meetings {
            for (index, reminder) in meeting.reminders.iter().enumerate() {
                if reminder.sent || !reminder_due(meeting, reminder, now) {
                    continue;
                }
                self.send_reminder(meeting, reminder).await;
                report.reminders += 1;
                if let Err(e) = self.store.mark_reminder_sent(&meeting.room_id, index).await {
                    warn!(room = %meeting.room_id, index, "Failed to mark reminder sent: {}", e);
                }
            }

            if !meeting.start_notified && starting_now(meeting, now) {
                self.notify_start(meeting);
                report.starts += 1;
                if let Err(e) = self.store.mark_start_notified(&meeting.room_id).await {
                    warn!(room = %meeting.room_id, "Failed to mark start notified: {}", e);
                }
            }
        }

        Ok(report)
    }

    async fn send_reminder(&self, meeting: &ScheduledMeeting, reminder: &Reminder) {
        let mut recipients = meeting.attendees();
        if let Some(team_id) = &meeting.team {
            match self.store.resolve_team(team_id).await {
                Ok(Some(team)) => {
                    for member in team.members {
                        if member.meeting_notifications && !recipients.contains(&member.user_id) {
                            recipients.push(member.user_id);
                        }
                    }
                }
                Ok(None) => debug!(team = %team_id, "Team of scheduled meeting is gone"),
                Err(e) => warn!(team = %team_id, "Team lookup failed: {}", e),
            }
        }

        let priority = match reminder.unit {
            ReminderUnit::Minutes if reminder.time <= 15 => "high",
            _ => "normal",
        };
        let payload = json!({
            "type": "meeting_reminder",
            "title": "Meeting Reminder",
            "message": format!("\"{}\" starts in {}", meeting.title, reminder.label()),
            "meeting_id": meeting.meeting_id,
            "room_id": meeting.room_id,
            "link": meeting.link,
            "priority": priority,
        });
        self.deliver(&recipients, payload);
    }

    fn notify_start(&self, meeting: &ScheduledMeeting) {
        let payload = json!({
            "type": "meeting_started",
            "title": "Meeting Started",
            "message": format!("\"{}\" is starting now!", meeting.title),
            "meeting_id": meeting.meeting_id,
            "room_id": meeting.room_id,
            "link": meeting.link,
            "priority": "urgent",
        });
        self.deliver(&meeting.attendees(), payload);
    }

    fn deliver(&self, recipients: &[UserId], payload: serde_json::Value) {
        let reached = self
            .fanout
            .to_users(recipients, &ServerEvent::Notification(payload));
        debug!(recipients = recipients.len(), reached, "Meeting notification delivered");
    }
}

/// Whole minutes until the start, rounded down.
fn minutes_until(meeting: &ScheduledMeeting, now: DateTime<Utc>) -> i64 {
    (meeting.scheduled_at - now)
        .num_milliseconds()
        .div_euclid(60_000)
}

/// Due during the minute before its offset is reached.
fn reminder_due(meeting: &ScheduledMeeting, reminder: &Reminder, now: DateTime<Utc>) -> bool {
    let offset = reminder.offset_minutes();
    let minutes = minutes_until(meeting, now);
    minutes <= offset && minutes >= offset - 1
}

fn starting_now(meeting: &ScheduledMeeting, now: DateTime<Utc>) -> bool {
    meeting.scheduled_at <= now && meeting.scheduled_at >= now - TimeDelta::minutes(1)
}
