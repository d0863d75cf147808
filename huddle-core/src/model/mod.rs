mod chat;
mod connection;
mod meeting;
mod participant;
mod room;
mod schedule;
mod signaling;
mod team;
mod user;

pub use chat::{ChatMessage, MAX_CHAT_LENGTH, NewChatMessage};
pub use connection::ConnectionId;
pub use meeting::{DEFAULT_MAX_PARTICIPANTS, MeetingInfo, MeetingSettings, MeetingStatus};
pub use participant::{MediaFlag, MediaState, Participant};
pub use room::RoomId;
pub use schedule::{InviteStatus, Invitee, Reminder, ReminderUnit, ScheduledMeeting};
pub use signaling::{ClientEvent, IceServerConfig, RemovalReason, ServerEvent, SignalKind};
pub use team::{TeamId, TeamInfo, TeamMember};
pub use user::{PublicUser, UserId, UserIdentity};
