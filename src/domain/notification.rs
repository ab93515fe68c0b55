use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

pub type Payload = Map<String, Value>;

pub const BROADCAST_EVENT: &str = "notification.new";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Persistent,
    Broadcast,
    Mail,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Persistent => "persistent",
            Channel::Broadcast => "broadcast",
            Channel::Mail => "mail",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for Channel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "persistent" => Ok(Channel::Persistent),
            "broadcast" => Ok(Channel::Broadcast),
            "mail" => Ok(Channel::Mail),
            other => Err(ParseEnumError {
                kind: "channel",
                value: other.to_string(),
            }),
        }
    }
}

const PERSISTENT_BROADCAST_MAIL: &[Channel] = &[Channel::Persistent, Channel::Broadcast, Channel::Mail];
const PERSISTENT_BROADCAST: &[Channel] = &[Channel::Persistent, Channel::Broadcast];
const PERSISTENT_ONLY: &[Channel] = &[Channel::Persistent];
const MAIL_ONLY: &[Channel] = &[Channel::Mail];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    CenterAdminStatusChanged,
    GroupUpdated,
    NewAssignmentCreated,
    NewCenterAdminRegistration,
    NewGroupCreated,
    ParentAccountCreated,
    StudentAbsent,
    StudentLate,
    StudentAccountCreated,
    StudentAddedToGroup,
    TeacherAccountCreated,
}

impl NotificationType {
    pub const ALL: [NotificationType; 11] = [
        NotificationType::CenterAdminStatusChanged,
        NotificationType::GroupUpdated,
        NotificationType::NewAssignmentCreated,
        NotificationType::NewCenterAdminRegistration,
        NotificationType::NewGroupCreated,
        NotificationType::ParentAccountCreated,
        NotificationType::StudentAbsent,
        NotificationType::StudentLate,
        NotificationType::StudentAccountCreated,
        NotificationType::StudentAddedToGroup,
        NotificationType::TeacherAccountCreated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::CenterAdminStatusChanged => "center_admin_status_changed",
            NotificationType::GroupUpdated => "group_updated",
            NotificationType::NewAssignmentCreated => "new_assignment_created",
            NotificationType::NewCenterAdminRegistration => "new_center_admin_registration",
            NotificationType::NewGroupCreated => "new_group_created",
            NotificationType::ParentAccountCreated => "parent_account_created",
            NotificationType::StudentAbsent => "student_absent",
            NotificationType::StudentLate => "student_late",
            NotificationType::StudentAccountCreated => "student_account_created",
            NotificationType::StudentAddedToGroup => "student_added_to_group",
            NotificationType::TeacherAccountCreated => "teacher_account_created",
        }
    }

    /// Routing table: the fixed set of delivery channels for each type.
    pub fn channels(&self) -> &'static [Channel] {
        match self {
            NotificationType::CenterAdminStatusChanged
            | NotificationType::ParentAccountCreated
            | NotificationType::StudentAccountCreated => PERSISTENT_BROADCAST_MAIL,
            NotificationType::GroupUpdated
            | NotificationType::NewAssignmentCreated
            | NotificationType::NewCenterAdminRegistration
            | NotificationType::NewGroupCreated
            | NotificationType::StudentAbsent
            | NotificationType::StudentLate => PERSISTENT_BROADCAST,
            NotificationType::StudentAddedToGroup => PERSISTENT_ONLY,
            NotificationType::TeacherAccountCreated => MAIL_ONLY,
        }
    }

    pub fn has_channel(&self, channel: Channel) -> bool {
        self.channels().contains(&channel)
    }

    /// Types whose event source must only dispatch once the triggering
    /// transaction has committed.
    pub fn after_commit(&self) -> bool {
        matches!(self, NotificationType::StudentAddedToGroup)
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "notification type",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub recipient_id: Uuid,
    pub payload: Payload,
    pub channels: Vec<Channel>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(recipient_id: Uuid, notification_type: NotificationType, payload: Payload) -> Self {
        Self {
            id: Uuid::now_v7(),
            notification_type,
            recipient_id,
            payload,
            channels: notification_type.channels().to_vec(),
            read_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }

    /// One-way transition: an already read notification keeps its first timestamp.
    pub fn mark_read(&mut self, at: DateTime<Utc>) {
        if self.read_at.is_none() {
            self.read_at = Some(at);
        }
    }

    /// Flattened representation published on real-time topics.
    pub fn broadcast_data(&self) -> Value {
        let mut data = self.payload.clone();
        data.insert("id".to_string(), Value::String(self.id.to_string()));
        data.insert("type".to_string(), Value::String(self.notification_type.to_string()));
        data.insert("recipient_id".to_string(), Value::String(self.recipient_id.to_string()));
        data.insert("read_at".to_string(), Value::Null);
        data.insert("created_at".to_string(), Value::String(self.created_at.to_rfc3339()));
        Value::Object(data)
    }
}
