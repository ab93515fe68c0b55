//! Notification definitions: one variant per event kind, each carrying the
//! event data it is rendered from.
//!
//! Rendering is pure. The same definition always yields the same payload, and
//! optional event fields that are absent leave their payload key out.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::mail::MailMessage;
use crate::domain::notification::{NotificationType, Payload};
use crate::domain::topic::Topic;
use crate::domain::user::{Recipient, Role};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRef {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorRef {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRef {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub subject: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRef {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// Initial account password. Only ever rendered into mail bodies.
#[derive(Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password([redacted])")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationDefinition {
    CenterAdminStatusChanged {
        status: String,
        #[serde(default)]
        reason: Option<String>,
    },
    GroupUpdated {
        group: GroupRef,
        #[serde(default)]
        changes: Payload,
    },
    NewAssignmentCreated {
        student: UserRef,
        assignment: AssignmentRef,
        group: GroupRef,
    },
    NewCenterAdminRegistration {
        center_admin: ContactRef,
    },
    NewGroupCreated {
        group: GroupRef,
        teacher: UserRef,
    },
    ParentAccountCreated {
        password: Password,
        student: UserRef,
    },
    StudentAbsent {
        student: UserRef,
        group: GroupRef,
        date: NaiveDate,
    },
    StudentLate {
        student: UserRef,
        group: GroupRef,
        date: NaiveDate,
        minutes_late: u32,
    },
    StudentAccountCreated {
        password: Password,
        created_by: UserRef,
    },
    StudentAddedToGroup {
        added_by: ActorRef,
        #[serde(default)]
        group: Option<GroupRef>,
    },
    TeacherAccountCreated {
        password: Password,
        center_admin: UserRef,
    },
}

struct PayloadBuilder(Payload);

impl PayloadBuilder {
    fn new(title: &str, message: String) -> Self {
        let mut payload = Payload::new();
        payload.insert("title".to_string(), Value::String(title.to_string()));
        payload.insert("message".to_string(), Value::String(message));
        Self(payload)
    }

    fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    fn set_opt(self, key: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(value) => self.set(key, value),
            None => self,
        }
    }

    fn build(self) -> Payload {
        self.0
    }
}

const GROUP_CHANGE_LABELS: [(&str, &str); 4] = [
    ("name", "Name"),
    ("description", "Description"),
    ("subject", "Subject"),
    ("schedule", "Schedule"),
];

impl NotificationDefinition {
    pub fn kind(&self) -> NotificationType {
        match self {
            Self::CenterAdminStatusChanged { .. } => NotificationType::CenterAdminStatusChanged,
            Self::GroupUpdated { .. } => NotificationType::GroupUpdated,
            Self::NewAssignmentCreated { .. } => NotificationType::NewAssignmentCreated,
            Self::NewCenterAdminRegistration { .. } => NotificationType::NewCenterAdminRegistration,
            Self::NewGroupCreated { .. } => NotificationType::NewGroupCreated,
            Self::ParentAccountCreated { .. } => NotificationType::ParentAccountCreated,
            Self::StudentAbsent { .. } => NotificationType::StudentAbsent,
            Self::StudentLate { .. } => NotificationType::StudentLate,
            Self::StudentAccountCreated { .. } => NotificationType::StudentAccountCreated,
            Self::StudentAddedToGroup { .. } => NotificationType::StudentAddedToGroup,
            Self::TeacherAccountCreated { .. } => NotificationType::TeacherAccountCreated,
        }
    }

    pub fn render(&self) -> Payload {
        match self {
            Self::CenterAdminStatusChanged { status, reason } => {
                let approved = status == "approved";
                let (title, message, icon) = if approved {
                    (
                        "Your request was approved",
                        "Your registration as a center admin has been approved. You can now sign in and start managing your center.".to_string(),
                        "check-circle",
                    )
                } else {
                    let message = match reason {
                        Some(reason) => format!("Your registration request has been rejected: {}", reason),
                        None => "Your registration request has been rejected".to_string(),
                    };
                    ("Your request was rejected", message, "x-circle")
                };

                PayloadBuilder::new(title, message)
                    .set("status", status.as_str())
                    .set_opt("reason", reason.as_deref())
                    .set("icon", icon)
                    .build()
            }
            Self::GroupUpdated { group, changes } => {
                let labels: Vec<&str> = GROUP_CHANGE_LABELS
                    .iter()
                    .filter(|(field, _)| changes.contains_key(*field))
                    .map(|(_, label)| *label)
                    .collect();
                let message = if labels.is_empty() {
                    format!("The details of group {} were updated", group.name)
                } else {
                    format!("The details of group {} were updated: {}", group.name, labels.join(", "))
                };

                PayloadBuilder::new("Group updated", message)
                    .set("group_id", group.id.to_string())
                    .set("group_name", group.name.as_str())
                    .set("changes", Value::Object(changes.clone()))
                    .set("icon", "pencil-square")
                    .build()
            }
            Self::NewAssignmentCreated { student, assignment, group } => PayloadBuilder::new(
                "New assignment",
                format!(
                    "A new assignment ({}) was added for your child {} in group {}",
                    assignment.title, student.name, group.name
                ),
            )
            .set("student_id", student.id.to_string())
            .set("student_name", student.name.as_str())
            .set("assignment_id", assignment.id.to_string())
            .set("assignment_title", assignment.title.as_str())
            .set("group_id", group.id.to_string())
            .set("group_name", group.name.as_str())
            .set_opt(
                "due_date",
                assignment.due_date.map(|date| date.format(DATE_FORMAT).to_string()),
            )
            .set("icon", "document-text")
            .build(),
            Self::NewCenterAdminRegistration { center_admin } => PayloadBuilder::new(
                "New center admin registration",
                format!(
                    "A new center admin ({}) has registered and is awaiting approval",
                    center_admin.name
                ),
            )
            .set("center_admin_id", center_admin.id.to_string())
            .set("center_admin_name", center_admin.name.as_str())
            .set("center_admin_email", center_admin.email.as_str())
            .set("icon", "user-plus")
            .build(),
            Self::NewGroupCreated { group, teacher } => PayloadBuilder::new(
                "New group created",
                format!("Teacher {} created a new group: {}", teacher.name, group.name),
            )
            .set("group_id", group.id.to_string())
            .set("group_name", group.name.as_str())
            .set_opt("group_subject", group.subject.as_deref())
            .set("teacher_id", teacher.id.to_string())
            .set("teacher_name", teacher.name.as_str())
            .set("icon", "user-group")
            .build(),
            Self::ParentAccountCreated { student, .. } => PayloadBuilder::new(
                "Welcome to SAMS",
                format!(
                    "Your account has been created. You can now follow the progress of your child {}",
                    student.name
                ),
            )
            .set("student_name", student.name.as_str())
            .set("icon", "users")
            .build(),
            Self::StudentAbsent { student, group, date } => PayloadBuilder::new(
                "Student absent",
                format!(
                    "Student {} was absent from group {} on {}",
                    student.name,
                    group.name,
                    date.format(DATE_FORMAT)
                ),
            )
            .set("student_id", student.id.to_string())
            .set("student_name", student.name.as_str())
            .set("group_id", group.id.to_string())
            .set("group_name", group.name.as_str())
            .set("date", date.format(DATE_FORMAT).to_string())
            .set("icon", "exclamation-triangle")
            .build(),
            Self::StudentLate {
                student,
                group,
                date,
                minutes_late,
            } => PayloadBuilder::new(
                "Student late",
                format!(
                    "Student {} was {} minutes late to group {} on {}",
                    student.name,
                    minutes_late,
                    group.name,
                    date.format(DATE_FORMAT)
                ),
            )
            .set("student_id", student.id.to_string())
            .set("student_name", student.name.as_str())
            .set("group_id", group.id.to_string())
            .set("group_name", group.name.as_str())
            .set("date", date.format(DATE_FORMAT).to_string())
            .set("minutes_late", *minutes_late)
            .set("icon", "clock")
            .build(),
            Self::StudentAccountCreated { .. } => PayloadBuilder::new(
                "Welcome to SAMS",
                "Your account has been created. You can now sign in and join groups".to_string(),
            )
            .set("icon", "academic-cap")
            .build(),
            Self::StudentAddedToGroup { added_by, group } => {
                let message = match group {
                    Some(group) => format!("You have been added to the group {} by {}.", group.name, added_by.name),
                    None => format!("You have been added to a group by {}.", added_by.name),
                };

                let mut actor = json!({
                    "id": added_by.id.to_string(),
                    "name": added_by.name,
                });
                if let (Some(role), Value::Object(fields)) = (added_by.role, &mut actor) {
                    fields.insert("role".to_string(), Value::String(role.to_string()));
                }

                PayloadBuilder::new("You have been added to a group", message)
                    .set_opt("group_id", group.as_ref().map(|g| g.id.to_string()))
                    .set_opt("group_name", group.as_ref().map(|g| g.name.clone()))
                    .set("added_by", actor)
                    .build()
            }
            Self::TeacherAccountCreated { center_admin, .. } => PayloadBuilder::new(
                "Welcome to SAMS",
                format!("A teacher account was created for you by {}", center_admin.name),
            )
            .build(),
        }
    }

    /// Real-time topic for a recipient, `None` for types without broadcast.
    pub fn topic(&self, recipient_id: Uuid) -> Option<Topic> {
        match self {
            Self::GroupUpdated { group, .. } => Some(Topic::Group(group.id)),
            Self::NewCenterAdminRegistration { .. } => Some(Topic::Admin),
            Self::StudentAddedToGroup { .. } | Self::TeacherAccountCreated { .. } => None,
            _ => Some(Topic::User(recipient_id)),
        }
    }

    pub fn mail(&self, recipient: &Recipient, login_url: &str) -> Option<MailMessage> {
        let greeting = format!("Hello {},", recipient.name);

        match self {
            Self::CenterAdminStatusChanged { status, .. } if status == "approved" => Some(
                MailMessage::new("Your request was approved - SAMS", greeting)
                    .line("Your registration as a center admin has been approved.")
                    .line("You can now sign in and start managing your center.")
                    .action("Sign in", login_url)
                    .line("Thank you for using SAMS!"),
            ),
            Self::CenterAdminStatusChanged { reason, .. } => Some(
                MailMessage::new("Your request was rejected - SAMS", greeting)
                    .line("We are sorry to inform you that your registration request has been rejected.")
                    .line_opt(reason.as_ref().map(|reason| format!("Reason: {}", reason)))
                    .line("If you have any questions, please contact the administration."),
            ),
            Self::ParentAccountCreated { password, student } => Some(credentials_mail(
                greeting,
                format!(
                    "A parent account has been created for you in SAMS to follow the progress of your child {}.",
                    student.name
                ),
                recipient,
                password,
                login_url,
            )),
            Self::StudentAccountCreated { password, .. } => Some(credentials_mail(
                greeting,
                "A student account has been created for you in SAMS.".to_string(),
                recipient,
                password,
                login_url,
            )),
            Self::TeacherAccountCreated { password, center_admin } => Some(credentials_mail(
                greeting,
                format!(
                    "A teacher account has been created for you in SAMS by {}.",
                    center_admin.name
                ),
                recipient,
                password,
                login_url,
            )),
            _ => None,
        }
    }
}

fn credentials_mail(
    greeting: String,
    intro: String,
    recipient: &Recipient,
    password: &Password,
    login_url: &str,
) -> MailMessage {
    MailMessage::new("Welcome to SAMS - your account is ready", greeting)
        .line(intro)
        .line("Your sign-in details:")
        .line(format!("Email: {}", recipient.email))
        .line(format!("Password: {}", password.expose()))
        .line("Please change your password after your first sign-in.")
        .action("Sign in", login_url)
        .line("Thank you for joining SAMS!")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notification::Channel;

    fn student() -> UserRef {
        UserRef {
            id: Uuid::new_v4(),
            name: "Omar".to_string(),
        }
    }

    fn group() -> GroupRef {
        GroupRef {
            id: Uuid::new_v4(),
            name: "Physics A".to_string(),
            subject: None,
        }
    }

    fn recipient() -> Recipient {
        Recipient {
            id: Uuid::new_v4(),
            name: "Sara".to_string(),
            email: "sara@example.com".to_string(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()
    }

    fn all_definitions() -> Vec<NotificationDefinition> {
        vec![
            NotificationDefinition::CenterAdminStatusChanged {
                status: "approved".to_string(),
                reason: None,
            },
            NotificationDefinition::GroupUpdated {
                group: group(),
                changes: Payload::new(),
            },
            NotificationDefinition::NewAssignmentCreated {
                student: student(),
                assignment: AssignmentRef {
                    id: Uuid::new_v4(),
                    title: "Homework 1".to_string(),
                    due_date: None,
                },
                group: group(),
            },
            NotificationDefinition::NewCenterAdminRegistration {
                center_admin: ContactRef {
                    id: Uuid::new_v4(),
                    name: "Laila".to_string(),
                    email: "laila@example.com".to_string(),
                },
            },
            NotificationDefinition::NewGroupCreated {
                group: group(),
                teacher: student(),
            },
            NotificationDefinition::ParentAccountCreated {
                password: Password::new("s3cret-pass"),
                student: student(),
            },
            NotificationDefinition::StudentAbsent {
                student: student(),
                group: group(),
                date: date(),
            },
            NotificationDefinition::StudentLate {
                student: student(),
                group: group(),
                date: date(),
                minutes_late: 12,
            },
            NotificationDefinition::StudentAccountCreated {
                password: Password::new("s3cret-pass"),
                created_by: student(),
            },
            NotificationDefinition::StudentAddedToGroup {
                added_by: ActorRef {
                    id: Uuid::new_v4(),
                    name: "Mr. Karim".to_string(),
                    role: None,
                },
                group: None,
            },
            NotificationDefinition::TeacherAccountCreated {
                password: Password::new("s3cret-pass"),
                center_admin: student(),
            },
        ]
    }

    #[test]
    fn test_every_definition_renders_title_and_message() {
        let definitions = all_definitions();
        assert_eq!(definitions.len(), NotificationType::ALL.len());

        for definition in definitions {
            let payload = definition.render();
            assert!(payload["title"].is_string(), "{} has no title", definition.kind());
            assert!(payload["message"].is_string(), "{} has no message", definition.kind());
        }
    }

    #[test]
    fn test_render_is_deterministic() {
        for definition in all_definitions() {
            assert_eq!(definition.render(), definition.render());
        }
    }

    #[test]
    fn test_rendered_payload_never_contains_password() {
        for definition in all_definitions() {
            let rendered = serde_json::to_string(&definition.render()).unwrap();
            assert!(!rendered.contains("s3cret-pass"), "{} leaks the password", definition.kind());
        }
    }

    #[test]
    fn test_missing_due_date_is_omitted() {
        let mut assignment = AssignmentRef {
            id: Uuid::new_v4(),
            title: "Homework 1".to_string(),
            due_date: None,
        };
        let without = NotificationDefinition::NewAssignmentCreated {
            student: student(),
            assignment: assignment.clone(),
            group: group(),
        };
        assert!(!without.render().contains_key("due_date"));

        assignment.due_date = Some(date());
        let with = NotificationDefinition::NewAssignmentCreated {
            student: student(),
            assignment,
            group: group(),
        };
        assert_eq!(with.render()["due_date"], "2025-03-09");
    }

    #[test]
    fn test_rejection_without_reason_omits_reason() {
        let definition = NotificationDefinition::CenterAdminStatusChanged {
            status: "rejected".to_string(),
            reason: None,
        };
        let payload = definition.render();

        assert!(!payload.contains_key("reason"));
        assert_eq!(payload["icon"], "x-circle");
        assert_eq!(payload["message"], "Your registration request has been rejected");
    }

    #[test]
    fn test_rejection_with_reason() {
        let definition = NotificationDefinition::CenterAdminStatusChanged {
            status: "rejected".to_string(),
            reason: Some("incomplete documents".to_string()),
        };
        let payload = definition.render();

        assert_eq!(payload["reason"], "incomplete documents");
        assert_eq!(
            payload["message"],
            "Your registration request has been rejected: incomplete documents"
        );
    }

    #[test]
    fn test_student_absent_payload() {
        let student = student();
        let group = group();
        let definition = NotificationDefinition::StudentAbsent {
            student: student.clone(),
            group: group.clone(),
            date: date(),
        };
        let payload = definition.render();

        assert_eq!(payload["student_id"], student.id.to_string());
        assert_eq!(payload["group_id"], group.id.to_string());
        assert_eq!(payload["date"], "2025-03-09");
        assert_eq!(
            payload["message"],
            "Student Omar was absent from group Physics A on 2025-03-09"
        );
    }

    #[test]
    fn test_group_update_lists_known_changes_only() {
        let mut changes = Payload::new();
        changes.insert("schedule".to_string(), json!("Mon 10:00"));
        changes.insert("name".to_string(), json!("Physics B"));
        changes.insert("capacity".to_string(), json!(30));

        let definition = NotificationDefinition::GroupUpdated { group: group(), changes };
        let payload = definition.render();

        assert_eq!(
            payload["message"],
            "The details of group Physics A were updated: Name, Schedule"
        );
        assert_eq!(payload["changes"]["capacity"], 30);
    }

    #[test]
    fn test_added_to_group_without_group() {
        let definition = NotificationDefinition::StudentAddedToGroup {
            added_by: ActorRef {
                id: Uuid::new_v4(),
                name: "Mr. Karim".to_string(),
                role: Some(Role::Teacher),
            },
            group: None,
        };
        let payload = definition.render();

        assert!(!payload.contains_key("group_id"));
        assert!(!payload.contains_key("group_name"));
        assert_eq!(payload["added_by"]["role"], "teacher");
        assert_eq!(payload["message"], "You have been added to a group by Mr. Karim.");
    }

    #[test]
    fn test_topics_follow_routing_table() {
        let recipient_id = Uuid::new_v4();

        for definition in all_definitions() {
            let topic = definition.topic(recipient_id);
            assert_eq!(
                topic.is_some(),
                definition.kind().has_channel(Channel::Broadcast),
                "{} topic does not match its channels",
                definition.kind()
            );
        }

        let group = group();
        let updated = NotificationDefinition::GroupUpdated {
            group: group.clone(),
            changes: Payload::new(),
        };
        assert_eq!(updated.topic(recipient_id), Some(Topic::Group(group.id)));
    }

    #[test]
    fn test_mail_exists_exactly_for_mail_types() {
        let recipient = recipient();

        for definition in all_definitions() {
            assert_eq!(
                definition.mail(&recipient, "https://sams.example/login").is_some(),
                definition.kind().has_channel(Channel::Mail),
                "{} mail does not match its channels",
                definition.kind()
            );
        }
    }

    #[test]
    fn test_credentials_mail_contains_login_details() {
        let recipient = recipient();
        let definition = NotificationDefinition::TeacherAccountCreated {
            password: Password::new("s3cret-pass"),
            center_admin: student(),
        };

        let mail = definition.mail(&recipient, "https://sams.example/login").unwrap();
        let body = mail.text_body();

        assert!(body.starts_with("Hello Sara,"));
        assert!(body.contains("Email: sara@example.com"));
        assert!(body.contains("Password: s3cret-pass"));
        assert!(body.contains("Sign in: https://sams.example/login"));
    }

    #[test]
    fn test_rejection_mail_includes_reason() {
        let definition = NotificationDefinition::CenterAdminStatusChanged {
            status: "rejected".to_string(),
            reason: Some("duplicate center".to_string()),
        };

        let mail = definition.mail(&recipient(), "https://sams.example/login").unwrap();

        assert!(mail.intro_lines.contains(&"Reason: duplicate center".to_string()));
        assert!(mail.action.is_none());
    }

    #[test]
    fn test_deserialize_tagged_definition() {
        let student_id = Uuid::new_v4();
        let group_id = Uuid::new_v4();
        let definition: NotificationDefinition = serde_json::from_value(json!({
            "type": "student_late",
            "student": { "id": student_id, "name": "Omar" },
            "group": { "id": group_id, "name": "Physics A" },
            "date": "2025-03-09",
            "minutes_late": 7
        }))
        .unwrap();

        assert_eq!(definition.kind(), NotificationType::StudentLate);
        assert_eq!(definition.render()["minutes_late"], 7);
    }

    #[test]
    fn test_password_debug_is_redacted() {
        let password = Password::new("s3cret-pass");
        assert_eq!(format!("{:?}", password), "Password([redacted])");
    }
}
