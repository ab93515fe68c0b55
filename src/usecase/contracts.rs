use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    domain::{group::Group, mail::MailMessage, notification::Notification, topic::Topic, user::Recipient},
    repository::errors::RepositoryError,
    usecase::error::{BroadcastError, MailError},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &Notification) -> Result<(), RepositoryError>;
    /// Newest first, ties broken by descending id.
    async fn find_by_user_id(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, RepositoryError>;
    async fn count_by_user_id(&self, user_id: Uuid) -> Result<i64, RepositoryError>;
    async fn count_unread(&self, user_id: Uuid) -> Result<i64, RepositoryError>;
    /// Fails with `NotFound` when the notification does not belong to `user_id`.
    async fn mark_as_read(
        &self,
        id: Uuid,
        user_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    async fn mark_all_as_read(&self, user_id: Uuid, read_at: DateTime<Utc>) -> Result<u64, RepositoryError>;
    async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<(), RepositoryError>;
    async fn delete_all(&self, user_id: Uuid) -> Result<u64, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_recipient(&self, id: Uuid) -> Result<Option<Recipient>, RepositoryError>;
    async fn find_recipients(&self, ids: &[Uuid]) -> Result<Vec<Recipient>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Group>, RepositoryError>;
    async fn is_member_or_teacher(&self, group_id: Uuid, user_id: Uuid) -> Result<bool, RepositoryError>;
    /// Commits the enrollment. Returns `false` when the student was already enrolled.
    async fn enroll_student(&self, group_id: Uuid, student_id: Uuid) -> Result<bool, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn publish(&self, topic: &Topic, message: &str) -> Result<(), BroadcastError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &Recipient, mail: &MailMessage) -> Result<(), MailError>;
}
