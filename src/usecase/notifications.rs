use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::notification::Notification;
use crate::repository::errors::RepositoryError;
use crate::usecase::contracts::NotificationRepository;
use crate::usecase::error::UsecaseError;

pub const DEFAULT_PER_PAGE: i64 = 15;
pub const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

impl NotificationPage {
    pub fn last_page(&self) -> i64 {
        if self.total == 0 {
            return 1;
        }
        (self.total + self.per_page - 1) / self.per_page
    }
}

fn not_found(e: RepositoryError) -> UsecaseError {
    match e {
        RepositoryError::NotFound => UsecaseError::NotFound("Notification".to_string()),
        other => other.into(),
    }
}

pub struct NotificationsUseCase<N>
where
    N: NotificationRepository + ?Sized,
{
    notification_repository: Arc<N>,
}

impl<N> NotificationsUseCase<N>
where
    N: NotificationRepository + ?Sized,
{
    pub fn new(notification_repository: Arc<N>) -> Self {
        Self { notification_repository }
    }

    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_notifications(
        &self,
        user_id: Uuid,
        page: Option<i64>,
        per_page: Option<i64>,
    ) -> Result<NotificationPage, UsecaseError> {
        tracing::debug!("listing notifications");

        let page = page.unwrap_or(1);
        if page < 1 {
            return Err(UsecaseError::validation("page", "The page must be at least 1."));
        }
        let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE);
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(UsecaseError::validation(
                "per_page",
                format!("The per page must be between 1 and {}.", MAX_PER_PAGE),
            ));
        }

        let offset = (page - 1).saturating_mul(per_page);
        let notifications = self
            .notification_repository
            .find_by_user_id(user_id, per_page, offset)
            .await?;
        let total = self.notification_repository.count_by_user_id(user_id).await?;

        tracing::debug!(user_id = %user_id, count = notifications.len(), total, "retrieved notifications");
        Ok(NotificationPage {
            notifications,
            total,
            page,
            per_page,
        })
    }

    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn count_unread(&self, user_id: Uuid) -> Result<i64, UsecaseError> {
        tracing::debug!("counting unread notifications");

        let count = self.notification_repository.count_unread(user_id).await?;

        tracing::debug!(user_id = %user_id, count, "unread count retrieved");
        Ok(count)
    }

    #[tracing::instrument(skip(self), fields(notification_id = %id, user_id = %user_id))]
    pub async fn mark_as_read(&self, id: Uuid, user_id: Uuid) -> Result<(), UsecaseError> {
        tracing::debug!("marking notification as read");

        self.notification_repository
            .mark_as_read(id, user_id, Utc::now())
            .await
            .map_err(not_found)?;

        tracing::debug!(notification_id = %id, "notification marked as read");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn mark_all_as_read(&self, user_id: Uuid) -> Result<u64, UsecaseError> {
        tracing::debug!("marking all notifications as read");

        let updated = self
            .notification_repository
            .mark_all_as_read(user_id, Utc::now())
            .await?;

        tracing::info!(user_id = %user_id, updated, "all notifications marked as read");
        Ok(updated)
    }

    #[tracing::instrument(skip(self), fields(notification_id = %id, user_id = %user_id))]
    pub async fn delete_notification(&self, id: Uuid, user_id: Uuid) -> Result<(), UsecaseError> {
        tracing::debug!("deleting notification");

        self.notification_repository
            .delete(id, user_id)
            .await
            .map_err(not_found)?;

        tracing::info!(notification_id = %id, "notification deleted");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn delete_all(&self, user_id: Uuid) -> Result<u64, UsecaseError> {
        tracing::debug!("deleting all notifications");

        let deleted = self.notification_repository.delete_all(user_id).await?;

        tracing::info!(user_id = %user_id, deleted, "all notifications deleted");
        Ok(deleted)
    }
}
