use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, postgres::PgPoolOptions, types::Json};
use uuid::Uuid;

use crate::{
    domain::{
        group::Group,
        notification::{Channel, Notification, NotificationType, Payload},
        user::Recipient,
    },
    repository::errors::RepositoryError,
    usecase::contracts::{GroupRepository, NotificationRepository, UserDirectory},
};

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    notification_type: String,
    payload: Json<Payload>,
    channels: Vec<String>,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = RepositoryError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let notification_type = row
            .notification_type
            .parse::<NotificationType>()
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;
        let channels = row
            .channels
            .iter()
            .map(|channel| channel.parse::<Channel>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(Notification {
            id: row.id,
            notification_type,
            recipient_id: row.user_id,
            payload: row.payload.0,
            channels,
            read_at: row.read_at,
            created_at: row.created_at,
        })
    }
}

pub struct PostgresNotificationRepository {
    pool: PgPool,
}

impl PostgresNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    #[tracing::instrument(skip(self, notification), fields(notification_id = %notification.id, user_id = %notification.recipient_id))]
    async fn create(&self, notification: &Notification) -> Result<(), RepositoryError> {
        tracing::debug!("creating notification");

        let channels: Vec<&str> = notification.channels.iter().map(Channel::as_str).collect();

        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, notification_type, payload, channels, read_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(notification.id)
        .bind(notification.recipient_id)
        .bind(notification.notification_type.as_str())
        .bind(Json(&notification.payload))
        .bind(&channels)
        .bind(notification.read_at)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(notification_id = %notification.id, "notification created successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    async fn find_by_user_id(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, RepositoryError> {
        tracing::debug!(limit, offset, "finding notifications by user_id");

        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, user_id, notification_type, payload, channels, read_at, created_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(user_id = %user_id, count = rows.len(), "found notifications");
        rows.into_iter().map(Notification::try_from).collect()
    }

    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    async fn count_by_user_id(&self, user_id: Uuid) -> Result<i64, RepositoryError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))
    }

    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    async fn count_unread(&self, user_id: Uuid) -> Result<i64, RepositoryError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))
    }

    #[tracing::instrument(skip(self), fields(notification_id = %id, user_id = %user_id))]
    async fn mark_as_read(
        &self,
        id: Uuid,
        user_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        tracing::debug!("marking notification as read");

        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET read_at = COALESCE(read_at, $3)
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(read_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    async fn mark_all_as_read(&self, user_id: Uuid, read_at: DateTime<Utc>) -> Result<u64, RepositoryError> {
        tracing::debug!("marking all notifications as read");

        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET read_at = $2
            WHERE user_id = $1 AND read_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(read_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(updated = result.rows_affected(), "notifications marked as read");
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self), fields(notification_id = %id, user_id = %user_id))]
    async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<(), RepositoryError> {
        tracing::debug!("deleting notification");

        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    async fn delete_all(&self, user_id: Uuid) -> Result<u64, RepositoryError> {
        tracing::debug!("deleting all notifications");

        let result = sqlx::query("DELETE FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

/// Read-only view over the users table owned by the core SAMS application.
pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    #[tracing::instrument(skip(self), fields(user_id = %id))]
    async fn find_recipient(&self, id: Uuid) -> Result<Option<Recipient>, RepositoryError> {
        sqlx::query_as::<_, Recipient>("SELECT id, name, email FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))
    }

    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    async fn find_recipients(&self, ids: &[Uuid]) -> Result<Vec<Recipient>, RepositoryError> {
        sqlx::query_as::<_, Recipient>("SELECT id, name, email FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))
    }
}

pub struct PostgresGroupRepository {
    pool: PgPool,
}

impl PostgresGroupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GroupRepository for PostgresGroupRepository {
    #[tracing::instrument(skip(self), fields(group_id = %id))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Group>, RepositoryError> {
        sqlx::query_as::<_, Group>("SELECT id, name, subject, teacher_id FROM groups WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))
    }

    #[tracing::instrument(skip(self), fields(group_id = %group_id, user_id = %user_id))]
    async fn is_member_or_teacher(&self, group_id: Uuid, user_id: Uuid) -> Result<bool, RepositoryError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM groups WHERE id = $1 AND teacher_id = $2
                UNION ALL
                SELECT 1 FROM group_student WHERE group_id = $1 AND student_id = $2
            )
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))
    }

    #[tracing::instrument(skip(self), fields(group_id = %group_id, student_id = %student_id))]
    async fn enroll_student(&self, group_id: Uuid, student_id: Uuid) -> Result<bool, RepositoryError> {
        tracing::debug!("enrolling student");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO group_student (group_id, student_id, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (group_id, student_id) DO NOTHING
            "#,
        )
        .bind(group_id)
        .bind(student_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        let inserted = result.rows_affected() > 0;
        tracing::debug!(inserted, "enrollment committed");
        Ok(inserted)
    }
}
