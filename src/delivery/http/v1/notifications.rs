use std::sync::Arc;

use axum::{
    Extension,
    extract::State,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::AppState;
use crate::delivery::http::v1::extract::{ApiQuery, NotificationId};
use crate::delivery::http::v1::middleware::AuthenticatedUser;
use crate::delivery::http::v1::response::{ApiResponse, PaginationMeta};
use crate::domain::notification::{Notification, NotificationType, Payload};
use crate::usecase::error::UsecaseError;

/// Raw query string values, parsed by hand so each bad field gets its own error.
#[derive(Debug, Default, Deserialize)]
pub struct NotificationListParams {
    pub page: Option<String>,
    pub per_page: Option<String>,
}

impl NotificationListParams {
    pub fn parse(&self) -> Result<(Option<i64>, Option<i64>), UsecaseError> {
        let mut errors = Map::new();
        let page = parse_integer("page", self.page.as_deref(), &mut errors);
        let per_page = parse_integer("per_page", self.per_page.as_deref(), &mut errors);

        if !errors.is_empty() {
            return Err(UsecaseError::Validation {
                message: "The given data was invalid".to_string(),
                errors: Value::Object(errors),
            });
        }
        Ok((page, per_page))
    }
}

fn parse_integer(field: &str, raw: Option<&str>, errors: &mut Map<String, Value>) -> Option<i64> {
    let raw = raw.map(str::trim).filter(|value| !value.is_empty())?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            let label = field.replace('_', " ");
            errors.insert(
                field.to_string(),
                Value::from(vec![format!("The {} must be an integer.", label)]),
            );
            None
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub data: Payload,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            notification_type: n.notification_type,
            is_read: n.is_read(),
            data: n.payload,
            read_at: n.read_at,
            created_at: n.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct UpdatedResponse {
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiQuery(params): ApiQuery<NotificationListParams>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("listing notifications");

    let (page, per_page) = params.parse()?;
    let page = state
        .notifications_usecase
        .list_notifications(user.user_id, page, per_page)
        .await?;

    let meta = PaginationMeta {
        current_page: page.page,
        per_page: page.per_page,
        total: page.total,
        last_page: page.last_page(),
    };
    let data: Vec<NotificationResponse> = page.notifications.into_iter().map(Into::into).collect();

    tracing::debug!(count = data.len(), "notifications listed");
    Ok(ApiResponse::ok("Notifications retrieved successfully", data).with_pagination(meta))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn get_unread_count(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, UsecaseError> {
    let count = state.notifications_usecase.count_unread(user.user_id).await?;

    Ok(ApiResponse::ok("Unread count retrieved successfully", CountResponse { count }))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id, notification_id = %id))]
pub async fn mark_as_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    NotificationId(id): NotificationId,
) -> Result<impl IntoResponse, UsecaseError> {
    state.notifications_usecase.mark_as_read(id, user.user_id).await?;

    Ok(ApiResponse::ok("Notification marked as read", ()))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn mark_all_as_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, UsecaseError> {
    let updated = state.notifications_usecase.mark_all_as_read(user.user_id).await?;

    Ok(ApiResponse::ok("All notifications marked as read", UpdatedResponse { updated }))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id, notification_id = %id))]
pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    NotificationId(id): NotificationId,
) -> Result<impl IntoResponse, UsecaseError> {
    state.notifications_usecase.delete_notification(id, user.user_id).await?;

    Ok(ApiResponse::ok("Notification deleted", ()))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn delete_all_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, UsecaseError> {
    let deleted = state.notifications_usecase.delete_all(user.user_id).await?;

    Ok(ApiResponse::ok("All notifications deleted", DeletedResponse { deleted }))
}
