use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::delivery::http::v1::extract::ApiJson;
use crate::delivery::http::v1::response::ApiResponse;
use crate::domain::definition::NotificationDefinition;
use crate::usecase::error::UsecaseError;

/// Body of `POST /internal/events`. The definition is tagged by its `type` field.
#[derive(Debug, Deserialize)]
pub struct PublishEventRequest {
    pub recipient_ids: Vec<Uuid>,
    pub notification: NotificationDefinition,
}

#[derive(Debug, Serialize)]
pub struct PublishEventResponse {
    pub notification_ids: Vec<Uuid>,
    pub failed_recipient_ids: Vec<Uuid>,
}

#[tracing::instrument(skip(state, payload), fields(notification_type = %payload.notification.kind()))]
pub async fn publish_event(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<PublishEventRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    let outcome = state
        .events_usecase
        .publish(&payload.recipient_ids, &payload.notification)
        .await?;

    let status = if outcome.failed_recipient_ids.is_empty() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::MULTI_STATUS
    };

    Ok(ApiResponse::ok(
        "Event accepted",
        PublishEventResponse {
            notification_ids: outcome.notification_ids,
            failed_recipient_ids: outcome.failed_recipient_ids,
        },
    )
    .with_status(status))
}
