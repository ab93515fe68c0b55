use std::sync::Arc;

use axum::{Extension, extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::delivery::http::v1::extract::ApiJson;
use crate::delivery::http::v1::middleware::AuthenticatedUser;
use crate::delivery::http::v1::response::ApiResponse;
use crate::domain::topic::Topic;
use crate::usecase::error::UsecaseError;

#[derive(Debug, Deserialize, Validate)]
pub struct BroadcastAuthRequest {
    #[validate(length(min = 1, max = 255))]
    pub topic: String,
}

#[derive(Debug, Serialize)]
pub struct BroadcastAuthResponse {
    pub topic: Topic,
    pub authorized: bool,
}

#[tracing::instrument(skip(state, payload), fields(user_id = %user.user_id))]
pub async fn authorize_topic(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(payload): ApiJson<BroadcastAuthRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    if let Err(validation_errors) = payload.validate() {
        tracing::warn!(?validation_errors, "validation failed");
        return Err(validation_errors.into());
    }

    match state.authorizer.authorize(&user.identity(), &payload.topic).await {
        Some(topic) => Ok(ApiResponse::ok(
            "Subscription authorized",
            BroadcastAuthResponse {
                topic,
                authorized: true,
            },
        )),
        None => Err(UsecaseError::Forbidden(
            "You are not allowed to subscribe to this topic".to_string(),
        )),
    }
}
