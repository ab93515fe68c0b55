use std::sync::Arc;

use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::delivery::http::v1::extract::{ApiJson, GroupId};
use crate::delivery::http::v1::middleware::AuthenticatedUser;
use crate::delivery::http::v1::response::ApiResponse;
use crate::usecase::error::UsecaseError;

#[derive(Debug, Deserialize)]
pub struct EnrollStudentRequest {
    pub student_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct EnrollmentResponse {
    pub group_id: Uuid,
    pub student_id: Uuid,
    pub enrolled: bool,
}

#[tracing::instrument(skip(state, payload), fields(user_id = %user.user_id, group_id = %group_id))]
pub async fn enroll_student(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    GroupId(group_id): GroupId,
    ApiJson(payload): ApiJson<EnrollStudentRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    let inserted = state
        .enrollment_usecase
        .enroll_student(&user.identity(), group_id, payload.student_id)
        .await?;

    let (status, message) = if inserted {
        (StatusCode::CREATED, "Student added to group")
    } else {
        (StatusCode::OK, "Student is already in this group")
    };

    Ok(ApiResponse::ok(
        message,
        EnrollmentResponse {
            group_id,
            student_id: payload.student_id,
            enrolled: true,
        },
    )
    .with_status(status))
}
