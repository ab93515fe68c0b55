use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{Value, json};
use thiserror::Error;

use crate::repository::errors::RepositoryError;

#[derive(Debug, Error)]
pub enum UsecaseError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{message}")]
    Validation { message: String, errors: Value },

    #[error("{0}")]
    Internal(String),
}

impl UsecaseError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        UsecaseError::Validation {
            errors: json!({ field: [message.clone()] }),
            message,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            UsecaseError::NotFound(_) => StatusCode::NOT_FOUND,
            UsecaseError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            UsecaseError::Forbidden(_) => StatusCode::FORBIDDEN,
            UsecaseError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            UsecaseError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RepositoryError> for UsecaseError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => UsecaseError::NotFound("Resource".to_string()),
            RepositoryError::DatabaseError(msg) => UsecaseError::Internal(msg),
        }
    }
}

impl From<validator::ValidationErrors> for UsecaseError {
    fn from(e: validator::ValidationErrors) -> Self {
        UsecaseError::Validation {
            message: "The given data was invalid".to_string(),
            errors: serde_json::to_value(&e).unwrap_or(Value::Null),
        }
    }
}

impl From<JsonRejection> for UsecaseError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!(%rejection, "rejected request body");
        UsecaseError::Validation {
            message: "The given data was invalid".to_string(),
            errors: json!({ "body": [rejection.body_text()] }),
        }
    }
}

impl From<QueryRejection> for UsecaseError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::warn!(%rejection, "rejected query string");
        UsecaseError::Validation {
            message: "The given data was invalid".to_string(),
            errors: json!({ "query": [rejection.body_text()] }),
        }
    }
}

impl IntoResponse for UsecaseError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();

        match &self {
            UsecaseError::Internal(_) => {
                tracing::error!(error = %self, "internal error");
            }
            UsecaseError::NotFound(_) => {
                tracing::warn!(error = %self, "resource not found");
            }
            UsecaseError::Forbidden(_) | UsecaseError::Unauthorized(_) => {
                tracing::warn!(error = %self, "access denied");
            }
            _ => {
                tracing::debug!(error = %self);
            }
        }

        let (message, errors) = match self {
            UsecaseError::Internal(_) => ("Internal server error".to_string(), Value::Null),
            UsecaseError::Validation { message, errors } => (message, errors),
            other => (other.to_string(), Value::Null),
        };

        let body = json!({
            "success": false,
            "message": message,
            "data": null,
            "errors": errors,
            "meta": {},
        });

        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("failed to publish to {topic}: {reason}")]
    Publish { topic: String, reason: String },
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport is not configured")]
    NotConfigured,

    #[error("invalid address: {0}")]
    Address(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("smtp transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(error: UsecaseError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_not_found_renders_failure_envelope() {
        let (status, body) = body_json(UsecaseError::NotFound("Notification".to_string())).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Notification not found");
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let (status, body) = body_json(UsecaseError::Internal("connection refused".to_string())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_validation_error_carries_field_errors() {
        let (status, body) = body_json(UsecaseError::validation("topic", "The topic field is required.")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"]["topic"][0], "The topic field is required.");
    }

    #[test]
    fn test_repository_errors_map_to_usecase_errors() {
        assert!(matches!(UsecaseError::from(RepositoryError::NotFound), UsecaseError::NotFound(_)));
        assert!(matches!(
            UsecaseError::from(RepositoryError::DatabaseError("boom".to_string())),
            UsecaseError::Internal(_)
        ));
    }
}
