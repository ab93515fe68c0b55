use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    AppState,
    domain::user::{Identity, Role},
    usecase::error::UsecaseError,
};

pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: Option<Role>,
}

impl AuthenticatedUser {
    pub fn identity(&self) -> Identity {
        Identity::new(self.user_id, self.role)
    }
}

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, UsecaseError> {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "));

    let Some(token) = token else {
        tracing::warn!("missing or invalid authorization header");
        return Err(UsecaseError::Unauthorized("Unauthenticated.".to_string()));
    };

    let identity = state.jwt_service.authenticate(token).map_err(|e| {
        tracing::warn!(?e, "invalid token");
        UsecaseError::Unauthorized("Unauthenticated.".to_string())
    })?;

    let authenticated_user = AuthenticatedUser {
        user_id: identity.user_id,
        role: identity.role,
    };

    tracing::debug!(?authenticated_user, "user authenticated successfully");
    request.extensions_mut().insert(authenticated_user);

    Ok(next.run(request).await)
}

/// Guards service-to-service routes. Every request is refused while no
/// internal token is configured.
pub async fn internal_token_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, UsecaseError> {
    let Some(expected) = &state.internal_token else {
        tracing::warn!("rejected internal request: INTERNAL_TOKEN is not configured");
        return Err(UsecaseError::Unauthorized("Invalid internal token.".to_string()));
    };

    let provided = request
        .headers()
        .get(INTERNAL_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok());
    if provided != Some(expected.as_str()) {
        tracing::warn!("rejected internal request with missing or wrong token");
        return Err(UsecaseError::Unauthorized("Invalid internal token.".to_string()));
    }

    Ok(next.run(request).await)
}
