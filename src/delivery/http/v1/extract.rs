use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::usecase::error::UsecaseError;

/// `Json` whose rejections render as the failure envelope.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = UsecaseError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// `Query` whose rejections render as the failure envelope.
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = UsecaseError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// `{id}` of a notification. A malformed id cannot name one of the caller's rows.
pub struct NotificationId(pub Uuid);

impl<S> FromRequestParts<S> for NotificationId
where
    S: Send + Sync,
{
    type Rejection = UsecaseError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        resource_id(parts, state, "Notification").await.map(Self)
    }
}

/// `{id}` of a group.
pub struct GroupId(pub Uuid);

impl<S> FromRequestParts<S> for GroupId
where
    S: Send + Sync,
{
    type Rejection = UsecaseError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        resource_id(parts, state, "Group").await.map(Self)
    }
}

async fn resource_id<S>(parts: &mut Parts, state: &S, resource: &str) -> Result<Uuid, UsecaseError>
where
    S: Send + Sync,
{
    match Path::<Uuid>::from_request_parts(parts, state).await {
        Ok(Path(id)) => Ok(id),
        Err(rejection) => {
            tracing::debug!(%rejection, resource, "malformed resource id");
            Err(UsecaseError::NotFound(resource.to_string()))
        }
    }
}
