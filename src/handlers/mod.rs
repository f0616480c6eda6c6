pub mod bank_accounts;
pub mod health;
pub mod inventory;
pub mod orders;
pub mod products;
pub mod purchase_orders;
pub mod purchases;
pub mod quotes;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};
use std::future::Future;
use uuid::Uuid;

use crate::db::retry::{with_retry, LockRetryPolicy};
use crate::errors::ServiceError;
use crate::services::collaborators::Actor;
use crate::ApiResponse;
pub use crate::AppState;

/// Header naming the user a mutation is performed for.
pub const ACTOR_HEADER: &str = "x-actor-id";

pub type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ServiceError>;

pub fn created<T>(data: T) -> Created<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data))))
}

/// Requests without the header run as the system actor.
#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(ACTOR_HEADER) else {
            return Ok(Actor::system());
        };
        value
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(Actor::user)
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("{} must be a UUID", ACTOR_HEADER))
            })
    }
}

/// Runs a mutation, retrying while stock rows are lock-contended.
pub(crate) async fn retrying<T, F, Fut>(state: &AppState, operation: F) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    with_retry(&state.config.lock_retry(), LockRetryPolicy, operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<Actor, ServiceError> {
        let (mut parts, _) = request.into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn missing_header_is_the_system_actor() {
        let actor = extract(Request::new(())).await.unwrap();
        assert_eq!(actor, Actor::system());
    }

    #[tokio::test]
    async fn header_uuid_becomes_the_actor() {
        let id = Uuid::new_v4();
        let request = Request::builder()
            .header(ACTOR_HEADER, id.to_string())
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.unwrap(), Actor::user(id));
    }

    #[tokio::test]
    async fn malformed_header_is_rejected() {
        let request = Request::builder()
            .header(ACTOR_HEADER, "someone")
            .body(())
            .unwrap();
        assert!(matches!(
            extract(request).await,
            Err(ServiceError::ValidationError(_))
        ));
    }
}
