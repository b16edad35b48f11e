use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::{AuthUser, Role};

/// Stand-in for the auth collaborator: an upstream gateway resolves the
/// request to a user id and role and forwards them in headers. Anything
/// missing or unparsable is a 401.
#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .ok_or_else(|| AppError::Unauthorized("missing or invalid x-user-id".to_string()))?;

        let role = parts
            .headers
            .get("x-user-role")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<Role>().ok())
            .ok_or_else(|| AppError::Unauthorized("missing or invalid x-user-role".to_string()))?;

        Ok(AuthUser { id, role })
    }
}
