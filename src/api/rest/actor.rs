use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::actor::{Actor, Role};

/// Caller identity from the `x-actor-id` and `x-actor-role` headers the
/// upstream gateway injects after authentication.
pub struct AuthedActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for AuthedActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw_id = header(parts, "x-actor-id")?;
        let id = raw_id
            .parse::<Uuid>()
            .map_err(|_| AppError::BadRequest(format!("invalid x-actor-id: {raw_id}")))?;

        let raw_role = header(parts, "x-actor-role")?;
        let role = raw_role
            .parse::<Role>()
            .map_err(|_| AppError::BadRequest(format!("invalid x-actor-role: {raw_role}")))?;

        Ok(AuthedActor(Actor { id, role }))
    }
}

fn header(parts: &Parts, name: &str) -> Result<String, AppError> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| AppError::BadRequest(format!("missing {name} header")))
}
