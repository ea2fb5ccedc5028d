use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::actor::Role;
use crate::models::delivery::DeliveryStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid transition from {current} to {requested} for role {role}")]
    InvalidTransition {
        current: DeliveryStatus,
        requested: DeliveryStatus,
        role: Role,
        allowed: Vec<DeliveryStatus>,
    },

    #[error("a proof-of-delivery image is required to mark a delivery DELIVERED")]
    MissingProof,

    #[error("courier {courier_id} is already the active assignment")]
    DuplicateAssignment { courier_id: Uuid },

    #[error("assignment window closed: delivery is {status}")]
    AssignmentWindowClosed { status: DeliveryStatus },

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::InvalidTransition {
                current,
                requested,
                role,
                allowed,
            } => {
                let allowed_list = if allowed.is_empty() {
                    "none".to_string()
                } else {
                    allowed
                        .iter()
                        .map(|next| next.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                };

                (
                    StatusCode::BAD_REQUEST,
                    json!({
                        "error": format!(
                            "cannot move {current} to {requested} as {role}; allowed: {allowed_list}"
                        ),
                        "current": current,
                        "requested": requested,
                        "allowed": allowed,
                    }),
                )
            }
            AppError::MissingProof => (
                StatusCode::BAD_REQUEST,
                json!({ "error": self.to_string() }),
            ),
            AppError::DuplicateAssignment { .. } => {
                (StatusCode::CONFLICT, json!({ "error": self.to_string() }))
            }
            AppError::AssignmentWindowClosed { status } => (
                StatusCode::CONFLICT,
                json!({
                    "error": format!(
                        "couriers can only be assigned while a delivery is CREATED or ASSIGNED, not {status}"
                    ),
                    "current": status,
                }),
            ),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg })),
        };

        (status, Json(body)).into_response()
    }
}
