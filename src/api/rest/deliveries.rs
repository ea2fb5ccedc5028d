use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::actor::AuthedActor;
use crate::core::assignment::{self, AssignmentOutcome};
use crate::core::audit::{self, EventDraft};
use crate::core::authority::{self, CheckpointRequest, TransitionOutcome, TransitionRequest};
use crate::core::policy;
use crate::error::AppError;
use crate::models::actor::{Role, User};
use crate::models::delivery::{Delivery, DeliveryStatus, Priority};
use crate::models::event::DeliveryEvent;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries", post(create_delivery).get(list_deliveries))
        .route("/deliveries/:id", get(get_delivery))
        .route("/deliveries/:id/transition", post(request_transition))
        .route("/deliveries/:id/checkpoint", post(add_checkpoint))
        .route("/deliveries/:id/assign", post(assign_courier))
        .route("/deliveries/:id/courier", get(current_courier))
        .route("/deliveries/:id/timeline", get(timeline))
        .route(
            "/deliveries/:id/allowed-transitions",
            get(allowed_transitions),
        )
}

#[derive(Deserialize)]
pub struct CreateDeliveryRequest {
    pub receiver_name: String,
    pub receiver_phone: String,
    pub destination: String,
    pub priority: Priority,
}

async fn create_delivery(
    State(state): State<Arc<AppState>>,
    AuthedActor(actor): AuthedActor,
    Json(payload): Json<CreateDeliveryRequest>,
) -> Result<Json<Delivery>, AppError> {
    if !matches!(actor.role, Role::Sender | Role::Admin) {
        return Err(AppError::Forbidden(
            "only senders may create deliveries".to_string(),
        ));
    }

    if payload.receiver_name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "receiver_name cannot be empty".to_string(),
        ));
    }

    if payload.destination.trim().is_empty() {
        return Err(AppError::BadRequest(
            "destination cannot be empty".to_string(),
        ));
    }

    let id = Uuid::new_v4();
    let delivery = Delivery {
        id,
        tracking_code: tracking_code(id),
        priority: payload.priority,
        status: DeliveryStatus::Draft,
        receiver_name: payload.receiver_name,
        receiver_phone: payload.receiver_phone,
        destination: payload.destination,
        sender_id: actor.id,
        label_url: None,
        created_at: Utc::now(),
    };

    state.deliveries.insert(delivery.id, delivery.clone());
    audit::append(
        &state,
        delivery.id,
        EventDraft {
            event_type: DeliveryStatus::Draft,
            note: Some("delivery created".to_string()),
            location_text: None,
            proof_image_url: None,
            created_by: actor.id,
        },
    );

    Ok(Json(delivery))
}

fn tracking_code(id: Uuid) -> String {
    let hex = id.simple().to_string();
    format!("TRK-{}", hex[..10].to_uppercase())
}

async fn list_deliveries(State(state): State<Arc<AppState>>) -> Json<Vec<Delivery>> {
    let deliveries = state
        .deliveries
        .iter()
        .map(|entry| entry.value().clone())
        .collect();

    Json(deliveries)
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Delivery>, AppError> {
    let delivery = state
        .deliveries
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))?;

    Ok(Json(delivery.value().clone()))
}

async fn request_transition(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    AuthedActor(actor): AuthedActor,
    Json(payload): Json<TransitionRequest>,
) -> Result<Json<TransitionOutcome>, AppError> {
    let outcome = authority::request_transition(&state, id, actor, payload).await?;
    Ok(Json(outcome))
}

async fn add_checkpoint(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    AuthedActor(actor): AuthedActor,
    Json(payload): Json<CheckpointRequest>,
) -> Result<Json<DeliveryEvent>, AppError> {
    let event = authority::add_checkpoint(&state, id, actor, payload).await?;
    Ok(Json(event))
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub courier_id: Uuid,
}

async fn assign_courier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    AuthedActor(actor): AuthedActor,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<AssignmentOutcome>, AppError> {
    let outcome = assignment::assign(&state, id, payload.courier_id, actor).await?;
    Ok(Json(outcome))
}

async fn current_courier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<User>>, AppError> {
    if !state.deliveries.contains_key(&id) {
        return Err(AppError::NotFound(format!("delivery {id} not found")));
    }

    let courier = assignment::current_courier_id(&state, id)
        .and_then(|courier_id| state.users.get(&courier_id))
        .map(|entry| entry.value().clone());

    Ok(Json(courier))
}

async fn timeline(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DeliveryEvent>>, AppError> {
    if !state.deliveries.contains_key(&id) {
        return Err(AppError::NotFound(format!("delivery {id} not found")));
    }

    Ok(Json(audit::timeline(&state, id)))
}

#[derive(Serialize)]
struct AllowedTransitionsResponse {
    current: DeliveryStatus,
    allowed: Vec<DeliveryStatus>,
}

async fn allowed_transitions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    AuthedActor(actor): AuthedActor,
) -> Result<Json<AllowedTransitionsResponse>, AppError> {
    let current = state
        .deliveries
        .get(&id)
        .map(|entry| entry.value().status)
        .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))?;

    Ok(Json(AllowedTransitionsResponse {
        current,
        allowed: policy::allowed_transitions(current, actor.role),
    }))
}
