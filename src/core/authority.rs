//! Delivery lifecycle authority. Validates a transition request against the
//! policy, enforces the proof-of-delivery constraint, and commits the status
//! write together with its audit event as one unit under the delivery lock.

use std::time::Instant;

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::core::assignment;
use crate::core::audit::{self, EventDraft};
use crate::core::policy;
use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::event::DeliveryEvent;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
    pub status: DeliveryStatus,
    pub note: Option<String>,
    pub location_text: Option<String>,
    pub proof_image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointRequest {
    /// Status tag for the event; defaults to the delivery's current status.
    #[serde(rename = "type")]
    pub event_type: Option<DeliveryStatus>,
    pub note: Option<String>,
    pub location_text: Option<String>,
    pub proof_image_url: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TransitionOutcome {
    pub delivery: Delivery,
    pub event: DeliveryEvent,
}

/// Moves a delivery to a new status on behalf of an actor. Re-reads current
/// status under the delivery lock, asks the policy for a verdict, enforces
/// the DELIVERED proof constraint, then writes the status and appends the
/// event before the lock is released.
pub async fn request_transition(
    state: &AppState,
    delivery_id: Uuid,
    actor: Actor,
    request: TransitionRequest,
) -> Result<TransitionOutcome, AppError> {
    let start = Instant::now();
    let result = transition_inner(state, delivery_id, actor, request).await;

    let outcome = if result.is_ok() { "success" } else { "rejected" };
    state
        .metrics
        .transition_latency_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());
    state
        .metrics
        .transitions_total
        .with_label_values(&[outcome])
        .inc();

    result
}

async fn transition_inner(
    state: &AppState,
    delivery_id: Uuid,
    actor: Actor,
    request: TransitionRequest,
) -> Result<TransitionOutcome, AppError> {
    let lock = state.delivery_lock(delivery_id);
    let _guard = lock.lock().await;

    let current = load_delivery(state, delivery_id)?;
    check_access(state, &current, actor)?;

    if !policy::can_transition(current.status, request.status, actor.role) {
        return Err(AppError::InvalidTransition {
            current: current.status,
            requested: request.status,
            role: actor.role,
            allowed: policy::allowed_transitions(current.status, actor.role),
        });
    }

    let proof = resolve_proof(state, delivery_id, &request)?;

    let updated = {
        let mut entry = state
            .deliveries
            .get_mut(&delivery_id)
            .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))?;
        entry.status = request.status;
        entry.clone()
    };

    let event = audit::append(
        state,
        delivery_id,
        EventDraft {
            event_type: request.status,
            note: request.note,
            location_text: request.location_text,
            proof_image_url: proof,
            created_by: actor.id,
        },
    );

    info!(
        delivery_id = %delivery_id,
        from = %current.status,
        to = %updated.status,
        role = %actor.role,
        "delivery transitioned"
    );

    Ok(TransitionOutcome {
        delivery: updated,
        event,
    })
}

/// Annotates the trail without moving the delivery: no policy gate, only
/// the access check. Used for location pings and courier notes.
pub async fn add_checkpoint(
    state: &AppState,
    delivery_id: Uuid,
    actor: Actor,
    request: CheckpointRequest,
) -> Result<DeliveryEvent, AppError> {
    let lock = state.delivery_lock(delivery_id);
    let _guard = lock.lock().await;

    let delivery = load_delivery(state, delivery_id)?;
    check_access(state, &delivery, actor)?;

    let event_type = request.event_type.unwrap_or(delivery.status);

    let event = audit::append(
        state,
        delivery_id,
        EventDraft {
            event_type,
            note: request.note,
            location_text: request.location_text,
            proof_image_url: request.proof_image_url,
            created_by: actor.id,
        },
    );

    info!(
        delivery_id = %delivery_id,
        event_type = %event_type,
        role = %actor.role,
        "checkpoint recorded"
    );

    Ok(event)
}

/// General access to a delivery, distinct from the transition-role check:
/// the owning sender, any courier in the assignment history, or a
/// dispatcher/admin.
fn check_access(state: &AppState, delivery: &Delivery, actor: Actor) -> Result<(), AppError> {
    let allowed = match actor.role {
        Role::Dispatcher | Role::Admin => true,
        Role::Sender => delivery.sender_id == actor.id,
        Role::Courier => assignment::was_ever_assigned(state, delivery.id, actor.id),
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "actor {} has no access to delivery {}",
            actor.id, delivery.id
        )))
    }
}

fn load_delivery(state: &AppState, delivery_id: Uuid) -> Result<Delivery, AppError> {
    state
        .deliveries
        .get(&delivery_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))
}

fn resolve_proof(
    state: &AppState,
    delivery_id: Uuid,
    request: &TransitionRequest,
) -> Result<Option<String>, AppError> {
    let supplied = request
        .proof_image_url
        .clone()
        .filter(|proof| !proof.trim().is_empty());

    if request.status != DeliveryStatus::Delivered {
        return Ok(supplied);
    }

    supplied
        .or_else(|| audit::stored_proof(state, delivery_id))
        .map(Some)
        .ok_or(AppError::MissingProof)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{CheckpointRequest, TransitionRequest, add_checkpoint, request_transition};
    use crate::core::audit::timeline;
    use crate::error::AppError;
    use crate::models::actor::{Actor, Role};
    use crate::models::assignment::Assignment;
    use crate::models::delivery::{Delivery, DeliveryStatus, Priority};
    use crate::state::AppState;

    fn seed_delivery(state: &AppState, status: DeliveryStatus, sender_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        state.deliveries.insert(
            id,
            Delivery {
                id,
                tracking_code: format!("TRK-{id}"),
                priority: Priority::High,
                status,
                receiver_name: "Recipient".to_string(),
                receiver_phone: "555-0100".to_string(),
                destination: "1 Harbor Lane".to_string(),
                sender_id,
                label_url: None,
                created_at: Utc::now(),
            },
        );
        id
    }

    fn seed_binding(state: &AppState, delivery_id: Uuid, courier_id: Uuid) {
        state.assignments.entry(delivery_id).or_default().push(Assignment {
            id: Uuid::new_v4(),
            delivery_id,
            courier_id,
            assigned_at: Utc::now(),
        });
    }

    fn transition(status: DeliveryStatus) -> TransitionRequest {
        TransitionRequest {
            status,
            note: None,
            location_text: None,
            proof_image_url: None,
        }
    }

    #[tokio::test]
    async fn delivered_without_proof_is_rejected() {
        let state = AppState::new(16);
        let delivery_id = seed_delivery(&state, DeliveryStatus::OutForDelivery, Uuid::new_v4());
        let courier = Actor {
            id: Uuid::new_v4(),
            role: Role::Courier,
        };
        seed_binding(&state, delivery_id, courier.id);

        let err = request_transition(
            &state,
            delivery_id,
            courier,
            transition(DeliveryStatus::Delivered),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::MissingProof));

        // Nothing committed: status and trail untouched.
        let delivery = state.deliveries.get(&delivery_id).unwrap().clone();
        assert_eq!(delivery.status, DeliveryStatus::OutForDelivery);
        assert!(timeline(&state, delivery_id).is_empty());
    }

    #[tokio::test]
    async fn delivered_with_proof_commits_and_stamps_event() {
        let state = AppState::new(16);
        let delivery_id = seed_delivery(&state, DeliveryStatus::OutForDelivery, Uuid::new_v4());
        let courier = Actor {
            id: Uuid::new_v4(),
            role: Role::Courier,
        };
        seed_binding(&state, delivery_id, courier.id);

        let outcome = request_transition(
            &state,
            delivery_id,
            courier,
            TransitionRequest {
                status: DeliveryStatus::Delivered,
                note: Some("left at front desk".to_string()),
                location_text: Some("lobby".to_string()),
                proof_image_url: Some("pod/123.jpg".to_string()),
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome.delivery.status, DeliveryStatus::Delivered);
        assert_eq!(outcome.event.event_type, DeliveryStatus::Delivered);
        assert_eq!(outcome.event.proof_image_url.as_deref(), Some("pod/123.jpg"));
    }

    #[tokio::test]
    async fn delivered_accepts_proof_from_prior_checkpoint() {
        let state = AppState::new(16);
        let delivery_id = seed_delivery(&state, DeliveryStatus::OutForDelivery, Uuid::new_v4());
        let courier = Actor {
            id: Uuid::new_v4(),
            role: Role::Courier,
        };
        seed_binding(&state, delivery_id, courier.id);

        add_checkpoint(
            &state,
            delivery_id,
            courier,
            CheckpointRequest {
                event_type: None,
                note: Some("photo taken at door".to_string()),
                location_text: None,
                proof_image_url: Some("pod/early.jpg".to_string()),
            },
        )
        .await
        .unwrap();

        let outcome = request_transition(
            &state,
            delivery_id,
            courier,
            transition(DeliveryStatus::Delivered),
        )
        .await
        .unwrap();

        assert_eq!(outcome.delivery.status, DeliveryStatus::Delivered);
        assert_eq!(
            outcome.event.proof_image_url.as_deref(),
            Some("pod/early.jpg")
        );
    }

    #[tokio::test]
    async fn sender_cancel_window_closes_at_pickup() {
        let state = AppState::new(16);
        let sender = Actor {
            id: Uuid::new_v4(),
            role: Role::Sender,
        };
        let delivery_id = seed_delivery(&state, DeliveryStatus::PickedUp, sender.id);

        let err = request_transition(
            &state,
            delivery_id,
            sender,
            transition(DeliveryStatus::Cancelled),
        )
        .await
        .unwrap_err();

        match err {
            AppError::InvalidTransition { allowed, .. } => assert!(allowed.is_empty()),
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unassigned_courier_is_forbidden() {
        let state = AppState::new(16);
        let delivery_id = seed_delivery(&state, DeliveryStatus::Assigned, Uuid::new_v4());
        let stranger = Actor {
            id: Uuid::new_v4(),
            role: Role::Courier,
        };

        let err = request_transition(
            &state,
            delivery_id,
            stranger,
            transition(DeliveryStatus::PickedUp),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn reassigned_courier_keeps_access() {
        let state = AppState::new(16);
        let delivery_id = seed_delivery(&state, DeliveryStatus::Assigned, Uuid::new_v4());
        let original = Actor {
            id: Uuid::new_v4(),
            role: Role::Courier,
        };
        seed_binding(&state, delivery_id, original.id);
        seed_binding(&state, delivery_id, Uuid::new_v4());

        let outcome = request_transition(
            &state,
            delivery_id,
            original,
            transition(DeliveryStatus::PickedUp),
        )
        .await
        .unwrap();

        assert_eq!(outcome.delivery.status, DeliveryStatus::PickedUp);
    }

    #[tokio::test]
    async fn accepted_transition_appends_exactly_one_event() {
        let state = AppState::new(16);
        let dispatcher = Actor {
            id: Uuid::new_v4(),
            role: Role::Dispatcher,
        };
        let delivery_id = seed_delivery(&state, DeliveryStatus::Draft, Uuid::new_v4());

        request_transition(
            &state,
            delivery_id,
            dispatcher,
            transition(DeliveryStatus::Created),
        )
        .await
        .unwrap();

        let trail = timeline(&state, delivery_id);
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].event_type, DeliveryStatus::Created);

        request_transition(
            &state,
            delivery_id,
            dispatcher,
            transition(DeliveryStatus::Assigned),
        )
        .await
        .unwrap();

        let trail = timeline(&state, delivery_id);
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[1].event_type, DeliveryStatus::Assigned);
    }

    #[tokio::test]
    async fn unknown_delivery_is_not_found() {
        let state = AppState::new(16);
        let dispatcher = Actor {
            id: Uuid::new_v4(),
            role: Role::Dispatcher,
        };

        let err = request_transition(
            &state,
            Uuid::new_v4(),
            dispatcher,
            transition(DeliveryStatus::Created),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn checkpoint_defaults_type_and_keeps_status() {
        let state = AppState::new(16);
        let delivery_id = seed_delivery(&state, DeliveryStatus::InTransit, Uuid::new_v4());
        let courier = Actor {
            id: Uuid::new_v4(),
            role: Role::Courier,
        };
        seed_binding(&state, delivery_id, courier.id);

        let event = add_checkpoint(
            &state,
            delivery_id,
            courier,
            CheckpointRequest {
                event_type: None,
                note: Some("passing the depot".to_string()),
                location_text: Some("Depot 7".to_string()),
                proof_image_url: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(event.event_type, DeliveryStatus::InTransit);
        let delivery = state.deliveries.get(&delivery_id).unwrap().clone();
        assert_eq!(delivery.status, DeliveryStatus::InTransit);
    }
}
