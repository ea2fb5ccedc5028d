//! Courier assignment ledger. Bindings are appended, never overwritten, so
//! the full reassignment history stays queryable; the active courier is the
//! most recent record.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::core::audit::{self, EventDraft};
use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::assignment::Assignment;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::event::DeliveryEvent;
use crate::state::AppState;

#[derive(Debug, Clone, serde::Serialize)]
pub struct AssignmentOutcome {
    pub delivery: Delivery,
    pub assignment: Assignment,
    pub event: DeliveryEvent,
}

/// Binds a courier to a delivery. Dispatcher/admin only; the window closes
/// once the parcel is picked up. Bumps CREATED to ASSIGNED and appends one
/// ASSIGNED audit event attributed to the caller, all under the delivery
/// lock.
pub async fn assign(
    state: &AppState,
    delivery_id: Uuid,
    courier_id: Uuid,
    actor: Actor,
) -> Result<AssignmentOutcome, AppError> {
    let result = assign_inner(state, delivery_id, courier_id, actor).await;

    let outcome = if result.is_ok() { "success" } else { "rejected" };
    state
        .metrics
        .assignments_total
        .with_label_values(&[outcome])
        .inc();

    result
}

async fn assign_inner(
    state: &AppState,
    delivery_id: Uuid,
    courier_id: Uuid,
    actor: Actor,
) -> Result<AssignmentOutcome, AppError> {
    if !matches!(actor.role, Role::Dispatcher | Role::Admin) {
        return Err(AppError::Forbidden(format!(
            "role {} may not assign couriers",
            actor.role
        )));
    }

    let courier = state
        .users
        .get(&courier_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("courier {courier_id} not found")))?;

    if courier.role != Role::Courier {
        return Err(AppError::BadRequest(format!(
            "user {} does not hold the COURIER role",
            courier.id
        )));
    }

    let lock = state.delivery_lock(delivery_id);
    let _guard = lock.lock().await;

    let current = state
        .deliveries
        .get(&delivery_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))?;

    if !matches!(
        current.status,
        DeliveryStatus::Created | DeliveryStatus::Assigned
    ) {
        return Err(AppError::AssignmentWindowClosed {
            status: current.status,
        });
    }

    if current_courier_id(state, delivery_id) == Some(courier_id) {
        return Err(AppError::DuplicateAssignment { courier_id });
    }

    let assignment = Assignment {
        id: Uuid::new_v4(),
        delivery_id,
        courier_id,
        assigned_at: Utc::now(),
    };
    state
        .assignments
        .entry(delivery_id)
        .or_default()
        .push(assignment.clone());

    let delivery = {
        let mut entry = state
            .deliveries
            .get_mut(&delivery_id)
            .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))?;
        if entry.status == DeliveryStatus::Created {
            entry.status = DeliveryStatus::Assigned;
        }
        entry.clone()
    };

    let event = audit::append(
        state,
        delivery_id,
        EventDraft {
            event_type: DeliveryStatus::Assigned,
            note: Some(format!("assigned to courier {}", courier.name)),
            location_text: None,
            proof_image_url: None,
            created_by: actor.id,
        },
    );

    info!(
        delivery_id = %delivery_id,
        courier_id = %courier_id,
        "courier assigned"
    );

    Ok(AssignmentOutcome {
        delivery,
        assignment,
        event,
    })
}

/// Courier of the most recent binding, or none. Equal timestamps resolve to
/// the later record in the ledger.
pub fn current_courier_id(state: &AppState, delivery_id: Uuid) -> Option<Uuid> {
    state.assignments.get(&delivery_id).and_then(|entry| {
        entry
            .value()
            .iter()
            .max_by_key(|assignment| assignment.assigned_at)
            .map(|assignment| assignment.courier_id)
    })
}

/// Membership in the full ledger, not just the latest binding. A courier
/// reassigned away keeps access to finish in-flight work.
pub fn was_ever_assigned(state: &AppState, delivery_id: Uuid, courier_id: Uuid) -> bool {
    state
        .assignments
        .get(&delivery_id)
        .map(|entry| {
            entry
                .value()
                .iter()
                .any(|assignment| assignment.courier_id == courier_id)
        })
        .unwrap_or(false)
}
