//! Append-only audit trail. Every accepted transition and every checkpoint
//! lands here as exactly one immutable event; nothing is ever rewritten.
//! The in-process append cannot fail independently of the process, so a
//! committed status write is never left without its event. A durable store
//! behind this module must treat a failed append after a status write as a
//! fatal inconsistency, not a droppable error.

use chrono::Utc;
use uuid::Uuid;

use crate::models::delivery::DeliveryStatus;
use crate::models::event::DeliveryEvent;
use crate::state::AppState;

/// Payload for a new event; the trail assigns id and timestamp.
pub struct EventDraft {
    pub event_type: DeliveryStatus,
    pub note: Option<String>,
    pub location_text: Option<String>,
    pub proof_image_url: Option<String>,
    pub created_by: Uuid,
}

/// Appends one event to the delivery's trail and publishes it on the live
/// feed. Feed delivery is best-effort; a send with no subscribers is not an
/// error. Callers pairing this with a status write must hold the delivery
/// lock across both.
pub fn append(state: &AppState, delivery_id: Uuid, draft: EventDraft) -> DeliveryEvent {
    let event = DeliveryEvent {
        id: Uuid::new_v4(),
        delivery_id,
        event_type: draft.event_type,
        note: draft.note,
        location_text: draft.location_text,
        proof_image_url: draft.proof_image_url,
        created_by: draft.created_by,
        created_at: Utc::now(),
    };

    state.events.entry(delivery_id).or_default().push(event.clone());
    state.metrics.audit_events_total.inc();

    let _ = state.event_feed_tx.send(event.clone());

    event
}

/// Full trail for a delivery, ascending by creation time.
pub fn timeline(state: &AppState, delivery_id: Uuid) -> Vec<DeliveryEvent> {
    let mut events = state
        .events
        .get(&delivery_id)
        .map(|entry| entry.value().clone())
        .unwrap_or_default();

    events.sort_by_key(|event| event.created_at);
    events
}

/// Most recent non-empty proof reference anywhere in the trail.
pub fn stored_proof(state: &AppState, delivery_id: Uuid) -> Option<String> {
    state.events.get(&delivery_id).and_then(|entry| {
        entry.value().iter().rev().find_map(|event| {
            event
                .proof_image_url
                .clone()
                .filter(|proof| !proof.trim().is_empty())
        })
    })
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{EventDraft, append, stored_proof, timeline};
    use crate::models::delivery::DeliveryStatus;
    use crate::state::AppState;

    fn draft(event_type: DeliveryStatus, proof: Option<&str>) -> EventDraft {
        EventDraft {
            event_type,
            note: None,
            location_text: None,
            proof_image_url: proof.map(str::to_string),
            created_by: Uuid::new_v4(),
        }
    }

    #[test]
    fn timeline_preserves_append_order() {
        let state = AppState::new(16);
        let delivery_id = Uuid::new_v4();

        let first = append(&state, delivery_id, draft(DeliveryStatus::Created, None));
        let second = append(&state, delivery_id, draft(DeliveryStatus::Assigned, None));

        let trail = timeline(&state, delivery_id);
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].id, first.id);
        assert_eq!(trail[1].id, second.id);
    }

    #[test]
    fn stored_proof_picks_latest_non_empty() {
        let state = AppState::new(16);
        let delivery_id = Uuid::new_v4();

        append(&state, delivery_id, draft(DeliveryStatus::InTransit, Some("old.jpg")));
        append(&state, delivery_id, draft(DeliveryStatus::InTransit, Some("new.jpg")));
        append(&state, delivery_id, draft(DeliveryStatus::InTransit, Some("  ")));

        assert_eq!(stored_proof(&state, delivery_id).as_deref(), Some("new.jpg"));
    }

    #[test]
    fn stored_proof_empty_trail_is_none() {
        let state = AppState::new(16);
        assert!(stored_proof(&state, Uuid::new_v4()).is_none());
    }
}
