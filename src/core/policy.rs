//! Transition policy: which status may follow which, and which role may
//! ask for it. Pure functions over the closed status enum; the single
//! source of truth for every call site, including error messages.

use crate::models::actor::Role;
use crate::models::delivery::DeliveryStatus;

/// Canonical adjacency table, independent of role.
pub fn next_statuses(current: DeliveryStatus) -> &'static [DeliveryStatus] {
    use DeliveryStatus::*;

    match current {
        Draft => &[Created, Cancelled],
        Created => &[Assigned, Cancelled],
        Assigned => &[PickedUp, Cancelled],
        PickedUp => &[InTransit, OutForDelivery, FailedDelivery, Returned],
        InTransit => &[OutForDelivery, FailedDelivery, Returned],
        OutForDelivery => &[Delivered, FailedDelivery, Returned],
        FailedDelivery => &[Returned],
        Returned => &[OutForDelivery],
        Delivered | Cancelled => &[],
    }
}

/// Role overlay, applied after the adjacency check. Senders may only cancel
/// before pickup; couriers may only drive the physical leg; dispatchers and
/// admins have full authority.
fn role_permits(role: Role, current: DeliveryStatus, requested: DeliveryStatus) -> bool {
    use DeliveryStatus::*;

    match role {
        Role::Dispatcher | Role::Admin => true,
        Role::Sender => requested == Cancelled && matches!(current, Draft | Created | Assigned),
        Role::Courier => matches!(
            requested,
            PickedUp | InTransit | OutForDelivery | Delivered | FailedDelivery | Returned
        ),
    }
}

pub fn can_transition(current: DeliveryStatus, requested: DeliveryStatus, role: Role) -> bool {
    next_statuses(current).contains(&requested) && role_permits(role, current, requested)
}

/// The same verdict as `can_transition`, enumerated. Used to pre-populate
/// client choices and to build actionable rejection messages.
pub fn allowed_transitions(current: DeliveryStatus, role: Role) -> Vec<DeliveryStatus> {
    next_statuses(current)
        .iter()
        .copied()
        .filter(|&next| role_permits(role, current, next))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{allowed_transitions, can_transition};
    use crate::models::actor::Role;
    use crate::models::delivery::DeliveryStatus;
    use crate::models::delivery::DeliveryStatus::*;

    const ROLES: [Role; 4] = [Role::Sender, Role::Dispatcher, Role::Courier, Role::Admin];

    #[test]
    fn allowed_transitions_agrees_with_can_transition() {
        for current in DeliveryStatus::ALL {
            for role in ROLES {
                let allowed = allowed_transitions(current, role);
                for requested in DeliveryStatus::ALL {
                    assert_eq!(
                        allowed.contains(&requested),
                        can_transition(current, requested, role),
                        "disagreement at {current} -> {requested} as {role}"
                    );
                }
            }
        }
    }

    #[test]
    fn sender_may_only_cancel_before_pickup() {
        for current in [Draft, Created, Assigned] {
            assert_eq!(allowed_transitions(current, Role::Sender), vec![Cancelled]);
        }

        for current in [
            PickedUp,
            InTransit,
            OutForDelivery,
            Delivered,
            FailedDelivery,
            Returned,
            Cancelled,
        ] {
            assert!(allowed_transitions(current, Role::Sender).is_empty());
        }
    }

    #[test]
    fn courier_never_requests_administrative_statuses() {
        for current in DeliveryStatus::ALL {
            for requested in [Draft, Created, Assigned, Cancelled] {
                assert!(!can_transition(current, requested, Role::Courier));
            }
        }
    }

    #[test]
    fn courier_follows_adjacency_on_the_physical_leg() {
        assert!(can_transition(Assigned, PickedUp, Role::Courier));
        assert!(can_transition(PickedUp, InTransit, Role::Courier));
        assert!(can_transition(OutForDelivery, Delivered, Role::Courier));
        assert!(!can_transition(Assigned, Delivered, Role::Courier));
    }

    #[test]
    fn delivered_and_cancelled_are_terminal() {
        for role in ROLES {
            assert!(allowed_transitions(Delivered, role).is_empty());
            assert!(allowed_transitions(Cancelled, role).is_empty());
        }
    }

    #[test]
    fn redelivery_loop_is_repeatable() {
        for role in [Role::Courier, Role::Dispatcher] {
            assert!(can_transition(OutForDelivery, FailedDelivery, role));
            assert!(can_transition(FailedDelivery, Returned, role));
            assert!(can_transition(Returned, OutForDelivery, role));
            // Back at OUT_FOR_DELIVERY the full branch set is open again.
            assert!(can_transition(OutForDelivery, Delivered, role));
            assert!(can_transition(OutForDelivery, Returned, role));
        }
    }
}
