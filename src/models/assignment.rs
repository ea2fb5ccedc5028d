use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One courier-to-delivery binding. Reassignment appends a new record; the
/// per-delivery ledger keeps every record it ever held.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub courier_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}
