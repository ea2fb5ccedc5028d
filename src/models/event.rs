use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::delivery::DeliveryStatus;

/// One immutable entry in a delivery's audit trail. The `type` tag is a
/// status value: for a transition event it is the new status, for a
/// checkpoint it usually repeats the current one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub id: Uuid,
    pub delivery_id: Uuid,
    #[serde(rename = "type")]
    pub event_type: DeliveryStatus,
    pub note: Option<String>,
    pub location_text: Option<String>,
    pub proof_image_url: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}
