use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

use crate::models::actor::User;
use crate::models::assignment::Assignment;
use crate::models::delivery::Delivery;
use crate::models::event::DeliveryEvent;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub users: DashMap<Uuid, User>,
    pub deliveries: DashMap<Uuid, Delivery>,
    /// Per-delivery assignment ledger, in binding order.
    pub assignments: DashMap<Uuid, Vec<Assignment>>,
    /// Per-delivery audit trail, in append order.
    pub events: DashMap<Uuid, Vec<DeliveryEvent>>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    pub event_feed_tx: broadcast::Sender<DeliveryEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(event_buffer_size: usize) -> Self {
        let (event_feed_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            users: DashMap::new(),
            deliveries: DashMap::new(),
            assignments: DashMap::new(),
            events: DashMap::new(),
            locks: DashMap::new(),
            event_feed_tx,
            metrics: Metrics::new(),
        }
    }

    /// Lock serializing all status reads and writes for one delivery. Hold
    /// it from the status read through the paired audit append; different
    /// deliveries use independent locks.
    pub fn delivery_lock(&self, delivery_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(delivery_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }
}
