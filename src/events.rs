use mongodb::bson::oid::ObjectId;
use tokio::sync::broadcast;

use crate::models::{Alert, WatchlistChange};

pub const ALERTS_CHANGED: &str = "alertsChanged";
pub const WATCHLIST_CHANGED: &str = "watchlistChanged";

/// A change signal for one user's data. A `None` payload means "re-query everything".
#[derive(Debug, Clone)]
pub enum SyncEvent {
    AlertsChanged {
        user_id: ObjectId,
        alert: Option<Alert>,
    },
    WatchlistChanged {
        user_id: ObjectId,
        change: Option<WatchlistChange>,
    },
}

impl SyncEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::AlertsChanged { .. } => ALERTS_CHANGED,
            SyncEvent::WatchlistChanged { .. } => WATCHLIST_CHANGED,
        }
    }

    pub fn user_id(&self) -> ObjectId {
        match self {
            SyncEvent::AlertsChanged { user_id, .. } | SyncEvent::WatchlistChanged { user_id, .. } => {
                *user_id
            }
        }
    }

    pub fn payload_json(&self) -> Option<serde_json::Value> {
        match self {
            SyncEvent::AlertsChanged { alert, .. } => alert.as_ref().map(Alert::to_json),
            SyncEvent::WatchlistChanged { change, .. } => {
                change.as_ref().and_then(|c| serde_json::to_value(c).ok())
            }
        }
    }
}

/// In-process publish/subscribe channel for data-change signals.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: SyncEvent) {
        // no subscribers is fine: pollers catch up on their own
        let _ = self.tx.send(event);
    }

    pub fn alerts_changed(&self, user_id: ObjectId, alert: Option<Alert>) {
        self.publish(SyncEvent::AlertsChanged { user_id, alert });
    }

    pub fn watchlist_changed(&self, user_id: ObjectId, change: Option<WatchlistChange>) {
        self.publish(SyncEvent::WatchlistChanged { user_id, change });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
