//! Client-side reconciliation of optimistic state with server truth.
//!
//! Two freshness mechanisms feed a [`SyncedList`]: push (bus events, merged
//! by id) and pull (a periodic full re-query). A full re-query is
//! authoritative and discards any optimistic state still pending.

use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use mongodb::bson::oid::ObjectId;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    watch, Mutex,
};

use crate::{
    error::StoreError,
    events::SyncEvent,
    models::{Alert, AlertNotification, WatchlistItem},
};

pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

/// What a bus event asks a list to do.
#[derive(Debug, Clone)]
pub enum Signal<T> {
    Merge(T),
    Refresh,
}

pub trait Identified: Clone + Send + 'static {
    fn key(&self) -> ObjectId;

    /// `None` when the event is irrelevant to this kind of record.
    fn signal(event: &SyncEvent) -> Option<Signal<Self>>;
}

impl Identified for Alert {
    fn key(&self) -> ObjectId {
        self.id
    }

    fn signal(event: &SyncEvent) -> Option<Signal<Self>> {
        match event {
            SyncEvent::AlertsChanged { alert: Some(a), .. } => Some(Signal::Merge(a.clone())),
            SyncEvent::AlertsChanged { alert: None, .. } => Some(Signal::Refresh),
            // watchlist removals cascade into alerts
            SyncEvent::WatchlistChanged { .. } => Some(Signal::Refresh),
        }
    }
}

impl Identified for AlertNotification {
    fn key(&self) -> ObjectId {
        self.id
    }

    fn signal(event: &SyncEvent) -> Option<Signal<Self>> {
        match event {
            // only scheduler retirements publish without a payload
            SyncEvent::AlertsChanged { alert: None, .. } => Some(Signal::Refresh),
            _ => None,
        }
    }
}

impl Identified for WatchlistItem {
    fn key(&self) -> ObjectId {
        self.id
    }

    fn signal(event: &SyncEvent) -> Option<Signal<Self>> {
        match event {
            SyncEvent::WatchlistChanged { .. } => Some(Signal::Refresh),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Mutation<T> {
    Upsert(T),
    Remove(ObjectId),
}

/// Handle for undoing one optimistic mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingToken(u64);

#[derive(Debug, Clone)]
pub struct SyncedList<T: Identified> {
    items: Vec<T>,
    undo: HashMap<PendingToken, (ObjectId, Option<T>)>,
    next_token: u64,
}

impl<T: Identified> Default for SyncedList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            undo: HashMap::new(),
            next_token: 0,
        }
    }
}

impl<T: Identified> SyncedList<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, key: ObjectId) -> Option<&T> {
        self.items.iter().find(|i| i.key() == key)
    }

    pub fn has_pending(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Applies a mutation locally before the server has answered.
    pub fn apply(&mut self, mutation: Mutation<T>) -> PendingToken {
        let key = match &mutation {
            Mutation::Upsert(item) => item.key(),
            Mutation::Remove(key) => *key,
        };

        let token = PendingToken(self.next_token);
        self.next_token += 1;
        self.undo.insert(token, (key, self.get(key).cloned()));

        match mutation {
            Mutation::Upsert(item) => self.merge(item),
            Mutation::Remove(key) => {
                self.remove(key);
            }
        }

        token
    }

    /// The server accepted the mutation.
    pub fn confirm(&mut self, token: PendingToken) {
        self.undo.remove(&token);
    }

    /// The server rejected the mutation; restores the record as it was.
    /// Returns `false` if a full refresh already superseded it.
    pub fn rollback(&mut self, token: PendingToken) -> bool {
        let Some((key, previous)) = self.undo.remove(&token) else {
            return false;
        };

        match previous {
            Some(item) => self.merge(item),
            None => {
                self.remove(key);
            }
        }
        true
    }

    /// Upsert by id. Applying the same record twice is a no-op.
    pub fn merge(&mut self, item: T) {
        match self.items.iter_mut().find(|i| i.key() == item.key()) {
            Some(slot) => *slot = item,
            None => self.items.insert(0, item),
        }
    }

    pub fn remove(&mut self, key: ObjectId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.key() != key);
        self.items.len() != before
    }

    /// Server truth replaces everything, including pending optimistic state.
    pub fn replace_all(&mut self, items: Vec<T>) {
        self.items = items;
        self.undo.clear();
    }
}

async fn next_event(
    rx: &mut Option<broadcast::Receiver<SyncEvent>>,
) -> Result<SyncEvent, RecvError> {
    match rx {
        Some(r) => r.recv().await,
        None => std::future::pending().await,
    }
}

async fn refresh<T, F, Fut>(list: &Mutex<SyncedList<T>>, fetch: &F)
where
    T: Identified,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Vec<T>, StoreError>>,
{
    match fetch().await {
        Ok(items) => list.lock().await.replace_all(items),
        Err(e) => tracing::warn!("sync refresh failed, keeping local state: {}", e),
    }
}

/// Keeps `list` in step with one user's server-side records until `shutdown`
/// flips. Missed or lagged broadcasts are covered by the poll.
pub async fn run_reconciler<T, F, Fut>(
    list: Arc<Mutex<SyncedList<T>>>,
    events: broadcast::Receiver<SyncEvent>,
    user_id: ObjectId,
    every: Duration,
    fetch: F,
    mut shutdown: watch::Receiver<bool>,
) where
    T: Identified,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Vec<T>, StoreError>>,
{
    let mut events = Some(events);
    let mut poll = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = poll.tick() => refresh(&list, &fetch).await,
            ev = next_event(&mut events) => match ev {
                Ok(event) if event.user_id() == user_id => match T::signal(&event) {
                    Some(Signal::Merge(item)) => list.lock().await.merge(item),
                    Some(Signal::Refresh) => refresh(&list, &fetch).await,
                    None => {}
                },
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => refresh(&list, &fetch).await,
                Err(RecvError::Closed) => events = None,
            },
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
