//! In-memory repositories.
//!
//! Same contracts as the Mongo implementations, used by tests and local
//! development without a database.

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use tokio::sync::RwLock;

use crate::{
    error::StoreError,
    models::{
        alert::normalize_symbol, now_ms, Alert, AlertNotification, AlertPatch, NewAlert, User,
        WatchlistItem,
    },
};

use super::{
    alerts_service::AlertRepository, notifications_service::NotificationRepository,
    user_service::UserDirectory, watchlist_service::WatchlistRepository,
};

/// Alerts kept in insertion order, which is also creation order.
#[derive(Default)]
pub struct MemoryAlertRepository {
    alerts: RwLock<Vec<Alert>>,
}

impl MemoryAlertRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.alerts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.alerts.read().await.is_empty()
    }

    pub async fn get(&self, id: ObjectId) -> Option<Alert> {
        self.alerts.read().await.iter().find(|a| a.id == id).cloned()
    }

    async fn newest_first(&self, keep: impl Fn(&Alert) -> bool) -> Vec<Alert> {
        self.alerts
            .read()
            .await
            .iter()
            .rev()
            .filter(|a| keep(*a))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AlertRepository for MemoryAlertRepository {
    async fn create(&self, new: NewAlert) -> Result<Alert, StoreError> {
        let alert = Alert::from_new(new, now_ms())?;

        let mut alerts = self.alerts.write().await;
        if alerts.iter().any(|a| a.is_live() && a.same_condition(&alert)) {
            return Err(StoreError::DuplicateAlert);
        }
        alerts.push(alert.clone());

        Ok(alert)
    }

    async fn find_by_owner(&self, user_id: ObjectId) -> Result<Vec<Alert>, StoreError> {
        Ok(self.newest_first(|a| a.user_id == user_id).await)
    }

    async fn find_by_owner_and_symbol(
        &self,
        user_id: ObjectId,
        symbol: &str,
    ) -> Result<Vec<Alert>, StoreError> {
        let sym = normalize_symbol(symbol)?;
        Ok(self
            .newest_first(|a| a.user_id == user_id && a.symbol == sym)
            .await)
    }

    async fn find_live_by_owner(&self, user_id: ObjectId) -> Result<Vec<Alert>, StoreError> {
        Ok(self.newest_first(|a| a.user_id == user_id && a.is_live()).await)
    }

    async fn update(
        &self,
        user_id: ObjectId,
        alert_id: ObjectId,
        patch: AlertPatch,
    ) -> Result<Alert, StoreError> {
        let mut alerts = self.alerts.write().await;

        let Some(idx) = alerts
            .iter()
            .position(|a| a.id == alert_id && a.user_id == user_id && a.is_live())
        else {
            return Err(StoreError::not_found("alert", alert_id.to_hex()));
        };

        let mut updated = alerts[idx].clone();
        updated.apply_patch(&patch)?;

        if alerts
            .iter()
            .any(|a| a.id != alert_id && a.is_live() && a.same_condition(&updated))
        {
            return Err(StoreError::DuplicateAlert);
        }

        alerts[idx] = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, user_id: ObjectId, alert_id: ObjectId) -> Result<bool, StoreError> {
        let mut alerts = self.alerts.write().await;
        let before = alerts.len();
        alerts.retain(|a| !(a.id == alert_id && a.user_id == user_id));
        Ok(alerts.len() != before)
    }

    async fn delete_by_owner_and_symbol(
        &self,
        user_id: ObjectId,
        symbol: &str,
    ) -> Result<u64, StoreError> {
        let sym = normalize_symbol(symbol)?;
        let mut alerts = self.alerts.write().await;
        let before = alerts.len();
        alerts.retain(|a| !(a.user_id == user_id && a.symbol == sym));
        Ok((before - alerts.len()) as u64)
    }

    async fn claim(
        &self,
        user_id: ObjectId,
        alert_id: ObjectId,
        at: i64,
    ) -> Result<bool, StoreError> {
        let mut alerts = self.alerts.write().await;
        match alerts
            .iter_mut()
            .find(|a| a.id == alert_id && a.user_id == user_id && a.is_live())
        {
            Some(a) => {
                a.triggered = true;
                a.triggered_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn purge_claimed(&self, user_id: ObjectId, before: i64) -> Result<u64, StoreError> {
        let mut alerts = self.alerts.write().await;
        let n = alerts.len();
        alerts.retain(|a| {
            !(a.user_id == user_id && a.triggered && a.triggered_at.is_some_and(|t| t < before))
        });
        Ok((n - alerts.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryNotificationRepository {
    items: RwLock<Vec<AlertNotification>>,
}

impl MemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<AlertNotification> {
        self.items.read().await.clone()
    }
}

#[async_trait]
impl NotificationRepository for MemoryNotificationRepository {
    async fn record(&self, notification: &AlertNotification) -> Result<(), StoreError> {
        self.items.write().await.push(notification.clone());
        Ok(())
    }

    async fn find_recent_by_owner(
        &self,
        user_id: ObjectId,
        limit: i64,
    ) -> Result<Vec<AlertNotification>, StoreError> {
        let mut items: Vec<AlertNotification> = self
            .items
            .read()
            .await
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();

        // stable: equal timestamps stay newest-inserted first
        items.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        items.truncate(usize::try_from(limit).unwrap_or(0));

        Ok(items)
    }

    async fn mark_read(&self, user_id: ObjectId, id: ObjectId) -> Result<bool, StoreError> {
        let mut items = self.items.write().await;
        match items
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id && !n.read)
        {
            Some(n) => {
                n.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn unread_count(&self, user_id: ObjectId) -> Result<u64, StoreError> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .count() as u64)
    }
}

#[derive(Default)]
pub struct MemoryWatchlistRepository {
    items: RwLock<Vec<WatchlistItem>>,
}

impl MemoryWatchlistRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WatchlistRepository for MemoryWatchlistRepository {
    async fn add(
        &self,
        user_id: ObjectId,
        symbol: &str,
        company: &str,
    ) -> Result<(WatchlistItem, bool), StoreError> {
        let sym = normalize_symbol(symbol)?;
        let mut items = self.items.write().await;

        if let Some(existing) = items.iter().find(|i| i.user_id == user_id && i.symbol == sym) {
            return Ok((existing.clone(), false));
        }

        let item = WatchlistItem {
            id: ObjectId::new(),
            user_id,
            company: match company.trim() {
                "" => sym.clone(),
                c => c.to_string(),
            },
            symbol: sym,
            added_at: now_ms(),
        };
        items.push(item.clone());

        Ok((item, true))
    }

    async fn remove(&self, user_id: ObjectId, symbol: &str) -> Result<bool, StoreError> {
        let sym = normalize_symbol(symbol)?;
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|i| !(i.user_id == user_id && i.symbol == sym));
        Ok(items.len() != before)
    }

    async fn find_by_owner(&self, user_id: ObjectId) -> Result<Vec<WatchlistItem>, StoreError> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .rev()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<Vec<User>>,
}

impl MemoryUserDirectory {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users: RwLock::new(users),
        }
    }

    pub async fn insert(&self, user: User) {
        self.users.write().await.push(user);
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn list_recipients(&self) -> Result<Vec<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .filter(|u| !u.email.trim().is_empty())
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }
}
