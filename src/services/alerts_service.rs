use async_trait::async_trait;
use futures_util::StreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};
use rust_decimal::{prelude::ToPrimitive, Decimal};

use crate::{
    error::StoreError,
    models::{alert::normalize_symbol, now_ms, Alert, AlertPatch, NewAlert},
};

pub const ALERTS_COLLECTION: &str = "alerts";

/// Durable alert records, always scoped by owner.
#[async_trait]
pub trait AlertRepository: Send + Sync {
    /// Rejects with [`StoreError::DuplicateAlert`] when a live alert with the
    /// same owner, symbol, direction and threshold already exists.
    async fn create(&self, new: NewAlert) -> Result<Alert, StoreError>;

    /// Newest first.
    async fn find_by_owner(&self, user_id: ObjectId) -> Result<Vec<Alert>, StoreError>;

    async fn find_by_owner_and_symbol(
        &self,
        user_id: ObjectId,
        symbol: &str,
    ) -> Result<Vec<Alert>, StoreError>;

    async fn find_live_by_owner(&self, user_id: ObjectId) -> Result<Vec<Alert>, StoreError>;

    /// Only live alerts can be edited; anything else is not found.
    async fn update(
        &self,
        user_id: ObjectId,
        alert_id: ObjectId,
        patch: AlertPatch,
    ) -> Result<Alert, StoreError>;

    /// `Ok(false)` when there was nothing to delete.
    async fn delete(&self, user_id: ObjectId, alert_id: ObjectId) -> Result<bool, StoreError>;

    async fn delete_by_owner_and_symbol(
        &self,
        user_id: ObjectId,
        symbol: &str,
    ) -> Result<u64, StoreError>;

    /// Atomically marks a live alert as triggered. Returns `false` if the
    /// alert no longer exists or another run already claimed it.
    async fn claim(&self, user_id: ObjectId, alert_id: ObjectId, at: i64)
        -> Result<bool, StoreError>;

    /// Deletes the owner's claimed alerts older than `before` whose retirement never finished.
    async fn purge_claimed(&self, user_id: ObjectId, before: i64) -> Result<u64, StoreError>;
}

#[derive(Clone)]
pub struct MongoAlertRepository {
    alerts: Collection<Alert>,
}

impl MongoAlertRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            alerts: db.collection::<Alert>(ALERTS_COLLECTION),
        }
    }

    async fn collect(&self, filter: Document) -> Result<Vec<Alert>, StoreError> {
        let find_opts = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();

        let mut cursor = self.alerts.find(filter, find_opts).await?;

        let mut items: Vec<Alert> = Vec::new();
        while let Some(res) = cursor.next().await {
            items.push(res?);
        }

        Ok(items)
    }

    async fn live_duplicate(&self, alert: &Alert) -> Result<Option<Alert>, StoreError> {
        let filter = doc! {
            "_id": { "$ne": alert.id },
            "user_id": alert.user_id,
            "symbol": &alert.symbol,
            "direction": alert.direction.as_str(),
            "threshold": threshold_bson(alert.threshold)?,
            "triggered": false,
        };

        Ok(self.alerts.find_one(filter, None).await?)
    }
}

fn threshold_bson(threshold: Decimal) -> Result<f64, StoreError> {
    threshold
        .to_f64()
        .ok_or_else(|| StoreError::invalid("Please enter a valid target price."))
}

#[async_trait]
impl AlertRepository for MongoAlertRepository {
    async fn create(&self, new: NewAlert) -> Result<Alert, StoreError> {
        let alert = Alert::from_new(new, now_ms())?;

        if self.live_duplicate(&alert).await?.is_some() {
            return Err(StoreError::DuplicateAlert);
        }

        // the partial unique index turns a concurrent duplicate into E11000
        self.alerts.insert_one(&alert, None).await?;

        Ok(alert)
    }

    async fn find_by_owner(&self, user_id: ObjectId) -> Result<Vec<Alert>, StoreError> {
        self.collect(doc! { "user_id": user_id }).await
    }

    async fn find_by_owner_and_symbol(
        &self,
        user_id: ObjectId,
        symbol: &str,
    ) -> Result<Vec<Alert>, StoreError> {
        let sym = normalize_symbol(symbol)?;
        self.collect(doc! { "user_id": user_id, "symbol": &sym }).await
    }

    async fn find_live_by_owner(&self, user_id: ObjectId) -> Result<Vec<Alert>, StoreError> {
        self.collect(doc! { "user_id": user_id, "triggered": false })
            .await
    }

    async fn update(
        &self,
        user_id: ObjectId,
        alert_id: ObjectId,
        patch: AlertPatch,
    ) -> Result<Alert, StoreError> {
        let live = doc! { "_id": alert_id, "user_id": user_id, "triggered": false };

        let Some(mut alert) = self.alerts.find_one(live.clone(), None).await? else {
            return Err(StoreError::not_found("alert", alert_id.to_hex()));
        };

        alert.apply_patch(&patch)?;

        if self.live_duplicate(&alert).await?.is_some() {
            return Err(StoreError::DuplicateAlert);
        }

        let res = self
            .alerts
            .update_one(
                live,
                doc! { "$set": {
                    "alert_name": &alert.alert_name,
                    "direction": alert.direction.as_str(),
                    "threshold": threshold_bson(alert.threshold)?,
                } },
                None,
            )
            .await?;

        // claimed or deleted between the read and the write
        if res.matched_count == 0 {
            return Err(StoreError::not_found("alert", alert_id.to_hex()));
        }

        Ok(alert)
    }

    async fn delete(&self, user_id: ObjectId, alert_id: ObjectId) -> Result<bool, StoreError> {
        let res = self
            .alerts
            .delete_one(doc! { "_id": alert_id, "user_id": user_id }, None)
            .await?;

        Ok(res.deleted_count > 0)
    }

    async fn delete_by_owner_and_symbol(
        &self,
        user_id: ObjectId,
        symbol: &str,
    ) -> Result<u64, StoreError> {
        let sym = normalize_symbol(symbol)?;
        let res = self
            .alerts
            .delete_many(doc! { "user_id": user_id, "symbol": &sym }, None)
            .await?;

        Ok(res.deleted_count)
    }

    async fn claim(
        &self,
        user_id: ObjectId,
        alert_id: ObjectId,
        at: i64,
    ) -> Result<bool, StoreError> {
        let res = self
            .alerts
            .update_one(
                doc! { "_id": alert_id, "user_id": user_id, "triggered": false },
                doc! { "$set": { "triggered": true, "triggered_at": at } },
                None,
            )
            .await?;

        Ok(res.modified_count > 0)
    }

    async fn purge_claimed(&self, user_id: ObjectId, before: i64) -> Result<u64, StoreError> {
        let res = self
            .alerts
            .delete_many(
                doc! { "user_id": user_id, "triggered": true, "triggered_at": { "$lt": before } },
                None,
            )
            .await?;

        Ok(res.deleted_count)
    }
}
