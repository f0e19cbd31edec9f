use async_trait::async_trait;
use futures_util::StreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};

use crate::{error::StoreError, models::AlertNotification};

pub const NOTIFICATIONS_COLLECTION: &str = "alert_notifications";

/// Append-only trigger history. The only mutation is the one-way `read` flip.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn record(&self, notification: &AlertNotification) -> Result<(), StoreError>;

    /// At most `limit` records, newest `triggered_at` first.
    async fn find_recent_by_owner(
        &self,
        user_id: ObjectId,
        limit: i64,
    ) -> Result<Vec<AlertNotification>, StoreError>;

    /// `true` only when this call flipped `read` from false to true.
    async fn mark_read(&self, user_id: ObjectId, id: ObjectId) -> Result<bool, StoreError>;

    async fn unread_count(&self, user_id: ObjectId) -> Result<u64, StoreError>;
}

#[derive(Clone)]
pub struct MongoNotificationRepository {
    notifications: Collection<AlertNotification>,
}

impl MongoNotificationRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            notifications: db.collection::<AlertNotification>(NOTIFICATIONS_COLLECTION),
        }
    }
}

#[async_trait]
impl NotificationRepository for MongoNotificationRepository {
    async fn record(&self, notification: &AlertNotification) -> Result<(), StoreError> {
        self.notifications.insert_one(notification, None).await?;
        Ok(())
    }

    async fn find_recent_by_owner(
        &self,
        user_id: ObjectId,
        limit: i64,
    ) -> Result<Vec<AlertNotification>, StoreError> {
        let find_opts = FindOptions::builder()
            .sort(doc! { "triggered_at": -1, "_id": -1 })
            .limit(limit)
            .build();

        let mut cursor = self
            .notifications
            .find(doc! { "user_id": user_id }, find_opts)
            .await?;

        let mut items = Vec::new();
        while let Some(res) = cursor.next().await {
            items.push(res?);
        }

        Ok(items)
    }

    async fn mark_read(&self, user_id: ObjectId, id: ObjectId) -> Result<bool, StoreError> {
        let res = self
            .notifications
            .update_one(
                doc! { "_id": id, "user_id": user_id, "read": false },
                doc! { "$set": { "read": true } },
                None,
            )
            .await?;

        Ok(res.modified_count > 0)
    }

    async fn unread_count(&self, user_id: ObjectId) -> Result<u64, StoreError> {
        Ok(self
            .notifications
            .count_documents(doc! { "user_id": user_id, "read": false }, None)
            .await?)
    }
}
