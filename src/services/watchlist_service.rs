use async_trait::async_trait;
use futures_util::StreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::{FindOptions, UpdateOptions};
use mongodb::{Collection, Database};

use crate::{
    error::StoreError,
    models::{alert::normalize_symbol, now_ms, WatchlistItem},
};

use super::alerts_service::AlertRepository;

pub const WATCHLIST_COLLECTION: &str = "watchlist";

#[async_trait]
pub trait WatchlistRepository: Send + Sync {
    /// Idempotent; the second value is `true` when the membership is new.
    async fn add(
        &self,
        user_id: ObjectId,
        symbol: &str,
        company: &str,
    ) -> Result<(WatchlistItem, bool), StoreError>;

    async fn remove(&self, user_id: ObjectId, symbol: &str) -> Result<bool, StoreError>;

    /// Newest first.
    async fn find_by_owner(&self, user_id: ObjectId) -> Result<Vec<WatchlistItem>, StoreError>;
}

/// Removes a watchlist membership and every alert the owner has on that symbol.
///
/// Returns how many alerts were deleted. Other symbols and other owners are untouched.
pub async fn remove_symbol(
    watchlist: &dyn WatchlistRepository,
    alerts: &dyn AlertRepository,
    user_id: ObjectId,
    symbol: &str,
) -> Result<u64, StoreError> {
    let sym = normalize_symbol(symbol)?;

    watchlist.remove(user_id, &sym).await?;
    let removed = alerts.delete_by_owner_and_symbol(user_id, &sym).await?;

    if removed > 0 {
        tracing::info!(user_id = %user_id, symbol = %sym, removed, "cascade-deleted alerts");
    }

    Ok(removed)
}

#[derive(Clone)]
pub struct MongoWatchlistRepository {
    items: Collection<WatchlistItem>,
}

impl MongoWatchlistRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            items: db.collection::<WatchlistItem>(WATCHLIST_COLLECTION),
        }
    }
}

#[async_trait]
impl WatchlistRepository for MongoWatchlistRepository {
    async fn add(
        &self,
        user_id: ObjectId,
        symbol: &str,
        company: &str,
    ) -> Result<(WatchlistItem, bool), StoreError> {
        let sym = normalize_symbol(symbol)?;
        let company = match company.trim() {
            "" => sym.as_str(),
            c => c,
        };

        let opts = UpdateOptions::builder().upsert(true).build();
        let res = self
            .items
            .update_one(
                doc! { "user_id": user_id, "symbol": &sym },
                doc! { "$setOnInsert": {
                    "_id": ObjectId::new(),
                    "company": company,
                    "added_at": now_ms(),
                } },
                opts,
            )
            .await?;

        let item = self
            .items
            .find_one(doc! { "user_id": user_id, "symbol": &sym }, None)
            .await?
            .ok_or_else(|| StoreError::not_found("watchlist item", &sym))?;

        Ok((item, res.upserted_id.is_some()))
    }

    async fn remove(&self, user_id: ObjectId, symbol: &str) -> Result<bool, StoreError> {
        let sym = normalize_symbol(symbol)?;
        let res = self
            .items
            .delete_one(doc! { "user_id": user_id, "symbol": &sym }, None)
            .await?;

        Ok(res.deleted_count > 0)
    }

    async fn find_by_owner(&self, user_id: ObjectId) -> Result<Vec<WatchlistItem>, StoreError> {
        let find_opts = FindOptions::builder().sort(doc! { "added_at": -1 }).build();

        let mut cursor = self.items.find(doc! { "user_id": user_id }, find_opts).await?;

        let mut items = Vec::new();
        while let Some(res) = cursor.next().await {
            items.push(res?);
        }

        Ok(items)
    }
}
