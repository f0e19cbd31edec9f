use mongodb::{
    bson::{doc, Document},
    options::IndexOptions,
    Database, IndexModel,
};

use crate::error::StoreError;

use super::{
    alerts_service::ALERTS_COLLECTION, notifications_service::NOTIFICATIONS_COLLECTION,
    watchlist_service::WATCHLIST_COLLECTION,
};

pub async fn ensure_indexes(db: &Database) -> Result<(), StoreError> {
    // alerts: at most one live alert per (user, symbol, direction, threshold)
    {
        let col = db.collection::<Document>(ALERTS_COLLECTION);
        let model = IndexModel::builder()
            .keys(doc! { "user_id": 1, "symbol": 1, "direction": 1, "threshold": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .partial_filter_expression(doc! { "triggered": false })
                    .name("live_alert_unique".to_string())
                    .build(),
            )
            .build();

        col.create_index(model, None).await?;
    }

    // alerts: owner listing and the monitor's per-user scan
    {
        let col = db.collection::<Document>(ALERTS_COLLECTION);
        let model = IndexModel::builder()
            .keys(doc! { "user_id": 1, "triggered": 1, "created_at": -1 })
            .build();

        col.create_index(model, None).await?;
    }

    // notifications: newest first per user
    {
        let col = db.collection::<Document>(NOTIFICATIONS_COLLECTION);
        let model = IndexModel::builder()
            .keys(doc! { "user_id": 1, "triggered_at": -1 })
            .build();

        col.create_index(model, None).await?;
    }

    // watchlist: unique per (user_id, symbol)
    {
        let col = db.collection::<Document>(WATCHLIST_COLLECTION);
        let model = IndexModel::builder()
            .keys(doc! { "user_id": 1, "symbol": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        col.create_index(model, None).await?;
    }

    Ok(())
}
