use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistItem {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub user_id: ObjectId,
    pub symbol: String,
    pub company: String,
    pub added_at: i64,
}

impl WatchlistItem {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id.to_hex(),
            "symbol": self.symbol,
            "company": self.company,
            "addedAt": self.added_at,
        })
    }
}

/// Payload of a `watchlistChanged` signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistChange {
    pub symbol: String,
    pub is_added: bool,
}
