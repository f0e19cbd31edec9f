use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Alert, Direction};

/// Permanent record of a trigger. Alert fields are copied, not referenced,
/// because the alert itself is deleted on retirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertNotification {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub user_id: ObjectId,
    pub symbol: String,
    pub company: String,
    pub alert_name: String,
    pub direction: Direction,
    #[serde(with = "rust_decimal::serde::float")]
    pub threshold: Decimal,

    #[serde(with = "rust_decimal::serde::float")]
    pub triggered_price: Decimal,
    pub triggered_at: i64,

    #[serde(default)]
    pub read: bool,
}

impl AlertNotification {
    pub fn from_alert(alert: &Alert, triggered_price: Decimal, triggered_at: i64) -> Self {
        Self {
            id: ObjectId::new(),
            user_id: alert.user_id,
            symbol: alert.symbol.clone(),
            company: alert.company.clone(),
            alert_name: alert.alert_name.clone(),
            direction: alert.direction,
            threshold: alert.threshold,
            triggered_price,
            triggered_at,
            read: false,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id.to_hex(),
            "symbol": self.symbol,
            "company": self.company,
            "alertName": self.alert_name,
            "direction": self.direction.as_str(),
            "threshold": self.threshold,
            "triggeredPrice": self.triggered_price,
            "triggeredAt": self.triggered_at,
            "read": self.read,
        })
    }
}
