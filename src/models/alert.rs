use std::sync::OnceLock;

use mongodb::bson::oid::ObjectId;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[serde(alias = "upper")]
    Above,
    #[serde(alias = "lower")]
    Below,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Above => "above",
            Direction::Below => "below",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::Above => "Above",
            Direction::Below => "Below",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub user_id: ObjectId,
    pub symbol: String,
    pub company: String,
    pub alert_name: String,

    pub direction: Direction,
    #[serde(with = "rust_decimal::serde::float")]
    pub threshold: Decimal,

    pub created_at: i64,

    // set only between claim and retirement; a live alert is always false
    #[serde(default)]
    pub triggered: bool,
    #[serde(default)]
    pub triggered_at: Option<i64>,
}

/// Fields a user supplies when creating an alert.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub user_id: ObjectId,
    pub symbol: String,
    pub company: String,
    pub alert_name: String,
    pub direction: Direction,
    pub threshold: Decimal,
}

/// Editable fields of a live alert.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPatch {
    #[serde(default)]
    pub alert_name: Option<String>,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub threshold: Option<Decimal>,
}

fn symbol_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z0-9][A-Z0-9.:\-]{0,19}$").expect("symbol regex"))
}

pub fn normalize_symbol(raw: &str) -> Result<String, StoreError> {
    let sym = raw.trim().to_uppercase();
    if !symbol_re().is_match(&sym) {
        return Err(StoreError::invalid("Please enter a valid symbol."));
    }
    Ok(sym)
}

fn check_threshold(threshold: Decimal) -> Result<(), StoreError> {
    if threshold <= Decimal::ZERO {
        return Err(StoreError::invalid("Please enter a valid target price."));
    }
    Ok(())
}

fn check_name(name: &str) -> Result<String, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::invalid("Please give the alert a name."));
    }
    Ok(name.to_string())
}

impl Alert {
    /// Validates and normalizes a create request into a live alert record.
    pub fn from_new(new: NewAlert, now: i64) -> Result<Alert, StoreError> {
        let symbol = normalize_symbol(&new.symbol)?;
        check_threshold(new.threshold)?;
        let alert_name = check_name(&new.alert_name)?;

        let company = match new.company.trim() {
            "" => symbol.clone(),
            c => c.to_string(),
        };

        Ok(Alert {
            id: ObjectId::new(),
            user_id: new.user_id,
            symbol,
            company,
            alert_name,
            direction: new.direction,
            threshold: new.threshold,
            created_at: now,
            triggered: false,
            triggered_at: None,
        })
    }

    pub fn is_live(&self) -> bool {
        !self.triggered
    }

    /// Two alerts with the same owner, symbol, direction and threshold watch the same event.
    pub fn same_condition(&self, other: &Alert) -> bool {
        self.user_id == other.user_id
            && self.symbol == other.symbol
            && self.direction == other.direction
            && self.threshold == other.threshold
    }

    pub fn apply_patch(&mut self, patch: &AlertPatch) -> Result<(), StoreError> {
        if let Some(name) = &patch.alert_name {
            self.alert_name = check_name(name)?;
        }
        if let Some(direction) = patch.direction {
            self.direction = direction;
        }
        if let Some(threshold) = patch.threshold {
            check_threshold(threshold)?;
            self.threshold = threshold;
        }
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id.to_hex(),
            "symbol": self.symbol,
            "company": self.company,
            "alertName": self.alert_name,
            "direction": self.direction.as_str(),
            "threshold": self.threshold,
            "createdAt": self.created_at,
            "triggered": self.triggered,
            "triggeredAt": self.triggered_at,
        })
    }
}
