use std::{collections::HashMap, sync::Arc, time::Duration};

use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OnceCell};

use crate::{
    error::{QuoteError, StoreError},
    models::{Alert, Direction},
};

use super::{alerts_service::AlertRepository, finnhub::{Quote, QuoteClient}};

/// Outcome of checking one alert against one quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub triggered: bool,
    pub price: Decimal,
}

/// Inclusive on both sides: a price equal to the threshold triggers either direction.
pub fn evaluate(alert: &Alert, quote: &Quote) -> Evaluation {
    let price = quote.price;
    let triggered = match alert.direction {
        Direction::Above => price >= alert.threshold,
        Direction::Below => price <= alert.threshold,
    };

    Evaluation { triggered, price }
}

/// An alert whose condition held, with the quote that satisfied it.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub alert: Alert,
    pub quote: Quote,
}

#[derive(Debug, Default)]
pub struct UserEvaluation {
    pub triggers: Vec<TriggerEvent>,
    pub evaluated: usize,
    pub skipped: usize,
}

/// Quotes fetched during one scheduler tick, shared by every user in it.
///
/// Each symbol gets its own cell: concurrent users asking for the same symbol
/// wait on a single upstream call. Failures are cached too, so a dead symbol
/// costs one call per tick.
#[derive(Default)]
pub struct QuoteCache {
    entries: Mutex<HashMap<String, Arc<OnceCell<Result<Quote, QuoteError>>>>>,
}

impl QuoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    async fn get_or_fetch(
        &self,
        client: &dyn QuoteClient,
        symbol: &str,
        timeout: Duration,
    ) -> Result<Quote, QuoteError> {
        let cell = self
            .entries
            .lock()
            .await
            .entry(symbol.to_string())
            .or_default()
            .clone();

        cell.get_or_init(|| async {
            match tokio::time::timeout(timeout, client.fetch_quote(symbol)).await {
                Ok(res) => res,
                Err(_) => Err(QuoteError::unavailable(symbol, "quote request timed out")),
            }
        })
        .await
        .clone()
    }
}

#[derive(Clone)]
pub struct AlertEngine {
    alerts: Arc<dyn AlertRepository>,
    quotes: Arc<dyn QuoteClient>,
    quote_timeout: Duration,
}

impl AlertEngine {
    pub fn new(
        alerts: Arc<dyn AlertRepository>,
        quotes: Arc<dyn QuoteClient>,
        quote_timeout: Duration,
    ) -> Self {
        Self {
            alerts,
            quotes,
            quote_timeout,
        }
    }

    /// Checks every live alert of one user. Alerts whose quote is unavailable
    /// are skipped for this cycle and left untouched.
    pub async fn evaluate_user(
        &self,
        user_id: ObjectId,
        cache: &QuoteCache,
    ) -> Result<UserEvaluation, StoreError> {
        let alerts = self.alerts.find_live_by_owner(user_id).await?;
        let mut out = UserEvaluation::default();

        for alert in alerts {
            let quote = match cache
                .get_or_fetch(self.quotes.as_ref(), &alert.symbol, self.quote_timeout)
                .await
            {
                Ok(q) => q,
                Err(e) => {
                    tracing::warn!(
                        user_id = %user_id,
                        alert_id = %alert.id,
                        symbol = %alert.symbol,
                        "skipping alert this cycle: {}",
                        e
                    );
                    out.skipped += 1;
                    continue;
                }
            };

            out.evaluated += 1;

            let eval = evaluate(&alert, &quote);
            if eval.triggered {
                tracing::debug!(
                    alert_id = %alert.id,
                    symbol = %alert.symbol,
                    price = %eval.price,
                    threshold = %alert.threshold,
                    "alert condition met"
                );
                out.triggers.push(TriggerEvent { alert, quote });
            }
        }

        Ok(out)
    }
}
