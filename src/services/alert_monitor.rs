use std::{sync::Arc, time::Duration};

use futures_util::{stream, StreamExt};
use mongodb::bson::oid::ObjectId;
use tokio::{
    sync::{watch, Notify},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::{
    error::StoreError,
    events::EventBus,
    models::{now_ms, User},
};

use super::{
    alert_dispatcher::{DispatchOutcome, NotificationDispatcher},
    alert_engine::{AlertEngine, QuoteCache},
    alerts_service::AlertRepository,
    user_service::UserDirectory,
};

/// Claimed alerts older than this were abandoned mid-retirement (e.g. a crash).
pub const CLAIM_STALE_AFTER: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserOutcome {
    pub user_id: ObjectId,
    pub evaluated: usize,
    pub skipped: usize,
    pub triggered: usize,
    pub failed: usize,
    pub purged: u64,
    pub error: Option<String>,
}

impl UserOutcome {
    fn new(user_id: ObjectId) -> Self {
        Self {
            user_id,
            evaluated: 0,
            skipped: 0,
            triggered: 0,
            failed: 0,
            purged: 0,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.failed == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub outcomes: Vec<UserOutcome>,
}

impl TickReport {
    pub fn total_purged(&self) -> u64 {
        self.outcomes.iter().map(|o| o.purged).sum()
    }

    pub fn total_triggered(&self) -> usize {
        self.outcomes.iter().map(|o| o.triggered).sum()
    }

    pub fn outcome(&self, user_id: ObjectId) -> Option<&UserOutcome> {
        self.outcomes.iter().find(|o| o.user_id == user_id)
    }

    pub fn succeeded(&self, user_id: ObjectId) -> bool {
        self.outcome(user_id).is_some_and(UserOutcome::is_success)
    }
}

/// Drives the evaluation engine over every user. One bad user or alert is
/// logged and recorded in the report; it never stops the rest of the batch.
pub struct AlertMonitor {
    users: Arc<dyn UserDirectory>,
    alerts: Arc<dyn AlertRepository>,
    engine: AlertEngine,
    dispatcher: NotificationDispatcher,
    events: EventBus,
    concurrency: usize,
}

impl AlertMonitor {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        alerts: Arc<dyn AlertRepository>,
        engine: AlertEngine,
        dispatcher: NotificationDispatcher,
        events: EventBus,
        concurrency: usize,
    ) -> Self {
        Self {
            users,
            alerts,
            engine,
            dispatcher,
            events,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn run_tick(&self) -> Result<TickReport, StoreError> {
        let users = self.users.list_recipients().await?;
        if users.is_empty() {
            return Ok(TickReport::default());
        }

        // one quote request per symbol per tick, shared across users
        let cache = QuoteCache::new();

        let outcomes: Vec<UserOutcome> = stream::iter(users)
            .map(|user| self.process_user(user, &cache))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for o in outcomes.iter().filter(|o| o.triggered > 0) {
            self.events.alerts_changed(o.user_id, None);
        }

        Ok(TickReport { outcomes })
    }

    async fn process_user(&self, user: User, cache: &QuoteCache) -> UserOutcome {
        let mut outcome = UserOutcome::new(user.id);

        // only this user's records are touched while processing them
        let stale_before = now_ms() - CLAIM_STALE_AFTER.as_millis() as i64;
        match self.alerts.purge_claimed(user.id, stale_before).await {
            Ok(n) => {
                if n > 0 {
                    tracing::warn!(
                        user_id = %user.id,
                        "[alert-monitor] purged {} abandoned claimed alerts",
                        n
                    );
                }
                outcome.purged = n;
            }
            Err(e) => tracing::error!(
                user_id = %user.id,
                "[alert-monitor] purge of claimed alerts failed: {}",
                e
            ),
        }

        let eval = match self.engine.evaluate_user(user.id, cache).await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(user_id = %user.id, "[alert-monitor] user skipped: {}", e);
                outcome.error = Some(e.to_string());
                return outcome;
            }
        };

        outcome.evaluated = eval.evaluated;
        outcome.skipped = eval.skipped;

        for trigger in eval.triggers {
            let alert_id = trigger.alert.id;
            match self.dispatcher.dispatch(&user, trigger).await {
                Ok(DispatchOutcome::Retired(_)) => outcome.triggered += 1,
                Ok(DispatchOutcome::AlreadyRetired) => {}
                Err(e) => {
                    tracing::error!(
                        user_id = %user.id,
                        alert_id = %alert_id,
                        "[alert-monitor] dispatch failed, alert stays live: {}",
                        e
                    );
                    outcome.failed += 1;
                }
            }
        }

        outcome
    }
}

/// Runs a tick every `every`, or right away when `run_now` is notified, until
/// `shutdown` flips to true.
pub fn spawn_price_alert_monitor(
    monitor: Arc<AlertMonitor>,
    every: Duration,
    run_now: Arc<Notify>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = run_now.notified() => {
                    tracing::info!("[alert-monitor] on-demand run");
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            match monitor.run_tick().await {
                Ok(report) => tracing::info!(
                    users = report.outcomes.len(),
                    triggered = report.total_triggered(),
                    failed_users = report.outcomes.iter().filter(|o| !o.is_success()).count(),
                    purged = report.total_purged(),
                    "[alert-monitor] tick done"
                ),
                Err(e) => tracing::error!("[alert-monitor] tick error: {}", e),
            }
        }

        tracing::info!("[alert-monitor] stopped");
    })
}
