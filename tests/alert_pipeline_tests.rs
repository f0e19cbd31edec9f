mod common;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use common::{new_alert, quote, Harness, StaticQuotes};
use mongodb::bson::oid::ObjectId;
use price_alerts::{
    error::StoreError,
    events::{SyncEvent, ALERTS_CHANGED},
    models::{Alert, AlertNotification, AlertPatch, Direction, NewAlert},
    services::{
        alert_dispatcher::DispatchOutcome,
        alert_engine::TriggerEvent,
        alerts_service::AlertRepository,
        memory::MemoryAlertRepository,
        notifications_service::NotificationRepository,
    },
};
use rust_decimal_macros::dec;

#[tokio::test]
async fn met_alert_is_notified_once_and_retired() {
    let h = Harness::new(StaticQuotes::new().with_price("AAPL", dec!(150.00)));
    let user = h.add_user("ann@example.com").await;
    let alert = h.add_alert(&user, "AAPL", Direction::Above, dec!(150.00)).await;

    let report = h.monitor().run_tick().await.unwrap();
    assert_eq!(report.total_triggered(), 1);
    assert!(report.succeeded(user.id));

    // alert is gone
    assert!(h.alerts.get(alert.id).await.is_none());

    // exactly one notification with the observed price
    let notes = h.notifications.find_recent_by_owner(user.id, 20).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].triggered_price, dec!(150.00));
    assert_eq!(notes[0].symbol, "AAPL");
    assert!(!notes[0].read);

    // exactly one email to the owner
    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ann@example.com");
    assert!(sent[0].subject.contains("AAPL"));
    assert!(sent[0].subject.contains("Above $150.00"));
    assert!(sent[0].html.contains("150.00"));

    // a second tick has nothing left to do
    let report = h.monitor().run_tick().await.unwrap();
    assert_eq!(report.total_triggered(), 0);
    assert_eq!(h.notifications.all().await.len(), 1);
    assert_eq!(h.mailer.sent().len(), 1);
}

#[tokio::test]
async fn unmet_alert_stays_live() {
    let h = Harness::new(StaticQuotes::new().with_price("AAPL", dec!(149.99)));
    let user = h.add_user("ann@example.com").await;
    let alert = h.add_alert(&user, "AAPL", Direction::Above, dec!(150.00)).await;

    let report = h.monitor().run_tick().await.unwrap();

    assert_eq!(report.total_triggered(), 0);
    let kept = h.alerts.get(alert.id).await.unwrap();
    assert!(kept.is_live());
    assert!(h.notifications.all().await.is_empty());
    assert!(h.mailer.sent().is_empty());
}

#[tokio::test]
async fn unavailable_symbol_only_affects_its_own_alerts() {
    let h = Harness::new(
        StaticQuotes::new()
            .with_price("AAPL", dec!(200))
            .with_failure("TSLA")
            .with_price("MSFT", dec!(50)),
    );
    let u1 = h.add_user("one@example.com").await;
    let u2 = h.add_user("two@example.com").await;
    let u3 = h.add_user("three@example.com").await;

    h.add_alert(&u1, "AAPL", Direction::Above, dec!(150)).await;
    let stuck = h.add_alert(&u2, "TSLA", Direction::Below, dec!(1000)).await;
    h.add_alert(&u3, "MSFT", Direction::Below, dec!(60)).await;

    let report = h.monitor().run_tick().await.unwrap();

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.outcome(u1.id).unwrap().triggered, 1);
    assert_eq!(report.outcome(u3.id).unwrap().triggered, 1);

    let o2 = report.outcome(u2.id).unwrap();
    assert_eq!(o2.triggered, 0);
    assert_eq!(o2.skipped, 1);

    // retried next cycle
    assert!(h.alerts.get(stuck.id).await.unwrap().is_live());
    assert_eq!(h.mailer.sent().len(), 2);
}

/// Delegates to the in-memory store but fails reads for one user.
struct FlakyAlerts {
    inner: Arc<MemoryAlertRepository>,
    broken_user: ObjectId,
}

#[async_trait]
impl AlertRepository for FlakyAlerts {
    async fn create(&self, new: NewAlert) -> Result<Alert, StoreError> {
        self.inner.create(new).await
    }

    async fn find_by_owner(&self, user_id: ObjectId) -> Result<Vec<Alert>, StoreError> {
        self.inner.find_by_owner(user_id).await
    }

    async fn find_by_owner_and_symbol(
        &self,
        user_id: ObjectId,
        symbol: &str,
    ) -> Result<Vec<Alert>, StoreError> {
        self.inner.find_by_owner_and_symbol(user_id, symbol).await
    }

    async fn find_live_by_owner(&self, user_id: ObjectId) -> Result<Vec<Alert>, StoreError> {
        if user_id == self.broken_user {
            return Err(StoreError::Database("connection reset".to_string()));
        }
        self.inner.find_live_by_owner(user_id).await
    }

    async fn update(
        &self,
        user_id: ObjectId,
        alert_id: ObjectId,
        patch: AlertPatch,
    ) -> Result<Alert, StoreError> {
        self.inner.update(user_id, alert_id, patch).await
    }

    async fn delete(&self, user_id: ObjectId, alert_id: ObjectId) -> Result<bool, StoreError> {
        self.inner.delete(user_id, alert_id).await
    }

    async fn delete_by_owner_and_symbol(
        &self,
        user_id: ObjectId,
        symbol: &str,
    ) -> Result<u64, StoreError> {
        self.inner.delete_by_owner_and_symbol(user_id, symbol).await
    }

    async fn claim(&self, user_id: ObjectId, alert_id: ObjectId, at: i64) -> Result<bool, StoreError> {
        self.inner.claim(user_id, alert_id, at).await
    }

    async fn purge_claimed(&self, user_id: ObjectId, before: i64) -> Result<u64, StoreError> {
        self.inner.purge_claimed(user_id, before).await
    }
}

#[tokio::test]
async fn failing_user_does_not_stop_the_batch() {
    let h = Harness::new(StaticQuotes::new().with_price("AAPL", dec!(200)));
    let u1 = h.add_user("one@example.com").await;
    let u2 = h.add_user("two@example.com").await;
    let u3 = h.add_user("three@example.com").await;
    for u in [&u1, &u2, &u3] {
        h.add_alert(u, "AAPL", Direction::Above, dec!(150)).await;
    }

    let flaky = Arc::new(FlakyAlerts {
        inner: h.alerts.clone(),
        broken_user: u2.id,
    });
    let report = h.monitor_with_alerts(flaky).run_tick().await.unwrap();

    assert!(report.succeeded(u1.id));
    assert!(report.succeeded(u3.id));
    assert!(!report.succeeded(u2.id));
    assert!(report.outcome(u2.id).unwrap().error.is_some());

    assert_eq!(report.total_triggered(), 2);
    // u2's alert is untouched
    assert_eq!(h.alerts.find_live_by_owner(u2.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn dispatch_of_retired_alert_sends_nothing() {
    let h = Harness::new(StaticQuotes::new());
    let user = h.add_user("ann@example.com").await;
    let alert = h.add_alert(&user, "AAPL", Direction::Above, dec!(100)).await;

    h.alerts.delete(user.id, alert.id).await.unwrap();

    let outcome = h
        .dispatcher()
        .dispatch(
            &user,
            TriggerEvent {
                alert,
                quote: quote("AAPL", dec!(120)),
            },
        )
        .await
        .unwrap();

    assert!(matches!(outcome, DispatchOutcome::AlreadyRetired));
    assert!(h.notifications.all().await.is_empty());
    assert!(h.mailer.sent().is_empty());
}

#[tokio::test]
async fn second_dispatch_of_same_trigger_is_a_no_op() {
    let h = Harness::new(StaticQuotes::new());
    let user = h.add_user("ann@example.com").await;
    let alert = h.add_alert(&user, "NVDA", Direction::Below, dec!(400)).await;
    let event = TriggerEvent {
        alert,
        quote: quote("NVDA", dec!(390)),
    };

    let dispatcher = h.dispatcher();
    let first = dispatcher.dispatch(&user, event.clone()).await.unwrap();
    let second = dispatcher.dispatch(&user, event).await.unwrap();

    match first {
        DispatchOutcome::Retired(r) => {
            assert!(r.email_sent);
            assert!(r.retired);
            assert_eq!(r.notification.unwrap().triggered_price, dec!(390));
        }
        DispatchOutcome::AlreadyRetired => panic!("first dispatch must retire"),
    }
    assert!(matches!(second, DispatchOutcome::AlreadyRetired));
    assert_eq!(h.notifications.all().await.len(), 1);
    assert_eq!(h.mailer.sent().len(), 1);
}

#[tokio::test]
async fn mail_failure_still_records_and_retires() {
    let h = Harness::new(StaticQuotes::new().with_price("AAPL", dec!(90)));
    h.mailer.fail_sends(true);
    let user = h.add_user("ann@example.com").await;
    let alert = h.add_alert(&user, "AAPL", Direction::Below, dec!(100)).await;

    let report = h.monitor().run_tick().await.unwrap();

    assert_eq!(report.total_triggered(), 1);
    assert!(h.alerts.get(alert.id).await.is_none());
    assert_eq!(h.notifications.all().await.len(), 1);
    assert!(h.mailer.sent().is_empty());
}

/// Notification store whose writes always fail.
struct BrokenNotifications;

#[async_trait]
impl NotificationRepository for BrokenNotifications {
    async fn record(&self, _notification: &AlertNotification) -> Result<(), StoreError> {
        Err(StoreError::Database("write concern timeout".to_string()))
    }

    async fn find_recent_by_owner(
        &self,
        _user_id: ObjectId,
        _limit: i64,
    ) -> Result<Vec<AlertNotification>, StoreError> {
        Ok(Vec::new())
    }

    async fn mark_read(&self, _user_id: ObjectId, _id: ObjectId) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn unread_count(&self, _user_id: ObjectId) -> Result<u64, StoreError> {
        Ok(0)
    }
}

#[tokio::test]
async fn notification_write_failure_still_retires() {
    let h = Harness::new(StaticQuotes::new().with_price("AAPL", dec!(160)));
    let user = h.add_user("ann@example.com").await;
    let alert = h.add_alert(&user, "AAPL", Direction::Above, dec!(150)).await;

    let report = h
        .monitor_with_notifications(Arc::new(BrokenNotifications))
        .run_tick()
        .await
        .unwrap();

    assert_eq!(report.total_triggered(), 1);
    assert!(h.alerts.get(alert.id).await.is_none());
    assert_eq!(h.mailer.sent().len(), 1);

    // nothing left to fire again next tick
    let report = h
        .monitor_with_notifications(Arc::new(BrokenNotifications))
        .run_tick()
        .await
        .unwrap();
    assert_eq!(report.total_triggered(), 0);
    assert_eq!(h.mailer.sent().len(), 1);
}

#[tokio::test]
async fn slow_mail_times_out_and_alert_is_still_retired() {
    let mut h = Harness::new(StaticQuotes::new().with_price("AAPL", dec!(300)));
    h.mail_timeout = Duration::from_millis(50);
    h.mailer.delay_sends(Duration::from_secs(5));
    let user = h.add_user("ann@example.com").await;
    h.add_alert(&user, "AAPL", Direction::Above, dec!(250)).await;

    let report = h.monitor().run_tick().await.unwrap();

    assert_eq!(report.total_triggered(), 1);
    assert!(h.alerts.is_empty().await);
    assert_eq!(h.notifications.all().await.len(), 1);
}

#[tokio::test]
async fn quote_timeout_leaves_alert_for_next_cycle() {
    let mut h = Harness::new(
        StaticQuotes::new()
            .with_price("AAPL", dec!(500))
            .with_delay(Duration::from_secs(5)),
    );
    h.quote_timeout = Duration::from_millis(50);
    let user = h.add_user("ann@example.com").await;
    let alert = h.add_alert(&user, "AAPL", Direction::Above, dec!(150)).await;

    let report = h.monitor().run_tick().await.unwrap();

    assert_eq!(report.total_triggered(), 0);
    assert_eq!(report.outcome(user.id).unwrap().skipped, 1);
    assert!(h.alerts.get(alert.id).await.unwrap().is_live());
}

#[tokio::test]
async fn overlapping_ticks_notify_exactly_once() {
    let h = Harness::new(StaticQuotes::new().with_price("AAPL", dec!(175)));
    let user = h.add_user("ann@example.com").await;
    for threshold in [dec!(150), dec!(160), dec!(170)] {
        h.add_alert(&user, "AAPL", Direction::Above, threshold).await;
    }

    let a = h.monitor();
    let b = h.monitor();
    let (ra, rb) = tokio::join!(a.run_tick(), b.run_tick());
    let total = ra.unwrap().total_triggered() + rb.unwrap().total_triggered();

    assert_eq!(total, 3);
    assert_eq!(h.notifications.all().await.len(), 3);
    assert_eq!(h.mailer.sent().len(), 3);
    assert!(h.alerts.is_empty().await);
}

#[tokio::test]
async fn stale_claims_are_purged_per_user() {
    let h = Harness::new(StaticQuotes::new());
    let ann = h.add_user("ann@example.com").await;
    let bob = h.add_user("bob@example.com").await;
    let a1 = h.add_alert(&ann, "AAPL", Direction::Above, dec!(100)).await;
    let a2 = h.add_alert(&ann, "TSLA", Direction::Above, dec!(100)).await;
    let b1 = h.add_alert(&bob, "AAPL", Direction::Above, dec!(100)).await;

    // claimed long ago, never retired
    for (user, alert) in [(&ann, &a1), (&ann, &a2), (&bob, &b1)] {
        assert!(h.alerts.claim(user.id, alert.id, 1_000).await.unwrap());
    }

    let report = h.monitor().run_tick().await.unwrap();

    assert_eq!(report.outcome(ann.id).unwrap().purged, 2);
    assert_eq!(report.outcome(bob.id).unwrap().purged, 1);
    assert_eq!(report.total_purged(), 3);
    assert!(h.alerts.is_empty().await);
}

#[tokio::test]
async fn retirement_publishes_payloadless_alerts_changed() {
    let h = Harness::new(StaticQuotes::new().with_price("AAPL", dec!(200)));
    let ann = h.add_user("ann@example.com").await;
    let bob = h.add_user("bob@example.com").await;
    h.add_alert(&ann, "AAPL", Direction::Above, dec!(150)).await;
    h.add_alert(&bob, "AAPL", Direction::Above, dec!(250)).await;

    let mut rx = h.events.subscribe();
    h.monitor().run_tick().await.unwrap();

    let ev = rx.try_recv().unwrap();
    assert_eq!(ev.name(), ALERTS_CHANGED);
    assert_eq!(ev.user_id(), ann.id);
    assert!(matches!(ev, SyncEvent::AlertsChanged { alert: None, .. }));

    // bob's alert was not met, so nothing for him
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn users_without_email_are_not_evaluated() {
    let h = Harness::new(StaticQuotes::new().with_price("AAPL", dec!(200)));
    let ghost = h.add_user(" ").await;
    h.alerts
        .create(new_alert(ghost.id, "AAPL", Direction::Above, dec!(150)))
        .await
        .unwrap();

    let report = h.monitor().run_tick().await.unwrap();

    assert!(report.outcomes.is_empty());
    assert_eq!(h.alerts.len().await, 1);
}
