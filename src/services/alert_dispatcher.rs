use std::{sync::Arc, time::Duration};

use crate::{
    error::{MailError, StoreError},
    models::{now_ms, AlertNotification, User},
    templates::{AlertEmailContext, EmailRenderer},
};

use super::{
    alert_engine::TriggerEvent,
    alerts_service::AlertRepository,
    mailer::{MailMessage, Mailer},
    notifications_service::NotificationRepository,
};

#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub email_sent: bool,
    pub notification: Option<AlertNotification>,
    pub retired: bool,
}

#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Retired(DispatchReport),
    /// Another run claimed or deleted the alert first; nothing was sent or written.
    AlreadyRetired,
}

/// Runs the one-shot retirement sequence for a triggered alert:
/// claim, email, notification record, delete.
#[derive(Clone)]
pub struct NotificationDispatcher {
    alerts: Arc<dyn AlertRepository>,
    notifications: Arc<dyn NotificationRepository>,
    mailer: Arc<dyn Mailer>,
    renderer: EmailRenderer,
    mail_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        alerts: Arc<dyn AlertRepository>,
        notifications: Arc<dyn NotificationRepository>,
        mailer: Arc<dyn Mailer>,
        renderer: EmailRenderer,
        mail_timeout: Duration,
    ) -> Self {
        Self {
            alerts,
            notifications,
            mailer,
            renderer,
            mail_timeout,
        }
    }

    /// Only the claim can fail the whole call; once the alert is claimed every
    /// later step runs regardless of earlier failures, and the alert is deleted.
    pub async fn dispatch(
        &self,
        owner: &User,
        event: TriggerEvent,
    ) -> Result<DispatchOutcome, StoreError> {
        let TriggerEvent { alert, quote } = event;
        let now = now_ms();

        if !self.alerts.claim(alert.user_id, alert.id, now).await? {
            tracing::info!(alert_id = %alert.id, "alert already retired by another run");
            return Ok(DispatchOutcome::AlreadyRetired);
        }

        let ctx = AlertEmailContext::new(&alert, quote.price, now);
        let email_sent = match self.renderer.render_alert(&alert, &ctx) {
            Ok(rendered) => {
                let message = MailMessage {
                    to: owner.email.clone(),
                    to_name: owner.display_name(),
                    subject: rendered.subject,
                    html: rendered.html,
                    text: rendered.text,
                };
                match self.deliver(&message).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::error!(
                            alert_id = %alert.id,
                            to = %owner.email,
                            "alert email not delivered: {}",
                            e
                        );
                        false
                    }
                }
            }
            Err(e) => {
                tracing::error!(alert_id = %alert.id, "alert email not rendered: {}", e);
                false
            }
        };

        let record = AlertNotification::from_alert(&alert, quote.price, now);
        let notification = match self.notifications.record(&record).await {
            Ok(()) => Some(record),
            Err(e) => {
                tracing::error!(alert_id = %alert.id, "notification not recorded: {}", e);
                None
            }
        };

        let retired = match self.alerts.delete(alert.user_id, alert.id).await {
            Ok(_) => true,
            Err(e) => {
                // stays claimed, so it is never evaluated again; purge_claimed removes it later
                tracing::error!(alert_id = %alert.id, "claimed alert not deleted: {}", e);
                false
            }
        };

        tracing::info!(
            user_id = %alert.user_id,
            alert_id = %alert.id,
            symbol = %alert.symbol,
            price = %quote.price,
            email_sent,
            "alert triggered"
        );

        Ok(DispatchOutcome::Retired(DispatchReport {
            email_sent,
            notification,
            retired,
        }))
    }

    async fn deliver(&self, message: &MailMessage) -> Result<(), MailError> {
        match tokio::time::timeout(self.mail_timeout, self.mailer.send(message)).await {
            Ok(res) => res,
            Err(_) => Err(MailError::Timeout),
        }
    }
}
