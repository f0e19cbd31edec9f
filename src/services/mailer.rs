use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::error::MailError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub to_name: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Outbound email delivery. A failed send is never retried by callers.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Delivers through the SendGrid v3 `mail/send` endpoint.
#[derive(Clone)]
pub struct SendGridMailer {
    http: Client,
    api_key: String,
    base_url: String,
    from_email: String,
    from_name: String,
}

impl SendGridMailer {
    pub fn new(
        api_key: String,
        base_url: String,
        from_email: String,
        from_name: String,
        timeout: Duration,
    ) -> Result<Self, MailError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            from_email,
            from_name,
        })
    }

    fn payload(&self, message: &MailMessage) -> serde_json::Value {
        // text/plain must precede text/html
        json!({
            "personalizations": [{
                "to": [{ "email": message.to, "name": message.to_name }],
            }],
            "from": { "email": self.from_email, "name": self.from_name },
            "subject": message.subject,
            "content": [
                { "type": "text/plain", "value": message.text },
                { "type": "text/html", "value": message.html },
            ],
        })
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let url = format!("{}/v3/mail/send", self.base_url);
        let res = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.payload(message))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MailError::Timeout
                } else {
                    MailError::Transport(e.to_string())
                }
            })?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(MailError::Rejected { status, body });
        }

        tracing::info!("email sent to {}", message.to);
        Ok(())
    }
}
