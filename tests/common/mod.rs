#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use mongodb::bson::oid::ObjectId;
use price_alerts::{
    config::Settings,
    error::{MailError, NewsError, QuoteError},
    events::EventBus,
    models::{Alert, Direction, NewAlert, User},
    services::{
        alert_dispatcher::NotificationDispatcher,
        alert_engine::AlertEngine,
        alert_monitor::AlertMonitor,
        alerts_service::AlertRepository,
        finnhub::{NewsArticle, NewsClient, Quote, QuoteClient},
        mailer::{MailMessage, Mailer},
        news_digest::NewsDigest,
        notifications_service::NotificationRepository,
        memory::{
            MemoryAlertRepository, MemoryNotificationRepository, MemoryUserDirectory,
            MemoryWatchlistRepository,
        },
    },
    templates::EmailRenderer,
    AppState,
};
use rust_decimal::Decimal;

pub fn quote(symbol: &str, price: Decimal) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        price,
        change: 0.0,
        change_percent: 0.0,
        high: 0.0,
        low: 0.0,
        open: 0.0,
        previous_close: 0.0,
    }
}

/// Fixed prices per symbol; listed symbols fail like an upstream outage.
#[derive(Default)]
pub struct StaticQuotes {
    prices: Mutex<HashMap<String, Decimal>>,
    failing: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticQuotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(self, symbol: &str, price: Decimal) -> Self {
        self.prices.lock().unwrap().insert(symbol.to_string(), price);
        self
    }

    pub fn with_failure(self, symbol: &str) -> Self {
        self.failing.lock().unwrap().insert(symbol.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.lock().unwrap().insert(symbol.to_string(), price);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteClient for StaticQuotes {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }

        if self.failing.lock().unwrap().contains(symbol) {
            return Err(QuoteError::unavailable(symbol, "upstream 502"));
        }

        let price = self.prices.lock().unwrap().get(symbol).copied();
        match price {
            Some(p) => Ok(quote(symbol, p)),
            None => Err(QuoteError::unavailable(symbol, "no live price")),
        }
    }
}

pub fn article(id: i64, headline: &str, datetime: i64) -> NewsArticle {
    NewsArticle {
        id,
        headline: headline.to_string(),
        summary: format!("{headline} in detail."),
        source: "Reuters".to_string(),
        url: format!("https://news.example.com/{id}"),
        datetime,
        related: String::new(),
    }
}

/// Canned news feeds keyed by symbol; unknown symbols have no articles.
#[derive(Default)]
pub struct StaticNews {
    company: Mutex<HashMap<String, Vec<NewsArticle>>>,
    market: Mutex<Vec<NewsArticle>>,
    failing: Mutex<HashSet<String>>,
    ranges: Mutex<Vec<(String, NaiveDate, NaiveDate)>>,
}

impl StaticNews {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_company(self, symbol: &str, articles: Vec<NewsArticle>) -> Self {
        self.company.lock().unwrap().insert(symbol.to_string(), articles);
        self
    }

    pub fn with_market(self, articles: Vec<NewsArticle>) -> Self {
        *self.market.lock().unwrap() = articles;
        self
    }

    pub fn with_failure(self, symbol: &str) -> Self {
        self.failing.lock().unwrap().insert(symbol.to_string());
        self
    }

    /// `(symbol, from, to)` for every company feed requested.
    pub fn ranges(&self) -> Vec<(String, NaiveDate, NaiveDate)> {
        self.ranges.lock().unwrap().clone()
    }
}

#[async_trait]
impl NewsClient for StaticNews {
    async fn company_news(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NewsArticle>, NewsError> {
        self.ranges.lock().unwrap().push((symbol.to_string(), from, to));

        if self.failing.lock().unwrap().contains(symbol) {
            return Err(NewsError::Unavailable(format!("{symbol}: upstream 502")));
        }
        Ok(self
            .company
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .unwrap_or_default())
    }

    async fn market_news(&self) -> Result<Vec<NewsArticle>, NewsError> {
        Ok(self.market.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn delay_sends(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(MailError::Rejected {
                status: 550,
                body: "mailbox unavailable".to_string(),
            });
        }

        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub struct Harness {
    pub alerts: Arc<MemoryAlertRepository>,
    pub notifications: Arc<MemoryNotificationRepository>,
    pub watchlist: Arc<MemoryWatchlistRepository>,
    pub users: Arc<MemoryUserDirectory>,
    pub quotes: Arc<StaticQuotes>,
    pub mailer: Arc<RecordingMailer>,
    pub events: EventBus,
    pub quote_timeout: Duration,
    pub mail_timeout: Duration,
}

impl Harness {
    pub fn new(quotes: StaticQuotes) -> Self {
        Self {
            alerts: Arc::new(MemoryAlertRepository::new()),
            notifications: Arc::new(MemoryNotificationRepository::new()),
            watchlist: Arc::new(MemoryWatchlistRepository::new()),
            users: Arc::new(MemoryUserDirectory::default()),
            quotes: Arc::new(quotes),
            mailer: Arc::new(RecordingMailer::new()),
            events: EventBus::default(),
            quote_timeout: Duration::from_secs(2),
            mail_timeout: Duration::from_secs(2),
        }
    }

    pub fn engine(&self) -> AlertEngine {
        AlertEngine::new(self.alerts.clone(), self.quotes.clone(), self.quote_timeout)
    }

    pub fn dispatcher(&self) -> NotificationDispatcher {
        NotificationDispatcher::new(
            self.alerts.clone(),
            self.notifications.clone(),
            self.mailer.clone(),
            EmailRenderer::new().unwrap(),
            self.mail_timeout,
        )
    }

    pub fn monitor(&self) -> AlertMonitor {
        self.monitor_with_alerts(self.alerts.clone())
    }

    /// Monitor whose engine and claim/purge go through `alerts`, e.g. a failing wrapper.
    pub fn monitor_with_alerts(&self, alerts: Arc<dyn AlertRepository>) -> AlertMonitor {
        self.monitor_with(alerts, self.notifications.clone())
    }

    pub fn monitor_with_notifications(
        &self,
        notifications: Arc<dyn NotificationRepository>,
    ) -> AlertMonitor {
        self.monitor_with(self.alerts.clone(), notifications)
    }

    fn monitor_with(
        &self,
        alerts: Arc<dyn AlertRepository>,
        notifications: Arc<dyn NotificationRepository>,
    ) -> AlertMonitor {
        let engine = AlertEngine::new(alerts.clone(), self.quotes.clone(), self.quote_timeout);
        let dispatcher = NotificationDispatcher::new(
            alerts.clone(),
            notifications,
            self.mailer.clone(),
            EmailRenderer::new().unwrap(),
            self.mail_timeout,
        );
        AlertMonitor::new(
            self.users.clone(),
            alerts,
            engine,
            dispatcher,
            self.events.clone(),
            2,
        )
    }

    pub fn news_digest(&self, news: Arc<StaticNews>) -> NewsDigest {
        NewsDigest::new(
            self.users.clone(),
            self.watchlist.clone(),
            news,
            self.mailer.clone(),
            EmailRenderer::new().unwrap(),
            self.mail_timeout,
            2,
        )
    }

    pub fn state(&self) -> AppState {
        AppState {
            settings: Settings::default(),
            alerts: self.alerts.clone(),
            notifications: self.notifications.clone(),
            watchlist: self.watchlist.clone(),
            users: self.users.clone(),
            quotes: self.quotes.clone(),
            events: self.events.clone(),
            monitor_trigger: Arc::new(tokio::sync::Notify::new()),
            digest_trigger: Arc::new(tokio::sync::Notify::new()),
        }
    }

    pub async fn add_user(&self, email: &str) -> User {
        let user = User {
            id: ObjectId::new(),
            email: email.to_string(),
            name: Some(email.split('@').next().unwrap().to_string()),
        };
        self.users.insert(user.clone()).await;
        user
    }

    pub async fn add_alert(
        &self,
        user: &User,
        symbol: &str,
        direction: Direction,
        threshold: Decimal,
    ) -> Alert {
        self.alerts
            .create(new_alert(user.id, symbol, direction, threshold))
            .await
            .unwrap()
    }
}

pub fn new_alert(user_id: ObjectId, symbol: &str, direction: Direction, threshold: Decimal) -> NewAlert {
    NewAlert {
        user_id,
        symbol: symbol.to_string(),
        company: format!("{symbol} Corp"),
        alert_name: format!("{symbol} {}", direction.as_str()),
        direction,
        threshold,
    }
}
