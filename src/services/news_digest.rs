//! Daily market-news email.
//!
//! Each recipient gets up to [`DIGEST_MAX_ARTICLES`] recent headlines about the
//! symbols on their watchlist, or general market news when the watchlist is
//! empty. Runs on its own interval and on demand, independent of alert checks.

use std::{collections::HashSet, sync::Arc, time::Duration};

use chrono::{DateTime, Days, NaiveDate, Utc};
use futures_util::{stream, StreamExt};
use mongodb::bson::oid::ObjectId;
use tokio::{
    sync::{watch, Notify},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use crate::{
    error::{MailError, NewsError, StoreError},
    models::User,
    templates::{long_date, DigestArticle, DigestEmailContext, EmailRenderer},
};

use super::{
    finnhub::{NewsArticle, NewsClient},
    mailer::{MailMessage, Mailer},
    user_service::UserDirectory,
    watchlist_service::WatchlistRepository,
};

pub const DIGEST_MAX_ARTICLES: usize = 6;
pub const NEWS_LOOKBACK_DAYS: u64 = 5;
const SUMMARY_MAX_CHARS: usize = 280;

fn shorten(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(SUMMARY_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

fn published(datetime: i64) -> String {
    DateTime::from_timestamp(datetime, 0)
        .map(|t| t.format("%b %-d, %H:%M UTC").to_string())
        .unwrap_or_default()
}

/// Marks an article as seen; `false` when its id, link or headline was already used.
fn first_sighting(seen: &mut HashSet<String>, article: &NewsArticle) -> bool {
    let mut keys = vec![
        format!("url:{}", article.url.trim()),
        format!("headline:{}", article.headline.trim().to_lowercase()),
    ];
    if article.id != 0 {
        keys.push(format!("id:{}", article.id));
    }

    if keys.iter().any(|k| seen.contains(k)) {
        return false;
    }
    seen.extend(keys);
    true
}

fn to_digest(article: &NewsArticle, symbol: Option<&str>) -> DigestArticle {
    DigestArticle {
        symbol: symbol.map(str::to_string),
        headline: article.headline.trim().to_string(),
        summary: shorten(&article.summary),
        source: article.source.trim().to_string(),
        url: article.url.trim().to_string(),
        published: published(article.datetime),
    }
}

/// Picks the articles for one digest, newest first.
///
/// With symbols, takes one unseen article per symbol in turn until the digest
/// is full or every feed is used up; a symbol whose feed fails is left out.
/// Without symbols, falls back to general market news.
pub async fn collect_news(
    news: &dyn NewsClient,
    symbols: &[String],
    today: NaiveDate,
) -> Result<Vec<DigestArticle>, NewsError> {
    let mut seen: HashSet<String> = HashSet::new();

    if symbols.is_empty() {
        let articles = news.market_news().await?;
        return Ok(articles
            .iter()
            .filter(|a| a.is_complete() && first_sighting(&mut seen, a))
            .take(DIGEST_MAX_ARTICLES)
            .map(|a| to_digest(a, None))
            .collect());
    }

    let from = today
        .checked_sub_days(Days::new(NEWS_LOOKBACK_DAYS))
        .unwrap_or(today);

    let mut feeds: Vec<(&str, std::vec::IntoIter<NewsArticle>)> = Vec::new();
    for symbol in symbols {
        match news.company_news(symbol, from, today).await {
            Ok(items) => feeds.push((symbol.as_str(), items.into_iter())),
            Err(e) => tracing::warn!(symbol = %symbol, "[news-digest] feed skipped: {}", e),
        }
    }

    let mut picked: Vec<(i64, DigestArticle)> = Vec::new();
    let mut progressed = true;
    while picked.len() < DIGEST_MAX_ARTICLES && progressed {
        progressed = false;
        for (symbol, feed) in feeds.iter_mut() {
            if picked.len() >= DIGEST_MAX_ARTICLES {
                break;
            }
            if let Some(article) =
                feed.find(|a| a.is_complete() && first_sighting(&mut seen, a))
            {
                picked.push((article.datetime, to_digest(&article, Some(*symbol))));
                progressed = true;
            }
        }
    }

    picked.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(picked.into_iter().map(|(_, a)| a).collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestOutcome {
    pub user_id: ObjectId,
    pub articles: usize,
    pub sent: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DigestReport {
    pub outcomes: Vec<DigestOutcome>,
}

impl DigestReport {
    pub fn sent(&self) -> usize {
        self.outcomes.iter().filter(|o| o.sent).count()
    }

    pub fn outcome(&self, user_id: ObjectId) -> Option<&DigestOutcome> {
        self.outcomes.iter().find(|o| o.user_id == user_id)
    }
}

pub struct NewsDigest {
    users: Arc<dyn UserDirectory>,
    watchlist: Arc<dyn WatchlistRepository>,
    news: Arc<dyn NewsClient>,
    mailer: Arc<dyn Mailer>,
    renderer: EmailRenderer,
    mail_timeout: Duration,
    concurrency: usize,
}

impl NewsDigest {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        watchlist: Arc<dyn WatchlistRepository>,
        news: Arc<dyn NewsClient>,
        mailer: Arc<dyn Mailer>,
        renderer: EmailRenderer,
        mail_timeout: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            users,
            watchlist,
            news,
            mailer,
            renderer,
            mail_timeout,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn run(&self) -> Result<DigestReport, StoreError> {
        self.run_on(Utc::now().date_naive()).await
    }

    /// Sends one digest per recipient, dated `today`. A failing user is
    /// recorded in the report and does not stop the others.
    pub async fn run_on(&self, today: NaiveDate) -> Result<DigestReport, StoreError> {
        let users = self.users.list_recipients().await?;

        let outcomes = stream::iter(users)
            .map(|user| self.process_user(user, today))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        Ok(DigestReport { outcomes })
    }

    async fn process_user(&self, user: User, today: NaiveDate) -> DigestOutcome {
        let mut outcome = DigestOutcome {
            user_id: user.id,
            articles: 0,
            sent: false,
            error: None,
        };

        if let Err(e) = self.send_digest(&user, today, &mut outcome).await {
            tracing::error!(user_id = %user.id, "[news-digest] not sent: {}", e);
            outcome.error = Some(e);
        }

        outcome
    }

    async fn send_digest(
        &self,
        user: &User,
        today: NaiveDate,
        outcome: &mut DigestOutcome,
    ) -> Result<(), String> {
        let symbols: Vec<String> = self
            .watchlist
            .find_by_owner(user.id)
            .await
            .map_err(|e| e.to_string())?
            .into_iter()
            .map(|i| i.symbol)
            .collect();

        let articles = collect_news(self.news.as_ref(), &symbols, today)
            .await
            .map_err(|e| e.to_string())?;
        outcome.articles = articles.len();

        let ctx = DigestEmailContext {
            name: user.display_name(),
            date: long_date(today),
            articles,
        };
        let rendered = self
            .renderer
            .render_digest(&ctx)
            .map_err(|e| e.to_string())?;

        let message = MailMessage {
            to: user.email.clone(),
            to_name: ctx.name,
            subject: rendered.subject,
            html: rendered.html,
            text: rendered.text,
        };
        self.deliver(&message).await.map_err(|e| e.to_string())?;

        outcome.sent = true;
        Ok(())
    }

    async fn deliver(&self, message: &MailMessage) -> Result<(), MailError> {
        match time::timeout(self.mail_timeout, self.mailer.send(message)).await {
            Ok(res) => res,
            Err(_) => Err(MailError::Timeout),
        }
    }
}

/// Runs the digest every `every` (first run one period after start), or right
/// away when `run_now` is notified, until `shutdown` flips to true.
pub fn spawn_news_digest(
    digest: Arc<NewsDigest>,
    every: Duration,
    run_now: Arc<Notify>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval_at(Instant::now() + every, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = run_now.notified() => {
                    tracing::info!("[news-digest] on-demand run");
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            match digest.run().await {
                Ok(report) => tracing::info!(
                    users = report.outcomes.len(),
                    sent = report.sent(),
                    "[news-digest] run done"
                ),
                Err(e) => tracing::error!("[news-digest] run error: {}", e),
            }
        }

        tracing::info!("[news-digest] stopped");
    })
}
