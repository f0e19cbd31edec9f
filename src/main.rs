use std::{net::SocketAddr, sync::Arc};

use mongodb::Client;
use tokio::sync::{watch, Notify};
use tracing_subscriber::EnvFilter;

use price_alerts::{
    config,
    events::EventBus,
    routes,
    services::{
        alert_dispatcher::NotificationDispatcher,
        alert_engine::AlertEngine,
        alert_monitor::{spawn_price_alert_monitor, AlertMonitor},
        alerts_service::MongoAlertRepository,
        db_init,
        finnhub::FinnhubClient,
        mailer::SendGridMailer,
        news_digest::{spawn_news_digest, NewsDigest},
        notifications_service::MongoNotificationRepository,
        user_service::MongoUserDirectory,
        watchlist_service::MongoWatchlistRepository,
    },
    templates::EmailRenderer,
    AppState,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        tracing::error!("fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), BoxError> {
    let settings = config::load()?;

    // Mongo connection; fail fast if the store is unreachable
    let client = Client::with_uri_str(&settings.mongodb_uri).await?;
    let db = client.database(&settings.mongodb_db);
    db.run_command(mongodb::bson::doc! { "ping": 1 }, None).await?;
    db_init::ensure_indexes(&db).await?;

    let alerts = Arc::new(MongoAlertRepository::new(&db));
    let notifications = Arc::new(MongoNotificationRepository::new(&db));
    let watchlist = Arc::new(MongoWatchlistRepository::new(&db));
    let users = Arc::new(MongoUserDirectory::new(&db));

    let quotes = Arc::new(FinnhubClient::new(
        settings.finnhub_api_key.clone(),
        settings.finnhub_base_url.clone(),
        settings.quote_timeout,
    )?);
    let mailer = Arc::new(SendGridMailer::new(
        settings.sendgrid_api_key.clone(),
        settings.sendgrid_base_url.clone(),
        settings.mail_from.clone(),
        settings.mail_from_name.clone(),
        settings.mail_timeout,
    )?);

    let events = EventBus::default();
    let monitor_trigger = Arc::new(Notify::new());
    let digest_trigger = Arc::new(Notify::new());

    let engine = AlertEngine::new(alerts.clone(), quotes.clone(), settings.quote_timeout);
    let dispatcher = NotificationDispatcher::new(
        alerts.clone(),
        notifications.clone(),
        mailer.clone(),
        EmailRenderer::new()?,
        settings.mail_timeout,
    );
    let monitor = Arc::new(AlertMonitor::new(
        users.clone(),
        alerts.clone(),
        engine,
        dispatcher,
        events.clone(),
        settings.monitor_concurrency,
    ));

    let digest = Arc::new(NewsDigest::new(
        users.clone(),
        watchlist.clone(),
        quotes.clone(),
        mailer,
        EmailRenderer::new()?,
        settings.mail_timeout,
        settings.monitor_concurrency,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor_task = spawn_price_alert_monitor(
        monitor,
        settings.monitor_interval,
        monitor_trigger.clone(),
        shutdown_rx.clone(),
    );
    let digest_task = spawn_news_digest(
        digest,
        settings.digest_interval,
        digest_trigger.clone(),
        shutdown_rx,
    );

    let state = AppState {
        settings: settings.clone(),
        alerts,
        notifications,
        watchlist,
        users,
        quotes,
        events,
        monitor_trigger,
        digest_trigger,
    };

    let app = routes::app(state);

    let addr = SocketAddr::from((settings.host.parse::<std::net::IpAddr>()?, settings.port));
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    monitor_task.await?;
    digest_task.await?;

    drop(db);
    client.shutdown().await;
    tracing::info!("shutdown complete");

    Ok(())
}
