pub mod db_init;
pub mod finnhub;
pub mod mailer;
pub mod memory;

pub mod alerts_service;
pub mod notifications_service;
pub mod user_service;
pub mod watchlist_service;

pub mod alert_dispatcher;
pub mod alert_engine;
pub mod alert_monitor;
pub mod news_digest;
