//! Library entrypoint for the price alert service.
//!
//! Integration tests under `tests/` import the app state, routers,
//! controllers, services and the in-memory repositories from here.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod sync;
pub mod templates;

#[path = "middleware/auth.rs"]
pub mod auth;

pub mod services;

pub mod controllers;
pub mod routes;

use services::{
    alerts_service::AlertRepository, finnhub::QuoteClient,
    notifications_service::NotificationRepository, user_service::UserDirectory,
    watchlist_service::WatchlistRepository,
};

#[derive(Clone)]
pub struct AppState {
    pub settings: config::Settings,
    pub alerts: Arc<dyn AlertRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub watchlist: Arc<dyn WatchlistRepository>,
    pub users: Arc<dyn UserDirectory>,
    pub quotes: Arc<dyn QuoteClient>,
    pub events: events::EventBus,
    /// Wakes the alert monitor for an immediate run.
    pub monitor_trigger: Arc<tokio::sync::Notify>,
    /// Wakes the news digest for an immediate send.
    pub digest_trigger: Arc<tokio::sync::Notify>,
}
