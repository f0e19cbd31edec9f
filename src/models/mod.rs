pub mod alert;
pub mod notification;
pub mod user;
pub mod watchlist;

pub use alert::{Alert, AlertPatch, Direction, NewAlert};
pub use notification::AlertNotification;
pub use user::{CurrentUser, User};
pub use watchlist::{WatchlistChange, WatchlistItem};

/// Current time as unix milliseconds, the timestamp unit of every stored record.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
