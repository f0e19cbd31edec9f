use std::{env, time::Duration};

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Settings {
    pub mongodb_uri: String,
    pub mongodb_db: String,
    pub host: String,
    pub port: u16,

    pub finnhub_api_key: String,
    pub finnhub_base_url: String,

    pub sendgrid_api_key: String,
    pub sendgrid_base_url: String,
    pub mail_from: String,
    pub mail_from_name: String,

    pub monitor_interval: Duration,
    pub monitor_concurrency: usize,
    pub quote_timeout: Duration,
    pub mail_timeout: Duration,
    pub notifications_limit: i64,

    pub digest_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            mongodb_db: "pricealerts".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            finnhub_api_key: String::new(),
            finnhub_base_url: "https://finnhub.io/api/v1".to_string(),
            sendgrid_api_key: String::new(),
            sendgrid_base_url: "https://api.sendgrid.com".to_string(),
            mail_from: "alerts@localhost".to_string(),
            mail_from_name: "Price Alerts".to_string(),
            monitor_interval: Duration::from_secs(3600),
            monitor_concurrency: 4,
            quote_timeout: Duration::from_secs(10),
            mail_timeout: Duration::from_secs(15),
            notifications_limit: 50,
            digest_interval: Duration::from_secs(24 * 3600),
        }
    }
}

/// Reads settings from the environment. Missing credentials are fatal.
pub fn load() -> Result<Settings, ConfigError> {
    // Loads .env if present (no crash if missing)
    dotenvy::dotenv().ok();

    from_lookup(|name| env::var(name).ok())
}

/// Builds settings from any name -> value source. Blank values count as unset.
pub fn from_lookup<F>(lookup: F) -> Result<Settings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let env = Env(lookup);
    let d = Settings::default();

    let monitor_concurrency = env.parsed("ALERT_MONITOR_CONCURRENCY", d.monitor_concurrency)?;
    if monitor_concurrency == 0 {
        return Err(ConfigError::Invalid {
            name: "ALERT_MONITOR_CONCURRENCY",
            value: "0".to_string(),
        });
    }

    let notifications_limit = env.parsed("NOTIFICATIONS_LIMIT", d.notifications_limit)?;
    if notifications_limit < 1 {
        return Err(ConfigError::Invalid {
            name: "NOTIFICATIONS_LIMIT",
            value: notifications_limit.to_string(),
        });
    }

    Ok(Settings {
        mongodb_uri: env.var_or("MONGODB_URI", d.mongodb_uri),
        mongodb_db: env.var_or("MONGODB_DB", d.mongodb_db),
        host: env.var_or("HOST", d.host),
        port: env.parsed("PORT", d.port)?,
        finnhub_api_key: env.required("FINNHUB_API_KEY")?,
        finnhub_base_url: env.var_or("FINNHUB_BASE_URL", d.finnhub_base_url),
        sendgrid_api_key: env.required("SENDGRID_API_KEY")?,
        sendgrid_base_url: env.var_or("SENDGRID_BASE_URL", d.sendgrid_base_url),
        mail_from: env.var_or("MAIL_FROM", d.mail_from),
        mail_from_name: env.var_or("MAIL_FROM_NAME", d.mail_from_name),
        monitor_interval: env.seconds("ALERT_MONITOR_INTERVAL_SECS", d.monitor_interval)?,
        monitor_concurrency,
        quote_timeout: env.seconds("QUOTE_TIMEOUT_SECS", d.quote_timeout)?,
        mail_timeout: env.seconds("MAIL_TIMEOUT_SECS", d.mail_timeout)?,
        notifications_limit,
        digest_interval: env.seconds("NEWS_DIGEST_INTERVAL_SECS", d.digest_interval)?,
    })
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.trim().is_empty())
    }

    fn var_or(&self, name: &str, default: String) -> String {
        self.get(name).unwrap_or(default)
    }

    fn parsed<T: std::str::FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(name) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map_err(|_| ConfigError::Invalid { name, value: raw }),
            None => Ok(default),
        }
    }

    /// Whole seconds, at least one; a zero period or timeout would stall or fail every run.
    fn seconds(&self, name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let secs = self.parsed(name, default.as_secs())?;
        if secs == 0 {
            return Err(ConfigError::Invalid {
                name,
                value: "0".to_string(),
            });
        }
        Ok(Duration::from_secs(secs))
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name)
            .map(|v| v.trim().to_string())
            .ok_or(ConfigError::Missing(name))
    }
}
