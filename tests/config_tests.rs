use std::{collections::HashMap, time::Duration};

use price_alerts::{config, error::ConfigError};

fn load_with(pairs: &[(&str, &str)]) -> Result<config::Settings, ConfigError> {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("FINNHUB_API_KEY".to_string(), "fh-key".to_string()),
        ("SENDGRID_API_KEY".to_string(), "sg-key".to_string()),
    ]);
    for (k, v) in pairs {
        vars.insert(k.to_string(), v.to_string());
    }

    config::from_lookup(|name| vars.get(name).cloned())
}

fn rejected_name(res: Result<config::Settings, ConfigError>) -> &'static str {
    match res {
        Err(ConfigError::Invalid { name, .. }) => name,
        other => panic!("expected invalid config, got {other:?}"),
    }
}

#[test]
fn defaults_apply_when_only_keys_are_set() {
    let s = load_with(&[]).unwrap();

    assert_eq!(s.finnhub_api_key, "fh-key");
    assert_eq!(s.monitor_interval, Duration::from_secs(3600));
    assert_eq!(s.notifications_limit, 50);
    assert_eq!(s.digest_interval, Duration::from_secs(86_400));
}

#[test]
fn missing_credentials_are_fatal() {
    let res = config::from_lookup(|name| match name {
        "FINNHUB_API_KEY" => Some("fh-key".to_string()),
        _ => None,
    });

    assert!(matches!(res, Err(ConfigError::Missing("SENDGRID_API_KEY"))));
}

#[test]
fn zero_monitor_interval_is_rejected() {
    let res = load_with(&[("ALERT_MONITOR_INTERVAL_SECS", "0")]);
    assert_eq!(rejected_name(res), "ALERT_MONITOR_INTERVAL_SECS");
}

#[test]
fn zero_timeouts_are_rejected() {
    let res = load_with(&[("QUOTE_TIMEOUT_SECS", "0")]);
    assert_eq!(rejected_name(res), "QUOTE_TIMEOUT_SECS");

    let res = load_with(&[("MAIL_TIMEOUT_SECS", "0")]);
    assert_eq!(rejected_name(res), "MAIL_TIMEOUT_SECS");

    let res = load_with(&[("NEWS_DIGEST_INTERVAL_SECS", "0")]);
    assert_eq!(rejected_name(res), "NEWS_DIGEST_INTERVAL_SECS");
}

#[test]
fn non_positive_notification_limit_is_rejected() {
    let res = load_with(&[("NOTIFICATIONS_LIMIT", "0")]);
    assert_eq!(rejected_name(res), "NOTIFICATIONS_LIMIT");

    let res = load_with(&[("NOTIFICATIONS_LIMIT", "-3")]);
    assert_eq!(rejected_name(res), "NOTIFICATIONS_LIMIT");
}

#[test]
fn zero_concurrency_is_rejected() {
    let res = load_with(&[("ALERT_MONITOR_CONCURRENCY", "0")]);
    assert_eq!(rejected_name(res), "ALERT_MONITOR_CONCURRENCY");
}

#[test]
fn unparsable_number_is_rejected() {
    let res = load_with(&[("ALERT_MONITOR_INTERVAL_SECS", "hourly")]);
    assert_eq!(rejected_name(res), "ALERT_MONITOR_INTERVAL_SECS");
}

#[test]
fn custom_values_are_read() {
    let s = load_with(&[
        ("ALERT_MONITOR_INTERVAL_SECS", "60"),
        ("QUOTE_TIMEOUT_SECS", "3"),
        ("NOTIFICATIONS_LIMIT", "5"),
        ("PORT", "8080"),
    ])
    .unwrap();

    assert_eq!(s.monitor_interval, Duration::from_secs(60));
    assert_eq!(s.quote_timeout, Duration::from_secs(3));
    assert_eq!(s.notifications_limit, 5);
    assert_eq!(s.port, 8080);
}
