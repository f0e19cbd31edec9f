use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use handlebars::Handlebars;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::{
    error::RenderError,
    models::{Alert, Direction},
};

const ABOVE_HTML: &str = r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 24px;">
  <h2 style="color: #0f9d58; margin: 0 0 12px;">&#9650; {{symbol}} is above your target</h2>
  <p><strong>{{company}}</strong> ({{symbol}}) is now trading at <strong>${{currentPrice}}</strong>,
     at or above your alert price of <strong>${{targetPrice}}</strong>.</p>
  <p style="color: #666; font-size: 13px;">Alert: {{alertName}}<br>Triggered {{timestamp}}</p>
  <p style="color: #999; font-size: 12px;">This alert has fired and was removed. Create a new one to keep watching {{symbol}}.</p>
</div>"#;

const BELOW_HTML: &str = r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 24px;">
  <h2 style="color: #d93025; margin: 0 0 12px;">&#9660; {{symbol}} is below your target</h2>
  <p><strong>{{company}}</strong> ({{symbol}}) is now trading at <strong>${{currentPrice}}</strong>,
     at or below your alert price of <strong>${{targetPrice}}</strong>.</p>
  <p style="color: #666; font-size: 13px;">Alert: {{alertName}}<br>Triggered {{timestamp}}</p>
  <p style="color: #999; font-size: 12px;">This alert has fired and was removed. Create a new one to keep watching {{symbol}}.</p>
</div>"#;

const ABOVE_TEXT: &str = "{{{company}}} ({{{symbol}}}) is now ${{{currentPrice}}}, at or above your target of ${{{targetPrice}}}.\nAlert: {{{alertName}}}\nTriggered {{{timestamp}}}";

const BELOW_TEXT: &str = "{{{company}}} ({{{symbol}}}) is now ${{{currentPrice}}}, at or below your target of ${{{targetPrice}}}.\nAlert: {{{alertName}}}\nTriggered {{{timestamp}}}";

const DIGEST_HTML: &str = r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 24px;">
  <h2 style="margin: 0 0 4px;">Market News Summary</h2>
  <p style="color: #666; margin: 0 0 20px;">{{date}}</p>
  <p>Hi {{name}}, here is what moved the markets you follow.</p>
  {{#if articles}}
  {{#each articles}}
  <div style="border-top: 1px solid #eee; padding: 12px 0;">
    <h3 style="margin: 0 0 4px; font-size: 16px;"><a href="{{url}}" style="color: #1a73e8; text-decoration: none;">{{headline}}</a></h3>
    <p style="color: #999; font-size: 12px; margin: 0 0 6px;">{{#if symbol}}{{symbol}} &middot; {{/if}}{{source}} &middot; {{published}}</p>
    <p style="margin: 0;">{{summary}}</p>
  </div>
  {{/each}}
  {{else}}
  <p>No news available today.</p>
  {{/if}}
</div>"#;

const DIGEST_TEXT: &str = "Market News Summary - {{{date}}}\n\nHi {{{name}}},\n{{#if articles}}{{#each articles}}\n{{#if symbol}}[{{{symbol}}}] {{/if}}{{{headline}}}\n{{{summary}}}\n{{{source}}}, {{{published}}}\n{{{url}}}\n{{/each}}{{else}}\nNo news available today.\n{{/if}}";

/// Values substituted into the alert email templates.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEmailContext {
    pub symbol: String,
    pub company: String,
    pub alert_name: String,
    pub current_price: String,
    pub target_price: String,
    pub timestamp: String,
}

impl AlertEmailContext {
    pub fn new(alert: &Alert, price: Decimal, at_ms: i64) -> Self {
        Self {
            symbol: alert.symbol.clone(),
            company: alert.company.clone(),
            alert_name: alert.alert_name.clone(),
            current_price: money(price),
            target_price: money(alert.threshold),
            timestamp: human_time(at_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Two decimals, half away from zero, always padded ("150" -> "150.00").
pub fn money(value: Decimal) -> String {
    let mut v = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    v.rescale(2);
    v.to_string()
}

/// One digest entry, already trimmed for email.
#[derive(Debug, Clone, Serialize)]
pub struct DigestArticle {
    pub symbol: Option<String>,
    pub headline: String,
    pub summary: String,
    pub source: String,
    pub url: String,
    pub published: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DigestEmailContext {
    pub name: String,
    pub date: String,
    pub articles: Vec<DigestArticle>,
}

pub fn digest_subject(date: &str) -> String {
    format!("Market News Summary - {date}")
}

/// "March 5, 2024"
pub fn long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

pub fn human_time(at_ms: i64) -> String {
    DateTime::from_timestamp_millis(at_ms)
        .map(|t| t.format("%b %-d, %Y at %H:%M UTC").to_string())
        .unwrap_or_else(|| at_ms.to_string())
}

pub fn alert_subject(alert: &Alert) -> String {
    format!(
        "Price Alert: {} ({}) {} ${}",
        alert.company,
        alert.symbol,
        alert.direction.label(),
        money(alert.threshold)
    )
}

#[derive(Clone)]
pub struct EmailRenderer {
    hb: Arc<Handlebars<'static>>,
}

fn template_names(direction: Direction) -> (&'static str, &'static str) {
    match direction {
        Direction::Above => ("alert/above.html", "alert/above.txt"),
        Direction::Below => ("alert/below.html", "alert/below.txt"),
    }
}

impl EmailRenderer {
    pub fn new() -> Result<Self, RenderError> {
        let mut hb = Handlebars::new();
        hb.set_strict_mode(true);

        hb.register_template_string("alert/above.html", ABOVE_HTML)?;
        hb.register_template_string("alert/below.html", BELOW_HTML)?;
        hb.register_template_string("alert/above.txt", ABOVE_TEXT)?;
        hb.register_template_string("alert/below.txt", BELOW_TEXT)?;
        hb.register_template_string("digest/news.html", DIGEST_HTML)?;
        hb.register_template_string("digest/news.txt", DIGEST_TEXT)?;

        Ok(Self { hb: Arc::new(hb) })
    }

    pub fn render_alert(
        &self,
        alert: &Alert,
        ctx: &AlertEmailContext,
    ) -> Result<RenderedEmail, RenderError> {
        let (html_tpl, text_tpl) = template_names(alert.direction);

        Ok(RenderedEmail {
            subject: alert_subject(alert),
            html: self.hb.render(html_tpl, ctx)?,
            text: self.hb.render(text_tpl, ctx)?,
        })
    }

    pub fn render_digest(&self, ctx: &DigestEmailContext) -> Result<RenderedEmail, RenderError> {
        Ok(RenderedEmail {
            subject: digest_subject(&ctx.date),
            html: self.hb.render("digest/news.html", ctx)?,
            text: self.hb.render("digest/news.txt", ctx)?,
        })
    }
}
