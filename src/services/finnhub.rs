use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::{prelude::FromPrimitive, Decimal};
use serde::{Deserialize, Serialize};

use crate::error::{NewsError, QuoteError};

/// A live price snapshot. `price` is always positive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub price: Decimal,
    pub change: f64,
    pub change_percent: f64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub previous_close: f64,
}

/// Source of live quotes. One call, one upstream request; retry policy is the caller's.
#[async_trait]
pub trait QuoteClient: Send + Sync {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError>;
}

/// One Finnhub news item, as returned by `/company-news` and `/news`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct NewsArticle {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub url: String,
    // unix seconds
    #[serde(default)]
    pub datetime: i64,
    #[serde(default)]
    pub related: String,
}

impl NewsArticle {
    /// Finnhub pads feeds with stubs; only items with text, a link and a date are usable.
    pub fn is_complete(&self) -> bool {
        !self.headline.trim().is_empty()
            && !self.summary.trim().is_empty()
            && !self.url.trim().is_empty()
            && self.datetime > 0
    }
}

#[async_trait]
pub trait NewsClient: Send + Sync {
    /// Articles about one company published between `from` and `to` (inclusive).
    async fn company_news(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NewsArticle>, NewsError>;

    /// General market headlines.
    async fn market_news(&self) -> Result<Vec<NewsArticle>, NewsError>;
}

#[derive(Clone)]
pub struct FinnhubClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl FinnhubClient {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, QuoteError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QuoteError::unavailable("*", e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl QuoteClient for FinnhubClient {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
        let url = format!("{}/quote", self.base_url);
        let res = self
            .http
            .get(&url)
            .query(&[("symbol", symbol), ("token", &self.api_key)])
            .send()
            .await
            .map_err(|e| QuoteError::unavailable(symbol, e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(QuoteError::unavailable(
                symbol,
                format!("Finnhub quote failed: {status} {body}"),
            ));
        }

        let raw = res
            .json::<QuoteResponse>()
            .await
            .map_err(|e| QuoteError::unavailable(symbol, e.to_string()))?;

        normalize_quote(symbol, &raw)
    }
}

impl FinnhubClient {
    async fn get_news(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<NewsArticle>, NewsError> {
        let url = format!("{}{}", self.base_url, path);
        let res = self
            .http
            .get(&url)
            .query(query)
            .query(&[("token", &self.api_key)])
            .send()
            .await
            .map_err(|e| NewsError::Unavailable(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(NewsError::Unavailable(format!(
                "Finnhub news failed: {status} {body}"
            )));
        }

        res.json::<Vec<NewsArticle>>()
            .await
            .map_err(|e| NewsError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl NewsClient for FinnhubClient {
    async fn company_news(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NewsArticle>, NewsError> {
        let from = from.format("%Y-%m-%d").to_string();
        let to = to.format("%Y-%m-%d").to_string();

        self.get_news(
            "/company-news",
            &[("symbol", symbol), ("from", &from), ("to", &to)],
        )
        .await
    }

    async fn market_news(&self) -> Result<Vec<NewsArticle>, NewsError> {
        self.get_news("/news", &[("category", "general")]).await
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct QuoteResponse {
    // current
    #[serde(default)]
    pub c: f64,
    // change
    #[serde(default)]
    pub d: Option<f64>,
    // percent change
    #[serde(default)]
    pub dp: Option<f64>,
    // high
    #[serde(default)]
    pub h: f64,
    // low
    #[serde(default)]
    pub l: f64,
    // open
    #[serde(default)]
    pub o: f64,
    // previous close
    #[serde(default)]
    pub pc: f64,
}

/// Turns a raw Finnhub payload into a [`Quote`].
///
/// Finnhub answers unknown or halted symbols with `c == 0`, so a zero (or
/// negative, or non-finite) price means "no live data" and is reported as
/// unavailable rather than as a price.
pub fn normalize_quote(symbol: &str, raw: &QuoteResponse) -> Result<Quote, QuoteError> {
    if !raw.c.is_finite() || raw.c <= 0.0 {
        return Err(QuoteError::unavailable(symbol, "no live price"));
    }

    let price = Decimal::from_f64(raw.c)
        .ok_or_else(|| QuoteError::unavailable(symbol, format!("unrepresentable price {}", raw.c)))?;

    Ok(Quote {
        symbol: symbol.to_string(),
        price,
        change: raw.d.unwrap_or_default(),
        change_percent: raw.dp.unwrap_or_default(),
        high: raw.h,
        low: raw.l,
        open: raw.o,
        previous_close: raw.pc,
    })
}
