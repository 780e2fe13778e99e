//! SerpApi-backed providers: eBay search and Google Shopping.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use super::{ListingProvider, SearchQuery};
use crate::config::Config;
use crate::error::ProviderError;
use crate::listing::{Marketplace, RawListing};

/// SerpApi HTTP client shared by both providers.
#[derive(Debug, Clone)]
pub struct SerpApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl SerpApiClient {
    /// Create a client from config.
    pub fn new(config: &Config) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .connect_timeout(Duration::from_secs(5))
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            http,
            base_url: config.serpapi_base_url.clone(),
            api_key: config.serpapi_api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    /// Whether an API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Run one search and decode the payload.
    #[instrument(skip(self, params))]
    async fn search<T: DeserializeOwned>(
        &self,
        provider: &'static str,
        params: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingApiKey { provider })?;

        let mut pairs: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        pairs.push(("api_key", api_key));
        let url = Url::parse_with_params(&self.base_url, &pairs)?;

        let response = self.http.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_seconds = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ProviderError::RateLimited {
                provider,
                retry_after_seconds,
            });
        }

        if !status.is_success() {
            return Err(ProviderError::Status {
                provider,
                status: status.as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        decode_payload(provider, body)
    }
}

/// Turn a SerpApi payload into `T`, surfacing its `error` field.
fn decode_payload<T: DeserializeOwned>(provider: &'static str, body: Value) -> Result<T, ProviderError> {
    if let Some(message) = body.get("error").and_then(Value::as_str) {
        return Err(ProviderError::Api {
            provider,
            message: message.to_string(),
        });
    }
    serde_json::from_value(body).map_err(|e| ProviderError::Decode(e.to_string()))
}

/// Text of a JSON string or number.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// === eBay ===

#[derive(Debug, Default, Deserialize)]
struct EbaySearchResponse {
    #[serde(default)]
    organic_results: Vec<EbayItem>,
}

#[derive(Debug, Deserialize)]
struct EbayItem {
    #[serde(default)]
    title: String,
    price: Option<EbayPrice>,
    shipping: Option<Value>,
    condition: Option<String>,
    #[serde(default)]
    extensions: Vec<String>,
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EbayPrice {
    Text(String),
    Range { from: Box<EbayPrice>, to: Box<EbayPrice> },
    Raw {
        raw: String,
        #[serde(default)]
        currency: Option<String>,
    },
    Extracted { extracted: f64 },
}

impl EbayPrice {
    /// Price text. Ranges render as "low - high"; the parser takes the low end.
    fn text(&self) -> String {
        match self {
            EbayPrice::Text(text) => text.clone(),
            EbayPrice::Range { from, to } => format!("{} - {}", from.text(), to.text()),
            EbayPrice::Raw { raw, .. } => raw.clone(),
            EbayPrice::Extracted { extracted } => extracted.to_string(),
        }
    }

    /// Currency code reported alongside the price, if any.
    fn currency(&self) -> Option<&str> {
        match self {
            EbayPrice::Raw { currency, .. } => currency.as_deref(),
            EbayPrice::Range { from, .. } => from.currency(),
            EbayPrice::Text(_) | EbayPrice::Extracted { .. } => None,
        }
    }
}

/// Currency an eBay site lists in.
fn currency_for_domain(domain: &str) -> &'static str {
    match domain.trim().to_lowercase().trim_start_matches("www.") {
        "ebay.co.uk" => "GBP",
        "ebay.de" | "ebay.fr" | "ebay.it" | "ebay.es" | "ebay.at" | "ebay.ie" | "ebay.nl"
        | "ebay.be" => "EUR",
        "ebay.ca" => "CAD",
        "ebay.com.au" => "AUD",
        _ => "USD",
    }
}

/// Google Shopping results are requested with `gl=us`.
const SHOPPING_CURRENCY: &str = "USD";

fn map_ebay_item(item: EbayItem, sold_only: bool, site_currency: &str) -> RawListing {
    let currency_hint = item
        .price
        .as_ref()
        .and_then(EbayPrice::currency)
        .unwrap_or(site_currency)
        .to_string();

    RawListing {
        title: item.title,
        price_text: item.price.as_ref().map(EbayPrice::text),
        currency_hint: Some(currency_hint),
        shipping_text: item.shipping.as_ref().and_then(value_text),
        condition: item.condition,
        status: sold_only.then(|| "sold".to_string()),
        extensions: item.extensions,
        url: item.link,
        orders: None,
        rating: None,
    }
}

/// Resale-side provider over SerpApi's eBay engine.
#[derive(Debug, Clone)]
pub struct EbayProvider {
    client: SerpApiClient,
    domain: String,
}

impl EbayProvider {
    /// Create a provider searching `domain` (e.g. "ebay.com").
    pub fn new(client: SerpApiClient, domain: impl Into<String>) -> Self {
        Self {
            client,
            domain: domain.into(),
        }
    }

    fn params(&self, query: &SearchQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("engine", "ebay".to_string()),
            ("_nkw", query.keywords.clone()),
            ("ebay_domain", self.domain.clone()),
        ];
        if let Some(min) = query.min_price {
            params.push(("_udlo", min.to_string()));
        }
        if let Some(max) = query.max_price {
            params.push(("_udhi", max.to_string()));
        }
        if query.sold_only {
            params.push(("LH_Sold", "1".to_string()));
            params.push(("LH_Complete", "1".to_string()));
        }
        params
    }
}

#[async_trait]
impl ListingProvider for EbayProvider {
    fn name(&self) -> &'static str {
        "ebay"
    }

    fn marketplace(&self) -> Marketplace {
        Marketplace::Resale
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawListing>, ProviderError> {
        let response: EbaySearchResponse = self.client.search(self.name(), &self.params(query)).await?;
        debug!(results = response.organic_results.len(), "eBay results");

        Ok(response
            .organic_results
            .into_iter()
            .map(|item| map_ebay_item(item, query.sold_only, currency_for_domain(&self.domain)))
            .collect())
    }
}

// === Google Shopping ===

#[derive(Debug, Default, Deserialize)]
struct ShoppingSearchResponse {
    #[serde(default)]
    shopping_results: Vec<ShoppingItem>,
}

#[derive(Debug, Deserialize)]
struct ShoppingItem {
    #[serde(default)]
    title: String,
    price: Option<Value>,
    #[serde(default)]
    source: String,
    delivery: Option<String>,
    rating: Option<f64>,
    reviews: Option<u64>,
    second_hand_condition: Option<String>,
    #[serde(default)]
    extensions: Vec<String>,
    link: Option<String>,
    product_link: Option<String>,
}

fn map_shopping_item(item: ShoppingItem) -> RawListing {
    let mut extensions = item.extensions;
    if let Some(reviews) = item.reviews {
        extensions.push(format!("{reviews} reviews"));
    }

    RawListing {
        title: item.title,
        price_text: item.price.as_ref().and_then(value_text),
        currency_hint: Some(SHOPPING_CURRENCY.to_string()),
        shipping_text: item.delivery,
        condition: item.second_hand_condition,
        status: None,
        extensions,
        url: item.link.or(item.product_link),
        orders: None,
        rating: item.rating,
    }
}

/// Sourcing-side provider over SerpApi's Google Shopping engine, keeping only
/// offers from one merchant (e.g. "aliexpress").
#[derive(Debug, Clone)]
pub struct ShoppingProvider {
    client: SerpApiClient,
    source_filter: String,
}

impl ShoppingProvider {
    /// Create a provider keeping results whose source contains `source_filter`.
    pub fn new(client: SerpApiClient, source_filter: impl Into<String>) -> Self {
        Self {
            client,
            source_filter: source_filter.into().to_lowercase(),
        }
    }

    fn params(&self, query: &SearchQuery) -> Vec<(&'static str, String)> {
        vec![
            ("engine", "google_shopping".to_string()),
            ("q", format!("{} {}", self.source_filter, query.keywords)),
            ("hl", "en".to_string()),
            ("gl", "us".to_string()),
        ]
    }

    fn keeps(&self, item: &ShoppingItem) -> bool {
        item.source.to_lowercase().contains(&self.source_filter)
    }
}

#[async_trait]
impl ListingProvider for ShoppingProvider {
    fn name(&self) -> &'static str {
        "google_shopping"
    }

    fn marketplace(&self) -> Marketplace {
        Marketplace::Sourcing
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawListing>, ProviderError> {
        let response: ShoppingSearchResponse =
            self.client.search(self.name(), &self.params(query)).await?;
        let total = response.shopping_results.len();

        let records: Vec<RawListing> = response
            .shopping_results
            .into_iter()
            .filter(|item| self.keeps(item))
            .map(map_shopping_item)
            .collect();

        debug!(total, kept = records.len(), source = %self.source_filter, "Shopping results");
        Ok(records)
    }
}
