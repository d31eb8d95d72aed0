//! Polymarket prediction-market client
//!
//! Market data is read from the public Gamma API. Order management goes to the
//! CLOB API and is authenticated with L2 headers (HMAC-SHA256 over
//! `timestamp + METHOD + path + body`, keyed with the API secret). Orders are
//! EIP-712 signed by the bound [`SecureWallet`].
//!
//! SECURITY NOTE:
//! - The API secret and passphrase are held in `SecretString` and never logged
//! - Only the order digest reaches the wallet; the key stays in `SecureWallet`

use crate::config::{keys, require_all, PolymarketConfig, SettingsProvider};
use crate::tokens::{format_units, parse_decimal_units, POLYMARKET_DECIMALS};
use crate::tools::types::{MarketOutcome, MarketRequest};
use crate::wallet::SecureWallet;
use crate::{Error, Result};
use alloy::hex;
use alloy::primitives::{address, Address, U256};
use alloy::sol_types::{eip712_domain, SolStruct};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// CTF Exchange contract on Polygon (EIP-712 verifying contract)
pub const CTF_EXCHANGE: Address = address!("4bfb41d5b3570defd03c39a9a4d8de6bd8b8982e");

type HmacSha256 = Hmac<Sha256>;

mod eip712 {
    alloy::sol! {
        #[derive(Debug)]
        struct Order {
            uint256 salt;
            address maker;
            address signer;
            address taker;
            uint256 tokenId;
            uint256 makerAmount;
            uint256 takerAmount;
            uint256 expiration;
            uint256 nonce;
            uint256 feeRateBps;
            uint8 side;
            uint8 signatureType;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    fn as_u8(self) -> u8 {
        match self {
            OrderSide::Buy => 0,
            OrderSide::Sell => 1,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Time in force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Good till cancelled
    Gtc,
    /// Fill or kill
    Fok,
    /// Good till date (requires an expiration)
    Gtd,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Gtc => write!(f, "GTC"),
            OrderType::Fok => write!(f, "FOK"),
            OrderType::Gtd => write!(f, "GTD"),
        }
    }
}

/// A limit order, sizes and prices as decimal strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub token_id: String,
    pub side: OrderSide,
    /// Number of outcome shares
    pub size: String,
    /// Price per share in USDC, strictly between 0 and 1
    pub price: String,
    pub order_type: OrderType,
    /// Unix seconds, GTD orders only
    pub expiration: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent {
    pub id: String,
    pub title: String,
    pub slug: Option<String>,
    pub end_date: Option<String>,
    pub volume: Option<f64>,
    pub market_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeQuote {
    pub outcome: String,
    pub price: Option<String>,
    pub token_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub id: String,
    pub question: String,
    pub condition_id: Option<String>,
    pub slug: Option<String>,
    pub end_date: Option<String>,
    pub active: bool,
    pub closed: bool,
    pub volume: Option<f64>,
    pub outcomes: Vec<OutcomeQuote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order_id: String,
    pub status: String,
    pub token_id: String,
    pub side: OrderSide,
    pub size: String,
    pub price: String,
    pub order_type: OrderType,
}

/// Open order as reported by the CLOB
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOrder {
    pub id: String,
    pub status: String,
    pub market: String,
    pub asset_id: String,
    pub side: String,
    pub original_size: String,
    pub size_matched: String,
    pub price: String,
    pub outcome: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cancellation {
    pub canceled: Vec<String>,
    pub not_canceled: BTreeMap<String, String>,
}

impl Cancellation {
    pub fn summary(&self) -> String {
        let mut text = match self.canceled.len() {
            0 => "No orders were cancelled.".to_string(),
            1 => format!("Cancelled order {}.", self.canceled[0]),
            n => format!("Cancelled {} orders.", n),
        };
        for (id, reason) in &self.not_canceled {
            text.push_str(&format!("\nCould not cancel {}: {}", id, reason));
        }
        text
    }
}

/// Prediction-market capability exposed to the market actions
#[async_trait]
pub trait PredictionMarket: Send + Sync {
    /// Active events, optionally narrowed to those mentioning `keyword`
    async fn list_events(&self, keyword: Option<&str>) -> Result<Vec<MarketEvent>>;

    /// One market by numeric id or `0x` condition id
    async fn market_info(&self, market_id: &str) -> Result<MarketSummary>;

    async fn create_order(&self, order: &OrderRequest) -> Result<PlacedOrder>;

    async fn active_orders(&self, market_id: Option<&str>) -> Result<Vec<OpenOrder>>;

    async fn cancel_order(&self, order_id: &str) -> Result<Cancellation>;

    async fn cancel_all(&self) -> Result<Cancellation>;
}

/// Route a market request to the matching capability method
pub async fn execute(market: &dyn PredictionMarket, request: &MarketRequest) -> Result<MarketOutcome> {
    Ok(match request {
        MarketRequest::ListEvents { keyword } => MarketOutcome::Events {
            events: market.list_events(keyword.as_deref()).await?,
        },
        MarketRequest::MarketInfo { market_id } => MarketOutcome::MarketInfo {
            market: market.market_info(market_id).await?,
        },
        MarketRequest::CreateOrder(order) => MarketOutcome::OrderPlaced {
            order: market.create_order(order).await?,
        },
        MarketRequest::ActiveOrders { market_id } => MarketOutcome::ActiveOrders {
            orders: market.active_orders(market_id.as_deref()).await?,
        },
        MarketRequest::CancelOrder { order_id } => MarketOutcome::OrderCancelled {
            cancellation: market.cancel_order(order_id).await?,
        },
        MarketRequest::CancelAll => MarketOutcome::AllCancelled {
            cancellation: market.cancel_all().await?,
        },
    })
}

#[derive(Debug)]
struct ApiCredentials {
    key: SecretString,
    secret: SecretString,
    passphrase: SecretString,
}

/// Gamma + CLOB client bound to one wallet and one API credential triple
pub struct PolymarketClient {
    http: reqwest::Client,
    wallet: Arc<SecureWallet>,
    credentials: ApiCredentials,
    gamma_url: Url,
    clob_url: Url,
    chain_id: u64,
    events_limit: usize,
}

impl PolymarketClient {
    /// Bind a client from settings.
    ///
    /// Requires `EVM_PRIVATE_KEY` and the `POLYMARKET_*` credential triple; every
    /// absent key is named in the error. No request is made here.
    pub fn bind(settings: &dyn SettingsProvider, config: &PolymarketConfig) -> Result<Self> {
        let values = require_all(
            settings,
            &[
                keys::EVM_PRIVATE_KEY,
                keys::POLYMARKET_API_KEY,
                keys::POLYMARKET_SECRET,
                keys::POLYMARKET_PASSPHRASE,
            ],
        )?;
        let wallet = SecureWallet::from_settings(settings)?;

        URL_SAFE.decode(values[2].trim()).map_err(|e| {
            Error::invalid_setting(keys::POLYMARKET_SECRET, format!("not url-safe base64: {}", e))
        })?;

        let credentials = ApiCredentials {
            key: SecretString::from(values[1].clone()),
            secret: SecretString::from(values[2].trim().to_string()),
            passphrase: SecretString::from(values[3].clone()),
        };

        Self::new(Arc::new(wallet), credentials, config)
    }

    fn new(
        wallet: Arc<SecureWallet>,
        credentials: ApiCredentials,
        config: &PolymarketConfig,
    ) -> Result<Self> {
        let gamma_url = Url::parse(&config.gamma_url)
            .map_err(|e| Error::Config(format!("Invalid gamma_url: {}", e)))?;
        let clob_url = Url::parse(&config.clob_url)
            .map_err(|e| Error::Config(format!("Invalid clob_url: {}", e)))?;

        tracing::debug!(
            address = %wallet.address(),
            gamma = %gamma_url,
            clob = %clob_url,
            "Bound Polymarket client"
        );

        Ok(Self {
            http: reqwest::Client::new(),
            wallet,
            credentials,
            gamma_url,
            clob_url,
            chain_id: config.chain_id,
            events_limit: config.events_limit,
        })
    }

    fn endpoint(base: &Url, path: &str) -> String {
        format!("{}{}", base.as_str().trim_end_matches('/'), path)
    }

    async fn gamma_get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self
            .http
            .get(Self::endpoint(&self.gamma_url, path))
            .query(query)
            .send()
            .await
            .map_err(|e| Error::ToolInvocation(format!("Polymarket request failed: {}", e)))?;
        read_json(response).await
    }

    async fn clob_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<T> {
        let body = match body {
            Some(value) => serde_json::to_string(&value)?,
            None => String::new(),
        };
        let timestamp = Utc::now().timestamp();
        let signature = l2_signature(
            self.credentials.secret.expose_secret(),
            timestamp,
            method.as_str(),
            path,
            &body,
        )?;

        let mut request = self
            .http
            .request(method, Self::endpoint(&self.clob_url, path))
            .query(query)
            .header("POLY_ADDRESS", self.wallet.address().to_checksum(None))
            .header("POLY_SIGNATURE", signature)
            .header("POLY_TIMESTAMP", timestamp.to_string())
            .header("POLY_API_KEY", self.credentials.key.expose_secret())
            .header("POLY_PASSPHRASE", self.credentials.passphrase.expose_secret());
        if !body.is_empty() {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::ToolInvocation(format!("Polymarket request failed: {}", e)))?;
        read_json(response).await
    }

    async fn signed_order(&self, order: &OrderRequest) -> Result<Value> {
        let (maker_amount, taker_amount) = order_amounts(order.side, &order.size, &order.price)?;
        let token_id = U256::from_str_radix(order.token_id.trim(), 10).map_err(|_| {
            Error::ToolInvocation(format!("Invalid token id '{}'", order.token_id))
        })?;
        let expiration = match order.order_type {
            OrderType::Gtd => order.expiration.ok_or_else(|| {
                Error::ToolInvocation("GTD orders require an expiration".to_string())
            })?,
            _ => 0,
        };
        let salt = uuid::Uuid::new_v4().as_u128() as u32;
        let maker = self.wallet.address();

        let typed = eip712::Order {
            salt: U256::from(salt),
            maker,
            signer: maker,
            taker: Address::ZERO,
            tokenId: token_id,
            makerAmount: maker_amount,
            takerAmount: taker_amount,
            expiration: U256::from(expiration.max(0) as u64),
            nonce: U256::ZERO,
            feeRateBps: U256::ZERO,
            side: order.side.as_u8(),
            signatureType: 0,
        };
        let domain = eip712_domain! {
            name: "Polymarket CTF Exchange",
            version: "1",
            chain_id: self.chain_id,
            verifying_contract: CTF_EXCHANGE,
        };
        let signature = self
            .wallet
            .sign_hash(&typed.eip712_signing_hash(&domain))
            .await?;

        Ok(json!({
            "order": {
                "salt": salt,
                "maker": maker.to_checksum(None),
                "signer": maker.to_checksum(None),
                "taker": Address::ZERO.to_string(),
                "tokenId": token_id.to_string(),
                "makerAmount": maker_amount.to_string(),
                "takerAmount": taker_amount.to_string(),
                "expiration": expiration.max(0).to_string(),
                "nonce": "0",
                "feeRateBps": "0",
                "side": order.side.to_string(),
                "signatureType": 0,
                "signature": hex::encode_prefixed(signature.as_bytes()),
            },
            "owner": self.credentials.key.expose_secret(),
            "orderType": order.order_type.to_string(),
        }))
    }
}

#[async_trait]
impl PredictionMarket for PolymarketClient {
    async fn list_events(&self, keyword: Option<&str>) -> Result<Vec<MarketEvent>> {
        // Gamma has no free-text filter; over-fetch and filter locally.
        let fetch = if keyword.is_some() { 100 } else { self.events_limit };
        let events: Vec<GammaEvent> = self
            .gamma_get(
                "/events",
                &[
                    ("active", "true".to_string()),
                    ("closed", "false".to_string()),
                    ("limit", fetch.to_string()),
                ],
            )
            .await?;

        let needle = keyword.map(str::to_lowercase);
        let events: Vec<MarketEvent> = events
            .into_iter()
            .filter(|event| match &needle {
                Some(needle) => event.mentions(needle),
                None => true,
            })
            .take(self.events_limit)
            .map(GammaEvent::into_event)
            .collect();

        tracing::info!(keyword = ?keyword, count = events.len(), "Fetched Polymarket events");
        Ok(events)
    }

    async fn market_info(&self, market_id: &str) -> Result<MarketSummary> {
        let market = if market_id.starts_with("0x") {
            let markets: Vec<GammaMarket> = self
                .gamma_get("/markets", &[("condition_ids", market_id.to_string())])
                .await?;
            markets.into_iter().next()
        } else {
            Some(
                self.gamma_get::<GammaMarket>(&format!("/markets/{}", market_id), &[])
                    .await?,
            )
        };

        market
            .map(GammaMarket::into_summary)
            .ok_or_else(|| Error::ToolInvocation(format!("Market {} not found", market_id)))
    }

    async fn create_order(&self, order: &OrderRequest) -> Result<PlacedOrder> {
        let body = self.signed_order(order).await?;
        let response: PostOrderResponse = self
            .clob_request(Method::POST, "/order", &[], Some(body))
            .await?;

        if !response.success || !response.error_msg.is_empty() {
            let reason = if response.error_msg.is_empty() {
                "order rejected".to_string()
            } else {
                response.error_msg
            };
            return Err(Error::ToolInvocation(format!("Polymarket rejected order: {}", reason)));
        }

        tracing::info!(
            order_id = %response.order_id,
            side = %order.side,
            size = %order.size,
            price = %order.price,
            "Placed Polymarket order"
        );

        Ok(PlacedOrder {
            order_id: response.order_id,
            status: response.status,
            token_id: order.token_id.clone(),
            side: order.side,
            size: order.size.clone(),
            price: order.price.clone(),
            order_type: order.order_type,
        })
    }

    async fn active_orders(&self, market_id: Option<&str>) -> Result<Vec<OpenOrder>> {
        let query: Vec<(&str, String)> = market_id
            .map(|id| vec![("market", id.to_string())])
            .unwrap_or_default();
        let page: OrdersPage = self
            .clob_request(Method::GET, "/data/orders", &query, None)
            .await?;
        Ok(page.into_orders())
    }

    async fn cancel_order(&self, order_id: &str) -> Result<Cancellation> {
        self.clob_request(
            Method::DELETE,
            "/order",
            &[],
            Some(json!({ "orderID": order_id })),
        )
        .await
    }

    async fn cancel_all(&self) -> Result<Cancellation> {
        self.clob_request(Method::DELETE, "/cancel-all", &[], None)
            .await
    }
}

/// L2 request signature: url-safe base64 HMAC-SHA256 of
/// `timestamp + method + path + body`, keyed with the decoded secret.
pub(crate) fn l2_signature(
    secret: &str,
    timestamp: i64,
    method: &str,
    path: &str,
    body: &str,
) -> Result<String> {
    let key = URL_SAFE
        .decode(secret)
        .map_err(|e| Error::ToolInvocation(format!("Invalid API secret: {}", e)))?;
    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| Error::ToolInvocation(format!("Invalid API secret: {}", e)))?;
    mac.update(format!("{}{}{}{}", timestamp, method, path, body).as_bytes());
    Ok(URL_SAFE.encode(mac.finalize().into_bytes()))
}

/// Maker and taker amounts in 6-decimal units.
///
/// BUY pays `size * price` USDC for `size` shares; SELL is the reverse.
pub(crate) fn order_amounts(side: OrderSide, size: &str, price: &str) -> Result<(U256, U256)> {
    let decimals = POLYMARKET_DECIMALS;
    let one = U256::from(10u64).pow(U256::from(decimals));

    let size_units = parse_decimal_units(size, decimals)
        .filter(|units| !units.is_zero())
        .ok_or_else(|| Error::ToolInvocation(format!("Invalid order size '{}'", size)))?;
    let price_units = parse_decimal_units(price, decimals)
        .filter(|units| !units.is_zero() && *units < one)
        .ok_or_else(|| {
            Error::ToolInvocation(format!("Price '{}' must be between 0 and 1", price))
        })?;

    let collateral = size_units * price_units / one;
    tracing::debug!(
        side = %side,
        shares = %format_units(size_units, decimals as u32),
        collateral = %format_units(collateral, decimals as u32),
        "Computed order amounts"
    );

    Ok(match side {
        OrderSide::Buy => (collateral, size_units),
        OrderSide::Sell => (size_units, collateral),
    })
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::ToolInvocation(format!("Failed to read Polymarket response: {}", e)))?;

    if !status.is_success() {
        let preview: String = body.chars().take(300).collect();
        return Err(Error::ToolInvocation(format!(
            "Polymarket returned {}: {}",
            status, preview
        )));
    }

    serde_json::from_str(&body)
        .map_err(|e| Error::ToolInvocation(format!("Unexpected Polymarket response: {}", e)))
}

#[derive(Debug, Deserialize)]
struct GammaTag {
    #[serde(default)]
    label: String,
}

#[derive(Debug, Deserialize)]
struct GammaEvent {
    #[serde(deserialize_with = "lenient::string")]
    id: String,
    #[serde(default)]
    title: String,
    slug: Option<String>,
    description: Option<String>,
    #[serde(rename = "endDate")]
    end_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    volume: Option<f64>,
    #[serde(default)]
    markets: Vec<Value>,
    #[serde(default)]
    tags: Vec<GammaTag>,
}

impl GammaEvent {
    fn mentions(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(needle))
            || self
                .tags
                .iter()
                .any(|tag| tag.label.to_lowercase().contains(needle))
    }

    fn into_event(self) -> MarketEvent {
        MarketEvent {
            id: self.id,
            title: self.title,
            slug: self.slug,
            end_date: self.end_date,
            volume: self.volume,
            market_count: self.markets.len(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaMarket {
    #[serde(deserialize_with = "lenient::string")]
    id: String,
    #[serde(default)]
    question: String,
    condition_id: Option<String>,
    slug: Option<String>,
    end_date: Option<String>,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    closed: bool,
    #[serde(default, deserialize_with = "lenient::number")]
    volume: Option<f64>,
    /// JSON-encoded string array
    outcomes: Option<String>,
    /// JSON-encoded string array
    outcome_prices: Option<String>,
    /// JSON-encoded string array
    clob_token_ids: Option<String>,
}

impl GammaMarket {
    fn into_summary(self) -> MarketSummary {
        let names = decode_list(self.outcomes.as_deref());
        let prices = decode_list(self.outcome_prices.as_deref());
        let tokens = decode_list(self.clob_token_ids.as_deref());

        let outcomes = names
            .into_iter()
            .enumerate()
            .map(|(i, outcome)| OutcomeQuote {
                outcome,
                price: prices.get(i).cloned(),
                token_id: tokens.get(i).cloned(),
            })
            .collect();

        MarketSummary {
            id: self.id,
            question: self.question,
            condition_id: self.condition_id,
            slug: self.slug,
            end_date: self.end_date,
            active: self.active,
            closed: self.closed,
            volume: self.volume,
            outcomes,
        }
    }
}

fn decode_list(raw: Option<&str>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct PostOrderResponse {
    #[serde(default)]
    success: bool,
    #[serde(default, rename = "errorMsg")]
    error_msg: String,
    #[serde(default, rename = "orderID")]
    order_id: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OrdersPage {
    List(Vec<OpenOrder>),
    Page { data: Vec<OpenOrder> },
}

impl OrdersPage {
    fn into_orders(self) -> Vec<OpenOrder> {
        match self {
            OrdersPage::List(orders) | OrdersPage::Page { data: orders } => orders,
        }
    }
}

/// Gamma returns some fields as either strings or numbers
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapSettings;
    use wiremock::matchers::{body_partial_json, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_SECRET: &str = "c2VjcmV0LWJ5dGVz";

    fn settings() -> MapSettings {
        MapSettings::new()
            .with(keys::EVM_PRIVATE_KEY, TEST_KEY)
            .with(keys::POLYMARKET_API_KEY, "api-key")
            .with(keys::POLYMARKET_SECRET, TEST_SECRET)
            .with(keys::POLYMARKET_PASSPHRASE, "passphrase")
    }

    fn client_for(server: &MockServer) -> PolymarketClient {
        let config = PolymarketConfig {
            gamma_url: server.uri(),
            clob_url: server.uri(),
            events_limit: 5,
            ..Default::default()
        };
        PolymarketClient::bind(&settings(), &config).unwrap()
    }

    #[test]
    fn test_bind_names_every_missing_credential() {
        let settings = MapSettings::new().with(keys::EVM_PRIVATE_KEY, TEST_KEY);
        let err = PolymarketClient::bind(&settings, &PolymarketConfig::default())
            .err()
            .unwrap();
        assert_eq!(
            err.to_string(),
            "POLYMARKET_API_KEY, POLYMARKET_SECRET, POLYMARKET_PASSPHRASE not configured"
        );
    }

    #[test]
    fn test_bind_rejects_undecodable_secret() {
        let settings = settings().with(keys::POLYMARKET_SECRET, "not base64!");
        let err = PolymarketClient::bind(&settings, &PolymarketConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidSetting { ref key, .. } if key == "POLYMARKET_SECRET"));
    }

    #[test]
    fn test_order_amounts() {
        let (maker, taker) = order_amounts(OrderSide::Buy, "100", "0.75").unwrap();
        assert_eq!(maker, U256::from(75_000_000u64));
        assert_eq!(taker, U256::from(100_000_000u64));

        let (maker, taker) = order_amounts(OrderSide::Sell, "50", "0.60").unwrap();
        assert_eq!(maker, U256::from(50_000_000u64));
        assert_eq!(taker, U256::from(30_000_000u64));

        assert!(order_amounts(OrderSide::Buy, "10", "1.5").is_err());
        assert!(order_amounts(OrderSide::Buy, "10", "0").is_err());
        assert!(order_amounts(OrderSide::Buy, "0", "0.5").is_err());
    }

    #[test]
    fn test_l2_signature_is_url_safe_sha256() {
        let first = l2_signature(TEST_SECRET, 1_700_000_000, "GET", "/data/orders", "").unwrap();
        let second = l2_signature(TEST_SECRET, 1_700_000_000, "GET", "/data/orders", "").unwrap();
        let other = l2_signature(TEST_SECRET, 1_700_000_001, "GET", "/data/orders", "").unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(URL_SAFE.decode(&first).unwrap().len(), 32);
        assert!(!first.contains('+') && !first.contains('/'));
    }

    #[tokio::test]
    async fn test_list_events_filters_by_keyword() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .and(query_param("active", "true"))
            .and(query_param("closed", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "1", "title": "Presidential Election Winner", "volume": "1250000.5",
                  "tags": [{ "label": "Politics" }], "markets": [{}, {}] },
                { "id": 2, "title": "NBA Finals", "volume": 900, "markets": [{}] }
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let events = client.list_events(Some("politic")).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "1");
        assert_eq!(events[0].volume, Some(1_250_000.5));
        assert_eq!(events[0].market_count, 2);

        let all = client.list_events(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].id, "2");
    }

    #[tokio::test]
    async fn test_market_info_decodes_outcomes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/markets/123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "123",
                "question": "Will it rain tomorrow?",
                "conditionId": "0xabc",
                "active": true,
                "closed": false,
                "outcomes": "[\"Yes\", \"No\"]",
                "outcomePrices": "[\"0.55\", \"0.45\"]",
                "clobTokenIds": "[\"111\", \"222\"]"
            })))
            .mount(&server)
            .await;

        let market = client_for(&server).market_info("123").await.unwrap();
        assert_eq!(market.question, "Will it rain tomorrow?");
        assert_eq!(market.outcomes.len(), 2);
        assert_eq!(market.outcomes[0].outcome, "Yes");
        assert_eq!(market.outcomes[0].price.as_deref(), Some("0.55"));
        assert_eq!(market.outcomes[1].token_id.as_deref(), Some("222"));
    }

    #[tokio::test]
    async fn test_market_info_by_condition_id_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/markets"))
            .and(query_param("condition_ids", "0xdead"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let err = client_for(&server).market_info("0xdead").await.unwrap_err();
        assert!(matches!(err, Error::ToolInvocation(ref m) if m.contains("not found")));
    }

    #[tokio::test]
    async fn test_create_order_posts_signed_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/order"))
            .and(header("POLY_API_KEY", "api-key"))
            .and(header("POLY_PASSPHRASE", "passphrase"))
            .and(header_exists("POLY_SIGNATURE"))
            .and(header_exists("POLY_TIMESTAMP"))
            .and(body_partial_json(json!({
                "owner": "api-key",
                "orderType": "GTC",
                "order": {
                    "tokenId": "71321045679252212594626385532706912750332728571942532289631379312455583992563",
                    "makerAmount": "75000000",
                    "takerAmount": "100000000",
                    "side": "BUY",
                    "signatureType": 0
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "errorMsg": "", "orderID": "0xorder", "status": "live"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let order = OrderRequest {
            token_id: "71321045679252212594626385532706912750332728571942532289631379312455583992563"
                .to_string(),
            side: OrderSide::Buy,
            size: "100".to_string(),
            price: "0.75".to_string(),
            order_type: OrderType::Gtc,
            expiration: None,
        };
        let placed = client_for(&server).create_order(&order).await.unwrap();
        assert_eq!(placed.order_id, "0xorder");
        assert_eq!(placed.status, "live");

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        let signature = body["order"]["signature"].as_str().unwrap();
        assert!(signature.starts_with("0x"));
        assert_eq!(signature.len(), 2 + 130);
    }

    #[tokio::test]
    async fn test_create_order_surfaces_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/order"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false, "errorMsg": "not enough balance / allowance"
            })))
            .mount(&server)
            .await;

        let order = OrderRequest {
            token_id: "1".to_string(),
            side: OrderSide::Sell,
            size: "50".to_string(),
            price: "0.60".to_string(),
            order_type: OrderType::Fok,
            expiration: None,
        };
        let err = client_for(&server).create_order(&order).await.unwrap_err();
        assert!(err.to_string().contains("not enough balance"));
    }

    #[tokio::test]
    async fn test_active_orders_accepts_both_shapes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/orders"))
            .and(query_param("market", "0xabc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "0x1", "side": "BUY", "price": "0.5", "original_size": "10" }],
                "next_cursor": "LTE="
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data/orders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "0x1" }, { "id": "0x2" }
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let filtered = client.active_orders(Some("0xabc")).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].side, "BUY");

        let all = client.active_orders(None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_order_sends_order_id() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/order"))
            .and(body_partial_json(json!({ "orderID": "0xfeed" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "canceled": ["0xfeed"], "not_canceled": {}
            })))
            .mount(&server)
            .await;

        let cancellation = client_for(&server).cancel_order("0xfeed").await.unwrap();
        assert_eq!(cancellation.canceled, vec!["0xfeed".to_string()]);
        assert_eq!(cancellation.summary(), "Cancelled order 0xfeed.");
    }

    #[tokio::test]
    async fn test_http_error_becomes_tool_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/cancel-all"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized/Invalid api key"))
            .mount(&server)
            .await;

        let err = client_for(&server).cancel_all().await.unwrap_err();
        assert!(matches!(err, Error::ToolInvocation(ref m) if m.contains("401")));
    }
}
