//! Parameter extraction from raw message text
//!
//! Regex scans first. Order placement is the only extraction that may fall
//! back to the large model, and only for fields the scan could not find.

use crate::actions::descriptor::ExtractionContext;
use crate::runtime::ModelClass;
use crate::tools::polymarket::{OrderRequest, OrderSide, OrderType};
use crate::{Error, Result};
use alloy::primitives::Address;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::str::FromStr;
use tracing::{debug, warn};

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: Lazy<Regex> = Lazy::new(|| Regex::new($re).expect("valid extraction regex"));
    };
}

pattern!(ADDRESS, r"\b0x[a-fA-F0-9]{40}\b");
pattern!(
    SEARCH_PREFIX,
    r"(?i)^.*?\b(?:search|look\s*up)\s+(?:(?:for|about|on)\b)?\s*"
);
pattern!(MARKET_ID, r"(?i)\bmarket\s+(?:id\s*)?:?\s*(0x[0-9a-fA-F]+|\d+)\b");
pattern!(
    ORDER_ID,
    r"(?i)\border\s+(?:with\s+)?(?:id\s*)?:?\s*(0x[0-9a-fA-F]+|\d+)\b"
);
pattern!(SIDE, r"(?i)\b(buy|sell)\b");
pattern!(SIZE, r"(?i)(\d+(?:\.\d+)?)\s*shares?\b");
pattern!(PRICE, r"(?i)\bat\s+\$?(\d*\.?\d+)");
pattern!(TOKEN_ID, r"(?i)\btoken\s+(?:id\s*)?:?\s*(\d+)\b");
pattern!(FILL_OR_KILL, r"(?i)immediately\b.*\bor\s+cancel|fill\s+or\s+kill");
pattern!(
    VALID_FOR,
    r"(?i)valid\s+for\s+(\d+)\s*(minute|hour|day)s?\b"
);
pattern!(YEAR, r"\b(20\d{2})\b");
pattern!(WORD, r"[A-Za-z0-9]+");

/// Words that never make a useful event keyword
const STOPWORDS: &[&str] = &[
    "what", "which", "active", "my", "all", "the", "show", "me", "polymarket", "upcoming",
    "any", "some", "current", "open", "list", "are", "there", "new", "latest", "get",
];

/// First `0x` + 40 hex address bounded on both sides
pub fn wallet_address(text: &str) -> Result<Address> {
    ADDRESS
        .find(text)
        .and_then(|m| Address::from_str(m.as_str()).ok())
        .ok_or_else(|| {
            Error::ParameterExtraction("No valid wallet address found in the message".to_string())
        })
}

/// Message text with the leading "search about" / "look up" phrase removed
pub fn search_query(text: &str) -> Result<String> {
    let query = SEARCH_PREFIX.replace(text, "");
    let query = query.trim();
    if query.is_empty() {
        return Err(Error::ParameterExtraction(
            "I couldn't understand what you want me to search for. Could you please rephrase your request?"
                .to_string(),
        ));
    }
    Ok(query.to_string())
}

/// `market <id>`: a numeric Gamma id or a 0x condition id
pub fn market_id(text: &str) -> Option<String> {
    MARKET_ID.captures(text).map(|caps| caps[1].to_string())
}

pub fn order_id(text: &str) -> Result<String> {
    ORDER_ID
        .captures(text)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| Error::ParameterExtraction("No order ID found in the message".to_string()))
}

/// Topic word preceding "events" or "markets", or a year
pub fn events_keyword(text: &str) -> Option<String> {
    let words: Vec<String> = WORD
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect();

    let keyword = words
        .iter()
        .position(|w| matches!(w.as_str(), "events" | "event" | "markets" | "market"))
        .filter(|&i| i > 0)
        .map(|i| &words[i - 1])
        .filter(|w| w.len() > 2 && !STOPWORDS.contains(&w.as_str()))
        .map(|w| stem(w));

    keyword.or_else(|| YEAR.captures(text).map(|caps| caps[1].to_string()))
}

fn stem(word: &str) -> String {
    if word.len() > 5 && word.ends_with("al") {
        word[..word.len() - 2].to_string()
    } else if word.len() > 3 && word.ends_with('s') {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// Order fields found by scanning the text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFields {
    pub token_id: Option<String>,
    pub side: Option<OrderSide>,
    pub size: Option<String>,
    pub price: Option<String>,
}

impl OrderFields {
    pub fn scan(text: &str) -> Self {
        Self {
            token_id: TOKEN_ID.captures(text).map(|c| c[1].to_string()),
            side: SIDE.captures(text).and_then(|c| parse_side(&c[1])),
            size: SIZE.captures(text).map(|c| c[1].to_string()),
            price: PRICE.captures(text).map(|c| normalize_price(&c[1])),
        }
    }

    /// Fill gaps from `other`; values already present win
    fn fill_from(&mut self, other: OrderFields) {
        self.token_id = self.token_id.take().or(other.token_id);
        self.side = self.side.or(other.side);
        self.size = self.size.take().or(other.size);
        self.price = self.price.take().or(other.price);
    }

    fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.token_id.is_none() {
            missing.push("token id");
        }
        if self.side.is_none() {
            missing.push("side (buy or sell)");
        }
        if self.size.is_none() {
            missing.push("size");
        }
        if self.price.is_none() {
            missing.push("price");
        }
        missing
    }

    fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

fn parse_side(word: &str) -> Option<OrderSide> {
    match word.to_ascii_lowercase().as_str() {
        "buy" => Some(OrderSide::Buy),
        "sell" => Some(OrderSide::Sell),
        _ => None,
    }
}

fn normalize_price(price: &str) -> String {
    if price.starts_with('.') {
        format!("0{}", price)
    } else {
        price.to_string()
    }
}

/// Time in force and, for GTD orders, the expiry in unix seconds.
///
/// A validity window that does not fit in an `i64` timestamp is rejected.
pub fn order_type(text: &str, now: i64) -> Result<(OrderType, Option<i64>)> {
    if FILL_OR_KILL.is_match(text) {
        return Ok((OrderType::Fok, None));
    }
    let Some(caps) = VALID_FOR.captures(text) else {
        return Ok((OrderType::Gtc, None));
    };
    let unit: i64 = match caps[2].to_ascii_lowercase().as_str() {
        "minute" => 60,
        "hour" => 3_600,
        _ => 86_400,
    };
    let expiration = match caps[1].parse::<i64>() {
        Ok(0) => return Ok((OrderType::Gtc, None)),
        Ok(count) => count
            .checked_mul(unit)
            .and_then(|offset| now.checked_add(offset)),
        Err(_) => None,
    };
    expiration
        .map(|at| (OrderType::Gtd, Some(at)))
        .ok_or_else(|| {
            Error::ParameterExtraction("Order expiry is too far in the future".to_string())
        })
}

const ORDER_FALLBACK_INSTRUCTIONS: &str = "Extract the order parameters from the most recent message. \
Respond with only a JSON object of the form \
{\"tokenId\": \"<outcome token id>\", \"side\": \"BUY\" or \"SELL\", \"size\": \"<shares>\", \"price\": \"<price between 0 and 1>\"}. \
Use null for anything the user did not state.";

/// Build an order from the message, asking the large model for any field the
/// scan missed.
pub async fn order_request(ctx: &ExtractionContext<'_>) -> Result<OrderRequest> {
    let text = ctx.message.text();
    let mut fields = OrderFields::scan(text);

    if !fields.is_complete() {
        let prompt = format!("{}\n\n{}", ctx.invocation_context, ORDER_FALLBACK_INSTRUCTIONS);
        match ctx.runtime.generate_text(&prompt, ModelClass::Large).await {
            Ok(reply) => {
                let generated = parse_generated_fields(&reply);
                debug!(?generated, "Order fields from model");
                fields.fill_from(generated);
            }
            Err(e) => warn!(error = %e, "Order parameter generation failed"),
        }
    }

    let missing = fields.missing();
    let (Some(token_id), Some(side), Some(size), Some(price)) =
        (fields.token_id, fields.side, fields.size, fields.price)
    else {
        return Err(Error::ParameterExtraction(format!(
            "Missing order details: {}",
            missing.join(", ")
        )));
    };

    let (order_type, expiration) = order_type(text, chrono::Utc::now().timestamp())?;
    Ok(OrderRequest {
        token_id,
        side,
        size,
        price,
        order_type,
        expiration,
    })
}

/// Lenient parse of the model's JSON reply; anything unusable is dropped
fn parse_generated_fields(reply: &str) -> OrderFields {
    let json = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if end > start => &reply[start..=end],
        _ => return OrderFields::default(),
    };
    let Ok(value) = serde_json::from_str::<Value>(json) else {
        return OrderFields::default();
    };

    let field = |key: &str| -> Option<String> {
        match value.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    };

    OrderFields {
        token_id: field("tokenId"),
        side: field("side").and_then(|s| parse_side(&s)),
        size: field("size"),
        price: field("price").map(|p| normalize_price(&p)),
    }
}
