use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `OrderStatus` values.
pub enum OrderStatus {
    Paid,
    Closed,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Closed => "closed",
            Self::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `Currency` values.
pub enum Currency {
    Rub,
    Usd,
    Eur,
    #[default]
    Unknown,
}

impl Currency {
    pub fn from_symbol(symbol: &str) -> Self {
        match symbol.trim() {
            "₽" | "¤" => Self::Rub,
            "$" => Self::Usd,
            "€" => Self::Eur,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One row of the sales listing.
pub struct OrderSummary {
    pub id: String,
    pub description: String,
    pub status: OrderStatus,
    pub price: f64,
    pub currency: Currency,
    pub buyer_username: String,
    pub buyer_id: i64,
    pub chat_id: String,
    pub created_at_text: String,
    pub created_at: Option<NaiveDateTime>,
    pub subcategory_name: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub html: String,
}

impl OrderSummary {
    /// Private chat id between two users, smaller id first.
    pub fn private_chat_id(left: i64, right: i64) -> String {
        let (low, high) = if left <= right { (left, right) } else { (right, left) };
        format!("users-{low}-{high}")
    }
}
