use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::tag::random_tag;

/// Tag the endpoint expects on one-shot chat history probes.
pub const HISTORY_PROBE_TAG: &str = "00000000";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
/// Enumerates supported `ObjectKind` values.
pub enum ObjectKind {
    ChatBookmarks,
    OrdersCounters,
    ChatNode,
    BuyerViewing,
    Other(String),
}

impl ObjectKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ChatBookmarks => "chat_bookmarks",
            Self::OrdersCounters => "orders_counters",
            Self::ChatNode => "chat_node",
            Self::BuyerViewing => "c-p-u",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

impl From<String> for ObjectKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "chat_bookmarks" => Self::ChatBookmarks,
            "orders_counters" => Self::OrdersCounters,
            "chat_node" => Self::ChatNode,
            "c-p-u" => Self::BuyerViewing,
            _ => Self::Other(raw),
        }
    }
}

impl From<ObjectKind> for String {
    fn from(kind: ObjectKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
/// Object subject as it appears on the wire: numeric ids or string ids.
pub enum SubjectId {
    Number(i64),
    Text(String),
}

impl SubjectId {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(raw) => raw.trim().parse().ok(),
        }
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One subscription or probe inside a poll request.
pub struct PollRequestObject {
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    #[serde(rename = "id")]
    pub subject_id: SubjectId,
    pub tag: String,
    pub data: Value,
}

impl PollRequestObject {
    /// Chat-list snapshot subscription for the account.
    pub fn chat_bookmarks(account_id: i64, tag: impl Into<String>) -> Self {
        Self {
            kind: ObjectKind::ChatBookmarks,
            subject_id: SubjectId::Number(account_id),
            tag: tag.into(),
            data: Value::Bool(false),
        }
    }

    /// Pending-order counters subscription for the account.
    pub fn orders_counters(account_id: i64, tag: impl Into<String>) -> Self {
        Self {
            kind: ObjectKind::OrdersCounters,
            subject_id: SubjectId::Number(account_id),
            tag: tag.into(),
            data: Value::Bool(false),
        }
    }

    /// One-shot history fetch for a single chat.
    pub fn chat_history(chat_id: i64) -> Self {
        Self {
            kind: ObjectKind::ChatNode,
            subject_id: SubjectId::Number(chat_id),
            tag: HISTORY_PROBE_TAG.to_string(),
            data: json!({"node": chat_id, "last_message": -1, "content": ""}),
        }
    }

    /// "What is this buyer viewing" probe; carries a fresh uncorrelated tag.
    pub fn buyer_viewing(buyer_id: i64) -> Self {
        Self {
            kind: ObjectKind::BuyerViewing,
            subject_id: SubjectId::Text(buyer_id.to_string()),
            tag: random_tag(),
            data: Value::Bool(false),
        }
    }

    /// Identity used for budget accounting.
    pub fn key(&self) -> (ObjectKind, SubjectId) {
        (self.kind.clone(), self.subject_id.clone())
    }
}
