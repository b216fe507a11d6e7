use funpay_types::{BuyerViewing, ChatSummary, MessageKind, OrderSummary, RawMessage};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates supported `ParseError` values.
pub enum ParseError {
    #[error("missing element: {0}")]
    MissingElement(&'static str),
    #[error("invalid attribute {name}: {value:?}")]
    InvalidAttribute { name: &'static str, value: String },
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("page is a login form; the session is not authorized")]
    LoginPage,
    #[error("invalid selector or pattern: {0}")]
    Pattern(String),
}

#[derive(Debug, Clone, PartialEq)]
/// Outcome of parsing one fragment out of a larger batch.
pub enum FragmentParse<T> {
    Parsed(T),
    /// Administratively removed entry; not an error.
    Deleted,
    Failed(ParseError),
}

#[derive(Debug, Clone, PartialEq, Default)]
/// One chat's history as returned by a `chat_node` object.
pub struct ChatHistory {
    pub chat_id: i64,
    /// Node name such as `users-12-34`.
    pub node_name: Option<String>,
    /// Messages in ascending id order.
    pub messages: Vec<RawMessage>,
    pub failures: Vec<ParseError>,
}

/// Trait contract for `RecordParser` behavior.
pub trait RecordParser: Send + Sync {
    /// Splits a `chat_bookmarks` object's data into chat summaries.
    fn parse_chat_bookmarks(
        &self,
        data: &Value,
    ) -> Result<Vec<FragmentParse<ChatSummary>>, ParseError>;

    /// Reads the messages of a `chat_node` object's data.
    fn parse_chat_history(&self, chat_id: i64, data: &Value) -> Result<ChatHistory, ParseError>;

    /// Reads a `c-p-u` object; `data` is `None` when the buyer is viewing nothing.
    fn parse_buyer_viewing(
        &self,
        buyer_id: i64,
        tag: Option<&str>,
        data: Option<&Value>,
    ) -> Result<BuyerViewing, ParseError>;

    /// Reads the sales listing page.
    fn parse_order_list(
        &self,
        html: &str,
        account_id: i64,
    ) -> Result<Vec<FragmentParse<OrderSummary>>, ParseError>;

    /// Best-effort system-message classification of a message text.
    fn classify(&self, text: &str) -> MessageKind;
}
