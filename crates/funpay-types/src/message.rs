use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `MessageKind` values.
pub enum MessageKind {
    #[default]
    NonSystem,
    OrderPurchased,
    OrderConfirmed,
    NewFeedback,
    FeedbackChanged,
    FeedbackDeleted,
    NewFeedbackAnswer,
    FeedbackAnswerChanged,
    FeedbackAnswerDeleted,
    OrderReopened,
    Refund,
    PartialRefund,
    OrderConfirmedByAdmin,
    Discord,
    DearVendors,
    RefundByAdmin,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NonSystem => "non_system",
            Self::OrderPurchased => "order_purchased",
            Self::OrderConfirmed => "order_confirmed",
            Self::NewFeedback => "new_feedback",
            Self::FeedbackChanged => "feedback_changed",
            Self::FeedbackDeleted => "feedback_deleted",
            Self::NewFeedbackAnswer => "new_feedback_answer",
            Self::FeedbackAnswerChanged => "feedback_answer_changed",
            Self::FeedbackAnswerDeleted => "feedback_answer_deleted",
            Self::OrderReopened => "order_reopened",
            Self::Refund => "refund",
            Self::PartialRefund => "partial_refund",
            Self::OrderConfirmedByAdmin => "order_confirmed_by_admin",
            Self::Discord => "discord",
            Self::DearVendors => "dear_vendors",
            Self::RefundByAdmin => "refund_by_admin",
        }
    }

    pub fn is_system(self) -> bool {
        !matches!(self, Self::NonSystem)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
/// Message fields exactly as scraped, before any cross-message enrichment.
pub struct RawMessage {
    pub id: i64,
    pub chat_id: i64,
    pub author_id: i64,
    pub author_name: Option<String>,
    pub badge: Option<String>,
    pub default_label: Option<String>,
    pub text: Option<String>,
    pub image_link: Option<String>,
    pub image_name: Option<String>,
    pub html: String,
    /// `(user_id, username)` for every profile link in the message, in document order.
    pub user_links: Vec<(i64, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Public struct `Message` used across FunPay runner components.
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    pub chat_name: Option<String>,
    pub counterpart_id: Option<i64>,
    pub author_id: i64,
    pub author: Option<String>,
    pub text: Option<String>,
    pub image_link: Option<String>,
    pub image_name: Option<String>,
    pub kind: MessageKind,
    pub by_bot: bool,
    pub by_vertex: bool,
    pub badge: Option<String>,
    pub is_employee: bool,
    pub is_support: bool,
    pub is_moderation: bool,
    pub is_arbitration: bool,
    pub is_autoreply: bool,
    pub initiator_id: Option<i64>,
    pub initiator_username: Option<String>,
    pub i_am_buyer: Option<bool>,
    pub i_am_seller: Option<bool>,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub html: String,
}

impl Message {
    /// Text if present, otherwise the image link.
    pub fn display_text(&self) -> Option<&str> {
        self.text.as_deref().or(self.image_link.as_deref())
    }
}
