use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chat::ChatSummary;
use crate::message::Message;
use crate::order::OrderSummary;
use crate::viewing::BuyerViewing;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Messages of one chat that surfaced together in a single derivation pass.
pub struct MessageStack {
    pub stack_id: String,
    pub chat_id: i64,
    pub message_ids: Vec<i64>,
}

impl MessageStack {
    pub fn new(stack_id: impl Into<String>, chat_id: i64, message_ids: Vec<i64>) -> Arc<Self> {
        Arc::new(Self {
            stack_id: stack_id.into(),
            chat_id,
            message_ids,
        })
    }

    pub fn len(&self) -> usize {
        self.message_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.message_ids.is_empty()
    }

    pub fn is_last(&self, message_id: i64) -> bool {
        self.message_ids.last() == Some(&message_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `RunnerEventKind` values.
pub enum RunnerEventKind {
    InitialChat,
    ChatsListChanged,
    LastChatMessageChanged,
    NewMessage,
    InitialOrder,
    OrdersListChanged,
    NewOrder,
    OrderStatusChanged,
}

impl RunnerEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitialChat => "initial_chat",
            Self::ChatsListChanged => "chats_list_changed",
            Self::LastChatMessageChanged => "last_chat_message_changed",
            Self::NewMessage => "new_message",
            Self::InitialOrder => "initial_order",
            Self::OrdersListChanged => "orders_list_changed",
            Self::NewOrder => "new_order",
            Self::OrderStatusChanged => "order_status_changed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
/// Events yielded by the update engine, in derivation order.
pub enum RunnerEvent {
    InitialChat {
        chat: ChatSummary,
    },
    ChatsListChanged,
    LastChatMessageChanged {
        chat: ChatSummary,
    },
    NewMessage {
        message: Message,
        stack: Arc<MessageStack>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        viewing: Option<BuyerViewing>,
    },
    InitialOrder {
        order: OrderSummary,
    },
    OrdersListChanged {
        buyer: u64,
        seller: u64,
    },
    NewOrder {
        order: OrderSummary,
    },
    OrderStatusChanged {
        order: OrderSummary,
    },
}

impl RunnerEvent {
    pub fn kind(&self) -> RunnerEventKind {
        match self {
            Self::InitialChat { .. } => RunnerEventKind::InitialChat,
            Self::ChatsListChanged => RunnerEventKind::ChatsListChanged,
            Self::LastChatMessageChanged { .. } => RunnerEventKind::LastChatMessageChanged,
            Self::NewMessage { .. } => RunnerEventKind::NewMessage,
            Self::InitialOrder { .. } => RunnerEventKind::InitialOrder,
            Self::OrdersListChanged { .. } => RunnerEventKind::OrdersListChanged,
            Self::NewOrder { .. } => RunnerEventKind::NewOrder,
            Self::OrderStatusChanged { .. } => RunnerEventKind::OrderStatusChanged,
        }
    }

    /// Chat the event belongs to, when it belongs to one.
    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Self::InitialChat { chat } | Self::LastChatMessageChanged { chat } => Some(chat.id),
            Self::NewMessage { message, .. } => Some(message.chat_id),
            _ => None,
        }
    }
}
