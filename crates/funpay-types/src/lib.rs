//! Domain records shared across the FunPay runner crates.
//!
//! Holds chat, message, order and buyer-viewing records as produced by the
//! record parser, the pure message enrichment stage, and the event values the
//! update engine yields to consumers.
mod account;
mod chat;
mod enrich;
mod event;
mod message;
mod order;
mod viewing;

pub use account::AccountProfile;
pub use chat::{
    strip_bot_marker, BotMarker, ChatSummary, BOT_MARKER, IMAGE_SENTINELS, LEGACY_BOT_MARKER,
};
pub use enrich::{enrich_history, EnrichContext};
pub use event::{MessageStack, RunnerEvent, RunnerEventKind};
pub use message::{Message, MessageKind, RawMessage};
pub use order::{Currency, OrderStatus, OrderSummary};
pub use viewing::BuyerViewing;
