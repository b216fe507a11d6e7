use serde::{Deserialize, Serialize};

use crate::message::MessageKind;

/// Invisible prefix the runner puts in front of every message it sends.
pub const BOT_MARKER: char = '\u{2061}';
/// Invisible prefix used by the legacy bot variant.
pub const LEGACY_BOT_MARKER: char = '\u{2064}';
/// Localized previews the marketplace shows instead of an image.
pub const IMAGE_SENTINELS: [&str; 3] = ["Изображение", "Зображення", "Image"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `BotMarker` values.
pub enum BotMarker {
    #[default]
    None,
    Bot,
    Legacy,
}

/// Splits a leading bot marker off `text`.
pub fn strip_bot_marker(text: &str) -> (&str, BotMarker) {
    if let Some(rest) = text.strip_prefix(BOT_MARKER) {
        return (rest, BotMarker::Bot);
    }
    if let Some(rest) = text.strip_prefix(LEGACY_BOT_MARKER) {
        return (rest, BotMarker::Legacy);
    }
    (text, BotMarker::None)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One chat-list entry as rendered in the bookmark snapshot.
pub struct ChatSummary {
    pub id: i64,
    pub name: Option<String>,
    pub last_message_text: String,
    pub is_image: bool,
    pub node_msg_id: i64,
    pub user_msg_id: i64,
    pub unread: bool,
    pub last_message_kind: MessageKind,
    pub last_by_bot: bool,
    pub last_by_vertex: bool,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub html: String,
}

impl ChatSummary {
    /// Text stored in the poll state: `None` for image previews.
    pub fn comparable_text(&self) -> Option<&str> {
        if self.is_image {
            None
        } else {
            Some(self.last_message_text.as_str())
        }
    }

    pub fn is_image_preview(text: &str) -> bool {
        IMAGE_SENTINELS.contains(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_strip_bot_marker_detects_current_and_legacy_prefixes() {
        assert_eq!(
            strip_bot_marker("\u{2061}hello"),
            ("hello", BotMarker::Bot)
        );
        assert_eq!(
            strip_bot_marker("\u{2064}hello"),
            ("hello", BotMarker::Legacy)
        );
        assert_eq!(strip_bot_marker("hello"), ("hello", BotMarker::None));
    }

    #[test]
    fn unit_image_previews_compare_as_none() {
        let chat = ChatSummary {
            id: 1,
            name: None,
            last_message_text: "Image".to_string(),
            is_image: ChatSummary::is_image_preview("Image"),
            node_msg_id: 3,
            user_msg_id: 3,
            unread: false,
            last_message_kind: MessageKind::NonSystem,
            last_by_bot: false,
            last_by_vertex: false,
            html: String::new(),
        };
        assert!(chat.is_image);
        assert_eq!(chat.comparable_text(), None);
    }
}
