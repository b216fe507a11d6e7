#![no_main]

use funpay_parser::{FragmentParse, HtmlRecordParser, RecordParser};
use libfuzzer_sys::fuzz_target;
use serde_json::json;

fuzz_target!(|data: &[u8]| {
    let Ok(parser) = HtmlRecordParser::new() else {
        return;
    };
    let html = String::from_utf8_lossy(data).into_owned();

    if let Ok(chats) = parser.parse_chat_bookmarks(&json!({ "html": html })) {
        for chat in chats {
            if let FragmentParse::Parsed(chat) = chat {
                assert!(chat.last_message_text.chars().count() <= 250);
            }
        }
    }

    let history = json!({"messages": [{"id": 1, "author": 2, "html": html}]});
    if let Ok(history) = parser.parse_chat_history(5, &history) {
        assert_eq!(history.messages.len() + history.failures.len(), 1);
    }

    let _ = parser.parse_order_list(&html, 12);
    let _ = parser.parse_account_profile(&html);
});
