#![no_main]

use funpay_protocol::{decode_str, ObjectKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let Ok(response) = decode_str(&raw) else {
        return;
    };
    for object in &response.objects {
        assert!(!matches!(
            object.data,
            Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false))
        ));
        if let ObjectKind::Other(kind) = &object.kind {
            assert!(!matches!(
                kind.as_str(),
                "chat_bookmarks" | "orders_counters" | "chat_node" | "c-p-u"
            ));
        }
    }
    assert!(response
        .malformed
        .iter()
        .all(|problem| problem.starts_with("objects[")));
});
