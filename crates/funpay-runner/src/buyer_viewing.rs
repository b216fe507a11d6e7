//! `c-p-u` probes: what a counterpart is looking at right now.
//!
//! Results live in a map that is cleared at the start of every poll cycle, so
//! a `NewMessage` only ever carries viewing data fetched in its own cycle.

use std::collections::HashMap;

use funpay_parser::RecordParser;
use funpay_protocol::{ObjectKind, PollResponse};
use funpay_types::BuyerViewing;
use tracing::{debug, warn};

use crate::state::RunnerState;

/// Counterparts of the chats that changed in the last applied pass, deduplicated,
/// at most `limit` of them.
pub(crate) fn probe_targets(state: &RunnerState, limit: usize) -> Vec<i64> {
    let mut targets = Vec::new();
    for chat_id in &state.recently_changed {
        if targets.len() >= limit {
            break;
        }
        let Some(buyer_id) = state.counterparts.get(chat_id).copied() else {
            continue;
        };
        if !targets.contains(&buyer_id) {
            targets.push(buyer_id);
        }
    }
    targets
}

/// Parses every `c-p-u` object of `response` into `viewing`. Returns how many failed.
pub(crate) fn record_viewing_objects(
    parser: &dyn RecordParser,
    response: &PollResponse,
    viewing: &mut HashMap<i64, BuyerViewing>,
) -> usize {
    let mut failures = 0usize;
    for object in response.objects_of(&ObjectKind::BuyerViewing) {
        let Some(buyer_id) = object.subject_id.as_i64() else {
            debug!(subject = %object.subject_id, "ignoring c-p-u object with non-numeric subject");
            continue;
        };
        match parser.parse_buyer_viewing(buyer_id, object.tag.as_deref(), object.data.as_ref()) {
            Ok(parsed) => {
                viewing.insert(buyer_id, parsed);
            }
            Err(error) => {
                failures = failures.saturating_add(1);
                warn!(buyer_id, %error, "failed to parse buyer viewing");
            }
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use funpay_protocol::decode;
    use serde_json::json;

    use super::*;
    use crate::runner::tests::JsonRecordParser;

    #[test]
    fn unit_probe_targets_dedupe_and_respect_limit() {
        let mut state = RunnerState::new();
        state.recently_changed = vec![1, 2, 3, 4];
        state.counterparts.insert(1, 100);
        state.counterparts.insert(2, 100);
        state.counterparts.insert(3, 300);
        state.counterparts.insert(4, 400);
        assert_eq!(probe_targets(&state, 10), vec![100, 300, 400]);
        assert_eq!(probe_targets(&state, 2), vec![100, 300]);
        assert!(probe_targets(&state, 0).is_empty());
    }

    #[test]
    fn functional_record_viewing_objects_fills_map_and_counts_failures() {
        let response = decode(&json!({
            "objects": [
                {"type": "c-p-u", "id": "100", "tag": "t1", "data": {"link": "https://funpay.com/lots/offer?id=1", "text": "Gold"}},
                {"type": "c-p-u", "id": "200", "tag": "t2", "data": false},
                {"type": "c-p-u", "id": "300", "tag": "t3", "data": {"broken": true}},
                {"type": "chat_bookmarks", "id": 12, "tag": "t4", "data": false}
            ]
        }))
        .expect("decode");
        let mut viewing = HashMap::new();
        let failures = record_viewing_objects(&JsonRecordParser, &response, &mut viewing);
        assert_eq!(failures, 1);
        assert_eq!(viewing.len(), 2);
        assert!(viewing[&100].is_viewing_something());
        assert_eq!(viewing[&200], BuyerViewing::nothing(200));
    }
}
