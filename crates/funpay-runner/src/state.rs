use std::collections::{BTreeSet, HashMap};

use funpay_parser::ChatHistory;
use funpay_protocol::random_tag;
use funpay_types::{BuyerViewing, OrderSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Last accepted bookmark values for one chat.
pub struct ChatPollState {
    pub last_node_msg_id: i64,
    pub last_user_msg_id: i64,
    /// `None` when the last message was an image.
    pub last_text: Option<String>,
}

impl Default for ChatPollState {
    fn default() -> Self {
        Self {
            last_node_msg_id: -1,
            last_user_msg_id: -1,
            last_text: None,
        }
    }
}

impl ChatPollState {
    /// State recorded after a send: both counters at the sent id.
    pub fn sent(message_id: i64, text: Option<String>) -> Self {
        Self {
            last_node_msg_id: message_id,
            last_user_msg_id: message_id,
            last_text: text,
        }
    }

    /// A send left unread records `0/0`, which the next bookmark confirms silently.
    pub fn is_unread_send(&self) -> bool {
        self.last_node_msg_id == 0 && self.last_user_msg_id == 0
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CachedHistory {
    pub history: ChatHistory,
    pub last_message_id: i64,
}

#[derive(Debug)]
pub(crate) struct RunnerState {
    pub chat_tag: String,
    pub order_tag: String,
    pub chats_initialized: bool,
    pub orders_initialized: bool,
    pub chat_states: HashMap<i64, ChatPollState>,
    pub chat_names: HashMap<i64, Option<String>>,
    pub last_delivered: HashMap<i64, i64>,
    pub sent_by_bot: HashMap<i64, BTreeSet<i64>>,
    pub counterparts: HashMap<i64, i64>,
    /// Highest `node_msg_id` of the first chat snapshot.
    pub initial_watermark: Option<i64>,
    pub order_snapshot: Option<HashMap<String, OrderSummary>>,
    /// Chats whose change was announced but whose history is still owed.
    pub unresolved: BTreeSet<i64>,
    /// Consecutive probe passes that left an unresolved chat unresolved.
    pub probe_attempts: HashMap<i64, usize>,
    pub pending_histories: HashMap<i64, CachedHistory>,
    pub viewing: HashMap<i64, BuyerViewing>,
    /// Chats that changed in the last applied pass, in bookmark order.
    pub recently_changed: Vec<i64>,
}

impl RunnerState {
    pub fn new() -> Self {
        Self {
            chat_tag: random_tag(),
            order_tag: random_tag(),
            chats_initialized: false,
            orders_initialized: false,
            chat_states: HashMap::new(),
            chat_names: HashMap::new(),
            last_delivered: HashMap::new(),
            sent_by_bot: HashMap::new(),
            counterparts: HashMap::new(),
            initial_watermark: None,
            order_snapshot: None,
            unresolved: BTreeSet::new(),
            probe_attempts: HashMap::new(),
            pending_histories: HashMap::new(),
            viewing: HashMap::new(),
            recently_changed: Vec::new(),
        }
    }

    pub fn record_sent_message(&mut self, chat_id: i64, message_id: i64) {
        self.sent_by_bot.entry(chat_id).or_default().insert(message_id);
    }

    pub fn record_last_message(&mut self, chat_id: i64, message_id: i64, text: Option<String>) {
        self.chat_states
            .insert(chat_id, ChatPollState::sent(message_id, text));
    }

    /// Keeps a probed history when it carries something not yet delivered.
    pub fn cache_history(&mut self, history: ChatHistory) -> bool {
        let chat_id = history.chat_id;
        let Some(last_message_id) = history.messages.iter().map(|message| message.id).max() else {
            return false;
        };
        if last_message_id <= self.last_delivered.get(&chat_id).copied().unwrap_or(0) {
            return false;
        }
        if self
            .pending_histories
            .get(&chat_id)
            .is_some_and(|cached| cached.last_message_id >= last_message_id)
        {
            return false;
        }
        self.pending_histories.insert(
            chat_id,
            CachedHistory {
                history,
                last_message_id,
            },
        );
        true
    }

    /// Counts a missed probe for every `probed` chat still unresolved and
    /// drops the ones that reached `limit`. Returns the dropped ids.
    pub fn settle_probes(&mut self, probed: &[i64], limit: usize) -> Vec<i64> {
        let mut dropped = Vec::new();
        for chat_id in probed {
            if !self.unresolved.contains(chat_id) {
                continue;
            }
            let attempts = self.probe_attempts.entry(*chat_id).or_default();
            *attempts = attempts.saturating_add(1);
            if *attempts >= limit {
                self.unresolved.remove(chat_id);
                dropped.push(*chat_id);
            }
        }
        let unresolved = &self.unresolved;
        self.probe_attempts
            .retain(|chat_id, _| unresolved.contains(chat_id));
        dropped
    }

    /// Drops cached histories that no longer add anything.
    pub fn prune_pending_histories(&mut self) {
        let last_delivered = &self.last_delivered;
        self.pending_histories.retain(|chat_id, cached| {
            cached.last_message_id > last_delivered.get(chat_id).copied().unwrap_or(0)
        });
    }
}

#[cfg(test)]
mod tests {
    use funpay_types::RawMessage;

    use super::*;

    fn history(chat_id: i64, ids: &[i64]) -> ChatHistory {
        ChatHistory {
            chat_id,
            node_name: None,
            messages: ids
                .iter()
                .map(|id| RawMessage {
                    id: *id,
                    chat_id,
                    ..RawMessage::default()
                })
                .collect(),
            failures: Vec::new(),
        }
    }

    #[test]
    fn unit_chat_poll_state_defaults_to_unseen() {
        let state = ChatPollState::default();
        assert_eq!(state.last_node_msg_id, -1);
        assert_eq!(state.last_user_msg_id, -1);
        assert_eq!(state.last_text, None);
        assert!(!state.is_unread_send());
        assert!(ChatPollState::sent(0, None).is_unread_send());
    }

    #[test]
    fn unit_initial_tags_are_fresh_and_distinct() {
        let state = RunnerState::new();
        assert_eq!(state.chat_tag.len(), funpay_protocol::TAG_LEN);
        assert_ne!(state.chat_tag, state.order_tag);
    }

    #[test]
    fn functional_cache_history_keeps_only_newer_histories() {
        let mut state = RunnerState::new();
        state.last_delivered.insert(5, 10);
        assert!(!state.cache_history(history(5, &[9, 10])));
        assert!(state.cache_history(history(5, &[10, 11])));
        assert!(!state.cache_history(history(5, &[11])));
        assert!(state.cache_history(history(5, &[11, 12])));
        assert_eq!(state.pending_histories[&5].last_message_id, 12);
        assert!(!state.cache_history(history(6, &[])));
    }

    #[test]
    fn functional_prune_drops_delivered_histories() {
        let mut state = RunnerState::new();
        assert!(state.cache_history(history(5, &[3])));
        assert!(state.cache_history(history(6, &[8])));
        state.last_delivered.insert(5, 3);
        state.prune_pending_histories();
        assert!(!state.pending_histories.contains_key(&5));
        assert!(state.pending_histories.contains_key(&6));
    }

    #[test]
    fn functional_settle_probes_drops_chats_after_limit() {
        let mut state = RunnerState::new();
        state.unresolved.extend([5, 6, 7]);
        assert!(state.settle_probes(&[5, 6], 2).is_empty());
        assert_eq!(state.probe_attempts[&5], 1);
        assert!(!state.probe_attempts.contains_key(&7));

        state.unresolved.remove(&6);
        assert_eq!(state.settle_probes(&[5, 6, 7], 2), vec![5]);
        assert_eq!(state.unresolved.iter().copied().collect::<Vec<_>>(), vec![7]);
        assert!(!state.probe_attempts.contains_key(&5));
        assert!(!state.probe_attempts.contains_key(&6));
        assert_eq!(state.probe_attempts[&7], 1);
    }

    #[test]
    fn unit_record_notices_update_state() {
        let mut state = RunnerState::new();
        state.record_sent_message(5, 40);
        state.record_sent_message(5, 41);
        state.record_last_message(5, 41, Some("done".to_string()));
        assert_eq!(
            state.sent_by_bot[&5].iter().copied().collect::<Vec<_>>(),
            vec![40, 41]
        );
        assert_eq!(
            state.chat_states[&5],
            ChatPollState::sent(41, Some("done".to_string()))
        );
    }
}
