//! Chat-list snapshot diffing and new-message synthesis.

use std::collections::HashMap;
use std::sync::Arc;

use funpay_parser::{ChatHistory, FragmentParse, ParseError, RecordParser};
use funpay_protocol::{
    decode, encode, random_tag, ObjectKind, PollPayloadBuilder, PollRequestObject,
};
use funpay_types::{
    enrich_history, BuyerViewing, ChatSummary, EnrichContext, Message, MessageStack, RawMessage,
    RunnerEvent,
};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::buyer_viewing::record_viewing_objects;
use crate::config::AccountContext;
use crate::error::RunnerError;
use crate::retry::retry_detail_fetch;
use crate::runner::{PollCycleReport, UpdateRunner};
use crate::state::{ChatPollState, RunnerState};

#[derive(Debug, Default)]
pub(crate) struct FetchedHistories {
    pub histories: HashMap<i64, ChatHistory>,
    pub viewing: HashMap<i64, BuyerViewing>,
    /// Chats whose history came back but could not be read at all.
    pub unreadable: Vec<i64>,
}

/// The other participant of a private node named `users-<a>-<b>`.
pub fn counterpart_from_node_name(node_name: &str, account_id: i64) -> Option<i64> {
    let (left, right) = node_name.strip_prefix("users-")?.split_once('-')?;
    let left: i64 = left.parse().ok()?;
    let right: i64 = right.parse().ok()?;
    match (left == account_id, right == account_id) {
        (true, false) => Some(right),
        (false, true) => Some(left),
        _ => None,
    }
}

pub(crate) fn enrich_chat(
    account: &AccountContext,
    parser: &dyn RecordParser,
    chat_name: Option<&str>,
    counterpart_id: Option<i64>,
    raws: Vec<RawMessage>,
) -> Vec<Message> {
    let classify = |text: &str| parser.classify(text);
    let ctx = EnrichContext {
        account_id: account.id,
        account_username: &account.username,
        chat_name,
        counterpart_id,
        classify: &classify,
    };
    enrich_history(raws, &ctx)
}

/// Turns one chat's history into `NewMessage` events sharing one stack.
///
/// Messages at or below the chat's last delivered id are dropped. A chat that
/// never delivered anything keeps only messages above the initial-snapshot
/// watermark, or its single latest message when none qualify.
pub(crate) fn derive_new_messages(
    state: &mut RunnerState,
    account: &AccountContext,
    parser: &dyn RecordParser,
    attach_viewing: bool,
    history: ChatHistory,
) -> Vec<RunnerEvent> {
    let chat_id = history.chat_id;
    state.unresolved.remove(&chat_id);
    for failure in &history.failures {
        warn!(chat_id, error = %failure, "skipping unparseable message");
    }

    let mut raws = history.messages;
    raws.sort_by_key(|raw| raw.id);
    raws.dedup_by_key(|raw| raw.id);
    let last_delivered = state.last_delivered.get(&chat_id).copied();
    if let Some(last) = last_delivered {
        raws.retain(|raw| raw.id > last);
    }
    if raws.is_empty() {
        return Vec::new();
    }
    if last_delivered.is_none() {
        let first_fresh = match state.initial_watermark {
            Some(watermark) => raws.partition_point(|raw| raw.id <= watermark),
            None => raws.len(),
        };
        let cut = first_fresh.min(raws.len() - 1);
        raws = raws.split_off(cut);
    }

    let counterpart = history
        .node_name
        .as_deref()
        .and_then(|name| counterpart_from_node_name(name, account.id))
        .or_else(|| state.counterparts.get(&chat_id).copied());
    let chat_name = state.chat_names.get(&chat_id).cloned().flatten();
    let mut messages = enrich_chat(account, parser, chat_name.as_deref(), counterpart, raws);
    let counterpart = counterpart.or_else(|| messages.iter().find_map(|message| message.counterpart_id));

    let sent = state.sent_by_bot.entry(chat_id).or_default();
    for message in &mut messages {
        if !message.by_bot && sent.contains(&message.id) {
            message.by_bot = true;
        }
    }
    let Some(last_id) = messages.last().map(|message| message.id) else {
        return Vec::new();
    };
    sent.retain(|id| *id > last_id);
    state.last_delivered.insert(chat_id, last_id);
    if let Some(counterpart) = counterpart {
        state.counterparts.insert(chat_id, counterpart);
    }

    let viewing = counterpart
        .filter(|_| attach_viewing)
        .and_then(|buyer_id| state.viewing.get(&buyer_id).cloned());
    let stack = MessageStack::new(
        random_tag(),
        chat_id,
        messages.iter().map(|message| message.id).collect(),
    );
    messages
        .into_iter()
        .map(|message| RunnerEvent::NewMessage {
            message,
            stack: Arc::clone(&stack),
            viewing: viewing.clone(),
        })
        .collect()
}

impl UpdateRunner {
    pub(crate) async fn derive_chat_updates(
        &mut self,
        data: &Value,
        report: &mut PollCycleReport,
    ) -> Result<Vec<RunnerEvent>, ParseError> {
        let fragments = self.parser.parse_chat_bookmarks(data)?;
        let first_snapshot = !self.state.chats_initialized;
        let track_histories = self.config.resolve_chat_histories;
        let mut events = Vec::new();
        let mut changed: Vec<ChatSummary> = Vec::new();

        for fragment in fragments {
            let chat = match fragment {
                FragmentParse::Parsed(chat) => chat,
                FragmentParse::Deleted => continue,
                FragmentParse::Failed(error) => {
                    report.parse_failures = report.parse_failures.saturating_add(1);
                    warn!(%error, "skipping unparseable chat bookmark");
                    continue;
                }
            };
            let previous = self
                .state
                .chat_states
                .get(&chat.id)
                .cloned()
                .unwrap_or_default();
            if chat.node_msg_id <= previous.last_node_msg_id {
                report.stale_chats = report.stale_chats.saturating_add(1);
                continue;
            }
            let accepted = ChatPollState {
                last_node_msg_id: chat.node_msg_id,
                last_user_msg_id: chat.user_msg_id,
                last_text: chat.comparable_text().map(str::to_string),
            };
            if previous.is_unread_send() && previous.last_text == accepted.last_text {
                debug!(chat_id = chat.id, "confirming unread send without an event");
                self.state.chat_states.insert(chat.id, accepted);
                continue;
            }
            self.state.chat_states.insert(chat.id, accepted);
            self.state.chat_names.insert(chat.id, chat.name.clone());
            if first_snapshot {
                if track_histories {
                    self.state.last_delivered.insert(chat.id, chat.node_msg_id);
                }
                events.push(RunnerEvent::InitialChat { chat });
            } else {
                changed.push(chat);
            }
        }

        if first_snapshot {
            self.state.chats_initialized = true;
            if track_histories {
                self.state.initial_watermark = self.state.last_delivered.values().copied().max();
            }
        }
        self.state.recently_changed = changed.iter().map(|chat| chat.id).collect();
        if changed.is_empty() {
            return Ok(events);
        }
        events.push(RunnerEvent::ChatsListChanged);
        if !track_histories {
            events.extend(
                changed
                    .into_iter()
                    .map(|chat| RunnerEvent::LastChatMessageChanged { chat }),
            );
            return Ok(events);
        }

        let mut delivered = Vec::new();
        let mut cached = Vec::new();
        let mut to_fetch = Vec::new();
        for chat in changed {
            let covered = self
                .state
                .last_delivered
                .get(&chat.id)
                .is_some_and(|last| chat.node_msg_id <= *last);
            let probed = self
                .state
                .pending_histories
                .get(&chat.id)
                .is_some_and(|entry| chat.node_msg_id <= entry.last_message_id);
            if covered {
                delivered.push(chat);
            } else if probed {
                cached.push(chat);
            } else {
                to_fetch.push(chat);
            }
        }

        events.extend(
            delivered
                .into_iter()
                .map(|chat| RunnerEvent::LastChatMessageChanged { chat }),
        );
        for chat in cached {
            let chat_id = chat.id;
            events.push(RunnerEvent::LastChatMessageChanged { chat });
            if let Some(entry) = self.state.pending_histories.remove(&chat_id) {
                events.extend(self.new_message_events(entry.history));
            }
        }

        let batch_size = self.config.request_budget;
        while !to_fetch.is_empty() {
            let batch: Vec<ChatSummary> = to_fetch.drain(..batch_size.min(to_fetch.len())).collect();
            let chat_ids: Vec<i64> = batch.iter().map(|chat| chat.id).collect();
            match self.fetch_histories_with_retry(&chat_ids).await {
                Ok(mut fetched) => {
                    self.state.viewing.extend(fetched.viewing.drain());
                    for chat in batch {
                        let chat_id = chat.id;
                        events.push(RunnerEvent::LastChatMessageChanged { chat });
                        if let Some(history) = fetched.histories.remove(&chat_id) {
                            events.extend(self.new_message_events(history));
                        } else if fetched.unreadable.contains(&chat_id) {
                            report.parse_failures = report.parse_failures.saturating_add(1);
                        } else {
                            warn!(chat_id, "history batch omitted chat; probing it next pass");
                            self.state.unresolved.insert(chat_id);
                        }
                    }
                }
                Err(error) => {
                    report.exhausted_fetches = report.exhausted_fetches.saturating_add(1);
                    error!(?chat_ids, %error, "chat history fetch exhausted; chats stay unresolved");
                    for chat in batch {
                        self.state.unresolved.insert(chat.id);
                        events.push(RunnerEvent::LastChatMessageChanged { chat });
                    }
                }
            }
        }
        Ok(events)
    }

    /// Delivers unresolved chats whose probe history arrived in this pass.
    pub(crate) fn resolve_probed_chats(&mut self) -> Vec<RunnerEvent> {
        let ready: Vec<i64> = self
            .state
            .unresolved
            .iter()
            .copied()
            .filter(|chat_id| self.state.pending_histories.contains_key(chat_id))
            .collect();
        let mut events = Vec::new();
        for chat_id in ready {
            if let Some(entry) = self.state.pending_histories.remove(&chat_id) {
                events.extend(self.new_message_events(entry.history));
            }
        }
        events
    }

    pub(crate) fn new_message_events(&mut self, history: ChatHistory) -> Vec<RunnerEvent> {
        derive_new_messages(
            &mut self.state,
            &self.account,
            self.parser.as_ref(),
            self.config.resolve_buyer_viewing,
            history,
        )
    }

    async fn fetch_histories_with_retry(
        &self,
        chat_ids: &[i64],
    ) -> Result<FetchedHistories, RunnerError> {
        let runner: &Self = self;
        let what = format!("chat history for {chat_ids:?}");
        retry_detail_fetch(
            &what,
            self.config.detail_retry_attempts,
            self.config.detail_retry_delay,
            move || runner.fetch_history_batch(chat_ids),
        )
        .await
    }

    /// One `chat_node` batch with `c-p-u` hints for known counterparts while budget remains.
    pub(crate) async fn fetch_history_batch(
        &self,
        chat_ids: &[i64],
    ) -> Result<FetchedHistories, RunnerError> {
        let mut builder = PollPayloadBuilder::new(self.config.request_budget);
        for chat_id in chat_ids {
            builder.push_object(PollRequestObject::chat_history(*chat_id))?;
        }
        if self.config.resolve_buyer_viewing {
            for chat_id in chat_ids {
                if builder.remaining() == 0 {
                    break;
                }
                if let Some(buyer_id) = self.state.counterparts.get(chat_id) {
                    builder.push_object(PollRequestObject::buyer_viewing(*buyer_id))?;
                }
            }
        }
        let encoded = encode(&builder.build(), self.config.request_budget)?;
        let raw = self.session.poll(&encoded).await?;
        let response = decode(&raw)?;

        let mut fetched = FetchedHistories::default();
        record_viewing_objects(self.parser.as_ref(), &response, &mut fetched.viewing);
        for object in response.objects_of(&ObjectKind::ChatNode) {
            let Some(chat_id) = object.subject_id.as_i64() else {
                continue;
            };
            let Some(data) = object.data.as_ref() else {
                continue;
            };
            match self.parser.parse_chat_history(chat_id, data) {
                Ok(history) => {
                    fetched.histories.insert(chat_id, history);
                }
                Err(error) => {
                    warn!(chat_id, %error, "failed to parse chat history");
                    fetched.unreadable.push(chat_id);
                }
            }
        }
        Ok(fetched)
    }
}
