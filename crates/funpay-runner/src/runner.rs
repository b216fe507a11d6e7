use std::collections::{BTreeSet, HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use funpay_parser::RecordParser;
use funpay_protocol::{
    decode, encode, ObjectKind, PollPayload, PollPayloadBuilder, PollRequestObject, PollResponse,
    SubjectId,
};
use funpay_session::SessionClient;
use funpay_types::{BuyerViewing, Message, OrderSummary, RunnerEvent};
use futures_util::stream::{self, Stream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::buyer_viewing::{probe_targets, record_viewing_objects};
use crate::chat_updates::{counterpart_from_node_name, enrich_chat};
use crate::config::{AccountContext, RunnerConfig, RunnerConfigError};
use crate::error::RunnerError;
use crate::handle::{RunnerHandle, RunnerNotice};
use crate::pacing::pacing_delay;
use crate::state::{ChatPollState, RunnerState};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Counters for one poll pass.
pub struct PollCycleReport {
    pub requested_objects: usize,
    pub response_objects: usize,
    pub emitted_events: usize,
    pub new_messages: usize,
    pub stale_chats: usize,
    pub parse_failures: usize,
    pub exhausted_fetches: usize,
    pub unresolved_chats: usize,
    /// Unresolved chats given up on after too many unanswered probes.
    pub dropped_probes: usize,
    /// The pass failed because the poll request timed out.
    pub timed_out: bool,
    /// Set when the pass failed before anything was applied.
    pub failure: Option<String>,
}

impl PollCycleReport {
    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Public struct `PollCycleOutcome` used across FunPay runner components.
pub struct PollCycleOutcome {
    pub events: Vec<RunnerEvent>,
    pub report: PollCycleReport,
}

/// Long-poll update engine: sole owner of the poll call and of all derivation state.
pub struct UpdateRunner {
    pub(crate) config: RunnerConfig,
    pub(crate) session: Arc<dyn SessionClient>,
    pub(crate) parser: Arc<dyn RecordParser>,
    pub(crate) account: AccountContext,
    pub(crate) state: RunnerState,
    notices: mpsc::UnboundedReceiver<RunnerNotice>,
    notice_sender: mpsc::UnboundedSender<RunnerNotice>,
}

impl UpdateRunner {
    pub fn new(
        config: RunnerConfig,
        session: Arc<dyn SessionClient>,
        parser: Arc<dyn RecordParser>,
        account: AccountContext,
    ) -> Result<Self, RunnerConfigError> {
        config.validate()?;
        let (notice_sender, notices) = mpsc::unbounded_channel();
        Ok(Self {
            config,
            session,
            parser,
            account,
            state: RunnerState::new(),
            notices,
            notice_sender,
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn account(&self) -> &AccountContext {
        &self.account
    }

    pub fn handle(&self) -> RunnerHandle {
        RunnerHandle::new(self.notice_sender.clone())
    }

    pub fn record_sent_message(&mut self, chat_id: i64, message_id: i64) {
        self.state.record_sent_message(chat_id, message_id);
    }

    pub fn record_last_message(&mut self, chat_id: i64, message_id: i64, text: Option<String>) {
        self.state.record_last_message(chat_id, message_id, text);
    }

    pub fn chat_state(&self, chat_id: i64) -> Option<&ChatPollState> {
        self.state.chat_states.get(&chat_id)
    }

    pub fn last_delivered_message_id(&self, chat_id: i64) -> Option<i64> {
        self.state.last_delivered.get(&chat_id).copied()
    }

    pub fn chat_tag(&self) -> &str {
        &self.state.chat_tag
    }

    pub fn order_tag(&self) -> &str {
        &self.state.order_tag
    }

    pub fn order_snapshot(&self) -> Option<&HashMap<String, OrderSummary>> {
        self.state.order_snapshot.as_ref()
    }

    pub fn unresolved_chats(&self) -> &BTreeSet<i64> {
        &self.state.unresolved
    }

    pub fn buyer_viewing(&self, buyer_id: i64) -> Option<&BuyerViewing> {
        self.state.viewing.get(&buyer_id)
    }

    /// Sleep before the next pass, given how long the last one took.
    pub fn next_delay(&self, elapsed: Duration, last_pass_failed: bool) -> Duration {
        let rate_limited_recently = self
            .session
            .last_rate_limited_at()
            .is_some_and(|at| at.elapsed() < self.config.rate_limit_window);
        let delay = pacing_delay(self.config.poll_interval, elapsed, rate_limited_recently);
        if last_pass_failed {
            delay.max(self.config.failure_backoff)
        } else {
            delay
        }
    }

    /// Fetches one chat's enriched history now, outside the derivation state.
    pub async fn fetch_chat_history_now(&self, chat_id: i64) -> Result<Vec<Message>, RunnerError> {
        let mut fetched = self.fetch_history_batch(&[chat_id]).await?;
        let history = fetched
            .histories
            .remove(&chat_id)
            .ok_or(RunnerError::MissingHistory(chat_id))?;
        let counterpart = history
            .node_name
            .as_deref()
            .and_then(|name| counterpart_from_node_name(name, self.account.id))
            .or_else(|| self.state.counterparts.get(&chat_id).copied());
        let chat_name = self.state.chat_names.get(&chat_id).cloned().flatten();
        Ok(enrich_chat(
            &self.account,
            self.parser.as_ref(),
            chat_name.as_deref(),
            counterpart,
            history.messages,
        ))
    }

    /// Runs one request/apply pass. A failed pass leaves tags and snapshots untouched.
    pub async fn poll_once(&mut self) -> PollCycleOutcome {
        let mut report = PollCycleReport::default();
        self.drain_notices();
        self.state.viewing.clear();

        match self.run_pass(&mut report).await {
            Ok(events) => {
                report.emitted_events = events.len();
                report.new_messages = events
                    .iter()
                    .filter(|event| matches!(event, RunnerEvent::NewMessage { .. }))
                    .count();
                report.unresolved_chats = self.state.unresolved.len();
                if report.emitted_events > 0
                    || report.parse_failures > 0
                    || report.exhausted_fetches > 0
                {
                    info!(
                        requested = report.requested_objects,
                        received = report.response_objects,
                        events = report.emitted_events,
                        new_messages = report.new_messages,
                        stale = report.stale_chats,
                        parse_failures = report.parse_failures,
                        exhausted = report.exhausted_fetches,
                        unresolved = report.unresolved_chats,
                        "update runner cycle"
                    );
                }
                PollCycleOutcome { events, report }
            }
            Err(error) => {
                report.timed_out = error.is_timeout();
                warn!(%error, timed_out = report.timed_out, "poll cycle failed; state left unchanged");
                report.failure = Some(error.to_string());
                PollCycleOutcome {
                    events: Vec::new(),
                    report,
                }
            }
        }
    }

    fn drain_notices(&mut self) {
        while let Ok(notice) = self.notices.try_recv() {
            match notice {
                RunnerNotice::SentMessage {
                    chat_id,
                    message_id,
                } => self.state.record_sent_message(chat_id, message_id),
                RunnerNotice::LastMessage {
                    chat_id,
                    message_id,
                    text,
                } => self.state.record_last_message(chat_id, message_id, text),
            }
        }
    }

    /// Both subscriptions, then unresolved-chat probes, then viewing probes.
    pub(crate) fn build_poll_payload(&self) -> Result<PollPayload, RunnerError> {
        let mut builder = PollPayloadBuilder::new(self.config.request_budget);
        builder.push_object(PollRequestObject::chat_bookmarks(
            self.account.id,
            self.state.chat_tag.clone(),
        ))?;
        builder.push_object(PollRequestObject::orders_counters(
            self.account.id,
            self.state.order_tag.clone(),
        ))?;
        if self.config.resolve_chat_histories {
            for chat_id in &self.state.unresolved {
                if builder.remaining() == 0 {
                    break;
                }
                builder.push_object(PollRequestObject::chat_history(*chat_id))?;
            }
        }
        if self.config.resolve_buyer_viewing {
            for buyer_id in probe_targets(&self.state, builder.remaining()) {
                builder.push_object(PollRequestObject::buyer_viewing(buyer_id))?;
            }
        }
        Ok(builder.build())
    }

    async fn run_pass(&mut self, report: &mut PollCycleReport) -> Result<Vec<RunnerEvent>, RunnerError> {
        let payload = self.build_poll_payload()?;
        report.requested_objects = payload.distinct_objects();
        let encoded = encode(&payload, self.config.request_budget)?;
        let raw = self.session.poll(&encoded).await?;
        let response = decode(&raw)?;
        let probed: Vec<i64> = self
            .state
            .unresolved
            .iter()
            .copied()
            .filter(|chat_id| payload.contains(&ObjectKind::ChatNode, &SubjectId::Number(*chat_id)))
            .collect();
        Ok(self.apply_response(response, &probed, report).await)
    }

    async fn apply_response(
        &mut self,
        response: PollResponse,
        probed: &[i64],
        report: &mut PollCycleReport,
    ) -> Vec<RunnerEvent> {
        report.response_objects = response.objects.len();
        for problem in &response.malformed {
            report.parse_failures = report.parse_failures.saturating_add(1);
            warn!(problem = %problem, "skipping malformed response object");
        }
        self.state.recently_changed.clear();

        let viewing_failures =
            record_viewing_objects(self.parser.as_ref(), &response, &mut self.state.viewing);
        report.parse_failures = report.parse_failures.saturating_add(viewing_failures);
        self.route_chat_nodes(&response, report);

        let mut events = Vec::new();
        for object in response.objects_of(&ObjectKind::OrdersCounters) {
            if object.data.is_none() {
                if let Some(tag) = &object.tag {
                    self.state.order_tag = tag.clone();
                }
                continue;
            }
            events.extend(self.derive_order_updates(object.data.as_ref(), report).await);
            if let Some(tag) = &object.tag {
                self.state.order_tag = tag.clone();
            }
        }
        for object in response.objects_of(&ObjectKind::ChatBookmarks) {
            let Some(data) = object.data.as_ref() else {
                if let Some(tag) = &object.tag {
                    self.state.chat_tag = tag.clone();
                }
                continue;
            };
            match self.derive_chat_updates(data, report).await {
                Ok(chat_events) => {
                    events.extend(chat_events);
                    if let Some(tag) = &object.tag {
                        self.state.chat_tag = tag.clone();
                    }
                }
                Err(error) => {
                    report.parse_failures = report.parse_failures.saturating_add(1);
                    warn!(%error, "chat bookmarks unreadable; keeping previous chat tag");
                }
            }
        }
        if self.config.resolve_chat_histories {
            events.extend(self.resolve_probed_chats());
            let dropped = self
                .state
                .settle_probes(probed, self.config.unresolved_probe_limit);
            if !dropped.is_empty() {
                report.dropped_probes = dropped.len();
                warn!(chat_ids = ?dropped, "unresolved chats never answered a probe; dropping them");
            }
        }
        for object in &response.objects {
            if let ObjectKind::Other(kind) = &object.kind {
                debug!(kind = %kind, subject = %object.subject_id, "ignoring unknown response object");
            }
        }

        if events.is_empty() {
            self.state.pending_histories.clear();
        } else {
            self.state.prune_pending_histories();
        }
        events
    }

    fn route_chat_nodes(&mut self, response: &PollResponse, report: &mut PollCycleReport) {
        if !self.config.resolve_chat_histories {
            return;
        }
        for object in response.objects_of(&ObjectKind::ChatNode) {
            let (Some(chat_id), Some(data)) = (object.subject_id.as_i64(), object.data.as_ref())
            else {
                continue;
            };
            match self.parser.parse_chat_history(chat_id, data) {
                Ok(history) => {
                    if self.state.cache_history(history) {
                        debug!(chat_id, "cached probed chat history");
                    } else if !self.state.pending_histories.contains_key(&chat_id)
                        && self.state.unresolved.remove(&chat_id)
                    {
                        debug!(chat_id, "probed history has nothing undelivered; chat resolved");
                    }
                }
                Err(error) => {
                    report.parse_failures = report.parse_failures.saturating_add(1);
                    self.state.unresolved.remove(&chat_id);
                    warn!(chat_id, %error, "probed chat history unreadable; dropping chat from probes");
                }
            }
        }
    }

    /// Endless event stream: polls, yields the pass's events, then paces.
    pub fn into_event_stream(self) -> impl Stream<Item = RunnerEvent> + Send {
        stream::unfold(
            (self, VecDeque::new(), None::<Duration>),
            |(mut runner, mut pending, mut delay)| async move {
                loop {
                    if let Some(event) = pending.pop_front() {
                        return Some((event, (runner, pending, delay)));
                    }
                    if let Some(wait) = delay.take() {
                        if !wait.is_zero() {
                            tokio::time::sleep(wait).await;
                        }
                    }
                    let started = Instant::now();
                    let outcome = runner.poll_once().await;
                    delay = Some(runner.next_delay(started.elapsed(), outcome.report.failed()));
                    pending.extend(outcome.events);
                }
            },
        )
    }
}

/// Drives `runner` until `shutdown` resolves or `sink` closes.
///
/// Shutdown is observed between passes and during the pacing sleep; a pass in
/// flight always finishes.
pub async fn run_update_runner<S>(
    mut runner: UpdateRunner,
    sink: mpsc::Sender<RunnerEvent>,
    shutdown: S,
) where
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        let started = Instant::now();
        let outcome = runner.poll_once().await;
        for event in outcome.events {
            if sink.send(event).await.is_err() {
                info!("event sink closed; stopping update runner");
                return;
            }
        }
        let delay = runner.next_delay(started.elapsed(), outcome.report.failed());
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("update runner shutdown requested");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
