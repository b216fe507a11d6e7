use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Facts external senders report back to the engine.
pub enum RunnerNotice {
    /// A message this process sent, so later derivation marks it `by_bot`.
    SentMessage { chat_id: i64, message_id: i64 },
    /// Overrides the stored bookmark state after a send.
    LastMessage {
        chat_id: i64,
        message_id: i64,
        text: Option<String>,
    },
}

#[derive(Debug, Clone)]
/// Cloneable sender side for [`RunnerNotice`]s. Notices apply at the start of the next pass.
pub struct RunnerHandle {
    sender: mpsc::UnboundedSender<RunnerNotice>,
}

impl RunnerHandle {
    pub(crate) fn new(sender: mpsc::UnboundedSender<RunnerNotice>) -> Self {
        Self { sender }
    }

    /// Returns `false` once the engine is gone.
    pub fn record_sent_message(&self, chat_id: i64, message_id: i64) -> bool {
        self.notify(RunnerNotice::SentMessage {
            chat_id,
            message_id,
        })
    }

    /// Returns `false` once the engine is gone.
    pub fn record_last_message(&self, chat_id: i64, message_id: i64, text: Option<String>) -> bool {
        self.notify(RunnerNotice::LastMessage {
            chat_id,
            message_id,
            text,
        })
    }

    pub fn notify(&self, notice: RunnerNotice) -> bool {
        self.sender.send(notice).is_ok()
    }
}
