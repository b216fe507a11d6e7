//! Long-poll update engine for a marketplace seller account.
//!
//! [`UpdateRunner`] owns the poll loop: it subscribes to the chat bookmark list
//! and the order counters, diffs each snapshot against what it has already
//! seen, resolves chat histories and order details on demand, and yields
//! ordered [`funpay_types::RunnerEvent`] values.
mod buyer_viewing;
mod chat_updates;
mod config;
mod error;
mod handle;
mod order_updates;
mod pacing;
mod retry;
mod runner;
mod state;

pub use chat_updates::counterpart_from_node_name;
pub use config::{
    AccountContext, RunnerConfig, RunnerConfigError, DEFAULT_DETAIL_RETRY_ATTEMPTS,
    DEFAULT_DETAIL_RETRY_DELAY, DEFAULT_FAILURE_BACKOFF, DEFAULT_POLL_INTERVAL,
    DEFAULT_RATE_LIMIT_WINDOW, DEFAULT_UNRESOLVED_PROBE_LIMIT, MIN_REQUEST_BUDGET,
};
pub use error::RunnerError;
pub use handle::{RunnerHandle, RunnerNotice};
pub use pacing::pacing_delay;
pub use runner::{run_update_runner, PollCycleOutcome, PollCycleReport, UpdateRunner};
pub use state::ChatPollState;
