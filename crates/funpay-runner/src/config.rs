use std::time::Duration;

use funpay_protocol::DEFAULT_REQUEST_BUDGET;
use funpay_types::AccountProfile;
use thiserror::Error;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(6);
pub const DEFAULT_DETAIL_RETRY_ATTEMPTS: usize = 3;
pub const DEFAULT_DETAIL_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_FAILURE_BACKOFF: Duration = Duration::from_secs(5);
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
/// Probe passes an unresolved chat may go unanswered before it is dropped.
pub const DEFAULT_UNRESOLVED_PROBE_LIMIT: usize = 3;

/// Both persistent subscriptions ride in every poll request.
pub const MIN_REQUEST_BUDGET: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `RunnerConfig` used across FunPay runner components.
pub struct RunnerConfig {
    pub poll_interval: Duration,
    pub resolve_chat_histories: bool,
    pub resolve_order_details: bool,
    pub resolve_buyer_viewing: bool,
    pub request_budget: usize,
    pub detail_retry_attempts: usize,
    pub detail_retry_delay: Duration,
    pub failure_backoff: Duration,
    pub rate_limit_window: Duration,
    pub unresolved_probe_limit: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            resolve_chat_histories: true,
            resolve_order_details: true,
            resolve_buyer_viewing: true,
            request_budget: DEFAULT_REQUEST_BUDGET,
            detail_retry_attempts: DEFAULT_DETAIL_RETRY_ATTEMPTS,
            detail_retry_delay: DEFAULT_DETAIL_RETRY_DELAY,
            failure_backoff: DEFAULT_FAILURE_BACKOFF,
            rate_limit_window: DEFAULT_RATE_LIMIT_WINDOW,
            unresolved_probe_limit: DEFAULT_UNRESOLVED_PROBE_LIMIT,
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<(), RunnerConfigError> {
        if self.request_budget < MIN_REQUEST_BUDGET {
            return Err(RunnerConfigError::BudgetTooSmall {
                budget: self.request_budget,
                minimum: MIN_REQUEST_BUDGET,
            });
        }
        if self.detail_retry_attempts == 0 {
            return Err(RunnerConfigError::ZeroRetryAttempts);
        }
        if self.poll_interval.is_zero() && self.rate_limit_window.is_zero() {
            return Err(RunnerConfigError::UnpacedLoop);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates supported `RunnerConfigError` values.
pub enum RunnerConfigError {
    #[error("request budget {budget} is below the minimum of {minimum}")]
    BudgetTooSmall { budget: usize, minimum: usize },
    #[error("detail retry attempts must be greater than 0")]
    ZeroRetryAttempts,
    #[error("poll interval and rate limit window cannot both be zero")]
    UnpacedLoop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Identity of the account whose updates are polled.
pub struct AccountContext {
    pub id: i64,
    pub username: String,
}

impl AccountContext {
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}

impl From<&AccountProfile> for AccountContext {
    fn from(profile: &AccountProfile) -> Self {
        Self::new(profile.id, profile.username.clone())
    }
}
