use std::time::Duration;

use clap::{ArgAction, Parser};
use funpay_runner::RunnerConfig;
use funpay_session::FunPaySessionConfig;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "funpay-runner",
    about = "Watches a FunPay seller account and prints updates as NDJSON",
    version
)]
/// Command-line surface of the `funpay-runner` binary.
pub struct Cli {
    #[arg(
        long = "golden-key",
        env = "FUNPAY_GOLDEN_KEY",
        hide_env_values = true,
        help = "golden_key cookie of the account to watch"
    )]
    pub golden_key: String,

    #[arg(
        long = "user-agent",
        env = "FUNPAY_USER_AGENT",
        default_value = DEFAULT_USER_AGENT,
        help = "User-Agent header sent with every request"
    )]
    pub user_agent: String,

    #[arg(
        long = "base-url",
        env = "FUNPAY_BASE_URL",
        default_value = "https://funpay.com",
        help = "Marketplace origin"
    )]
    pub base_url: String,

    #[arg(
        long = "request-timeout-ms",
        env = "FUNPAY_REQUEST_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64,
        help = "Timeout in milliseconds for each HTTP request"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "poll-interval-ms",
        env = "FUNPAY_POLL_INTERVAL_MS",
        default_value_t = 6_000,
        value_parser = parse_positive_u64,
        help = "Target spacing in milliseconds between poll passes"
    )]
    pub poll_interval_ms: u64,

    #[arg(
        long = "request-budget",
        env = "FUNPAY_REQUEST_BUDGET",
        default_value_t = 10,
        value_parser = parse_positive_usize,
        help = "Maximum distinct objects per runner request"
    )]
    pub request_budget: usize,

    #[arg(
        long = "detail-retry-attempts",
        env = "FUNPAY_DETAIL_RETRY_ATTEMPTS",
        default_value_t = 3,
        value_parser = parse_positive_usize,
        help = "Attempts for each chat-history or order-list fetch"
    )]
    pub detail_retry_attempts: usize,

    #[arg(
        long = "detail-retry-delay-ms",
        env = "FUNPAY_DETAIL_RETRY_DELAY_MS",
        default_value_t = 1_000,
        value_parser = parse_positive_u64,
        help = "Delay in milliseconds between detail fetch attempts"
    )]
    pub detail_retry_delay_ms: u64,

    #[arg(
        long = "failure-backoff-ms",
        env = "FUNPAY_FAILURE_BACKOFF_MS",
        default_value_t = 5_000,
        value_parser = parse_positive_u64,
        help = "Minimum sleep in milliseconds after a failed poll pass"
    )]
    pub failure_backoff_ms: u64,

    #[arg(
        long = "no-chat-histories",
        action = ArgAction::SetTrue,
        help = "Emit chat changes without fetching histories or new messages"
    )]
    pub no_chat_histories: bool,

    #[arg(
        long = "no-order-details",
        action = ArgAction::SetTrue,
        help = "Emit order counter changes without fetching the order list"
    )]
    pub no_order_details: bool,

    #[arg(
        long = "no-buyer-viewing",
        action = ArgAction::SetTrue,
        help = "Skip probes of what counterparts are currently viewing"
    )]
    pub no_buyer_viewing: bool,

    #[arg(
        long = "poll-once",
        action = ArgAction::SetTrue,
        help = "Run a single poll pass, print its events and exit"
    )]
    pub poll_once: bool,
}

impl Cli {
    pub fn session_config(&self) -> FunPaySessionConfig {
        FunPaySessionConfig {
            base_url: self.base_url.clone(),
            golden_key: self.golden_key.clone(),
            user_agent: self.user_agent.clone(),
            request_timeout_ms: self.request_timeout_ms,
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            resolve_chat_histories: !self.no_chat_histories,
            resolve_order_details: !self.no_order_details,
            resolve_buyer_viewing: !self.no_buyer_viewing,
            request_budget: self.request_budget,
            detail_retry_attempts: self.detail_retry_attempts,
            detail_retry_delay: Duration::from_millis(self.detail_retry_delay_ms),
            failure_backoff: Duration::from_millis(self.failure_backoff_ms),
            ..RunnerConfig::default()
        }
    }
}
