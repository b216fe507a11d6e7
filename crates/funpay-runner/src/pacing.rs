use std::time::Duration;

/// Sleep before the next poll.
///
/// After a recent rate limit the whole interval is slept to shed load;
/// otherwise the time the pass already took is subtracted, never going
/// below zero.
pub fn pacing_delay(interval: Duration, elapsed: Duration, rate_limited_recently: bool) -> Duration {
    if rate_limited_recently {
        interval
    } else {
        interval.saturating_sub(elapsed)
    }
}
