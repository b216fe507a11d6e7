use funpay_parser::ParseError;
use funpay_protocol::ProtocolError;
use funpay_session::SessionError;
use thiserror::Error;

#[derive(Debug, Error)]
/// Failures inside one poll pass. None of them stop the loop.
pub enum RunnerError {
    #[error("transport error: {0}")]
    Transport(#[from] SessionError),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("response carried no history for chat {0}")]
    MissingHistory(i64),
    #[error("{what} failed after {attempts} attempts: {last_error}")]
    DetailFetchExhausted {
        what: String,
        attempts: usize,
        last_error: String,
    },
}

impl RunnerError {
    /// True when the marketplace never answered within the request timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(error) if error.is_timeout())
    }
}
