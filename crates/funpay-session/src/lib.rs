//! Authenticated HTTP access to the marketplace.
//!
//! Exposes the [`SessionClient`] contract the update engine consumes and a
//! reqwest-backed implementation that handles cookies, the csrf token, status
//! mapping, and rate-limit bookkeeping.
mod client;
mod funpay;

pub use client::{SessionClient, SessionError};
pub use funpay::{FunPaySessionClient, FunPaySessionConfig, SendMessageOptions, SentMessage};
