//! Envelope codec for the marketplace's shared long-poll endpoint.
//!
//! A poll request carries a bounded list of subscription objects plus at most
//! one action; the response echoes objects of the same shape. Everything here
//! is pure: no I/O and no state beyond constants.
mod error;
mod objects;
mod payload;
mod response;
mod tag;

pub use error::ProtocolError;
pub use objects::{ObjectKind, PollRequestObject, SubjectId, HISTORY_PROBE_TAG};
pub use payload::{encode, EncodedPayload, PollAction, PollPayload, PollPayloadBuilder};
pub use response::{decode, decode_str, PollResponse, PollResponseObject};
pub use tag::{random_tag, TAG_LEN};

/// Per-request object budget the endpoint enforces by silently dropping overflow.
pub const DEFAULT_REQUEST_BUDGET: usize = 10;
