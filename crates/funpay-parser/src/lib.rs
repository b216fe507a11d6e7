//! Record parsing for marketplace fragments.
//!
//! [`RecordParser`] is the seam the update engine consumes; [`HtmlRecordParser`]
//! is a best-effort implementation over the marketplace's current markup.
mod classify;
mod dates;
mod html;
mod record;

pub use classify::MessageClassifier;
pub use dates::parse_order_date;
pub use html::HtmlRecordParser;
pub use record::{ChatHistory, FragmentParse, ParseError, RecordParser};
