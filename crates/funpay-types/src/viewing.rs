use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// What a counterpart is looking at right now, as reported by a `c-p-u` probe.
pub struct BuyerViewing {
    pub buyer_id: i64,
    pub link: Option<String>,
    pub text: Option<String>,
    pub tag: Option<String>,
    pub html: Option<String>,
}

impl BuyerViewing {
    pub fn nothing(buyer_id: i64) -> Self {
        Self {
            buyer_id,
            link: None,
            text: None,
            tag: None,
            html: None,
        }
    }

    pub fn is_viewing_something(&self) -> bool {
        self.link.is_some()
    }
}
