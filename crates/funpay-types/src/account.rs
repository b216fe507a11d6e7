use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Identity of the logged-in account, read from the landing page.
pub struct AccountProfile {
    pub id: i64,
    pub username: String,
    pub csrf_token: String,
    pub locale: Option<String>,
}
