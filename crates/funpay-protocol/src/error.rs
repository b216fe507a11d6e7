use thiserror::Error;

#[derive(Debug, Error)]
/// Enumerates supported `ProtocolError` values.
pub enum ProtocolError {
    #[error("poll envelope is missing the objects list")]
    MissingObjects,
    #[error("poll envelope is not valid json: {0}")]
    InvalidJson(String),
    #[error("poll request needs {requested} objects but the budget is {budget}")]
    BudgetExceeded { budget: usize, requested: usize },
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
