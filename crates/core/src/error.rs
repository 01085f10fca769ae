use thiserror::Error;

/// Raised before any matching phase runs; no partial state is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("Invalid transaction '{id}': {reason}")]
    InvalidTransaction { id: String, reason: String },
    #[error("Invalid matching rule '{id}': {reason}")]
    InvalidRule { id: String, reason: String },
}

/// A breach of the exact/suggested/unmatched partition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    #[error("Transaction {0} is missing from the result")]
    Missing(String),
    #[error("Transaction {0} appears more than once in the result")]
    Duplicated(String),
    #[error("Transaction {0} was not part of the input")]
    Unexpected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid date range: {start} is after {end}")]
pub struct DateRangeError {
    pub start: chrono::NaiveDate,
    pub end: chrono::NaiveDate,
}
