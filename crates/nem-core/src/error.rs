use chrono::NaiveDateTime;
use std::io::ErrorKind;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NemError>;

#[derive(Debug, Error)]
pub enum NemError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Type mismatch: cannot normalise {input:?} as a date or timestamp ({reason})")]
    TypeMismatch { input: String, reason: String },

    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("Schema error in dataset {dataset}: {detail} (missing: [{}])", .missing.join(", "))]
    Schema {
        dataset: String,
        missing: Vec<String>,
        detail: String,
    },

    #[error("Query execution failed for {params}: {reason}")]
    QueryExecution { params: String, reason: String },

    #[error("Timed out after {0:?} waiting for a store connection")]
    PoolTimeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Storage operation error: {0}")]
    StorageOperation(#[from] redb::StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

impl NemError {
    pub fn schema(dataset: impl Into<String>, detail: impl Into<String>) -> Self {
        NemError::Schema {
            dataset: dataset.into(),
            missing: Vec::new(),
            detail: detail.into(),
        }
    }

    /// Only interrupted or timed-out I/O against the store is worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            NemError::Io(e) => is_transient_io(e.kind()),
            NemError::Csv(e) => match e.kind() {
                csv::ErrorKind::Io(io) => is_transient_io(io.kind()),
                _ => false,
            },
            _ => false,
        }
    }
}

fn is_transient_io(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::Interrupted
            | ErrorKind::TimedOut
            | ErrorKind::WouldBlock
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::UnexpectedEof
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let interrupted = NemError::Io(std::io::Error::new(ErrorKind::Interrupted, "eintr"));
        assert!(interrupted.is_transient());

        let missing = NemError::Io(std::io::Error::new(ErrorKind::NotFound, "no file"));
        assert!(!missing.is_transient());

        assert!(!NemError::Configuration("bad".into()).is_transient());
        assert!(!NemError::PoolTimeout(Duration::from_millis(5)).is_transient());
    }

    #[test]
    fn test_schema_error_lists_missing_fields() {
        let err = NemError::Schema {
            dataset: "scada_5min".into(),
            missing: vec!["DUID".into(), "SCADAVALUE".into()],
            detail: "expected columns not found".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("scada_5min"));
        assert!(msg.contains("DUID, SCADAVALUE"));
    }
}
