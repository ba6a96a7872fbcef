use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error("Missing {table} entry for {key}")]
    MissingEntry { table: &'static str, key: String },
    #[error("Invalid {table} value for {key}: {value} (must be finite and non-negative)")]
    InvalidValue {
        table: &'static str,
        key: String,
        value: f64,
    },
    #[error("Duplicate identifier {id} in {set}")]
    DuplicateNode { set: &'static str, id: String },
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error in {0}: {1}")]
    ParseError(String, String),
    #[error("Serialization error: {0}")]
    SerializeError(String),
    #[error("Solver failure ({status}): {message}")]
    SolverFailure { status: String, message: String },
}

impl NetworkError {
    pub(crate) fn missing(table: &'static str, key: impl Into<String>) -> Self {
        NetworkError::MissingEntry {
            table,
            key: key.into(),
        }
    }
}
