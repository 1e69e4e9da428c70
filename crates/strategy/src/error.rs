use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),

    #[error("strategy '{0}' is already registered")]
    DuplicateStrategy(String),

    #[error("insufficient data: need at least {required} bars, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },

    #[error("strategy config error: {0}")]
    Config(String),
}
