use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid symbol code: '{0}'")]
    InvalidSymbol(String),

    #[error("History provider error: {0}")]
    History(String),

    #[error("Universe provider error: {0}")]
    Universe(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
