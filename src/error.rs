use thiserror::Error;

#[derive(Error, Debug)]
pub enum PylError {
    #[error("Invalid state notation: {0}")]
    InvalidState(String),

    #[error("Invalid player notation: {0}")]
    InvalidPlayer(String),

    #[error("Invalid board: {0}")]
    InvalidBoard(String),

    #[error("Unknown board: {0}")]
    UnknownBoard(String),

    #[error("Invalid search option: {0}")]
    InvalidOption(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type PylResult<T> = Result<T, PylError>;
