use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid state value: {0}")]
    InvalidState(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}
