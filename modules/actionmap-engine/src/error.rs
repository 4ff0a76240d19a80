use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediatorError {
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
