use crate::{config::ConfigError, service::ServiceError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API request failed: {0}")]
    Service(#[from] ServiceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Screen clearing failed: {0}")]
    ClearScreen(#[from] clearscreen::Error),
}
