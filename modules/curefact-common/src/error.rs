use thiserror::Error;

#[derive(Error, Debug)]
pub enum CureFactError {
    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
