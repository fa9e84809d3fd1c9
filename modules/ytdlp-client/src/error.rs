use thiserror::Error;

pub type Result<T> = std::result::Result<T, YtDlpError>;

#[derive(Debug, Error)]
pub enum YtDlpError {
    #[error("Failed to execute {bin}: {message}")]
    Exec { bin: String, message: String },

    #[error("yt-dlp failed: {0}")]
    Failed(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
