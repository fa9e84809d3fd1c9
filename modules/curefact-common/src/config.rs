use std::env;

use tracing::info;

/// Relay configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Generative Language API key. May be empty: analysis then fails
    /// closed at call time instead of at startup.
    pub google_api_key: String,

    /// Model tried first for every generation request.
    pub primary_model: String,
    /// Model retried when the primary returns a 4xx.
    pub fallback_model: String,

    // Web server
    pub host: String,
    pub port: u16,

    /// Directory the bundled yt-dlp binary lives in (downloaded on first use).
    pub ytdlp_bin_dir: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            google_api_key: env::var("GOOGLE_API_KEY").unwrap_or_default(),
            primary_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
            fallback_model: env::var("GEMINI_FALLBACK_MODEL")
                .unwrap_or_else(|_| "gemini-1.5-pro".to_string()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .expect("PORT must be a number"),
            ytdlp_bin_dir: env::var("YTDLP_BIN_DIR").unwrap_or_else(|_| "./bin".to_string()),
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.google_api_key.trim().is_empty()
    }

    /// Log the effective configuration without leaking the credential.
    pub fn log_redacted(&self) {
        info!(
            api_key_configured = self.has_api_key(),
            primary_model = %self.primary_model,
            fallback_model = %self.fallback_model,
            host = %self.host,
            port = self.port,
            "Configuration loaded"
        );
    }
}
