pub mod error;
pub mod types;

pub use error::{GeminiError, Result};
pub use types::{
    Candidate, Content, FileData, FileState, GenerateRequest, GenerateResponse, GenerationConfig,
    Part, UploadedFile,
};

use tracing::debug;

use types::UploadResponse;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";
const API_VERSION: &str = "v1beta";

/// Client for the Generative Language API: file upload, file status, and
/// content generation.
#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
            base_url: GEMINI_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    pub fn api_version(&self) -> &'static str {
        API_VERSION
    }

    /// Upload raw media bytes to the provider's file storage. The returned
    /// file typically starts out `Processing`; poll `get_file` until it
    /// becomes `Active`.
    pub async fn upload_file(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        display_name: &str,
    ) -> Result<UploadedFile> {
        let url = format!(
            "{}/upload/{}/files?key={}",
            self.base_url, API_VERSION, self.api_key
        );

        debug!(display_name, bytes = bytes.len(), "Gemini file upload");

        let metadata = serde_json::json!({ "file": { "display_name": display_name } });
        let form = reqwest::multipart::Form::new()
            .part(
                "metadata",
                reqwest::multipart::Part::text(metadata.to_string())
                    .mime_str("application/json")?,
            )
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).mime_str(mime_type)?,
            );

        let response = self.http.post(&url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GeminiError::Api { status: status.as_u16(), message });
        }

        let parsed: UploadResponse = response.json().await?;
        Ok(parsed.file)
    }

    /// Fetch the current state of an uploaded file by its resource name
    /// (e.g. `files/abc123`).
    pub async fn get_file(&self, name: &str) -> Result<UploadedFile> {
        let url = format!("{}/{}/{}?key={}", self.base_url, API_VERSION, name, self.api_key);

        let response = self.http.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GeminiError::Api { status: status.as_u16(), message });
        }

        Ok(response.json().await?)
    }

    /// Issue a `generateContent` request against the given model. Non-2xx
    /// statuses become `GeminiError::Api` so callers can branch on 4xx.
    pub async fn generate(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        let url = format!(
            "{}/{}/models/{}:generateContent?key={}",
            self.base_url, API_VERSION, model, self.api_key
        );

        debug!(model, "Gemini generate request");

        let response = self.http.post(&url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GeminiError::Api { status: status.as_u16(), message });
        }

        Ok(response.json().await?)
    }
}
