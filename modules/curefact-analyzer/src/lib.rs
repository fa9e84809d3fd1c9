pub mod parse;
mod prompt;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER, USER_AGENT};
use tracing::{info, warn};

use curefact_common::{AnalysisResult, Config, CureFactError, Source, Verdict};
use gemini_client::{FileState, GeminiClient, GeminiError, GenerateRequest, GenerateResponse, Part, UploadedFile};
use ytdlp_client::MediaResolver;

/// Fixed interval between upload-readiness checks.
const POLL_INTERVAL: Duration = Duration::from_millis(1500);
/// Ceiling for the readiness poll. Reaching it proceeds best-effort.
const POLL_CEILING: Duration = Duration::from_secs(60);
/// Backoff before the single upload retry.
const UPLOAD_RETRY_BACKOFF: Duration = Duration::from_millis(500);

const MEDIA_MIME_TYPE: &str = "video/mp4";

// Some origin CDNs refuse requests without a browser-looking User-Agent and
// a Referer; resolver-supplied headers override these.
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const DEFAULT_REFERER: &str = "https://www.instagram.com/";

/// Drives one analysis request end to end: re-resolve, download, upload,
/// readiness poll, generation with model fallback, parse, normalize.
///
/// `analyze` fails outward only for a missing credential; every other
/// internal failure degrades to a fallback result so the client always has
/// something well-formed to render.
pub struct Analyzer {
    resolver: Arc<dyn MediaResolver>,
    gemini: GeminiClient,
    http: reqwest::Client,
    credential_present: bool,
    primary_model: String,
    fallback_model: String,
}

impl Analyzer {
    pub fn new(config: &Config, resolver: Arc<dyn MediaResolver>) -> Self {
        Self {
            resolver,
            gemini: GeminiClient::new(&config.google_api_key),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client"),
            credential_present: config.has_api_key(),
            primary_model: config.primary_model.clone(),
            fallback_model: config.fallback_model.clone(),
        }
    }

    /// Replace the API client (used to point tests at a local endpoint).
    pub fn with_gemini(mut self, gemini: GeminiClient) -> Self {
        self.gemini = gemini;
        self
    }

    pub async fn analyze(
        &self,
        direct_url: &str,
        source_url: &str,
        cdn_headers: &HashMap<String, String>,
    ) -> Result<AnalysisResult, CureFactError> {
        if !self.credential_present {
            return Err(CureFactError::Config(
                "GOOGLE_API_KEY is not configured".to_string(),
            ));
        }

        match self.run(direct_url, source_url, cdn_headers).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(error = %e, "Analysis chain failed, returning illustrative fallback result");
                Ok(fallback_result())
            }
        }
    }

    async fn run(
        &self,
        direct_url: &str,
        source_url: &str,
        cdn_headers: &HashMap<String, String>,
    ) -> anyhow::Result<AnalysisResult> {
        // Re-resolve for fresher CDN headers; the caller-supplied pair is
        // the fallback. This also repairs clients that send a non-fetchable
        // value as the direct URL.
        let (direct_url, cdn_headers) = match self.resolver.resolve(source_url).await {
            Ok(media) => (media.direct_url, media.http_headers),
            Err(e) => {
                warn!(error = %e, "Re-resolve failed, using caller-supplied media URL");
                (direct_url.to_string(), cdn_headers.clone())
            }
        };

        let uploaded = match self.fetch_media(&direct_url, &cdn_headers).await {
            Ok(bytes) => self.upload_media(&bytes).await,
            Err(e) => {
                warn!(error = %e, "Media download failed, continuing without file upload");
                None
            }
        };

        let file = match uploaded {
            Some(file) => {
                let deadline = Instant::now() + POLL_CEILING;
                self.poll_until_active(file, deadline).await
            }
            None => None,
        };

        let prompt = prompt::fact_check_prompt(source_url, &direct_url);
        let mut parts = Vec::new();
        if let Some(file) = &file {
            let mime = file.mime_type.as_deref().unwrap_or(MEDIA_MIME_TYPE);
            parts.push(Part::file(mime, file.uri.clone()));
        }
        parts.push(Part::text(prompt));
        let request = GenerateRequest::single_turn(parts);

        let (response, model_used) = self
            .generate_with_fallback(&request)
            .await
            .map_err(|e| CureFactError::Upstream(e.to_string()))?;
        let text = response
            .text()
            .context("Model response contained no text part")?;

        let mut result = match parse::parse_analysis(text) {
            Some(result) => result,
            None => {
                warn!("Model output was not JSON-shaped, synthesizing summary");
                parse::synthesize_from_text(text)
            }
        };

        result.model_used = Some(model_used);
        result.api_version = Some(self.gemini.api_version().to_string());
        Ok(result.normalize())
    }

    /// Download the media bytes with a browser-looking default header set,
    /// overridden by any resolver-supplied CDN headers.
    async fn fetch_media(
        &self,
        url: &str,
        cdn_headers: &HashMap<String, String>,
    ) -> anyhow::Result<Vec<u8>> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        headers.insert(REFERER, HeaderValue::from_static(DEFAULT_REFERER));
        for (name, value) in cdn_headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }

        let response = self
            .http
            .get(url)
            .headers(headers)
            .send()
            .await
            .context("Media download request failed")?;
        if !response.status().is_success() {
            anyhow::bail!("Media download failed with status {}", response.status());
        }

        let bytes = response
            .bytes()
            .await
            .context("Media download body read failed")?;
        info!(url, bytes = bytes.len(), "Downloaded media");
        Ok(bytes.to_vec())
    }

    /// Write the media bytes to a scoped temp file and upload that copy,
    /// retrying once after a short backoff on transport failure. The temp
    /// copy is removed on every exit path when the guard drops.
    async fn upload_media(&self, bytes: &[u8]) -> Option<UploadedFile> {
        let tmp = match tempfile::Builder::new()
            .prefix("curefact-media-")
            .suffix(".mp4")
            .tempfile()
        {
            Ok(tmp) => tmp,
            Err(e) => {
                warn!(error = %e, "Failed to create temp media file");
                return None;
            }
        };
        if let Err(e) = tokio::fs::write(tmp.path(), bytes).await {
            warn!(error = %e, "Failed to write temp media file");
            return None;
        }

        let display_name = tmp
            .path()
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("media.mp4")
            .to_string();

        match self
            .gemini
            .upload_file(bytes.to_vec(), MEDIA_MIME_TYPE, &display_name)
            .await
        {
            Ok(file) => {
                info!(name = %file.name, "Uploaded media file");
                Some(file)
            }
            Err(GeminiError::Network(message)) => {
                warn!(error = %message, "Upload transport failure, retrying once");
                tokio::time::sleep(UPLOAD_RETRY_BACKOFF).await;
                let data = match tokio::fs::read(tmp.path()).await {
                    Ok(data) => data,
                    Err(e) => {
                        warn!(error = %e, "Failed to re-read temp media file");
                        return None;
                    }
                };
                match self.gemini.upload_file(data, MEDIA_MIME_TYPE, &display_name).await {
                    Ok(file) => Some(file),
                    Err(e) => {
                        warn!(error = %e, "Upload retry failed");
                        None
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Upload failed");
                None
            }
        }
    }

    /// Poll the uploaded file until it is `Active` or the deadline passes.
    /// The deadline is checked cooperatively each iteration so a caller can
    /// shorten it without changing the loop's contract. Hitting the deadline
    /// proceeds best-effort with the reference; provider-reported failure
    /// drops it.
    async fn poll_until_active(
        &self,
        file: UploadedFile,
        deadline: Instant,
    ) -> Option<UploadedFile> {
        let mut current = file;
        loop {
            match current.state {
                FileState::Active => return Some(current),
                FileState::Failed => {
                    warn!(name = %current.name, "Uploaded file failed provider processing");
                    return None;
                }
                _ => {}
            }
            if Instant::now() >= deadline {
                warn!(name = %current.name, "Readiness poll hit its ceiling, proceeding best-effort");
                return Some(current);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
            match self.gemini.get_file(&current.name).await {
                Ok(file) => current = file,
                Err(e) => {
                    warn!(error = %e, name = %current.name, "File status check failed");
                }
            }
        }
    }

    /// Primary model first; a 4xx response retries once against the
    /// fallback model. 5xx and transport failures propagate unchanged.
    async fn generate_with_fallback(
        &self,
        request: &GenerateRequest,
    ) -> Result<(GenerateResponse, String), GeminiError> {
        match self.gemini.generate(&self.primary_model, request).await {
            Ok(response) => Ok((response, self.primary_model.clone())),
            Err(e) if e.is_client_error() => {
                warn!(
                    error = %e,
                    model = %self.primary_model,
                    "Primary model rejected request, retrying with fallback model"
                );
                let response = self.gemini.generate(&self.fallback_model, request).await?;
                Ok((response, self.fallback_model.clone()))
            }
            Err(e) => Err(e),
        }
    }
}

/// Illustrative result returned when the live analysis chain fails end to
/// end, so the client never lands on a dead-end screen. Activation is logged
/// by the caller; this path is never taken for a missing credential.
pub fn fallback_result() -> AnalysisResult {
    AnalysisResult {
        main_claim: "Drinking lemon water prevents viral infections".to_string(),
        verdict: Verdict::Misleading,
        explanation: "There is no strong clinical evidence that lemon water prevents viral \
                      infections. Hydration is helpful, and vitamin C supports immunity, but it \
                      does not prevent infection."
            .to_string(),
        confidence: 0.62,
        sources: vec![
            Source {
                title: "WHO: Nutrition and immunity".to_string(),
                url: "https://www.who.int/".to_string(),
                publisher: Some("WHO".to_string()),
            },
            Source {
                title: "CDC: Preventing Viral Infections".to_string(),
                url: "https://www.cdc.gov/".to_string(),
                publisher: Some("CDC".to_string()),
            },
        ],
        model_used: None,
        api_version: None,
    }
}
