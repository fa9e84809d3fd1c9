use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};
use tracing::{info, warn};

use curefact_common::CureFactError;

use crate::AppState;

fn error_body(status: StatusCode, error: &CureFactError) -> axum::response::Response {
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

/// Resolve a social-media post URL to a direct media URL. Validation
/// failures are rejected before the subprocess is ever invoked.
pub async fn fetch_media(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let Some(url) = body.get("url").and_then(Value::as_str) else {
        let err = CureFactError::Validation("url is required".to_string());
        return error_body(StatusCode::BAD_REQUEST, &err);
    };

    if let Err(message) = validate_public_url(url) {
        let err = CureFactError::Validation(message.to_string());
        return error_body(StatusCode::BAD_REQUEST, &err);
    }

    info!(url, "Resolving media URL");
    match state.resolver.resolve(url).await {
        Ok(media) => Json(json!({
            "downloadUrl": media.direct_url,
            "headers": media.http_headers,
        }))
        .into_response(),
        Err(e) => {
            let err = CureFactError::Resolution(e.to_string());
            warn!(error = %err, "Media resolution failed");
            error_body(StatusCode::UNPROCESSABLE_ENTITY, &err)
        }
    }
}

/// Fact-check a resolved video. Always answers 200 with a well-formed
/// result once validation and configuration checks pass; the analyzer
/// degrades internally rather than erroring.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let video_url = body.get("videoUrl").and_then(Value::as_str);
    let original_url = body.get("originalUrl").and_then(Value::as_str);
    let (Some(video_url), Some(original_url)) = (video_url, original_url) else {
        let err = CureFactError::Validation("videoUrl and originalUrl are required".to_string());
        return error_body(StatusCode::BAD_REQUEST, &err);
    };

    info!(original_url, "Analyzing video");
    match state
        .analyzer
        .analyze(video_url, original_url, &HashMap::new())
        .await
    {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            warn!(error = %e, "Analysis request rejected");
            error_body(StatusCode::UNPROCESSABLE_ENTITY, &e)
        }
    }
}

/// Validate a caller-supplied URL: parse, enforce scheme, reject
/// private/loopback targets, enforce max length.
pub fn validate_public_url(url: &str) -> Result<(), &'static str> {
    if url.len() > 2048 {
        return Err("URL too long (max 2048 characters)");
    }
    let parsed = url::Url::parse(url).map_err(|_| "Invalid URL")?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err("URL must use http or https scheme");
    }
    if let Some(host) = parsed.host_str() {
        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            if is_private_ip(ip) {
                return Err("URLs pointing to private or loopback addresses are not allowed");
            }
        }
        let lower = host.to_lowercase();
        if lower == "localhost" || lower.ends_with(".local") || lower.ends_with(".internal") {
            return Err("URLs pointing to internal hosts are not allowed");
        }
    }
    Ok(())
}

/// Check if an IP address is loopback, link-local, or in a private range
/// (RFC 1918 / RFC 4193).
fn is_private_ip(ip: std::net::IpAddr) -> bool {
    match ip {
        std::net::IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_link_local()
                || v4.octets()[0] == 10
                || (v4.octets()[0] == 172 && (16..=31).contains(&v4.octets()[1]))
                || (v4.octets()[0] == 192 && v4.octets()[1] == 168)
                || (v4.octets()[0] == 169 && v4.octets()[1] == 254) // metadata endpoint
        }
        std::net::IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{router, AppState};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use curefact_analyzer::Analyzer;
    use curefact_common::{Config, MediaReference};
    use tower::ServiceExt;
    use ytdlp_client::MediaResolver;

    // --- validate_public_url tests ---

    #[test]
    fn accepts_public_https_urls() {
        assert!(validate_public_url("https://www.instagram.com/reel/ABC/").is_ok());
        assert!(validate_public_url("http://cdn.example/video.mp4").is_ok());
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(validate_public_url("ftp://example.com/file").is_err());
        assert!(validate_public_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn rejects_unparseable_urls() {
        assert!(validate_public_url("not a url").is_err());
    }

    #[test]
    fn rejects_internal_hosts() {
        assert!(validate_public_url("http://localhost:3001/x").is_err());
        assert!(validate_public_url("http://service.internal/x").is_err());
        assert!(validate_public_url("http://printer.local/x").is_err());
    }

    #[test]
    fn rejects_private_and_loopback_addresses() {
        assert!(validate_public_url("http://127.0.0.1/x").is_err());
        assert!(validate_public_url("http://10.0.0.5/x").is_err());
        assert!(validate_public_url("http://172.16.1.1/x").is_err());
        assert!(validate_public_url("http://192.168.1.1/x").is_err());
        assert!(validate_public_url("http://169.254.169.254/latest/meta-data").is_err());
    }

    #[test]
    fn rejects_over_long_urls() {
        let url = format!("https://example.com/{}", "a".repeat(2048));
        assert!(validate_public_url(&url).is_err());
    }

    // --- route tests ---

    /// Proves the 400 paths never reach the resolver.
    struct PanickingResolver;

    #[async_trait]
    impl MediaResolver for PanickingResolver {
        async fn resolve(&self, _source_url: &str) -> anyhow::Result<MediaReference> {
            panic!("resolver must not be invoked for invalid requests");
        }
    }

    struct FailingResolver;

    #[async_trait]
    impl MediaResolver for FailingResolver {
        async fn resolve(&self, _source_url: &str) -> anyhow::Result<MediaReference> {
            anyhow::bail!("ERROR: Unsupported URL")
        }
    }

    fn test_state(resolver: Arc<dyn MediaResolver>, api_key: &str) -> Arc<AppState> {
        let config = Config {
            google_api_key: api_key.to_string(),
            primary_model: "gemini-1.5-flash".to_string(),
            fallback_model: "gemini-1.5-pro".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            ytdlp_bin_dir: "./bin".to_string(),
        };
        let analyzer = Analyzer::new(&config, resolver.clone());
        Arc::new(AppState { resolver, analyzer })
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = router(test_state(Arc::new(PanickingResolver), ""));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn fetch_media_without_url_is_400_and_skips_the_subprocess() {
        let app = router(test_state(Arc::new(PanickingResolver), ""));
        let response = app.oneshot(post("/api/fetch-media", "{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn fetch_media_with_non_string_url_is_400() {
        let app = router(test_state(Arc::new(PanickingResolver), ""));
        let response = app
            .oneshot(post("/api/fetch-media", r#"{"url": 5}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn fetch_media_rejects_internal_targets() {
        let app = router(test_state(Arc::new(PanickingResolver), ""));
        let response = app
            .oneshot(post("/api/fetch-media", r#"{"url": "http://localhost/x"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn fetch_media_resolution_failure_is_422_with_an_error() {
        let app = router(test_state(Arc::new(FailingResolver), ""));
        let response = app
            .oneshot(post(
                "/api/fetch-media",
                r#"{"url": "https://www.instagram.com/reel/ABC/"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert!(!body["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn analyze_with_missing_fields_is_400() {
        let app = router(test_state(Arc::new(PanickingResolver), ""));
        let response = app
            .oneshot(post("/api/analyze", r#"{"videoUrl": "https://cdn.example/v.mp4"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn analyze_without_credential_is_422() {
        let app = router(test_state(Arc::new(PanickingResolver), ""));
        let response = app
            .oneshot(post(
                "/api/analyze",
                r#"{"videoUrl": "https://cdn.example/v.mp4", "originalUrl": "https://instagram.com/reel/ABC"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("GOOGLE_API_KEY"));
    }
}
