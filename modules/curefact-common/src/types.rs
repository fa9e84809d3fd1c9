use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Verdict on a fact-checked health claim.
///
/// These four strings are the only verdicts a client ever sees; any other
/// value in model output fails deserialization and routes the response into
/// the synthesized fallback instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Accurate,
    Misleading,
    False,
    Unverified,
}

/// A supporting source cited in an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
}

/// Canonical analysis output rendered by the client.
///
/// Invariants: `verdict` is one of the four enumerated values, `sources` is
/// always an array (possibly empty), `confidence` is finite and in [0, 1]
/// after `normalize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub main_claim: String,
    pub verdict: Verdict,
    pub explanation: String,
    pub confidence: f64,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

impl AnalysisResult {
    /// Clamp `confidence` into [0, 1], mapping non-finite values to 0.
    pub fn normalize(mut self) -> Self {
        if !self.confidence.is_finite() {
            self.confidence = 0.0;
        }
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self
    }
}

/// Direct media location resolved from a social-media post URL, plus any
/// headers the origin CDN requires. Ephemeral; lives for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaReference {
    pub source_url: String,
    pub direct_url: String,
    #[serde(default)]
    pub http_headers: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_serializes_to_enumerated_strings() {
        assert_eq!(serde_json::to_string(&Verdict::Accurate).unwrap(), "\"Accurate\"");
        assert_eq!(serde_json::to_string(&Verdict::Misleading).unwrap(), "\"Misleading\"");
        assert_eq!(serde_json::to_string(&Verdict::False).unwrap(), "\"False\"");
        assert_eq!(serde_json::to_string(&Verdict::Unverified).unwrap(), "\"Unverified\"");
    }

    #[test]
    fn verdict_rejects_unknown_strings() {
        assert!(serde_json::from_str::<Verdict>("\"True\"").is_err());
        assert!(serde_json::from_str::<Verdict>("\"accurate\"").is_err());
    }

    #[test]
    fn analysis_result_uses_camel_case_wire_names() {
        let result = AnalysisResult {
            main_claim: "Claim".to_string(),
            verdict: Verdict::Unverified,
            explanation: "Explanation".to_string(),
            confidence: 0.5,
            sources: Vec::new(),
            model_used: Some("gemini-1.5-flash".to_string()),
            api_version: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("mainClaim").is_some());
        assert!(json.get("modelUsed").is_some());
        // Absent bookkeeping fields are omitted, not null
        assert!(json.get("apiVersion").is_none());
        assert_eq!(json["sources"], serde_json::json!([]));
    }

    #[test]
    fn analysis_result_parses_without_optional_fields() {
        let json = r#"{
            "mainClaim": "X cures Y",
            "verdict": "False",
            "explanation": "No evidence.",
            "confidence": 0.9
        }"#;
        let result: AnalysisResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.verdict, Verdict::False);
        assert!(result.sources.is_empty());
        assert!(result.model_used.is_none());
    }

    #[test]
    fn normalize_clamps_confidence() {
        let base = AnalysisResult {
            main_claim: String::new(),
            verdict: Verdict::Unverified,
            explanation: String::new(),
            confidence: 1.7,
            sources: Vec::new(),
            model_used: None,
            api_version: None,
        };
        assert_eq!(base.clone().normalize().confidence, 1.0);

        let mut below = base.clone();
        below.confidence = -0.3;
        assert_eq!(below.normalize().confidence, 0.0);

        let mut nan = base;
        nan.confidence = f64::NAN;
        assert_eq!(nan.normalize().confidence, 0.0);
    }

    #[test]
    fn media_reference_headers_default_to_empty() {
        let json = r#"{"sourceUrl": "https://a", "directUrl": "https://b"}"#;
        let media: MediaReference = serde_json::from_str(json).unwrap();
        assert!(media.http_headers.is_empty());
    }
}
