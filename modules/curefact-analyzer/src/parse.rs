use curefact_common::{AnalysisResult, Verdict};

/// Strip markdown code fences from a model response.
pub fn strip_code_fences(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Locate the first top-level `{...}` span: first `{` through the last `}`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Parse a model response into an `AnalysisResult`, tolerating code-fence
/// wrapping and surrounding prose. Returns `None` when no parseable object
/// is present; anything with an un-enumerated verdict or missing required
/// fields lands here too.
pub fn parse_analysis(text: &str) -> Option<AnalysisResult> {
    let json = extract_json_object(strip_code_fences(text))?;
    serde_json::from_str(json).ok()
}

/// Build a result from raw prose when the model did not return JSON: first
/// sentence as the main claim, up to three sentences as the explanation,
/// verdict forced to `Unverified` with zero confidence and no sources.
pub fn synthesize_from_text(text: &str) -> AnalysisResult {
    let sentences: Vec<&str> = text
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let (main_claim, explanation) = if sentences.is_empty() {
        (
            "Unable to extract a specific claim from the response".to_string(),
            "The analysis could not determine the specific health claims in this video. Please review manually.".to_string(),
        )
    } else {
        let joined = sentences.iter().take(3).copied().collect::<Vec<_>>().join(". ");
        (sentences[0].to_string(), format!("{joined}."))
    };

    AnalysisResult {
        main_claim,
        verdict: Verdict::Unverified,
        explanation,
        confidence: 0.0,
        sources: Vec::new(),
        model_used: None,
        api_version: None,
    }
}
