/// Single-turn prompt instructing the model to summarize the video,
/// fact-check only explicit health claims, and answer strictly as an
/// `AnalysisResult`-shaped JSON object.
pub fn fact_check_prompt(original_url: &str, video_url: &str) -> String {
    format!(
        r#"Analyze this social media video for health claims and provide a fact-check assessment.

Original URL: {original_url}
Video URL: {video_url}

Summarize the content first. Fact-check only if explicit health claims are present.

Respond strictly as a JSON object in the following format:

{{
  "mainClaim": "The primary health claim made in the video (1-2 sentences)",
  "verdict": "Accurate|Misleading|False|Unverified",
  "explanation": "Detailed explanation of why this verdict was given (2-4 sentences)",
  "confidence": 0.85,
  "sources": [
    {{
      "title": "Source title",
      "url": "https://source-url.com",
      "publisher": "WHO|CDC|NIH|etc"
    }}
  ]
}}

Guidelines:
- "Accurate": Claim is supported by credible scientific evidence
- "Misleading": Claim has some truth but is exaggerated or missing context
- "False": Claim contradicts established scientific evidence
- "Unverified": Insufficient evidence to determine accuracy
- If no health claim is asserted, use "Unverified" and leave "sources" empty

Focus on health, medical, and wellness claims. Provide 2-4 credible sources (WHO, CDC, NIH, peer-reviewed studies, etc.) when a claim is asserted."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_both_urls_and_the_schema() {
        let prompt = fact_check_prompt("https://instagram.com/reel/ABC", "https://cdn.example/v.mp4");
        assert!(prompt.contains("https://instagram.com/reel/ABC"));
        assert!(prompt.contains("https://cdn.example/v.mp4"));
        assert!(prompt.contains("\"mainClaim\""));
        assert!(prompt.contains("Accurate|Misleading|False|Unverified"));
    }
}
