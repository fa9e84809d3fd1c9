use serde::{Deserialize, Serialize};

// =============================================================================
// File resources
// =============================================================================

/// Processing state of an uploaded file, as reported by the provider.
/// Unknown states deserialize to `StateUnspecified` and are treated as
/// still-processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    Processing,
    Active,
    Failed,
    #[serde(other)]
    StateUnspecified,
}

impl Default for FileState {
    fn default() -> Self {
        FileState::Processing
    }
}

/// A file uploaded to the provider's file storage. Discarded after the
/// generation call that references it completes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub state: FileState,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    pub file: UploadedFile,
}

// =============================================================================
// Generation request
// =============================================================================

/// One content part: either inline text or a reference to an uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_data: Option<FileData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), file_data: None }
    }

    pub fn file(mime_type: impl Into<String>, file_uri: impl Into<String>) -> Self {
        Self {
            text: None,
            file_data: Some(FileData {
                mime_type: mime_type.into(),
                file_uri: file_uri.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub mime_type: String,
    pub file_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 2048,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateRequest {
    /// A single-turn request with the default generation config.
    pub fn single_turn(parts: Vec<Part>) -> Self {
        Self {
            contents: vec![Content { parts }],
            generation_config: Some(GenerationConfig::default()),
        }
    }
}

// =============================================================================
// Generation response
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub model_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerateResponse {
    /// First text part of the first candidate, if any.
    pub fn text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .find_map(|part| part.text.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_state_parses_wire_strings() {
        assert_eq!(serde_json::from_str::<FileState>("\"ACTIVE\"").unwrap(), FileState::Active);
        assert_eq!(serde_json::from_str::<FileState>("\"PROCESSING\"").unwrap(), FileState::Processing);
        assert_eq!(serde_json::from_str::<FileState>("\"FAILED\"").unwrap(), FileState::Failed);
    }

    #[test]
    fn file_state_tolerates_unknown_values() {
        let state: FileState = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(state, FileState::StateUnspecified);
    }

    #[test]
    fn uploaded_file_defaults_state_when_missing() {
        let file: UploadedFile =
            serde_json::from_str(r#"{"name": "files/abc", "uri": "https://files/abc"}"#).unwrap();
        assert_eq!(file.state, FileState::Processing);
        assert!(file.mime_type.is_none());
    }

    #[test]
    fn text_part_serializes_without_file_data_key() {
        let json = serde_json::to_value(Part::text("hello")).unwrap();
        assert_eq!(json, serde_json::json!({"text": "hello"}));
    }

    #[test]
    fn file_part_uses_camel_case_wire_names() {
        let json = serde_json::to_value(Part::file("video/mp4", "https://files/abc")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "fileData": {"mimeType": "video/mp4", "fileUri": "https://files/abc"}
            })
        );
    }

    #[test]
    fn response_text_returns_first_text_part() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{
                "candidates": [
                    {"content": {"parts": [{"text": "first"}, {"text": "second"}]}}
                ],
                "modelVersion": "gemini-1.5-flash-002"
            }"#,
        )
        .unwrap();
        assert_eq!(response.text(), Some("first"));
        assert_eq!(response.model_version.as_deref(), Some("gemini-1.5-flash-002"));
    }

    #[test]
    fn response_text_is_none_without_candidates() {
        let response: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(response.text().is_none());
    }
}
