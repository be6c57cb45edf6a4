use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::prompt::EXTRACTION_SYSTEM_PROMPT;
use super::{AdapterError, OpenAiClient};
use crate::model::CallAnalysis;

/// Turns a transcript into a structured analysis.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, transcript: &str) -> Result<CallAnalysis, AdapterError>;

    fn model_name(&self) -> &str;
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Extraction through `/v1/chat/completions` in JSON-object response mode.
pub struct ChatExtractor {
    client: OpenAiClient,
    model: String,
}

impl ChatExtractor {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    fn request_body(&self, transcript: &str) -> Value {
        json!({
            "model": self.model,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": EXTRACTION_SYSTEM_PROMPT },
                { "role": "user", "content": transcript },
            ],
        })
    }
}

#[async_trait]
impl Extractor for ChatExtractor {
    async fn extract(&self, transcript: &str) -> Result<CallAnalysis, AdapterError> {
        let response: ChatResponse = self
            .client
            .post_json("/v1/chat/completions", &self.request_body(transcript))
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(AdapterError::MissingContent)?;

        parse_analysis(&content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Parses a model reply into a [`CallAnalysis`].
///
/// The reply must be a JSON object whose sections have the expected shapes;
/// anything else is [`AdapterError::Malformed`].
pub fn parse_analysis(content: &str) -> Result<CallAnalysis, AdapterError> {
    let value: Value = serde_json::from_str(content.trim())
        .map_err(|e| AdapterError::Malformed(format!("not JSON: {}", e)))?;
    if !value.is_object() {
        return Err(AdapterError::Malformed(
            "expected a JSON object".to_string(),
        ));
    }
    let analysis: CallAnalysis =
        serde_json::from_value(value).map_err(|e| AdapterError::Malformed(e.to_string()))?;
    Ok(analysis.normalized())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn test_parse_full_analysis() {
        let analysis = parse_analysis(
            r#"{
                "summary": "Client is refinancing.",
                "key_points": ["Owns a condo", "Wants lower payment"],
                "action_items": ["Pull credit"],
                "loan_info": {"loan_type": "Conventional", "loan_amount": 280000, "term": 15}
            }"#,
        )
        .unwrap();
        assert_eq!(analysis.summary.as_deref(), Some("Client is refinancing."));
        assert_eq!(analysis.key_points.as_ref().map(Vec::len), Some(2));
        let info = analysis.loan_info.unwrap();
        assert_eq!(info.loan_amount, Some(280_000.0));
        assert_eq!(info.term, Some(15));
        assert!(info.rate.is_none());
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let err = parse_analysis("Sure! Here is the summary you asked for.").unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(parse_analysis(r#"["summary"]"#).unwrap_err().is_malformed());
        assert!(parse_analysis("42").unwrap_err().is_malformed());
    }

    #[test]
    fn test_parse_rejects_wrong_section_types() {
        let err = parse_analysis(r#"{"summary": "ok", "key_points": {"a": 1}}"#).unwrap_err();
        assert!(err.is_malformed());
        let err = parse_analysis(r#"{"loan_info": "none"}"#).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_parse_missing_sections_are_absent() {
        let analysis = parse_analysis(r#"{"summary": "Short call.", "loan_info": {}}"#).unwrap();
        assert!(analysis.key_points.is_none());
        assert!(analysis.action_items.is_none());
        assert!(analysis.loan_info.is_none());
    }

    #[test]
    fn test_request_uses_json_mode_and_fixed_prompt() {
        let client =
            OpenAiClient::new("https://api.openai.com", SecretString::from("sk-test")).unwrap();
        let extractor = ChatExtractor::new(client, "gpt-4-turbo-preview");
        let body = extractor.request_body("hello world");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], EXTRACTION_SYSTEM_PROMPT);
        assert_eq!(body["messages"][1]["content"], "hello world");
        assert_eq!(body["model"], "gpt-4-turbo-preview");
    }
}
