//! Agent client for content generation
//!
//! Wraps the Anthropic Messages API for:
//! - Drafting new content from a generation brief
//! - Revising existing content against reviewer feedback
//! - Producing highlight markup for the annotator

use crate::error::{CalliopeError, Result};
use crate::types::{AnnotationContext, GenerationSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::debug;

/// Configuration for the agent client
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Anthropic API key
    pub api_key: String,

    /// Model to use (default: claude-3-5-haiku-20241022)
    pub model: String,

    /// Max tokens for responses
    pub max_tokens: usize,

    /// Temperature for sampling
    pub temperature: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            model: "claude-3-5-haiku-20241022".to_string(),
            max_tokens: 2048,
            temperature: 0.7,
        }
    }
}

/// Completion boundary used by the pipeline
///
/// Implemented by [`AgentClient`]; tests substitute scripted backends.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send a prompt and return the agent's text response
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Agent client backed by the Anthropic Messages API
pub struct AgentClient {
    config: AgentConfig,
    client: reqwest::Client,
}

/// Anthropic API message format
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: usize,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

/// Anthropic API response format
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    text: String,
}

impl AgentClient {
    /// Create a new agent client with custom config
    pub fn new(config: AgentConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(CalliopeError::Config(config::ConfigError::Message(
                "ANTHROPIC_API_KEY not set".to_string(),
            )));
        }

        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }

    /// Create with default config
    pub fn with_default() -> Result<Self> {
        Self::new(AgentConfig::default())
    }

    /// Make an API call to Claude
    async fn call_api(&self, prompt: &str) -> Result<String> {
        debug!("Calling Anthropic API");

        let request = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CalliopeError::AgentApi(format!(
                "API request failed with status {}: {}",
                status, error_text
            )));
        }

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| CalliopeError::AgentApi(format!("Failed to parse response: {}", e)))?;

        api_response
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or_else(|| CalliopeError::AgentApi("Empty response from API".to_string()))
    }
}

#[async_trait]
impl CompletionBackend for AgentClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.call_api(prompt).await
    }
}

/// Strip markdown code fences from an agent response
///
/// Agents often wrap JSON answers in ```json fences despite instructions not
/// to; the payload parser works on the inner text.
pub fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Parsed generation response
///
/// Generation prompts ask for a JSON object with a `content` field and an
/// optional `data` envelope. Responses that are not valid JSON, or valid JSON
/// without a `content` string, are kept verbatim as plain text.
#[derive(Debug, Clone)]
pub struct GenerationPayload {
    /// The drafted content as plain text
    pub content: String,

    /// The full structured response, when the agent returned one
    pub structured: Option<serde_json::Value>,
}

impl GenerationPayload {
    pub fn from_response(response: &str) -> Self {
        let stripped = extract_json(response);

        match serde_json::from_str::<serde_json::Value>(stripped) {
            Ok(serde_json::Value::Object(map)) => {
                if let Some(content) = map.get("content").and_then(|v| v.as_str()) {
                    return Self {
                        content: content.to_string(),
                        structured: Some(serde_json::Value::Object(map.clone())),
                    };
                }
                Self {
                    content: response.trim().to_string(),
                    structured: None,
                }
            }
            Ok(serde_json::Value::String(s)) => Self {
                content: s,
                structured: None,
            },
            _ => Self {
                content: response.trim().to_string(),
                structured: None,
            },
        }
    }
}

/// Build the prompt for drafting new content
pub fn generation_prompt(spec: &GenerationSpec) -> String {
    let mut prompt = format!(
        r#"You are drafting outbound marketing content.

Brief:
{}
"#,
        spec.brief
    );

    if let Some(audience) = &spec.audience {
        prompt.push_str(&format!("\nTarget audience: {}\n", audience));
    }
    if let Some(instructions) = &spec.instructions {
        prompt.push_str(&format!("\nAdditional instructions:\n{}\n", instructions));
    }
    if !spec.context.is_empty() {
        prompt.push_str("\nWork these in where they fit naturally:\n");
        prompt.push_str(&context_lines(&spec.context));
    }

    prompt.push_str(
        r#"
Respond with JSON only, in this shape:
{"content": "<the full draft as plain text>", "data": {"sections": ["<short section summaries>"]}}
"#,
    );
    prompt
}

/// Build the prompt for revising content against feedback
pub fn refinement_prompt(current: &str, instruction: &str) -> String {
    format!(
        r#"You are revising outbound marketing content against reviewer feedback.

Current content:
{}

Feedback:
{}

Rewrite the content so it addresses the feedback while keeping the original intent and voice.

Respond with JSON only, in this shape:
{{"content": "<the revised draft as plain text>", "data": {{"sections": ["<short section summaries>"]}}}}
"#,
        current, instruction
    )
}

/// Format context entities as labelled lines, skipping empty lists
pub(crate) fn context_lines(context: &AnnotationContext) -> String {
    let mut lines = String::new();
    for (label, values) in [
        ("Personas", &context.personas),
        ("Segments", &context.segments),
        ("Outcomes", &context.outcomes),
        ("Blockers", &context.blockers),
        ("Resources", &context.resources),
    ] {
        if !values.is_empty() {
            lines.push_str(&format!("{}: {}\n", label, values.join(", ")));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_strips_fences() {
        assert_eq!(extract_json("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(extract_json("  plain text  "), "plain text");
    }

    #[test]
    fn test_payload_from_json_object() {
        let payload = GenerationPayload::from_response(
            r#"{"content": "Hello there", "data": {"sections": ["intro"]}}"#,
        );
        assert_eq!(payload.content, "Hello there");
        let structured = payload.structured.unwrap();
        assert_eq!(structured["data"]["sections"][0], "intro");
    }

    #[test]
    fn test_payload_from_fenced_response() {
        let payload =
            GenerationPayload::from_response("```json\n{\"content\": \"Fenced draft\"}\n```");
        assert_eq!(payload.content, "Fenced draft");
        assert!(payload.structured.is_some());
    }

    #[test]
    fn test_payload_plain_text_fallback() {
        let payload = GenerationPayload::from_response("Just a plain draft, no JSON.");
        assert_eq!(payload.content, "Just a plain draft, no JSON.");
        assert!(payload.structured.is_none());
    }

    #[test]
    fn test_payload_object_without_content_falls_back() {
        let payload = GenerationPayload::from_response(r#"{"body": "missing the field"}"#);
        assert_eq!(payload.content, r#"{"body": "missing the field"}"#);
        assert!(payload.structured.is_none());
    }

    #[test]
    fn test_generation_prompt_includes_inputs() {
        let spec = GenerationSpec {
            brief: "Announce the Q3 launch".to_string(),
            audience: Some("Engineering leaders".to_string()),
            instructions: Some("Keep it under 200 words".to_string()),
            context: AnnotationContext {
                personas: vec!["VP of Engineering".to_string()],
                ..Default::default()
            },
        };

        let prompt = generation_prompt(&spec);
        assert!(prompt.contains("Announce the Q3 launch"));
        assert!(prompt.contains("Engineering leaders"));
        assert!(prompt.contains("Keep it under 200 words"));
        assert!(prompt.contains("Personas: VP of Engineering"));
        assert!(prompt.contains("Respond with JSON only"));
    }

    #[test]
    fn test_refinement_prompt_embeds_current_content() {
        let prompt = refinement_prompt("The old draft.", "Make it punchier.");
        assert!(prompt.contains("The old draft."));
        assert!(prompt.contains("Make it punchier."));
    }

    #[tokio::test]
    #[ignore] // Requires ANTHROPIC_API_KEY
    async fn test_live_completion() {
        let client = AgentClient::with_default().unwrap();
        let response = client.complete("Reply with the single word OK").await.unwrap();
        assert!(!response.is_empty());
    }
}
