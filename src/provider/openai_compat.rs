// src/provider/openai_compat.rs — Generic OpenAI-compatible provider
//
// Talks to any endpoint exposing `POST {base_url}/chat/completions`
// (OpenAI, DeepSeek, Groq, vLLM, Ollama's /v1, OpenRouter, ...).

use async_trait::async_trait;
use std::time::Duration;

use super::{ChatRequest, ChatResponse, ModelProvider, TokenUsage};
use crate::infra::errors::PromptLoopError;

/// Provider for any OpenAI-compatible API endpoint.
pub struct OpenAICompatProvider {
    id_str: String,
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAICompatProvider {
    pub fn new(
        id: impl Into<String>,
        api_key: Option<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PromptLoopError> {
        let id_str = id.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("promptloop/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PromptLoopError::Provider {
                provider: id_str.clone(),
                message: format!("Failed to build HTTP client: {e}"),
                retriable: false,
            })?;
        Ok(Self {
            id_str,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn request_body(request: &ChatRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| serde_json::json!({"role": m.role.as_str(), "content": m.content}))
            .collect();

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        body
    }
}

/// Pull content and usage out of a chat-completions response body.
/// Missing usage counts as zero tokens.
pub(crate) fn parse_completion(
    provider: &str,
    resp: &serde_json::Value,
) -> Result<ChatResponse, PromptLoopError> {
    let content = resp["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| PromptLoopError::Provider {
            provider: provider.to_string(),
            message: "No content in chat completion response".into(),
            retriable: false,
        })?
        .trim()
        .to_string();

    let usage = TokenUsage {
        input_tokens: resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: resp["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    };

    Ok(ChatResponse { content, usage })
}

/// `retry-after` seconds as milliseconds; 0 when absent or not a number.
fn parse_retry_after(header: Option<&str>) -> u64 {
    header
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|secs| secs.saturating_mul(1000))
        .unwrap_or(0)
}

#[async_trait]
impl ModelProvider for OpenAICompatProvider {
    fn id(&self) -> &str {
        &self.id_str
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, PromptLoopError> {
        let body = Self::request_body(&request);

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| PromptLoopError::Provider {
            provider: self.id_str.clone(),
            message: e.to_string(),
            retriable: e.is_timeout() || e.is_connect(),
        })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_ms = parse_retry_after(
                response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok()),
            );
            return Err(PromptLoopError::RateLimited {
                provider: self.id_str.clone(),
                retry_after_ms,
            });
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(PromptLoopError::Provider {
                provider: self.id_str.clone(),
                message: format!("HTTP {status}: {error_body}"),
                retriable: status.is_server_error(),
            });
        }

        let resp: serde_json::Value =
            response.json().await.map_err(|e| PromptLoopError::Provider {
                provider: self.id_str.clone(),
                message: e.to_string(),
                retriable: false,
            })?;

        parse_completion(&self.id_str, &resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Message;

    #[test]
    fn test_request_body_includes_options() {
        let req = ChatRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![Message::system("be brief"), Message::user("hello")],
            max_tokens: Some(256),
            temperature: Some(0.3),
        };
        let body = OpenAICompatProvider::request_body(&req);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["max_tokens"], 256);
        assert!((body["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_request_body_omits_unset_options() {
        let req = ChatRequest {
            model: "m".into(),
            messages: vec![],
            ..Default::default()
        };
        let body = OpenAICompatProvider::request_body(&req);
        assert!(body.get("max_tokens").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_parse_completion_with_usage() {
        let resp = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "  4  "}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        });
        let parsed = parse_completion("openai", &resp).unwrap();
        assert_eq!(parsed.content, "4");
        assert_eq!(parsed.tokens(), 15);
    }

    #[test]
    fn test_parse_completion_without_usage_counts_zero() {
        let resp = serde_json::json!({
            "choices": [{"message": {"content": "ok"}}]
        });
        let parsed = parse_completion("local", &resp).unwrap();
        assert_eq!(parsed.tokens(), 0);
    }

    #[test]
    fn test_parse_completion_missing_content() {
        let resp = serde_json::json!({"choices": []});
        let err = parse_completion("openai", &resp).unwrap_err();
        assert!(!err.is_retriable());
        assert!(err.to_string().contains("No content"));
    }

    #[test]
    fn test_retry_after_header() {
        assert_eq!(parse_retry_after(Some(" 7 ")), 7_000);
        assert_eq!(parse_retry_after(Some("Wed, 21 Oct 2026 07:28:00 GMT")), 0);
        assert_eq!(parse_retry_after(None), 0);
        assert_eq!(parse_retry_after(Some(&u64::MAX.to_string())), u64::MAX);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let p = OpenAICompatProvider::new(
            "x",
            None,
            "http://localhost:8000/v1/",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(p.base_url, "http://localhost:8000/v1");
        assert_eq!(p.id(), "x");
    }
}
