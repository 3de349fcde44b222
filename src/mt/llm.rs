//! LLM provider speaking the OpenAI-compatible chat completions protocol
//!
//! The masked text goes out as the user message under a system prompt that
//! names the target language. Free-form generation has no notion of escaped
//! newlines, so any raw line break in the answer is turned back into the
//! literal `\n` sequence the resource format uses.
//!
//! # Authentication
//!
//! The key is read from `LLM_API_KEY`. A provider without a key can still be
//! constructed; every call then fails with [`MtError::ConfigError`], so a
//! misconfigured run degrades to keeping the source text.

use crate::guard::Placeholder;
use crate::language::Language;
use crate::mt::error::{MtError, MtResult};
use crate::mt::retry::{RetryPolicy, retry_with_backoff};
use crate::mt::translator::{MachineTranslator, Translation};
use async_trait::async_trait;
use serde_json::{Value, json};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional video game localizer. \
Translate the user's text into {language}. \
Tokens of the form [VAR_0], [VAR_1], ... are placeholders: copy each one exactly once, unchanged. \
Keep the literal sequence \\n wherever it appears. \
Reply with the translation only, without quotes, notes or explanations.";

pub struct LlmProvider {
    api_key: Option<String>,
    client: reqwest::Client,
    /// Base URL, without the trailing `/chat/completions`
    endpoint: String,
    model: String,
    /// Template with a `{language}` slot
    system_prompt: String,
    temperature: f32,
    retry: RetryPolicy,
}

impl LlmProvider {
    pub fn new(
        api_key: Option<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
    ) -> MtResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| MtError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.2,
            retry: RetryPolicy::default(),
        })
    }

    /// Create an LlmProvider with the key from `LLM_API_KEY`, if set
    pub fn from_env(endpoint: impl Into<String>, model: impl Into<String>) -> MtResult<Self> {
        Self::new(std::env::var("LLM_API_KEY").ok(), endpoint, model)
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn system_message(&self, target: &Language) -> String {
        self.system_prompt.replace("{language}", &target.display_name())
    }

    fn request_body(&self, text: &str, target: &Language) -> Value {
        json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                {"role": "system", "content": self.system_message(target)},
                {"role": "user", "content": text},
            ],
        })
    }

    async fn send(&self, api_key: &str, body: &Value) -> MtResult<String> {
        let url = format!("{}/chat/completions", self.endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(MtError::from_status(status.as_u16(), error_text));
        }

        let json: Value = response.json().await.map_err(|e| {
            MtError::InvalidResponse(format!("Failed to parse API response: {}", e))
        })?;

        extract_content(&json)
    }
}

/// First textual answer in a chat completion. `content` may be a plain
/// string or an array of typed parts; text parts are concatenated.
fn extract_content(json: &Value) -> MtResult<String> {
    let content = &json["choices"][0]["message"]["content"];
    let text = match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part["text"].as_str())
            .collect::<String>(),
        _ => {
            return Err(MtError::InvalidResponse(
                "Invalid API response: missing 'choices[0].message.content'".to_string(),
            ));
        }
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(MtError::InvalidResponse(
            "Invalid API response: empty completion".to_string(),
        ));
    }
    Ok(text.to_string())
}

/// Raw line breaks back to the literal `\n` escape
fn escape_line_breaks(text: &str) -> String {
    text.replace("\r\n", "\\n").replace(['\n', '\r'], "\\n")
}

impl std::fmt::Debug for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmProvider")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl MachineTranslator for LlmProvider {
    async fn translate(
        &self,
        text: &str,
        placeholders: &[Placeholder],
        _source: &Language,
        target: &Language,
    ) -> MtResult<Translation> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            MtError::ConfigError("LLM_API_KEY environment variable not set".to_string())
        })?;

        if text.trim().is_empty() {
            return Ok(Translation::new(text.to_string(), placeholders));
        }

        let body = self.request_body(text, target);
        let answer = retry_with_backoff(&self.retry, "LLM", || self.send(api_key, &body)).await?;

        Ok(Translation::new(escape_line_breaks(&answer), placeholders))
    }

    fn provider_name(&self) -> &str {
        "LLM"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> LlmProvider {
        LlmProvider::new(Some("sk-test".to_string()), "https://llm.example/v1/", "gpt-test").unwrap()
    }

    // ========== Construction Tests ==========

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        assert_eq!(provider().endpoint, "https://llm.example/v1");
    }

    #[test]
    fn test_blank_key_treated_as_missing() {
        let p = LlmProvider::new(Some("  ".to_string()), "http://x", "m").unwrap();
        assert!(p.api_key.is_none());
    }

    #[tokio::test]
    async fn test_missing_key_fails_each_call() {
        let p = LlmProvider::new(None, "http://x", "m").unwrap();
        let en = Language::new("english", "EN");
        let fr = Language::new("french", "FR");
        match p.translate("Hello", &[], &en, &fr).await {
            Err(MtError::ConfigError(msg)) => assert!(msg.contains("LLM_API_KEY")),
            other => panic!("Expected ConfigError, got {:?}", other),
        }
    }

    // ========== Request Tests ==========

    #[test]
    fn test_system_prompt_names_language() {
        let body = provider().request_body("Hello", &Language::new("braz_por", "PT-BR"));
        let system = body["messages"][0]["content"].as_str().unwrap();
        assert!(system.contains("Brazilian Portuguese"));
        assert!(!system.contains("{language}"));
        assert_eq!(body["messages"][1]["content"], "Hello");
        assert_eq!(body["model"], "gpt-test");
    }

    #[test]
    fn test_custom_prompt() {
        let p = provider().with_system_prompt("Into {language}, please.");
        assert_eq!(p.system_message(&Language::new("german", "DE")), "Into German, please.");
    }

    // ========== Response Tests ==========

    #[test]
    fn test_extract_string_content() {
        let json = json!({"choices": [{"message": {"role": "assistant", "content": " Bonjour [VAR_0] \n"}}]});
        assert_eq!(extract_content(&json).unwrap(), "Bonjour [VAR_0]");
    }

    #[test]
    fn test_extract_parts_content() {
        let json = json!({"choices": [{"message": {"content": [
            {"type": "text", "text": "Bon"},
            {"type": "text", "text": "jour"}
        ]}}]});
        assert_eq!(extract_content(&json).unwrap(), "Bonjour");
    }

    #[test]
    fn test_extract_missing_content() {
        let json = json!({"error": {"message": "overloaded"}});
        assert!(matches!(extract_content(&json), Err(MtError::InvalidResponse(_))));
    }

    #[test]
    fn test_escape_line_breaks() {
        assert_eq!(escape_line_breaks("a\nb\r\nc"), "a\\nb\\nc");
    }

    // ========== Debug Tests ==========

    #[test]
    fn test_debug_masks_key() {
        let debug_str = format!("{:?}", provider());
        assert!(debug_str.contains("***"));
        assert!(!debug_str.contains("sk-test"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let p = LlmProvider {
            endpoint: "http://127.0.0.1:9".to_string(),
            ..provider().with_retry(RetryPolicy::none())
        };
        let en = Language::new("english", "EN");
        let fr = Language::new("french", "FR");
        let result = p.translate("Hello", &[], &en, &fr).await;
        assert!(matches!(result, Err(MtError::NetworkError(_))));
    }
}
