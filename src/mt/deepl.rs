//! DeepL API provider for machine translation
//!
//! Every request is tried twice at most: once with XML tag handling, markers
//! wrapped as inert `<x>` tags so sentence splitting cannot tear them apart,
//! and, only if that result lost a placeholder, once more as plain text with
//! the bracket markers left literal. Whichever result lost fewer placeholders
//! is kept.
//!
//! # Authentication
//!
//! The provider loads the API key from the `DEEPL_API_KEY` environment
//! variable. Free-tier keys (suffix `:fx`) are routed to the free endpoint.
//!
//! # Example
//!
//! ```ignore
//! use locsync::mt::{DeepLProvider, translate_protected};
//! use locsync::Language;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = DeepLProvider::from_env()?;
//!     let english = Language::new("english", "EN");
//!     let german = Language::new("german", "DE");
//!     let result = translate_protected(&provider, "Gain $AMOUNT$ gold", &english, &german).await?;
//!     println!("{}", result.text);
//!     Ok(())
//! }
//! ```

use crate::guard::{self, Placeholder};
use crate::language::Language;
use crate::mt::error::{MtError, MtResult};
use crate::mt::retry::{RetryPolicy, retry_with_backoff};
use crate::mt::translator::{MachineTranslator, Translation, validate_locale};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::future::Future;
use tracing::{debug, warn};

const FREE_API_URL: &str = "https://api-free.deepl.com/v2/translate";
const PRO_API_URL: &str = "https://api.deepl.com/v2/translate";

/// DeepL v2 provider
#[derive(Clone)]
pub struct DeepLProvider {
    /// API key for authentication
    api_key: String,
    /// HTTP client for async requests
    client: reqwest::Client,
    /// Full URL of the translate endpoint
    base_url: String,
    retry: RetryPolicy,
}

impl DeepLProvider {
    /// Maximum characters per string
    const MAX_CHARS_PER_STRING: usize = 30_000;

    /// Create a new DeepLProvider with an explicit API key
    ///
    /// # Returns
    ///
    /// * `Ok(Self)` - New provider instance
    /// * `Err(MtError)` - If API key is empty or HTTP client creation fails
    pub fn new(api_key: String) -> MtResult<Self> {
        if api_key.trim().is_empty() {
            return Err(MtError::ConfigError("API key cannot be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| MtError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = if api_key.trim_end().ends_with(":fx") {
            FREE_API_URL
        } else {
            PRO_API_URL
        };

        Ok(Self {
            api_key,
            client,
            base_url: base_url.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    /// Create a DeepLProvider from the `DEEPL_API_KEY` environment variable
    pub fn from_env() -> MtResult<Self> {
        let api_key = std::env::var("DEEPL_API_KEY").map_err(|_| {
            MtError::ConfigError("DEEPL_API_KEY environment variable not set".to_string())
        })?;

        Self::new(api_key)
    }

    /// Point the provider at a different endpoint (a proxy or a test server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// DeepL wants the source as a bare base code: `PT-BR` -> `PT`, `en` -> `EN`
    fn source_code(code: &str) -> String {
        code.split(['-', '_'])
            .next()
            .unwrap_or(code)
            .to_ascii_uppercase()
    }

    /// Request body for the tag-aware call
    fn tagged_body(text: &str, has_placeholders: bool, source: &str, target: &str) -> Value {
        json!({
            "text": [guard::to_tag_transport(text)],
            "source_lang": Self::source_code(source),
            "target_lang": target.to_ascii_uppercase(),
            "tag_handling": "xml",
            "ignore_tags": ["x"],
            "split_sentences": if has_placeholders { "0" } else { "nonewlines" },
            "preserve_formatting": true,
        })
    }

    /// Request body for the plain-text fallback; markers travel as literal brackets
    fn plain_body(text: &str, source: &str, target: &str) -> Value {
        json!({
            "text": [text],
            "source_lang": Self::source_code(source),
            "target_lang": target.to_ascii_uppercase(),
            "preserve_formatting": true,
        })
    }

    /// Send one request, retrying transient failures, and return the first translation
    async fn request(&self, body: &Value) -> MtResult<String> {
        retry_with_backoff(&self.retry, "DeepL", || self.send(body)).await
    }

    async fn send(&self, body: &Value) -> MtResult<String> {
        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .json(body)
            .send()
            .await?;

        // Check HTTP status
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

        extract_text(&json)
    }
}

/// Pull `translations[0].text` out of a DeepL response
fn extract_text(json: &Value) -> MtResult<String> {
    let text = json["translations"][0]["text"].as_str().ok_or_else(|| {
        MtError::InvalidResponse("Invalid API response: missing 'translations[0].text'".to_string())
    })?;

    if text.trim().is_empty() {
        return Err(MtError::InvalidResponse(
            "Invalid API response: empty translation".to_string(),
        ));
    }

    Ok(text.to_string())
}

/// The tag-aware call, then the plain-text call only if the first lost a
/// placeholder. `request` sends one body and returns the raw translation.
async fn translate_two_pass<F, Fut>(
    text: &str,
    placeholders: &[Placeholder],
    source: &str,
    target: &str,
    request: F,
) -> MtResult<Translation>
where
    F: Fn(Value) -> Fut,
    Fut: Future<Output = MtResult<String>>,
{
    let body = DeepLProvider::tagged_body(text, !placeholders.is_empty(), source, target);
    let tagged_text = guard::from_tag_transport(&request(body).await?);
    let tagged = Translation::new(tagged_text, placeholders);
    if tagged.missing.is_empty() {
        return Ok(tagged);
    }

    debug!(
        "DeepL tag-aware result lost {} placeholder(s), retrying as plain text",
        tagged.missing.len()
    );
    let body = DeepLProvider::plain_body(text, source, target);
    match request(body).await {
        Ok(plain_text) => Ok(choose_fewer_missing(
            tagged,
            Translation::new(plain_text, placeholders),
        )),
        Err(e) => {
            warn!("DeepL plain-text fallback failed, keeping tag-aware result: {}", e);
            Ok(tagged)
        }
    }
}

/// Keep the result that lost fewer placeholders; ties go to `tagged`
fn choose_fewer_missing(tagged: Translation, plain: Translation) -> Translation {
    if plain.missing.len() < tagged.missing.len() {
        plain
    } else {
        tagged
    }
}

impl std::fmt::Debug for DeepLProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepLProvider")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl MachineTranslator for DeepLProvider {
    async fn translate(
        &self,
        text: &str,
        placeholders: &[Placeholder],
        source: &Language,
        target: &Language,
    ) -> MtResult<Translation> {
        validate_locale(&source.code)?;
        validate_locale(&target.code)?;

        if text.trim().is_empty() {
            return Ok(Translation::new(text.to_string(), placeholders));
        }

        if text.len() > Self::MAX_CHARS_PER_STRING {
            return Err(MtError::TranslationError(format!(
                "Text exceeds maximum length of {} characters",
                Self::MAX_CHARS_PER_STRING
            )));
        }

        translate_two_pass(text, placeholders, &source.code, &target.code, |body| async move {
            self.request(&body).await
        })
        .await
    }

    fn provider_name(&self) -> &str {
        "DeepL"
    }
}
