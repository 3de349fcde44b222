//! Offline provider
//!
//! Deterministic output with no credentials or network, used by the test
//! suite and by `--mock` dry runs.
//!
//! # Example
//!
//! ```ignore
//! use locsync::mt::{MachineTranslator, MockTranslator, MockMode};
//! use locsync::Language;
//!
//! #[tokio::test]
//! async fn test_translation() {
//!     let mock = MockTranslator::new(MockMode::Suffix);
//!     let (en, fr) = (Language::new("english", "EN"), Language::new("french", "FR"));
//!     let result = mock.translate("hello", &[], &en, &fr).await.unwrap();
//!     assert_eq!(result.text, "hello_FR");
//! }
//! ```

use crate::guard::Placeholder;
use crate::language::Language;
use crate::mt::error::{MtError, MtResult};
use crate::mt::translator::{MachineTranslator, Translation};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

static MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[VAR_\d+\]").unwrap());

/// What the mock does with each request
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Append the target code: "hello" → "hello_FR"
    /// Markers pass through untouched
    Suffix,

    /// Look up (masked text, target code); anything unmapped behaves like `Suffix`
    Mappings(HashMap<(String, String), String>),

    /// Reverse the order of whitespace-separated words
    Reorder,

    /// Return the text with every `[VAR_n]` marker removed, like a provider
    /// that silently eats placeholders
    DropPlaceholders,

    /// Fail every call with this message
    Error(String),

    /// Echo the input
    NoOp,
}

/// Provider that never leaves the process.
///
/// Clones share one call counter, so a test can hand a clone to the pipeline
/// and still ask the original how many requests were made.
#[derive(Debug, Clone)]
pub struct MockTranslator {
    mode: MockMode,
    /// Sleep before answering, in milliseconds
    delay_ms: u64,
    calls: Arc<AtomicUsize>,
}

impl MockTranslator {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            delay_ms: 0,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Same as `new`, but every call first sleeps `delay_ms`
    pub fn with_delay(mode: MockMode, delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::new(mode)
        }
    }

    /// Number of `translate` calls made so far, across all clones
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn apply_delay(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }

    fn apply_translation(&self, text: &str, target: &str) -> MtResult<String> {
        match &self.mode {
            MockMode::Suffix => Ok(format!("{}_{}", text, target)),
            MockMode::Mappings(map) => {
                let key = (text.to_string(), target.to_string());
                Ok(map
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| format!("{}_{}", text, target)))
            }
            MockMode::Reorder => {
                let words: Vec<&str> = text.split_whitespace().rev().collect();
                Ok(words.join(" "))
            }
            MockMode::DropPlaceholders => Ok(MARKER.replace_all(text, "").into_owned()),
            MockMode::Error(msg) => Err(MtError::TranslationError(msg.clone())),
            MockMode::NoOp => Ok(text.to_string()),
        }
    }
}

#[async_trait]
impl MachineTranslator for MockTranslator {
    async fn translate(
        &self,
        text: &str,
        placeholders: &[Placeholder],
        _source: &Language,
        target: &Language,
    ) -> MtResult<Translation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;

        let translated = self.apply_translation(text, &target.code)?;
        Ok(Translation::new(translated, placeholders))
    }

    fn provider_name(&self) -> &str {
        "Mock Translator"
    }
}
