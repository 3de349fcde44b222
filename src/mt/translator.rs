//! Machine Translation trait and utilities
//!
//! This module defines the `MachineTranslator` trait for provider abstraction,
//! so the merge engine and the workshop translator can run against DeepL, an
//! LLM endpoint or the mock without knowing which one they hold.
//!
//! Providers receive text that has already been masked by [`crate::guard`]:
//! every structural token is a `[VAR_n]` marker. They hand back the translated
//! text in the same bracket-marker form together with the indices of any
//! placeholders they lost.
//!
//! # Example
//!
//! ```ignore
//! use locsync::mt::{translate_protected, MockMode, MockTranslator};
//! use locsync::Language;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = MockTranslator::new(MockMode::Suffix);
//!     let english = Language::new("english", "EN");
//!     let french = Language::new("french", "FR");
//!     let result = translate_protected(&provider, "Hello $NAME$", &english, &french).await?;
//!     println!("{}", result.text); // "Hello $NAME$_FR"
//!     Ok(())
//! }
//! ```

use crate::guard::{self, Placeholder};
use crate::language::Language;
use crate::mt::error::{MtError, MtResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What a provider returns for one masked text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Translated text, markers in bracket form
    pub text: String,
    /// Placeholder indices absent from `text`
    pub missing: Vec<usize>,
}

impl Translation {
    pub fn new(text: String, placeholders: &[Placeholder]) -> Self {
        let missing = guard::find_missing(&text, placeholders);
        Translation { text, missing }
    }
}

/// Generic trait for machine translation providers
///
/// All methods are async to support I/O-bound operations like network requests.
#[async_trait]
pub trait MachineTranslator: Send + Sync {
    /// Translate one masked text from `source` to `target`
    ///
    /// # Arguments
    ///
    /// * `text` - Masked text, structural tokens replaced by `[VAR_n]` markers
    /// * `placeholders` - The tokens behind the markers, in marker order
    /// * `source` - Source language
    /// * `target` - Target language
    ///
    /// # Returns
    ///
    /// * `Ok(Translation)` - Translated text plus the indices of lost placeholders
    /// * `Err(MtError)` - The provider could not produce a translation
    async fn translate(
        &self,
        text: &str,
        placeholders: &[Placeholder],
        source: &Language,
        target: &Language,
    ) -> MtResult<Translation>;

    /// Get the name of this translation provider
    ///
    /// Used for logging and for the workshop cache, which re-translates when
    /// the provider behind an asset changes.
    fn provider_name(&self) -> &str;
}

/// Which backend serves an asset class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Deepl,
    Llm,
    Mock,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Deepl => write!(f, "deepl"),
            ProviderKind::Llm => write!(f, "llm"),
            ProviderKind::Mock => write!(f, "mock"),
        }
    }
}

/// A value translated with its placeholders protected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedTranslation {
    /// Final text, every original placeholder present
    pub text: String,
    /// Literal tokens the provider dropped and that were appended back
    pub restored: Vec<String>,
    /// True when the value needed no provider call at all
    pub skipped: bool,
}

/// Mask `value`, translate it, then restore and repair its placeholders.
///
/// Values with nothing translatable (blank, or only tokens and punctuation)
/// are returned unchanged without calling the provider. Placeholders the
/// provider dropped are appended back before any trailing sentence
/// punctuation and reported in `restored`.
pub async fn translate_protected(
    translator: &dyn MachineTranslator,
    value: &str,
    source: &Language,
    target: &Language,
) -> MtResult<ProtectedTranslation> {
    let masked = guard::mask(value);
    if masked.is_trivial() {
        return Ok(ProtectedTranslation {
            text: value.to_string(),
            restored: Vec::new(),
            skipped: true,
        });
    }

    let result = translator
        .translate(&masked.text, &masked.placeholders, source, target)
        .await?;

    let cleaned = guard::cleanup(&result.text);
    let missing = guard::find_missing(&cleaned, &masked.placeholders);
    let unmasked = guard::unmask(&cleaned, &masked.placeholders);
    let repaired = guard::reinsert_missing(&unmasked, &masked.placeholders, &missing);

    let restored = missing
        .iter()
        .filter_map(|i| masked.placeholders.get(*i))
        .map(|p| p.text.clone())
        .collect();

    Ok(ProtectedTranslation {
        text: guard::match_edges(value, &repaired),
        restored,
        skipped: false,
    })
}

/// Validate that a locale code is in acceptable format
///
/// Checks that the locale code contains only alphanumeric characters,
/// hyphens, and underscores.
///
/// # Example
///
/// ```ignore
/// validate_locale("PT-BR")?; // OK
/// validate_locale("invalid@code").unwrap_err(); // Error
/// ```
pub fn validate_locale(locale: &str) -> MtResult<()> {
    if locale.is_empty() {
        return Err(MtError::InvalidLocale("Locale code is empty".to_string()));
    }

    if !locale
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(MtError::InvalidLocale(format!(
            "Invalid characters in locale code: {}",
            locale
        )));
    }

    Ok(())
}
