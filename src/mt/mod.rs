//! Machine Translation Module
//!
//! Provider abstraction for the sync engine. Every backend implements
//! [`MachineTranslator`] and receives text whose structural tokens have
//! already been masked by [`crate::guard`]; [`translate_protected`] wraps a
//! provider call with masking, cleanup and placeholder repair.
//!
//! # Overview
//!
//! 1. **Trait** - `MachineTranslator`, one async `translate` call per value
//! 2. **DeepL** - tag-aware request with a plain-text fallback
//! 3. **LLM** - OpenAI-compatible chat completions
//! 4. **Mock** - deterministic, offline, counts calls
//! 5. **Retry** - bounded exponential backoff on transient failures
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
//!     let french = Language::new("french", "FR");
//!     let result = translate_protected(&provider, "Gain $AMOUNT$ gold from [Root.GetName]", &english, &french).await?;
//!     println!("{}", result.text);
//!     Ok(())
//! }
//! ```
pub mod deepl;
pub mod error;
pub mod llm;
pub mod mock;
pub mod retry;
pub mod translator;

pub use deepl::DeepLProvider;
pub use error::{MtError, MtResult};
pub use llm::{DEFAULT_SYSTEM_PROMPT, LlmProvider};
pub use mock::{MockMode, MockTranslator};
pub use retry::{RetryPolicy, retry_with_backoff};
pub use translator::{
    MachineTranslator, ProtectedTranslation, ProviderKind, Translation, translate_protected,
    validate_locale,
};
