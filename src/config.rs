//! Run configuration, read from a TOML file (default `locsync.toml`).
//!
//! ```toml
//! source_language = "english"
//! source_code = "EN"
//! localization_root = "localization"
//!
//! [targets]
//! french = "FR"
//! braz_por = "PT-BR"
//!
//! [providers]
//! entries = "deepl"
//! title = "llm"
//! description = "llm"
//!
//! [llm]
//! endpoint = "https://api.openai.com/v1"
//! model = "gpt-4o-mini"
//!
//! [workshop]
//! description = "assets/workshop/workshop-description.txt"
//! metadata = ".metadata/metadata.json"
//! translations_dir = "assets/workshop/translations"
//! ```
//!
//! Relative paths are resolved against the directory holding the file.
//! Credentials never live here; they come from `DEEPL_API_KEY` and
//! `LLM_API_KEY`.

use crate::error::{SyncError, SyncResult};
use crate::language::Language;
use crate::mt::{
    DeepLProvider, LlmProvider, MachineTranslator, MockMode, MockTranslator, ProviderKind,
    validate_locale,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "locsync.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Folder and header name of the source language, e.g. `english`
    pub source_language: String,
    /// Provider code of the source language, e.g. `EN`
    pub source_code: String,
    pub localization_root: PathBuf,
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    /// Target folder name -> provider language code
    pub targets: BTreeMap<String, String>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub workshop: Option<WorkshopConfig>,
}

/// Which backend serves each asset class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    #[serde(default = "default_provider")]
    pub entries: ProviderKind,
    #[serde(default = "default_provider")]
    pub title: ProviderKind,
    #[serde(default = "default_provider")]
    pub description: ProviderKind,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Overrides the built-in prompt; `{language}` is replaced by the target's name
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkshopConfig {
    /// Long-form description source text
    pub description: PathBuf,
    /// JSON file whose `name` field is the title
    pub metadata: PathBuf,
    /// Where `title_<lang>.txt` / `description_<lang>.txt` are written
    pub translations_dir: PathBuf,
    #[serde(default)]
    pub template: Option<PathBuf>,
    /// Numeric id of the published item, substituted for `{workshop_id}`
    #[serde(default)]
    pub item_id: Option<String>,
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".metadata/translation-cache.json")
}

fn default_provider() -> ProviderKind {
    ProviderKind::Deepl
}

fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            entries: default_provider(),
            title: default_provider(),
            description: default_provider(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            system_prompt: None,
            temperature: default_temperature(),
        }
    }
}

impl SyncConfig {
    /// Read, parse, resolve and validate the config at `path`
    pub fn load(path: &Path) -> SyncResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| SyncError::io(path, e))?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let config = Self::from_toml(&text, base)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML text, resolving relative paths against `base`
    pub fn from_toml(text: &str, base: &Path) -> SyncResult<Self> {
        let mut config: SyncConfig = toml::from_str(text)
            .map_err(|e| SyncError::config(format!("invalid configuration: {}", e)))?;
        config.resolve_paths(base);
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.localization_root);
        resolve(&mut self.cache_path);
        if let Some(workshop) = self.workshop.as_mut() {
            resolve(&mut workshop.description);
            resolve(&mut workshop.metadata);
            resolve(&mut workshop.translations_dir);
            if let Some(template) = workshop.template.as_mut() {
                resolve(template);
            }
        }
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.targets.is_empty() {
            return Err(SyncError::config("no target languages configured"));
        }
        validate_locale(&self.source_code)?;
        for (name, code) in &self.targets {
            if name == &self.source_language {
                return Err(SyncError::config(format!(
                    "target '{}' is the source language",
                    name
                )));
            }
            validate_locale(code)?;
        }
        Ok(())
    }

    pub fn source(&self) -> Language {
        Language::new(&self.source_language, &self.source_code)
    }

    pub fn targets(&self) -> Vec<Language> {
        self.targets
            .iter()
            .map(|(name, code)| Language::new(name, code))
            .collect()
    }

    /// Build the provider for one asset class
    pub fn provider(&self, kind: ProviderKind) -> SyncResult<Box<dyn MachineTranslator>> {
        let provider: Box<dyn MachineTranslator> = match kind {
            ProviderKind::Deepl => Box::new(DeepLProvider::from_env()?),
            ProviderKind::Llm => {
                let mut llm = LlmProvider::from_env(&self.llm.endpoint, &self.llm.model)?
                    .with_temperature(self.llm.temperature);
                if let Some(prompt) = &self.llm.system_prompt {
                    llm = llm.with_system_prompt(prompt);
                }
                Box::new(llm)
            }
            ProviderKind::Mock => Box::new(MockTranslator::new(MockMode::Suffix)),
        };
        Ok(provider)
    }
}
