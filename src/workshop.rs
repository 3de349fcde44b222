//! Singleton assets: the published item's title and long description.
//!
//! Both go through the same guard/provider machinery as resource entries but
//! are cached separately, per target language, in the `workshop` part of the
//! fingerprint cache. A cached title is reused until the source title, the
//! title provider or the output template changes; the description works the
//! same way with its own hash and provider. Outputs are re-rendered on every
//! run and written only when their content differs.
//!
//! The description may contain a line with `NO_TRANSLATE BELOW`; only the
//! text above it is translated, the rest is appended verbatim.

use crate::cache::{self, FingerprintCache, hash_value};
use crate::config::WorkshopConfig;
use crate::error::{SyncError, SyncResult};
use crate::language::Language;
use crate::mt::{MachineTranslator, MtResult, translate_protected};
use std::path::Path;
use tracing::{debug, error, info, warn};

pub const DESCRIPTION_MARKER: &str = "NO_TRANSLATE BELOW";
pub const WORKSHOP_ID_VAR: &str = "{workshop_id}";

/// A description split at its no-translate marker line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptionParts {
    /// Text above the marker; the only part sent to a provider
    pub translatable: String,
    /// Text below the marker, copied verbatim into every language
    pub untranslated: String,
}

impl DescriptionParts {
    /// Split `text` at the first line containing [`DESCRIPTION_MARKER`],
    /// dropping the marker line. `{workshop_id}` is replaced when `item_id`
    /// is known.
    pub fn split(text: &str, item_id: Option<&str>) -> Self {
        let text = text.replace("\r\n", "\n");
        let text = match item_id {
            Some(id) => text.replace(WORKSHOP_ID_VAR, id),
            None => text,
        };

        let lines: Vec<&str> = text.split('\n').collect();
        let (head, tail) = match lines.iter().position(|line| line.contains(DESCRIPTION_MARKER)) {
            Some(at) => (&lines[..at], &lines[at + 1..]),
            None => (&lines[..], &lines[lines.len()..]),
        };

        DescriptionParts {
            translatable: head.join("\n").trim_end().to_string(),
            untranslated: tail.join("\n").trim_matches('\n').trim_end().to_string(),
        }
    }

    /// The source description as published in the source language
    pub fn original(&self) -> String {
        join_sections(&self.translatable, &self.untranslated)
    }
}

fn join_sections(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (_, true) => head.to_string(),
        (true, false) => tail.to_string(),
        (false, false) => format!("{}\n\n{}", head, tail),
    }
}

/// Values available to a description template
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    pub title: &'a str,
    pub original_title: &'a str,
    pub description: &'a str,
    pub original_description: &'a str,
    pub untranslated: &'a str,
    pub workshop_id: &'a str,
}

/// Fill `template`, or use the default layout (translated part, blank line,
/// untranslated part) when there is none
pub fn render_description(template: Option<&str>, vars: &TemplateVars) -> String {
    let Some(template) = template else {
        return join_sections(vars.description, vars.untranslated);
    };
    template
        .replace("{title}", vars.title)
        .replace("{original_title}", vars.original_title)
        .replace("{description}", vars.description)
        .replace("{original_description}", vars.original_description)
        .replace("{untranslated}", vars.untranslated)
        .replace(WORKSHOP_ID_VAR, vars.workshop_id)
}

/// Source material for the singleton assets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkshopAssets {
    pub title: String,
    pub description: DescriptionParts,
    pub template: Option<String>,
    pub item_id: Option<String>,
}

impl WorkshopAssets {
    pub fn load(config: &WorkshopConfig) -> SyncResult<Self> {
        let description = read_text(&config.description)?;
        let title = load_title(&config.metadata).unwrap_or_default();
        let template = match &config.template {
            Some(path) => match read_text(path) {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!("Ignoring description template: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(WorkshopAssets {
            title,
            description: DescriptionParts::split(&description, config.item_id.as_deref()),
            template,
            item_id: config.item_id.clone(),
        })
    }
}

fn read_text(path: &Path) -> SyncResult<String> {
    let text = std::fs::read_to_string(path).map_err(|e| SyncError::io(path, e))?;
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// The item title from the metadata JSON `name` field, minus a trailing ` Dev`
pub fn load_title(metadata: &Path) -> Option<String> {
    let text = match read_text(metadata) {
        Ok(text) => text,
        Err(e) => {
            warn!("No title: {}", e);
            return None;
        }
    };
    let json: serde_json::Value = match serde_json::from_str(&text) {
        Ok(json) => json,
        Err(e) => {
            warn!("No title: {} is not valid JSON: {}", metadata.display(), e);
            return None;
        }
    };

    let name = json["name"].as_str()?.trim();
    let name = name.strip_suffix(" Dev").map(str::trim_end).unwrap_or(name);
    (!name.is_empty()).then(|| name.to_string())
}

/// Totals for one workshop pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkshopReport {
    pub titles_translated: usize,
    pub descriptions_translated: usize,
    pub written: usize,
    pub failed: usize,
}

pub struct WorkshopTranslator<'a> {
    title_translator: &'a dyn MachineTranslator,
    description_translator: &'a dyn MachineTranslator,
    source: &'a Language,
    dry_run: bool,
}

impl<'a> WorkshopTranslator<'a> {
    pub fn new(
        title_translator: &'a dyn MachineTranslator,
        description_translator: &'a dyn MachineTranslator,
        source: &'a Language,
    ) -> Self {
        WorkshopTranslator {
            title_translator,
            description_translator,
            source,
            dry_run: false,
        }
    }

    /// Translate and report without writing any output file
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Translate a title; an empty title stays empty without a provider call
    pub async fn translate_title(&self, title: &str, target: &Language) -> MtResult<String> {
        if title.trim().is_empty() {
            return Ok(String::new());
        }
        let result = translate_protected(self.title_translator, title, self.source, target).await?;
        Ok(result.text)
    }

    /// Translate a multi-line description. Line breaks travel as the escaped
    /// `\n` placeholder so the provider cannot merge or drop paragraphs.
    pub async fn translate_description(&self, text: &str, target: &Language) -> MtResult<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let encoded = text.replace("\r\n", "\n").replace('\n', "\\n");
        let result =
            translate_protected(self.description_translator, &encoded, self.source, target)
                .await?;
        Ok(result.text.replace("\\n", "\n"))
    }

    /// Bring `title_<lang>.txt` and `description_<lang>.txt` in `out_dir` up
    /// to date for every target, translating only what the cache lacks.
    pub async fn sync(
        &self,
        assets: &WorkshopAssets,
        targets: &[Language],
        out_dir: &Path,
        cache: &mut FingerprintCache,
    ) -> SyncResult<WorkshopReport> {
        let mut state = cache.workshop.clone().unwrap_or_default();
        let mut report = WorkshopReport::default();

        let title_hash = hash_value(&assets.title);
        let description_hash = hash_value(&assets.description.translatable);
        let template_hash = hash_value(assets.template.as_deref().unwrap_or(""));
        let title_provider = self.title_translator.provider_name();
        let description_provider = self.description_translator.provider_name();

        let template_changed = state.template_hash != template_hash;
        if template_changed {
            debug!("Description template changed");
        }
        if template_changed
            || state.title_hash != title_hash
            || state.title_translator != title_provider
        {
            debug!("Retranslating workshop title");
            state.translations.values_mut().for_each(|t| t.title = None);
        }
        if template_changed
            || state.description_hash != description_hash
            || state.description_translator != description_provider
        {
            debug!("Retranslating workshop description");
            state
                .translations
                .values_mut()
                .for_each(|t| t.description = None);
        }
        state
            .translations
            .retain(|lang, _| targets.iter().any(|t| &t.name == lang));

        state.title_hash = title_hash;
        state.description_hash = description_hash;
        state.template_hash = template_hash;
        state.title_translator = title_provider.to_string();
        state.description_translator = description_provider.to_string();

        let original = assets.description.original();
        let workshop_id = assets.item_id.as_deref().unwrap_or("");

        for target in targets {
            let entry = state.translations.entry(target.name.clone()).or_default();

            if entry.title.is_none() {
                match self.translate_title(&assets.title, target).await {
                    Ok(title) => {
                        entry.title = Some(title);
                        report.titles_translated += 1;
                    }
                    Err(e) => {
                        error!("{}: title translation failed: {}", target.name, e);
                        report.failed += 1;
                    }
                }
            }
            if entry.description.is_none() {
                match self
                    .translate_description(&assets.description.translatable, target)
                    .await
                {
                    Ok(description) => {
                        entry.description = Some(description);
                        report.descriptions_translated += 1;
                    }
                    Err(e) => {
                        error!("{}: description translation failed: {}", target.name, e);
                        report.failed += 1;
                    }
                }
            }

            if let Some(title) = entry.title.as_deref().filter(|t| !t.is_empty()) {
                let path = out_dir.join(format!("title_{}.txt", target.name));
                if write_if_changed(&path, title, self.dry_run)? {
                    report.written += 1;
                }
            }
            if let Some(description) = entry.description.as_deref() {
                let vars = TemplateVars {
                    title: entry.title.as_deref().unwrap_or(&assets.title),
                    original_title: &assets.title,
                    description,
                    original_description: &original,
                    untranslated: &assets.description.untranslated,
                    workshop_id,
                };
                let rendered = render_description(assets.template.as_deref(), &vars);
                if !rendered.trim().is_empty() {
                    let path = out_dir.join(format!("description_{}.txt", target.name));
                    if write_if_changed(&path, &rendered, self.dry_run)? {
                        report.written += 1;
                    }
                }
            }
        }

        cache.workshop = Some(state);
        info!(
            "Workshop: {} title(s) and {} description(s) translated, {} file(s) written",
            report.titles_translated, report.descriptions_translated, report.written
        );
        Ok(report)
    }
}

/// Write `contents` unless the file already holds exactly that; returns
/// whether the file differs. A dry run only logs.
fn write_if_changed(path: &Path, contents: &str, dry_run: bool) -> SyncResult<bool> {
    if std::fs::read_to_string(path).is_ok_and(|current| current == contents) {
        return Ok(false);
    }
    if dry_run {
        info!("Dry run, not writing {}", path.display());
    } else {
        cache::write_atomic(path, contents.as_bytes())?;
    }
    Ok(true)
}
