//! Merge engine: produce one target-language file from a source file.
//!
//! Without an existing target, every translatable entry is translated and a
//! complete file is built on the source's layout. With one, only what has to
//! change is touched:
//!
//! - source keys whose fingerprint changed are re-translated in place
//! - source keys absent from the target are appended at the end
//! - target keys absent from the source are pruned
//! - the header is forced to exactly one `l_<target>:` line
//!
//! Locked target lines are never rewritten. Every other line, comments and
//! blank lines included, is kept byte-for-byte.

use crate::entry::{Entry, EntryState, LineKind, ResourceFile};
use crate::language::Language;
use crate::mt::{MachineTranslator, translate_protected};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, warn};

/// Result of merging one (source file, target language) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub file: ResourceFile,
    /// False when the merged content equals the existing target
    pub changed: bool,
    pub stats: MergeStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Values obtained from the provider
    pub translated: usize,
    /// Values copied from the source (no-translate or trivial)
    pub copied: usize,
    /// Changed keys left alone because the target line is locked
    pub locked: usize,
    /// Target lines removed because their key left the source
    pub pruned: usize,
    /// Placeholders the provider dropped that had to be put back
    pub restored: usize,
    /// Keys whose translation failed; their previous state was kept
    pub failed: HashSet<String>,
}

/// Merges source files into one target language with one provider
pub struct MergeEngine<'a> {
    translator: &'a dyn MachineTranslator,
    source: &'a Language,
    target: &'a Language,
}

impl<'a> MergeEngine<'a> {
    pub fn new(
        translator: &'a dyn MachineTranslator,
        source: &'a Language,
        target: &'a Language,
    ) -> Self {
        MergeEngine {
            translator,
            source,
            target,
        }
    }

    /// Merge `source` into `existing` (or into nothing, for a new target).
    /// `changed` holds the source keys whose value differs from the last run.
    pub async fn merge(
        &self,
        source: &ResourceFile,
        existing: Option<&ResourceFile>,
        changed: &HashSet<String>,
    ) -> MergeOutcome {
        match existing {
            None => self.create(source).await,
            Some(existing) => self.update(source, existing, changed).await,
        }
    }

    async fn create(&self, source: &ResourceFile) -> MergeOutcome {
        let mut file = source.clone();
        let mut stats = MergeStats::default();
        let mut memo = HashMap::new();

        for index in 0..file.lines.len() {
            let Some(entry) = file.lines[index].entry().cloned() else {
                continue;
            };
            let value = match self.resolve(&entry, &mut memo, &mut stats).await {
                Some(value) => value,
                None => {
                    stats.failed.insert(entry.key.clone());
                    continue;
                }
            };
            if value != entry.value {
                file.replace_entry(index, entry.with_value(&value));
            }
        }
        file.set_header(&self.target.name);

        MergeOutcome {
            file,
            changed: true,
            stats,
        }
    }

    async fn update(
        &self,
        source: &ResourceFile,
        existing: &ResourceFile,
        changed: &HashSet<String>,
    ) -> MergeOutcome {
        let source_keys = source.keys();
        let target_keys = existing.keys();
        let has_missing_keys = source_keys.iter().any(|key| !target_keys.contains(key));
        let has_removed_keys = target_keys.iter().any(|key| !source_keys.contains(key));
        let header_mismatch = existing.header_mismatch(&self.target.name);
        let has_changed_keys = changed.iter().any(|key| source_keys.contains(key.as_str()));

        if !(has_changed_keys || has_missing_keys || has_removed_keys || header_mismatch) {
            debug!("{}: nothing to do", self.target.name);
            return MergeOutcome {
                file: existing.clone(),
                changed: false,
                stats: MergeStats::default(),
            };
        }

        let mut file = existing.clone();
        let mut stats = MergeStats::default();
        let mut memo = HashMap::new();

        if header_mismatch {
            file.set_header(&self.target.name);
        }
        stats.pruned = file.retain_keys(&source_keys);

        let index = file.key_index();
        for entry in unique_entries(source) {
            match index.get(&entry.key) {
                Some(&line) => {
                    if !changed.contains(&entry.key) {
                        continue;
                    }
                    let Some(current) = file.lines[line].entry().cloned() else {
                        continue;
                    };
                    if current.state == EntryState::Locked {
                        debug!("{}: {} is locked, leaving it", self.target.name, entry.key);
                        stats.locked += 1;
                        continue;
                    }
                    match self.resolve(entry, &mut memo, &mut stats).await {
                        Some(value) => file.replace_entry(line, current.with_value(&value)),
                        None => {
                            stats.failed.insert(entry.key.clone());
                        }
                    }
                }
                None => {
                    if entry.state == EntryState::NoTranslate {
                        stats.copied += 1;
                        let raw = source
                            .lines
                            .iter()
                            .rev()
                            .find(|line| line.key() == Some(entry.key.as_str()))
                            .map(|line| line.raw.clone())
                            .unwrap_or_else(|| entry.render());
                        file.push_line(raw, LineKind::Entry(target_entry(entry, &entry.value)));
                        continue;
                    }
                    let value = match self.resolve(entry, &mut memo, &mut stats).await {
                        Some(value) => value,
                        None => {
                            stats.failed.insert(entry.key.clone());
                            entry.value.clone()
                        }
                    };
                    let appended = target_entry(entry, &value);
                    file.push_line(appended.render(), LineKind::Entry(appended));
                }
            }
        }

        let changed = file.render() != existing.render();
        MergeOutcome {
            file,
            changed,
            stats,
        }
    }

    /// The value an entry should carry in the target, or `None` if the
    /// provider failed. Identical values within one file are translated once.
    async fn resolve(
        &self,
        entry: &Entry,
        memo: &mut HashMap<String, String>,
        stats: &mut MergeStats,
    ) -> Option<String> {
        if entry.state == EntryState::NoTranslate {
            stats.copied += 1;
            return Some(entry.value.clone());
        }
        if let Some(value) = memo.get(&entry.value) {
            stats.translated += 1;
            return Some(value.clone());
        }

        match translate_protected(self.translator, &entry.value, self.source, self.target).await {
            Ok(result) => {
                if result.skipped {
                    stats.copied += 1;
                } else {
                    stats.translated += 1;
                }
                if !result.restored.is_empty() {
                    warn!(
                        "{}: {} lost placeholder(s) {}, re-inserted",
                        self.target.name,
                        entry.key,
                        result.restored.join(", ")
                    );
                    stats.restored += result.restored.len();
                }
                memo.insert(entry.value.clone(), result.text.clone());
                Some(result.text)
            }
            Err(e) => {
                error!(
                    "{}: failed to translate {} with {}: {}",
                    self.target.name,
                    entry.key,
                    self.translator.provider_name(),
                    e
                );
                None
            }
        }
    }
}

/// Source entries with duplicate keys collapsed to their last occurrence,
/// ordered by that occurrence
fn unique_entries(source: &ResourceFile) -> Vec<&Entry> {
    let index = source.key_index();
    source
        .lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| {
            let entry = line.entry()?;
            (index.get(&entry.key) == Some(&i)).then_some(entry)
        })
        .collect()
}

/// A source entry rewritten as a plain target line carrying `value`
fn target_entry(source: &Entry, value: &str) -> Entry {
    Entry {
        state: EntryState::Normal,
        ..source.with_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mt::{MockMode, MockTranslator};
    use crate::parser::{parse_source, parse_target};

    fn langs() -> (Language, Language) {
        (Language::new("english", "EN"), Language::new("french", "FR"))
    }

    fn keys(list: &[&str]) -> HashSet<String> {
        list.iter().map(|k| k.to_string()).collect()
    }

    const SOURCE: &str = "\u{feff}l_english:\n # Greetings\n hello: \"Hello\"\n name:0 \"I am $NAME$\" # who\n # NO_TRANSLATE BELOW\n brand: \"Paradox\"\n # NO_TRANSLATE END\n";

    // ========== New Target Tests ==========

    #[tokio::test]
    async fn test_create_translates_everything() {
        let (en, fr) = langs();
        let mock = MockTranslator::new(MockMode::Suffix);
        let engine = MergeEngine::new(&mock, &en, &fr);

        let outcome = engine.merge(&parse_source(SOURCE), None, &HashSet::new()).await;
        assert!(outcome.changed);
        assert_eq!(
            outcome.file.render(),
            "\u{feff}l_french:\n # Greetings\n hello: \"Hello_FR\"\n name:0 \"I am $NAME$_FR\" # who\n # NO_TRANSLATE BELOW\n brand: \"Paradox\"\n # NO_TRANSLATE END\n"
        );
        assert_eq!(outcome.stats.translated, 2);
        assert_eq!(outcome.stats.copied, 1);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_create_failure_keeps_source_value() {
        let (en, fr) = langs();
        let mock = MockTranslator::new(MockMode::Error("down".to_string()));
        let engine = MergeEngine::new(&mock, &en, &fr);

        let outcome = engine.merge(&parse_source(SOURCE), None, &HashSet::new()).await;
        let rendered = outcome.file.render();
        assert!(rendered.contains(" hello: \"Hello\"\n"));
        assert!(rendered.starts_with("\u{feff}l_french:\n"));
        assert_eq!(outcome.stats.failed, keys(&["hello", "name"]));
    }

    #[tokio::test]
    async fn test_create_translates_repeated_values_once() {
        let (en, fr) = langs();
        let mock = MockTranslator::new(MockMode::Suffix);
        let engine = MergeEngine::new(&mock, &en, &fr);
        let source = parse_source("l_english:\n a: \"Yes\"\n b: \"Yes\"\n");

        let outcome = engine.merge(&source, None, &HashSet::new()).await;
        assert_eq!(outcome.file.render(), "l_french:\n a: \"Yes_FR\"\n b: \"Yes_FR\"\n");
        assert_eq!(mock.call_count(), 1);
    }

    // ========== Existing Target Tests ==========

    #[tokio::test]
    async fn test_update_noop_when_nothing_changed() {
        let (en, fr) = langs();
        let mock = MockTranslator::new(MockMode::Suffix);
        let engine = MergeEngine::new(&mock, &en, &fr);
        let source = parse_source("l_english:\n a: \"One\"\n");
        let existing = parse_target("l_french:\n a: \"Un\"\n");

        let outcome = engine.merge(&source, Some(&existing), &HashSet::new()).await;
        assert!(!outcome.changed);
        assert_eq!(outcome.file, existing);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_update_changed_key_only() {
        let (en, fr) = langs();
        let mock = MockTranslator::new(MockMode::Suffix);
        let engine = MergeEngine::new(&mock, &en, &fr);
        let source = parse_source("l_english:\n a: \"One\"\n b: \"Two!\"\n");
        let existing = parse_target("l_french:\n  a:  \"Un\"   # keep me\n b: \"Deux\"\n");

        let outcome = engine.merge(&source, Some(&existing), &keys(&["b"])).await;
        assert!(outcome.changed);
        assert_eq!(
            outcome.file.render(),
            "l_french:\n  a:  \"Un\"   # keep me\n b: \"Two!_FR\"\n"
        );
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_update_respects_lock() {
        let (en, fr) = langs();
        let mock = MockTranslator::new(MockMode::Suffix);
        let engine = MergeEngine::new(&mock, &en, &fr);
        let source = parse_source("l_english:\n a: \"New text\"\n");
        let existing = parse_target("l_french:\n a: \"Texte retouché\" # LOCKED\n");

        let outcome = engine.merge(&source, Some(&existing), &keys(&["a"])).await;
        assert!(!outcome.changed);
        assert_eq!(outcome.file.render(), existing.render());
        assert_eq!(outcome.stats.locked, 1);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_update_appends_missing_and_prunes_removed() {
        let (en, fr) = langs();
        let mock = MockTranslator::new(MockMode::Suffix);
        let engine = MergeEngine::new(&mock, &en, &fr);
        let source = parse_source("l_english:\n new: \"Fresh\"\n a: \"One\"\n");
        let existing = parse_target("l_french:\n a: \"Un\"\n old: \"Vieux\"\n # tail comment");

        let outcome = engine.merge(&source, Some(&existing), &HashSet::new()).await;
        assert_eq!(
            outcome.file.render(),
            "l_french:\n a: \"Un\"\n # tail comment\n new: \"Fresh_FR\"\n"
        );
        assert_eq!(outcome.stats.pruned, 1);
        assert_eq!(outcome.stats.translated, 1);
    }

    #[tokio::test]
    async fn test_update_missing_no_translate_uses_source_line() {
        let (en, fr) = langs();
        let mock = MockTranslator::new(MockMode::Suffix);
        let engine = MergeEngine::new(&mock, &en, &fr);
        let source = parse_source("l_english:\n a: \"One\"\n brand: \"Paradox\" # NO_TRANSLATE\n");
        let existing = parse_target("l_french:\n a: \"Un\"\n");

        let outcome = engine.merge(&source, Some(&existing), &HashSet::new()).await;
        assert_eq!(
            outcome.file.render(),
            "l_french:\n a: \"Un\"\n brand: \"Paradox\" # NO_TRANSLATE\n"
        );
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_update_fixes_header() {
        let (en, fr) = langs();
        let mock = MockTranslator::new(MockMode::Suffix);
        let engine = MergeEngine::new(&mock, &en, &fr);
        let source = parse_source("l_english:\n a: \"One\"\n");
        let existing = parse_target("l_english:\n a: \"Un\"\n");

        let outcome = engine.merge(&source, Some(&existing), &HashSet::new()).await;
        assert!(outcome.changed);
        assert_eq!(outcome.file.render(), "l_french:\n a: \"Un\"\n");
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_update_failure_keeps_existing_line() {
        let (en, fr) = langs();
        let mock = MockTranslator::new(MockMode::Error("quota".to_string()));
        let engine = MergeEngine::new(&mock, &en, &fr);
        let source = parse_source("l_english:\n a: \"One more\"\n b: \"Two\"\n");
        let existing = parse_target("l_french:\n a: \"Un\"\n");

        let outcome = engine.merge(&source, Some(&existing), &keys(&["a", "b"])).await;
        assert_eq!(outcome.file.render(), "l_french:\n a: \"Un\"\n b: \"Two\"\n");
        assert_eq!(outcome.stats.failed, keys(&["a", "b"]));
    }

    #[tokio::test]
    async fn test_update_changed_no_translate_copies_source() {
        let (en, fr) = langs();
        let mock = MockTranslator::new(MockMode::Suffix);
        let engine = MergeEngine::new(&mock, &en, &fr);
        let source = parse_source("l_english:\n# NO_TRANSLATE BELOW\n id: \"v2\"\n");
        let existing = parse_target("l_french:\n# NO_TRANSLATE BELOW\n id: \"v1\"\n");

        let outcome = engine.merge(&source, Some(&existing), &keys(&["id"])).await;
        assert_eq!(
            outcome.file.render(),
            "l_french:\n# NO_TRANSLATE BELOW\n id: \"v2\"\n"
        );
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_update_reinserts_dropped_placeholder() {
        let (en, fr) = langs();
        let mock = MockTranslator::new(MockMode::DropPlaceholders);
        let engine = MergeEngine::new(&mock, &en, &fr);
        let source = parse_source("l_english:\n a: \"Gain $AMOUNT$ gold.\"\n");
        let existing = parse_target("l_french:\n");

        let outcome = engine.merge(&source, Some(&existing), &keys(&["a"])).await;
        assert_eq!(outcome.file.render(), "l_french:\n a: \"Gain gold $AMOUNT$.\"\n");
        assert_eq!(outcome.stats.restored, 1);
    }

    // ========== Helper Tests ==========

    #[test]
    fn test_unique_entries_last_wins() {
        let source = parse_source("l_english:\n a: \"1\"\n b: \"2\"\n a: \"3\"\n");
        let values: Vec<&str> = unique_entries(&source)
            .iter()
            .map(|e| e.value.as_str())
            .collect();
        assert_eq!(values, vec!["2", "3"]);
    }
}
