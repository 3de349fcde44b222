//! Tree driver: walks every source `.yml` under `<root>/<source>/`, merges it
//! into each target language, writes what changed and keeps the fingerprint
//! cache in step.

use crate::cache::{self, FileHashes, FingerprintCache};
use crate::error::{SyncError, SyncResult};
use crate::language::Language;
use crate::merge::MergeEngine;
use crate::mt::MachineTranslator;
use crate::parser::{parse_source, parse_target};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info};

/// Totals for one run over the tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub files: usize,
    /// Source files skipped because of an I/O error
    pub files_failed: usize,
    /// Target files created or rewritten (or that would be, in a dry run)
    pub written: usize,
    pub translated: usize,
    pub copied: usize,
    pub locked: usize,
    pub pruned: usize,
    pub restored: usize,
    /// Keys that failed in at least one target and will be retried next run
    pub failed_keys: usize,
    /// Cache entries dropped because their source file is gone
    pub stale_cache_files: usize,
}

pub struct TreeSync<'a> {
    root: PathBuf,
    source: Language,
    targets: Vec<Language>,
    translator: &'a dyn MachineTranslator,
    cache_path: PathBuf,
    /// Merge and report, but write neither targets nor the cache
    dry_run: bool,
}

impl<'a> TreeSync<'a> {
    pub fn new(
        root: impl Into<PathBuf>,
        source: Language,
        targets: Vec<Language>,
        translator: &'a dyn MachineTranslator,
        cache_path: impl Into<PathBuf>,
    ) -> Self {
        TreeSync {
            root: root.into(),
            source,
            targets,
            translator,
            cache_path: cache_path.into(),
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Process the whole tree. The cache is saved after every source file
    /// and once more after stale entries are dropped, except in a dry run.
    pub async fn run(&self, cache: &mut FingerprintCache) -> SyncResult<SyncReport> {
        let source_dir = self.root.join(&self.source.name);
        if !source_dir.is_dir() {
            return Err(SyncError::config(format!(
                "source directory {} does not exist",
                source_dir.display()
            )));
        }

        let mut report = SyncReport::default();
        let mut present = HashSet::new();

        for path in source_files(&source_dir)? {
            let Ok(rel) = path.strip_prefix(&source_dir) else {
                continue;
            };
            let file_key = cache_key(rel);
            present.insert(file_key.clone());
            report.files += 1;

            match self.sync_file(&path, rel, &file_key, cache, &mut report).await {
                Ok(hashes) => {
                    cache.record_file(&file_key, hashes);
                    if !self.dry_run {
                        cache.save(&self.cache_path)?;
                    }
                }
                Err(e) => {
                    error!("Skipping {}: {}", file_key, e);
                    report.files_failed += 1;
                }
            }
        }

        report.stale_cache_files = cache.retain_files(&present);
        if report.stale_cache_files > 0 && !self.dry_run {
            info!("Dropped {} stale cache entries", report.stale_cache_files);
            cache.save(&self.cache_path)?;
        }

        Ok(report)
    }

    /// Merge one source file into every target; returns the hashes to record
    async fn sync_file(
        &self,
        path: &Path,
        rel: &Path,
        file_key: &str,
        cache: &FingerprintCache,
        report: &mut SyncReport,
    ) -> SyncResult<FileHashes> {
        let text = std::fs::read_to_string(path).map_err(|e| SyncError::io(path, e))?;
        let source_file = parse_source(&text);
        let hashes = cache::file_hashes(&source_file);
        let changed = cache.changed_keys(file_key, &hashes);
        debug!("{}: {} changed key(s)", file_key, changed.len());

        let mut failed = HashSet::new();
        for target in &self.targets {
            let target_path = target_path(&self.root, rel, &self.source, target);
            let existing = match std::fs::read_to_string(&target_path) {
                Ok(text) => Some(parse_target(&text)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(SyncError::io(&target_path, e)),
            };

            let engine = MergeEngine::new(self.translator, &self.source, target);
            let outcome = engine.merge(&source_file, existing.as_ref(), &changed).await;

            if outcome.changed {
                if self.dry_run {
                    info!("Dry run, not writing {}", target_path.display());
                } else {
                    cache::write_atomic(&target_path, outcome.file.render().as_bytes())?;
                }
                report.written += 1;
                info!(
                    "{} -> {}: {} translated, {} copied, {} pruned",
                    file_key,
                    target.name,
                    outcome.stats.translated,
                    outcome.stats.copied,
                    outcome.stats.pruned
                );
            } else {
                debug!("{} -> {}: up to date", file_key, target.name);
            }

            report.translated += outcome.stats.translated;
            report.copied += outcome.stats.copied;
            report.locked += outcome.stats.locked;
            report.pruned += outcome.stats.pruned;
            report.restored += outcome.stats.restored;
            failed.extend(outcome.stats.failed);
        }

        report.failed_keys += failed.len();
        Ok(hashes_to_record(hashes, cache.file(file_key), &failed))
    }
}

/// Every `*.yml` below `dir`, sorted
fn source_files(dir: &Path) -> SyncResult<Vec<PathBuf>> {
    let pattern = format!("{}/**/*.yml", glob::Pattern::escape(&dir.to_string_lossy()));
    let paths = glob::glob(&pattern)
        .map_err(|e| SyncError::config(format!("invalid source pattern '{}': {}", pattern, e)))?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => error!("Cannot read {}: {}", e.path().display(), e.error()),
        }
    }
    files.sort();
    Ok(files)
}

/// Cache key of a source file: its path relative to the source folder, `/`-separated
pub fn cache_key(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// `<root>/<source>/<rel>/name_l_<source>.yml` -> `<root>/<target>/<rel>/name_l_<target>.yml`
pub fn target_path(root: &Path, rel: &Path, source: &Language, target: &Language) -> PathBuf {
    let mut path = root.join(&target.name).join(rel);
    if let Some(name) = rel.file_name().map(|n| n.to_string_lossy().into_owned()) {
        let from = source.tag();
        if let Some(at) = name.rfind(&from) {
            let renamed = format!("{}{}{}", &name[..at], target.tag(), &name[at + from.len()..]);
            path.set_file_name(renamed);
        }
    }
    path
}

/// New fingerprints for a file, except that failed keys keep their previous
/// hash (or stay absent) so the next run retries them
fn hashes_to_record(
    current: FileHashes,
    previous: Option<&FileHashes>,
    failed: &HashSet<String>,
) -> FileHashes {
    current
        .into_iter()
        .filter_map(|(key, hash)| {
            if failed.contains(&key) {
                let old = previous.and_then(|p| p.get(&key)).cloned()?;
                Some((key, old))
            } else {
                Some((key, hash))
            }
        })
        .collect()
}
