//! Incremental machine translation for Paradox-style localization trees.
//!
//! A run reads every `*_l_<source>.yml` under `<root>/<source>/`, works out
//! from a fingerprint cache which values changed since the last run, and
//! patches only those into each `<root>/<target>/` file. Structural tokens
//! inside values (`$VAR$`, `[Scope.GetName]`, `@icon!`, `#bold#!`, `\n`) are
//! masked before a provider sees them and restored afterwards.
//!
//! The same machinery translates the published item's title and description.

use tracing::{debug, info};

pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod guard;
pub mod language;
pub mod merge;
pub mod mt;
pub mod parser;
pub mod sync;
pub mod workshop;


pub use cache::FingerprintCache;
pub use config::SyncConfig;
pub use entry::{Entry, EntryState, Line, LineKind, ResourceFile};
pub use error::{SyncError, SyncResult};
pub use language::Language;
pub use merge::{MergeEngine, MergeOutcome, MergeStats};
pub use parser::{ParseRole, Parser, parse_source, parse_target};
pub use sync::{SyncReport, TreeSync};
pub use workshop::{WorkshopAssets, WorkshopReport, WorkshopTranslator};

/// What a run should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub entries: bool,
    pub workshop: bool,
    /// Replace every provider with the offline mock and leave the tree and
    /// the cache untouched
    pub mock: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            entries: true,
            workshop: true,
            mock: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub entries: Option<SyncReport>,
    pub workshop: Option<WorkshopReport>,
}

/// Run the configured sync: resource entries first, then the workshop assets.
pub async fn run(config: &SyncConfig, options: RunOptions) -> SyncResult<RunReport> {
    let source = config.source();
    let targets = config.targets();
    let provider = |kind| {
        let kind = if options.mock { mt::ProviderKind::Mock } else { kind };
        config.provider(kind)
    };

    let mut cache = FingerprintCache::load(&config.cache_path);
    let mut report = RunReport::default();
    if options.mock {
        info!("Mock run: nothing will be written");
    }

    if options.entries {
        let translator = provider(config.providers.entries)?;
        info!(
            "Translating {} -> {} with {}",
            source.name,
            targets
                .iter()
                .map(|t| t.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            translator.provider_name()
        );
        let tree = TreeSync::new(
            &config.localization_root,
            source.clone(),
            targets.clone(),
            translator.as_ref(),
            &config.cache_path,
        )
        .with_dry_run(options.mock);
        report.entries = Some(tree.run(&mut cache).await?);
    }

    match config.workshop.as_ref().filter(|_| options.workshop) {
        Some(workshop_config) => {
            let assets = WorkshopAssets::load(workshop_config)?;
            let title_translator = provider(config.providers.title)?;
            let description_translator = provider(config.providers.description)?;
            let translator = WorkshopTranslator::new(
                title_translator.as_ref(),
                description_translator.as_ref(),
                &source,
            )
            .with_dry_run(options.mock);
            let out_dir = &workshop_config.translations_dir;
            report.workshop = Some(translator.sync(&assets, &targets, out_dir, &mut cache).await?);
            if !options.mock {
                cache.save(&config.cache_path)?;
            }
        }
        None if options.workshop => debug!("No [workshop] section, skipping title/description"),
        None => {}
    }

    Ok(report)
}
