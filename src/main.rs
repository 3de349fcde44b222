use clap::{Arg, ArgAction, Command};
use locsync::config::DEFAULT_CONFIG_FILE;
use locsync::{RunOptions, SyncConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let matches = Command::new("locsync")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Incrementally machine-translate a Paradox localization tree")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Path to the configuration file")
                .default_value(DEFAULT_CONFIG_FILE),
        )
        .arg(
            Arg::new("entries-only")
                .long("entries-only")
                .help("Only translate localization entries")
                .action(ArgAction::SetTrue)
                .conflicts_with("workshop-only"),
        )
        .arg(
            Arg::new("workshop-only")
                .long("workshop-only")
                .help("Only translate the workshop title and description")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("mock")
                .long("mock")
                .short('m')
                .help("Use the mock translator instead of real providers")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Log every per-file decision")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let level = if matches.get_flag("verbose") { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let options = RunOptions {
        entries: !matches.get_flag("workshop-only"),
        workshop: !matches.get_flag("entries-only"),
        mock: matches.get_flag("mock"),
    };

    let config = match SyncConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match locsync::run(&config, options).await {
        Ok(report) => {
            if let Some(entries) = report.entries {
                info!(
                    "Done: {} file(s), {} written, {} translated, {} copied, {} locked, {} pruned, {} placeholder(s) restored, {} key(s) to retry",
                    entries.files,
                    entries.written,
                    entries.translated,
                    entries.copied,
                    entries.locked,
                    entries.pruned,
                    entries.restored,
                    entries.failed_keys
                );
                if entries.files_failed > 0 {
                    error!("{} source file(s) could not be processed", entries.files_failed);
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
