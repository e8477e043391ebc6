//! Command-line front end for a spellbook store.
//!
//! # Responsibility
//! - Resolve config from an optional TOML file plus flag overrides.
//! - Run one store operation per invocation and print its result.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use spellbook_core::db::migrations::current_version;
use spellbook_core::{
    core_version, init_logging_from_config, DirectoryCatalogSource, SpellbookStore, StoreConfig,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "spellbook",
    version = env!("CARGO_PKG_VERSION"),
    about = "Manage a local spell catalog, spellbooks and profiles."
)]
struct Cli {
    /// TOML config file; defaults apply when omitted.
    #[clap(long, global = true)]
    config: Option<PathBuf>,
    /// Store file, overriding `db_path` from config.
    #[clap(long, global = true)]
    db: Option<PathBuf>,
    /// Absolute directory for rolling log files.
    #[clap(long, global = true)]
    log_dir: Option<PathBuf>,
    /// One of trace|debug|info|warn|error.
    #[clap(long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh catalog spells from the 2014 and 2024 feed files.
    LoadCatalog {
        /// Feed directory, overriding `catalog_dir` from config.
        #[clap(long)]
        dir: Option<PathBuf>,
    },
    /// Print one collection as pretty JSON.
    List {
        #[clap(value_enum)]
        collection: ListTarget,
    },
    /// Write custom spells, spellbooks and profiles as a JSON document.
    Export {
        /// Output file; stdout when omitted.
        #[clap(long)]
        out: Option<PathBuf>,
    },
    /// Insert every record from an export document.
    Import { file: PathBuf },
    /// Print schema version, core version and last-updated marker.
    Status,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ListTarget {
    Spells,
    Spellbooks,
    Profiles,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    init_logging_from_config(&config)?;

    let mut store = SpellbookStore::from_config(&config)
        .with_context(|| format!("cannot open store `{}`", config.db_path.display()))?;
    run(&mut store, &config, cli.command)?;
    store.close()?;
    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if let Some(log_dir) = &cli.log_dir {
        config.log_dir = Some(log_dir.clone());
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

fn run(store: &mut SpellbookStore, config: &StoreConfig, command: Command) -> Result<()> {
    match command {
        Command::LoadCatalog { dir } => {
            let dir = dir.unwrap_or_else(|| config.catalog_dir.clone());
            let report = store.load_catalog(&DirectoryCatalogSource::new(&dir))?;
            println!(
                "inserted={} updated={} skipped_custom={}",
                report.inserted, report.updated, report.skipped_custom
            );
        }
        Command::List { collection } => {
            let text = match collection {
                ListTarget::Spells => serde_json::to_string_pretty(&store.list_spells()?)?,
                ListTarget::Spellbooks => serde_json::to_string_pretty(&store.list_spellbooks()?)?,
                ListTarget::Profiles => serde_json::to_string_pretty(&store.list_profiles()?)?,
            };
            println!("{text}");
        }
        Command::Export { out } => {
            let text = store.export_data()?;
            match out {
                Some(path) => {
                    std::fs::write(&path, text)
                        .with_context(|| format!("cannot write `{}`", path.display()))?;
                    info!("event=cli_export module=cli status=ok path={}", path.display());
                }
                None => println!("{text}"),
            }
        }
        Command::Import { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("cannot read `{}`", file.display()))?;
            let summary = store.import_data(&text)?;
            println!(
                "spells={} spellbooks={} profiles={}",
                summary.spells, summary.spellbooks, summary.profiles
            );
        }
        Command::Status => {
            let marker = store.current_marker()?;
            println!("schema_version={}", current_version(store.connection())?);
            println!("core_version={}", core_version());
            match marker {
                Some(marker) => println!("last_updated={marker}"),
                None => println!("last_updated=never"),
            }
        }
    }
    Ok(())
}
