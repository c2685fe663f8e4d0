mod cli;
mod error;
mod logging;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use revive_bencode::Value;
use revive_cache::{ContentIndex, Database, Repository};
use revive_config::{Config, Settings};
use revive_library::recover::{self, Recovery, RecoveryReport};
use revive_library::{Context, discover, downloads, index, patch, path_from_bytes, repair};
use revive_storage::BackendHandle;
use revive_storage::backend::{LocalBackend, ReadOnlyBackend};
use revive_torrent::state::STATE_DIRECTORY;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    cli.apply(&mut config);
    let settings = config.resolve().or_raise(|| ErrorKind::Config)?;
    logging::init(&settings.log, cli.verbosity())?;
    info!(
        data_dir = %settings.data_dir.display(),
        recovery_dir = %settings.recovery_dir.display(),
        backups = settings.backup_directories.len(),
        "Starting"
    );

    let ctx = prepare(&settings)?;
    match cli.command {
        Command::FixActive => fix_active(&ctx).await,
        Command::Simple => simple(&ctx, &settings).await,
        Command::Advanced => advanced(&ctx, &settings).await,
        Command::Active => active(&ctx, &settings).await,
        Command::Index => build_index(&ctx, &settings).await,
    }
}

/// Create the recovery tree and wire up the storage backends.
fn prepare(settings: &Settings) -> Result<Context> {
    let output = LocalBackend::new("recovery", &settings.recovery_dir).or_raise(|| ErrorKind::Setup)?;
    for dir in [settings.torrents_dir.clone(), PathBuf::from(STATE_DIRECTORY)] {
        std::fs::create_dir_all(settings.recovery_dir.join(dir)).or_raise(|| ErrorKind::Setup)?;
    }
    let root = settings.data_dir.ancestors().last().unwrap_or(&settings.data_dir);
    let sources: BackendHandle = Arc::new(LocalBackend::open("sources", root).or_raise(|| ErrorKind::Setup)?);
    Ok(Context::new(Arc::new(ReadOnlyBackend::new(sources)), Arc::new(output), &settings.data_dir)
        .with_downloads_config(&settings.downloads_config)
        .with_torrents_dir(&settings.torrents_dir))
}

async fn fix_active(ctx: &Context) -> Result<()> {
    let report = repair::repair_all(ctx).await.or_raise(|| ErrorKind::Run)?;
    println!(
        "State files: {} total, {} healthy, {} repaired, {} unrecoverable",
        report.total, report.healthy, report.repaired, report.unrecoverable
    );
    for id in &report.unrecoverable_ids {
        println!("  unrecoverable: {id}");
    }
    Ok(())
}

async fn simple(ctx: &Context, settings: &Settings) -> Result<()> {
    let document = downloads::load_document(ctx).await.or_raise(|| ErrorKind::Run)?;
    let records = downloads::expected_records(ctx, &document).await;
    let backups = discover::backup_roots(&ctx.sources, &settings.backup_directories).await;
    if backups.is_empty() {
        warn!("No backup directories found, only the data directory will be searched");
    }
    let roots = discover::candidate_roots(&ctx.data_dir, &backups, &mut rand::thread_rng());
    let recovery =
        recover::filename::recover(ctx, &records, &roots, settings.simple_workers, settings.queue_capacity)
            .await
            .or_raise(|| ErrorKind::Run)?;
    finish(ctx, settings, document, &records, recovery).await
}

async fn advanced(ctx: &Context, settings: &Settings) -> Result<()> {
    let document = downloads::load_document(ctx).await.or_raise(|| ErrorKind::Run)?;
    let records = downloads::expected_records(ctx, &document).await;
    let built = load_index(ctx, settings).await?;
    let recovery = recover::hash::recover(&records, &built);
    finish(ctx, settings, document, &records, recovery).await
}

async fn active(ctx: &Context, settings: &Settings) -> Result<()> {
    let document = downloads::load_document(ctx).await.or_raise(|| ErrorKind::Run)?;
    let records = downloads::expected_records(ctx, &document).await;
    let recovery = recover::active::recover(ctx, &records).await.or_raise(|| ErrorKind::Run)?;
    finish(ctx, settings, document, &records, recovery).await
}

async fn build_index(ctx: &Context, settings: &Settings) -> Result<()> {
    let index = load_index(ctx, settings).await?;
    let stats = index.stats();
    let built_at = stats.built_at.map_or_else(|| "never".to_string(), |at| at.to_string());
    println!(
        "Content index: built {built_at}, {} directories, {} unique hashes, {} files",
        stats.directories, stats.unique_hashes, stats.entries
    );
    Ok(())
}

/// Build the content index over the data directory and every discovered
/// backup, reusing and extending the stored one. Without a usable database the index is built
/// in memory only.
async fn load_index(ctx: &Context, settings: &Settings) -> Result<ContentIndex> {
    let backups = discover::backup_roots(&ctx.sources, &settings.backup_directories).await;
    let roots = discover::index_roots(&ctx.data_dir, &backups);
    let path = Database::path_in(&settings.recovery_dir);
    match Database::open_in(&settings.recovery_dir).await {
        Ok(db) => {
            let built = index::build_and_persist(ctx, &Repository::from(&db), &roots, settings.index_concurrency)
                .await
                .or_raise(|| ErrorKind::Run)?;
            db.close().await;
            if !built.persisted {
                warn!(path = %path.display(), "Content index was not saved, the next run will scan again");
            }
            Ok(built.index)
        },
        Err(e) => {
            warn!(path = %path.display(), error = ?e, "Could not open content index database");
            index::build(ctx, &roots, settings.index_concurrency, None).await.or_raise(|| ErrorKind::Run)
        },
    }
}

/// Stage the recovered files, write the patched download list and print the
/// report.
async fn finish(
    ctx: &Context,
    settings: &Settings,
    document: Value,
    records: &[downloads::ExpectedRecord],
    mut recovery: Recovery,
) -> Result<()> {
    let outcome = patch::finalize(ctx, document, &mut recovery.mappings).await.or_raise(|| ErrorKind::Run)?;
    let report = RecoveryReport::tally(records, &recovery.mappings);
    println!("Torrents: {report}");
    println!(
        "Staged {} files, rewrote {} entries in {}",
        outcome.staged,
        outcome.rewritten,
        settings.recovery_dir.join(&outcome.output).display()
    );
    for mapping in recovery.mappings.values().filter(|mapping| !mapping.is_applicable()) {
        println!(
            "  not applied: {} ({})",
            path_from_bytes(&mapping.original).display(),
            mapping.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
