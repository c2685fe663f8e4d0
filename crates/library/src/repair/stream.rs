use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::repair::error::{ErrorKind as RepairErrorKind, Result as RepairResult};
use crate::repair::health::{Decision, StateFileHealth, VariantHealth};
use crate::{Context, MAX_PROCESS_CONCURRENCY};
use async_stream::stream;
use exn::ResultExt;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt, TryStreamExt};
use revive_torrent::is_valid;
use revive_torrent::state::StateFile;
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

/// Progress events emitted by [`repair`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete), exactly once, with the
///    number of downloads found.
/// 3. [`Checked`](Self::Checked), once per download (or an error if its
///    repaired copies couldn't be written).
/// 4. [`Complete`](Self::Complete), exactly once, with the final counts.
///
/// If the state directory can't be listed the stream ends after a single
/// error and [`Complete`](Self::Complete) is never emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairEvent {
    Started,
    DiscoveryComplete(u64),
    Checked(RepairOutcome),
    Complete(RepairReport),
}

/// What happened to one download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairOutcome {
    pub health: StateFileHealth,
    pub decision: Decision,
}

/// Final counts of a repair run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub total: usize,
    pub healthy: usize,
    pub repaired: usize,
    pub unrecoverable: usize,
    /// Identifiers of the downloads counted as unrecoverable, sorted.
    pub unrecoverable_ids: Vec<String>,
}

/// Streams [`RepairEvent`]s while checking every download in the client's
/// state directory and writing repaired primary/backup pairs into the
/// recovery tree's `active` directory.
///
/// Downloads are checked concurrently, up to [`MAX_PROCESS_CONCURRENCY`] at
/// a time. A download whose repaired copies can't be written is surfaced as
/// an `Err` item (and counted as unrecoverable) without ending the stream.
pub fn repair(ctx: &Context) -> impl Stream<Item = LibraryResult<RepairEvent>> + '_ {
    stream! {
        for await event in repair_inner(ctx) {
            yield event.or_raise(|| LibraryErrorKind::Repair);
        }
    }
}

/// Run [`repair`] to completion, logging per-download failures, and return
/// the final report.
pub async fn repair_all(ctx: &Context) -> LibraryResult<RepairReport> {
    let mut events = std::pin::pin!(repair(ctx));
    let mut failure = None;
    while let Some(event) = events.next().await {
        match event {
            Ok(RepairEvent::Complete(report)) => return Ok(report),
            Ok(_) => {},
            Err(e) => {
                error!(error = ?e, "State file repair failed");
                failure = Some(e);
            },
        }
    }
    // The stream only stops short of a report after a fatal error.
    Err(failure.unwrap_or_else(|| exn::Exn::from(LibraryErrorKind::Repair)))
}

fn repair_inner(ctx: &Context) -> impl Stream<Item = RepairResult<RepairEvent>> + '_ {
    stream!({
        yield Ok(RepairEvent::Started);

        let ids = match collect_ids(ctx).await {
            Ok(ids) => ids,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        // Infallible: a usize (either 32- or 64-bit) will always fit in a u64.
        yield Ok(RepairEvent::DiscoveryComplete(u64::try_from(ids.len()).unwrap_or(0)));
        info!(active = %ctx.active_dir().display(), downloads = ids.len(), "Checking state files");

        let mut report = RepairReport { total: ids.len(), ..RepairReport::default() };
        let mut pending: Vec<_> = ids.into_iter().map(|id| repair_one(ctx, id)).collect();
        let mut processing = FuturesUnordered::new();
        processing.extend(pending.drain(..MAX_PROCESS_CONCURRENCY.min(pending.len())));
        while let Some((id, result)) = processing.next().await {
            match result {
                Ok(outcome) => {
                    match outcome.decision {
                        Decision::Healthy => report.healthy += 1,
                        Decision::Restore(_) => report.repaired += 1,
                        Decision::Unrecoverable => {
                            report.unrecoverable += 1;
                            report.unrecoverable_ids.push(id);
                        },
                    }
                    yield Ok(RepairEvent::Checked(outcome));
                },
                Err(e) => {
                    report.unrecoverable += 1;
                    report.unrecoverable_ids.push(id);
                    yield Err(e);
                },
            }
            if !pending.is_empty() {
                processing.push(pending.remove(0));
            }
        }

        report.unrecoverable_ids.sort();
        info!(
            total = report.total,
            healthy = report.healthy,
            repaired = report.repaired,
            unrecoverable = report.unrecoverable,
            "State file repair finished"
        );
        yield Ok(RepairEvent::Complete(report));
    })
}

/// Every identifier with at least one state file, sorted.
async fn collect_ids(ctx: &Context) -> RepairResult<BTreeSet<String>> {
    let active = ctx.active_dir();
    let files: Vec<_> = ctx.sources.list_stream(&active).try_collect().await.or_raise(|| RepairErrorKind::Discovery)?;
    Ok(files
        .iter()
        .filter(|file| file.is_file())
        .filter_map(|file| file.file_name())
        .filter_map(StateFile::parse)
        .map(|(id, _)| id.to_string())
        .collect())
}

async fn repair_one(ctx: &Context, id: String) -> (String, RepairResult<RepairOutcome>) {
    let result = repair_one_inner(ctx, &id).await;
    (id, result)
}

async fn repair_one_inner(ctx: &Context, id: &str) -> RepairResult<RepairOutcome> {
    let health = check(ctx, id).await;
    let decision = health.decide();
    match decision {
        Decision::Healthy => debug!(%health, "State files are healthy"),
        Decision::Restore(source) => {
            let from = ctx.active_dir().join(source.file_name(id));
            for slot in [StateFile::Primary, StateFile::Backup] {
                let to = ctx.output_active_dir().join(slot.file_name(id));
                ctx.copy_out(&from, &to).await.or_raise(|| RepairErrorKind::Write(id.to_string()))?;
            }
            info!(%health, source = source.suffix(), "Repaired state files");
        },
        Decision::Unrecoverable => warn!(%health, reason = "no valid copy", "Unrecoverable state files"),
    }
    Ok(RepairOutcome { health, decision })
}

async fn check(ctx: &Context, id: &str) -> StateFileHealth {
    let mut health = StateFileHealth::new(id);
    for kind in StateFile::ALL {
        let path = ctx.active_dir().join(kind.file_name(id));
        let variant = match ctx.sources.read(&path).await {
            Ok(data) if is_valid(&data) => VariantHealth::VALID,
            Ok(_) => VariantHealth::INVALID,
            Err(e) if e.is_not_found() => VariantHealth::MISSING,
            Err(e) => {
                warn!(path = %path.display(), error = ?e, "Could not read state file");
                VariantHealth::INVALID
            },
        };
        health.set(kind, variant);
    }
    health
}
