//! Recovery by file name.
//!
//! For every missing torrent, look for a file with the same base name in the
//! torrents directory of each candidate root (see
//! [`candidate_roots`](crate::discover::candidate_roots)) and take the first
//! one that decodes.
//!
//! Lookups are spread over a fixed pool of worker tasks fed from a bounded
//! queue. Workers never touch the results: they report back over a channel
//! and the calling task does all the counting.

use crate::downloads::ExpectedRecord;
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::recover::error::{ErrorKind, Result};
use crate::recover::{Mappings, RecoveredMapping, Recovery, candidates, file_name_of};
use crate::{Context, path_from_bytes};
use async_channel as chan;
use exn::ResultExt;
use revive_torrent::is_valid;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

/// One missing torrent, as queued for the workers.
struct Job {
    original: Vec<u8>,
    path: PathBuf,
    file_name: Option<OsString>,
}

/// What a worker sends back. Every job produces exactly one of
/// [`Recovered`](Self::Recovered) or [`Unrecovered`](Self::Unrecovered),
/// followed by [`Completed`](Self::Completed).
enum Message {
    Recovered(RecoveredMapping),
    Unrecovered(Vec<u8>),
    Completed,
}

/// Recover missing torrents by searching `roots` for files with the same
/// name, using `workers` tasks and a work queue holding at most `capacity`
/// jobs.
pub async fn recover(
    ctx: &Context,
    records: &[ExpectedRecord],
    roots: &[PathBuf],
    workers: usize,
    capacity: usize,
) -> LibraryResult<Recovery> {
    recover_inner(ctx, records, roots, workers, capacity).await.or_raise(|| LibraryErrorKind::Recover)
}

#[instrument(skip_all, fields(roots = roots.len(), workers = workers))]
async fn recover_inner(
    ctx: &Context,
    records: &[ExpectedRecord],
    roots: &[PathBuf],
    workers: usize,
    capacity: usize,
) -> Result<Recovery> {
    let jobs: Vec<Job> = candidates(records)
        .map(|record| Job {
            original: record.raw_path.clone(),
            path: record.path.clone(),
            file_name: file_name_of(record),
        })
        .collect();
    let submitted = jobs.len();
    info!(missing = submitted, "Searching backups by file name");

    let roots: Arc<[PathBuf]> = roots.into();
    let (job_tx, job_rx) = chan::bounded::<Job>(capacity.max(1));
    let (message_tx, message_rx) = chan::bounded::<Message>(capacity.max(1));

    let mut tasks = JoinSet::new();
    for id in 0..workers.max(1) {
        tasks.spawn(worker(id, ctx.clone(), roots.clone(), job_rx.clone(), message_tx.clone()));
    }
    // Workers hold the only remaining handles, so the channels close once
    // they've all exited.
    drop(job_rx);
    drop(message_tx);
    tasks.spawn(async move {
        for job in jobs {
            // Only fails once every worker is gone.
            if job_tx.send(job).await.is_err() {
                break;
            }
        }
    });

    let (mut completed, mut recovered, mut unrecovered) = (0usize, 0usize, 0usize);
    let mut mappings = Mappings::new();
    while !(completed == submitted && recovered + unrecovered == completed) {
        match message_rx.recv().await {
            Ok(Message::Recovered(mapping)) => {
                recovered += 1;
                mappings.insert(mapping.original.clone(), mapping);
            },
            Ok(Message::Unrecovered(original)) => {
                unrecovered += 1;
                debug!(path = %path_from_bytes(&original).display(), unrecovered, "Counted unrecoverable torrent");
            },
            Ok(Message::Completed) => completed += 1,
            Err(_) => break,
        }
    }

    while let Some(joined) = tasks.join_next().await {
        joined.or_raise(|| ErrorKind::Worker)?;
    }
    if completed != submitted {
        exn::bail!(ErrorKind::Worker);
    }
    debug!(recovered, unrecovered, "File name search finished");
    Ok(Recovery::new(records, mappings))
}

async fn worker(
    id: usize,
    ctx: Context,
    roots: Arc<[PathBuf]>,
    jobs: chan::Receiver<Job>,
    messages: chan::Sender<Message>,
) {
    while let Ok(job) = jobs.recv().await {
        let found = match &job.file_name {
            Some(name) => find(&ctx, &roots, name).await,
            None => None,
        };
        let outcome = match (found, job.file_name) {
            (Some(source), Some(name)) => {
                debug!(worker = id, path = %job.path.display(), source = %source.display(), "Found backup copy");
                Message::Recovered(RecoveredMapping::new(job.original, name, source))
            },
            _ => {
                warn!(worker = id, path = %job.path.display(), reason = "no valid copy in any backup", "Unrecoverable torrent");
                Message::Unrecovered(job.original)
            },
        };
        if messages.send(outcome).await.is_err() || messages.send(Message::Completed).await.is_err() {
            break;
        }
    }
}

/// First valid `<root>/<torrents>/<name>` over all roots, in order.
async fn find(ctx: &Context, roots: &[PathBuf], name: &OsString) -> Option<PathBuf> {
    for root in roots {
        let candidate = ctx.torrents_dir_of(root).join(name);
        match ctx.sources.read(&candidate).await {
            Ok(data) if is_valid(&data) => return Some(candidate),
            Ok(_) => debug!(path = %candidate.display(), "Backup copy is corrupt"),
            Err(e) if e.is_not_found() => {},
            Err(e) => warn!(path = %candidate.display(), error = ?e, "Could not read backup copy"),
        }
    }
    None
}
