//! Bounded-parallel scheduling of compile tasks.

use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use thiserror::Error;

use super::{CompileContext, CompileResult, NoteCompileError, compile_note};
use crate::index::NoteId;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Worker count used when none is configured.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Compile every note on at most `jobs` worker threads.
///
/// Results come back in the order of `ids`, one per note. A failing or
/// panicking task only affects its own result. `progress(done, total, id)`
/// is called as each task finishes.
pub fn compile_all<F>(
    ids: &[NoteId],
    ctx: &CompileContext<'_>,
    jobs: usize,
    progress: F,
) -> Result<Vec<CompileResult>, SchedulerError>
where
    F: Fn(usize, usize, &NoteId) + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs.max(1)).build()?;
    let total = ids.len();
    let done = AtomicUsize::new(0);

    tracing::info!("compiling {} notes on {} workers", total, jobs.max(1));

    let results = pool.install(|| {
        ids.par_iter()
            .map(|id| {
                let span = tracing::info_span!("note", id = %id);
                let _guard = span.enter();

                let outcome = panic::catch_unwind(AssertUnwindSafe(|| compile_note(id, ctx)))
                    .unwrap_or_else(|payload| Err(NoteCompileError::Panic(panic_message(&*payload))));

                match &outcome {
                    Ok(artifact) => tracing::info!("compiled ({} warnings)", artifact.warnings.len()),
                    Err(e) => tracing::error!("failed: {}", e),
                }

                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                progress(finished, total, id);
                CompileResult { note: id.clone(), outcome }
            })
            .collect::<Vec<_>>()
    });

    Ok(results)
}
