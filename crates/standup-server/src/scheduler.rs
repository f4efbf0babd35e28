//! The hourly dispatch loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Duration;
use standup_core::clock::until_next_hour;
use tokio::sync::watch;

use crate::state::AppState;

/// Release stale claims once, then sweep at every top of the hour until
/// `shutdown` flips to `true`.
///
/// The first sweep waits for the next hour boundary unless `catch_up` is set,
/// in which case the hour the process starts in is swept immediately. A sweep
/// in flight when shutdown arrives finishes its current schedule and stops.
/// Hours missed while the process was down are not replayed.
pub async fn run(
    app: AppState,
    stale_claim_after: Duration,
    catch_up: bool,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    recover_stale_claims(&app, stale_claim_after).await?;

    let mut sweep_now = catch_up;
    loop {
        let mut at = app.clock.now();
        if !sweep_now {
            let boundary = at + until_next_hour(at);
            let wait = (boundary - at)
                .to_std()
                .unwrap_or(std::time::Duration::from_secs(3600));
            tracing::debug!(%boundary, "waiting for next sweep");
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => break,
            }
            at = app.clock.now().max(boundary);
        }
        sweep_now = false;

        let stop = Arc::new(AtomicBool::new(false));
        let dispatcher = app.dispatcher.clone();
        let flag = stop.clone();
        let mut sweep = tokio::task::spawn_blocking(move || dispatcher.sweep(at, &flag));

        let mut stopping = false;
        let outcome = tokio::select! {
            res = &mut sweep => res,
            _ = shutdown.changed() => {
                stopping = true;
                stop.store(true, Ordering::SeqCst);
                sweep.await
            }
        };
        match outcome {
            Ok(Ok(report)) => tracing::debug!(?report, "sweep finished"),
            Ok(Err(e)) => tracing::error!(error = %e, "sweep failed"),
            Err(e) => tracing::error!(error = %e, "sweep task panicked"),
        }
        if stopping || *shutdown.borrow() {
            break;
        }
    }

    tracing::info!("scheduler stopped");
    Ok(())
}

async fn recover_stale_claims(app: &AppState, stale_claim_after: Duration) -> anyhow::Result<()> {
    let db = app.db.clone();
    let cutoff = app.clock.now() - stale_claim_after;
    let released = tokio::task::spawn_blocking(move || db.release_stale_claims(cutoff)).await??;
    if released > 0 {
        tracing::warn!(released, %cutoff, "released stale summarization claims");
    }
    Ok(())
}
