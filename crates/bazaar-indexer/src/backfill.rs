use alloy::rpc::types::Log;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::chain::{ChainClient, ChainError};
use crate::decode;
use crate::projector::{ProjectError, Projector};
use crate::store::ReplicaStore;

#[derive(Debug, Clone)]
pub struct BackfillOptions {
    /// First block of history when no cursor has been persisted yet.
    pub start_block: u64,
    /// Blocks per log-query window. Shrinks on RangeTooLarge and never
    /// grows back on its own.
    pub window: u64,
    /// Pause between successful windows, to stay under node rate limits.
    pub window_delay: Duration,
    /// Base delay for transient-failure backoff; doubles per consecutive
    /// failure.
    pub retry_delay: Duration,
}

/// Walks historical block ranges from the cursor to the current head, one
/// window in flight at a time. Sequential by construction: parallel
/// windows would break the on-chain ordering the projector depends on.
pub struct Backfill {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn ReplicaStore>,
    projector: Arc<Projector>,
    opts: BackfillOptions,
}

impl Backfill {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn ReplicaStore>,
        projector: Arc<Projector>,
        opts: BackfillOptions,
    ) -> Self {
        Self { chain, store, projector, opts }
    }

    /// Run until the head is reached or shutdown is signalled. Resumes
    /// from the persisted cursor; reprocessing is safe but wasteful, so
    /// the cursor only advances after a fully projected window.
    pub async fn run(&self, shutdown: &watch::Receiver<bool>) -> Result<(), ProjectError> {
        let mut from = match self.store.cursor().await? {
            Some(next) => next,
            None => self.opts.start_block,
        };
        let mut window = self.opts.window.max(1);
        let mut failures = 0u32;

        tracing::info!("backfill starting at block {from} (window {window})");

        loop {
            if *shutdown.borrow() {
                tracing::info!("backfill interrupted by shutdown");
                return Ok(());
            }

            // Re-read the head every iteration; it keeps growing while a
            // long backfill runs.
            let head = match self.chain.current_height().await {
                Ok(head) => head,
                Err(err) => {
                    failures += 1;
                    let delay = backoff(self.opts.retry_delay, failures);
                    tracing::warn!("head lookup failed ({err}), retrying in {delay:?}");
                    pause(delay, shutdown).await;
                    continue;
                }
            };
            if from > head {
                tracing::info!("backfill caught up at block {head}");
                return Ok(());
            }

            let to = (from + window - 1).min(head);
            match self.process_window(from, to).await {
                Ok(projected) => {
                    failures = 0;
                    tracing::info!("backfill window {from}..={to} done ({projected} events)");
                    from = to + 1;
                    pause(self.opts.window_delay, shutdown).await;
                }
                Err(ProjectError::Chain(ChainError::RangeTooLarge { .. })) => {
                    window = (window / 2).max(1);
                    tracing::warn!(
                        "node rejected window {from}..={to}, shrinking to {window} blocks"
                    );
                }
                Err(err) => {
                    failures += 1;
                    let delay = backoff(self.opts.retry_delay, failures);
                    tracing::warn!("window {from}..={to} failed ({err}), retrying in {delay:?}");
                    pause(delay, shutdown).await;
                }
            }
        }
    }

    /// Fetch, order and project every tracked event in `[from, to]`, then
    /// persist the cursor. A failed cursor save retries the whole window;
    /// the idempotency guard absorbs the replay.
    async fn process_window(&self, from: u64, to: u64) -> Result<usize, ProjectError> {
        let mut logs: Vec<Log> = Vec::new();
        for signature in decode::tracked_signatures() {
            logs.extend(self.chain.logs(signature, from, to).await?);
        }
        // A purchase depends on listing state written by an earlier
        // listing, so on-chain order must be preserved across signatures.
        logs.sort_by_key(|log| (log.block_number.unwrap_or(0), log.log_index.unwrap_or(0)));

        let mut projected = 0;
        for log in &logs {
            match decode::decode(log) {
                Ok(event) => {
                    self.projector.apply_log(log, event).await?;
                    projected += 1;
                }
                Err(err) => {
                    tracing::debug!("skipping undecodable log in {from}..={to}: {err}");
                }
            }
        }
        self.store.save_cursor(to + 1).await?;
        Ok(projected)
    }
}

fn backoff(base: Duration, failures: u32) -> Duration {
    base * 2u32.saturating_pow(failures.min(5))
}

/// Sleep that wakes early when shutdown is signalled.
async fn pause(delay: Duration, shutdown: &watch::Receiver<bool>) {
    let mut shutdown = shutdown.clone();
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = shutdown.wait_for(|stop| *stop) => {}
    }
}
