use alloy::primitives::B256;
use alloy::rpc::types::Log;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::chain::{ChainClient, ChainError};
use crate::decode;
use crate::projector::Projector;

#[derive(Debug, Clone)]
pub struct LiveOptions {
    pub poll_interval: Duration,
    /// Cap on blocks per poll; shrinks when the node rejects a range.
    pub poll_span: u64,
    pub queue_depth: usize,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

/// Tails new events from the chain head. One bounded queue per tracked
/// event kind: a producer polls the node for that signature, a consumer
/// decodes and projects. Backpressure and cancellation are explicit in
/// the channel rather than implicit in callback registration.
pub struct LiveSubscriber {
    chain: Arc<dyn ChainClient>,
    projector: Arc<Projector>,
    opts: LiveOptions,
}

impl LiveSubscriber {
    pub fn new(chain: Arc<dyn ChainClient>, projector: Arc<Projector>, opts: LiveOptions) -> Self {
        Self { chain, projector, opts }
    }

    /// Run until shutdown. Spawns a producer/consumer pair per event kind
    /// starting at `start_from` and waits for all of them to drain.
    pub async fn run(&self, start_from: u64, shutdown: watch::Receiver<bool>) {
        let mut tasks = Vec::new();
        for signature in decode::tracked_signatures() {
            let (tx, rx) = mpsc::channel::<Log>(self.opts.queue_depth.max(1));
            tasks.push(tokio::spawn(poll_logs(
                self.chain.clone(),
                signature,
                start_from,
                self.opts.clone(),
                tx,
                shutdown.clone(),
            )));
            tasks.push(tokio::spawn(project_stream(
                self.projector.clone(),
                rx,
                self.opts.clone(),
            )));
        }
        join_all(tasks).await;
        tracing::info!("live subscriber stopped");
    }
}

/// Producer: poll new blocks for one signature and queue the raw logs.
async fn poll_logs(
    chain: Arc<dyn ChainClient>,
    signature: B256,
    start_from: u64,
    opts: LiveOptions,
    tx: mpsc::Sender<Log>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut next = start_from;
    let mut span = opts.poll_span.max(1);
    loop {
        tokio::select! {
            _ = tokio::time::sleep(opts.poll_interval) => {}
            _ = shutdown.wait_for(|stop| *stop) => break,
        }

        let head = match chain.current_height().await {
            Ok(head) => head,
            Err(err) => {
                tracing::warn!("live head lookup failed: {err}");
                continue;
            }
        };
        if head < next {
            continue;
        }

        let to = head.min(next + span - 1);
        match chain.logs(signature, next, to).await {
            Ok(logs) => {
                for log in logs {
                    // Blocks when the consumer lags; that is the
                    // backpressure.
                    if tx.send(log).await.is_err() {
                        return;
                    }
                }
                next = to + 1;
            }
            Err(ChainError::RangeTooLarge { .. }) => {
                span = (span / 2).max(1);
                tracing::warn!("node rejected live poll range, shrinking to {span} blocks");
            }
            Err(err) => {
                tracing::warn!("live poll for {signature} failed: {err}");
            }
        }
    }
}

/// Consumer: decode and project queued logs, retrying a bounded number of
/// times before dropping an event. Dropped events are recovered by the
/// next backfill sweep.
async fn project_stream(projector: Arc<Projector>, mut rx: mpsc::Receiver<Log>, opts: LiveOptions) {
    while let Some(log) = rx.recv().await {
        let event = match decode::decode(&log) {
            Ok(event) => event,
            Err(err) => {
                tracing::debug!("skipping undecodable live log: {err}");
                continue;
            }
        };

        let mut attempt = 0;
        loop {
            match projector.apply_log(&log, event.clone()).await {
                Ok(()) => break,
                Err(err) if attempt + 1 < opts.retry_attempts.max(1) => {
                    attempt += 1;
                    tracing::warn!("live projection failed (attempt {attempt}): {err}");
                    tokio::time::sleep(opts.retry_delay).await;
                }
                Err(err) => {
                    tracing::error!("dropping live event after {} attempts: {err}", attempt + 1);
                    break;
                }
            }
        }
    }
}
