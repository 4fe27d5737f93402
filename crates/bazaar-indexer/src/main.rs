use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bazaar_indexer::backfill::{Backfill, BackfillOptions};
use bazaar_indexer::chain::{ChainClient, RpcChainClient};
use bazaar_indexer::config::Config;
use bazaar_indexer::live::{LiveOptions, LiveSubscriber};
use bazaar_indexer::metadata::MetadataFetcher;
use bazaar_indexer::projector::Projector;
use bazaar_indexer::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "bazaar_indexer=info,sqlx=warn".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting bazaar indexer");

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let pool = bazaar_common::db::create_pool(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Running database migrations");
    bazaar_common::db::run_migrations(&pool).await?;

    let contract: alloy::primitives::Address = config
        .contract_address
        .parse()
        .context("Invalid CONTRACT_ADDRESS")?;
    let chain: Arc<dyn ChainClient> = Arc::new(RpcChainClient::new(
        &config.rpc_url,
        contract,
        config.rpc_requests_per_second,
    )?);
    let store = Arc::new(PgStore::new(pool.clone()));
    let fetcher = MetadataFetcher::new(&config.primary_gateway, &config.fallback_gateway)?;
    let projector = Arc::new(Projector::new(
        chain.clone(),
        store.clone(),
        fetcher,
        config.contract_address.to_lowercase(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    // The live tail starts at the head observed now; everything behind it
    // belongs to the backfill.
    let head = chain.current_height().await?;
    let live = LiveSubscriber::new(
        chain.clone(),
        projector.clone(),
        LiveOptions {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            poll_span: config.backfill_window,
            queue_depth: config.live_queue_depth,
            retry_attempts: config.live_retry_attempts,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        },
    );
    let live_shutdown = shutdown_rx.clone();
    let live_handle = tokio::spawn(async move { live.run(head + 1, live_shutdown).await });

    let backfill = Backfill::new(
        chain,
        store,
        projector,
        BackfillOptions {
            start_block: config.start_block,
            window: config.backfill_window,
            window_delay: Duration::from_millis(config.window_delay_ms),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        },
    );

    // Backfill to the head, then re-run periodically as the reconciliation
    // sweep for anything the live path had to drop.
    loop {
        if let Err(err) = backfill.run(&shutdown_rx).await {
            tracing::error!("backfill run failed: {err}");
        }
        if *shutdown_rx.borrow() {
            break;
        }
        let mut shutdown = shutdown_rx.clone();
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(config.reconcile_interval_secs)) => {}
            _ = shutdown.wait_for(|stop| *stop) => break,
        }
    }

    live_handle.await?;
    tracing::info!("indexer stopped");
    Ok(())
}
