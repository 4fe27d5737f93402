use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub rpc_url: String,
    pub rpc_requests_per_second: u32,
    pub contract_address: String,
    pub start_block: u64,
    pub backfill_window: u64,
    pub window_delay_ms: u64,
    pub retry_delay_ms: u64,
    pub reconcile_interval_secs: u64,
    pub poll_interval_ms: u64,
    pub live_queue_depth: usize,
    pub live_retry_attempts: u32,
    pub primary_gateway: String,
    pub fallback_gateway: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("Invalid DB_MAX_CONNECTIONS")?,
            rpc_url: env::var("RPC_URL")
                .context("RPC_URL must be set")?,
            rpc_requests_per_second: env::var("RPC_REQUESTS_PER_SECOND")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid RPC_REQUESTS_PER_SECOND")?,
            contract_address: env::var("CONTRACT_ADDRESS")
                .context("CONTRACT_ADDRESS must be set")?,
            start_block: env::var("START_BLOCK")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .context("Invalid START_BLOCK")?,
            // Node log-range limits are only discoverable by trial; start
            // conservative and let RangeTooLarge shrink it further.
            backfill_window: env::var("BACKFILL_WINDOW")
                .unwrap_or_else(|_| "9".to_string())
                .parse()
                .context("Invalid BACKFILL_WINDOW")?,
            window_delay_ms: env::var("WINDOW_DELAY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .context("Invalid WINDOW_DELAY_MS")?,
            retry_delay_ms: env::var("RETRY_DELAY_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .context("Invalid RETRY_DELAY_MS")?,
            reconcile_interval_secs: env::var("RECONCILE_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("Invalid RECONCILE_INTERVAL_SECS")?,
            poll_interval_ms: env::var("POLL_INTERVAL_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .context("Invalid POLL_INTERVAL_MS")?,
            live_queue_depth: env::var("LIVE_QUEUE_DEPTH")
                .unwrap_or_else(|_| "256".to_string())
                .parse()
                .context("Invalid LIVE_QUEUE_DEPTH")?,
            live_retry_attempts: env::var("LIVE_RETRY_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("Invalid LIVE_RETRY_ATTEMPTS")?,
            primary_gateway: env::var("METADATA_GATEWAY")
                .unwrap_or_else(|_| "https://gateway.pinata.cloud/ipfs/".to_string()),
            fallback_gateway: env::var("METADATA_FALLBACK_GATEWAY")
                .unwrap_or_else(|_| "https://ipfs.io/ipfs/".to_string()),
        })
    }
}
