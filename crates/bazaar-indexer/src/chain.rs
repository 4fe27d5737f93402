use alloy::network::Ethereum;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{Filter, Log};
use alloy::sol;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use thiserror::Error;

// Read-only surface of the marketplace contract.
sol! {
    #[sol(rpc)]
    interface INftMarketplace {
        function tokenURI(uint256 tokenId) external view returns (string memory);
        function royalties(uint256 tokenId) external view returns (uint256);
    }
}

type HttpProvider = RootProvider<Ethereum>;
type SharedRateLimiter = Arc<RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>>;

/// Errors leaving the chain layer. `NodeUnavailable` and `RateLimited` are
/// retryable with backoff; `RangeTooLarge` tells the caller to shrink its
/// log-query window.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("node unavailable: {0}")]
    NodeUnavailable(String),

    #[error("rate limited by node")]
    RateLimited,

    #[error("log range {from}..={to} exceeds the node limit")]
    RangeTooLarge { from: u64, to: u64 },
}

impl ChainError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, ChainError::RangeTooLarge { .. })
    }
}

/// Read access to the chain node. Constructed explicitly and injected into
/// whichever process owns it; there is no ambient provider.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn current_height(&self) -> Result<u64, ChainError>;

    /// Ordered raw logs for one event signature within `[from_block, to_block]`.
    async fn logs(&self, signature: B256, from_block: u64, to_block: u64)
        -> Result<Vec<Log>, ChainError>;

    /// Recover a delivered log's transaction hash through its receipt.
    async fn receipt_tx_hash(&self, log: &Log) -> Result<String, ChainError>;

    async fn block_timestamp(&self, number: u64) -> Result<u64, ChainError>;

    async fn token_uri(&self, token_id: U256) -> Result<String, ChainError>;

    async fn royalty_percent(&self, token_id: U256) -> Result<u32, ChainError>;
}

/// JSON-RPC implementation over an alloy HTTP provider, with a process-wide
/// rate limiter ahead of every request.
pub struct RpcChainClient {
    provider: HttpProvider,
    contract: Address,
    limiter: SharedRateLimiter,
}

impl RpcChainClient {
    pub fn new(rpc_url: &str, contract: Address, requests_per_second: u32) -> anyhow::Result<Self> {
        let rps = NonZeroU32::new(requests_per_second)
            .unwrap_or_else(|| NonZeroU32::new(10).unwrap());
        let limiter: SharedRateLimiter = Arc::new(RateLimiter::direct(Quota::per_second(rps)));
        let provider = RootProvider::new_http(rpc_url.parse()?);
        Ok(Self { provider, contract, limiter })
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn current_height(&self) -> Result<u64, ChainError> {
        self.limiter.until_ready().await;
        self.provider.get_block_number().await.map_err(transient)
    }

    async fn logs(&self, signature: B256, from_block: u64, to_block: u64)
        -> Result<Vec<Log>, ChainError>
    {
        self.limiter.until_ready().await;
        let filter = Filter::new()
            .address(self.contract)
            .event_signature(signature)
            .from_block(from_block)
            .to_block(to_block);
        self.provider.get_logs(&filter).await.map_err(|err| {
            let msg = err.to_string();
            if is_range_error(&msg) {
                ChainError::RangeTooLarge { from: from_block, to: to_block }
            } else {
                transient(msg)
            }
        })
    }

    async fn receipt_tx_hash(&self, log: &Log) -> Result<String, ChainError> {
        let hash = log.transaction_hash.ok_or_else(|| {
            ChainError::NodeUnavailable("log delivered without a transaction hash".to_string())
        })?;
        self.limiter.until_ready().await;
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(transient)?;
        match receipt {
            Some(receipt) => Ok(format!("{:?}", receipt.transaction_hash)),
            None => Err(ChainError::NodeUnavailable(format!(
                "receipt for {hash:?} not yet available"
            ))),
        }
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64, ChainError> {
        self.limiter.until_ready().await;
        let block = self
            .provider
            .get_block_by_number(number.into())
            .await
            .map_err(transient)?;
        block
            .map(|b| b.header.timestamp)
            .ok_or_else(|| ChainError::NodeUnavailable(format!("block {number} not found")))
    }

    async fn token_uri(&self, token_id: U256) -> Result<String, ChainError> {
        self.limiter.until_ready().await;
        let contract = INftMarketplace::new(self.contract, &self.provider);
        contract.tokenURI(token_id).call().await.map_err(transient)
    }

    async fn royalty_percent(&self, token_id: U256) -> Result<u32, ChainError> {
        self.limiter.until_ready().await;
        let contract = INftMarketplace::new(self.contract, &self.provider);
        let raw = contract.royalties(token_id).call().await.map_err(transient)?;
        Ok(raw.try_into().unwrap_or(0))
    }
}

/// Classify a node failure as rate limiting or plain unavailability.
fn transient(err: impl std::fmt::Display) -> ChainError {
    let msg = err.to_string();
    let lower = msg.to_lowercase();
    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests")
    {
        ChainError::RateLimited
    } else {
        ChainError::NodeUnavailable(msg)
    }
}

// Nodes phrase their getLogs range rejections differently; match the common
// variants seen from Alchemy, Infura and geth.
fn is_range_error(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    ["block range", "range too large", "query returned more than", "response size exceeded"]
        .iter()
        .any(|marker| lower.contains(marker))
}
