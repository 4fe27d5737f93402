#![allow(dead_code)]

use alloy::primitives::{Address, B256, LogData, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use bazaar_indexer::chain::{ChainClient, ChainError};
use bazaar_indexer::decode::{NFTBought, NFTListed, NFTMinted};
use bazaar_indexer::metadata::MetadataFetcher;
use bazaar_indexer::projector::Projector;
use bazaar_indexer::store::MemoryStore;

pub const CONTRACT: &str = "0x1111111111111111111111111111111111111111";

/// A gateway prefix nothing listens on; metadata fetches against it fail
/// fast and fall back to the defaults.
pub const DEAD_GATEWAY: &str = "http://127.0.0.1:1/ipfs/";

/// Scripted chain backend for tests.
#[derive(Default)]
pub struct MockChain {
    pub height: Mutex<u64>,
    pub logs: Mutex<Vec<Log>>,
    pub token_uris: Mutex<HashMap<String, String>>,
    pub royalties: Mutex<HashMap<String, u32>>,
    /// When set, any `logs` call spanning more blocks than this fails
    /// with `RangeTooLarge`.
    pub max_range: Option<u64>,
    /// Number of upcoming `logs` calls that fail with `NodeUnavailable`.
    pub flaky_failures: AtomicU32,
    pub log_calls: AtomicU32,
}

impl MockChain {
    pub fn new(height: u64) -> Self {
        Self { height: Mutex::new(height), ..Self::default() }
    }

    pub fn push_log(&self, log: Log) {
        self.logs.lock().unwrap().push(log);
    }

    pub fn set_token(&self, token_id: &str, uri: &str, royalty: u32) {
        self.token_uris.lock().unwrap().insert(token_id.to_string(), uri.to_string());
        self.royalties.lock().unwrap().insert(token_id.to_string(), royalty);
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn current_height(&self) -> Result<u64, ChainError> {
        Ok(*self.height.lock().unwrap())
    }

    async fn logs(
        &self,
        signature: B256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, ChainError> {
        self.log_calls.fetch_add(1, Ordering::Relaxed);
        if self
            .flaky_failures
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ChainError::NodeUnavailable("scripted failure".to_string()));
        }
        if let Some(max) = self.max_range {
            if to_block - from_block + 1 > max {
                return Err(ChainError::RangeTooLarge { from: from_block, to: to_block });
            }
        }
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|log| {
                log.topics().first() == Some(&signature)
                    && (from_block..=to_block).contains(&log.block_number.unwrap_or(0))
            })
            .cloned()
            .collect())
    }

    async fn receipt_tx_hash(&self, log: &Log) -> Result<String, ChainError> {
        log.transaction_hash
            .map(|hash| format!("{hash:?}"))
            .ok_or_else(|| ChainError::NodeUnavailable("log without tx hash".to_string()))
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64, ChainError> {
        Ok(1_700_000_000 + number)
    }

    async fn token_uri(&self, token_id: U256) -> Result<String, ChainError> {
        self.token_uris
            .lock()
            .unwrap()
            .get(&token_id.to_string())
            .cloned()
            .ok_or_else(|| ChainError::NodeUnavailable(format!("no tokenURI for {token_id}")))
    }

    async fn royalty_percent(&self, token_id: U256) -> Result<u32, ChainError> {
        Ok(self
            .royalties
            .lock()
            .unwrap()
            .get(&token_id.to_string())
            .copied()
            .unwrap_or(0))
    }
}

pub fn tx_hash(n: u64) -> B256 {
    B256::from(U256::from(n))
}

pub fn tx_hash_str(n: u64) -> String {
    format!("{:?}", tx_hash(n))
}

pub fn rpc_log(data: LogData, block: u64, index: u64, tx: u64) -> Log {
    Log {
        inner: alloy::primitives::Log { address: CONTRACT.parse().unwrap(), data },
        block_number: Some(block),
        log_index: Some(index),
        transaction_hash: Some(tx_hash(tx)),
        ..Default::default()
    }
}

pub fn minted_log(creator: Address, token: u64, block: u64, index: u64, tx: u64) -> Log {
    let data = NFTMinted { creator, tokenId: U256::from(token) }.encode_log_data();
    rpc_log(data, block, index, tx)
}

pub fn listed_log(seller: Address, token: u64, price: u128, block: u64, index: u64, tx: u64) -> Log {
    let data = NFTListed { seller, tokenId: U256::from(token), price: U256::from(price) }
        .encode_log_data();
    rpc_log(data, block, index, tx)
}

pub fn bought_log(buyer: Address, token: u64, price: u128, block: u64, index: u64, tx: u64) -> Log {
    let data = NFTBought { buyer, tokenId: U256::from(token), price: U256::from(price) }
        .encode_log_data();
    rpc_log(data, block, index, tx)
}

pub fn projector(chain: Arc<MockChain>, store: Arc<MemoryStore>, gateway: &str) -> Projector {
    let fetcher = MetadataFetcher::new(gateway, gateway).unwrap();
    Projector::new(chain, store, fetcher, CONTRACT.to_string())
}
