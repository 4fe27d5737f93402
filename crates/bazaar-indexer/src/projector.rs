use alloy::primitives::{Address, U256};
use alloy::rpc::types::Log;
use bazaar_common::{ActivityKind, ActivityRecord, NftSnapshot, StoreError, ZERO_ADDRESS};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::chain::{ChainClient, ChainError};
use crate::decode::MarketEvent;
use crate::metadata::{MetadataFetcher, TokenMetadata};
use crate::store::ReplicaStore;

/// A projection failure. Both variants are transient: the caller retries
/// the same event later and the idempotency guard absorbs the replay.
#[derive(Error, Debug)]
pub enum ProjectError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Applies decoded events to the replica. This is the single writer to the
/// store; every entry point is idempotent under at-least-once delivery,
/// keyed by transaction hash, and tolerates events arriving out of
/// on-chain order across producers.
pub struct Projector {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn ReplicaStore>,
    metadata: MetadataFetcher,
    contract_address: String,
}

impl Projector {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn ReplicaStore>,
        metadata: MetadataFetcher,
        contract_address: String,
    ) -> Self {
        Self { chain, store, metadata, contract_address }
    }

    /// Recover the log's transaction hash and block timestamp, then apply.
    pub async fn apply_log(&self, log: &Log, event: MarketEvent) -> Result<(), ProjectError> {
        let tx_hash = self.chain.receipt_tx_hash(log).await?;
        let timestamp = self
            .chain
            .block_timestamp(log.block_number.unwrap_or_default())
            .await?;
        self.apply(event, &tx_hash, timestamp).await
    }

    pub async fn apply(
        &self,
        event: MarketEvent,
        tx_hash: &str,
        block_timestamp: u64,
    ) -> Result<(), ProjectError> {
        match event {
            MarketEvent::Minted { creator, token_id } => {
                self.apply_mint(creator, token_id, tx_hash, block_timestamp).await
            }
            MarketEvent::Listed { seller, token_id, price } => {
                self.apply_listing(seller, token_id, price, tx_hash, block_timestamp).await
            }
            MarketEvent::Bought { buyer, token_id, price } => {
                self.apply_purchase(buyer, token_id, price, tx_hash, block_timestamp).await
            }
        }
    }

    pub async fn apply_mint(
        &self,
        creator: Address,
        token_id: U256,
        tx_hash: &str,
        block_timestamp: u64,
    ) -> Result<(), ProjectError> {
        if self.store.activity_recorded(tx_hash).await? {
            tracing::debug!("duplicate delivery of {tx_hash}, skipping");
            return Ok(());
        }
        let token = token_id.to_string();
        let creator = addr_hex(creator);

        match self.store.nft(&token).await? {
            Some(existing) if existing.placeholder => {
                // A listing or purchase got here first; fill in what the
                // mint knows without touching the marketplace state.
                let (token_uri, royalty, meta) = self.on_chain_details(token_id).await?;
                self.store
                    .enrich_placeholder(&token, &creator, royalty, &token_uri, &meta)
                    .await?;
            }
            Some(_) => {
                // Snapshot already materialized. A prior run may still have
                // died before the activity write, so fall through to it.
            }
            None => {
                let (token_uri, royalty, meta) = self.on_chain_details(token_id).await?;
                let snapshot = NftSnapshot {
                    token_id: token.clone(),
                    contract_address: self.contract_address.clone(),
                    owner: creator.clone(),
                    creator: creator.clone(),
                    royalty_percent: royalty,
                    token_uri: Some(token_uri),
                    name: meta.name,
                    description: meta.description,
                    image_url: meta.image_url,
                    attributes: meta.attributes,
                    listed: false,
                    listing_price: BigDecimal::from(0),
                    listing_seller: None,
                    auction_active: false,
                    auction_highest_bid: None,
                    auction_highest_bidder: None,
                    auction_end_time: None,
                    placeholder: false,
                    last_updated_at: Utc::now(),
                };
                self.store.insert_nft_if_absent(&snapshot).await?;
            }
        }

        self.store
            .insert_activity_if_absent(&ActivityRecord {
                tx_hash: tx_hash.to_string(),
                event_type: ActivityKind::Mint,
                token_id: token,
                from_address: Some(ZERO_ADDRESS.to_string()),
                to_address: Some(creator),
                price: None,
                created_at: block_time(block_timestamp),
            })
            .await?;
        Ok(())
    }

    pub async fn apply_listing(
        &self,
        seller: Address,
        token_id: U256,
        price: U256,
        tx_hash: &str,
        block_timestamp: u64,
    ) -> Result<(), ProjectError> {
        if self.store.activity_recorded(tx_hash).await? {
            tracing::debug!("duplicate delivery of {tx_hash}, skipping");
            return Ok(());
        }
        let token = token_id.to_string();
        let seller = addr_hex(seller);
        let price = wei(price);

        if self.store.nft(&token).await?.is_none() {
            // Listing observed before its mint. Producers are paced
            // independently, so materialize a placeholder instead of
            // dropping the event.
            tracing::warn!("listing for unknown token {token}, creating placeholder");
            self.store
                .insert_nft_if_absent(&placeholder_snapshot(
                    &token,
                    &self.contract_address,
                    &seller,
                ))
                .await?;
        }
        self.store.set_listing(&token, &price, &seller).await?;

        self.store
            .insert_activity_if_absent(&ActivityRecord {
                tx_hash: tx_hash.to_string(),
                event_type: ActivityKind::List,
                token_id: token,
                from_address: Some(seller),
                to_address: None,
                price: Some(price),
                created_at: block_time(block_timestamp),
            })
            .await?;
        Ok(())
    }

    pub async fn apply_purchase(
        &self,
        buyer: Address,
        token_id: U256,
        price: U256,
        tx_hash: &str,
        block_timestamp: u64,
    ) -> Result<(), ProjectError> {
        if self.store.activity_recorded(tx_hash).await? {
            tracing::debug!("duplicate delivery of {tx_hash}, skipping");
            return Ok(());
        }
        let token = token_id.to_string();
        let buyer = addr_hex(buyer);
        let price = wei(price);

        // The buy event carries no seller; recover it from the snapshot,
        // tolerating an unknown one.
        let seller = match self.store.nft(&token).await? {
            Some(snapshot) => snapshot.listing_seller,
            None => {
                tracing::warn!("purchase of unknown token {token}, creating placeholder");
                self.store
                    .insert_nft_if_absent(&placeholder_snapshot(
                        &token,
                        &self.contract_address,
                        &buyer,
                    ))
                    .await?;
                None
            }
        };
        self.store.record_sale(&token, &buyer).await?;

        self.store
            .insert_activity_if_absent(&ActivityRecord {
                tx_hash: tx_hash.to_string(),
                event_type: ActivityKind::Buy,
                token_id: token,
                from_address: seller,
                to_address: Some(buyer),
                price: Some(price),
                created_at: block_time(block_timestamp),
            })
            .await?;
        Ok(())
    }

    async fn on_chain_details(
        &self,
        token_id: U256,
    ) -> Result<(String, i32, TokenMetadata), ProjectError> {
        let token_uri = self.chain.token_uri(token_id).await?;
        let royalty = self.chain.royalty_percent(token_id).await? as i32;
        let resolved = self.metadata.fetch(&token_uri).await;
        if !resolved.fetched {
            tracing::warn!("using default metadata for token {token_id} ({token_uri})");
        }
        Ok((token_uri, royalty, resolved.metadata))
    }
}

fn placeholder_snapshot(token_id: &str, contract_address: &str, owner: &str) -> NftSnapshot {
    NftSnapshot {
        token_id: token_id.to_string(),
        contract_address: contract_address.to_string(),
        owner: owner.to_string(),
        creator: String::new(),
        royalty_percent: 0,
        token_uri: None,
        name: "unnamed".to_string(),
        description: String::new(),
        image_url: String::new(),
        attributes: Vec::new(),
        listed: false,
        listing_price: BigDecimal::from(0),
        listing_seller: None,
        auction_active: false,
        auction_highest_bid: None,
        auction_highest_bidder: None,
        auction_end_time: None,
        placeholder: true,
        last_updated_at: Utc::now(),
    }
}

fn addr_hex(address: Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

fn wei(amount: U256) -> BigDecimal {
    BigDecimal::from_str(&amount.to_string()).unwrap_or_default()
}

fn block_time(timestamp: u64) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp as i64, 0).unwrap_or_default()
}
