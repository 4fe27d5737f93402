//! In-memory replica store.
//!
//! All data is lost when the process exits. Backs the test suites and
//! short-lived runs that don't need persistence.

use async_trait::async_trait;
use bazaar_common::{ActivityRecord, NftSnapshot, StoreError};
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use super::ReplicaStore;
use crate::metadata::TokenMetadata;

#[derive(Default)]
pub struct MemoryStore {
    nfts: Mutex<HashMap<String, NftSnapshot>>,
    activities: Mutex<Vec<ActivityRecord>>,
    cursor: Mutex<Option<u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of ledger entries.
    pub fn activity_count(&self) -> usize {
        self.activities.lock().unwrap().len()
    }
}

#[async_trait]
impl ReplicaStore for MemoryStore {
    async fn nft(&self, token_id: &str) -> Result<Option<NftSnapshot>, StoreError> {
        Ok(self.nfts.lock().unwrap().get(token_id).cloned())
    }

    async fn insert_nft_if_absent(&self, nft: &NftSnapshot) -> Result<bool, StoreError> {
        let mut nfts = self.nfts.lock().unwrap();
        if nfts.contains_key(&nft.token_id) {
            return Ok(false);
        }
        nfts.insert(nft.token_id.clone(), nft.clone());
        Ok(true)
    }

    async fn enrich_placeholder(
        &self,
        token_id: &str,
        creator: &str,
        royalty_percent: i32,
        token_uri: &str,
        metadata: &TokenMetadata,
    ) -> Result<(), StoreError> {
        if let Some(nft) = self.nfts.lock().unwrap().get_mut(token_id) {
            nft.creator = creator.to_string();
            nft.royalty_percent = royalty_percent;
            nft.token_uri = Some(token_uri.to_string());
            nft.name = metadata.name.clone();
            nft.description = metadata.description.clone();
            nft.image_url = metadata.image_url.clone();
            nft.attributes = metadata.attributes.clone();
            nft.placeholder = false;
            nft.last_updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_listing(
        &self,
        token_id: &str,
        price: &BigDecimal,
        seller: &str,
    ) -> Result<(), StoreError> {
        if let Some(nft) = self.nfts.lock().unwrap().get_mut(token_id) {
            nft.listed = true;
            nft.listing_price = price.clone();
            nft.listing_seller = Some(seller.to_string());
            nft.last_updated_at = Utc::now();
        }
        Ok(())
    }

    async fn record_sale(&self, token_id: &str, buyer: &str) -> Result<(), StoreError> {
        if let Some(nft) = self.nfts.lock().unwrap().get_mut(token_id) {
            nft.owner = buyer.to_string();
            nft.listed = false;
            nft.listing_price = BigDecimal::from(0);
            nft.listing_seller = None;
            nft.auction_active = false;
            nft.auction_highest_bid = None;
            nft.auction_highest_bidder = None;
            nft.auction_end_time = None;
            nft.last_updated_at = Utc::now();
        }
        Ok(())
    }

    async fn activity_recorded(&self, tx_hash: &str) -> Result<bool, StoreError> {
        Ok(self
            .activities
            .lock()
            .unwrap()
            .iter()
            .any(|record| record.tx_hash == tx_hash))
    }

    async fn insert_activity_if_absent(
        &self,
        record: &ActivityRecord,
    ) -> Result<bool, StoreError> {
        let mut activities = self.activities.lock().unwrap();
        if activities.iter().any(|existing| existing.tx_hash == record.tx_hash) {
            return Ok(false);
        }
        activities.push(record.clone());
        Ok(true)
    }

    async fn cursor(&self) -> Result<Option<u64>, StoreError> {
        Ok(*self.cursor.lock().unwrap())
    }

    async fn save_cursor(&self, next_block: u64) -> Result<(), StoreError> {
        *self.cursor.lock().unwrap() = Some(next_block);
        Ok(())
    }

    async fn nfts_on_market(&self) -> Result<Vec<NftSnapshot>, StoreError> {
        let mut nfts: Vec<NftSnapshot> = self
            .nfts
            .lock()
            .unwrap()
            .values()
            .filter(|nft| nft.listed || nft.auction_active)
            .cloned()
            .collect();
        nfts.sort_by(|a, b| b.last_updated_at.cmp(&a.last_updated_at));
        Ok(nfts)
    }

    async fn nfts_by_owner(&self, owner: &str) -> Result<Vec<NftSnapshot>, StoreError> {
        let owner = owner.to_lowercase();
        let mut nfts: Vec<NftSnapshot> = self
            .nfts
            .lock()
            .unwrap()
            .values()
            .filter(|nft| nft.owner == owner)
            .cloned()
            .collect();
        nfts.sort_by(|a, b| b.last_updated_at.cmp(&a.last_updated_at));
        Ok(nfts)
    }

    async fn search_nfts(&self, query: &str) -> Result<Vec<NftSnapshot>, StoreError> {
        let needle = query.to_lowercase();
        let mut nfts: Vec<NftSnapshot> = self
            .nfts
            .lock()
            .unwrap()
            .values()
            .filter(|nft| {
                nft.name.to_lowercase().contains(&needle)
                    || nft.description.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        nfts.sort_by(|a, b| b.last_updated_at.cmp(&a.last_updated_at));
        Ok(nfts)
    }

    async fn recent_activity(&self, limit: i64) -> Result<Vec<ActivityRecord>, StoreError> {
        let mut records = self.activities.lock().unwrap().clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }
}
