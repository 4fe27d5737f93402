use async_trait::async_trait;
use bazaar_common::{ActivityRecord, NftSnapshot, StoreError};
use bigdecimal::BigDecimal;
use sqlx::types::Json;
use sqlx::PgPool;

use super::ReplicaStore;
use crate::metadata::TokenMetadata;

const CURSOR_KEY: &str = "cursor";

/// Postgres-backed replica store. Uniqueness and upserts ride on the
/// table constraints (`ON CONFLICT`), so concurrent writers need no
/// additional coordination.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReplicaStore for PgStore {
    async fn nft(&self, token_id: &str) -> Result<Option<NftSnapshot>, StoreError> {
        let nft = sqlx::query_as(
            "SELECT token_id, contract_address, owner, creator, royalty_percent, token_uri,
                    name, description, image_url, attributes, listed, listing_price,
                    listing_seller, auction_active, auction_highest_bid,
                    auction_highest_bidder, auction_end_time, placeholder, last_updated_at
             FROM nfts
             WHERE token_id = $1",
        )
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(nft)
    }

    async fn insert_nft_if_absent(&self, nft: &NftSnapshot) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO nfts (token_id, contract_address, owner, creator, royalty_percent,
                               token_uri, name, description, image_url, attributes, listed,
                               listing_price, listing_seller, auction_active,
                               auction_highest_bid, auction_highest_bidder, auction_end_time,
                               placeholder, last_updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, NOW())
             ON CONFLICT (token_id) DO NOTHING",
        )
        .bind(&nft.token_id)
        .bind(&nft.contract_address)
        .bind(&nft.owner)
        .bind(&nft.creator)
        .bind(nft.royalty_percent)
        .bind(&nft.token_uri)
        .bind(&nft.name)
        .bind(&nft.description)
        .bind(&nft.image_url)
        .bind(Json(&nft.attributes))
        .bind(nft.listed)
        .bind(&nft.listing_price)
        .bind(&nft.listing_seller)
        .bind(nft.auction_active)
        .bind(&nft.auction_highest_bid)
        .bind(&nft.auction_highest_bidder)
        .bind(nft.auction_end_time)
        .bind(nft.placeholder)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn enrich_placeholder(
        &self,
        token_id: &str,
        creator: &str,
        royalty_percent: i32,
        token_uri: &str,
        metadata: &TokenMetadata,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE nfts SET
                creator = $2,
                royalty_percent = $3,
                token_uri = $4,
                name = $5,
                description = $6,
                image_url = $7,
                attributes = $8,
                placeholder = false,
                last_updated_at = NOW()
             WHERE token_id = $1",
        )
        .bind(token_id)
        .bind(creator)
        .bind(royalty_percent)
        .bind(token_uri)
        .bind(&metadata.name)
        .bind(&metadata.description)
        .bind(&metadata.image_url)
        .bind(Json(&metadata.attributes))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_listing(
        &self,
        token_id: &str,
        price: &BigDecimal,
        seller: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE nfts SET
                listed = true,
                listing_price = $2,
                listing_seller = $3,
                last_updated_at = NOW()
             WHERE token_id = $1",
        )
        .bind(token_id)
        .bind(price)
        .bind(seller)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_sale(&self, token_id: &str, buyer: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE nfts SET
                owner = $2,
                listed = false,
                listing_price = 0,
                listing_seller = NULL,
                auction_active = false,
                auction_highest_bid = NULL,
                auction_highest_bidder = NULL,
                auction_end_time = NULL,
                last_updated_at = NOW()
             WHERE token_id = $1",
        )
        .bind(token_id)
        .bind(buyer)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn activity_recorded(&self, tx_hash: &str) -> Result<bool, StoreError> {
        let hit: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM activities WHERE tx_hash = $1")
                .bind(tx_hash)
                .fetch_optional(&self.pool)
                .await?;
        Ok(hit.is_some())
    }

    async fn insert_activity_if_absent(
        &self,
        record: &ActivityRecord,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO activities (tx_hash, event_type, token_id, from_address, to_address, price, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (tx_hash) DO NOTHING",
        )
        .bind(&record.tx_hash)
        .bind(record.event_type)
        .bind(&record.token_id)
        .bind(&record.from_address)
        .bind(&record.to_address)
        .bind(&record.price)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn cursor(&self) -> Result<Option<u64>, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM indexer_state WHERE key = $1")
                .bind(CURSOR_KEY)
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some((value,)) => {
                let next = value
                    .parse()
                    .map_err(|_| StoreError::Corrupt(format!("cursor value {value:?}")))?;
                Ok(Some(next))
            }
            None => Ok(None),
        }
    }

    async fn save_cursor(&self, next_block: u64) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO indexer_state (key, value, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (key) DO UPDATE SET value = $2, updated_at = NOW()",
        )
        .bind(CURSOR_KEY)
        .bind(next_block.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn nfts_on_market(&self) -> Result<Vec<NftSnapshot>, StoreError> {
        let nfts = sqlx::query_as(
            "SELECT token_id, contract_address, owner, creator, royalty_percent, token_uri,
                    name, description, image_url, attributes, listed, listing_price,
                    listing_seller, auction_active, auction_highest_bid,
                    auction_highest_bidder, auction_end_time, placeholder, last_updated_at
             FROM nfts
             WHERE listed OR auction_active
             ORDER BY last_updated_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(nfts)
    }

    async fn nfts_by_owner(&self, owner: &str) -> Result<Vec<NftSnapshot>, StoreError> {
        let nfts = sqlx::query_as(
            "SELECT token_id, contract_address, owner, creator, royalty_percent, token_uri,
                    name, description, image_url, attributes, listed, listing_price,
                    listing_seller, auction_active, auction_highest_bid,
                    auction_highest_bidder, auction_end_time, placeholder, last_updated_at
             FROM nfts
             WHERE owner = $1
             ORDER BY last_updated_at DESC",
        )
        .bind(owner.to_lowercase())
        .fetch_all(&self.pool)
        .await?;
        Ok(nfts)
    }

    async fn search_nfts(&self, query: &str) -> Result<Vec<NftSnapshot>, StoreError> {
        let nfts = sqlx::query_as(
            "SELECT token_id, contract_address, owner, creator, royalty_percent, token_uri,
                    name, description, image_url, attributes, listed, listing_price,
                    listing_seller, auction_active, auction_highest_bid,
                    auction_highest_bidder, auction_end_time, placeholder, last_updated_at
             FROM nfts
             WHERE name ILIKE '%' || $1 || '%' OR description ILIKE '%' || $1 || '%'
             ORDER BY last_updated_at DESC",
        )
        .bind(query)
        .fetch_all(&self.pool)
        .await?;
        Ok(nfts)
    }

    async fn recent_activity(&self, limit: i64) -> Result<Vec<ActivityRecord>, StoreError> {
        let records = sqlx::query_as(
            "SELECT tx_hash, event_type, token_id, from_address, to_address, price, created_at
             FROM activities
             ORDER BY created_at DESC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}
