use async_trait::async_trait;
use bazaar_common::{ActivityRecord, NftSnapshot, StoreError};
use bigdecimal::BigDecimal;

use crate::metadata::TokenMetadata;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistence seam for the replica. The projector is the only writer; the
/// atomic insert-if-absent and upsert primitives are what make concurrent
/// producers safe without explicit locking. The read methods are the
/// contract consumed by the external serving layer.
#[async_trait]
pub trait ReplicaStore: Send + Sync {
    async fn nft(&self, token_id: &str) -> Result<Option<NftSnapshot>, StoreError>;

    /// Returns false when a snapshot for the token already existed.
    async fn insert_nft_if_absent(&self, nft: &NftSnapshot) -> Result<bool, StoreError>;

    /// Fill in the on-chain and metadata fields of a placeholder row,
    /// preserving its owner and listing state.
    async fn enrich_placeholder(
        &self,
        token_id: &str,
        creator: &str,
        royalty_percent: i32,
        token_uri: &str,
        metadata: &TokenMetadata,
    ) -> Result<(), StoreError>;

    async fn set_listing(
        &self,
        token_id: &str,
        price: &BigDecimal,
        seller: &str,
    ) -> Result<(), StoreError>;

    /// Transfer ownership after a sale: the listing and any auction state
    /// are cleared.
    async fn record_sale(&self, token_id: &str, buyer: &str) -> Result<(), StoreError>;

    async fn activity_recorded(&self, tx_hash: &str) -> Result<bool, StoreError>;

    /// Returns false when a record with this transaction hash already
    /// existed. Records are never mutated afterwards.
    async fn insert_activity_if_absent(&self, record: &ActivityRecord)
        -> Result<bool, StoreError>;

    /// Next block the backfill should process, if one was persisted.
    async fn cursor(&self) -> Result<Option<u64>, StoreError>;

    async fn save_cursor(&self, next_block: u64) -> Result<(), StoreError>;

    async fn nfts_on_market(&self) -> Result<Vec<NftSnapshot>, StoreError>;

    async fn nfts_by_owner(&self, owner: &str) -> Result<Vec<NftSnapshot>, StoreError>;

    async fn search_nfts(&self, query: &str) -> Result<Vec<NftSnapshot>, StoreError>;

    async fn recent_activity(&self, limit: i64) -> Result<Vec<ActivityRecord>, StoreError>;
}
