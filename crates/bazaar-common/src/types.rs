use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

/// The burn/mint counterparty address.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// One metadata trait (`{"trait_type": ..., "value": ...}`) from a token's
/// off-chain JSON document. Order is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    pub value: String,
}

/// NFT snapshot as stored in the database: one row per token, denormalized
/// for read performance. The projector is the only writer and keeps owner
/// and listing state consistent with the latest applied event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct NftSnapshot {
    pub token_id: String,
    pub contract_address: String,
    pub owner: String,
    pub creator: String,
    pub royalty_percent: i32,
    pub token_uri: Option<String>,
    pub name: String,
    pub description: String,
    pub image_url: String,
    #[sqlx(json)]
    pub attributes: Vec<Attribute>,
    pub listed: bool,
    pub listing_price: BigDecimal,
    pub listing_seller: Option<String>,
    pub auction_active: bool,
    pub auction_highest_bid: Option<BigDecimal>,
    pub auction_highest_bidder: Option<String>,
    pub auction_end_time: Option<DateTime<Utc>>,
    /// True when the row was materialized by a listing or purchase seen
    /// before its mint event, and still awaits on-chain/metadata enrichment.
    pub placeholder: bool,
    pub last_updated_at: DateTime<Utc>,
}

/// The kind of a state-changing marketplace event in the activity ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityKind {
    Mint,
    List,
    Buy,
    Bid,
    AuctionStart,
    AuctionFinalize,
    Transfer,
    Withdraw,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Mint => "Mint",
            ActivityKind::List => "List",
            ActivityKind::Buy => "Buy",
            ActivityKind::Bid => "Bid",
            ActivityKind::AuctionStart => "AuctionStart",
            ActivityKind::AuctionFinalize => "AuctionFinalize",
            ActivityKind::Transfer => "Transfer",
            ActivityKind::Withdraw => "Withdraw",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown activity kind: {0}")]
pub struct UnknownActivityKind(String);

impl FromStr for ActivityKind {
    type Err = UnknownActivityKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Mint" => Ok(ActivityKind::Mint),
            "List" => Ok(ActivityKind::List),
            "Buy" => Ok(ActivityKind::Buy),
            "Bid" => Ok(ActivityKind::Bid),
            "AuctionStart" => Ok(ActivityKind::AuctionStart),
            "AuctionFinalize" => Ok(ActivityKind::AuctionFinalize),
            "Transfer" => Ok(ActivityKind::Transfer),
            "Withdraw" => Ok(ActivityKind::Withdraw),
            other => Err(UnknownActivityKind(other.to_string())),
        }
    }
}

// Stored as TEXT; the activities table is shared with external readers that
// expect the event name verbatim.
impl sqlx::Type<sqlx::Postgres> for ActivityKind {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for ActivityKind {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ActivityKind {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

/// One entry of the append-only activity ledger, keyed by transaction hash.
/// A record is never mutated or deleted once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ActivityRecord {
    pub tx_hash: String,
    pub event_type: ActivityKind,
    pub token_id: String,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub price: Option<BigDecimal>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_kind_roundtrip() {
        for kind in [
            ActivityKind::Mint,
            ActivityKind::List,
            ActivityKind::Buy,
            ActivityKind::Bid,
            ActivityKind::AuctionStart,
            ActivityKind::AuctionFinalize,
            ActivityKind::Transfer,
            ActivityKind::Withdraw,
        ] {
            assert_eq!(kind.as_str().parse::<ActivityKind>().unwrap(), kind);
        }
    }

    #[test]
    fn activity_kind_rejects_unknown() {
        assert!("Burn".parse::<ActivityKind>().is_err());
    }
}
