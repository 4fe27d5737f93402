//! Off-chain replica indexer for the bazaar NFT marketplace.
//!
//! Two producers feed one projector: the backfill coordinator replays
//! history in small block windows, the live subscriber tails new events
//! from the chain head. Both decode through the same event decoder and
//! converge on the state projector, the single writer to the replica
//! store. Duplicate delivery is absorbed by the transaction-hash
//! idempotency key, so either producer can safely reprocess anything.

pub mod backfill;
pub mod chain;
pub mod config;
pub mod decode;
pub mod live;
pub mod metadata;
pub mod projector;
pub mod store;
