mod common;

use alloy::primitives::Address;
use bazaar_common::ActivityKind;
use bazaar_indexer::backfill::{Backfill, BackfillOptions};
use bazaar_indexer::store::{MemoryStore, ReplicaStore};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use common::{bought_log, listed_log, minted_log, projector, MockChain, DEAD_GATEWAY};

const ONE_ETH: u128 = 1_000_000_000_000_000_000;

fn alice() -> Address {
    Address::repeat_byte(0xaa)
}

fn bob() -> Address {
    Address::repeat_byte(0xbb)
}

fn opts(start_block: u64, window: u64) -> BackfillOptions {
    BackfillOptions {
        start_block,
        window,
        window_delay: Duration::from_millis(1),
        retry_delay: Duration::from_millis(1),
    }
}

fn backfill(chain: Arc<MockChain>, store: Arc<MemoryStore>, opts: BackfillOptions) -> Backfill {
    let projector = Arc::new(projector(chain.clone(), store.clone(), DEAD_GATEWAY));
    Backfill::new(chain, store, projector, opts)
}

#[tokio::test]
async fn backfill_advances_cursor_and_reruns_are_noops() {
    let chain = Arc::new(MockChain::new(200));
    chain.set_token("7", "ipfs://QmMeta7", 5);
    chain.push_log(minted_log(alice(), 7, 105, 0, 1));
    chain.push_log(listed_log(alice(), 7, ONE_ETH, 150, 0, 2));
    chain.push_log(bought_log(bob(), 7, ONE_ETH, 175, 0, 3));
    let store = Arc::new(MemoryStore::new());
    let backfill = backfill(chain.clone(), store.clone(), opts(100, 10));
    let (_keep, shutdown) = watch::channel(false);

    backfill.run(&shutdown).await.unwrap();

    assert_eq!(store.cursor().await.unwrap(), Some(201));
    assert_eq!(store.activity_count(), 3);

    let nft = store.nft("7").await.unwrap().unwrap();
    assert_eq!(nft.owner, format!("0x{}", "bb".repeat(20)));
    assert!(!nft.listed);

    // Events were projected in on-chain order, so the buy recovered the
    // seller that the earlier listing recorded.
    let activity = store.recent_activity(10).await.unwrap();
    let bought = activity.iter().find(|a| a.event_type == ActivityKind::Buy).unwrap();
    assert_eq!(bought.from_address, Some(format!("0x{}", "aa".repeat(20))));

    // A second run resumes at the cursor, past the head: nothing new.
    backfill.run(&shutdown).await.unwrap();
    assert_eq!(store.activity_count(), 3);
    assert_eq!(store.cursor().await.unwrap(), Some(201));
}

#[tokio::test]
async fn range_too_large_shrinks_the_window() {
    let mut chain = MockChain::new(110);
    chain.max_range = Some(3);
    let chain = Arc::new(chain);
    chain.push_log(listed_log(alice(), 7, ONE_ETH, 105, 0, 1));
    let store = Arc::new(MemoryStore::new());
    let backfill = backfill(chain.clone(), store.clone(), opts(100, 10));
    let (_keep, shutdown) = watch::channel(false);

    backfill.run(&shutdown).await.unwrap();

    assert_eq!(store.cursor().await.unwrap(), Some(111));
    assert_eq!(store.activity_count(), 1);
}

#[tokio::test]
async fn transient_failure_retries_the_same_window() {
    let chain = Arc::new(MockChain::new(105));
    chain.flaky_failures.store(2, Ordering::Relaxed);
    chain.push_log(listed_log(alice(), 7, ONE_ETH, 103, 0, 1));
    let store = Arc::new(MemoryStore::new());
    let backfill = backfill(chain.clone(), store.clone(), opts(100, 10));
    let (_keep, shutdown) = watch::channel(false);

    backfill.run(&shutdown).await.unwrap();

    // The window was retried after the scripted failures; nothing was
    // skipped and the cursor moved exactly once past the head.
    assert_eq!(store.cursor().await.unwrap(), Some(106));
    assert_eq!(store.activity_count(), 1);
}

#[tokio::test]
async fn shutdown_stops_the_walk_without_advancing() {
    let chain = Arc::new(MockChain::new(1_000));
    let store = Arc::new(MemoryStore::new());
    let backfill = backfill(chain.clone(), store.clone(), opts(0, 10));
    let (tx, rx) = watch::channel(true);

    backfill.run(&rx).await.unwrap();
    drop(tx);

    assert_eq!(store.cursor().await.unwrap(), None);
    assert_eq!(chain.log_calls.load(Ordering::Relaxed), 0);
}
