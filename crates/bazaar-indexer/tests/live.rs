mod common;

use alloy::primitives::Address;
use bazaar_common::ActivityKind;
use bazaar_indexer::live::{LiveOptions, LiveSubscriber};
use bazaar_indexer::store::{MemoryStore, ReplicaStore};
use bigdecimal::BigDecimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use common::{bought_log, listed_log, projector, MockChain, DEAD_GATEWAY};

const ONE_ETH: u128 = 1_000_000_000_000_000_000;

fn opts() -> LiveOptions {
    LiveOptions {
        poll_interval: Duration::from_millis(10),
        poll_span: 100,
        queue_depth: 16,
        retry_attempts: 3,
        retry_delay: Duration::from_millis(10),
    }
}

async fn wait_for<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn live_events_flow_queue_to_store() {
    let alice = Address::repeat_byte(0xaa);
    let bob = Address::repeat_byte(0xbb);
    let chain = Arc::new(MockChain::new(10));
    chain.push_log(listed_log(alice, 7, ONE_ETH, 5, 0, 1));
    chain.push_log(bought_log(bob, 7, ONE_ETH, 6, 0, 2));
    let store = Arc::new(MemoryStore::new());
    let projector = Arc::new(projector(chain.clone(), store.clone(), DEAD_GATEWAY));

    let subscriber = LiveSubscriber::new(chain, projector, opts());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { subscriber.run(1, shutdown_rx).await });

    let counting = store.clone();
    wait_for(move || counting.activity_count() == 2).await;

    // Delivery order across the two kind streams is not guaranteed, but
    // ownership converges either way: only the buy writes the owner.
    let nft = store.nft("7").await.unwrap().unwrap();
    assert_eq!(nft.owner, format!("0x{}", "bb".repeat(20)));

    let activity = store.recent_activity(10).await.unwrap();
    assert!(activity.iter().any(|a| a.event_type == ActivityKind::List
        && a.price == Some(BigDecimal::from_str("1000000000000000000").unwrap())));
    assert!(activity.iter().any(|a| a.event_type == ActivityKind::Buy));

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn shutdown_stops_all_streams() {
    let chain = Arc::new(MockChain::new(10));
    let store = Arc::new(MemoryStore::new());
    let projector = Arc::new(projector(chain.clone(), store.clone(), DEAD_GATEWAY));

    let subscriber = LiveSubscriber::new(chain, projector, opts());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { subscriber.run(1, shutdown_rx).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown_tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("live subscriber did not stop")
        .unwrap();
}
