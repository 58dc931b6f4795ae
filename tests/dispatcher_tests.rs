// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Tests for the dispatcher: request splitting, block flushes, reconciliation,
//! connection changes and off-chain fetching.

mod helpers;

use alloy_chains::NamedChain;
use alloy_primitives::keccak256;
use helpers::*;
use poolbatch::{
    Batcher, BatcherConfig, BatcherConfigBuilder, BatcherError, CallError, CallerId, Connection,
    ConnectionContext, DataRequest, MulticallExecutor, OffChainCall, OffChainKind,
    OffChainRegistry, OnChainCall, OnChainOutcome, ReconcileError, RetryPolicy, StoreEvent,
};
use std::sync::Arc;
use std::time::Duration;

fn batcher(config: BatcherConfig, registry: OffChainRegistry) -> Batcher {
    Batcher::new(config, registry)
}

async fn connected_batcher(executor: &Arc<MockExecutor>) -> Batcher {
    init_tracing();
    let mut batcher = batcher(BatcherConfig::minimal(), OffChainRegistry::new());
    batcher.connect(mainnet_connection(executor), None).await;
    batcher
}

#[tokio::test]
async fn test_overlapping_requests_are_sent_once() {
    let executor = MockExecutor::new(10);
    let mut batcher = connected_batcher(&executor).await;
    let mut events = batcher.subscribe();

    let shared = balance_of(POOL_A, TOKEN);
    batcher
        .independently_query(
            DataRequest::new("pool-detail")
                .on_chain(total_supply(POOL_A))
                .on_chain(shared.clone()),
        )
        .await
        .unwrap();
    let outcome = batcher
        .independently_query(
            DataRequest::new("portfolio")
                .on_chain(shared.clone())
                .on_chain(total_supply(POOL_B)),
        )
        .await
        .unwrap();
    assert_eq!(outcome.queued_on_chain, 2);
    assert_eq!(batcher.store().on_chain_batch().batch.len(), 3);

    let report = batcher.change_block_number(10).await.unwrap();
    assert!(report.block_changed);
    assert_eq!(report.on_chain_calls, 3);
    assert!(!report.on_chain_failed);

    let batches = executor.batches();
    assert_eq!(batches.len(), 1, "One multicall per block");
    assert_eq!(batches[0].len(), 3, "Shared call must be deduplicated");

    let received = drain_events(&mut events)
        .into_iter()
        .find_map(|event| match event {
            StoreEvent::MulticallDataReceived(data) => Some(data),
            _ => None,
        })
        .expect("multicall data should be published");
    assert_eq!(received.block_number, 10);
    assert_eq!(received.calls_to_results.len(), 3);
    assert_eq!(received.results_for(&shared.key()), Some(&["10".to_string()][..]));
    assert!(received.callers.contains_key(&CallerId::new("pool-detail")));
    assert!(received.callers.contains_key(&CallerId::new("portfolio")));

    assert_eq!(batcher.store().cache().len(), 3);
    assert!(batcher.store().on_chain_batch().is_empty());
}

#[tokio::test]
async fn test_cached_calls_are_served_without_round_trip() {
    let executor = MockExecutor::new(10);
    let mut batcher = connected_batcher(&executor).await;

    let request = DataRequest::new("pool-detail")
        .on_chain(total_supply(POOL_A))
        .on_chain(balance_of(POOL_A, TOKEN));
    batcher.independently_query(request.clone()).await.unwrap();
    batcher.change_block_number(10).await.unwrap();

    let mut events = batcher.subscribe();
    let outcome = batcher.independently_query(request).await.unwrap();
    assert_eq!(outcome.cached_on_chain, 2);
    assert_eq!(outcome.queued_on_chain, 0);

    let events = drain_events(&mut events);
    let cached = events
        .iter()
        .find_map(|event| match event {
            StoreEvent::CachedMulticallDataReceived(data) => Some(data),
            _ => None,
        })
        .expect("cached data should be published");
    assert!(cached.is_from_cache());
    assert_eq!(cached.block_number, 0);
    assert_eq!(
        cached.results_for(&total_supply(POOL_A).key()),
        Some(&["10".to_string()][..])
    );

    // Nothing pending, so the next block sends nothing
    let report = batcher.change_block_number(11).await.unwrap();
    assert_eq!(report.on_chain_calls, 0);
    assert_eq!(executor.batches().len(), 1);
}

#[tokio::test]
async fn test_cached_entries_survive_block_changes() -> anyhow::Result<()> {
    let executor = MockExecutor::new(10);
    let mut batcher = connected_batcher(&executor).await;

    batcher
        .independently_query(DataRequest::new("a").on_chain(total_supply(POOL_A)))
        .await?;
    batcher.change_block_number(10).await?;

    for block in 11..15 {
        batcher.change_block_number(block).await?;
    }

    let entry = batcher
        .store()
        .cache()
        .peek(&total_supply(POOL_A).key())
        .ok_or_else(|| anyhow::anyhow!("entry should still be cached"))?;
    assert_eq!(entry.block_number, 10);
    assert_eq!(batcher.store().block_number(), Some(14));
    Ok(())
}

#[tokio::test]
async fn test_same_block_number_is_a_no_op() -> anyhow::Result<()> {
    let executor = MockExecutor::new(10);
    let mut batcher = connected_batcher(&executor).await;
    batcher.change_block_number(10).await?;

    batcher
        .independently_query(DataRequest::new("a").on_chain(total_supply(POOL_A)))
        .await?;
    let report = batcher.change_block_number(10).await?;

    assert!(!report.block_changed);
    assert!(executor.batches().is_empty());
    assert_eq!(batcher.store().on_chain_batch().batch.len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failed_batch_is_retried_then_dropped() {
    let executor = MockExecutor::new(10);
    executor.set_mode(MockMode::Fail);

    let config = BatcherConfigBuilder::minimal()
        .retry(
            RetryPolicy::builder()
                .max_retries(2)
                .base_delay(Duration::from_millis(10))
                .build(),
        )
        .build();
    let mut batcher = batcher(config, OffChainRegistry::new());
    batcher.connect(mainnet_connection(&executor), None).await;
    let mut events = batcher.subscribe();

    batcher
        .independently_query(DataRequest::new("a").on_chain(total_supply(POOL_A)))
        .await
        .unwrap();
    let report = batcher.change_block_number(10).await.unwrap();

    assert!(report.on_chain_failed);
    assert_eq!(executor.attempts(), 3, "Initial attempt plus two retries");
    assert!(batcher.store().multicall_failed_at().is_some());
    assert!(batcher.store().on_chain_batch().is_empty(), "Failed batch is dropped");
    assert!(batcher.store().cache().is_empty());

    let failed = drain_events(&mut events)
        .into_iter()
        .any(|event| matches!(event, StoreEvent::MulticallFailed { calls: 1, .. }));
    assert!(failed, "MulticallFailed should be published");
}

#[tokio::test]
async fn test_misaligned_response_is_an_error() {
    let executor = MockExecutor::new(10);
    executor.set_mode(MockMode::DropLastResult);
    let mut batcher = connected_batcher(&executor).await;

    batcher
        .independently_query(
            DataRequest::new("a")
                .on_chain(total_supply(POOL_A))
                .on_chain(balance_of(POOL_A, TOKEN)),
        )
        .await
        .unwrap();
    let err = batcher.change_block_number(10).await.unwrap_err();

    assert!(matches!(
        err,
        BatcherError::Reconcile(ReconcileError::ResultCountMismatch {
            expected: 2,
            actual: 1,
            ..
        })
    ));
    assert!(batcher.store().cache().is_empty(), "Nothing is cached");
    assert!(batcher.store().multicall_failed_at().is_some());
}

#[tokio::test]
async fn test_malformed_call_is_rejected_for_its_caller_only() {
    let executor = MockExecutor::new(12);
    let mut batcher = connected_batcher(&executor).await;

    batcher
        .independently_query(DataRequest::new("pool-detail").on_chain(balance_of(POOL_A, TOKEN)))
        .await
        .unwrap();
    let err = batcher
        .independently_query(
            DataRequest::new("broken")
                .on_chain(total_supply(POOL_B))
                .on_chain(
                    OnChainCall::new(POOL_B, "balanceOf(address)(uint256)")
                        .arg("not-an-address"),
                ),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BatcherError::Call(CallError::InvalidArgument { index: 0, .. })
    ));

    let pending = batcher.store().on_chain_batch();
    assert_eq!(pending.batch.len(), 1, "Nothing from the rejected request is queued");
    assert!(!pending.callers.contains_key(&CallerId::new("broken")));

    let report = batcher.change_block_number(12).await.unwrap();
    assert!(!report.on_chain_failed);
    assert_eq!(batcher.store().cache().len(), 1);

    let calldata = executor.calldata();
    assert_eq!(calldata.len(), 1);
    assert_eq!(&calldata[0][0][..4], &keccak256("getBalance(address)")[..4]);
}

#[tokio::test]
async fn test_send_on_chain_batch_while_disconnected() {
    let mut batcher = batcher(BatcherConfig::minimal(), OffChainRegistry::new());
    let config = poolbatch::BatchConfig::for_caller(
        CallerId::new("a"),
        Default::default(),
        poolbatch::create_on_chain_batch([total_supply(POOL_A)]),
    );

    let outcome = batcher.send_on_chain_batch(config).await.unwrap();
    assert_eq!(outcome, OnChainOutcome::NotConnected);
}

#[tokio::test]
async fn test_disconnect_purges_everything() {
    let executor = MockExecutor::new(10);
    let mut batcher = connected_batcher(&executor).await;

    batcher
        .independently_query(DataRequest::new("a").on_chain(total_supply(POOL_A)))
        .await
        .unwrap();
    batcher.change_block_number(10).await.unwrap();
    batcher
        .independently_query(DataRequest::new("a").on_chain(total_supply(POOL_B)))
        .await
        .unwrap();

    let mut events = batcher.subscribe();
    batcher.disconnect();

    assert!(!batcher.is_connected());
    assert!(batcher.store().cache().is_empty());
    assert!(batcher.store().on_chain_batch().is_empty());
    assert_eq!(batcher.store().block_number(), None);
    assert!(drain_events(&mut events).contains(&StoreEvent::CachePurged));

    // Uncached calls are not queued without a connection
    let outcome = batcher
        .independently_query(DataRequest::new("a").on_chain(total_supply(POOL_A)))
        .await
        .unwrap();
    assert_eq!(outcome.queued_on_chain, 0);
    assert!(batcher.store().on_chain_batch().is_empty());

    // After reconnecting the same request misses the cache and goes out again
    batcher.connect(mainnet_connection(&executor), None).await;
    let outcome = batcher
        .independently_query(DataRequest::new("a").on_chain(total_supply(POOL_A)))
        .await
        .unwrap();
    assert_eq!(outcome.cached_on_chain, 0);
    assert_eq!(outcome.queued_on_chain, 1);

    batcher.change_block_number(11).await.unwrap();
    assert_eq!(executor.batches().len(), 2);
    assert_eq!(batcher.store().cache().len(), 1);
}

#[tokio::test]
async fn test_connect_with_block_number_purges_cache() {
    let executor = MockExecutor::new(10);
    let mut batcher = connected_batcher(&executor).await;
    batcher
        .independently_query(DataRequest::new("a").on_chain(total_supply(POOL_A)))
        .await
        .unwrap();
    batcher.change_block_number(10).await.unwrap();
    assert_eq!(batcher.store().cache().len(), 1);

    // Reconnecting to the same chain without a block keeps the cache
    batcher.connect(mainnet_connection(&executor), None).await;
    assert_eq!(batcher.store().cache().len(), 1);

    let mut events = batcher.subscribe();
    batcher.connect(mainnet_connection(&executor), Some(20)).await;

    assert!(batcher.store().cache().is_empty());
    assert_eq!(batcher.store().block_number(), Some(20));
    let events = drain_events(&mut events);
    assert!(events.contains(&StoreEvent::BlockNumberChanged {
        previous: Some(10),
        current: 20,
    }));
    assert!(events.contains(&StoreEvent::CachePurged));
}

#[tokio::test]
async fn test_chain_change_drops_pending_work() {
    let executor = MockExecutor::new(10);
    let mut batcher = connected_batcher(&executor).await;
    batcher
        .independently_query(DataRequest::new("a").on_chain(total_supply(POOL_A)))
        .await
        .unwrap();
    assert_eq!(batcher.store().on_chain_batch().batch.len(), 1);

    let polygon = Connection::new(
        ConnectionContext::new(NamedChain::Polygon),
        Arc::clone(&executor) as Arc<dyn MulticallExecutor>,
    );
    batcher.connect(polygon, None).await;

    assert_eq!(batcher.connection().map(|c| c.chain_id()), Some(137));
    assert!(batcher.store().on_chain_batch().is_empty());
}

#[tokio::test]
async fn test_off_chain_results_are_cached() {
    let source = MockOffChainSource::new(OffChainKind::PriceStats);
    let registry = OffChainRegistry::new().with_source(source.clone());
    let mut batcher = batcher(BatcherConfig::minimal(), registry);
    let mut events = batcher.subscribe();

    let call = OffChainCall::new(OffChainKind::PriceStats).arg("0xabc");
    let request = DataRequest::new("prices").off_chain(call.clone());

    let first = batcher.independently_query(request.clone()).await.unwrap();
    assert_eq!(first.dispatched_off_chain, 1);

    let second = batcher.independently_query(request).await.unwrap();
    assert_eq!(second.cached_off_chain, 1);
    assert_eq!(second.dispatched_off_chain, 0);
    assert_eq!(source.fetches(), 1);

    let received: Vec<_> = drain_events(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            StoreEvent::OffChainDataReceived {
                key,
                from_cache,
                payload,
                ..
            } => Some((key, from_cache, payload)),
            _ => None,
        })
        .collect();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].0, call.key());
    assert!(!received[0].1);
    assert!(received[1].1);
    assert_eq!(received[0].2, received[1].2);
    assert_eq!(received[1].2["args"][0], "0xabc");
}

#[tokio::test]
async fn test_failing_off_chain_kind_cools_down() {
    let source = MockOffChainSource::new(OffChainKind::PriceStats);
    source.set_failing(true);
    let registry = OffChainRegistry::new().with_source(source.clone());
    let config = BatcherConfigBuilder::minimal()
        .off_chain_cooldown(Duration::from_secs(60))
        .build();
    let mut batcher = batcher(config, registry);
    let mut events = batcher.subscribe();

    let request =
        DataRequest::new("prices").off_chain(OffChainCall::new(OffChainKind::PriceStats).arg("0xabc"));

    batcher.independently_query(request.clone()).await.unwrap();
    assert!(batcher
        .store()
        .off_chain_failed_at(OffChainKind::PriceStats)
        .is_some());
    assert!(drain_events(&mut events)
        .iter()
        .any(|event| matches!(event, StoreEvent::OffChainRequestFailed { .. })));

    source.set_failing(false);
    let outcome = batcher.independently_query(request).await.unwrap();
    assert_eq!(outcome.dispatched_off_chain, 0, "Kind is cooling down");
    assert_eq!(source.fetches(), 1);
}

#[tokio::test]
async fn test_zero_cooldown_retries_immediately() {
    let source = MockOffChainSource::new(OffChainKind::PriceStats);
    source.set_failing(true);
    let registry = OffChainRegistry::new().with_source(source.clone());
    let mut batcher = batcher(BatcherConfig::minimal(), registry);

    let request = DataRequest::new("prices").off_chain(OffChainCall::new(OffChainKind::PriceStats));
    batcher.independently_query(request.clone()).await.unwrap();

    source.set_failing(false);
    let outcome = batcher.independently_query(request).await.unwrap();
    assert_eq!(outcome.dispatched_off_chain, 1);
    assert!(batcher
        .store()
        .off_chain_failed_at(OffChainKind::PriceStats)
        .is_none());
}

#[tokio::test]
async fn test_connection_bound_sources_wait_for_connection() {
    let source = MockOffChainSource::connected(OffChainKind::StakingData);
    let registry = OffChainRegistry::new().with_source(source.clone());
    let mut batcher = batcher(BatcherConfig::minimal(), registry);

    let outcome = batcher
        .independently_query(
            DataRequest::new("staking").off_chain(OffChainCall::new(OffChainKind::StakingData)),
        )
        .await
        .unwrap();

    assert_eq!(outcome.dispatched_off_chain, 0);
    assert_eq!(source.fetches(), 0);
}

#[tokio::test]
async fn test_connect_runs_initial_off_chain_calls() {
    let source = MockOffChainSource::connected(OffChainKind::StakingData);
    let registry = OffChainRegistry::new().with_source(source.clone());
    let config = BatcherConfigBuilder::minimal()
        .initial_off_chain_call(OffChainCall::new(OffChainKind::StakingData))
        .build();
    let mut batcher = batcher(config, registry);

    let executor = MockExecutor::new(10);
    batcher.connect(mainnet_connection(&executor), Some(10)).await;

    assert_eq!(source.fetches(), 1);
    let entry = batcher
        .store()
        .cache()
        .peek(&OffChainCall::new(OffChainKind::StakingData).key())
        .expect("staking data should be cached");
    assert_eq!(entry.block_number, 10);
}

#[tokio::test]
async fn test_default_initial_load_publishes_index_pools_before_staking() {
    let pools = MockOffChainSource::connected(OffChainKind::IndexPools);
    let staking = MockOffChainSource::connected(OffChainKind::StakingData);
    let registry = OffChainRegistry::new()
        .with_source(pools.clone())
        .with_source(staking.clone());
    let mut batcher = batcher(BatcherConfig::default(), registry);
    let mut events = batcher.subscribe();

    let executor = MockExecutor::new(3);
    batcher.connect(mainnet_connection(&executor), Some(3)).await;

    assert_eq!((pools.fetches(), staking.fetches()), (1, 1));
    let loaded: Vec<OffChainKind> = drain_events(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            StoreEvent::OffChainDataReceived { kind, .. } => Some(kind),
            _ => None,
        })
        .collect();
    assert_eq!(loaded, vec![OffChainKind::IndexPools, OffChainKind::StakingData]);
}

#[tokio::test]
async fn test_pending_off_chain_calls_refresh_on_next_block() {
    let source = MockOffChainSource::connected(OffChainKind::PoolTradesAndSwaps);
    let registry = OffChainRegistry::new().with_source(source.clone());
    let mut batcher = batcher(BatcherConfig::minimal(), registry);
    let executor = MockExecutor::new(10);
    batcher.connect(mainnet_connection(&executor), Some(9)).await;

    let call = OffChainCall::new(OffChainKind::PoolTradesAndSwaps).arg(POOL_A);
    batcher
        .independently_query(DataRequest::new("activity").off_chain(call))
        .await
        .unwrap();
    assert_eq!(source.fetches(), 1);

    let report = batcher.change_block_number(10).await.unwrap();
    assert_eq!(report.off_chain_calls, 1);
    assert_eq!(source.fetches(), 2);

    let report = batcher.change_block_number(11).await.unwrap();
    assert_eq!(report.off_chain_calls, 0);
    assert_eq!(source.fetches(), 2);
}
