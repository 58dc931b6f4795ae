// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Per-block orchestration of data requests.
//!
//! The [`Batcher`] is the only writer of the [`Store`]. Its entry points are:
//!
//! - [`independently_query`](Batcher::independently_query): a caller asks for a
//!   set of on-chain and off-chain calls. Cached calls are answered at once
//!   (with block number 0), uncached on-chain calls wait in the pending batch
//!   for the next block, uncached off-chain calls are fetched right away.
//! - [`change_block_number`](Batcher::change_block_number): a new chain head
//!   flushes both pending batches. The on-chain batch goes out as one
//!   multicall; its results are reconciled, cached and published.
//! - [`connect`](Batcher::connect) / [`disconnect`](Batcher::disconnect):
//!   install or drop the [`Connection`] that reaches the chain.
//!
//! Network and off-chain failures never surface as errors here: they are
//! recorded as failure timestamps and published as events. Only defects are
//! returned as [`BatcherError`]: a malformed call is rejected when it is
//! requested, so it never reaches a batch shared with other callers, and a
//! response that does not line up with its batch fails the flush.

use alloy_primitives::BlockNumber;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn, Instrument};

use crate::batch::{create_on_chain_batch, BatchConfig, CallerCalls, OffChainBatch};
use crate::calls::{CallKey, CallerId, OffChainCall, OffChainKind, OnChainCall};
use crate::config::BatcherConfig;
use crate::connection::{Connection, ConnectionContext};
use crate::errors::{BatcherError, MulticallError};
use crate::offchain::{deserialize_off_chain_call, OffChainAction, OffChainRegistry};
use crate::reconcile::{format_multicall_data, MulticallData, CACHED_BLOCK_NUMBER};
use crate::retry::with_retry;
use crate::spans;
use crate::store::{Store, StoreEvent};

/// The calls one caller wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
    /// Who is asking
    pub caller: CallerId,
    /// Contract reads
    pub on_chain: Vec<OnChainCall>,
    /// Off-chain queries
    pub off_chain: Vec<OffChainCall>,
}

impl DataRequest {
    /// An empty request for `caller`.
    pub fn new(caller: impl Into<CallerId>) -> Self {
        Self {
            caller: caller.into(),
            on_chain: Vec::new(),
            off_chain: Vec::new(),
        }
    }

    /// Adds an on-chain call.
    #[must_use]
    pub fn on_chain(mut self, call: OnChainCall) -> Self {
        self.on_chain.push(call);
        self
    }

    /// Adds an off-chain call.
    #[must_use]
    pub fn off_chain(mut self, call: OffChainCall) -> Self {
        self.off_chain.push(call);
        self
    }

    /// Adds several on-chain calls.
    #[must_use]
    pub fn with_on_chain(mut self, calls: impl IntoIterator<Item = OnChainCall>) -> Self {
        self.on_chain.extend(calls);
        self
    }

    /// Adds several off-chain calls.
    #[must_use]
    pub fn with_off_chain(mut self, calls: impl IntoIterator<Item = OffChainCall>) -> Self {
        self.off_chain.extend(calls);
        self
    }
}

/// How a request was split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOutcome {
    /// On-chain calls answered from the cache
    pub cached_on_chain: usize,
    /// On-chain calls added to the pending batch
    pub queued_on_chain: usize,
    /// Off-chain calls answered from the cache
    pub cached_off_chain: usize,
    /// Off-chain calls fetched immediately
    pub dispatched_off_chain: usize,
}

/// What happened to a pending on-chain batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnChainOutcome {
    /// There was nothing to send.
    Empty,
    /// There was no connection to send through.
    NotConnected,
    /// The batch failed after all retries and was dropped.
    Failed,
    /// Results arrived and were cached.
    Received(MulticallData),
}

/// Summary of a block change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Whether the block number actually changed
    pub block_changed: bool,
    /// On-chain calls flushed
    pub on_chain_calls: usize,
    /// Whether the on-chain batch failed
    pub on_chain_failed: bool,
    /// Off-chain calls flushed
    pub off_chain_calls: usize,
}

/// Batches, caches and dispatches on-chain and off-chain calls.
///
/// # Example
///
/// ```rust,ignore
/// use poolbatch::{Batcher, BatcherConfig, Connection, ConnectionContext, DataRequest};
/// use poolbatch::{Multicall3Executor, OffChainRegistry, OnChainCall};
/// use alloy_chains::NamedChain;
/// use std::sync::Arc;
///
/// let mut batcher = Batcher::new(
///     BatcherConfig::default(),
///     OffChainRegistry::with_default_sources(reqwest::Client::new()),
/// );
/// let mut events = batcher.subscribe();
///
/// let executor = Arc::new(Multicall3Executor::new(provider));
/// batcher
///     .connect(Connection::new(ConnectionContext::new(NamedChain::Mainnet), executor), None)
///     .await;
///
/// batcher
///     .independently_query(
///         DataRequest::new("pool-detail")
///             .on_chain(OnChainCall::new(pool, "totalSupply()(uint256)")),
///     )
///     .await?;
/// batcher.change_block_number(head).await?;
/// ```
#[derive(Debug)]
pub struct Batcher {
    config: BatcherConfig,
    registry: OffChainRegistry,
    store: Store,
    connection: Option<Connection>,
}

impl Batcher {
    /// Creates a disconnected batcher with an empty store.
    pub fn new(config: BatcherConfig, registry: OffChainRegistry) -> Self {
        let store = Store::new(config.event_capacity);
        Self {
            config,
            registry,
            store,
            connection: None,
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &BatcherConfig {
        &self.config
    }

    /// Read access to the store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Subscribes to store events.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    /// Context of the active connection.
    pub fn connection(&self) -> Option<&ConnectionContext> {
        self.connection.as_ref().map(|c| &c.context)
    }

    /// Whether a connection is installed.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Installs a connection and runs the initial data load.
    ///
    /// The cache is purged when `block_number` is known, and whenever the
    /// chain or account differs from the previous connection. Pending batches
    /// are dropped on a chain or account change as well.
    pub async fn connect(&mut self, connection: Connection, block_number: Option<BlockNumber>) {
        let span = spans::connect(&connection.context, block_number);
        async {
            let context_changed = self
                .connection
                .as_ref()
                .is_some_and(|previous| previous.context != connection.context);

            info!(
                chain = %connection.context.chain,
                account = ?connection.context.account,
                "Connecting"
            );
            self.connection = Some(connection);

            if context_changed {
                self.store.take_batches();
            }
            if let Some(block_number) = block_number {
                self.accept_block_number(block_number);
            }
            if block_number.is_some() || context_changed {
                self.purge_cache();
            }

            let initial: Vec<CallKey> = self
                .config
                .initial_off_chain_calls
                .iter()
                .map(OffChainCall::key)
                .collect();
            self.dispatch_off_chain(initial).await;
        }
        .instrument(span)
        .await
    }

    /// Drops the connection, purges the cache, clears pending batches and
    /// forgets the block number.
    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            info!(chain = %connection.context.chain, "Disconnecting");
        }
        self.store.take_batches();
        self.store.set_block_number(None);
        self.purge_cache();
    }

    /// Splits a caller's request into cached and uncached calls.
    ///
    /// Cached on-chain calls are reconciled immediately and published as
    /// [`StoreEvent::CachedMulticallDataReceived`] with block number 0.
    /// Uncached on-chain calls join the pending batch when connected. Cached
    /// off-chain calls are published from the cache, the rest are fetched now
    /// and also registered for refresh on the next block.
    ///
    /// # Errors
    ///
    /// Returns [`BatcherError::Call`] if any on-chain call cannot be encoded.
    /// Nothing from the request is queued, cached or published then.
    pub async fn independently_query(
        &mut self,
        request: DataRequest,
    ) -> Result<QueryOutcome, BatcherError> {
        let span = spans::independently_query(
            &request.caller,
            request.on_chain.len(),
            request.off_chain.len(),
        );
        self.split_and_dispatch(request).instrument(span).await
    }

    async fn split_and_dispatch(
        &mut self,
        request: DataRequest,
    ) -> Result<QueryOutcome, BatcherError> {
        let DataRequest {
            caller,
            on_chain,
            off_chain,
        } = request;

        for call in &on_chain {
            if let Err(e) = call.encode() {
                warn!(caller = %caller, key = %call.key(), error = %e, "Rejecting malformed call");
                return Err(e.into());
            }
        }

        let mut caller_calls = CallerCalls::default();
        caller_calls.merge(CallerCalls {
            on_chain: on_chain.iter().map(OnChainCall::key).collect(),
            off_chain: off_chain.iter().map(OffChainCall::key).collect(),
        });

        let mut outcome = QueryOutcome::default();

        let cache = self.store.cache_mut();
        let (cached, not_cached): (Vec<_>, Vec<_>) = on_chain
            .into_iter()
            .partition(|call| cache.get(&call.key()).is_some());

        if !cached.is_empty() {
            let batch = create_on_chain_batch(cached);
            let results: Vec<Vec<String>> = batch
                .ordered_keys()
                .map(|key| {
                    self.store
                        .cache()
                        .peek(key)
                        .map(|entry| entry.results.clone())
                        .unwrap_or_default()
                })
                .collect();

            let config = BatchConfig::for_caller(caller.clone(), caller_calls.clone(), batch);
            let data = format_multicall_data(&config, CACHED_BLOCK_NUMBER, &results)?;
            outcome.cached_on_chain = data.calls_to_results.len();
            self.store
                .publish(StoreEvent::CachedMulticallDataReceived(data));
        }

        if self.connection.is_some() {
            if !not_cached.is_empty() {
                let batch = create_on_chain_batch(not_cached);
                outcome.queued_on_chain = batch.len();
                self.store.on_chain_batch_mut().merge(BatchConfig::for_caller(
                    caller.clone(),
                    caller_calls.clone(),
                    batch,
                ));
            }
            self.store
                .off_chain_batch_mut()
                .extend(caller_calls.off_chain.iter().cloned());
        } else if !not_cached.is_empty() {
            debug!(
                caller = %caller,
                calls = not_cached.len(),
                "Not connected, on-chain calls not queued"
            );
        }

        let mut to_fetch = Vec::new();
        for key in caller_calls.off_chain {
            match self.cached_off_chain(&key) {
                Some((kind, payload)) => {
                    outcome.cached_off_chain += 1;
                    self.store.publish(StoreEvent::OffChainDataReceived {
                        key,
                        kind,
                        block_number: CACHED_BLOCK_NUMBER,
                        from_cache: true,
                        payload,
                    });
                }
                None => to_fetch.push(key),
            }
        }
        outcome.dispatched_off_chain = self.dispatch_off_chain(to_fetch).await;

        debug!(
            caller = %caller,
            cached_on_chain = outcome.cached_on_chain,
            queued_on_chain = outcome.queued_on_chain,
            cached_off_chain = outcome.cached_off_chain,
            dispatched_off_chain = outcome.dispatched_off_chain,
            "Request split"
        );
        Ok(outcome)
    }

    /// Accepts a new chain head and flushes both pending batches.
    ///
    /// A block number equal to the current one is a no-op. Results of the
    /// flushed on-chain batch are cached at the block the multicall reports.
    pub async fn change_block_number(
        &mut self,
        block_number: BlockNumber,
    ) -> Result<FlushReport, BatcherError> {
        let previous = self.store.block_number();
        if previous == Some(block_number) {
            return Ok(FlushReport::default());
        }

        let span = spans::change_block_number(previous, block_number);
        async {
            self.accept_block_number(block_number);

            let (on_chain, off_chain) = self.store.take_batches();
            let on_chain_calls = on_chain.batch.len();

            let on_chain_result = self.send_on_chain_batch(on_chain).await;
            let off_chain_calls = self.send_off_chain_batch(off_chain).await;

            Ok::<_, BatcherError>(FlushReport {
                block_changed: true,
                on_chain_calls,
                on_chain_failed: matches!(on_chain_result?, OnChainOutcome::Failed),
                off_chain_calls,
            })
        }
        .instrument(span)
        .await
    }

    /// Sends an on-chain batch as one multicall, retrying transient failures.
    ///
    /// On success the results are reconciled, written to the cache and
    /// published as [`StoreEvent::MulticallDataReceived`]. When every attempt
    /// fails, the failure time is recorded, [`StoreEvent::MulticallFailed`] is
    /// published and the batch is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`BatcherError::Reconcile`] if the response does not line up
    /// with the batch. Nothing is cached in that case.
    pub async fn send_on_chain_batch(
        &mut self,
        config: BatchConfig,
    ) -> Result<OnChainOutcome, BatcherError> {
        if config.batch.is_empty() {
            return Ok(OnChainOutcome::Empty);
        }
        let Some(executor) = self.connection.as_ref().map(|c| Arc::clone(&c.executor)) else {
            debug!(calls = config.batch.len(), "Not connected, dropping on-chain batch");
            return Ok(OnChainOutcome::NotConnected);
        };

        let calls = config.batch.deserialized_calls();
        let span = spans::send_on_chain_batch(calls.len(), config.callers.len());
        async {
            self.store
                .publish(StoreEvent::MulticallDataRequested { calls: calls.len() });

            let response = with_retry(
                &self.config.retry,
                || executor.multicall(&calls),
                MulticallError::is_retryable,
            )
            .await;

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, calls = calls.len(), "Dropping failed on-chain batch");
                    self.record_multicall_failure(calls.len(), e.to_string());
                    return Ok(OnChainOutcome::Failed);
                }
            };

            let data = match format_multicall_data(&config, response.block_number, &response.results)
            {
                Ok(data) => data,
                Err(e) => {
                    error!(
                        error = %e,
                        block_number = response.block_number,
                        "Multicall response does not match its batch"
                    );
                    self.record_multicall_failure(calls.len(), e.to_string());
                    return Err(BatcherError::Reconcile(e));
                }
            };

            let cache = self.store.cache_mut();
            for (key, results) in &data.calls_to_results {
                cache.put(key.clone(), results.clone(), data.block_number);
            }

            info!(
                calls = calls.len(),
                block_number = data.block_number,
                "Multicall data received"
            );
            self.store
                .publish(StoreEvent::MulticallDataReceived(data.clone()));
            Ok(OnChainOutcome::Received(data))
        }
        .instrument(span)
        .await
    }

    /// Fetches every call in an off-chain batch. Returns how many were sent.
    pub async fn send_off_chain_batch(&mut self, batch: OffChainBatch) -> usize {
        if batch.is_empty() {
            return 0;
        }
        let span = spans::send_off_chain_batch(batch.len());
        self.dispatch_off_chain(batch.into_iter().collect())
            .instrument(span)
            .await
    }

    /// Resolves, filters and runs off-chain calls concurrently, then records
    /// each outcome.
    ///
    /// Calls that do not resolve, need a missing connection, or belong to a
    /// kind still cooling down after a failure are skipped.
    async fn dispatch_off_chain(&mut self, keys: Vec<CallKey>) -> usize {
        let context = self.connection().copied();

        let actions: Vec<OffChainAction> = keys
            .iter()
            .filter_map(|key| deserialize_off_chain_call(key, &self.registry))
            .filter(|action| {
                if action.requires_connection() && context.is_none() {
                    debug!(key = %action.key(), "Not connected, skipping off-chain call");
                    return false;
                }
                if self.is_cooling_down(action.kind()) {
                    debug!(key = %action.key(), "Off-chain kind cooling down, skipping");
                    return false;
                }
                true
            })
            .collect();

        if actions.is_empty() {
            return 0;
        }

        let results = join_all(actions.iter().map(|action| action.run(context.as_ref()))).await;
        let block_number = self.store.block_number().unwrap_or(CACHED_BLOCK_NUMBER);

        for (action, result) in actions.iter().zip(results) {
            let key = action.key().clone();
            let kind = action.kind();
            match result {
                Ok(payload) => {
                    self.store.clear_off_chain_failure(kind);
                    self.store
                        .cache_mut()
                        .put(key.clone(), vec![payload.to_string()], block_number);
                    self.store.publish(StoreEvent::OffChainDataReceived {
                        key,
                        kind,
                        block_number,
                        from_cache: false,
                        payload,
                    });
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Off-chain request failed");
                    let at = self.store.record_off_chain_failure(kind);
                    self.store.publish(StoreEvent::OffChainRequestFailed {
                        key,
                        kind,
                        error: e.to_string(),
                        at,
                    });
                }
            }
        }

        actions.len()
    }

    /// Cached payload of an off-chain call, if any.
    fn cached_off_chain(&mut self, key: &CallKey) -> Option<(OffChainKind, Value)> {
        let kind = key.name_segment().parse().ok()?;
        let entry = self.store.cache_mut().get(key)?;
        let payload = serde_json::from_str(entry.results.first()?).ok()?;
        Some((kind, payload))
    }

    fn is_cooling_down(&self, kind: OffChainKind) -> bool {
        let cooldown = self.config.off_chain_cooldown;
        !cooldown.is_zero()
            && self
                .store
                .off_chain_failed_at(kind)
                .is_some_and(|at| !at.is_older_than(cooldown))
    }

    fn accept_block_number(&mut self, block_number: BlockNumber) {
        let previous = self.store.block_number();
        if previous == Some(block_number) {
            return;
        }
        self.store.set_block_number(Some(block_number));
        debug!(?previous, block_number, "Block number changed");
        self.store.publish(StoreEvent::BlockNumberChanged {
            previous,
            current: block_number,
        });
    }

    fn record_multicall_failure(&mut self, calls: usize, error: String) {
        let at = self.store.record_multicall_failure();
        self.store
            .publish(StoreEvent::MulticallFailed { calls, error, at });
    }

    fn purge_cache(&mut self) {
        self.store.cache_mut().purge();
        self.store.publish(StoreEvent::CachePurged);
    }
}
