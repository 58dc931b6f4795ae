// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! State owned by the batcher and the events it publishes.
//!
//! The [`Store`] holds the last observed block number, the result cache, the
//! two pending batch accumulators and the failure timestamps. It is readable
//! from outside but only the dispatcher mutates it. Every state change is
//! announced as a [`StoreEvent`] on a broadcast channel; that channel is the
//! only way results reach callers.

use alloy_primitives::BlockNumber;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::trace;

use crate::batch::{BatchConfig, OffChainBatch};
use crate::cache::{CallCache, TimestampMillis};
use crate::calls::{CallKey, OffChainKind};
use crate::reconcile::MulticallData;

/// State changes published by the batcher.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// A new chain head was accepted.
    BlockNumberChanged {
        /// The block number before the change, if any
        previous: Option<BlockNumber>,
        /// The new block number
        current: BlockNumber,
    },

    /// The cache was cleared.
    CachePurged,

    /// An on-chain batch is about to be sent.
    MulticallDataRequested {
        /// Calls in the batch
        calls: usize,
    },

    /// Fresh on-chain results arrived and were cached.
    MulticallDataReceived(MulticallData),

    /// On-chain results were served from the cache (block number 0).
    CachedMulticallDataReceived(MulticallData),

    /// An on-chain batch failed after all retries and was dropped.
    MulticallFailed {
        /// Calls in the dropped batch
        calls: usize,
        /// Rendered error
        error: String,
        /// When the failure was recorded
        at: TimestampMillis,
    },

    /// An off-chain payload is available.
    OffChainDataReceived {
        /// The call it answers
        key: CallKey,
        /// Source kind
        kind: OffChainKind,
        /// Block current when it was fetched, 0 if unknown or served from
        /// the cache
        block_number: BlockNumber,
        /// Whether the payload was served from the cache
        from_cache: bool,
        /// Normalized payload
        payload: serde_json::Value,
    },

    /// An off-chain request failed.
    OffChainRequestFailed {
        /// The call that failed
        key: CallKey,
        /// Source kind, cooling down from now on
        kind: OffChainKind,
        /// Rendered error
        error: String,
        /// When the failure was recorded
        at: TimestampMillis,
    },
}

/// The batcher's state.
#[derive(Debug)]
pub struct Store {
    block_number: Option<BlockNumber>,
    cache: CallCache,
    on_chain_batch: BatchConfig,
    off_chain_batch: OffChainBatch,
    multicall_failed_at: Option<TimestampMillis>,
    off_chain_failed_at: HashMap<OffChainKind, TimestampMillis>,
    events: broadcast::Sender<StoreEvent>,
}

impl Store {
    pub(crate) fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            block_number: None,
            cache: CallCache::new(),
            on_chain_batch: BatchConfig::default(),
            off_chain_batch: OffChainBatch::default(),
            multicall_failed_at: None,
            off_chain_failed_at: HashMap::new(),
            events,
        }
    }

    /// Last accepted block number.
    pub fn block_number(&self) -> Option<BlockNumber> {
        self.block_number
    }

    /// The result cache.
    pub fn cache(&self) -> &CallCache {
        &self.cache
    }

    /// On-chain calls waiting for the next block.
    pub fn on_chain_batch(&self) -> &BatchConfig {
        &self.on_chain_batch
    }

    /// Off-chain calls waiting for the next block.
    pub fn off_chain_batch(&self) -> &OffChainBatch {
        &self.off_chain_batch
    }

    /// When the last on-chain batch failed.
    pub fn multicall_failed_at(&self) -> Option<TimestampMillis> {
        self.multicall_failed_at
    }

    /// When the last request of an off-chain kind failed.
    pub fn off_chain_failed_at(&self, kind: OffChainKind) -> Option<TimestampMillis> {
        self.off_chain_failed_at.get(&kind).copied()
    }

    /// Subscribes to store events.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub(crate) fn cache_mut(&mut self) -> &mut CallCache {
        &mut self.cache
    }

    pub(crate) fn set_block_number(&mut self, block_number: Option<BlockNumber>) {
        self.block_number = block_number;
    }

    pub(crate) fn on_chain_batch_mut(&mut self) -> &mut BatchConfig {
        &mut self.on_chain_batch
    }

    pub(crate) fn off_chain_batch_mut(&mut self) -> &mut OffChainBatch {
        &mut self.off_chain_batch
    }

    /// Takes both pending batches, leaving empty ones behind.
    pub(crate) fn take_batches(&mut self) -> (BatchConfig, OffChainBatch) {
        (
            std::mem::take(&mut self.on_chain_batch),
            std::mem::take(&mut self.off_chain_batch),
        )
    }

    pub(crate) fn record_multicall_failure(&mut self) -> TimestampMillis {
        let at = TimestampMillis::now();
        self.multicall_failed_at = Some(at);
        at
    }

    pub(crate) fn record_off_chain_failure(&mut self, kind: OffChainKind) -> TimestampMillis {
        let at = TimestampMillis::now();
        self.off_chain_failed_at.insert(kind, at);
        at
    }

    pub(crate) fn clear_off_chain_failure(&mut self, kind: OffChainKind) {
        self.off_chain_failed_at.remove(&kind);
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub(crate) fn publish(&self, event: StoreEvent) {
        if self.events.send(event).is_err() {
            trace!("No subscribers for store event");
        }
    }
}
