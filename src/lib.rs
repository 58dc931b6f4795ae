// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Block-driven batching of contract reads and off-chain queries.
//!
//! Many independent callers ask for pool data. Their on-chain reads are
//! deduplicated, grouped by contract and sent as a single Multicall3
//! `aggregate3` per block; off-chain queries (token prices, pool trades,
//! staking data) go to HTTP sources. Every result is cached by its call key
//! and published on a broadcast channel as a [`StoreEvent`].
//!
//! # Overview
//!
//! - [`Batcher`]: the dispatcher. Splits requests into cached and uncached
//!   calls, flushes pending batches on block changes, reconciles responses.
//! - [`BatcherJob`]: runs a [`Batcher`] on its own task, debouncing block
//!   notifications, and hands out cloneable [`BatcherHandle`]s.
//! - [`MulticallExecutor`]: the seam to the chain. [`Multicall3Executor`] is
//!   the provider-backed implementation.
//! - [`OffChainRegistry`]: the off-chain sources by [`OffChainKind`].
//!
//! # Example
//!
//! ```rust,ignore
//! use poolbatch::{
//!     http_connection, poll_block_numbers, Batcher, BatcherConfig, BatcherJob, DataRequest,
//!     OffChainRegistry, OnChainCall, ProviderConfig, BLOCK_POLL_INTERVAL,
//! };
//! use alloy_chains::NamedChain;
//!
//! let config = BatcherConfig::default();
//! let connection = http_connection(
//!     ProviderConfig::new("https://eth.llamarpc.com"),
//!     NamedChain::Mainnet,
//!     &config,
//! )?;
//!
//! let batcher = Batcher::new(config, OffChainRegistry::with_default_sources(reqwest::Client::new()));
//! let handle = BatcherJob::init(batcher);
//! let mut events = handle.subscribe().await?;
//! handle.connect(connection, None).await?;
//!
//! handle
//!     .query(
//!         DataRequest::new("pool-detail")
//!             .on_chain(OnChainCall::new(pool, "getBalance(address)(uint256)").arg(token)),
//!     )
//!     .await?;
//!
//! let provider = poolbatch::create_http_provider(ProviderConfig::new("https://eth.llamarpc.com"))?;
//! handle.feed_blocks(poll_block_numbers(provider, BLOCK_POLL_INTERVAL));
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

pub mod batch;
pub mod blocks;
pub mod cache;
pub mod calls;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod errors;
pub mod job;
pub mod multicall;
pub mod offchain;
pub mod provider;
pub mod reconcile;
pub mod retry;
mod spans;
pub mod store;

pub use batch::{create_on_chain_batch, BatchConfig, CallerCalls, Callers, OffChainBatch, OnChainBatch};
#[cfg(feature = "ws")]
pub use blocks::subscribe_block_numbers;
pub use blocks::{debounce_block_events, poll_block_numbers, BlockDebouncer, MIN_POLL_INTERVAL};
pub use cache::{CacheEntry, CacheStats, CallCache, TimestampMillis};
pub use calls::{
    serialize_off_chain_call, serialize_on_chain_call, CallKey, CallerId, OffChainCall,
    OffChainKind, OnChainCall,
};
pub use config::constants::{
    BLOCK_DEBOUNCE, BLOCK_POLL_INTERVAL, MULTICALL3_ADDRESS, OFF_CHAIN_COOLDOWN,
};
pub use config::{BatcherConfig, BatcherConfigBuilder};
pub use connection::{Connection, ConnectionContext};
pub use dispatcher::{Batcher, DataRequest, FlushReport, OnChainOutcome, QueryOutcome};
pub use errors::*;
pub use job::{BatcherHandle, BatcherJob};
pub use multicall::{Multicall3Executor, MulticallExecutor, MulticallResponse};
pub use offchain::{
    CoingeckoSource, IndexPoolsSource, OffChainAction, OffChainRegistry, OffChainSource,
    PoolActivitySource, StakingSource, SubgraphEndpoints,
};
#[cfg(feature = "ws")]
pub use provider::create_ws_provider;
pub use provider::{create_http_provider, http_connection, ProviderConfig};
pub use reconcile::{format_multicall_data, EncodeField, MulticallData, CACHED_BLOCK_NUMBER};
pub use retry::{RetryPolicy, RetryPolicyBuilder};
pub use store::{Store, StoreEvent};
