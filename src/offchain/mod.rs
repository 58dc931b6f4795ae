// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Off-chain data sources and the registry that resolves calls to them.
//!
//! Each [`OffChainKind`] is served by one [`OffChainSource`]. A serialized
//! off-chain call is turned back into something runnable by
//! [`deserialize_off_chain_call`], which parses the key and looks the kind up
//! in an [`OffChainRegistry`]. Keys that do not resolve are dropped.
//!
//! # Example
//!
//! ```rust
//! use poolbatch::offchain::{deserialize_off_chain_call, OffChainRegistry};
//! use poolbatch::{OffChainCall, OffChainKind};
//!
//! let registry = OffChainRegistry::with_default_sources(reqwest::Client::new());
//! let key = OffChainCall::new(OffChainKind::StakingData).key();
//!
//! let action = deserialize_off_chain_call(&key, &registry).expect("staking is registered");
//! assert_eq!(action.kind(), OffChainKind::StakingData);
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, Instrument};

use crate::calls::{CallKey, OffChainCall, OffChainKind};
use crate::connection::ConnectionContext;
use crate::errors::OffChainError;
use crate::spans;

mod coingecko;
mod subgraph;

pub use coingecko::{normalize_token_prices, CoingeckoSource};
pub use subgraph::{
    normalize_index_pools, normalize_pool_activity, IndexPoolsSource, PoolActivitySource,
    StakingSource, SubgraphEndpoints,
};

/// A provider of one kind of off-chain data.
#[async_trait]
pub trait OffChainSource: Send + Sync {
    /// The kind of call this source serves.
    fn kind(&self) -> OffChainKind;

    /// Whether the source needs a connection (usually to pick an endpoint by
    /// chain). Calls to such sources are skipped while disconnected.
    fn requires_connection(&self) -> bool {
        true
    }

    /// Fetches and normalizes the payload for `args`.
    async fn fetch(
        &self,
        connection: Option<&ConnectionContext>,
        args: &[String],
    ) -> Result<Value, OffChainError>;
}

/// Direct map from call kind to the source that serves it.
#[derive(Clone, Default)]
pub struct OffChainRegistry {
    sources: HashMap<OffChainKind, Arc<dyn OffChainSource>>,
}

impl OffChainRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in source on its default endpoint, sharing
    /// one HTTP client.
    pub fn with_default_sources(client: reqwest::Client) -> Self {
        let endpoints = SubgraphEndpoints::default();
        Self::new()
            .with_source(Arc::new(CoingeckoSource::new(client.clone())))
            .with_source(Arc::new(PoolActivitySource::new(
                client.clone(),
                endpoints.clone(),
            )))
            .with_source(Arc::new(IndexPoolsSource::new(
                client.clone(),
                endpoints.clone(),
            )))
            .with_source(Arc::new(StakingSource::new(client, endpoints)))
    }

    /// Registers a source under its kind, returning the one it replaces.
    pub fn register(&mut self, source: Arc<dyn OffChainSource>) -> Option<Arc<dyn OffChainSource>> {
        self.sources.insert(source.kind(), source)
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn OffChainSource>) -> Self {
        self.register(source);
        self
    }

    /// The source registered for `kind`.
    pub fn get(&self, kind: OffChainKind) -> Option<&Arc<dyn OffChainSource>> {
        self.sources.get(&kind)
    }

    /// Registered kinds.
    pub fn kinds(&self) -> impl Iterator<Item = OffChainKind> + '_ {
        self.sources.keys().copied()
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no source is registered.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl fmt::Debug for OffChainRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.kinds().collect();
        kinds.sort();
        f.debug_struct("OffChainRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

/// A resolved off-chain call, ready to run.
#[derive(Clone)]
pub struct OffChainAction {
    key: CallKey,
    call: OffChainCall,
    source: Arc<dyn OffChainSource>,
}

impl OffChainAction {
    /// The serialized call.
    pub fn key(&self) -> &CallKey {
        &self.key
    }

    /// The parsed call.
    pub fn call(&self) -> &OffChainCall {
        &self.call
    }

    /// The call kind.
    pub fn kind(&self) -> OffChainKind {
        self.call.kind
    }

    /// Whether the serving source needs a connection.
    pub fn requires_connection(&self) -> bool {
        self.source.requires_connection()
    }

    /// Runs the call against its source.
    pub async fn run(&self, connection: Option<&ConnectionContext>) -> Result<Value, OffChainError> {
        let span = spans::fetch_off_chain(self.call.kind, self.call.args.len());
        self.source
            .fetch(connection, &self.call.args)
            .instrument(span)
            .await
    }
}

impl fmt::Debug for OffChainAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OffChainAction")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Resolves a serialized off-chain call against the registry.
///
/// Returns `None` if the name segment is not a known kind, the arguments are
/// malformed, or no source is registered for the kind. Such calls are dropped.
pub fn deserialize_off_chain_call(
    key: &CallKey,
    registry: &OffChainRegistry,
) -> Option<OffChainAction> {
    let Some(call) = OffChainCall::from_key(key) else {
        debug!(key = %key, "Dropping unknown off-chain call");
        return None;
    };

    let Some(source) = registry.get(call.kind) else {
        debug!(key = %key, kind = %call.kind, "No source registered for off-chain call");
        return None;
    };

    Some(OffChainAction {
        key: key.clone(),
        call,
        source: Arc::clone(source),
    })
}
