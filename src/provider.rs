// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Provider construction.
//!
//! The batcher only needs two things from a node: the chain head and
//! `eth_call`. These helpers build a bare [`RootProvider`] (no fillers) for
//! that, and wrap it into a ready-to-install [`Connection`].
//!
//! ```rust,ignore
//! use poolbatch::{http_connection, BatcherConfig, ProviderConfig};
//! use alloy_chains::NamedChain;
//!
//! let config = BatcherConfig::default();
//! let connection = http_connection(
//!     ProviderConfig::new("https://eth.llamarpc.com"),
//!     NamedChain::Mainnet,
//!     &config,
//! )?;
//! batcher.connect(connection, None).await;
//! ```

use alloy_chains::Chain;
use alloy_provider::{ProviderBuilder, RootProvider};
use alloy_rpc_client::ClientBuilder;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::BatcherConfig;
use crate::connection::{Connection, ConnectionContext};
use crate::errors::RpcError;
use crate::multicall::Multicall3Executor;

/// Configuration for creating providers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// RPC endpoint URL
    pub url: String,
    /// Poll interval of the RPC client, used by polling watchers
    pub poll_interval: Option<Duration>,
}

impl ProviderConfig {
    /// Create a new provider configuration with the specified URL
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            poll_interval: None,
        }
    }

    /// Set the client poll interval
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Configuration preset for a local development node
    #[must_use]
    pub fn local_node(url: impl Into<String>) -> Self {
        Self::new(url).with_poll_interval(Duration::from_millis(250))
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::new("http://localhost:8545")
    }
}

/// Create an HTTP provider with the given configuration
///
/// # Errors
///
/// Returns [`RpcError::ProviderUrlInvalid`] if the URL cannot be parsed.
pub fn create_http_provider(config: ProviderConfig) -> Result<RootProvider, RpcError> {
    let url: url::Url = config
        .url
        .parse()
        .map_err(|e| RpcError::ProviderUrlInvalid(format!("{e}")))?;

    let mut client = ClientBuilder::default().http(url);
    if let Some(interval) = config.poll_interval {
        client = client.with_poll_interval(interval);
    }

    Ok(ProviderBuilder::new()
        .disable_recommended_fillers()
        .connect_client(client))
}

/// Create a WebSocket provider with the given configuration
///
/// WebSocket providers can push new block headers, see
/// [`subscribe_block_numbers`](crate::blocks::subscribe_block_numbers).
///
/// # Errors
///
/// Returns [`RpcError::SubscriptionFailed`] if the connection cannot be
/// established.
#[cfg(feature = "ws")]
pub async fn create_ws_provider(config: ProviderConfig) -> Result<RootProvider, RpcError> {
    use alloy_provider::WsConnect;

    let ws = WsConnect::new(&config.url);
    let mut client = ClientBuilder::default()
        .ws(ws)
        .await
        .map_err(|e| RpcError::subscription_failed("websocket", e))?;
    if let Some(interval) = config.poll_interval {
        client = client.with_poll_interval(interval);
    }

    Ok(ProviderBuilder::new()
        .disable_recommended_fillers()
        .connect_client(client))
}

/// Builds a [`Connection`] backed by an HTTP provider and a
/// [`Multicall3Executor`] at the address configured in `batcher_config`.
///
/// # Errors
///
/// Returns [`RpcError::ProviderUrlInvalid`] if the URL cannot be parsed.
pub fn http_connection(
    config: ProviderConfig,
    chain: impl Into<Chain>,
    batcher_config: &BatcherConfig,
) -> Result<Connection, RpcError> {
    let context = ConnectionContext::new(chain);
    debug!(url = %config.url, chain = %context.chain, "Creating HTTP connection");

    let provider = create_http_provider(config)?;
    let executor = Multicall3Executor::with_config(provider, batcher_config);
    Ok(Connection::new(context, Arc::new(executor)))
}
