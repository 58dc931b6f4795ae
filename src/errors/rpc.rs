// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Shared RPC error types for blockchain provider operations.
//!
//! These cover the failure modes of talking to a node: fetching the chain
//! head, executing the aggregated `eth_call`, and subscribing to new blocks.

/// Errors that can occur during blockchain RPC operations.
///
/// # Examples
///
/// ```rust
/// use poolbatch::RpcError;
///
/// let error = RpcError::ProviderUrlInvalid("not a url".to_string());
/// println!("Error: {}", error);
/// ```
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Failed to fetch the current block number.
    #[error("Failed to get current block number")]
    GetBlockNumberFailed {
        /// The underlying provider error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The aggregated multicall `eth_call` failed.
    ///
    /// The whole batch is considered failed; there are no partial results.
    #[error("Multicall of {calls} calls failed at block {block_number}")]
    MulticallFailed {
        /// Number of calls packed into the request
        calls: usize,
        /// Block the call was pinned to
        block_number: u64,
        /// The underlying provider error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to establish a block subscription.
    #[error("Failed to subscribe to {subscription}")]
    SubscriptionFailed {
        /// What was being subscribed to (e.g. "blocks")
        subscription: String,
        /// The underlying provider error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The RPC endpoint URL could not be parsed.
    #[error("Invalid provider URL: {0}")]
    ProviderUrlInvalid(String),
}

impl RpcError {
    /// Helper to create a `GetBlockNumberFailed` error from any error type.
    pub fn get_block_number_failed(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        RpcError::GetBlockNumberFailed {
            source: Box::new(source),
        }
    }

    /// Helper to create a `MulticallFailed` error from any error type.
    pub fn multicall_failed(
        calls: usize,
        block_number: u64,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RpcError::MulticallFailed {
            calls,
            block_number,
            source: Box::new(source),
        }
    }

    /// Helper to create a `SubscriptionFailed` error from any error type.
    pub fn subscription_failed(
        subscription: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RpcError::SubscriptionFailed {
            subscription: subscription.into(),
            source: Box::new(source),
        }
    }
}
