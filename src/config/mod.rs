// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Configuration for the batcher
//!
//! # Example: Using defaults
//!
//! ```rust
//! use poolbatch::BatcherConfig;
//!
//! // 250ms block debounce, two retries per failed multicall
//! let config = BatcherConfig::default();
//! ```
//!
//! # Example: Custom configuration
//!
//! ```rust
//! use poolbatch::{BatcherConfigBuilder, OffChainCall, OffChainKind, RetryPolicy};
//! use std::time::Duration;
//!
//! let config = BatcherConfigBuilder::with_defaults()
//!     .block_debounce(Duration::from_millis(500))
//!     .retry(RetryPolicy::conservative())
//!     .initial_off_chain_call(OffChainCall::new(OffChainKind::PriceStats).arg("0xabc"))
//!     .build();
//! ```
//!
//! # Example: Tests and local nodes
//!
//! ```rust
//! use poolbatch::BatcherConfig;
//!
//! // No debounce, no retries, no initial data load
//! let config = BatcherConfig::minimal();
//! ```

use std::time::Duration;

use alloy_primitives::Address;

use crate::calls::{OffChainCall, OffChainKind};
use crate::retry::RetryPolicy;

pub mod constants;

use constants::{
    BLOCK_DEBOUNCE, EVENT_CHANNEL_CAPACITY, MULTICALL3_ADDRESS, OFF_CHAIN_COOLDOWN,
};

/// Configuration for a [`Batcher`](crate::Batcher) and its job
///
/// Use [`BatcherConfigBuilder`] for a fluent API to construct instances.
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// Quiescence window applied to block notifications
    /// Default: 250ms
    pub block_debounce: Duration,

    /// Retry policy for failed on-chain batches
    /// Default: 2 retries, 100ms base delay
    pub retry: RetryPolicy,

    /// Time an off-chain kind is skipped after one of its requests failed
    /// Default: 60 seconds
    pub off_chain_cooldown: Duration,

    /// Multicall3 deployment used by executors built from this config
    /// Default: the canonical deployment
    pub multicall_address: Address,

    /// Capacity of the store event channel. Slow subscribers lag past it.
    pub event_capacity: usize,

    /// Off-chain calls run when a connection is established
    /// Default: staking data
    pub initial_off_chain_calls: Vec<OffChainCall>,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self::with_common_defaults()
    }
}

impl BatcherConfig {
    /// Create config with the defaults used against public RPC endpoints
    pub fn with_common_defaults() -> Self {
        Self {
            block_debounce: BLOCK_DEBOUNCE,
            retry: RetryPolicy::default(),
            off_chain_cooldown: OFF_CHAIN_COOLDOWN,
            multicall_address: MULTICALL3_ADDRESS,
            event_capacity: EVENT_CHANNEL_CAPACITY,
            initial_off_chain_calls: vec![
                OffChainCall::new(OffChainKind::IndexPools),
                OffChainCall::new(OffChainKind::StakingData),
            ],
        }
    }

    /// Create minimal config: no debounce, no retries, no cooldown and no
    /// initial data load
    ///
    /// Suitable for testing or local development nodes.
    pub fn minimal() -> Self {
        Self {
            block_debounce: Duration::ZERO,
            retry: RetryPolicy::none(),
            off_chain_cooldown: Duration::ZERO,
            multicall_address: MULTICALL3_ADDRESS,
            event_capacity: EVENT_CHANNEL_CAPACITY,
            initial_off_chain_calls: Vec::new(),
        }
    }
}

/// Builder for [`BatcherConfig`] with a fluent API
#[derive(Debug, Clone)]
pub struct BatcherConfigBuilder {
    config: BatcherConfig,
}

impl BatcherConfigBuilder {
    /// Start with the common defaults
    pub fn with_defaults() -> Self {
        Self {
            config: BatcherConfig::with_common_defaults(),
        }
    }

    /// Start with the minimal config
    pub fn minimal() -> Self {
        Self {
            config: BatcherConfig::minimal(),
        }
    }

    /// Set the block debounce window
    pub fn block_debounce(mut self, window: Duration) -> Self {
        self.config.block_debounce = window;
        self
    }

    /// Set the retry policy for on-chain batches
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Set the off-chain failure cooldown
    pub fn off_chain_cooldown(mut self, cooldown: Duration) -> Self {
        self.config.off_chain_cooldown = cooldown;
        self
    }

    /// Set the Multicall3 address
    pub fn multicall_address(mut self, address: Address) -> Self {
        self.config.multicall_address = address;
        self
    }

    /// Set the event channel capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity.max(1);
        self
    }

    /// Add an off-chain call to the initial data load
    pub fn initial_off_chain_call(mut self, call: OffChainCall) -> Self {
        self.config.initial_off_chain_calls.push(call);
        self
    }

    /// Replace the initial data load
    pub fn initial_off_chain_calls(mut self, calls: Vec<OffChainCall>) -> Self {
        self.config.initial_off_chain_calls = calls;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> BatcherConfig {
        self.config
    }
}

impl Default for BatcherConfigBuilder {
    fn default() -> Self {
        Self::with_defaults()
    }
}
