// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Well-known addresses, endpoints and timing constants
//!
//! This module centralizes the magic values used throughout the poolbatch
//! crate: the Multicall3 deployment, the block-handling cadence and the
//! default off-chain endpoints.

use alloy_primitives::{address, Address};
use std::time::Duration;

/// Canonical Multicall3 deployment, at the same address on every major EVM chain
///
/// Contract: 0xcA11bde05977b3631167028862bE2a173976CA11
pub const MULTICALL3_ADDRESS: Address = address!("ca11bde05977b3631167028862be2a173976ca11");

/// Quiescence window for block notifications
///
/// Bursts of new-head notifications closer together than this collapse into
/// one flush for the latest block.
pub const BLOCK_DEBOUNCE: Duration = Duration::from_millis(250);

/// Interval at which HTTP providers are polled for a new block number
pub const BLOCK_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Minimum time between a failed off-chain request and the next attempt of
/// the same kind
pub const OFF_CHAIN_COOLDOWN: Duration = Duration::from_secs(60);

/// Capacity of the store event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the batcher job's command queue
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Off-chain HTTP endpoints
pub mod endpoints {
    /// CoinGecko public API base URL
    pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

    /// Uniswap V2 subgraph, queried for pool trade history
    pub const UNISWAP_V2_SUBGRAPH_URL: &str =
        "https://api.thegraph.com/subgraphs/name/uniswap/uniswap-v2";

    /// Indexed Finance subgraph on Ethereum mainnet
    pub const INDEXED_MAINNET_SUBGRAPH_URL: &str =
        "https://api.thegraph.com/subgraphs/name/indexed-finance/indexed";

    /// Indexed Finance subgraph on Rinkeby
    pub const INDEXED_RINKEBY_SUBGRAPH_URL: &str =
        "https://api.thegraph.com/subgraphs/name/indexed-finance/indexed-rinkeby";
}
