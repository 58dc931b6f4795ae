// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Named off-chain queries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{encode_args, CallKey, KEY_SEPARATOR};

/// The kinds of off-chain data a caller can request.
///
/// Each kind is served by exactly one registered
/// [`OffChainSource`](crate::offchain::OffChainSource).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffChainKind {
    /// External price statistics for a set of tokens
    PriceStats,
    /// Recent trades and swaps for one pool
    PoolTradesAndSwaps,
    /// Snapshot of every index pool and category, loaded on connect
    IndexPools,
    /// Staking pool data
    StakingData,
}

impl OffChainKind {
    /// Every kind, in declaration order.
    pub const ALL: [OffChainKind; 4] = [
        OffChainKind::PriceStats,
        OffChainKind::PoolTradesAndSwaps,
        OffChainKind::IndexPools,
        OffChainKind::StakingData,
    ];

    /// Stable name used as the key's name segment.
    pub const fn name(&self) -> &'static str {
        match self {
            OffChainKind::PriceStats => "price_stats",
            OffChainKind::PoolTradesAndSwaps => "pool_trades_and_swaps",
            OffChainKind::IndexPools => "index_pools",
            OffChainKind::StakingData => "staking_data",
        }
    }
}

impl fmt::Display for OffChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a name segment does not match any [`OffChainKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown off-chain call kind: {0}")]
pub struct ParseOffChainKindError(pub String);

impl FromStr for OffChainKind {
    type Err = ParseOffChainKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OffChainKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ParseOffChainKindError(s.to_string()))
    }
}

/// A request for off-chain data of one kind, with string arguments
/// (token ids, a pool address, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OffChainCall {
    /// Which source serves the call
    pub kind: OffChainKind,
    /// Query arguments
    pub args: Vec<String>,
}

impl OffChainCall {
    /// Creates a call with no arguments.
    pub fn new(kind: OffChainKind) -> Self {
        Self {
            kind,
            args: Vec::new(),
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl ToString) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// Replaces all arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.args = args.into_iter().map(|a| a.to_string()).collect();
        self
    }

    /// Canonical key of this call.
    pub fn key(&self) -> CallKey {
        serialize_off_chain_call(self)
    }

    /// Parses a key produced by [`serialize_off_chain_call`].
    ///
    /// Returns `None` for keys with an unknown name segment or malformed
    /// arguments.
    pub fn from_key(key: &CallKey) -> Option<Self> {
        let (name, args) = key.as_str().split_once(KEY_SEPARATOR)?;
        let kind = name.parse().ok()?;
        let args = serde_json::from_str(args).ok()?;
        Some(Self { kind, args })
    }
}

/// Serializes an off-chain call into its canonical key: `{kind}/{args}`.
pub fn serialize_off_chain_call(call: &OffChainCall) -> CallKey {
    CallKey::new(format!(
        "{}{}{}",
        call.kind.name(),
        KEY_SEPARATOR,
        encode_args(&call.args)
    ))
}
