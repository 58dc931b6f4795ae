// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Call descriptors and their canonical serialization.
//!
//! Every piece of data a caller can ask for is described by a call: either an
//! on-chain contract read ([`OnChainCall`]) or a named off-chain query
//! ([`OffChainCall`]). A call's identity is its [`CallKey`], the canonical
//! string produced by [`serialize_on_chain_call`] or
//! [`serialize_off_chain_call`]. Two calls with the same key are the same call
//! as far as batching and caching are concerned.
//!
//! # Example
//!
//! ```rust
//! use alloy_primitives::address;
//! use poolbatch::{OnChainCall, OffChainCall, OffChainKind};
//!
//! let pool = address!("126c121f99e1e211df2e5f8de2d96fa36647c855");
//! let call = OnChainCall::new(pool, "getBalance(address)(uint256)")
//!     .arg("0x6b175474e89094c44da98b954eedeac495271d0f");
//! assert!(call.key().as_str().starts_with("0x126c121f99e1e211df2e5f8de2d96fa36647c855/"));
//!
//! let stats = OffChainCall::new(OffChainKind::PriceStats).arg("0xabc");
//! assert_eq!(stats.key().as_str(), r#"price_stats/["0xabc"]"#);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

mod off_chain;
mod on_chain;

pub use off_chain::{serialize_off_chain_call, OffChainCall, OffChainKind, ParseOffChainKindError};
pub use on_chain::{serialize_on_chain_call, OnChainCall};

/// Separator between the segments of a serialized call.
pub(crate) const KEY_SEPARATOR: char = '/';

/// Canonical serialized form of a call, used as cache and batch key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallKey(String);

impl CallKey {
    pub(crate) fn new(key: String) -> Self {
        Self(key)
    }

    /// The serialized string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name segment: everything before the first separator.
    pub fn name_segment(&self) -> &str {
        self.0
            .split_once(KEY_SEPARATOR)
            .map_or(self.0.as_str(), |(name, _)| name)
    }
}

impl fmt::Display for CallKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CallKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Name of a logical requester (a feature, screen or job) that owns a set of calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerId(String);

impl CallerId {
    /// Creates a caller id.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The caller name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallerId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for CallerId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Encodes call arguments as a JSON array of strings.
///
/// JSON escaping keeps the segment unambiguous whatever the arguments contain.
pub(crate) fn encode_args(args: &[String]) -> String {
    serde_json::Value::from(args.to_vec()).to_string()
}
