// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! The network boundary: executing a flattened batch in one round-trip.
//!
//! The dispatcher only depends on [`MulticallExecutor`]. The production
//! implementation, [`Multicall3Executor`], packs the calls into a single
//! `aggregate3` read against the Multicall3 contract; tests substitute an
//! in-memory executor.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::BlockNumber;
use async_trait::async_trait;

use crate::calls::OnChainCall;
use crate::errors::MulticallError;

mod multicall3;

pub use multicall3::Multicall3Executor;

/// Results of one multicall round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct MulticallResponse {
    /// Block the calls were executed against
    pub block_number: BlockNumber,
    /// Decoded output values, one entry per call in request order
    pub results: Vec<Vec<DynSolValue>>,
}

/// Executes a batch of contract reads in a single round-trip.
///
/// Implementations must return exactly one result per call, in the order the
/// calls were given. A failure of any call fails the whole batch; there are no
/// partial results.
#[async_trait]
pub trait MulticallExecutor: Send + Sync {
    /// Runs `calls` and returns their decoded outputs.
    async fn multicall(&self, calls: &[OnChainCall]) -> Result<MulticallResponse, MulticallError>;
}
