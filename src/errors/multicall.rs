// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for executing a batch through a multicall contract.

use alloy_primitives::Address;

use super::{CallError, RpcError};

/// Errors from [`MulticallExecutor`](crate::multicall::MulticallExecutor).
#[derive(Debug, thiserror::Error)]
pub enum MulticallError {
    /// A call in the batch could not be encoded, or its result decoded.
    #[error("Call error: {0}")]
    Call(#[from] CallError),

    /// The round-trip to the node failed.
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// One call in the batch reverted, failing the whole batch.
    #[error("Call {index} to {target} reverted")]
    CallReverted {
        /// Position of the call in the flattened batch
        index: usize,
        /// Contract that reverted
        target: Address,
    },

    /// The aggregate response could not be decoded.
    #[error("Malformed multicall response: {details}")]
    MalformedResponse {
        /// What was wrong with it
        details: String,
    },
}

impl MulticallError {
    /// Whether retrying the same batch could succeed.
    ///
    /// Transport failures are transient. Encoding defects, reverts and
    /// malformed responses will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MulticallError::Rpc(_))
    }
}
