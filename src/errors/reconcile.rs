// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for mapping flat multicall results back onto their calls.

use alloy_primitives::Address;

/// Alignment failures between a batch and the results returned for it.
///
/// Any of these means the response cannot be positionally matched to the
/// calls that produced it. The batch is aborted; nothing is written to the
/// cache.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// A registrar received fewer results than it has calls.
    #[error("Registrar {registrar} expected {expected} results, got {actual}")]
    ResultCountMismatch {
        /// Contract the calls target
        registrar: Address,
        /// Number of calls recorded for the registrar
        expected: usize,
        /// Number of results available for it
        actual: usize,
    },

    /// Results were left over after every registrar was served.
    #[error("Batch of {expected} calls received {actual} results")]
    UnconsumedResults {
        /// Total calls in the batch
        expected: usize,
        /// Total results received
        actual: usize,
    },

    /// A registrar listed in the batch has no recorded calls.
    #[error("Registrar {registrar} has no recorded calls")]
    UnknownRegistrar {
        /// The registrar missing from `calls_by_registrar`
        registrar: Address,
    },
}
