// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Mapping flat multicall results back to calls and callers.
//!
//! A multicall returns one result tuple per call, in the flattened order
//! produced by [`OnChainBatch`](crate::batch::OnChainBatch). Reconciliation
//! walks the batch's registrars in order, takes as many results as the
//! registrar has calls, and pairs each call with its tuple, string-encoding
//! every field on the way.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{hex, BlockNumber};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::batch::{BatchConfig, Callers};
use crate::calls::CallKey;
use crate::errors::ReconcileError;

/// Block number attached to data served from the cache without a network
/// round-trip.
pub const CACHED_BLOCK_NUMBER: BlockNumber = 0;

/// Reconciled results of one batch, ready to be cached and published.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MulticallData {
    /// Block the results were read at, or [`CACHED_BLOCK_NUMBER`]
    pub block_number: BlockNumber,
    /// Who asked for which calls
    pub callers: Callers,
    /// Call key to its string-encoded result fields
    pub calls_to_results: HashMap<CallKey, Vec<String>>,
}

impl MulticallData {
    /// Whether these results were served from the cache.
    pub fn is_from_cache(&self) -> bool {
        self.block_number == CACHED_BLOCK_NUMBER
    }

    /// Whether a newer block has been observed since these results were read.
    ///
    /// Cache-served data is never considered superseded; it already is the
    /// latest value known.
    pub fn is_superseded_by(&self, latest_block: BlockNumber) -> bool {
        !self.is_from_cache() && self.block_number < latest_block
    }

    /// Results of one call.
    pub fn results_for(&self, key: &CallKey) -> Option<&[String]> {
        self.calls_to_results.get(key).map(Vec::as_slice)
    }
}

/// String encoding of one result field.
pub trait EncodeField {
    /// Renders the field the way it is stored in the cache.
    fn encode_field(&self) -> String;
}

impl EncodeField for String {
    fn encode_field(&self) -> String {
        self.clone()
    }
}

impl EncodeField for DynSolValue {
    fn encode_field(&self) -> String {
        match self {
            DynSolValue::Bool(b) => b.to_string(),
            DynSolValue::Int(i, _) => i.to_string(),
            DynSolValue::Uint(u, _) => u.to_string(),
            DynSolValue::Address(a) => a.to_checksum(None),
            DynSolValue::FixedBytes(word, size) => hex::encode_prefixed(&word[..*size]),
            DynSolValue::Function(f) => hex::encode_prefixed(f.as_slice()),
            DynSolValue::Bytes(b) => hex::encode_prefixed(b),
            DynSolValue::String(s) => s.clone(),
            DynSolValue::Array(items)
            | DynSolValue::FixedArray(items)
            | DynSolValue::Tuple(items) => {
                let inner: Vec<String> = items.iter().map(EncodeField::encode_field).collect();
                format!("[{}]", inner.join(","))
            }
            #[allow(unreachable_patterns)]
            other => format!("{other:?}"),
        }
    }
}

/// Aligns a flat result array with the batch that produced it.
///
/// `results[i]` must be the result tuple of the `i`-th call in the batch's
/// flattened order. Any disagreement between the batch shape and the number of
/// results is a [`ReconcileError`]; nothing is truncated or padded.
pub fn format_multicall_data<R, F>(
    config: &BatchConfig,
    block_number: BlockNumber,
    results: &[R],
) -> Result<MulticallData, ReconcileError>
where
    R: AsRef<[F]>,
    F: EncodeField,
{
    let batch = &config.batch;
    let mut calls_to_results = HashMap::with_capacity(batch.len());
    let mut cutoff = 0usize;

    for registrar in batch.registrars() {
        let calls = batch
            .calls_for(registrar)
            .ok_or(ReconcileError::UnknownRegistrar {
                registrar: *registrar,
            })?;

        let available = results.len().saturating_sub(cutoff);
        if available < calls.len() {
            return Err(ReconcileError::ResultCountMismatch {
                registrar: *registrar,
                expected: calls.len(),
                actual: available,
            });
        }

        let slice = &results[cutoff..cutoff + calls.len()];
        for (key, result) in calls.iter().zip(slice) {
            let fields = result.as_ref().iter().map(EncodeField::encode_field).collect();
            calls_to_results.insert(key.clone(), fields);
        }
        cutoff += calls.len();
    }

    if cutoff != results.len() {
        return Err(ReconcileError::UnconsumedResults {
            expected: cutoff,
            actual: results.len(),
        });
    }

    Ok(MulticallData {
        block_number,
        callers: config.callers.clone(),
        calls_to_results,
    })
}
