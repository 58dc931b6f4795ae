// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Span creation helpers for poolbatch operations.
//!
//! Telemetry is kept out of the business logic: each instrumented operation
//! has a span constructor here, and the operation attaches it with
//! [`tracing::Instrument`].
//!
//! Usage pattern:
//! ```rust,ignore
//! pub async fn my_operation(&mut self, param: Type) -> Result<T> {
//!     let span = spans::my_operation(param_value);
//!     async {
//!         // Business logic here
//!     }
//!     .instrument(span)
//!     .await
//! }
//! ```

use alloy_primitives::{Address, BlockNumber};
use tracing::{Level, Span};

use crate::calls::{CallerId, OffChainKind};
use crate::connection::ConnectionContext;

/// Create span for a caller's data request.
///
/// Parent: None (root span for this operation)
/// Children: fetch_off_chain spans for calls dispatched immediately
#[inline]
pub(crate) fn independently_query(caller: &CallerId, on_chain: usize, off_chain: usize) -> Span {
    tracing::span!(
        Level::INFO,
        "poolbatch.independently_query",
        caller = %caller,
        on_chain_calls = on_chain,
        off_chain_calls = off_chain,
    )
}

/// Create span for advancing the block number and flushing pending batches.
///
/// Parent: None (root span for this operation)
/// Children: send_on_chain_batch, send_off_chain_batch
#[inline]
pub(crate) fn change_block_number(previous: Option<BlockNumber>, block_number: BlockNumber) -> Span {
    tracing::span!(
        Level::INFO,
        "poolbatch.change_block_number",
        previous = ?previous,
        block_number = block_number,
    )
}

/// Create span for sending the pending on-chain batch.
///
/// Parent: change_block_number
/// Children: execute_multicall (one per attempt)
#[inline]
pub(crate) fn send_on_chain_batch(calls: usize, callers: usize) -> Span {
    tracing::debug_span!("poolbatch.send_on_chain_batch", calls = calls, callers = callers)
}

/// Create span for sending the pending off-chain batch.
///
/// Parent: change_block_number
/// Children: fetch_off_chain spans (one per call)
#[inline]
pub(crate) fn send_off_chain_batch(calls: usize) -> Span {
    tracing::debug_span!("poolbatch.send_off_chain_batch", calls = calls)
}

/// Create span for one aggregate3 round-trip.
///
/// Parent: send_on_chain_batch
#[inline]
pub(crate) fn execute_multicall(multicall: Address, calls: usize) -> Span {
    tracing::debug_span!(
        "poolbatch.execute_multicall",
        multicall = %multicall,
        calls = calls,
    )
}

/// Create span for one off-chain request.
#[inline]
pub(crate) fn fetch_off_chain(kind: OffChainKind, args: usize) -> Span {
    tracing::trace_span!("poolbatch.fetch_off_chain", kind = %kind, args = args)
}

/// Create span for establishing a connection.
///
/// Parent: None (root span for this operation)
/// Children: send_off_chain_batch for the initial data load
#[inline]
pub(crate) fn connect(context: &ConnectionContext, block_number: Option<BlockNumber>) -> Span {
    tracing::span!(
        Level::INFO,
        "poolbatch.connect",
        chain_id = %context.chain,
        account = ?context.account,
        block_number = ?block_number,
    )
}
