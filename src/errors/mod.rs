// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for the poolbatch library.
//!
//! This module follows a hybrid approach:
//!
//! - **Module-specific errors** for fine-grained handling ([`CallError`],
//!   [`MulticallError`], [`ReconcileError`], [`OffChainError`])
//! - **Unified error type** ([`BatcherError`]) for the dispatcher's entry points
//!
//! [`RpcError`] provides shared variants for blockchain RPC operations.
//!
//! # Examples
//!
//! ```rust,ignore
//! use poolbatch::{Batcher, BatcherError, ReconcileError};
//!
//! match batcher.change_block_number(block).await {
//!     Ok(report) => println!("flushed {} calls", report.on_chain_calls),
//!     Err(BatcherError::Reconcile(ReconcileError::ResultCountMismatch { registrar, .. })) => {
//!         eprintln!("misaligned response for {registrar}");
//!     }
//!     Err(e) => eprintln!("Other error: {e}"),
//! }
//! ```

mod call;
mod multicall;
mod offchain;
mod reconcile;
mod rpc;

pub use call::CallError;
pub use multicall::MulticallError;
pub use offchain::OffChainError;
pub use reconcile::ReconcileError;
pub use rpc::RpcError;

/// Unified error type for dispatcher operations.
///
/// Network and off-chain failures ([`MulticallError`], [`OffChainError`]) are
/// handled inside the dispatcher and surface as events. What the
/// [`Batcher`](crate::Batcher) entry points return are the defects: a
/// malformed call or a response that does not line up with its batch.
#[derive(Debug, thiserror::Error)]
pub enum BatcherError {
    /// A requested call could not be encoded. The request is rejected as a
    /// whole and none of its calls are queued.
    #[error("Call error: {0}")]
    Call(#[from] CallError),

    /// Results could not be aligned with the batch.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// The batcher job is no longer running.
    #[error("Batcher job stopped")]
    JobStopped,
}
