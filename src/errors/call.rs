// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for encoding and decoding individual on-chain calls.

/// Errors raised while turning an [`OnChainCall`](crate::OnChainCall) into
/// calldata or decoding its return data.
///
/// These are programming errors (a malformed signature or argument), not
/// network conditions, and are never retried.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The human-readable signature could not be parsed.
    #[error("Invalid call signature `{signature}`: {reason}")]
    InvalidSignature {
        /// The offending signature
        signature: String,
        /// Why it was rejected
        reason: String,
    },

    /// The number of arguments does not match the signature's inputs.
    #[error("`{signature}` takes {expected} arguments, got {actual}")]
    ArgumentCount {
        /// Signature of the call
        signature: String,
        /// Number of declared inputs
        expected: usize,
        /// Number of supplied arguments
        actual: usize,
    },

    /// An argument could not be coerced into its declared ABI type.
    #[error("Argument {index} of `{signature}` is invalid")]
    InvalidArgument {
        /// Signature of the call
        signature: String,
        /// Zero-based argument position
        index: usize,
        /// The coercion error
        #[source]
        source: alloy_dyn_abi::Error,
    },

    /// Return data did not match the declared outputs.
    #[error("Failed to decode return data of `{signature}`")]
    Decode {
        /// Signature of the call
        signature: String,
        /// The decoding error
        #[source]
        source: alloy_dyn_abi::Error,
    },
}

impl CallError {
    /// Create an `InvalidSignature` error.
    pub fn invalid_signature(signature: impl Into<String>, reason: impl Into<String>) -> Self {
        CallError::InvalidSignature {
            signature: signature.into(),
            reason: reason.into(),
        }
    }
}
