// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for off-chain data sources (price APIs, subgraphs).

/// Errors returned by [`OffChainSource`](crate::offchain::OffChainSource)
/// implementations.
///
/// The dispatcher never propagates these to callers. They are recorded as a
/// failure timestamp and published as an event.
#[derive(Debug, thiserror::Error)]
pub enum OffChainError {
    /// The HTTP request could not be sent or its body read.
    #[error("Request to {url} failed")]
    Request {
        /// Endpoint that was queried
        url: String,
        /// The underlying HTTP client error
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered with a non-success status.
    #[error("{url} responded with status {status}")]
    Status {
        /// Endpoint that was queried
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The payload was not in the expected shape.
    #[error("Unexpected payload: {details}")]
    Payload {
        /// What was wrong with it
        details: String,
    },

    /// No endpoint is configured for the connected chain.
    #[error("No endpoint configured for chain {chain_id}")]
    NoEndpoint {
        /// Chain id of the active connection
        chain_id: u64,
    },

    /// The source needs a connection (for its chain id) and there is none.
    #[error("Not connected to a chain")]
    NotConnected,
}

impl OffChainError {
    /// Create a `Request` error.
    pub fn request(url: impl Into<String>, source: reqwest::Error) -> Self {
        OffChainError::Request {
            url: url.into(),
            source,
        }
    }

    /// Create a `Payload` error.
    pub fn payload(details: impl Into<String>) -> Self {
        OffChainError::Payload {
            details: details.into(),
        }
    }
}
