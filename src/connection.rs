// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! The connection the batcher dispatches through.
//!
//! A [`Connection`] is handed to [`Batcher::connect`](crate::Batcher::connect)
//! and dropped by [`Batcher::disconnect`](crate::Batcher::disconnect). Nothing
//! else holds a provider.

use alloy_chains::Chain;
use alloy_primitives::Address;
use std::fmt;
use std::sync::Arc;

use crate::multicall::MulticallExecutor;

/// Which chain and account cached results belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionContext {
    /// The connected chain
    pub chain: Chain,
    /// The user account, if one is connected
    pub account: Option<Address>,
}

impl ConnectionContext {
    /// A read-only context with no account.
    pub fn new(chain: impl Into<Chain>) -> Self {
        Self {
            chain: chain.into(),
            account: None,
        }
    }

    /// Sets the connected account.
    #[must_use]
    pub fn with_account(mut self, account: Address) -> Self {
        self.account = Some(account);
        self
    }

    /// Numeric chain id.
    pub fn chain_id(&self) -> u64 {
        self.chain.id()
    }
}

/// A live connection: its context plus the executor that reaches the chain.
#[derive(Clone)]
pub struct Connection {
    /// Chain and account
    pub context: ConnectionContext,
    /// Executes on-chain batches
    pub executor: Arc<dyn MulticallExecutor>,
}

impl Connection {
    /// Creates a connection.
    pub fn new(context: ConnectionContext, executor: Arc<dyn MulticallExecutor>) -> Self {
        Self { context, executor }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_chains::NamedChain;
    use alloy_primitives::address;

    #[test]
    fn contexts_differ_by_account() {
        let base = ConnectionContext::new(NamedChain::Mainnet);
        let with_account =
            base.with_account(address!("00000000000000000000000000000000000000aa"));

        assert_eq!(base.chain_id(), 1);
        assert_ne!(base, with_account);
        assert_eq!(with_account.chain, base.chain);
    }
}
