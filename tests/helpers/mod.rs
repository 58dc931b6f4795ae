// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Test helpers for poolbatch integration tests
//!
//! Provides mock implementations of the executor and off-chain source traits
//! so the dispatcher can be driven without a node or HTTP endpoints.

#![allow(dead_code)]

use alloy_chains::NamedChain;
use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{address, Address, BlockNumber, Bytes, U256};
use async_trait::async_trait;
use poolbatch::{
    Connection, ConnectionContext, MulticallError, MulticallExecutor, MulticallResponse,
    OffChainError, OffChainKind, OffChainSource, OnChainCall, RpcError, StoreEvent,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

pub const POOL_A: Address = address!("126c121f99e1e211df2e5f8de2d96fa36647c855");
pub const POOL_B: Address = address!("17ac188e09a7890a1844e5e65471fe8b0ccfadf3");
pub const TOKEN: Address = address!("6b175474e89094c44da98b954eedeac495271d0f");

pub fn total_supply(pool: Address) -> OnChainCall {
    OnChainCall::new(pool, "totalSupply()(uint256)")
}

pub fn balance_of(pool: Address, token: Address) -> OnChainCall {
    OnChainCall::new(pool, "getBalance(address)(uint256)").arg(token)
}

/// How a [`MockExecutor`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockMode {
    /// One result per call, each the current block number
    Answer,
    /// Every attempt fails with a retryable RPC error
    Fail,
    /// Answers but leaves out the last result
    DropLastResult,
}

/// Mock MulticallExecutor that records every batch it receives
///
/// Calls are ABI-encoded first, as the Multicall3 executor does, so an
/// unencodable call fails the batch. Each call is answered with a single
/// `uint256` equal to the executor's block number, so cached results are easy
/// to predict.
pub struct MockExecutor {
    block_number: AtomicU64,
    mode: Mutex<MockMode>,
    batches: Mutex<Vec<Vec<OnChainCall>>>,
    calldata: Mutex<Vec<Vec<Bytes>>>,
    attempts: AtomicUsize,
}

impl MockExecutor {
    pub fn new(block_number: BlockNumber) -> Arc<Self> {
        Arc::new(Self {
            block_number: AtomicU64::new(block_number),
            mode: Mutex::new(MockMode::Answer),
            batches: Mutex::new(Vec::new()),
            calldata: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn set_block_number(&self, block_number: BlockNumber) {
        self.block_number.store(block_number, Ordering::SeqCst);
    }

    pub fn set_mode(&self, mode: MockMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Batches received, including failed attempts
    pub fn batches(&self) -> Vec<Vec<OnChainCall>> {
        self.batches.lock().unwrap().clone()
    }

    /// Encoded calldata of every batch that encoded cleanly
    pub fn calldata(&self) -> Vec<Vec<Bytes>> {
        self.calldata.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MulticallExecutor for MockExecutor {
    async fn multicall(&self, calls: &[OnChainCall]) -> Result<MulticallResponse, MulticallError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(calls.to_vec());

        let encoded = calls
            .iter()
            .map(OnChainCall::encode)
            .collect::<Result<Vec<_>, _>>()?;
        self.calldata.lock().unwrap().push(encoded);

        let block_number = self.block_number.load(Ordering::SeqCst);
        let mode = *self.mode.lock().unwrap();

        let mut results: Vec<Vec<DynSolValue>> = calls
            .iter()
            .map(|_| vec![DynSolValue::Uint(U256::from(block_number), 256)])
            .collect();

        match mode {
            MockMode::Answer => {}
            MockMode::Fail => {
                return Err(RpcError::multicall_failed(
                    calls.len(),
                    block_number,
                    std::io::Error::other("connection reset"),
                )
                .into());
            }
            MockMode::DropLastResult => {
                results.pop();
            }
        }

        Ok(MulticallResponse {
            block_number,
            results,
        })
    }
}

/// Mock OffChainSource that counts fetches
///
/// Answers with `{ "kind": .., "args": [..] }`, or fails when told to.
pub struct MockOffChainSource {
    kind: OffChainKind,
    requires_connection: bool,
    failing: AtomicBool,
    fetches: AtomicUsize,
}

impl MockOffChainSource {
    pub fn new(kind: OffChainKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            requires_connection: false,
            failing: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn connected(kind: OffChainKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            requires_connection: true,
            failing: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OffChainSource for MockOffChainSource {
    fn kind(&self) -> OffChainKind {
        self.kind
    }

    fn requires_connection(&self) -> bool {
        self.requires_connection
    }

    async fn fetch(
        &self,
        _connection: Option<&ConnectionContext>,
        args: &[String],
    ) -> Result<Value, OffChainError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(OffChainError::Status {
                url: "http://mock.invalid".to_string(),
                status: 503,
            });
        }
        Ok(json!({ "kind": self.kind.name(), "args": args }))
    }
}

/// A mainnet connection backed by `executor`
pub fn mainnet_connection(executor: &Arc<MockExecutor>) -> Connection {
    Connection::new(
        ConnectionContext::new(NamedChain::Mainnet),
        Arc::clone(executor) as Arc<dyn MulticallExecutor>,
    )
}

/// Installs a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Collects every event currently buffered in `events`
pub fn drain_events(events: &mut broadcast::Receiver<StoreEvent>) -> Vec<StoreEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
