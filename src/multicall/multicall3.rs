// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! [`MulticallExecutor`] over the Multicall3 contract.

use alloy_primitives::{Address, Bytes};
use alloy_provider::Provider;
use alloy_rpc_types::{BlockId, TransactionInput, TransactionRequest};
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use tracing::{debug, Instrument};

use super::{MulticallExecutor, MulticallResponse};
use crate::calls::OnChainCall;
use crate::config::constants::MULTICALL3_ADDRESS;
use crate::config::BatcherConfig;
use crate::errors::{MulticallError, RpcError};
use crate::spans;

sol! {
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls)
            external payable returns (Result[] memory returnData);
    }
}

/// Executes batches through `aggregate3` on a Multicall3 deployment.
///
/// The chain head is read first and the aggregate call is pinned to it, so
/// the reported block number is the one the results were read at. Calls are
/// sent with `allowFailure = false`: one revert fails the batch.
///
/// # Example
///
/// ```rust,ignore
/// use poolbatch::{create_http_provider, Multicall3Executor, ProviderConfig};
///
/// let provider = create_http_provider(ProviderConfig::new("https://eth.llamarpc.com"))?;
/// let executor = Multicall3Executor::new(provider);
/// ```
#[derive(Debug, Clone)]
pub struct Multicall3Executor<P> {
    provider: P,
    address: Address,
}

impl<P: Provider> Multicall3Executor<P> {
    /// Creates an executor using the canonical Multicall3 deployment.
    pub fn new(provider: P) -> Self {
        Self::with_address(provider, MULTICALL3_ADDRESS)
    }

    /// Creates an executor for a Multicall3 deployed at a custom address.
    pub fn with_address(provider: P, address: Address) -> Self {
        Self { provider, address }
    }

    /// Creates an executor targeting the Multicall3 address of `config`.
    pub fn with_config(provider: P, config: &BatcherConfig) -> Self {
        Self::with_address(provider, config.multicall_address)
    }

    /// The Multicall3 contract this executor targets.
    pub fn address(&self) -> Address {
        self.address
    }

    async fn execute(&self, calls: &[OnChainCall]) -> Result<MulticallResponse, MulticallError> {
        let call3s = calls
            .iter()
            .map(|call| -> Result<IMulticall3::Call3, MulticallError> {
                Ok(IMulticall3::Call3 {
                    target: call.target,
                    allowFailure: false,
                    callData: call.encode()?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let block_number = self
            .provider
            .get_block_number()
            .await
            .map_err(RpcError::get_block_number_failed)?;

        let calldata = IMulticall3::aggregate3Call { calls: call3s }.abi_encode();
        let tx = TransactionRequest::default()
            .to(self.address)
            .input(TransactionInput::new(Bytes::from(calldata)));

        let raw = self
            .provider
            .call(tx)
            .block(BlockId::number(block_number))
            .await
            .map_err(|e| RpcError::multicall_failed(calls.len(), block_number, e))?;

        let returned = IMulticall3::aggregate3Call::abi_decode_returns(&raw).map_err(|e| {
            MulticallError::MalformedResponse {
                details: e.to_string(),
            }
        })?;

        if returned.len() != calls.len() {
            return Err(MulticallError::MalformedResponse {
                details: format!("expected {} results, got {}", calls.len(), returned.len()),
            });
        }

        let results = calls
            .iter()
            .zip(&returned)
            .enumerate()
            .map(|(index, (call, result))| -> Result<_, MulticallError> {
                if !result.success {
                    return Err(MulticallError::CallReverted {
                        index,
                        target: call.target,
                    });
                }
                Ok(call.decode_output(&result.returnData)?)
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(calls = calls.len(), block_number, "Multicall executed");

        Ok(MulticallResponse {
            block_number,
            results,
        })
    }
}

#[async_trait]
impl<P> MulticallExecutor for Multicall3Executor<P>
where
    P: Provider + Send + Sync,
{
    async fn multicall(&self, calls: &[OnChainCall]) -> Result<MulticallResponse, MulticallError> {
        if calls.is_empty() {
            let block_number = self
                .provider
                .get_block_number()
                .await
                .map_err(RpcError::get_block_number_failed)?;
            return Ok(MulticallResponse {
                block_number,
                results: Vec::new(),
            });
        }

        let span = spans::execute_multicall(self.address, calls.len());
        self.execute(calls).instrument(span).await
    }
}
