// src/chain/orchestrator.rs
//
// Estimate -> pad -> nonce -> sign -> broadcast -> await receipt.
// One state-changing call per `submit`, no retries.

use std::sync::Arc;

use ethers::contract::ContractCall;
use ethers::providers::{Middleware, MiddlewareError};
use ethers::signers::Signer;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{BlockId, BlockNumber, TransactionReceipt, TransactionRequest, TxHash, U256, U64};

use crate::chain::gas::GasQuote;
use crate::chain::session::SessionSettings;
use crate::error::{classify_middleware_read, classify_middleware_write, decode_revert_reason, PoolError};

/// A mined, successful transaction.
#[derive(Debug, Clone)]
pub struct SubmittedTx {
    pub label: String,
    pub tx_hash: TxHash,
    pub receipt: TransactionReceipt,
    pub gas: GasQuote,
}

impl SubmittedTx {
    pub fn block_number(&self) -> Option<u64> {
        self.receipt.block_number.map(|n| n.as_u64())
    }

    pub fn gas_used(&self) -> Option<U256> {
        self.receipt.gas_used
    }
}

pub struct TransactionOrchestrator<'a, M, S> {
    client: &'a Arc<M>,
    signer: &'a S,
    settings: &'a SessionSettings,
}

impl<'a, M: Middleware + 'static, S: Signer> TransactionOrchestrator<'a, M, S> {
    pub fn new(client: &'a Arc<M>, signer: &'a S, settings: &'a SessionSettings) -> Self {
        TransactionOrchestrator { client, signer, settings }
    }

    /// Submit the state-changing call prepared by a contract binding.
    pub async fn submit<D>(&self, label: &str, call: ContractCall<M, D>) -> Result<SubmittedTx, PoolError> {
        let to = match call.tx.to() {
            Some(to) => to.clone(),
            None => return Err(PoolError::ChainCall {
                context: label.to_string(),
                message: "contract call has no target address".into(),
            }),
        };
        let mut request = TransactionRequest::new()
            .from(self.signer.address())
            .to(to)
            .data(call.tx.data().cloned().unwrap_or_default())
            .value(call.tx.value().copied().unwrap_or_default())
            .chain_id(self.settings.chain_id);

        // (a) estimate against current state
        let estimate = self
            .client
            .estimate_gas(&TypedTransaction::Legacy(request.clone()), None)
            .await
            .map_err(|e| classify_middleware_write(&format!("estimating gas for {label}"), &e))?;

        // (b)-(d) pad, nonce, price
        let nonce = self
            .client
            .get_transaction_count(self.signer.address(), Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| classify_middleware_write(&format!("reading nonce for {label}"), &e))?;
        let gas_price = self
            .client
            .get_gas_price()
            .await
            .map_err(|e| classify_middleware_write(&format!("reading gas price for {label}"), &e))?;
        let gas = GasQuote::new(estimate, self.settings.gas_buffer_percent, gas_price);
        log::debug!(
            "{label}: nonce {nonce}, gas estimate {}, limit {}, price {} wei (~{:.6} ETH max)",
            gas.estimate,
            gas.gas_limit,
            gas.gas_price,
            gas.total_eth
        );

        request = request.gas(gas.gas_limit).gas_price(gas.gas_price).nonce(nonce);
        let typed = TypedTransaction::Legacy(request);

        // (e) sign locally
        let signature = self.signer.sign_transaction(&typed).await.map_err(|e| PoolError::ChainCall {
            context: format!("signing {label}"),
            message: e.to_string(),
        })?;
        let raw = typed.rlp_signed(&signature);

        // (f) broadcast
        let tx_hash = {
            let pending = self
                .client
                .send_raw_transaction(raw)
                .await
                .map_err(|e| classify_middleware_write(&format!("broadcasting {label}"), &e))?;
            *pending
        };
        log::info!("{label}: broadcast {tx_hash:?}");

        // (g) receipt
        let receipt = self.await_receipt(label, tx_hash).await?;
        if receipt.status != Some(U64::one()) {
            let revert_reason = self.replay_for_reason(&typed, receipt.block_number).await;
            log::error!(
                "{label}: transaction {tx_hash:?} failed (reason: {})",
                revert_reason.as_deref().unwrap_or("unknown")
            );
            return Err(PoolError::TransactionFailure { tx_hash, revert_reason });
        }

        if let Some(used) = receipt.gas_used {
            log::debug!("{label}: mined with {used} gas (~{:.6} ETH)", gas.realized_eth(used));
        }
        Ok(SubmittedTx {
            label: label.to_string(),
            tx_hash,
            receipt,
            gas,
        })
    }

    async fn await_receipt(&self, label: &str, tx_hash: TxHash) -> Result<TransactionReceipt, PoolError> {
        let timeout = self.settings.receipt_timeout;
        let interval = self.settings.poll_interval;
        let polled = tokio::time::timeout(timeout, async {
            loop {
                match self.client.get_transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => return Ok(receipt),
                    Ok(None) => log::debug!("{label}: no receipt yet for {tx_hash:?}"),
                    Err(e) => {
                        let err = classify_middleware_read(&format!("polling receipt for {label}"), &e);
                        if err.is_connection() {
                            return Err(err);
                        }
                        log::warn!("{label}: receipt poll failed, retrying: {err}");
                    }
                }
                tokio::time::sleep(interval).await;
            }
        })
        .await;

        match polled {
            Ok(result) => result,
            Err(_) => Err(PoolError::ReceiptTimeout { tx_hash, waited: timeout }),
        }
    }

    /// Re-run a failed transaction as a call against the parent block to recover its
    /// revert string. Never fails; a missing reason is just `None`.
    async fn replay_for_reason(&self, tx: &TypedTransaction, mined_in: Option<U64>) -> Option<String> {
        let parent = mined_in?.as_u64().checked_sub(1)?;
        let block = BlockId::Number(BlockNumber::Number(parent.into()));
        match self.client.call(tx, Some(block)).await {
            Ok(_) => {
                log::warn!("replay at block {parent} did not revert; reason unavailable");
                None
            }
            Err(e) => {
                let reason = e
                    .as_error_response()
                    .and_then(|rpc| rpc.as_revert_data())
                    .as_ref()
                    .and_then(decode_revert_reason);
                if reason.is_none() {
                    log::warn!("replay at block {parent} gave no revert string: {e}");
                }
                reason
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submitted_tx_accessors() {
        let receipt = TransactionReceipt {
            block_number: Some(U64::from(42u64)),
            gas_used: Some(U256::from(21_000u64)),
            status: Some(U64::one()),
            ..Default::default()
        };
        let tx = SubmittedTx {
            label: "approve".into(),
            tx_hash: TxHash::zero(),
            receipt,
            gas: GasQuote::new(U256::from(21_000u64), 20, U256::one()),
        };
        assert_eq!(tx.block_number(), Some(42));
        assert_eq!(tx.gas_used(), Some(U256::from(21_000u64)));
    }
}
