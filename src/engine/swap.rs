// src/engine/swap.rs
//
// Diagnostic swaps through the router. No slippage controls: `amountOutMinimum = 0` and
// no price limit.

use ethers::providers::Middleware;
use ethers::signers::Signer;
use ethers::types::{Address, U256};

use crate::chain::contracts::{ExactInputParams, ExactInputSingleParams};
use crate::chain::orchestrator::SubmittedTx;
use crate::chain::session::Session;
use crate::engine::lifecycle::PoolLifecycleManager;
use crate::engine::state;
use crate::error::PoolError;
use crate::math::path::SwapPath;
use crate::models::{SwapDirection, SwapOutcome};

pub struct SwapExecutor<'a, M, S> {
    session: &'a Session<M, S>,
}

impl<'a, M: Middleware + 'static, S: Signer> SwapExecutor<'a, M, S> {
    pub fn new(session: &'a Session<M, S>) -> Self {
        SwapExecutor { session }
    }

    /// Swap `amount_in` through a single pool; the fee tier is read from the pool itself.
    pub async fn exact_input_single(
        &self,
        pool: Address,
        direction: SwapDirection,
        amount_in: U256,
    ) -> Result<SwapOutcome, PoolError> {
        let contract = self.session.pool(pool);
        let fee = state::read_fee(&contract).await?;
        let pair = state::read_pair(&contract).await?;
        let (token_in, token_out) = pair.oriented(direction);
        log::info!("swapping {amount_in} of {token_in:?} -> {token_out:?} through {pool:?} (fee {fee})");

        self.approve_router(token_in, amount_in).await?;
        let params = ExactInputSingleParams {
            token_in,
            token_out,
            fee,
            recipient: self.session.account(),
            deadline: self.session.deadline().await?,
            amount_in,
            amount_out_minimum: U256::zero(),
            // zero means "no limit" to the router
            sqrt_price_limit: U256::zero(),
        };
        let call = self.session.router().exact_input_single(params);
        let tx = self.session.orchestrator().submit("exactInputSingle", call).await?;
        Ok(outcome(&tx, amount_in))
    }

    /// Swap along an encoded multi-hop path.
    pub async fn exact_input(&self, path: &SwapPath, amount_in: U256) -> Result<SwapOutcome, PoolError> {
        log::info!(
            "swapping {amount_in} of {:?} -> {:?} over {} hop(s)",
            path.token_in(),
            path.token_out(),
            path.hops()
        );
        self.approve_router(path.token_in(), amount_in).await?;
        let params = ExactInputParams {
            path: path.encode(),
            recipient: self.session.account(),
            deadline: self.session.deadline().await?,
            amount_in,
            amount_out_minimum: U256::zero(),
        };
        let call = self.session.router().exact_input(params);
        let tx = self.session.orchestrator().submit("exactInput", call).await?;
        Ok(outcome(&tx, amount_in))
    }

    async fn approve_router(&self, token: Address, amount: U256) -> Result<SubmittedTx, PoolError> {
        PoolLifecycleManager::new(self.session)
            .approve(token, self.session.contracts().router, amount)
            .await
    }
}

fn outcome(tx: &SubmittedTx, amount_in: U256) -> SwapOutcome {
    log::info!(
        "{} mined in block {:?} using {:?} gas",
        tx.label,
        tx.block_number(),
        tx.gas_used()
    );
    SwapOutcome {
        tx_hash: tx.tx_hash,
        block_number: tx.block_number(),
        gas_used: tx.gas_used(),
        amount_in,
    }
}
