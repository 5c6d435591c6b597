// src/engine/lifecycle.rs
//
// NonExistent -> Uninitialized -> Initialized -> Funded.
// Each step re-reads the chain first and skips its transaction when the pool is already
// past that state.

use ethers::contract::parse_log;
use ethers::providers::Middleware;
use ethers::signers::Signer;
use ethers::types::{Address, TransactionReceipt, U256};

use crate::chain::contracts::{IncreaseLiquidityFilter, MintParams, PoolCreatedFilter};
use crate::chain::orchestrator::SubmittedTx;
use crate::chain::session::Session;
use crate::engine::state;
use crate::error::{classify_read, PoolError};
use crate::math::tick_math;
use crate::models::{InitializeOutcome, MintOutcome, PoolDescriptor, PoolProbe, TokenPair};

pub struct PoolLifecycleManager<'a, M, S> {
    session: &'a Session<M, S>,
}

impl<'a, M: Middleware + 'static, S: Signer> PoolLifecycleManager<'a, M, S> {
    pub fn new(session: &'a Session<M, S>) -> Self {
        PoolLifecycleManager { session }
    }

    // ----- creation -----

    /// Find the pool for `(token_a, token_b, fee)` or deploy it through the factory.
    pub async fn create_pool(&self, token_a: Address, token_b: Address, fee: u32) -> Result<PoolDescriptor, PoolError> {
        if token_a == token_b {
            return Err(PoolError::Configuration(format!(
                "cannot create a pool of {token_a:?} against itself"
            )));
        }
        let pair = TokenPair::canonicalize(token_a, token_b);
        let factory = self.session.factory();

        let existing = factory
            .get_pool(pair.token0, pair.token1, fee)
            .call()
            .await
            .map_err(|e| classify_read("getPool", e))?;
        if !existing.is_zero() {
            log::info!("pool for {:?}/{:?} fee {fee} already exists at {existing:?}", pair.token0, pair.token1);
            return Ok(PoolDescriptor::at(pair, fee, existing));
        }

        let tx = self
            .session
            .orchestrator()
            .submit("createPool", factory.create_pool(pair.token0, pair.token1, fee))
            .await?;
        let address = pool_created_in(&tx.receipt, factory.address()).ok_or_else(|| PoolError::ChainCall {
            context: "createPool".into(),
            message: format!("receipt of {:?} has no PoolCreated event", tx.tx_hash),
        })?;
        log::info!("created pool {address:?} in {:?}", tx.tx_hash);
        Ok(PoolDescriptor::at(pair, fee, address))
    }

    pub async fn probe_pool(&self, pool: Address) -> Result<PoolProbe, PoolError> {
        let client = self.session.client();
        state::probe_pool(client.as_ref(), &self.session.pool(pool)).await
    }

    // ----- initialization -----

    pub async fn initialize_pool(&self, pool: Address, sqrt_price_x96: U256) -> Result<InitializeOutcome, PoolError> {
        if sqrt_price_x96 < tick_math::MIN_SQRT_RATIO || sqrt_price_x96 >= tick_math::MAX_SQRT_RATIO {
            return Err(PoolError::InvalidPrice(format!(
                "sqrtPriceX96 {sqrt_price_x96} outside [MIN_SQRT_RATIO, MAX_SQRT_RATIO)"
            )));
        }
        match self.probe_pool(pool).await? {
            PoolProbe::NotFound => Err(PoolError::PoolNotDeployed(pool)),
            PoolProbe::Initialized(current) => {
                log::info!(
                    "pool {pool:?} already initialized at tick {} (sqrtPriceX96 {})",
                    current.tick,
                    current.sqrt_price_x96
                );
                Ok(InitializeOutcome::AlreadyInitialized(current))
            }
            PoolProbe::Uninitialized => {
                let contract = self.session.pool(pool);
                let tx = self
                    .session
                    .orchestrator()
                    .submit("initialize", contract.initialize(sqrt_price_x96))
                    .await?;
                log::info!("initialized pool {pool:?} at sqrtPriceX96 {sqrt_price_x96}");
                Ok(InitializeOutcome::Initialized {
                    tx_hash: tx.tx_hash,
                    sqrt_price_x96,
                })
            }
        }
    }

    // ----- funding -----

    /// Mint a position over exactly `[MIN_TICK, MAX_TICK]`.
    pub async fn add_full_range_liquidity(
        &self,
        pool: Address,
        amount0: U256,
        amount1: U256,
    ) -> Result<MintOutcome, PoolError> {
        let (lower, upper) = tick_math::full_range_bounds();
        self.mint_range(pool, lower, upper, amount0, amount1).await
    }

    /// Mint over `[lower, upper]` widened outward to the pool's tick spacing.
    pub async fn add_liquidity(
        &self,
        pool: Address,
        lower: i32,
        upper: i32,
        amount0: U256,
        amount1: U256,
    ) -> Result<MintOutcome, PoolError> {
        let spacing = state::read_tick_spacing(&self.session.pool(pool)).await?;
        let (lower, upper) = tick_math::align_range_outward(lower, upper, spacing)?;
        self.mint_range(pool, lower, upper, amount0, amount1).await
    }

    async fn mint_range(
        &self,
        pool: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount0: U256,
        amount1: U256,
    ) -> Result<MintOutcome, PoolError> {
        tick_math::validate_position_range(tick_lower, tick_upper)?;
        let contract = self.session.pool(pool);
        let fee = state::read_fee(&contract).await?;
        let pair = state::read_pair(&contract).await?;

        let manager_address = self.session.contracts().position_manager;
        self.approve(pair.token0, manager_address, amount0).await?;
        self.approve(pair.token1, manager_address, amount1).await?;

        // Zero minimums: no slippage protection on bootstrap mints.
        let params = MintParams {
            token_first: pair.token0,
            token_second: pair.token1,
            fee,
            tick_lower,
            tick_upper,
            amount_first_desired: amount0,
            amount_second_desired: amount1,
            amount_first_min: U256::zero(),
            amount_second_min: U256::zero(),
            recipient: self.session.account(),
            deadline: self.session.deadline().await?,
        };
        let manager = self.session.position_manager();
        let tx = self.session.orchestrator().submit("mint", manager.mint(params)).await?;
        let token_id = minted_token_id(&tx.receipt, manager_address).ok_or_else(|| PoolError::ChainCall {
            context: "mint".into(),
            message: format!("receipt of {:?} has no IncreaseLiquidity event", tx.tx_hash),
        })?;
        log::info!("minted position {token_id} over [{tick_lower}, {tick_upper}] in {:?}", tx.tx_hash);

        self.verify_mint(&tx, pool, token_id, tick_lower, tick_upper).await
    }

    /// Post-mint check. Anything short of a lost connection becomes a warning.
    async fn verify_mint(
        &self,
        tx: &SubmittedTx,
        pool: Address,
        token_id: U256,
        tick_lower: i32,
        tick_upper: i32,
    ) -> Result<MintOutcome, PoolError> {
        let mut warnings = Vec::new();

        let position = match state::read_position(&self.session.position_manager(), token_id).await {
            Ok(position) => Some(position),
            Err(e) if e.is_connection() => return Err(e),
            Err(e) => {
                warnings.push(format!("could not re-read position {token_id}: {e}"));
                None
            }
        };
        if let Some(position) = &position {
            if position.liquidity == 0 {
                warnings.push(format!("position {token_id} holds zero liquidity"));
            }
        }

        let mut initialized = [false, false];
        let contract = self.session.pool(pool);
        for (slot, tick) in [tick_lower, tick_upper].into_iter().enumerate() {
            match state::read_tick(&contract, tick).await {
                Ok(info) => {
                    initialized[slot] = info.initialized();
                    if !info.initialized() {
                        warnings.push(format!("boundary tick {tick} is not initialized after mint"));
                    }
                }
                Err(e) if e.is_connection() => return Err(e),
                Err(e) => warnings.push(format!("could not read tick {tick}: {e}")),
            }
        }

        for warning in &warnings {
            log::warn!("mint {:?}: {warning}", tx.tx_hash);
        }
        Ok(MintOutcome {
            tx_hash: tx.tx_hash,
            token_id,
            tick_lower,
            tick_upper,
            position,
            lower_initialized: initialized[0],
            upper_initialized: initialized[1],
            warnings,
        })
    }

    // ----- token utilities -----

    /// Approve `spender` for `amount` of `token` and wait for the receipt.
    pub async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<SubmittedTx, PoolError> {
        let call = self.session.token(token).approve(spender, amount);
        self.session
            .orchestrator()
            .submit("approve", call)
            .await
            .map_err(|source| PoolError::Approval {
                token,
                spender,
                source: Box::new(source),
            })
    }

    pub async fn token_balance(&self, token: Address, holder: Address) -> Result<U256, PoolError> {
        self.session
            .token(token)
            .balance_of(holder)
            .call()
            .await
            .map_err(|e| classify_read("balanceOf", e))
    }

    pub async fn token_decimals(&self, token: Address) -> Result<u8, PoolError> {
        self.session
            .token(token)
            .decimals()
            .call()
            .await
            .map_err(|e| classify_read("decimals", e))
    }

    pub async fn token_symbol(&self, token: Address) -> Result<String, PoolError> {
        self.session
            .token(token)
            .symbol()
            .call()
            .await
            .map_err(|e| classify_read("symbol", e))
    }

    pub async fn read_pool_fee(&self, pool: Address) -> Result<u32, PoolError> {
        state::read_fee(&self.session.pool(pool)).await
    }

    /// True only for an initialized pool with non-zero active liquidity.
    pub async fn pool_has_liquidity(&self, pool: Address) -> Result<bool, PoolError> {
        Ok(match self.probe_pool(pool).await? {
            PoolProbe::Initialized(current) => current.liquidity > 0,
            PoolProbe::NotFound | PoolProbe::Uninitialized => false,
        })
    }
}

/// Pool address from the factory's `PoolCreated` log.
pub fn pool_created_in(receipt: &TransactionReceipt, factory: Address) -> Option<Address> {
    receipt
        .logs
        .iter()
        .filter(|log| log.address == factory)
        .find_map(|log| parse_log::<PoolCreatedFilter>(log.clone()).ok())
        .map(|event| event.pool)
}

/// Position id from the manager's `IncreaseLiquidity` log.
pub fn minted_token_id(receipt: &TransactionReceipt, manager: Address) -> Option<U256> {
    receipt
        .logs
        .iter()
        .filter(|log| log.address == manager)
        .find_map(|log| parse_log::<IncreaseLiquidityFilter>(log.clone()).ok())
        .map(|event| event.token_id)
}
