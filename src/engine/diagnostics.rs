// src/engine/diagnostics.rs
//
// Read-only inspection of a pool: where the price sits, whether liquidity is reachable
// from it, and whether a swap in either direction would route.

use chrono::Utc;
use ethers::contract::ContractError;
use ethers::providers::Middleware;
use ethers::signers::Signer;
use ethers::types::{Address, U256};

use crate::chain::contracts::QuoteExactInputSingleParams;
use crate::chain::session::Session;
use crate::engine::state;
use crate::error::{classify_read, PoolError};
use crate::math::tick_math;
use crate::models::{
    ActiveTickReport, DiagnosisReport, LiquidityRangeReport, PoolState, PositionReport, SwapDirection,
    SwapPathPair, SwapPathReport,
};

/// Half-width (in ticks) of the window inspected around the current tick.
pub const CURRENT_RANGE_HALF_WIDTH: i32 = 10;

/// Input amount used for the swap-path probes of a full diagnosis.
pub const DIAGNOSTIC_SWAP_AMOUNT: u64 = 1_000_000;

pub struct DiagnosticEngine<'a, M, S> {
    session: &'a Session<M, S>,
}

impl<'a, M: Middleware + 'static, S: Signer> DiagnosticEngine<'a, M, S> {
    pub fn new(session: &'a Session<M, S>) -> Self {
        DiagnosticEngine { session }
    }

    pub async fn check_active_tick(&self, pool: Address) -> Result<ActiveTickReport, PoolError> {
        let state = state::read_pool_state(&self.session.pool(pool)).await?;
        let tick_consistent = if state.is_initialized() {
            tick_math::tick_at_sqrt_ratio(state.sqrt_price_x96)
                .ok()
                // A pool that crossed downward onto a tick boundary reports the tick below it.
                .map(|derived| derived == state.tick || derived == state.tick + 1)
        } else {
            None
        };
        if tick_consistent == Some(false) {
            log::warn!("pool {pool:?}: tick {} does not match sqrtPriceX96 {}", state.tick, state.sqrt_price_x96);
        }
        Ok(ActiveTickReport {
            price: state.price(),
            state,
            tick_consistent,
        })
    }

    pub async fn verify_liquidity_range(
        &self,
        pool: Address,
        tick_lower: i32,
        tick_upper: i32,
    ) -> Result<LiquidityRangeReport, PoolError> {
        if tick_lower >= tick_upper {
            return Err(PoolError::InvalidTickRange {
                lower: tick_lower,
                upper: tick_upper,
                reason: "lower tick must be below upper tick".into(),
            });
        }
        let contract = self.session.pool(pool);
        let (lower, upper) = futures::try_join!(
            state::read_tick(&contract, tick_lower),
            state::read_tick(&contract, tick_upper)
        )?;

        let mut notes = Vec::new();
        let seconds_inside = match contract
            .snapshot_cumulatives_inside(tick_lower, tick_upper)
            .call()
            .await
        {
            Ok((_, _, seconds)) => Some(seconds),
            // Reverts when either boundary is uninitialized.
            Err(ContractError::Revert(_)) => {
                notes.push(format!("snapshotCumulativesInside({tick_lower}, {tick_upper}) reverted"));
                None
            }
            Err(e) => {
                let err = classify_read("snapshotCumulativesInside", e);
                if err.is_connection() {
                    return Err(err);
                }
                notes.push(err.to_string());
                None
            }
        };

        Ok(LiquidityRangeReport {
            tick_lower,
            tick_upper,
            lower_initialized: lower.initialized(),
            upper_initialized: upper.initialized(),
            lower_liquidity: lower.liquidity_gross,
            upper_liquidity: upper.liquidity_gross,
            seconds_inside,
            notes,
        })
    }

    pub async fn check_position_initialization(
        &self,
        pool: Address,
        token_id: U256,
        expected_owner: Address,
    ) -> Result<PositionReport, PoolError> {
        let position = state::read_position(&self.session.position_manager(), token_id).await?;
        let contract = self.session.pool(pool);
        let (lower, upper) = futures::try_join!(
            state::read_tick(&contract, position.tick_lower),
            state::read_tick(&contract, position.tick_upper)
        )?;
        Ok(PositionReport {
            token_id,
            is_owner: position.owner == expected_owner,
            tick_lower: position.tick_lower,
            tick_upper: position.tick_upper,
            liquidity: position.liquidity,
            lower_initialized: lower.initialized(),
            upper_initialized: upper.initialized(),
            fee_growth_inside_last_x128: position.fee_growth_inside_last_x128,
            tokens_owed: position.tokens_owed,
        })
    }

    pub async fn verify_swap_path(
        &self,
        pool: Address,
        amount_in: U256,
        direction: SwapDirection,
    ) -> Result<SwapPathReport, PoolError> {
        let contract = self.session.pool(pool);
        let current = state::read_pool_state(&contract).await?;
        let tick_spacing = state::read_tick_spacing(&contract).await?;
        let next_tick_boundary = tick_math::next_tick_boundary(current.tick, tick_spacing, direction);
        let boundary = state::read_tick(&contract, next_tick_boundary).await?;

        let liquidity_available = current.liquidity > 0;
        let mut report = SwapPathReport {
            direction,
            amount_in,
            current_tick: current.tick,
            next_tick_boundary,
            tick_spacing,
            active_liquidity: current.liquidity,
            boundary_initialized: boundary.initialized(),
            liquidity_available,
            quote_available: self.session.contracts().quoter.is_some(),
            can_swap: false,
            quoted_amount_out: None,
            sqrt_price_x96_after: None,
            quote_error: None,
        };
        if !liquidity_available {
            report.quote_error = Some("pool has no active liquidity".into());
            return Ok(report);
        }

        match self.quote(pool, amount_in, direction).await {
            Ok((amount_out, sqrt_after)) => {
                report.can_swap = !amount_out.is_zero();
                report.quoted_amount_out = Some(amount_out);
                report.sqrt_price_x96_after = Some(sqrt_after);
            }
            Err(e) if e.is_connection() => return Err(e),
            Err(e) => report.quote_error = Some(e.to_string()),
        }
        Ok(report)
    }

    async fn quote(&self, pool: Address, amount_in: U256, direction: SwapDirection) -> Result<(U256, U256), PoolError> {
        let quoter = self
            .session
            .quoter()
            .ok_or_else(|| PoolError::Configuration("no quoter configured".into()))?;
        let contract = self.session.pool(pool);
        let fee = state::read_fee(&contract).await?;
        let pair = state::read_pair(&contract).await?;
        let (token_in, token_out) = pair.oriented(direction);
        let params = QuoteExactInputSingleParams {
            token_in,
            token_out,
            amount_in,
            fee,
            sqrt_price_limit: U256::zero(),
        };
        let (amount_out, sqrt_after, _, _) = quoter
            .quote_exact_input_single(params)
            .call()
            .await
            .map_err(|e| classify_read("quoteExactInputSingle", e))?;
        Ok((amount_out, sqrt_after))
    }

    /// Everything above in one report. Only a lost connection aborts; any other failure is
    /// recorded as a note and the affected section is reported empty.
    pub async fn run_full_diagnosis(
        &self,
        pool: Address,
        token_id: Option<U256>,
        owner: Address,
    ) -> Result<DiagnosisReport, PoolError> {
        let mut notes = Vec::new();

        let pool_state = match self.check_active_tick(pool).await {
            Ok(report) => report,
            Err(e) => {
                degrade(&mut notes, "pool state", e)?;
                ActiveTickReport {
                    state: PoolState {
                        sqrt_price_x96: U256::zero(),
                        tick: 0,
                        liquidity: 0,
                        unlocked: false,
                    },
                    price: 0.0,
                    tick_consistent: None,
                }
            }
        };
        let current_tick = pool_state.state.tick;
        if pool_state.state.liquidity == 0 {
            notes.push(format!("no active liquidity at tick {current_tick}"));
        }
        if pool_state.tick_consistent == Some(false) {
            notes.push("reported tick is inconsistent with sqrtPriceX96".into());
        }

        let position_state = match token_id {
            Some(token_id) => match self.check_position_initialization(pool, token_id, owner).await {
                Ok(report) => {
                    if !report.is_owner {
                        notes.push(format!("position {token_id} is not owned by {owner:?}"));
                    }
                    Some(report)
                }
                Err(e) => {
                    degrade(&mut notes, "position state", e)?;
                    None
                }
            },
            None => None,
        };

        let (window_lower, window_upper) = (
            current_tick.saturating_sub(CURRENT_RANGE_HALF_WIDTH),
            current_tick.saturating_add(CURRENT_RANGE_HALF_WIDTH),
        );
        let current_range_liquidity = self
            .range_or_empty(&mut notes, pool, window_lower, window_upper)
            .await?;

        let position_range_liquidity = match &position_state {
            Some(position) => Some(
                self.range_or_empty(&mut notes, pool, position.tick_lower, position.tick_upper)
                    .await?,
            ),
            None => None,
        };

        let amount = U256::from(DIAGNOSTIC_SWAP_AMOUNT);
        let zero_for_one = self
            .swap_path_or_empty(&mut notes, pool, amount, SwapDirection::ZeroForOne, current_tick)
            .await?;
        let one_for_zero = self
            .swap_path_or_empty(&mut notes, pool, amount, SwapDirection::OneForZero, current_tick)
            .await?;

        for note in &notes {
            log::warn!("diagnosis of {pool:?}: {note}");
        }
        Ok(DiagnosisReport {
            timestamp_utc: Utc::now(),
            pool,
            pool_state,
            position_state,
            current_range_liquidity,
            position_range_liquidity,
            swap_path_info: SwapPathPair { zero_for_one, one_for_zero },
            notes,
        })
    }

    async fn range_or_empty(
        &self,
        notes: &mut Vec<String>,
        pool: Address,
        tick_lower: i32,
        tick_upper: i32,
    ) -> Result<LiquidityRangeReport, PoolError> {
        match self.verify_liquidity_range(pool, tick_lower, tick_upper).await {
            Ok(report) => {
                notes.extend(report.notes.iter().cloned());
                Ok(report)
            }
            Err(e) => {
                degrade(notes, &format!("liquidity in [{tick_lower}, {tick_upper}]"), e)?;
                Ok(LiquidityRangeReport {
                    tick_lower,
                    tick_upper,
                    lower_initialized: false,
                    upper_initialized: false,
                    lower_liquidity: 0,
                    upper_liquidity: 0,
                    seconds_inside: None,
                    notes: Vec::new(),
                })
            }
        }
    }

    async fn swap_path_or_empty(
        &self,
        notes: &mut Vec<String>,
        pool: Address,
        amount_in: U256,
        direction: SwapDirection,
        current_tick: i32,
    ) -> Result<SwapPathReport, PoolError> {
        match self.verify_swap_path(pool, amount_in, direction).await {
            Ok(report) => Ok(report),
            Err(e) => {
                let message = e.to_string();
                degrade(notes, &format!("swap path {direction:?}"), e)?;
                Ok(SwapPathReport {
                    direction,
                    amount_in,
                    current_tick,
                    next_tick_boundary: current_tick,
                    tick_spacing: 0,
                    active_liquidity: 0,
                    boundary_initialized: false,
                    liquidity_available: false,
                    quote_available: self.session.contracts().quoter.is_some(),
                    can_swap: false,
                    quoted_amount_out: None,
                    sqrt_price_x96_after: None,
                    quote_error: Some(message),
                })
            }
        }
    }
}

/// Record a failed section, or hand back the error when the node is unreachable.
fn degrade(notes: &mut Vec<String>, section: &str, err: PoolError) -> Result<(), PoolError> {
    if err.is_connection() {
        return Err(err);
    }
    notes.push(format!("{section} unavailable: {err}"));
    Ok(())
}
