// src/engine/state.rs
//
// Fresh reads of pool and position state. Nothing here is cached: every caller gets the
// chain's current view.

use ethers::contract::ContractError;
use ethers::providers::Middleware;
use ethers::types::{Address, Bytes, U256};

use crate::chain::contracts::{ConcentratedPool, PositionManager};
use crate::error::{classify_middleware_read, classify_read, decode_revert_reason, PoolError};
use crate::models::{PoolProbe, PoolState, Position, TickInfo, TokenPair};

/// Revert strings a pool gives before `initialize` has run.
const UNINITIALIZED_REVERTS: [&str; 1] = ["LOK"];

/// Tri-state probe: no code, code but no price, or live state.
pub async fn probe_pool<M: Middleware + 'static>(
    client: &M,
    pool: &ConcentratedPool<M>,
) -> Result<PoolProbe, PoolError> {
    let address = pool.address();
    let code = client
        .get_code(address, None)
        .await
        .map_err(|e| classify_middleware_read(&format!("reading code at {address:?}"), &e))?;
    if code.is_empty() {
        return Ok(PoolProbe::NotFound);
    }

    let (sqrt_price_x96, tick, _, _, _, _, unlocked) = match pool.slot_0().call().await {
        Ok(slot) => slot,
        Err(ContractError::Revert(data)) if is_uninitialized_revert(&data) => {
            log::debug!("slot0 of {address:?} reverted as uninitialized");
            return Ok(PoolProbe::Uninitialized);
        }
        Err(e) => return Err(classify_read("slot0", e)),
    };
    if sqrt_price_x96.is_zero() {
        return Ok(PoolProbe::Uninitialized);
    }

    let liquidity = pool
        .liquidity()
        .call()
        .await
        .map_err(|e| classify_read("liquidity", e))?;
    Ok(PoolProbe::Initialized(PoolState {
        sqrt_price_x96,
        tick,
        liquidity,
        unlocked,
    }))
}

/// Only a known reason string counts; an empty revert is what any contract without a
/// `slot0()` selector returns, so it stays a read failure.
fn is_uninitialized_revert(data: &Bytes) -> bool {
    decode_revert_reason(data)
        .map(|reason| UNINITIALIZED_REVERTS.contains(&reason.as_str()))
        .unwrap_or(false)
}

/// `slot0` + `liquidity` without the code check; callers that already know the pool
/// exists use this.
pub async fn read_pool_state<M: Middleware + 'static>(pool: &ConcentratedPool<M>) -> Result<PoolState, PoolError> {
    let (sqrt_price_x96, tick, _, _, _, _, unlocked) = pool
        .slot_0()
        .call()
        .await
        .map_err(|e| classify_read("slot0", e))?;
    let liquidity = pool
        .liquidity()
        .call()
        .await
        .map_err(|e| classify_read("liquidity", e))?;
    Ok(PoolState {
        sqrt_price_x96,
        tick,
        liquidity,
        unlocked,
    })
}

pub async fn read_tick<M: Middleware + 'static>(pool: &ConcentratedPool<M>, tick: i32) -> Result<TickInfo, PoolError> {
    let (liquidity_gross, liquidity_net, ..) = pool
        .ticks(tick)
        .call()
        .await
        .map_err(|e| classify_read(&format!("ticks({tick})"), e))?;
    Ok(TickInfo {
        tick,
        liquidity_gross,
        liquidity_net,
    })
}

pub async fn read_fee<M: Middleware + 'static>(pool: &ConcentratedPool<M>) -> Result<u32, PoolError> {
    pool.fee().call().await.map_err(|e| classify_read("fee", e))
}

pub async fn read_tick_spacing<M: Middleware + 'static>(pool: &ConcentratedPool<M>) -> Result<i32, PoolError> {
    pool.tick_spacing()
        .call()
        .await
        .map_err(|e| classify_read("tickSpacing", e))
}

pub async fn read_pair<M: Middleware + 'static>(pool: &ConcentratedPool<M>) -> Result<TokenPair, PoolError> {
    let token0 = pool.token_0().call().await.map_err(|e| classify_read("token0", e))?;
    let token1 = pool.token_1().call().await.map_err(|e| classify_read("token1", e))?;
    Ok(TokenPair { token0, token1 })
}

/// Position record plus its current NFT owner.
pub async fn read_position<M: Middleware + 'static>(
    manager: &PositionManager<M>,
    token_id: U256,
) -> Result<Position, PoolError> {
    let (
        _nonce,
        _operator,
        token0,
        token1,
        fee,
        tick_lower,
        tick_upper,
        liquidity,
        fee_growth_inside0,
        fee_growth_inside1,
        tokens_owed0,
        tokens_owed1,
    ) = manager
        .positions(token_id)
        .call()
        .await
        .map_err(|e| classify_read(&format!("positions({token_id})"), e))?;
    let owner: Address = manager
        .owner_of(token_id)
        .call()
        .await
        .map_err(|e| classify_read(&format!("ownerOf({token_id})"), e))?;
    Ok(Position {
        token_id,
        owner,
        token0,
        token1,
        fee,
        tick_lower,
        tick_upper,
        liquidity,
        fee_growth_inside_last_x128: (fee_growth_inside0, fee_growth_inside1),
        tokens_owed: (tokens_owed0, tokens_owed1),
    })
}
