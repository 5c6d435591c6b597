use chrono::{DateTime, Utc};
use ethers::types::{Address, TxHash, U256};
use serde::Serialize;

use crate::math::tick_math;

// ------------------------------- Pool identity -------------------------------

/// A token pair in canonical pool order (`token0 < token1` by numeric address).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TokenPair {
    pub token0: Address,
    pub token1: Address,
}

impl TokenPair {
    /// Sort two addresses into pool order. Commutative and total.
    pub fn canonicalize(a: Address, b: Address) -> Self {
        if a <= b {
            Self { token0: a, token1: b }
        } else {
            Self { token0: b, token1: a }
        }
    }

    pub fn contains(&self, token: Address) -> bool {
        self.token0 == token || self.token1 == token
    }

    /// Input and output token for a swap in the given direction.
    pub fn oriented(&self, direction: SwapDirection) -> (Address, Address) {
        match direction {
            SwapDirection::ZeroForOne => (self.token0, self.token1),
            SwapDirection::OneForZero => (self.token1, self.token0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolDescriptor {
    pub pair: TokenPair,
    pub fee: u32,
    /// Assigned by the factory; `None` until the pool is created.
    pub address: Option<Address>,
}

impl PoolDescriptor {
    pub fn new(pair: TokenPair, fee: u32) -> Self {
        Self { pair, fee, address: None }
    }

    pub fn at(pair: TokenPair, fee: u32, address: Address) -> Self {
        Self { pair, fee, address: Some(address) }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum SwapDirection {
    /// token0 in, token1 out (price moves down).
    ZeroForOne,
    /// token1 in, token0 out (price moves up).
    OneForZero,
}

impl SwapDirection {
    pub fn zero_for_one(self) -> bool {
        matches!(self, SwapDirection::ZeroForOne)
    }
}

// ------------------------------- Runtime state -------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolState {
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub liquidity: u128,
    pub unlocked: bool,
}

impl PoolState {
    pub fn price(&self) -> f64 {
        tick_math::price_from_sqrt_price_x96(self.sqrt_price_x96)
    }

    pub fn is_initialized(&self) -> bool {
        !self.sqrt_price_x96.is_zero()
    }
}

/// Result of probing a pool address before touching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolProbe {
    NotFound,
    Uninitialized,
    Initialized(PoolState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickInfo {
    pub tick: i32,
    pub liquidity_gross: u128,
    pub liquidity_net: i128,
}

impl TickInfo {
    pub fn empty(tick: i32) -> Self {
        Self { tick, liquidity_gross: 0, liquidity_net: 0 }
    }

    pub fn initialized(&self) -> bool {
        self.liquidity_gross > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    pub token_id: U256,
    pub owner: Address,
    pub token0: Address,
    pub token1: Address,
    pub fee: u32,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    pub fee_growth_inside_last_x128: (U256, U256),
    pub tokens_owed: (u128, u128),
}

// ------------------------------- Outcomes -------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitializeOutcome {
    AlreadyInitialized(PoolState),
    Initialized { tx_hash: TxHash, sqrt_price_x96: U256 },
}

impl InitializeOutcome {
    pub fn sqrt_price_x96(&self) -> U256 {
        match self {
            InitializeOutcome::AlreadyInitialized(state) => state.sqrt_price_x96,
            InitializeOutcome::Initialized { sqrt_price_x96, .. } => *sqrt_price_x96,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MintOutcome {
    pub tx_hash: TxHash,
    pub token_id: U256,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub position: Option<Position>,
    pub lower_initialized: bool,
    pub upper_initialized: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwapOutcome {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
    pub amount_in: U256,
}

// ------------------------------- Diagnostics -------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ActiveTickReport {
    pub state: PoolState,
    pub price: f64,
    /// Whether the reported tick matches the tick derived from `sqrt_price_x96`.
    pub tick_consistent: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiquidityRangeReport {
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub lower_initialized: bool,
    pub upper_initialized: bool,
    pub lower_liquidity: u128,
    pub upper_liquidity: u128,
    pub seconds_inside: Option<u32>,
    pub notes: Vec<String>,
}

impl LiquidityRangeReport {
    pub fn liquidity_available(&self) -> bool {
        self.lower_liquidity > 0 || self.upper_liquidity > 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionReport {
    pub token_id: U256,
    pub is_owner: bool,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    pub lower_initialized: bool,
    pub upper_initialized: bool,
    pub fee_growth_inside_last_x128: (U256, U256),
    pub tokens_owed: (u128, u128),
}

#[derive(Debug, Clone, Serialize)]
pub struct SwapPathReport {
    pub direction: SwapDirection,
    pub amount_in: U256,
    pub current_tick: i32,
    pub next_tick_boundary: i32,
    pub tick_spacing: i32,
    pub active_liquidity: u128,
    pub boundary_initialized: bool,
    pub liquidity_available: bool,
    /// A quoter is configured, so `can_swap` reflects a real quote.
    pub quote_available: bool,
    pub can_swap: bool,
    pub quoted_amount_out: Option<U256>,
    pub sqrt_price_x96_after: Option<U256>,
    pub quote_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwapPathPair {
    pub zero_for_one: SwapPathReport,
    pub one_for_zero: SwapPathReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisReport {
    pub timestamp_utc: DateTime<Utc>,
    pub pool: Address,
    pub pool_state: ActiveTickReport,
    pub position_state: Option<PositionReport>,
    pub current_range_liquidity: LiquidityRangeReport,
    pub position_range_liquidity: Option<LiquidityRangeReport>,
    pub swap_path_info: SwapPathPair,
    pub notes: Vec<String>,
}

impl DiagnosisReport {
    /// True when at least one direction quoted a non-zero output.
    ///
    /// Without a quoter this is always false, even for a liquid pool; check
    /// `quote_available` and `liquidity_available` on the swap paths to tell the cases apart.
    pub fn tradeable(&self) -> bool {
        self.swap_path_info.zero_for_one.can_swap || self.swap_path_info.one_for_zero.can_swap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_is_commutative_and_ordered() {
        let addresses: Vec<Address> = (1u8..=16)
            .map(|i| {
                let mut raw = [0u8; 20];
                raw[0] = i.wrapping_mul(37);
                raw[19] = i;
                Address::from(raw)
            })
            .collect();

        for a in &addresses {
            for b in &addresses {
                if a == b {
                    continue;
                }
                let ab = TokenPair::canonicalize(*a, *b);
                let ba = TokenPair::canonicalize(*b, *a);
                assert_eq!(ab, ba);
                assert!(ab.token0 < ab.token1);
            }
        }
    }

    #[test]
    fn test_canonicalize_uses_numeric_order() {
        let low = Address::from([0x01; 20]);
        let high = Address::from([0xFF; 20]);
        let pair = TokenPair::canonicalize(high, low);
        assert_eq!(pair.token0, low);
        assert_eq!(pair.token1, high);
        assert!(pair.contains(low) && pair.contains(high));
    }

    #[test]
    fn test_oriented_tokens() {
        let pair = TokenPair::canonicalize(Address::from([0x11; 20]), Address::from([0x22; 20]));
        assert_eq!(pair.oriented(SwapDirection::ZeroForOne), (pair.token0, pair.token1));
        assert_eq!(pair.oriented(SwapDirection::OneForZero), (pair.token1, pair.token0));
    }

    #[test]
    fn test_tick_info_initialized() {
        assert!(!TickInfo::empty(60).initialized());
        let info = TickInfo { tick: 60, liquidity_gross: 5, liquidity_net: -5 };
        assert!(info.initialized());
    }

    #[test]
    fn test_range_liquidity_available() {
        let mut report = LiquidityRangeReport {
            tick_lower: -10,
            tick_upper: 10,
            lower_initialized: false,
            upper_initialized: false,
            lower_liquidity: 0,
            upper_liquidity: 0,
            seconds_inside: None,
            notes: vec![],
        };
        assert!(!report.liquidity_available());
        report.upper_liquidity = 1;
        assert!(report.liquidity_available());
    }
}
