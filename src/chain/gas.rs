// src/chain/gas.rs
//
// Gas limit and cost bookkeeping for submitted transactions.
// - Estimate is padded by a fixed percentage before signing
// - Cost is reported in wei and (lossy) ETH

use ethers::types::U256;

/// Default safety margin applied to every gas estimate.
pub const DEFAULT_GAS_BUFFER_PERCENT: u64 = 20;

/// Gas figures for a single submission
#[derive(Debug, Clone, PartialEq)]
pub struct GasQuote {
    pub estimate: U256,
    pub gas_limit: U256,
    pub gas_price: U256,
    pub total_wei: U256,
    pub total_eth: f64,
}

impl GasQuote {
    pub fn new(estimate: U256, buffer_percent: u64, gas_price: U256) -> Self {
        let gas_limit = apply_buffer(estimate, buffer_percent);
        let total_wei = gas_price.saturating_mul(gas_limit);
        GasQuote {
            estimate,
            gas_limit,
            gas_price,
            total_wei,
            total_eth: wei_to_eth_f64_fast(total_wei),
        }
    }

    /// Actual cost once the receipt is known.
    pub fn realized_eth(&self, gas_used: U256) -> f64 {
        wei_to_eth_f64_fast(self.gas_price.saturating_mul(gas_used))
    }
}

/// `estimate * (100 + percent) / 100`, rounded down. Saturates instead of overflowing.
pub fn apply_buffer(estimate: U256, percent: u64) -> U256 {
    let factor = U256::from(percent).saturating_add(U256::from(100));
    estimate.saturating_mul(factor) / U256::from(100)
}

/// Fast convert U256 wei -> f64 ETH (lossy, for reporting)
#[inline]
pub fn wei_to_eth_f64_fast(v: U256) -> f64 {
    if v > U256::from(u128::MAX) {
        return f64::INFINITY;
    }
    (v.as_u128() as f64) / 1e18
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wei_to_eth_f64_fast() {
        let one_eth = U256::from_dec_str("1000000000000000000")
            .expect("Failed to parse one ETH amount");
        assert!((wei_to_eth_f64_fast(one_eth) - 1.0).abs() < 1e-10);

        let half_eth = U256::from_dec_str("500000000000000000")
            .expect("Failed to parse half ETH amount");
        assert!((wei_to_eth_f64_fast(half_eth) - 0.5).abs() < 1e-10);

        assert_eq!(wei_to_eth_f64_fast(U256::zero()), 0.0);

        let one_gwei = U256::from(1_000_000_000u64);
        assert!((wei_to_eth_f64_fast(one_gwei) - 1e-9).abs() < 1e-15);

        assert!(wei_to_eth_f64_fast(U256::MAX).is_infinite());
    }

    #[test]
    fn test_apply_buffer() {
        assert_eq!(apply_buffer(U256::from(100_000u64), 20), U256::from(120_000u64));
        assert_eq!(apply_buffer(U256::from(21_000u64), DEFAULT_GAS_BUFFER_PERCENT), U256::from(25_200u64));
        // rounds down
        assert_eq!(apply_buffer(U256::from(7u64), 20), U256::from(8u64));
        assert_eq!(apply_buffer(U256::from(50_000u64), 0), U256::from(50_000u64));
        // saturates
        assert_eq!(apply_buffer(U256::MAX, 20), U256::MAX / U256::from(100));
    }

    #[test]
    fn test_apply_buffer_huge_percent() {
        // GAS_BUFFER_PERCENT comes straight from the environment
        let expected = (U256::from(u64::MAX) + U256::from(100)) / U256::from(100);
        assert_eq!(apply_buffer(U256::one(), u64::MAX), expected);
        assert_eq!(apply_buffer(U256::MAX, u64::MAX), U256::MAX / U256::from(100));
    }

    #[test]
    fn test_gas_quote_calculations() {
        // 50 gwei * 120k gas = 0.006 ETH
        let quote = GasQuote::new(U256::from(100_000u64), 20, U256::from(50_000_000_000u64));

        assert_eq!(quote.gas_limit, U256::from(120_000u64));
        let expected_total_wei = U256::from_dec_str("6000000000000000")
            .expect("Failed to parse expected total wei");
        assert_eq!(quote.total_wei, expected_total_wei);
        assert!((quote.total_eth - 0.006).abs() < 1e-10);

        // realized cost uses gas actually spent, not the padded limit
        assert!((quote.realized_eth(U256::from(100_000u64)) - 0.005).abs() < 1e-10);
    }

    #[test]
    fn test_gas_quote_zero_price() {
        let quote = GasQuote::new(U256::from(200_000u64), 20, U256::zero());
        assert_eq!(quote.total_wei, U256::zero());
        assert_eq!(quote.total_eth, 0.0);
    }
}
