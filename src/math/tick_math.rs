// Tick and Q64.96 price math for concentrated-liquidity pools.
// -----------------------------------------------------------------------------
// - Prices are ratios token1/token0 in raw (smallest-unit) terms.
// - sqrtPriceX96 = floor(sqrt(price) * 2^96), stored on-chain as uint160.
// - BigUint is used for the intermediate products; results are handed back as U256
//   so they can go straight into contract calls.

use ethers::types::U256;
use num_bigint::BigUint;
use num_integer::Roots;
use num_traits::{One, ToPrimitive, Zero};
use rust_decimal::Decimal;

use crate::error::PoolError;
use crate::models::SwapDirection;

pub const MIN_TICK: i32 = -887_272;
pub const MAX_TICK: i32 = 887_272;

/// sqrt ratio at MIN_TICK.
pub const MIN_SQRT_RATIO: U256 = U256([4_295_128_739, 0, 0, 0]);
/// sqrt ratio at MAX_TICK.
pub const MAX_SQRT_RATIO: U256 = U256([6_743_328_256_752_651_558, 17_280_870_778_742_802_505, 4_294_805_859, 0]);

const Q96_BITS: usize = 96;

// Q128.128 multipliers for sqrt(1.0001)^-(2^i), i = 1..=19 (bit 0 seeds the ratio).
const TICK_BIT_ZERO: u128 = 0xfffcb933bd6fad37aa2d162d1a594001;
const TICK_MULTIPLIERS: [(u32, u128); 19] = [
    (0x2, 0xfff97272373d413259a46990580e213a),
    (0x4, 0xfff2e50f5f656932ef12357cf3c7fdcc),
    (0x8, 0xffe5caca7e10e4e61c3624eaa0941cd0),
    (0x10, 0xffcb9843d60f6159c9db58835c926644),
    (0x20, 0xff973b41fa98c081472e6896dfb254c0),
    (0x40, 0xff2ea16466c96a3843ec78b326b52861),
    (0x80, 0xfe5dee046a99a2a811c461f1969c3053),
    (0x100, 0xfcbe86c7900a88aedcffc83b479aa3a4),
    (0x200, 0xf987a7253ac413176f2b074cf7815e54),
    (0x400, 0xf3392b0822b70005940c7a398e4b70f3),
    (0x800, 0xe7159475a2c29b7443b29c7fa6e889d9),
    (0x1000, 0xd097f3bdfd2022b8845ad8f792aa5825),
    (0x2000, 0xa9f746462d870fdf8a65dc1f90e061e5),
    (0x4000, 0x70d869a156d2a1b890bb3df62baf32f7),
    (0x8000, 0x31be135f97d08fd981231505542fcfa6),
    (0x10000, 0x9aa508b5b7a84e1c677de54f3e99bc9),
    (0x20000, 0x5d6af8dedb81196699c329225ee604),
    (0x40000, 0x2216e584f5fa1ea926041bedfe98),
    (0x80000, 0x48a170391f7dc42444e8fa2),
];

// --------------------------------- Helpers ---------------------------------

pub fn u256_to_biguint(value: U256) -> BigUint {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    BigUint::from_bytes_be(&buf)
}

fn biguint_to_u256(value: &BigUint) -> Option<U256> {
    if value.bits() > 256 {
        return None;
    }
    Some(U256::from_big_endian(&value.to_bytes_be()))
}

// ------------------------------- Range helpers -------------------------------

/// Tick bounds of a position that behaves like an unbounded constant-product pool.
pub fn full_range_bounds() -> (i32, i32) {
    (MIN_TICK, MAX_TICK)
}

/// Round a range outward to multiples of `tick_spacing`.
///
/// The lower tick is floored and the upper tick ceiled, so the aligned range always
/// contains the requested one. At the absolute bounds the result is clamped to the
/// outermost usable multiple.
pub fn align_range_outward(lower: i32, upper: i32, tick_spacing: i32) -> Result<(i32, i32), PoolError> {
    if tick_spacing <= 0 {
        return Err(PoolError::InvalidTickRange {
            lower,
            upper,
            reason: format!("tick spacing must be positive, got {tick_spacing}"),
        });
    }
    if lower >= upper {
        return Err(PoolError::InvalidTickRange {
            lower,
            upper,
            reason: "lower tick must be below upper tick".to_string(),
        });
    }

    let min_usable = -(MIN_TICK.unsigned_abs() as i32 / tick_spacing) * tick_spacing;
    let max_usable = (MAX_TICK / tick_spacing) * tick_spacing;

    let aligned_lower = (lower.div_euclid(tick_spacing) * tick_spacing).max(min_usable);
    let aligned_upper = {
        let floored = upper.div_euclid(tick_spacing) * tick_spacing;
        let ceiled = if floored == upper { upper } else { floored + tick_spacing };
        ceiled.min(max_usable)
    };

    validate_position_range(aligned_lower, aligned_upper)?;
    Ok((aligned_lower, aligned_upper))
}

pub fn validate_position_range(lower: i32, upper: i32) -> Result<(), PoolError> {
    if lower >= upper {
        return Err(PoolError::InvalidTickRange {
            lower,
            upper,
            reason: "lower tick must be below upper tick".to_string(),
        });
    }
    if lower < MIN_TICK || upper > MAX_TICK {
        return Err(PoolError::InvalidTickRange {
            lower,
            upper,
            reason: format!("ticks must lie within [{MIN_TICK}, {MAX_TICK}]"),
        });
    }
    Ok(())
}

/// First spacing-aligned tick a swap in `direction` walks toward.
///
/// The current tick is floored to the spacing grid, then stepped one spacing down
/// (token0 in) or up (token1 in).
pub fn next_tick_boundary(current_tick: i32, tick_spacing: i32, direction: SwapDirection) -> i32 {
    let spacing = tick_spacing.max(1);
    let base = current_tick.div_euclid(spacing) * spacing;
    match direction {
        SwapDirection::ZeroForOne => base - spacing,
        SwapDirection::OneForZero => base + spacing,
    }
}

// ------------------------------- Price encoding -------------------------------

/// floor(sqrt(numerator / denominator) * 2^96), computed exactly.
pub fn encode_sqrt_price_x96(numerator: U256, denominator: U256) -> Result<U256, PoolError> {
    encode_sqrt_price_x96_big(&u256_to_biguint(numerator), &u256_to_biguint(denominator))
}

/// Same as [`encode_sqrt_price_x96`] for a decimal price such as `1` or `0.0005`.
pub fn encode_sqrt_price_x96_from_decimal(price: Decimal) -> Result<U256, PoolError> {
    if price.is_sign_negative() || price.is_zero() {
        return Err(PoolError::InvalidPrice(format!("price must be positive, got {price}")));
    }
    let mantissa = price.mantissa().unsigned_abs();
    let denominator = BigUint::from(10u32).pow(price.scale());
    encode_sqrt_price_x96_big(&BigUint::from(mantissa), &denominator)
}

fn encode_sqrt_price_x96_big(numerator: &BigUint, denominator: &BigUint) -> Result<U256, PoolError> {
    if numerator.is_zero() || denominator.is_zero() {
        return Err(PoolError::InvalidPrice(format!("{numerator}/{denominator} is not a positive ratio")));
    }
    // floor(sqrt(floor(x))) == floor(sqrt(x)) for x >= 0
    let scaled = (numerator << (2 * Q96_BITS)) / denominator;
    let root = Roots::sqrt(&scaled);

    let encoded = biguint_to_u256(&root)
        .ok_or_else(|| PoolError::InvalidPrice(format!("{numerator}/{denominator} overflows uint160")))?;
    if encoded < MIN_SQRT_RATIO || encoded >= MAX_SQRT_RATIO {
        return Err(PoolError::InvalidPrice(format!(
            "sqrtPriceX96 {encoded} outside [{MIN_SQRT_RATIO}, {MAX_SQRT_RATIO})"
        )));
    }
    Ok(encoded)
}

/// (sqrtPriceX96 / 2^96)^2 as a float, for reporting.
pub fn price_from_sqrt_price_x96(sqrt_price_x96: U256) -> f64 {
    let sqrt = u256_to_biguint(sqrt_price_x96).to_f64().unwrap_or(0.0);
    let ratio = sqrt / 2f64.powi(Q96_BITS as i32);
    ratio * ratio
}

// -------------------------------- Tick Math --------------------------------

/// Exact TickMath.getSqrtRatioAtTick (Q64.96).
pub fn sqrt_ratio_at_tick(tick: i32) -> Result<U256, PoolError> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(PoolError::InvalidTickRange {
            lower: tick,
            upper: tick,
            reason: "tick out of range".to_string(),
        });
    }
    let abs_tick = tick.unsigned_abs();

    // ratio is Q128.128
    let mut ratio = if abs_tick & 0x1 != 0 {
        BigUint::from(TICK_BIT_ZERO)
    } else {
        BigUint::one() << 128
    };
    for (bit, multiplier) in TICK_MULTIPLIERS {
        if abs_tick & bit != 0 {
            ratio = (&ratio * BigUint::from(multiplier)) >> 128;
        }
    }

    if tick > 0 {
        let max = (BigUint::one() << 256) - BigUint::one();
        ratio = max / ratio;
    }
    // round-up shift by 32 (Q128.128 -> Q64.96)
    let rounded = (&ratio + ((BigUint::one() << 32) - BigUint::one())) >> 32;
    biguint_to_u256(&rounded).ok_or_else(|| PoolError::InvalidPrice(format!("sqrt ratio at tick {tick} overflows")))
}

/// Greatest tick whose sqrt ratio is <= `sqrt_price_x96` (binary search over the exact forward map).
pub fn tick_at_sqrt_ratio(sqrt_price_x96: U256) -> Result<i32, PoolError> {
    if sqrt_price_x96 < MIN_SQRT_RATIO || sqrt_price_x96 >= MAX_SQRT_RATIO {
        return Err(PoolError::InvalidPrice(format!("sqrtPriceX96 {sqrt_price_x96} out of range")));
    }
    let mut lo = MIN_TICK;
    let mut hi = MAX_TICK;
    while lo < hi {
        let mid = lo + ((hi - lo + 1) / 2);
        if sqrt_ratio_at_tick(mid)? <= sqrt_price_x96 {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    Ok(lo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_tick_constants() {
        assert_eq!(MIN_TICK, -887272);
        assert_eq!(MAX_TICK, 887272);
        assert_eq!(full_range_bounds(), (-887272, 887272));
    }

    #[test]
    fn test_encode_price_one() {
        let expected = U256::from_dec_str("79228162514264337593543950336").unwrap();
        assert_eq!(encode_sqrt_price_x96(U256::one(), U256::one()).unwrap(), expected);
        assert_eq!(encode_sqrt_price_x96(U256::from(1_000_000u64), U256::from(1_000_000u64)).unwrap(), expected);
        assert_eq!(encode_sqrt_price_x96_from_decimal(Decimal::ONE).unwrap(), expected);
        assert_eq!(encode_sqrt_price_x96_from_decimal(Decimal::from_str("1.000").unwrap()).unwrap(), expected);
    }

    #[test]
    fn test_encode_perfect_squares() {
        let q96 = U256::one() << 96;
        assert_eq!(encode_sqrt_price_x96(U256::from(4), U256::one()).unwrap(), q96 * 2);
        assert_eq!(encode_sqrt_price_x96(U256::one(), U256::from(4)).unwrap(), q96 / 2);
        assert_eq!(
            encode_sqrt_price_x96_from_decimal(Decimal::from_str("0.25").unwrap()).unwrap(),
            q96 / 2
        );
    }

    #[test]
    fn test_encode_floors() {
        // sqrt(2) * 2^96 = 112045541949572279837463876454.9...
        let encoded = encode_sqrt_price_x96(U256::from(2), U256::one()).unwrap();
        assert_eq!(encoded, U256::from_dec_str("112045541949572279837463876454").unwrap());
    }

    #[test]
    fn test_encode_rejects_bad_prices() {
        assert!(encode_sqrt_price_x96(U256::zero(), U256::one()).is_err());
        assert!(encode_sqrt_price_x96(U256::one(), U256::zero()).is_err());
        assert!(encode_sqrt_price_x96_from_decimal(Decimal::from_str("-1").unwrap()).is_err());
        // 2^200 is far beyond the largest representable price (~2^128)
        assert!(encode_sqrt_price_x96(U256::one() << 200, U256::one()).is_err());
    }

    #[test]
    fn test_price_from_sqrt_price() {
        let q96 = U256::one() << 96;
        assert!((price_from_sqrt_price_x96(q96) - 1.0).abs() < 1e-12);
        assert!((price_from_sqrt_price_x96(q96 * 2) - 4.0).abs() < 1e-12);
        assert_eq!(price_from_sqrt_price_x96(U256::zero()), 0.0);
    }

    #[test]
    fn test_sqrt_ratio_at_known_ticks() {
        assert_eq!(sqrt_ratio_at_tick(0).unwrap(), U256::one() << 96);
        assert_eq!(sqrt_ratio_at_tick(MIN_TICK).unwrap(), MIN_SQRT_RATIO);
        assert_eq!(sqrt_ratio_at_tick(MAX_TICK).unwrap(), MAX_SQRT_RATIO);
        assert_eq!(
            sqrt_ratio_at_tick(-10).unwrap(),
            U256::from_dec_str("79188560314459151373725315960").unwrap()
        );
        assert_eq!(
            sqrt_ratio_at_tick(10).unwrap(),
            U256::from_dec_str("79267784519130042428790663799").unwrap()
        );
        assert!(sqrt_ratio_at_tick(MAX_TICK + 1).is_err());
    }

    #[test]
    fn test_tick_at_sqrt_ratio_inverts() {
        for tick in [MIN_TICK, -200_000, -10, -1, 0, 1, 10, 60, 123_456, MAX_TICK - 1] {
            let sqrt = sqrt_ratio_at_tick(tick).unwrap();
            assert_eq!(tick_at_sqrt_ratio(sqrt).unwrap(), tick, "tick {tick}");
        }
        // one wei above a tick boundary stays on that tick
        let sqrt = sqrt_ratio_at_tick(100).unwrap() + U256::one();
        assert_eq!(tick_at_sqrt_ratio(sqrt).unwrap(), 100);
        assert!(tick_at_sqrt_ratio(MAX_SQRT_RATIO).is_err());
    }

    #[test]
    fn test_align_range_outward() {
        assert_eq!(align_range_outward(-95, 95, 10).unwrap(), (-100, 100));
        assert_eq!(align_range_outward(-100, 100, 10).unwrap(), (-100, 100));
        assert_eq!(align_range_outward(1, 59, 60).unwrap(), (0, 60));
        assert_eq!(align_range_outward(MIN_TICK, MAX_TICK, 60).unwrap(), (-887220, 887220));
        assert_eq!(align_range_outward(MIN_TICK, MAX_TICK, 1).unwrap(), (MIN_TICK, MAX_TICK));
        assert!(align_range_outward(10, 10, 10).is_err());
        assert!(align_range_outward(-10, 10, 0).is_err());
    }

    #[test]
    fn test_next_tick_boundary() {
        assert_eq!(next_tick_boundary(0, 10, SwapDirection::ZeroForOne), -10);
        assert_eq!(next_tick_boundary(0, 10, SwapDirection::OneForZero), 10);
        assert_eq!(next_tick_boundary(-5, 10, SwapDirection::ZeroForOne), -20);
        assert_eq!(next_tick_boundary(-5, 10, SwapDirection::OneForZero), 0);
        assert_eq!(next_tick_boundary(125, 60, SwapDirection::OneForZero), 180);
    }

    #[test]
    fn test_validate_position_range() {
        assert!(validate_position_range(MIN_TICK, MAX_TICK).is_ok());
        assert!(validate_position_range(MIN_TICK - 1, 0).is_err());
        assert!(validate_position_range(5, -5).is_err());
    }
}
