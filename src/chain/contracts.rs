// src/chain/contracts.rs
//
// Compile-time contract bindings. The callable set of every contract the engine talks to
// lives here; only addresses are supplied at runtime.
//
// Struct field names are chosen for the generated Rust; tuple encoding is positional so
// the selectors match the deployed periphery contracts.

use ethers::contract::abigen;

abigen!(
    PoolFactory,
    r#"[
        function getPool(address tokenA, address tokenB, uint24 fee) view returns (address pool)
        function createPool(address tokenA, address tokenB, uint24 fee) returns (address pool)
        event PoolCreated(address indexed token0, address indexed token1, uint24 indexed fee, int24 tickSpacing, address pool)
    ]"#
);

abigen!(
    ConcentratedPool,
    r#"[
        function slot0() view returns (uint160 sqrtPriceX96, int24 tick, uint16 observationIndex, uint16 observationCardinality, uint16 observationCardinalityNext, uint8 feeProtocol, bool unlocked)
        function liquidity() view returns (uint128)
        function fee() view returns (uint24)
        function tickSpacing() view returns (int24)
        function token0() view returns (address)
        function token1() view returns (address)
        function ticks(int24 tick) view returns (uint128 liquidityGross, int128 liquidityNet, uint256 feeGrowthOutside0X128, uint256 feeGrowthOutside1X128, int56 tickCumulativeOutside, uint160 secondsPerLiquidityOutsideX128, uint32 secondsOutside, bool initialized)
        function snapshotCumulativesInside(int24 tickLower, int24 tickUpper) view returns (int56 tickCumulativeInside, uint160 secondsPerLiquidityInsideX128, uint32 secondsInside)
        function initialize(uint160 sqrtPriceX96)
        event Initialize(uint160 sqrtPriceX96, int24 tick)
        event Mint(address sender, address indexed owner, int24 indexed tickLower, int24 indexed tickUpper, uint128 amount, uint256 amount0, uint256 amount1)
        event Burn(address indexed owner, int24 indexed tickLower, int24 indexed tickUpper, uint128 amount, uint256 amount0, uint256 amount1)
        event Swap(address indexed sender, address indexed recipient, int256 amount0, int256 amount1, uint160 sqrtPriceX96, uint128 liquidity, int24 tick)
        event Collect(address indexed owner, address recipient, int24 indexed tickLower, int24 indexed tickUpper, uint128 amount0, uint128 amount1)
    ]"#
);

abigen!(
    PositionManager,
    r#"[
        struct MintParams { address tokenFirst; address tokenSecond; uint24 fee; int24 tickLower; int24 tickUpper; uint256 amountFirstDesired; uint256 amountSecondDesired; uint256 amountFirstMin; uint256 amountSecondMin; address recipient; uint256 deadline; }
        function mint(MintParams params) returns (uint256 tokenId, uint128 liquidity, uint256 amount0, uint256 amount1)
        function positions(uint256 tokenId) view returns (uint96 nonce, address operator, address token0, address token1, uint24 fee, int24 tickLower, int24 tickUpper, uint128 liquidity, uint256 feeGrowthInside0LastX128, uint256 feeGrowthInside1LastX128, uint128 tokensOwed0, uint128 tokensOwed1)
        function ownerOf(uint256 tokenId) view returns (address)
        event IncreaseLiquidity(uint256 indexed tokenId, uint128 liquidity, uint256 amount0, uint256 amount1)
    ]"#
);

abigen!(
    SwapRouter,
    r#"[
        struct ExactInputSingleParams { address tokenIn; address tokenOut; uint24 fee; address recipient; uint256 deadline; uint256 amountIn; uint256 amountOutMinimum; uint160 sqrtPriceLimit; }
        struct ExactInputParams { bytes path; address recipient; uint256 deadline; uint256 amountIn; uint256 amountOutMinimum; }
        function exactInputSingle(ExactInputSingleParams params) returns (uint256 amountOut)
        function exactInput(ExactInputParams params) returns (uint256 amountOut)
    ]"#
);

abigen!(
    Quoter,
    r#"[
        struct QuoteExactInputSingleParams { address tokenIn; address tokenOut; uint256 amountIn; uint24 fee; uint160 sqrtPriceLimit; }
        function quoteExactInputSingle(QuoteExactInputSingleParams params) returns (uint256 amountOut, uint160 sqrtPriceX96After, uint32 initializedTicksCrossed, uint256 gasEstimate)
    ]"#
);

abigen!(
    Erc20,
    r#"[
        function balanceOf(address account) view returns (uint256)
        function decimals() view returns (uint8)
        function symbol() view returns (string)
        function approve(address spender, uint256 amount) returns (bool)
    ]"#
);
