use std::str::FromStr;
use std::time::Duration;

use ethers::prelude::*;

use crate::chain::providers;
use crate::chain::session::{ContractDescriptors, Session, SessionSettings};
use crate::config::Config;
use crate::error::PoolError;
use crate::math::tick_math;

pub type LiveSession = Session<Provider<Http>, LocalWallet>;

pub struct AppState {
    pub session: LiveSession,

    // Pool to bootstrap
    pub token_a: Address,
    pub token_b: Address,
    pub fee_tier: u32,
    pub initial_sqrt_price_x96: U256,

    // Optional steps
    pub fund_amounts: Option<(U256, U256)>,
    pub swap_amount_in: Option<U256>,
    pub position_id: Option<U256>,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, PoolError> {
        let session = build_session(config)?;

        let fund_amounts = match (&config.fund_amount0, &config.fund_amount1) {
            (Some(a0), Some(a1)) => Some((amount("FUND_AMOUNT0", a0)?, amount("FUND_AMOUNT1", a1)?)),
            (None, None) => None,
            _ => {
                return Err(PoolError::Configuration(
                    "FUND_AMOUNT0 and FUND_AMOUNT1 must be set together".into(),
                ))
            }
        };

        Ok(AppState {
            session,
            token_a: address("TOKEN_A", &config.token_a)?,
            token_b: address("TOKEN_B", &config.token_b)?,
            fee_tier: config.fee_tier,
            initial_sqrt_price_x96: tick_math::encode_sqrt_price_x96_from_decimal(config.initial_price)?,
            fund_amounts,
            swap_amount_in: config
                .swap_amount_in
                .as_ref()
                .map(|raw| amount("SWAP_AMOUNT_IN", raw))
                .transpose()?,
            position_id: config
                .position_id
                .as_ref()
                .map(|raw| amount("POSITION_ID", raw))
                .transpose()?,
        })
    }
}

pub fn build_session(config: &Config) -> Result<LiveSession, PoolError> {
    let provider = providers::create_provider(&config.rpc_url)?;
    let wallet = LocalWallet::from_str(config.private_key.trim_start_matches("0x"))
        .map_err(|e| PoolError::Configuration(format!("PRIVATE_KEY is not a valid key: {e}")))?
        .with_chain_id(config.chain_id);

    let contracts = ContractDescriptors {
        factory: address("FACTORY_ADDRESS", &config.factory_address)?,
        position_manager: address("POSITION_MANAGER_ADDRESS", &config.position_manager_address)?,
        router: address("ROUTER_ADDRESS", &config.router_address)?,
        quoter: config
            .quoter_address
            .as_ref()
            .map(|raw| address("QUOTER_ADDRESS", raw))
            .transpose()?,
    };

    let settings = SessionSettings {
        chain_id: config.chain_id,
        gas_buffer_percent: config.gas_buffer_percent,
        receipt_timeout: Duration::from_secs(config.receipt_timeout_secs),
        poll_interval: Duration::from_millis(config.receipt_poll_millis),
        deadline_window_secs: config.deadline_window_secs,
        log_start_block: config.log_start_block,
        log_max_block_span: config.log_max_block_span,
    };

    Session::new(provider, wallet, contracts, settings)
}

fn address(key: &str, raw: &str) -> Result<Address, PoolError> {
    Address::from_str(raw).map_err(|e| PoolError::Configuration(format!("{key}={raw:?} is not an address: {e}")))
}

fn amount(key: &str, raw: &str) -> Result<U256, PoolError> {
    U256::from_dec_str(raw).map_err(|e| PoolError::Configuration(format!("{key}={raw:?} is not an integer amount: {e}")))
}
