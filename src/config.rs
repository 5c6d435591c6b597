use std::env;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::PoolError;

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub private_key: String,
    pub chain_id: u64,

    // Protocol addresses
    pub factory_address: String,
    pub position_manager_address: String,
    pub router_address: String,
    pub quoter_address: Option<String>,

    // Pool to bootstrap
    pub token_a: String,
    pub token_b: String,
    pub fee_tier: u32,
    pub initial_price: Decimal,

    // Optional lifecycle steps
    pub fund_amount0: Option<String>,
    pub fund_amount1: Option<String>,
    pub swap_amount_in: Option<String>,
    pub position_id: Option<String>,

    // Log queries
    pub log_start_block: u64,
    pub log_max_block_span: u64,

    // Submission tunables
    pub gas_buffer_percent: u64,
    pub receipt_timeout_secs: u64,
    pub receipt_poll_millis: u64,
    pub deadline_window_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, PoolError> {
        // Load configuration files (secrets first, then public config)
        dotenv::from_filename("secrets.env").ok();
        dotenv::from_filename("addresses.env").ok();
        dotenv::from_filename("config/addresses.env").ok();
        dotenv::dotenv().ok();

        let rpc_url = required("RPC_URL")?;
        url::Url::parse(&rpc_url)
            .map_err(|e| PoolError::Configuration(format!("RPC_URL is not a valid URL: {e}")))?;

        Ok(Config {
            rpc_url,
            private_key: required("PRIVATE_KEY")?,
            chain_id: parse("CHAIN_ID", &required("CHAIN_ID")?)?,

            factory_address: required("FACTORY_ADDRESS")?,
            position_manager_address: required("POSITION_MANAGER_ADDRESS")?,
            router_address: required("ROUTER_ADDRESS")?,
            quoter_address: optional("QUOTER_ADDRESS"),

            token_a: required("TOKEN_A")?,
            token_b: required("TOKEN_B")?,
            fee_tier: with_default("FEE_TIER", 100)?,
            initial_price: with_default("INITIAL_PRICE", Decimal::ONE)?,

            fund_amount0: optional("FUND_AMOUNT0"),
            fund_amount1: optional("FUND_AMOUNT1"),
            swap_amount_in: optional("SWAP_AMOUNT_IN"),
            position_id: optional("POSITION_ID"),

            log_start_block: with_default("LOG_START_BLOCK", 0)?,
            log_max_block_span: with_default("LOG_MAX_BLOCK_SPAN", 10_000)?,

            gas_buffer_percent: with_default("GAS_BUFFER_PERCENT", 20)?,
            receipt_timeout_secs: with_default("RECEIPT_TIMEOUT_SECS", 120)?,
            receipt_poll_millis: with_default("RECEIPT_POLL_MILLIS", 2000)?,
            deadline_window_secs: with_default("DEADLINE_WINDOW_SECS", 1200)?,
        })
    }
}

fn required(key: &str) -> Result<String, PoolError> {
    optional(key).ok_or_else(|| PoolError::Configuration(format!("{key} must be set")))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn with_default<T: FromStr>(key: &str, default: T) -> Result<T, PoolError>
where
    T::Err: std::fmt::Display,
{
    match optional(key) {
        Some(raw) => parse(key, &raw),
        None => Ok(default),
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, PoolError>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| PoolError::Configuration(format!("{key}={raw:?} is invalid: {e}")))
}
