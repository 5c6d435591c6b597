// src/error.rs
//
// One error type for the whole engine. Every chain call is classified here so that
// callers can tell "the node is down" apart from "the node said no".

use std::time::Duration;

use ethers::contract::{ContractError, EthError};
use ethers::providers::{Middleware, MiddlewareError};
use ethers::types::{Address, Bytes, TxHash};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("rpc endpoint unavailable while {context}: {message}")]
    Connection { context: String, message: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("read-only call {context} failed: {message}")]
    ChainRead {
        context: String,
        message: String,
        revert: Option<Bytes>,
    },

    #[error("chain call {context} failed: {message}")]
    ChainCall { context: String, message: String },

    #[error("transaction {tx_hash:?} failed on-chain (reason: {})", .revert_reason.as_deref().unwrap_or("unknown"))]
    TransactionFailure {
        tx_hash: TxHash,
        revert_reason: Option<String>,
    },

    #[error("no receipt for transaction {tx_hash:?} after {waited:?}")]
    ReceiptTimeout { tx_hash: TxHash, waited: Duration },

    #[error("approval of token {token:?} for spender {spender:?} failed: {source}")]
    Approval {
        token: Address,
        spender: Address,
        #[source]
        source: Box<PoolError>,
    },

    #[error("no contract deployed at pool address {0:?}")]
    PoolNotDeployed(Address),

    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("invalid tick range [{lower}, {upper}]: {reason}")]
    InvalidTickRange {
        lower: i32,
        upper: i32,
        reason: String,
    },

    #[error("invalid swap path: {0}")]
    InvalidPath(String),
}

impl PoolError {
    pub fn is_connection(&self) -> bool {
        matches!(self, PoolError::Connection { .. })
    }

    /// Revert payload of a failed read, if the node returned one.
    pub fn revert_data(&self) -> Option<&Bytes> {
        match self {
            PoolError::ChainRead { revert, .. } => revert.as_ref(),
            _ => None,
        }
    }
}

// ------------------------------- Classification -------------------------------

/// Classify a failed view call made through a generated contract binding.
pub fn classify_read<M: Middleware>(context: &str, err: ContractError<M>) -> PoolError {
    match err {
        ContractError::Revert(data) => PoolError::ChainRead {
            context: context.to_string(),
            message: decode_revert_reason(&data).unwrap_or_else(|| "execution reverted".to_string()),
            revert: Some(data),
        },
        ContractError::MiddlewareError { e } => classify_middleware_read(context, &e),
        ContractError::ProviderError { e } => classify_middleware_read(context, &e),
        other => PoolError::ChainRead {
            context: context.to_string(),
            message: other.to_string(),
            revert: None,
        },
    }
}

/// Classify a failed raw middleware read (`eth_getCode`, `eth_getLogs`, ...).
pub fn classify_middleware_read<E: MiddlewareError>(context: &str, err: &E) -> PoolError {
    match err.as_error_response() {
        Some(rpc) => PoolError::ChainRead {
            context: context.to_string(),
            message: rpc.message.clone(),
            revert: rpc.as_revert_data(),
        },
        None => PoolError::Connection {
            context: context.to_string(),
            message: err.to_string(),
        },
    }
}

/// Classify a failed step of the write path (estimate, broadcast, receipt polling).
pub fn classify_middleware_write<E: MiddlewareError>(context: &str, err: &E) -> PoolError {
    match err.as_error_response() {
        Some(rpc) => {
            let reason = rpc
                .as_revert_data()
                .as_ref()
                .and_then(decode_revert_reason);
            PoolError::ChainCall {
                context: context.to_string(),
                message: match reason {
                    Some(reason) => format!("{} ({})", rpc.message, reason),
                    None => rpc.message.clone(),
                },
            }
        }
        None => PoolError::Connection {
            context: context.to_string(),
            message: err.to_string(),
        },
    }
}

/// Decode an `Error(string)` revert payload into its message.
pub fn decode_revert_reason(data: &Bytes) -> Option<String> {
    <String as EthError>::decode_with_selector(data)
}
