// src/chain/session.rs
//
// Everything a lifecycle step needs to talk to the chain: one RPC handle, one signer,
// the contract addresses it may call, and the tunables for submission and log queries.

use std::sync::Arc;
use std::time::Duration;

use ethers::providers::Middleware;
use ethers::signers::Signer;
use ethers::types::{Address, BlockNumber, U256};

use crate::chain::contracts::{ConcentratedPool, Erc20, PoolFactory, PositionManager, Quoter, SwapRouter};
use crate::chain::events::EventRetriever;
use crate::chain::gas::DEFAULT_GAS_BUFFER_PERCENT;
use crate::chain::orchestrator::TransactionOrchestrator;
use crate::error::{classify_middleware_read, PoolError};

/// Addresses of the deployed protocol contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractDescriptors {
    pub factory: Address,
    pub position_manager: Address,
    pub router: Address,
    pub quoter: Option<Address>,
}

impl ContractDescriptors {
    pub fn validate(&self) -> Result<(), PoolError> {
        let named = [
            ("factory", Some(self.factory)),
            ("position manager", Some(self.position_manager)),
            ("router", Some(self.router)),
            ("quoter", self.quoter),
        ];
        for (name, address) in named.iter() {
            if *address == Some(Address::zero()) {
                return Err(PoolError::Configuration(format!("{name} address is the zero address")));
            }
        }
        for (i, (a_name, a)) in named.iter().enumerate() {
            for (b_name, b) in named.iter().skip(i + 1) {
                if a.is_some() && a == b {
                    return Err(PoolError::Configuration(format!(
                        "{a_name} and {b_name} share address {:?}",
                        a.unwrap_or_default()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub chain_id: u64,
    pub gas_buffer_percent: u64,
    pub receipt_timeout: Duration,
    pub poll_interval: Duration,
    pub deadline_window_secs: u64,
    /// First block scanned by log queries. 0 means "not configured".
    pub log_start_block: u64,
    pub log_max_block_span: u64,
}

impl SessionSettings {
    pub fn new(chain_id: u64) -> Self {
        SessionSettings {
            chain_id,
            gas_buffer_percent: DEFAULT_GAS_BUFFER_PERCENT,
            receipt_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(2000),
            deadline_window_secs: 1200,
            log_start_block: 0,
            log_max_block_span: 10_000,
        }
    }
}

pub struct Session<M, S> {
    client: Arc<M>,
    signer: S,
    contracts: ContractDescriptors,
    settings: SessionSettings,
}

impl<M: Middleware + 'static, S: Signer> Session<M, S> {
    pub fn new(
        client: Arc<M>,
        signer: S,
        contracts: ContractDescriptors,
        settings: SessionSettings,
    ) -> Result<Self, PoolError> {
        contracts.validate()?;
        if settings.log_max_block_span == 0 {
            return Err(PoolError::Configuration("LOG_MAX_BLOCK_SPAN must be positive".into()));
        }
        if signer.chain_id() != settings.chain_id {
            return Err(PoolError::Configuration(format!(
                "signer chain id {} does not match configured chain id {}",
                signer.chain_id(),
                settings.chain_id
            )));
        }
        Ok(Session { client, signer, contracts, settings })
    }

    pub fn client(&self) -> Arc<M> {
        self.client.clone()
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    /// Account that signs, pays for and receives everything in this session.
    pub fn account(&self) -> Address {
        self.signer.address()
    }

    pub fn contracts(&self) -> &ContractDescriptors {
        &self.contracts
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    // ----- contract handles -----

    pub fn factory(&self) -> PoolFactory<M> {
        PoolFactory::new(self.contracts.factory, self.client.clone())
    }

    pub fn pool(&self, address: Address) -> ConcentratedPool<M> {
        ConcentratedPool::new(address, self.client.clone())
    }

    pub fn position_manager(&self) -> PositionManager<M> {
        PositionManager::new(self.contracts.position_manager, self.client.clone())
    }

    pub fn router(&self) -> SwapRouter<M> {
        SwapRouter::new(self.contracts.router, self.client.clone())
    }

    pub fn quoter(&self) -> Option<Quoter<M>> {
        self.contracts.quoter.map(|address| Quoter::new(address, self.client.clone()))
    }

    pub fn token(&self, address: Address) -> Erc20<M> {
        Erc20::new(address, self.client.clone())
    }

    // ----- components -----

    pub fn orchestrator(&self) -> TransactionOrchestrator<'_, M, S> {
        TransactionOrchestrator::new(&self.client, &self.signer, &self.settings)
    }

    pub fn events(&self) -> EventRetriever<M> {
        EventRetriever::new(
            self.client.clone(),
            self.settings.log_start_block,
            self.settings.log_max_block_span,
        )
    }

    /// Latest block timestamp plus the configured window.
    pub async fn deadline(&self) -> Result<U256, PoolError> {
        let block = self
            .client
            .get_block(BlockNumber::Latest)
            .await
            .map_err(|e| classify_middleware_read("reading latest block", &e))?
            .ok_or_else(|| PoolError::ChainRead {
                context: "reading latest block".into(),
                message: "node returned no latest block".into(),
                revert: None,
            })?;
        Ok(block.timestamp + U256::from(self.settings.deadline_window_secs))
    }
}
