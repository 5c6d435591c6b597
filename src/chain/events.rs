// src/chain/events.rs
//
// Pool event history over explicit block ranges. Ranges are chunked up front and
// bisected whenever the node refuses a query for being too large.

use std::sync::Arc;

use ethers::abi::RawLog;
use ethers::contract::{EthEvent, EthLogDecode};
use ethers::providers::{Middleware, MiddlewareError};
use ethers::types::{Address, Filter, Log, TxHash, U256};

use crate::chain::contracts::{
    BurnFilter, CollectFilter, ConcentratedPoolEvents, InitializeFilter, MintFilter, SwapFilter,
};
use crate::error::{classify_middleware_read, PoolError};

/// JSON-RPC code some providers use for "limit exceeded".
const LIMIT_EXCEEDED_CODE: i64 = -32005;

const SIZE_LIMIT_MARKERS: [&str; 7] = [
    "413",
    "too large",
    "response size",
    "query returned more than",
    "limit exceeded",
    "too many results",
    "block range",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Initialize,
    Mint,
    Burn,
    Swap,
    Collect,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Initialize,
        EventKind::Mint,
        EventKind::Burn,
        EventKind::Swap,
        EventKind::Collect,
    ];

    /// Canonical signature, e.g. `Initialize(uint160,int24)`.
    pub fn abi_signature(self) -> String {
        match self {
            EventKind::Initialize => InitializeFilter::abi_signature(),
            EventKind::Mint => MintFilter::abi_signature(),
            EventKind::Burn => BurnFilter::abi_signature(),
            EventKind::Swap => SwapFilter::abi_signature(),
            EventKind::Collect => CollectFilter::abi_signature(),
        }
        .into_owned()
    }

    fn of(event: &ConcentratedPoolEvents) -> Self {
        match event {
            ConcentratedPoolEvents::InitializeFilter(_) => EventKind::Initialize,
            ConcentratedPoolEvents::MintFilter(_) => EventKind::Mint,
            ConcentratedPoolEvents::BurnFilter(_) => EventKind::Burn,
            ConcentratedPoolEvents::SwapFilter(_) => EventKind::Swap,
            ConcentratedPoolEvents::CollectFilter(_) => EventKind::Collect,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventLog {
    pub kind: EventKind,
    pub address: Address,
    pub block_number: u64,
    pub tx_hash: Option<TxHash>,
    pub log_index: U256,
    pub event: ConcentratedPoolEvents,
}

pub struct EventRetriever<M> {
    client: Arc<M>,
    default_start_block: u64,
    max_block_span: u64,
}

impl<M: Middleware + 'static> EventRetriever<M> {
    pub fn new(client: Arc<M>, default_start_block: u64, max_block_span: u64) -> Self {
        EventRetriever {
            client,
            default_start_block,
            max_block_span: max_block_span.max(1),
        }
    }

    /// Logs of `kinds` emitted by `contract`, sorted by (block, log index).
    /// `from_block` falls back to the configured start block; `to_block` to the chain head.
    pub async fn get_events(
        &self,
        contract: Address,
        kinds: &[EventKind],
        from_block: Option<u64>,
        to_block: Option<u64>,
    ) -> Result<Vec<EventLog>, PoolError> {
        if kinds.is_empty() {
            return Ok(Vec::new());
        }
        let from = match from_block {
            Some(block) => block,
            None if self.default_start_block > 0 => self.default_start_block,
            None => {
                return Err(PoolError::Configuration(
                    "LOG_START_BLOCK must be set before querying pool events".into(),
                ))
            }
        };
        let to = match to_block {
            Some(block) => block,
            None => self
                .client
                .get_block_number()
                .await
                .map_err(|e| classify_middleware_read("reading chain head", &e))?
                .as_u64(),
        };
        if from > to {
            return Ok(Vec::new());
        }

        let signatures: Vec<String> = kinds.iter().map(|kind| kind.abi_signature()).collect();
        let base = Filter::new().address(contract).events(signatures.iter());

        // Work stack of inclusive ranges, lowest range on top.
        let mut pending: Vec<(u64, u64)> = chunk_range(from, to, self.max_block_span);
        pending.reverse();

        let mut raw_logs: Vec<Log> = Vec::new();
        while let Some((start, end)) = pending.pop() {
            let filter = base.clone().from_block(start).to_block(end);
            match self.client.get_logs(&filter).await {
                Ok(mut logs) => {
                    log::debug!("eth_getLogs [{start}, {end}] -> {} logs", logs.len());
                    raw_logs.append(&mut logs);
                }
                Err(e) if start < end && is_size_limit_error(&e) => {
                    let mid = start + (end - start) / 2;
                    log::debug!("eth_getLogs [{start}, {end}] too large, splitting at {mid}");
                    pending.push((mid + 1, end));
                    pending.push((start, mid));
                }
                Err(e) => {
                    return Err(classify_middleware_read(
                        &format!("fetching logs for blocks {start}..={end}"),
                        &e,
                    ))
                }
            }
        }

        let mut events = Vec::with_capacity(raw_logs.len());
        for log in raw_logs {
            if log.removed == Some(true) {
                continue;
            }
            let raw = RawLog { topics: log.topics.clone(), data: log.data.to_vec() };
            match ConcentratedPoolEvents::decode_log(&raw) {
                Ok(event) => events.push(EventLog {
                    kind: EventKind::of(&event),
                    address: log.address,
                    block_number: log.block_number.map(|n| n.as_u64()).unwrap_or_default(),
                    tx_hash: log.transaction_hash,
                    log_index: log.log_index.unwrap_or_default(),
                    event,
                }),
                Err(e) => log::warn!("skipping undecodable log in tx {:?}: {e}", log.transaction_hash),
            }
        }
        events.sort_by(|a, b| (a.block_number, a.log_index).cmp(&(b.block_number, b.log_index)));
        Ok(events)
    }

    pub async fn get_single_event_type(
        &self,
        contract: Address,
        kind: EventKind,
        from_block: Option<u64>,
        to_block: Option<u64>,
    ) -> Result<Vec<EventLog>, PoolError> {
        self.get_events(contract, &[kind], from_block, to_block).await
    }

    /// Swaps, initialization and mints: the activity that matters when bootstrapping.
    pub async fn get_pool_activity(
        &self,
        pool: Address,
        from_block: Option<u64>,
        to_block: Option<u64>,
    ) -> Result<Vec<EventLog>, PoolError> {
        self.get_events(
            pool,
            &[EventKind::Swap, EventKind::Initialize, EventKind::Mint],
            from_block,
            to_block,
        )
        .await
    }
}

/// Split `[from, to]` into consecutive inclusive ranges of at most `span` blocks.
pub fn chunk_range(from: u64, to: u64, span: u64) -> Vec<(u64, u64)> {
    let span = span.max(1);
    let mut chunks = Vec::new();
    let mut start = from;
    while start <= to {
        let end = start.saturating_add(span - 1).min(to);
        chunks.push((start, end));
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }
    chunks
}

fn is_size_limit_error<E: MiddlewareError>(err: &E) -> bool {
    let message = match err.as_error_response() {
        Some(rpc) if rpc.code == LIMIT_EXCEEDED_CODE => return true,
        Some(rpc) => rpc.message.to_lowercase(),
        None => err.to_string().to_lowercase(),
    };
    SIZE_LIMIT_MARKERS.iter().any(|marker| message.contains(marker))
}
