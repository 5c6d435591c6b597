// Shared fixtures for the mock-provider integration tests.
//
// `MockProvider` answers requests from the back of its queue, so `Script` collects
// responses in call order and installs them reversed.

#![allow(dead_code)]

use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ethers::abi::{self, Token};
use ethers::providers::{JsonRpcClient, JsonRpcError, MockError, MockProvider, MockResponse, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Block, Bytes, Log, Transaction, TransactionReceipt, TxHash, H256, U256, U64};
use ethers::utils::rlp;
use serde::de::DeserializeOwned;
use serde::Serialize;

use clpool_bootstrap::chain::session::{ContractDescriptors, Session, SessionSettings};

pub type MockSession = Session<Provider<MockProvider>, LocalWallet>;
pub type RecordingSession = Session<Provider<RecordingTransport>, LocalWallet>;

pub const CHAIN_ID: u64 = 31337;
pub const PRIVATE_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

pub fn factory() -> Address {
    Address::from([0xFA; 20])
}

pub fn position_manager() -> Address {
    Address::from([0xC3; 20])
}

pub fn router() -> Address {
    Address::from([0xE5; 20])
}

pub fn token_low() -> Address {
    Address::from([0x11; 20])
}

pub fn token_high() -> Address {
    Address::from([0x22; 20])
}

pub fn pool_address() -> Address {
    Address::from([0x90; 20])
}

pub fn settings() -> SessionSettings {
    SessionSettings {
        receipt_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(5),
        log_start_block: 100,
        log_max_block_span: 1_000,
        ..SessionSettings::new(CHAIN_ID)
    }
}

fn wallet() -> LocalWallet {
    PRIVATE_KEY.parse::<LocalWallet>().unwrap().with_chain_id(CHAIN_ID)
}

fn contracts(quoter: Option<Address>) -> ContractDescriptors {
    ContractDescriptors {
        factory: factory(),
        position_manager: position_manager(),
        router: router(),
        quoter,
    }
}

pub fn mock_session_with(settings: SessionSettings, quoter: Option<Address>) -> (MockSession, MockProvider) {
    let (provider, mock) = Provider::mocked();
    let session = Session::new(Arc::new(provider), wallet(), contracts(quoter), settings).unwrap();
    (session, mock)
}

pub fn mock_session() -> (MockSession, MockProvider) {
    mock_session_with(settings(), None)
}

/// Like `mock_session`, but every request is also kept for inspection.
pub fn recording_session() -> (RecordingSession, MockProvider, RecordingTransport) {
    let mock = MockProvider::new();
    let transport = RecordingTransport::new(mock.clone());
    let provider = Provider::new(transport.clone());
    let session = Session::new(Arc::new(provider), wallet(), contracts(None), settings()).unwrap();
    (session, mock, transport)
}

// ----- request recording -----

/// Forwards to a `MockProvider` and remembers each `(method, params)` pair.
#[derive(Debug, Clone)]
pub struct RecordingTransport {
    inner: MockProvider,
    requests: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
}

impl RecordingTransport {
    pub fn new(inner: MockProvider) -> Self {
        Self {
            inner,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|(method, _)| method.clone()).collect()
    }

    /// Every signed transaction handed to `eth_sendRawTransaction`, decoded.
    pub fn broadcasts(&self) -> Vec<Transaction> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(method, _)| method == "eth_sendRawTransaction")
            .map(|(_, params)| {
                let raw: Vec<Bytes> = serde_json::from_value(params.clone()).unwrap();
                rlp::decode::<Transaction>(&raw[0]).unwrap()
            })
            .collect()
    }
}

#[async_trait]
impl JsonRpcClient for RecordingTransport {
    type Error = MockError;

    async fn request<T, R>(&self, method: &str, params: T) -> Result<R, MockError>
    where
        T: Debug + Serialize + Send + Sync,
        R: DeserializeOwned + Send,
    {
        let recorded = serde_json::to_value(&params).unwrap();
        self.requests.lock().unwrap().push((method.to_string(), recorded));
        self.inner.request(method, params).await
    }
}

// ----- response script -----

#[derive(Default)]
pub struct Script {
    responses: Vec<MockResponse>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value<T: serde::Serialize>(mut self, value: T) -> Self {
        self.responses
            .push(MockResponse::Value(serde_json::to_value(value).unwrap()));
        self
    }

    /// ABI-encoded return data of an `eth_call`.
    pub fn ret(self, tokens: Vec<Token>) -> Self {
        self.value(Bytes::from(abi::encode(&tokens)))
    }

    pub fn revert(mut self, data: Option<Bytes>) -> Self {
        self.responses.push(MockResponse::Error(JsonRpcError {
            code: 3,
            message: "execution reverted".into(),
            data: data.map(|d| serde_json::Value::String(format!("0x{}", hex::encode(d)))),
        }));
        self
    }

    pub fn rpc_error(mut self, code: i64, message: &str) -> Self {
        self.responses.push(MockResponse::Error(JsonRpcError {
            code,
            message: message.into(),
            data: None,
        }));
        self
    }

    /// estimateGas, nonce, gasPrice, sendRawTransaction, receipt.
    pub fn transaction(self, receipt: TransactionReceipt) -> Self {
        self.value(U256::from(100_000u64))
            .value(U256::from(7u64))
            .value(U256::from(1_000_000_000u64))
            .value(TxHash::from_low_u64_be(0xabc))
            .value(receipt)
    }

    pub fn latest_block(self, timestamp: u64) -> Self {
        let block = Block::<TxHash> {
            number: Some(U64::from(1_000u64)),
            timestamp: U256::from(timestamp),
            ..Default::default()
        };
        self.value(block)
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn install(self, mock: &MockProvider) {
        for response in self.responses.into_iter().rev() {
            mock.push_response(response);
        }
    }
}

// ----- encoders -----

/// Two's-complement word for a signed ABI integer.
pub fn int(value: i128) -> Token {
    let magnitude = U256::from(value.unsigned_abs());
    if value < 0 {
        Token::Int(U256::MAX - magnitude + U256::one())
    } else {
        Token::Int(magnitude)
    }
}

pub fn uint(value: u128) -> Token {
    Token::Uint(U256::from(value))
}

pub fn slot0(sqrt_price_x96: U256, tick: i32) -> Vec<Token> {
    vec![
        Token::Uint(sqrt_price_x96),
        int(tick as i128),
        uint(0),
        uint(1),
        uint(1),
        uint(0),
        Token::Bool(true),
    ]
}

pub fn tick_info(liquidity_gross: u128, liquidity_net: i128) -> Vec<Token> {
    vec![
        uint(liquidity_gross),
        int(liquidity_net),
        uint(0),
        uint(0),
        int(0),
        uint(0),
        uint(0),
        Token::Bool(liquidity_gross > 0),
    ]
}

pub fn receipt(status: u64, logs: Vec<Log>) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: TxHash::from_low_u64_be(0xabc),
        block_number: Some(U64::from(1_001u64)),
        gas_used: Some(U256::from(90_000u64)),
        status: Some(U64::from(status)),
        logs,
        ..Default::default()
    }
}

pub fn topic(address: Address) -> H256 {
    H256::from(address)
}

pub fn error_string(reason: &str) -> Bytes {
    let mut out = vec![0x08, 0xc3, 0x79, 0xa0];
    out.extend(abi::encode(&[Token::String(reason.into())]));
    Bytes::from(out)
}
