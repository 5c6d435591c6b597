// Encoded swap paths for the router's path-based entry point.
//
// Layout: token(20) | fee(3, big-endian) | token(20) | fee(3) | token(20) ...

use ethers::types::{Address, Bytes};

use crate::error::PoolError;

const ADDRESS_LEN: usize = 20;
const FEE_LEN: usize = 3;
const HOP_LEN: usize = ADDRESS_LEN + FEE_LEN;
const MAX_FEE: u32 = (1 << 24) - 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapPath {
    tokens: Vec<Address>,
    fees: Vec<u32>,
}

impl SwapPath {
    /// One hop: `token_in --fee--> token_out`.
    pub fn single(token_in: Address, fee: u32, token_out: Address) -> Result<Self, PoolError> {
        check_fee(fee)?;
        Ok(Self { tokens: vec![token_in, token_out], fees: vec![fee] })
    }

    /// Append another hop from the current output token.
    pub fn then(mut self, fee: u32, token_out: Address) -> Result<Self, PoolError> {
        check_fee(fee)?;
        self.fees.push(fee);
        self.tokens.push(token_out);
        Ok(self)
    }

    pub fn token_in(&self) -> Address {
        self.tokens[0]
    }

    pub fn token_out(&self) -> Address {
        self.tokens[self.tokens.len() - 1]
    }

    pub fn hops(&self) -> usize {
        self.fees.len()
    }

    /// `(token_in, fee, token_out)` for every hop, in order.
    pub fn legs(&self) -> impl Iterator<Item = (Address, u32, Address)> + '_ {
        self.fees
            .iter()
            .enumerate()
            .map(move |(i, fee)| (self.tokens[i], *fee, self.tokens[i + 1]))
    }

    pub fn encode(&self) -> Bytes {
        let mut out = Vec::with_capacity(ADDRESS_LEN + self.hops() * HOP_LEN);
        out.extend_from_slice(self.tokens[0].as_bytes());
        for (_, fee, token_out) in self.legs() {
            out.extend_from_slice(&fee.to_be_bytes()[1..]);
            out.extend_from_slice(token_out.as_bytes());
        }
        Bytes::from(out)
    }

    pub fn decode(raw: &[u8]) -> Result<Self, PoolError> {
        if raw.len() < ADDRESS_LEN + HOP_LEN || (raw.len() - ADDRESS_LEN) % HOP_LEN != 0 {
            return Err(PoolError::InvalidPath(format!(
                "{} bytes is not 20 + n*23 with n >= 1",
                raw.len()
            )));
        }
        let mut tokens = vec![Address::from_slice(&raw[..ADDRESS_LEN])];
        let mut fees = Vec::new();
        for hop in raw[ADDRESS_LEN..].chunks_exact(HOP_LEN) {
            let fee = u32::from_be_bytes([0, hop[0], hop[1], hop[2]]);
            fees.push(fee);
            tokens.push(Address::from_slice(&hop[FEE_LEN..]));
        }
        Ok(Self { tokens, fees })
    }
}

fn check_fee(fee: u32) -> Result<(), PoolError> {
    if fee > MAX_FEE {
        return Err(PoolError::InvalidPath(format!("fee {fee} does not fit in uint24")));
    }
    Ok(())
}
