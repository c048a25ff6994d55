//! Wallet-import-format secret key encoding.

use std::fmt;

use shroudd_chainparams::ChainParams;

use crate::base58::{base58check_decode, base58check_encode, Base58Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifError {
    Base58(Base58Error),
    UnknownPrefix,
    InvalidLength,
}

impl fmt::Display for WifError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WifError::Base58(err) => write!(f, "{err}"),
            WifError::UnknownPrefix => write!(f, "unknown WIF prefix"),
            WifError::InvalidLength => write!(f, "invalid WIF payload length"),
        }
    }
}

impl std::error::Error for WifError {}

impl From<Base58Error> for WifError {
    fn from(err: Base58Error) -> Self {
        WifError::Base58(err)
    }
}

pub fn secret_key_to_wif(secret: &[u8; 32], params: &ChainParams, compressed: bool) -> String {
    let mut payload = Vec::with_capacity(1 + secret.len() + usize::from(compressed));
    payload.push(params.wif_prefix);
    payload.extend_from_slice(secret);
    if compressed {
        payload.push(0x01);
    }
    base58check_encode(&payload)
}

pub fn wif_to_secret_key(wif: &str, params: &ChainParams) -> Result<([u8; 32], bool), WifError> {
    let payload = base58check_decode(wif)?;
    if payload.is_empty() {
        return Err(WifError::InvalidLength);
    }
    if payload[0] != params.wif_prefix {
        return Err(WifError::UnknownPrefix);
    }

    if payload.len() == 33 {
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&payload[1..33]);
        return Ok((secret, false));
    }

    if payload.len() == 34 && payload[33] == 0x01 {
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&payload[1..33]);
        return Ok((secret, true));
    }

    Err(WifError::InvalidLength)
}
