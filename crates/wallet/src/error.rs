use std::fmt;

use shroudd_primitives::encoding::DecodeError;
use shroudd_storage::StoreError;

use crate::codec::CodecError;
use crate::path::PathError;

#[derive(Debug)]
pub enum WalletError {
    Codec(CodecError),
    Path(PathError),
    Decode(DecodeError),
    HardenedFromPublicNotAllowed,
    DeriveFailed { index: u32 },
    DuplicateKey,
    DuplicateAccount,
    AddressExists,
    NotFound(&'static str),
    OutOfRange(&'static str),
    Persistence(StoreError),
    LockedWallet,
    InvalidSecret(&'static str),
    InvalidData(&'static str),
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletError::Codec(err) => write!(f, "{err}"),
            WalletError::Path(err) => write!(f, "{err}"),
            WalletError::Decode(err) => write!(f, "{err}"),
            WalletError::HardenedFromPublicNotAllowed => {
                write!(f, "cannot derive hardened keys from a public extended key")
            }
            WalletError::DeriveFailed { index } => {
                write!(f, "child derivation failed at index {index}")
            }
            WalletError::DuplicateKey => write!(f, "key already exists in the wallet"),
            WalletError::DuplicateAccount => write!(f, "account already exists"),
            WalletError::AddressExists => write!(f, "stealth address already exists"),
            WalletError::NotFound(what) => write!(f, "{what} not found"),
            WalletError::OutOfRange(what) => write!(f, "{what} out of range"),
            WalletError::Persistence(err) => write!(f, "{err}"),
            WalletError::LockedWallet => write!(f, "wallet is locked"),
            WalletError::InvalidSecret(message) => write!(f, "{message}"),
            WalletError::InvalidData(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for WalletError {}

impl From<CodecError> for WalletError {
    fn from(err: CodecError) -> Self {
        WalletError::Codec(err)
    }
}

impl From<PathError> for WalletError {
    fn from(err: PathError) -> Self {
        WalletError::Path(err)
    }
}

impl From<DecodeError> for WalletError {
    fn from(err: DecodeError) -> Self {
        WalletError::Decode(err)
    }
}

impl From<StoreError> for WalletError {
    fn from(err: StoreError) -> Self {
        WalletError::Persistence(err)
    }
}
