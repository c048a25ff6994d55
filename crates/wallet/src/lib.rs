//! Hierarchical-deterministic key tree for the shroudd wallet: versioned
//! extended-key codec, derivation-path engine, and the persisted tree of
//! accounts, chains and loose keys.

pub mod account;
pub mod chain;
pub mod codec;
pub mod derive;
pub mod error;
pub mod extkey;
pub mod path;
mod records;
pub mod stealth;
pub mod tree;

pub use account::{Account, AccountId, ChainRole};
pub use chain::{ChainKind, MetaKey, StoredChain};
pub use codec::{CodecError, KeyEncoding, KeyInfo, KeyOrigin, KeyScope};
pub use derive::{Bip32Deriver, ChildDerivation, DeriveFailure, MasterKeySource};
pub use error::WalletError;
pub use extkey::{ExtKey, KeyId, KeyMaterial, HARDENED_OFFSET};
pub use path::PathError;
pub use stealth::{StealthId, StealthKey, StealthPrefix};
pub use tree::{
    KeyTree, OptionTarget, OptionValue, PathOutcome, RescanRequest, StealthImport,
};
