//! Network parameter definitions for the wallet key tree.

use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        };
        write!(f, "{name}")
    }
}

impl Network {
    /// The network whose extended-key prefixes are checked when a key does
    /// not match the active network's tables. Regtest shares testnet
    /// prefixes, so its counterpart is mainnet.
    pub fn counterpart(self) -> Network {
        match self {
            Network::Mainnet => Network::Testnet,
            Network::Testnet | Network::Regtest => Network::Mainnet,
        }
    }
}

/// Version prefixes for one serialized extended-key family.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExtKeyPrefixes {
    pub secret: [u8; 4],
    pub public: [u8; 4],
}

#[derive(Clone, Debug)]
pub struct ChainParams {
    pub network: Network,
    /// Native extended-key version prefixes.
    pub ext_key: ExtKeyPrefixes,
    /// Foreign (Bitcoin-compatible) extended-key version prefixes, accepted
    /// for BIP44 imports and cross-wallet interchange.
    pub btc_ext_key: ExtKeyPrefixes,
    /// Leading byte of WIF-encoded secret keys.
    pub wif_prefix: u8,
    /// Coin type for the BIP44 account-discovery path (44' / coin').
    pub bip44_coin_type: u32,
    /// Default per-chain lookahead window.
    pub default_lookahead: u32,
}

pub const DEFAULT_LOOKAHEAD: u32 = 64;
pub const MIN_LOOKAHEAD: u32 = 1;
pub const MAX_LOOKAHEAD: u32 = 1000;

pub fn chain_params(network: Network) -> ChainParams {
    match network {
        Network::Mainnet => mainnet_chain_params(),
        Network::Testnet => testnet_chain_params(),
        Network::Regtest => regtest_chain_params(),
    }
}

fn mainnet_chain_params() -> ChainParams {
    ChainParams {
        network: Network::Mainnet,
        ext_key: ExtKeyPrefixes {
            secret: [0x8F, 0x1D, 0xAE, 0xB8],
            public: [0x69, 0x6E, 0x82, 0xD1],
        },
        btc_ext_key: ExtKeyPrefixes {
            secret: [0x04, 0x88, 0xAD, 0xE4],
            public: [0x04, 0x88, 0xB2, 0x1E],
        },
        wif_prefix: 0x6C,
        bip44_coin_type: 0x8000002C,
        default_lookahead: DEFAULT_LOOKAHEAD,
    }
}

fn testnet_chain_params() -> ChainParams {
    ChainParams {
        network: Network::Testnet,
        ext_key: ExtKeyPrefixes {
            secret: [0x04, 0x76, 0xC9, 0x57],
            public: [0x04, 0x76, 0xC9, 0xB7],
        },
        btc_ext_key: ExtKeyPrefixes {
            secret: [0x04, 0x35, 0x83, 0x94],
            public: [0x04, 0x35, 0x87, 0xCF],
        },
        wif_prefix: 0x2E,
        bip44_coin_type: 0x80000001,
        default_lookahead: DEFAULT_LOOKAHEAD,
    }
}

fn regtest_chain_params() -> ChainParams {
    ChainParams {
        network: Network::Regtest,
        ..testnet_chain_params()
    }
}

impl ChainParams {
    /// All four extended-key prefixes known to this network, secret first.
    pub fn ext_key_prefixes(&self) -> [[u8; 4]; 4] {
        [
            self.ext_key.secret,
            self.ext_key.public,
            self.btc_ext_key.secret,
            self.btc_ext_key.public,
        ]
    }
}
