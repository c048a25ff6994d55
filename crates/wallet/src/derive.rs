//! Child-key derivation: the external primitive seam and the shipped
//! secp256k1 + HMAC-SHA512 implementation, plus master-key generation.

use std::fmt;

use hmac::{Hmac, Mac};
use rand::RngCore;
use secp256k1::{PublicKey, Scalar, SecretKey};
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroize;

use crate::error::WalletError;
use crate::extkey::{secp, ExtKey, KeyMaterial, HARDENED_OFFSET};

/// Failure reported by the derivation primitive. Carries no detail; callers
/// treat derivation as success or failure only.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DeriveFailure;

impl fmt::Display for DeriveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "child key derivation failed")
    }
}

impl std::error::Error for DeriveFailure {}

pub trait ChildDerivation {
    fn derive_child(&self, parent: &ExtKey, index: u32) -> Result<ExtKey, DeriveFailure>;
}

/// Standard BIP32 derivation: CKDpriv for secret parents, CKDpub for
/// public-only parents (non-hardened indices only).
#[derive(Clone, Copy, Debug, Default)]
pub struct Bip32Deriver;

impl ChildDerivation for Bip32Deriver {
    fn derive_child(&self, parent: &ExtKey, index: u32) -> Result<ExtKey, DeriveFailure> {
        match parent.material() {
            KeyMaterial::Secret(secret_key) => ckd_priv(parent, secret_key, index),
            KeyMaterial::Public(public_key) => {
                if index & HARDENED_OFFSET != 0 {
                    return Err(DeriveFailure);
                }
                ckd_pub(parent, public_key, index)
            }
        }
    }
}

fn hmac_sha512(key: &[u8], data: &[u8]) -> Result<[u8; 64], DeriveFailure> {
    let mut mac = Hmac::<Sha512>::new_from_slice(key).map_err(|_| DeriveFailure)?;
    mac.update(data);
    let digest = mac.finalize().into_bytes();
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    Ok(out)
}

fn ckd_priv(parent: &ExtKey, secret_key: &SecretKey, index: u32) -> Result<ExtKey, DeriveFailure> {
    let parent_pub = PublicKey::from_secret_key(secp(), secret_key);

    // Hardened: 0x00 | secret | index. Non-hardened: compressed point | index.
    let mut data = Vec::with_capacity(37);
    if index & HARDENED_OFFSET != 0 {
        data.push(0);
        data.extend_from_slice(&secret_key.secret_bytes());
    } else {
        data.extend_from_slice(&parent_pub.serialize());
    }
    data.extend_from_slice(&index.to_be_bytes());

    let mut split = hmac_sha512(&parent.chain_code, &data)?;
    data.zeroize();

    let mut tweak_bytes = [0u8; 32];
    tweak_bytes.copy_from_slice(&split[..32]);
    let tweak = Scalar::from_be_bytes(tweak_bytes).map_err(|_| DeriveFailure)?;
    tweak_bytes.zeroize();
    let child_secret = (*secret_key).add_tweak(&tweak).map_err(|_| DeriveFailure)?;

    let mut chain_code = [0u8; 32];
    chain_code.copy_from_slice(&split[32..]);
    split.zeroize();

    let depth = parent.depth.checked_add(1).ok_or(DeriveFailure)?;
    Ok(ExtKey::new(
        depth,
        parent.fingerprint(),
        index,
        chain_code,
        KeyMaterial::Secret(child_secret),
    ))
}

fn ckd_pub(parent: &ExtKey, public_key: &PublicKey, index: u32) -> Result<ExtKey, DeriveFailure> {
    let mut data = Vec::with_capacity(37);
    data.extend_from_slice(&public_key.serialize());
    data.extend_from_slice(&index.to_be_bytes());

    let mut split = hmac_sha512(&parent.chain_code, &data)?;

    let tweak_secret = SecretKey::from_slice(&split[..32]).map_err(|_| DeriveFailure)?;
    let tweak_point = PublicKey::from_secret_key(secp(), &tweak_secret);
    let child_point = public_key.combine(&tweak_point).map_err(|_| DeriveFailure)?;

    let mut chain_code = [0u8; 32];
    chain_code.copy_from_slice(&split[32..]);
    split.zeroize();

    let depth = parent.depth.checked_add(1).ok_or(DeriveFailure)?;
    Ok(ExtKey::new(
        depth,
        parent.fingerprint(),
        index,
        chain_code,
        KeyMaterial::Public(child_point),
    ))
}

const BIP32_SEED_KEY: &[u8] = b"Bitcoin seed";

/// Source material for a new master key.
pub enum MasterKeySource<'a> {
    /// 32 bytes of OS randomness.
    Random,
    /// A passphrase hashed `hashes` times, keyed with `seed_phrase`. Matches
    /// external bip32 generator tools so keys made elsewhere can be
    /// reproduced here.
    Passphrase {
        passphrase: &'a str,
        hashes: u32,
        seed_phrase: &'a str,
    },
}

pub fn new_master(source: MasterKeySource<'_>) -> Result<ExtKey, WalletError> {
    match source {
        MasterKeySource::Random => {
            let mut seed = [0u8; 32];
            rand::rngs::OsRng.fill_bytes(&mut seed);
            let key = master_from_parts(BIP32_SEED_KEY, &seed);
            seed.zeroize();
            key
        }
        MasterKeySource::Passphrase {
            passphrase,
            hashes,
            seed_phrase,
        } => {
            if hashes == 0 {
                return Err(WalletError::OutOfRange("hash count"));
            }
            let mut digest: [u8; 32] = Sha256::digest(passphrase.as_bytes()).into();
            for _ in 1..hashes {
                digest = Sha256::digest(digest).into();
            }
            let key = master_from_parts(seed_phrase.as_bytes(), &digest);
            digest.zeroize();
            key
        }
    }
}

/// BIP32 master key from a seed: HMAC-SHA512("Bitcoin seed", seed), left
/// half secret, right half chain code.
pub fn master_from_seed(seed: &[u8]) -> Result<ExtKey, WalletError> {
    if seed.len() < 16 || seed.len() > 64 {
        return Err(WalletError::InvalidSecret("seed must be 16..=64 bytes"));
    }
    master_from_parts(BIP32_SEED_KEY, seed)
}

fn master_from_parts(hmac_key: &[u8], seed: &[u8]) -> Result<ExtKey, WalletError> {
    let mut split = hmac_sha512(hmac_key, seed)
        .map_err(|_| WalletError::InvalidSecret("master key derivation failed"))?;
    let secret_key = SecretKey::from_slice(&split[..32])
        .map_err(|_| WalletError::InvalidSecret("derived master key out of curve range"))?;
    let mut chain_code = [0u8; 32];
    chain_code.copy_from_slice(&split[32..]);
    split.zeroize();

    Ok(ExtKey::new(
        0,
        [0u8; 4],
        0,
        chain_code,
        KeyMaterial::Secret(secret_key),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{self, KeyEncoding};
    use shroudd_chainparams::{chain_params, Network};
    use shroudd_primitives::hex::hex_decode;

    // BIP32 test vector 1, seed 000102030405060708090a0b0c0d0e0f.
    #[test]
    fn bip32_vector_one_chain() {
        let params = chain_params(Network::Mainnet);
        let seed = hex_decode("000102030405060708090a0b0c0d0e0f").expect("seed");
        let master = master_from_seed(&seed).expect("master");

        assert_eq!(
            codec::encode(&master, KeyEncoding::FOREIGN_SECRET, &params).expect("encode"),
            "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi"
        );
        assert_eq!(
            codec::encode(&master, KeyEncoding::FOREIGN_PUBLIC, &params).expect("encode"),
            "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8"
        );

        let m0h = Bip32Deriver
            .derive_child(&master, HARDENED_OFFSET)
            .expect("m/0'");
        assert_eq!(
            codec::encode(&m0h, KeyEncoding::FOREIGN_SECRET, &params).expect("encode"),
            "xprv9uHRZZhk6KAJC1avXpDAp4MDc3sQKNxDiPvvkX8Br5ngLNv1TxvUxt4cV1rGL5hj6KCesnDYUhd7oWgT11eZG7XnxHrnYeSvkzY7d2bhkJ7"
        );

        let m0h1 = Bip32Deriver.derive_child(&m0h, 1).expect("m/0'/1");
        assert_eq!(
            codec::encode(&m0h1, KeyEncoding::FOREIGN_SECRET, &params).expect("encode"),
            "xprv9wTYmMFdV23N2TdNG573QoEsfRrWKQgWeibmLntzniatZvR9BmLnvSxqu53Kw1UmYPxLgboyZQaXwTCg8MSY3H2EU4pWcQDnRnrVA1xe8fs"
        );
        assert_eq!(m0h1.depth, 2);
        assert_eq!(m0h1.child_index, 1);
    }

    #[test]
    fn public_child_matches_secret_child() {
        let seed = [0x5a; 32];
        let master = master_from_seed(&seed).expect("master");
        let from_secret = Bip32Deriver.derive_child(&master, 9).expect("derive");
        let from_public = Bip32Deriver
            .derive_child(&master.public_only(), 9)
            .expect("derive public");
        assert_eq!(from_secret.public_bytes(), from_public.public_bytes());
        assert_eq!(from_secret.chain_code, from_public.chain_code);
        assert!(!from_public.has_secret());
    }

    #[test]
    fn primitive_refuses_hardened_from_public() {
        let master = master_from_seed(&[0x5a; 32]).expect("master");
        let err = Bip32Deriver
            .derive_child(&master.public_only(), HARDENED_OFFSET | 1)
            .unwrap_err();
        assert_eq!(err, DeriveFailure);
    }

    #[test]
    fn seed_length_bounds() {
        assert!(master_from_seed(&[0u8; 15]).is_err());
        assert!(master_from_seed(&[0u8; 65]).is_err());
        assert!(master_from_seed(&[0u8; 16]).is_ok());
        assert!(master_from_seed(&[0u8; 64]).is_ok());
    }

    #[test]
    fn passphrase_master_is_reproducible() {
        let source = || MasterKeySource::Passphrase {
            passphrase: "correct horse",
            hashes: 100,
            seed_phrase: "Bitcoin seed",
        };
        let first = new_master(source()).expect("master");
        let second = new_master(source()).expect("master");
        assert_eq!(first, second);

        let other = new_master(MasterKeySource::Passphrase {
            passphrase: "correct horse",
            hashes: 101,
            seed_phrase: "Bitcoin seed",
        })
        .expect("master");
        assert_ne!(first, other);

        assert!(matches!(
            new_master(MasterKeySource::Passphrase {
                passphrase: "x",
                hashes: 0,
                seed_phrase: "Bitcoin seed",
            }),
            Err(WalletError::OutOfRange("hash count"))
        ));
    }

    #[test]
    fn random_masters_differ() {
        let first = new_master(MasterKeySource::Random).expect("master");
        let second = new_master(MasterKeySource::Random).expect("master");
        assert_ne!(first, second);
        assert_eq!(first.depth, 0);
        assert_eq!(first.parent_fingerprint, [0u8; 4]);
    }
}
