//! Versioned Base58Check codec for serialized extended keys.
//!
//! The wire form is a fixed 78-byte payload: a 4-byte network- and
//! type-specific version prefix, depth, parent fingerprint, child index
//! (big-endian, high bit hardened), chain code, and either a zero-padded
//! 32-byte secret or a 33-byte compressed public point.

use std::fmt;

use shroudd_chainparams::{chain_params, ChainParams, Network};
use shroudd_primitives::base58::{base58check_decode, base58check_encode, Base58Error};

use crate::extkey::{ExtKey, KeyId};

/// Serialized length before the 4-byte checksum.
pub const EXT_KEY_PAYLOAD_LEN: usize = 78;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyScope {
    Secret,
    Public,
}

/// Which prefix table a key was encoded under: the wallet's own network
/// prefixes or the foreign (Bitcoin-compatible) interchange prefixes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyOrigin {
    Native,
    Foreign,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KeyEncoding {
    pub scope: KeyScope,
    pub origin: KeyOrigin,
}

impl KeyEncoding {
    pub const NATIVE_SECRET: KeyEncoding = KeyEncoding {
        scope: KeyScope::Secret,
        origin: KeyOrigin::Native,
    };
    pub const NATIVE_PUBLIC: KeyEncoding = KeyEncoding {
        scope: KeyScope::Public,
        origin: KeyOrigin::Native,
    };
    pub const FOREIGN_SECRET: KeyEncoding = KeyEncoding {
        scope: KeyScope::Secret,
        origin: KeyOrigin::Foreign,
    };
    pub const FOREIGN_PUBLIC: KeyEncoding = KeyEncoding {
        scope: KeyScope::Public,
        origin: KeyOrigin::Foreign,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    InvalidBase58,
    ChecksumMismatch,
    UnknownKeyLength,
    /// The version prefix belongs to another network's tables.
    WrongNetworkPrefix(Network),
    UnknownPrefix,
    InvalidKeyData,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::InvalidBase58 => write!(f, "invalid base58 encoding"),
            CodecError::ChecksumMismatch => write!(f, "extended key checksum mismatch"),
            CodecError::UnknownKeyLength => write!(f, "unknown extended key length"),
            CodecError::WrongNetworkPrefix(network) => {
                write!(f, "extended key belongs to the {network} network")
            }
            CodecError::UnknownPrefix => write!(f, "unknown extended key version prefix"),
            CodecError::InvalidKeyData => write!(f, "invalid extended key data"),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<Base58Error> for CodecError {
    fn from(err: Base58Error) -> Self {
        match err {
            Base58Error::InvalidChecksum => CodecError::ChecksumMismatch,
            Base58Error::InvalidLength | Base58Error::InvalidCharacter => {
                CodecError::InvalidBase58
            }
        }
    }
}

fn version_for(params: &ChainParams, encoding: KeyEncoding) -> [u8; 4] {
    let table = match encoding.origin {
        KeyOrigin::Native => &params.ext_key,
        KeyOrigin::Foreign => &params.btc_ext_key,
    };
    match encoding.scope {
        KeyScope::Secret => table.secret,
        KeyScope::Public => table.public,
    }
}

fn encoding_for(params: &ChainParams, version: [u8; 4]) -> Option<KeyEncoding> {
    if version == params.ext_key.secret {
        Some(KeyEncoding::NATIVE_SECRET)
    } else if version == params.ext_key.public {
        Some(KeyEncoding::NATIVE_PUBLIC)
    } else if version == params.btc_ext_key.secret {
        Some(KeyEncoding::FOREIGN_SECRET)
    } else if version == params.btc_ext_key.public {
        Some(KeyEncoding::FOREIGN_PUBLIC)
    } else {
        None
    }
}

pub fn decode(text: &str, params: &ChainParams) -> Result<(ExtKey, KeyEncoding), CodecError> {
    let payload = base58check_decode(text)?;
    if payload.len() != EXT_KEY_PAYLOAD_LEN {
        return Err(CodecError::UnknownKeyLength);
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&payload[0..4]);
    let encoding = match encoding_for(params, version) {
        Some(encoding) => encoding,
        None => {
            let other = chain_params(params.network.counterpart());
            if encoding_for(&other, version).is_some() {
                return Err(CodecError::WrongNetworkPrefix(other.network));
            }
            return Err(CodecError::UnknownPrefix);
        }
    };

    let depth = payload[4];
    let mut parent_fingerprint = [0u8; 4];
    parent_fingerprint.copy_from_slice(&payload[5..9]);
    let child_index = u32::from_be_bytes([payload[9], payload[10], payload[11], payload[12]]);
    if depth == 0 && (parent_fingerprint != [0u8; 4] || child_index != 0) {
        return Err(CodecError::InvalidKeyData);
    }
    let mut chain_code = [0u8; 32];
    chain_code.copy_from_slice(&payload[13..45]);

    let key = match encoding.scope {
        KeyScope::Secret => {
            if payload[45] != 0 {
                return Err(CodecError::InvalidKeyData);
            }
            let mut secret = [0u8; 32];
            secret.copy_from_slice(&payload[46..78]);
            ExtKey::from_secret(depth, parent_fingerprint, child_index, chain_code, &secret)
                .map_err(|_| CodecError::InvalidKeyData)?
        }
        KeyScope::Public => {
            let mut point = [0u8; 33];
            point.copy_from_slice(&payload[45..78]);
            ExtKey::from_public(depth, parent_fingerprint, child_index, chain_code, &point)
                .map_err(|_| CodecError::InvalidKeyData)?
        }
    };

    Ok((key, encoding))
}

pub fn encode(
    key: &ExtKey,
    encoding: KeyEncoding,
    params: &ChainParams,
) -> Result<String, CodecError> {
    match encoding.scope {
        KeyScope::Secret => {
            let Some(secret) = key.secret() else {
                return Err(CodecError::InvalidKeyData);
            };
            let mut payload = header(key, version_for(params, encoding));
            payload.push(0);
            payload.extend_from_slice(&secret);
            Ok(base58check_encode(&payload))
        }
        KeyScope::Public => Ok(encode_public(key, encoding.origin, params)),
    }
}

/// Public-form encoding; always possible since every key can produce its
/// compressed public point.
fn encode_public(key: &ExtKey, origin: KeyOrigin, params: &ChainParams) -> String {
    let encoding = KeyEncoding {
        scope: KeyScope::Public,
        origin,
    };
    let mut payload = header(key, version_for(params, encoding));
    payload.extend_from_slice(&key.public_bytes());
    base58check_encode(&payload)
}

fn header(key: &ExtKey, version: [u8; 4]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(EXT_KEY_PAYLOAD_LEN);
    payload.extend_from_slice(&version);
    payload.push(key.depth);
    payload.extend_from_slice(&key.parent_fingerprint);
    payload.extend_from_slice(&key.child_index.to_be_bytes());
    payload.extend_from_slice(&key.chain_code);
    payload
}

/// Decomposed view of a decoded key, for display. Produced without any
/// child derivation.
#[derive(Clone)]
pub struct KeyInfo {
    pub encoding: KeyEncoding,
    pub version: [u8; 4],
    pub depth: u8,
    pub parent_fingerprint: [u8; 4],
    pub child_index: u32,
    pub hardened: bool,
    pub chain_code: [u8; 32],
    pub key_id: KeyId,
    pub fingerprint: [u8; 4],
    /// The key's public form under the same origin; for public keys this is
    /// the input itself.
    pub ext_public_key: String,
}

pub fn describe(key: &ExtKey, encoding: KeyEncoding, params: &ChainParams) -> KeyInfo {
    KeyInfo {
        encoding,
        version: version_for(params, encoding),
        depth: key.depth,
        parent_fingerprint: key.parent_fingerprint,
        child_index: key.child_index,
        hardened: key.hardened(),
        chain_code: key.chain_code,
        key_id: key.key_id(),
        fingerprint: key.fingerprint(),
        ext_public_key: encode_public(key, encoding.origin, params),
    }
}

/// Re-encode a key under the other origin's prefix table, preserving every
/// field.
pub fn alt_version(text: &str, params: &ChainParams) -> Result<String, CodecError> {
    let (key, encoding) = decode(text, params)?;
    let flipped = KeyEncoding {
        scope: encoding.scope,
        origin: match encoding.origin {
            KeyOrigin::Native => KeyOrigin::Foreign,
            KeyOrigin::Foreign => KeyOrigin::Native,
        },
    };
    encode(&key, flipped, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shroudd_chainparams::Network;

    const ALL_ENCODINGS: [KeyEncoding; 4] = [
        KeyEncoding::NATIVE_SECRET,
        KeyEncoding::NATIVE_PUBLIC,
        KeyEncoding::FOREIGN_SECRET,
        KeyEncoding::FOREIGN_PUBLIC,
    ];

    fn sample_key() -> ExtKey {
        ExtKey::from_secret(
            3,
            [0xde, 0xad, 0xbe, 0xef],
            crate::extkey::HARDENED_OFFSET | 5,
            [0xab; 32],
            &[0x11; 32],
        )
        .expect("valid key")
    }

    #[test]
    fn round_trip_every_prefix_family() {
        let params = chain_params(Network::Testnet);
        let key = sample_key();
        for encoding in ALL_ENCODINGS {
            let text = encode(&key, encoding, &params).expect("encode");
            let (decoded, found) = decode(&text, &params).expect("decode");
            assert_eq!(found, encoding);
            assert_eq!(decoded.depth, key.depth);
            assert_eq!(decoded.chain_code, key.chain_code);
            assert_eq!(decoded.key_id(), key.key_id());
            assert_eq!(decoded.has_secret(), encoding.scope == KeyScope::Secret);
            assert_eq!(encode(&decoded, encoding, &params).expect("re-encode"), text);
        }
    }

    #[test]
    fn wrong_length_payload_rejected() {
        let params = chain_params(Network::Testnet);
        // 77 bytes: a secret-form payload missing its last byte.
        let mut payload = vec![0u8; 77];
        payload[0..4].copy_from_slice(&params.ext_key.secret);
        let text = base58check_encode(&payload);
        assert_eq!(decode(&text, &params), Err(CodecError::UnknownKeyLength));
    }

    #[test]
    fn corrupted_checksum_reported() {
        let params = chain_params(Network::Testnet);
        let text = encode(&sample_key(), KeyEncoding::NATIVE_SECRET, &params).expect("encode");
        let mut corrupted = text.into_bytes();
        let last = corrupted.len() - 1;
        corrupted[last] = if corrupted[last] == b'2' { b'3' } else { b'2' };
        let corrupted = String::from_utf8(corrupted).expect("ascii");
        assert_eq!(
            decode(&corrupted, &params),
            Err(CodecError::ChecksumMismatch)
        );
    }

    #[test]
    fn other_network_prefix_identified() {
        let key = sample_key();
        let mainnet = chain_params(Network::Mainnet);
        let testnet = chain_params(Network::Testnet);

        let testnet_text = encode(&key, KeyEncoding::NATIVE_PUBLIC, &testnet).expect("encode");
        assert_eq!(
            decode(&testnet_text, &mainnet),
            Err(CodecError::WrongNetworkPrefix(Network::Testnet))
        );

        let mainnet_text = encode(&key, KeyEncoding::NATIVE_SECRET, &mainnet).expect("encode");
        assert_eq!(
            decode(&mainnet_text, &testnet),
            Err(CodecError::WrongNetworkPrefix(Network::Mainnet))
        );
    }

    #[test]
    fn wholly_unknown_prefix_rejected() {
        let params = chain_params(Network::Mainnet);
        let mut payload = vec![0u8; EXT_KEY_PAYLOAD_LEN];
        payload[0..4].copy_from_slice(&[0x01, 0x02, 0x03, 0x04]);
        let text = base58check_encode(&payload);
        assert_eq!(decode(&text, &params), Err(CodecError::UnknownPrefix));
    }

    #[test]
    fn bitcoin_vector_decodes_as_foreign_and_round_trips() {
        let params = chain_params(Network::Mainnet);
        let xprv = "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi";
        let xpub = "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8";

        let (key, encoding) = decode(xprv, &params).expect("decode");
        assert_eq!(encoding, KeyEncoding::FOREIGN_SECRET);
        assert_eq!(key.depth, 0);
        assert!(key.has_secret());
        assert_eq!(
            encode(&key, encoding, &params).expect("re-encode"),
            xprv
        );

        let info = describe(&key, encoding, &params);
        assert_eq!(info.ext_public_key, xpub);
        assert!(!info.hardened);
    }

    #[test]
    fn zero_depth_with_parent_metadata_rejected() {
        let params = chain_params(Network::Mainnet);
        // BIP32 test vector 5: zero depth with non-zero parent fingerprint,
        // then zero depth with non-zero child index.
        for text in [
            "xpub661no6RGEX3uJkY4bNnPcw4URcQTrSibUZ4NqJEw5eBkv7ovTwgiT91XX27VbEXGENhYRCf7hyEbWrR3FewATdCEebj6znwMfQkhRYHRLpJ",
            "xprv9s21ZrQH4r4TsiLvyLXqM9P7k1K3EYhA1kkD6xuquB5i39AU8KF42acDyL3qsDbU9NmZn6MsGSUYZEsuoePmjzsB3eFKSUEh3Gu1N3cqVUN",
        ] {
            assert_eq!(decode(text, &params), Err(CodecError::InvalidKeyData));
        }
    }

    #[test]
    fn invalid_key_material_rejected() {
        let params = chain_params(Network::Mainnet);
        // BIP32 test vector 5: private key zero, then an invalid public
        // point with prefix 0x04.
        for text in [
            "xprv9s21ZrQH143K24Mfq5zL5MhWK9hUhhGbd45hLXo2Pq2oqzMMo63oStZzF93Y5wvzdUayhgkkFoicQZcP3y52uPPxFnfoLZB21Teqt1VvEHx",
            "xpub661MyMwAqRbcEYS8w7XLSVeEsBXy79zSzH1J8vCdxAZningWLdN3zgtU6Txnt3siSujt9RCVYsx4qHZGc62TG4McvMGcAUjeuwZdduYEvFn",
        ] {
            assert_eq!(decode(text, &params), Err(CodecError::InvalidKeyData));
        }
    }

    #[test]
    fn secret_padding_byte_enforced() {
        let params = chain_params(Network::Testnet);
        let text = encode(&sample_key(), KeyEncoding::NATIVE_SECRET, &params).expect("encode");
        let mut payload = base58check_decode(&text).expect("payload");
        payload[45] = 0x01;
        let tampered = base58check_encode(&payload);
        assert_eq!(decode(&tampered, &params), Err(CodecError::InvalidKeyData));
    }

    #[test]
    fn encoding_secret_form_of_public_key_fails() {
        let params = chain_params(Network::Testnet);
        let public = sample_key().public_only();
        assert_eq!(
            encode(&public, KeyEncoding::NATIVE_SECRET, &params),
            Err(CodecError::InvalidKeyData)
        );
    }

    #[test]
    fn alt_version_flips_origin_and_preserves_key() {
        let params = chain_params(Network::Mainnet);
        let xprv = "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi";

        let native = alt_version(xprv, &params).expect("to native");
        let (native_key, native_encoding) = decode(&native, &params).expect("decode native");
        assert_eq!(native_encoding, KeyEncoding::NATIVE_SECRET);

        let (foreign_key, _) = decode(xprv, &params).expect("decode foreign");
        assert_eq!(native_key.key_id(), foreign_key.key_id());
        assert_eq!(native_key.chain_code, foreign_key.chain_code);

        assert_eq!(alt_version(&native, &params).expect("back"), xprv);
    }
}
