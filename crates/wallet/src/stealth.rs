//! Stealth keys: scan/spend keypairs with an optional bit-prefix filter.
//!
//! The prefix narrows which incoming stealth transactions a scanner must
//! trial-decrypt; an address with no prefix matches all traffic.

use secp256k1::{PublicKey, SecretKey};
use sha2::{Digest, Sha256};

use shroudd_chainparams::ChainParams;
use shroudd_primitives::base58::base58_decode;
use shroudd_primitives::hash::hash160;
use shroudd_primitives::hex::{hex_decode, is_hex};
use shroudd_primitives::wif::wif_to_secret_key;

use crate::account::AccountId;
use crate::error::WalletError;
use crate::extkey::{secp, KeyId};

/// hash160 of scan pubkey followed by spend pubkey.
pub type StealthId = [u8; 20];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StealthPrefix {
    /// Significant bits, 1..=32.
    pub bits: u8,
    /// Prefix value, masked to exactly `bits` low bits.
    pub bitfield: u32,
}

impl StealthPrefix {
    pub fn mask(bits: u8) -> u32 {
        match bits {
            0 => 0,
            1..=31 => (1u32 << bits) - 1,
            _ => u32::MAX,
        }
    }

    pub fn new(bits: u8, value: u32) -> Self {
        Self {
            bits,
            bitfield: value & Self::mask(bits),
        }
    }
}

#[derive(Clone)]
pub struct StealthKey {
    pub label: String,
    pub scan_secret: [u8; 32],
    pub scan_pubkey: [u8; 33],
    pub spend_pubkey: [u8; 33],
    /// May be absent for watch-only entries; the spend key id is always
    /// derivable from the public key.
    pub spend_secret: Option<[u8; 32]>,
    pub prefix: Option<StealthPrefix>,
    /// Account whose stealth chain produced this key; `None` for
    /// wallet-level loose entries.
    pub account: Option<AccountId>,
}

impl StealthKey {
    pub fn id(&self) -> StealthId {
        let mut data = [0u8; 66];
        data[..33].copy_from_slice(&self.scan_pubkey);
        data[33..].copy_from_slice(&self.spend_pubkey);
        hash160(&data)
    }

    pub fn spend_key_id(&self) -> KeyId {
        hash160(&self.spend_pubkey)
    }

    pub fn has_spend_secret(&self) -> bool {
        self.spend_secret.is_some()
    }
}

/// Prefix value derived from the spend secret, so recreating an address
/// from the same secret always yields the same filter.
pub fn deterministic_prefix(spend_secret: &[u8; 32]) -> u32 {
    let digest = Sha256::digest(spend_secret);
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Parse an explicit prefix value: decimal, `0x` hex or `0b` binary.
pub fn parse_prefix_source(text: &str) -> Result<u32, WalletError> {
    let trimmed = text.trim();
    let (digits, radix) = if let Some(rest) = trimmed
        .strip_prefix("0b")
        .or_else(|| trimmed.strip_prefix("0B"))
    {
        (rest, 2)
    } else if let Some(rest) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        (rest, 16)
    } else {
        (trimmed, 10)
    };
    u32::from_str_radix(digits, radix)
        .map_err(|_| WalletError::InvalidData("could not parse stealth prefix value"))
}

/// Decode 32 bytes of secret material given as raw hex, WIF, or Base58.
pub fn decode_secret(text: &str, params: &ChainParams) -> Result<[u8; 32], WalletError> {
    if is_hex(text) {
        let bytes = hex_decode(text)
            .map_err(|_| WalletError::InvalidSecret("invalid hex secret"))?;
        return secret_from_bytes(&bytes);
    }
    if let Ok((secret, _compressed)) = wif_to_secret_key(text, params) {
        return Ok(secret);
    }
    let bytes = base58_decode(text)
        .map_err(|_| WalletError::InvalidSecret("could not decode secret as hex, wif or base58"))?;
    secret_from_bytes(&bytes)
}

fn secret_from_bytes(bytes: &[u8]) -> Result<[u8; 32], WalletError> {
    let secret: [u8; 32] = bytes
        .try_into()
        .map_err(|_| WalletError::InvalidSecret("secret is not 32 bytes"))?;
    Ok(secret)
}

/// Spend-side import material: the secret itself, or just the public key
/// for watch-only entries.
pub enum SpendMaterial {
    Secret([u8; 32]),
    Public([u8; 33]),
}

pub fn decode_spend_material(
    text: &str,
    params: &ChainParams,
) -> Result<SpendMaterial, WalletError> {
    if is_hex(text) {
        let bytes = hex_decode(text)
            .map_err(|_| WalletError::InvalidSecret("invalid hex spend key"))?;
        return spend_material_from_bytes(&bytes);
    }
    if let Ok((secret, _compressed)) = wif_to_secret_key(text, params) {
        return Ok(SpendMaterial::Secret(secret));
    }
    let bytes = base58_decode(text).map_err(|_| {
        WalletError::InvalidSecret("could not decode spend key as hex, wif or base58")
    })?;
    spend_material_from_bytes(&bytes)
}

fn spend_material_from_bytes(bytes: &[u8]) -> Result<SpendMaterial, WalletError> {
    match bytes.len() {
        32 => Ok(SpendMaterial::Secret(secret_from_bytes(bytes)?)),
        33 => {
            let point: [u8; 33] = bytes
                .try_into()
                .map_err(|_| WalletError::InvalidSecret("spend key is not 33 bytes"))?;
            PublicKey::from_slice(&point)
                .map_err(|_| WalletError::InvalidSecret("invalid spend public key"))?;
            Ok(SpendMaterial::Public(point))
        }
        _ => Err(WalletError::InvalidSecret(
            "spend key must be a 32-byte secret or 33-byte public key",
        )),
    }
}

pub fn secret_to_pubkey(secret: &[u8; 32]) -> Result<[u8; 33], WalletError> {
    let secret_key = SecretKey::from_slice(secret)
        .map_err(|_| WalletError::InvalidSecret("secret key out of curve range"))?;
    Ok(PublicKey::from_secret_key(secp(), &secret_key).serialize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shroudd_chainparams::{chain_params, Network};
    use shroudd_primitives::base58::base58_encode;
    use shroudd_primitives::hex::hex_encode;
    use shroudd_primitives::wif::secret_key_to_wif;

    #[test]
    fn mask_and_bitfield_stay_consistent() {
        for bits in 0..=32u8 {
            let mask = StealthPrefix::mask(bits);
            assert_eq!(mask.count_ones(), u32::from(bits));
            let prefix = StealthPrefix::new(bits, 0xFFFF_FFFF);
            assert_eq!(prefix.bitfield & !mask, 0);
            assert_eq!(prefix.bitfield, mask);
        }
    }

    #[test]
    fn deterministic_prefix_is_reproducible() {
        let secret = [0x31u8; 32];
        let first = deterministic_prefix(&secret);
        assert_eq!(first, deterministic_prefix(&secret));
        let digest = Sha256::digest(secret);
        assert_eq!(
            first,
            u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
        );
        assert_ne!(first, deterministic_prefix(&[0x32u8; 32]));
    }

    #[test]
    fn prefix_source_accepts_three_bases() {
        assert_eq!(parse_prefix_source("0b101").expect("binary"), 5);
        assert_eq!(parse_prefix_source("0x1f").expect("hex"), 31);
        assert_eq!(parse_prefix_source("37").expect("decimal"), 37);
        assert!(parse_prefix_source("0bxyz").is_err());
        assert!(parse_prefix_source("").is_err());
    }

    #[test]
    fn secret_decodes_identically_from_all_encodings() {
        let params = chain_params(Network::Testnet);
        let secret = [0x2bu8; 32];

        let from_hex = decode_secret(&hex_encode(&secret), &params).expect("hex");
        let wif = secret_key_to_wif(&secret, &params, true);
        let from_wif = decode_secret(&wif, &params).expect("wif");
        let from_base58 = decode_secret(&base58_encode(&secret), &params).expect("base58");

        assert_eq!(from_hex, secret);
        assert_eq!(from_wif, secret);
        assert_eq!(from_base58, secret);
    }

    #[test]
    fn wrong_length_secret_rejected() {
        let params = chain_params(Network::Testnet);
        assert!(matches!(
            decode_secret(&hex_encode(&[1u8; 31]), &params),
            Err(WalletError::InvalidSecret(_))
        ));
    }

    #[test]
    fn spend_material_accepts_public_points() {
        let params = chain_params(Network::Testnet);
        let secret = [0x2bu8; 32];
        let point = secret_to_pubkey(&secret).expect("pubkey");

        match decode_spend_material(&hex_encode(&point), &params).expect("public") {
            SpendMaterial::Public(found) => assert_eq!(found, point),
            SpendMaterial::Secret(_) => panic!("expected public material"),
        }
        match decode_spend_material(&hex_encode(&secret), &params).expect("secret") {
            SpendMaterial::Secret(found) => assert_eq!(found, secret),
            SpendMaterial::Public(_) => panic!("expected secret material"),
        }
    }

    #[test]
    fn stealth_id_covers_both_pubkeys() {
        let scan_secret = [0x11u8; 32];
        let spend_secret = [0x12u8; 32];
        let entry = StealthKey {
            label: String::new(),
            scan_secret,
            scan_pubkey: secret_to_pubkey(&scan_secret).expect("scan"),
            spend_pubkey: secret_to_pubkey(&spend_secret).expect("spend"),
            spend_secret: Some(spend_secret),
            prefix: None,
            account: None,
        };
        let mut other = entry.clone();
        other.spend_pubkey = secret_to_pubkey(&[0x13u8; 32]).expect("spend");
        assert_ne!(entry.id(), other.id());
        assert_eq!(entry.spend_key_id(), hash160(&entry.spend_pubkey));
    }
}
