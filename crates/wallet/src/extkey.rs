//! Extended-key material: a key plus chain code, depth, parent fingerprint
//! and child index.

use std::sync::OnceLock;

use secp256k1::{All, PublicKey, Secp256k1, SecretKey};

use shroudd_primitives::hash::hash160;

use crate::error::WalletError;

/// Child indices at or above this value are hardened.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// hash160 of the compressed public key.
pub type KeyId = [u8; 20];

pub(crate) fn secp() -> &'static Secp256k1<All> {
    static SECP: OnceLock<Secp256k1<All>> = OnceLock::new();
    SECP.get_or_init(Secp256k1::new)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyMaterial {
    /// A 32-byte secret; the compressed public point is always derivable.
    Secret(SecretKey),
    /// A 33-byte compressed public point only.
    Public(PublicKey),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtKey {
    pub depth: u8,
    pub parent_fingerprint: [u8; 4],
    pub child_index: u32,
    pub chain_code: [u8; 32],
    material: KeyMaterial,
}

impl ExtKey {
    pub(crate) fn new(
        depth: u8,
        parent_fingerprint: [u8; 4],
        child_index: u32,
        chain_code: [u8; 32],
        material: KeyMaterial,
    ) -> Self {
        Self {
            depth,
            parent_fingerprint,
            child_index,
            chain_code,
            material,
        }
    }

    pub fn from_secret(
        depth: u8,
        parent_fingerprint: [u8; 4],
        child_index: u32,
        chain_code: [u8; 32],
        secret: &[u8; 32],
    ) -> Result<Self, WalletError> {
        let secret_key = SecretKey::from_slice(secret)
            .map_err(|_| WalletError::InvalidSecret("secret key out of curve range"))?;
        Ok(Self::new(
            depth,
            parent_fingerprint,
            child_index,
            chain_code,
            KeyMaterial::Secret(secret_key),
        ))
    }

    pub fn from_public(
        depth: u8,
        parent_fingerprint: [u8; 4],
        child_index: u32,
        chain_code: [u8; 32],
        point: &[u8; 33],
    ) -> Result<Self, WalletError> {
        let public_key = PublicKey::from_slice(point)
            .map_err(|_| WalletError::InvalidData("invalid compressed public key"))?;
        Ok(Self::new(
            depth,
            parent_fingerprint,
            child_index,
            chain_code,
            KeyMaterial::Public(public_key),
        ))
    }

    pub fn material(&self) -> &KeyMaterial {
        &self.material
    }

    pub fn has_secret(&self) -> bool {
        matches!(self.material, KeyMaterial::Secret(_))
    }

    pub fn secret(&self) -> Option<[u8; 32]> {
        match &self.material {
            KeyMaterial::Secret(secret_key) => Some(secret_key.secret_bytes()),
            KeyMaterial::Public(_) => None,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match &self.material {
            KeyMaterial::Secret(secret_key) => PublicKey::from_secret_key(secp(), secret_key),
            KeyMaterial::Public(public_key) => *public_key,
        }
    }

    pub fn public_bytes(&self) -> [u8; 33] {
        self.public_key().serialize()
    }

    pub fn key_id(&self) -> KeyId {
        hash160(&self.public_bytes())
    }

    /// First four bytes of the key id, as embedded in child keys.
    pub fn fingerprint(&self) -> [u8; 4] {
        let id = self.key_id();
        [id[0], id[1], id[2], id[3]]
    }

    pub fn hardened(&self) -> bool {
        self.child_index & HARDENED_OFFSET != 0
    }

    /// The same key with secret material stripped.
    pub fn public_only(&self) -> ExtKey {
        Self::new(
            self.depth,
            self.parent_fingerprint,
            self.child_index,
            self.chain_code,
            KeyMaterial::Public(self.public_key()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret_key() -> ExtKey {
        ExtKey::from_secret(1, [1, 2, 3, 4], 7, [9u8; 32], &[5u8; 32]).expect("valid secret")
    }

    #[test]
    fn key_id_is_hash160_of_compressed_pubkey() {
        let key = secret_key();
        assert_eq!(key.key_id(), hash160(&key.public_bytes()));
        assert_eq!(key.fingerprint(), key.key_id()[..4]);
    }

    #[test]
    fn public_only_strips_secret_and_keeps_identity() {
        let key = secret_key();
        let public = key.public_only();
        assert!(key.has_secret());
        assert!(!public.has_secret());
        assert_eq!(public.secret(), None);
        assert_eq!(public.key_id(), key.key_id());
        assert_eq!(public.depth, key.depth);
        assert_eq!(public.child_index, key.child_index);
    }

    #[test]
    fn rejects_out_of_range_secret() {
        let err = ExtKey::from_secret(0, [0u8; 4], 0, [0u8; 32], &[0u8; 32]).unwrap_err();
        assert!(matches!(err, WalletError::InvalidSecret(_)));
    }

    #[test]
    fn hardened_flag_follows_child_index() {
        let mut key = secret_key();
        assert!(!key.hardened());
        key.child_index = HARDENED_OFFSET | 7;
        assert!(key.hardened());
    }
}
