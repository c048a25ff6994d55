//! Stored key chains: an extended key with label, flags, metadata and
//! generation counters.

use std::collections::BTreeMap;

use shroudd_chainparams::{MAX_LOOKAHEAD, MIN_LOOKAHEAD};

use crate::error::WalletError;
use crate::extkey::{ExtKey, KeyId, HARDENED_OFFSET};
use crate::path;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum MetaKey {
    CreatedAt,
    Path,
    KeyType,
    RootId,
    LookAhead,
}

impl MetaKey {
    pub(crate) fn tag(self) -> u8 {
        match self {
            MetaKey::CreatedAt => 1,
            MetaKey::Path => 2,
            MetaKey::KeyType => 3,
            MetaKey::RootId => 4,
            MetaKey::LookAhead => 5,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(MetaKey::CreatedAt),
            2 => Some(MetaKey::Path),
            3 => Some(MetaKey::KeyType),
            4 => Some(MetaKey::RootId),
            5 => Some(MetaKey::LookAhead),
            _ => None,
        }
    }
}

/// Role a stored chain plays in the tree, recorded as `MetaKey::KeyType`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChainKind {
    Loose,
    Bip44,
    AccountRoot,
    External,
    Internal,
    Stealth,
}

impl ChainKind {
    fn tag(self) -> u8 {
        match self {
            ChainKind::Loose => 0,
            ChainKind::Bip44 => 1,
            ChainKind::AccountRoot => 2,
            ChainKind::External => 3,
            ChainKind::Internal => 4,
            ChainKind::Stealth => 5,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ChainKind::Loose),
            1 => Some(ChainKind::Bip44),
            2 => Some(ChainKind::AccountRoot),
            3 => Some(ChainKind::External),
            4 => Some(ChainKind::Internal),
            5 => Some(ChainKind::Stealth),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct StoredChain {
    pub key: ExtKey,
    pub label: String,
    pub active: bool,
    pub receive_on: bool,
    pub encrypted: bool,
    pub meta: BTreeMap<MetaKey, Vec<u8>>,
    /// Non-hardened child derivations issued.
    pub generated: u32,
    /// Hardened child derivations issued.
    pub generated_hardened: u32,
}

impl StoredChain {
    pub fn new(key: ExtKey, label: &str) -> Self {
        Self {
            key,
            label: label.to_string(),
            active: true,
            receive_on: false,
            encrypted: false,
            meta: BTreeMap::new(),
            generated: 0,
            generated_hardened: 0,
        }
    }

    pub fn id(&self) -> KeyId {
        self.key.key_id()
    }

    pub fn has_secret(&self) -> bool {
        self.key.has_secret()
    }

    pub fn kind(&self) -> Option<ChainKind> {
        let raw = self.meta.get(&MetaKey::KeyType)?;
        ChainKind::from_tag(*raw.first()?)
    }

    pub fn set_kind(&mut self, kind: ChainKind) {
        self.meta.insert(MetaKey::KeyType, vec![kind.tag()]);
    }

    pub fn created_at(&self) -> Option<u64> {
        let raw = self.meta.get(&MetaKey::CreatedAt)?;
        let bytes: [u8; 8] = raw.as_slice().try_into().ok()?;
        Some(u64::from_le_bytes(bytes))
    }

    pub fn set_created_at(&mut self, seconds: u64) {
        self.meta
            .insert(MetaKey::CreatedAt, seconds.to_le_bytes().to_vec());
    }

    pub fn root_id(&self) -> Option<KeyId> {
        let raw = self.meta.get(&MetaKey::RootId)?;
        raw.as_slice().try_into().ok()
    }

    pub fn set_root_id(&mut self, id: KeyId) {
        self.meta.insert(MetaKey::RootId, id.to_vec());
    }

    pub fn path(&self) -> Option<Vec<u32>> {
        path::unpack(self.meta.get(&MetaKey::Path)?)
    }

    pub fn set_path(&mut self, segments: &[u32]) {
        self.meta.insert(MetaKey::Path, path::pack(segments));
    }

    /// Lookahead window, falling back to the network default when unset.
    pub fn look_ahead(&self, default: u32) -> u32 {
        self.meta
            .get(&MetaKey::LookAhead)
            .and_then(|raw| {
                let bytes: [u8; 4] = raw.as_slice().try_into().ok()?;
                Some(u32::from_le_bytes(bytes))
            })
            .unwrap_or(default)
    }

    pub fn set_look_ahead(&mut self, window: u32) -> Result<(), WalletError> {
        if !(MIN_LOOKAHEAD..=MAX_LOOKAHEAD).contains(&window) {
            return Err(WalletError::OutOfRange("look_ahead"));
        }
        self.meta
            .insert(MetaKey::LookAhead, window.to_le_bytes().to_vec());
        Ok(())
    }

    pub fn counter(&self, hardened: bool) -> u32 {
        if hardened {
            self.generated_hardened
        } else {
            self.generated
        }
    }

    /// The index the next derivation will use. Child 0 is never issued;
    /// index 0 stays free for the path engine's current-key sentinel.
    pub fn next_child_index(&self, hardened: bool) -> Result<u32, WalletError> {
        let next = self
            .counter(hardened)
            .checked_add(1)
            .ok_or(WalletError::OutOfRange("child index"))?;
        if next >= HARDENED_OFFSET {
            return Err(WalletError::OutOfRange("child index"));
        }
        Ok(if hardened { next | HARDENED_OFFSET } else { next })
    }

    pub(crate) fn bump_counter(&mut self, hardened: bool) {
        if hardened {
            self.generated_hardened += 1;
        } else {
            self.generated += 1;
        }
    }
}
