//! Accounts: an ordered list of chains sharing one root key, with
//! designated role pointers.

use crate::chain::StoredChain;
use crate::extkey::KeyId;

/// hash160 of the account root public key.
pub type AccountId = [u8; 20];

/// Slot 0 of the chain list is reserved for the account root.
pub const ACCOUNT_ROOT_SLOT: usize = 0;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChainRole {
    External,
    Internal,
    Stealth,
}

impl ChainRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChainRole::External => "external",
            ChainRole::Internal => "internal",
            ChainRole::Stealth => "stealth",
        }
    }
}

#[derive(Clone)]
pub struct Account {
    pub id: AccountId,
    pub label: String,
    pub active: bool,
    /// Master key this account was derived from, if any.
    pub master_id: Option<KeyId>,
    chains: Vec<StoredChain>,
    pub active_external: Option<usize>,
    pub active_internal: Option<usize>,
    pub active_stealth: Option<usize>,
}

impl Account {
    pub fn new(root: StoredChain, label: &str, master_id: Option<KeyId>) -> Self {
        Self {
            id: root.id(),
            label: label.to_string(),
            active: true,
            master_id,
            chains: vec![root],
            active_external: None,
            active_internal: None,
            active_stealth: None,
        }
    }

    pub(crate) fn from_parts(
        label: String,
        active: bool,
        master_id: Option<KeyId>,
        chains: Vec<StoredChain>,
        active_external: Option<usize>,
        active_internal: Option<usize>,
        active_stealth: Option<usize>,
    ) -> Self {
        Self {
            id: chains[ACCOUNT_ROOT_SLOT].id(),
            label,
            active,
            master_id,
            chains,
            active_external,
            active_internal,
            active_stealth,
        }
    }

    pub fn chains(&self) -> &[StoredChain] {
        &self.chains
    }

    pub fn chain(&self, slot: usize) -> Option<&StoredChain> {
        self.chains.get(slot)
    }

    pub(crate) fn chain_mut(&mut self, slot: usize) -> Option<&mut StoredChain> {
        self.chains.get_mut(slot)
    }

    pub fn root_chain(&self) -> &StoredChain {
        &self.chains[ACCOUNT_ROOT_SLOT]
    }

    pub(crate) fn root_chain_mut(&mut self) -> &mut StoredChain {
        &mut self.chains[ACCOUNT_ROOT_SLOT]
    }

    /// Append a chain, returning its slot.
    pub(crate) fn push_chain(&mut self, chain: StoredChain) -> usize {
        self.chains.push(chain);
        self.chains.len() - 1
    }

    pub fn role_index(&self, role: ChainRole) -> Option<usize> {
        match role {
            ChainRole::External => self.active_external,
            ChainRole::Internal => self.active_internal,
            ChainRole::Stealth => self.active_stealth,
        }
    }

    pub(crate) fn set_role(&mut self, role: ChainRole, slot: usize) {
        match role {
            ChainRole::External => self.active_external = Some(slot),
            ChainRole::Internal => self.active_internal = Some(slot),
            ChainRole::Stealth => self.active_stealth = Some(slot),
        }
    }

    pub fn chain_for_role(&self, role: ChainRole) -> Option<&StoredChain> {
        self.chain(self.role_index(role)?)
    }

    pub fn has_secret(&self) -> bool {
        self.root_chain().has_secret()
    }

    /// Slot of the chain with the given key id, if present.
    pub fn find_chain(&self, id: &KeyId) -> Option<usize> {
        self.chains.iter().position(|chain| chain.id() == *id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extkey::ExtKey;

    fn chain(seed: u8) -> StoredChain {
        let key =
            ExtKey::from_secret(1, [0u8; 4], 1, [seed; 32], &[seed | 1; 32]).expect("key");
        StoredChain::new(key, "")
    }

    #[test]
    fn id_follows_root_chain() {
        let root = chain(2);
        let root_id = root.id();
        let account = Account::new(root, "savings", None);
        assert_eq!(account.id, root_id);
        assert_eq!(account.root_chain().id(), root_id);
        assert!(account.has_secret());
    }

    #[test]
    fn role_pointers_index_the_chain_list() {
        let mut account = Account::new(chain(2), "", None);
        let external = account.push_chain(chain(4));
        let internal = account.push_chain(chain(6));
        account.set_role(ChainRole::External, external);
        account.set_role(ChainRole::Internal, internal);

        assert_eq!(account.role_index(ChainRole::External), Some(1));
        assert_eq!(account.role_index(ChainRole::Stealth), None);
        let found = account.chain_for_role(ChainRole::Internal).expect("chain");
        assert_eq!(found.id(), account.chain(2).expect("slot 2").id());
        assert!(account.chain_for_role(ChainRole::Stealth).is_none());
    }

    #[test]
    fn find_chain_by_key_id() {
        let mut account = Account::new(chain(2), "", None);
        let slot = account.push_chain(chain(8));
        let id = account.chain(slot).expect("chain").id();
        assert_eq!(account.find_chain(&id), Some(slot));
        assert_eq!(account.find_chain(&[0u8; 20]), None);
    }
}
