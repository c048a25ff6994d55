//! The persisted key/account tree and its operation surface.
//!
//! Every mutating operation follows the same shape: validate, build the
//! changed objects on the side, stage the writes in a [`StoreTxn`], commit,
//! and only then swap the new objects into the in-memory maps. A failed
//! commit therefore leaves memory and store agreeing on the old state; the
//! partially built objects are dropped when the operation returns.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use shroudd_chainparams::ChainParams;
use shroudd_storage::{Column, KeyValueStore, StoreTxn};

use crate::account::{Account, AccountId, ChainRole};
use crate::chain::{ChainKind, StoredChain};
use crate::codec::{self, KeyEncoding, KeyInfo};
use crate::derive::{new_master, ChildDerivation, MasterKeySource};
use crate::error::WalletError;
use crate::extkey::{ExtKey, KeyId, HARDENED_OFFSET};
use crate::path;
use crate::records;
use crate::stealth::{self, SpendMaterial, StealthId, StealthKey, StealthPrefix};

/// Result of a path-engine request; the literal path `"info"` short-circuits
/// to field extraction instead of derivation.
pub enum PathOutcome {
    Info(KeyInfo),
    Derived { key: ExtKey, encoded: String },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OptionTarget {
    Chain(KeyId),
    Account(AccountId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptionValue {
    Text(String),
    Flag(bool),
    Number(u32),
}

/// Blockchain rescan handed back to the caller; scanning is not this
/// module's job.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RescanRequest {
    pub from_time: i64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StealthImport {
    Added(StealthId),
    /// An existing watch-only entry gained its spend secret.
    Updated(StealthId),
}

/// Where a chain lives: the loose map or a slot inside an account.
enum ChainSlot {
    Loose(KeyId),
    Account(AccountId, usize),
}

pub struct KeyTree {
    store: Arc<dyn KeyValueStore>,
    deriver: Arc<dyn ChildDerivation>,
    params: ChainParams,
    master_key_id: Option<KeyId>,
    default_account_id: Option<AccountId>,
    loose: BTreeMap<KeyId, StoredChain>,
    accounts: BTreeMap<AccountId, Account>,
    stealth: BTreeMap<StealthId, StealthKey>,
    locked: bool,
}

fn now_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn id_from_record_key(raw: &[u8]) -> Result<[u8; 20], WalletError> {
    raw.try_into()
        .map_err(|_| WalletError::InvalidData("malformed record key"))
}

fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

impl KeyTree {
    /// Rebuild the tree from the store. Restartable: re-issuing the scans
    /// yields the same records.
    pub fn load(
        store: Arc<dyn KeyValueStore>,
        deriver: Arc<dyn ChildDerivation>,
        params: ChainParams,
    ) -> Result<Self, WalletError> {
        let mut tree = Self {
            store,
            deriver,
            params,
            master_key_id: None,
            default_account_id: None,
            loose: BTreeMap::new(),
            accounts: BTreeMap::new(),
            stealth: BTreeMap::new(),
            locked: false,
        };

        for (raw_key, raw_value) in tree.store.scan_prefix(Column::LooseKey, &[])? {
            let chain = records::decode_chain(&raw_value)?;
            let id = id_from_record_key(&raw_key)?;
            if chain.id() != id {
                return Err(WalletError::InvalidData("loose key record id mismatch"));
            }
            tree.loose.insert(id, chain);
        }

        for (raw_key, raw_value) in tree.store.scan_prefix(Column::Account, &[])? {
            let account = records::decode_account(&raw_value)?;
            let id = id_from_record_key(&raw_key)?;
            if account.id != id {
                return Err(WalletError::InvalidData("account record id mismatch"));
            }
            tree.accounts.insert(id, account);
        }

        for (raw_key, raw_value) in tree.store.scan_prefix(Column::Stealth, &[])? {
            let entry = records::decode_stealth(&raw_value)?;
            let id = id_from_record_key(&raw_key)?;
            if entry.id() != id {
                return Err(WalletError::InvalidData("stealth record id mismatch"));
            }
            tree.stealth.insert(id, entry);
        }

        if let Some(raw) = tree.store.get(Column::Meta, records::META_MASTER_KEY)? {
            let id = id_from_record_key(&raw)?;
            if !tree.loose.contains_key(&id) {
                return Err(WalletError::InvalidData("master key record missing"));
            }
            tree.master_key_id = Some(id);
        }
        if let Some(raw) = tree.store.get(Column::Meta, records::META_DEFAULT_ACCOUNT)? {
            let id = id_from_record_key(&raw)?;
            if !tree.accounts.contains_key(&id) {
                return Err(WalletError::InvalidData("default account record missing"));
            }
            tree.default_account_id = Some(id);
        }

        shroudd_log::log_info!(
            "loaded key tree: {} loose keys, {} accounts, {} stealth keys",
            tree.loose.len(),
            tree.accounts.len(),
            tree.stealth.len()
        );
        Ok(tree)
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn master_key_id(&self) -> Option<KeyId> {
        self.master_key_id
    }

    pub fn default_account_id(&self) -> Option<AccountId> {
        self.default_account_id
    }

    pub fn loose_key(&self, id: &KeyId) -> Option<&StoredChain> {
        self.loose.get(id)
    }

    pub fn account(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.get(id)
    }

    pub fn stealth_key(&self, id: &StealthId) -> Option<&StealthKey> {
        self.stealth.get(id)
    }

    pub fn loose_keys(&self) -> impl Iterator<Item = (&KeyId, &StoredChain)> {
        self.loose.iter()
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, &Account)> {
        self.accounts.iter()
    }

    pub fn stealth_keys(&self) -> impl Iterator<Item = (&StealthId, &StealthKey)> {
        self.stealth.iter()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    fn ensure_unlocked(&self) -> Result<(), WalletError> {
        if self.locked {
            return Err(WalletError::LockedWallet);
        }
        Ok(())
    }

    pub fn decode_key(&self, encoded: &str) -> Result<(ExtKey, KeyEncoding), WalletError> {
        Ok(codec::decode(encoded, &self.params)?)
    }

    /// Decompose a key into its fields for display; never derives.
    pub fn describe_key(&self, encoded: &str) -> Result<KeyInfo, WalletError> {
        let (key, encoding) = codec::decode(encoded, &self.params)?;
        Ok(codec::describe(&key, encoding, &self.params))
    }

    /// Re-encode a key under the other origin's prefix table.
    pub fn alt_version(&self, encoded: &str) -> Result<String, WalletError> {
        Ok(codec::alt_version(encoded, &self.params)?)
    }

    /// Walk `path_text` from a serialized key. The derived key is returned
    /// re-encoded with the input's own scope and origin.
    pub fn derive_path(&self, encoded: &str, path_text: &str) -> Result<PathOutcome, WalletError> {
        let (key, encoding) = codec::decode(encoded, &self.params)?;
        if path_text.trim() == "info" {
            return Ok(PathOutcome::Info(codec::describe(
                &key,
                encoding,
                &self.params,
            )));
        }
        let segments = path::parse(path_text)?;
        let derived = path::derive(&key, &segments, self.deriver.as_ref())?;
        let encoded_out = codec::encode(&derived, encoding, &self.params)?;
        Ok(PathOutcome::Derived {
            key: derived,
            encoded: encoded_out,
        })
    }

    /// New master key material, not yet stored anywhere. Returned alongside
    /// its native secret encoding.
    pub fn generate_master(
        &self,
        source: MasterKeySource<'_>,
    ) -> Result<(ExtKey, String), WalletError> {
        let key = new_master(source)?;
        let encoded = codec::encode(&key, KeyEncoding::NATIVE_SECRET, &self.params)?;
        Ok((key, encoded))
    }

    /// Add a loose key. In BIP44 mode the key must carry the foreign secret
    /// prefix and the stored chain is the one derived along the BIP44
    /// account-discovery path; otherwise the key is stored as given and must
    /// carry the native secret or foreign public prefix.
    pub fn import_loose(
        &mut self,
        encoded: &str,
        label: &str,
        bip44: bool,
    ) -> Result<KeyId, WalletError> {
        self.ensure_unlocked()?;
        let (key, encoding) = codec::decode(encoded, &self.params)?;

        let mut chain = if bip44 {
            if encoding != KeyEncoding::FOREIGN_SECRET {
                return Err(WalletError::InvalidData(
                    "bip44 import requires a foreign secret key",
                ));
            }
            let discovery = [HARDENED_OFFSET | 44, self.params.bip44_coin_type];
            let root_id = key.key_id();
            let derived = path::derive(&key, &discovery, self.deriver.as_ref())?;
            let mut chain = StoredChain::new(derived, label);
            chain.set_kind(ChainKind::Bip44);
            chain.set_root_id(root_id);
            chain.set_path(&discovery);
            chain
        } else {
            if encoding != KeyEncoding::NATIVE_SECRET && encoding != KeyEncoding::FOREIGN_PUBLIC {
                return Err(WalletError::InvalidData(
                    "import requires a native secret or foreign public key",
                ));
            }
            let mut chain = StoredChain::new(key, label);
            chain.set_kind(ChainKind::Loose);
            chain
        };
        chain.set_created_at(now_seconds());

        let id = chain.id();
        if self.loose.contains_key(&id) {
            return Err(WalletError::DuplicateKey);
        }

        let mut txn = StoreTxn::begin(self.store.as_ref());
        txn.put(Column::LooseKey, id, records::encode_chain(&chain));
        txn.commit()?;
        self.loose.insert(id, chain);
        shroudd_log::log_debug!("imported loose key, bip44={bip44}");
        Ok(id)
    }

    /// Add an account from its root key. Rescanning the chain from
    /// `scan_from` is returned as a request, not performed here.
    pub fn import_account(
        &mut self,
        encoded: &str,
        scan_from: i64,
        label: &str,
    ) -> Result<(AccountId, Option<RescanRequest>), WalletError> {
        self.ensure_unlocked()?;
        let (key, _encoding) = codec::decode(encoded, &self.params)?;

        let mut root = StoredChain::new(key, label);
        root.set_kind(ChainKind::AccountRoot);
        root.set_created_at(now_seconds());
        let account = Account::new(root, label, None);
        let id = account.id;
        if self.accounts.contains_key(&id) {
            return Err(WalletError::DuplicateAccount);
        }

        let mut txn = StoreTxn::begin(self.store.as_ref());
        txn.put(Column::Account, id, records::encode_account(&account));
        txn.commit()?;
        self.accounts.insert(id, account);

        let rescan = (scan_from != 0).then_some(RescanRequest {
            from_time: scan_from,
        });
        Ok((id, rescan))
    }

    /// Derive a new account from the master key along `path_text`, or along
    /// the master chain's next hardened child when the path is empty.
    /// Creates external, internal and stealth chains and designates them as
    /// the account's role pointers.
    pub fn derive_new_account(
        &mut self,
        label: &str,
        path_text: &str,
    ) -> Result<AccountId, WalletError> {
        self.ensure_unlocked()?;
        let master_id = self.master_key_id.ok_or(WalletError::NotFound("master key"))?;
        let master = self
            .loose
            .get(&master_id)
            .ok_or(WalletError::NotFound("master key"))?;
        if !master.has_secret() {
            return Err(WalletError::HardenedFromPublicNotAllowed);
        }

        let mut master_next = master.clone();
        let default_path = path_text.trim().is_empty();
        let account_path = if default_path {
            vec![master_next.next_child_index(true)?]
        } else {
            path::parse(path_text)?
        };

        let root_key = path::derive(&master_next.key, &account_path, self.deriver.as_ref())?;
        if default_path {
            master_next.bump_counter(true);
        }

        let account_id = root_key.key_id();
        if self.accounts.contains_key(&account_id) {
            return Err(WalletError::DuplicateAccount);
        }

        let created_at = now_seconds();
        let mut root = StoredChain::new(root_key, label);
        root.set_kind(ChainKind::AccountRoot);
        root.set_created_at(created_at);
        root.set_root_id(master_id);
        root.set_path(&account_path);

        let mut account = Account::new(root, label, Some(master_id));
        for (role, kind) in [
            (ChainRole::External, ChainKind::External),
            (ChainRole::Internal, ChainKind::Internal),
            (ChainRole::Stealth, ChainKind::Stealth),
        ] {
            let index = account.root_chain().next_child_index(true)?;
            let chain_key = self
                .deriver
                .derive_child(&account.root_chain().key, index)
                .map_err(|_| WalletError::DeriveFailed { index })?;
            account.root_chain_mut().bump_counter(true);

            let mut chain = StoredChain::new(chain_key, "");
            chain.set_kind(kind);
            chain.set_created_at(created_at);
            chain.set_root_id(account_id);
            chain.set_path(&[index]);
            if role == ChainRole::External {
                chain.receive_on = true;
            }
            let slot = account.push_chain(chain);
            account.set_role(role, slot);
        }

        let mut txn = StoreTxn::begin(self.store.as_ref());
        txn.put(
            Column::Account,
            account_id,
            records::encode_account(&account),
        );
        if default_path {
            txn.put(
                Column::LooseKey,
                master_id,
                records::encode_chain(&master_next),
            );
        }
        txn.commit()?;

        shroudd_log::log_info!(
            "derived new account with {} chains",
            account.chains().len()
        );
        if default_path {
            self.loose.insert(master_id, master_next);
        }
        self.accounts.insert(account_id, account);
        Ok(account_id)
    }

    /// Issue the next child key from an account's role chain. The chain's
    /// generation counter advances only when derivation and persistence both
    /// succeed, so issued indices never skip or repeat.
    pub fn derive_next_key(
        &mut self,
        account_id: &AccountId,
        role: ChainRole,
        hardened: bool,
    ) -> Result<(KeyId, ExtKey), WalletError> {
        if hardened {
            self.ensure_unlocked()?;
        }
        let account = self
            .accounts
            .get(account_id)
            .ok_or(WalletError::NotFound("account"))?;
        let slot = account
            .role_index(role)
            .ok_or(WalletError::NotFound("active chain"))?;
        let chain = account.chain(slot).ok_or(WalletError::NotFound("chain"))?;
        if hardened && !chain.has_secret() {
            return Err(WalletError::HardenedFromPublicNotAllowed);
        }

        let index = chain.next_child_index(hardened)?;
        let child = self
            .deriver
            .derive_child(&chain.key, index)
            .map_err(|_| WalletError::DeriveFailed { index })?;
        let child_id = child.key_id();
        let receive_on = chain.receive_on;

        let mut updated = account.clone();
        if let Some(chain) = updated.chain_mut(slot) {
            chain.bump_counter(hardened);
        }

        let mut txn = StoreTxn::begin(self.store.as_ref());
        txn.put(
            Column::Account,
            *account_id,
            records::encode_account(&updated),
        );
        if receive_on {
            txn.put(
                Column::KeyLink,
                child_id,
                records::encode_key_link(account_id, slot as u32),
            );
        }
        txn.commit()?;
        self.accounts.insert(*account_id, updated);
        Ok((child_id, child))
    }

    /// Which account chain issued a child key, if it was recorded for
    /// receive bookkeeping.
    pub fn key_link(&self, child_id: &KeyId) -> Result<Option<(AccountId, u32)>, WalletError> {
        match self.store.get(Column::KeyLink, child_id)? {
            Some(raw) => Ok(Some(records::decode_key_link(&raw)?)),
            None => Ok(None),
        }
    }

    /// Point the tree at a new master key. A pointer swap only; existing
    /// accounts keep their back-references.
    pub fn set_master(&mut self, key_id: &KeyId) -> Result<(), WalletError> {
        self.ensure_unlocked()?;
        let chain = self.loose.get(key_id).ok_or(WalletError::NotFound("key"))?;
        if !chain.has_secret() {
            return Err(WalletError::InvalidData(
                "master key requires secret material",
            ));
        }
        if self.master_key_id.as_ref() == Some(key_id) {
            return Ok(());
        }

        let mut txn = StoreTxn::begin(self.store.as_ref());
        txn.put(Column::Meta, records::META_MASTER_KEY, key_id);
        txn.commit()?;
        self.master_key_id = Some(*key_id);
        Ok(())
    }

    /// Pointer swap for the default account. The pointer is moved before
    /// persistence is attempted, so a failed commit restores the previous
    /// id explicitly.
    pub fn set_default_account(&mut self, account_id: &AccountId) -> Result<(), WalletError> {
        self.ensure_unlocked()?;
        if !self.accounts.contains_key(account_id) {
            return Err(WalletError::NotFound("account"));
        }

        let previous = self.default_account_id;
        self.default_account_id = Some(*account_id);

        let mut txn = StoreTxn::begin(self.store.as_ref());
        txn.put(Column::Meta, records::META_DEFAULT_ACCOUNT, account_id);
        if let Err(err) = txn.commit() {
            shroudd_log::log_warn!("set_default_account commit failed, restoring previous id");
            self.default_account_id = previous;
            return Err(err.into());
        }
        Ok(())
    }

    /// Read or write one option on a chain or account. No value reads the
    /// current setting without touching storage; a value writes it, which
    /// requires the wallet unlocked and is persisted before returning.
    /// Empty-label writes are a uniform no-op.
    pub fn manage_option(
        &mut self,
        target: OptionTarget,
        name: &str,
        value: Option<&str>,
    ) -> Result<OptionValue, WalletError> {
        match target {
            OptionTarget::Chain(id) => self.manage_chain_option(&id, name, value),
            OptionTarget::Account(id) => self.manage_account_option(&id, name, value),
        }
    }

    fn chain_option_value(&self, chain: &StoredChain, name: &str) -> Result<OptionValue, WalletError> {
        match name {
            "label" => Ok(OptionValue::Text(chain.label.clone())),
            "active" => Ok(OptionValue::Flag(chain.active)),
            "receive_on" => Ok(OptionValue::Flag(chain.receive_on)),
            "look_ahead" => Ok(OptionValue::Number(
                chain.look_ahead(self.params.default_lookahead),
            )),
            _ => Err(WalletError::NotFound("option")),
        }
    }

    fn locate_chain(&self, id: &KeyId) -> Option<ChainSlot> {
        if self.loose.contains_key(id) {
            return Some(ChainSlot::Loose(*id));
        }
        for (account_id, account) in &self.accounts {
            if let Some(slot) = account.find_chain(id) {
                return Some(ChainSlot::Account(*account_id, slot));
            }
        }
        None
    }

    fn manage_chain_option(
        &mut self,
        id: &KeyId,
        name: &str,
        value: Option<&str>,
    ) -> Result<OptionValue, WalletError> {
        let slot = self.locate_chain(id).ok_or(WalletError::NotFound("key"))?;
        let chain = match &slot {
            ChainSlot::Loose(id) => &self.loose[id],
            ChainSlot::Account(account_id, index) => self.accounts[account_id]
                .chain(*index)
                .ok_or(WalletError::NotFound("chain"))?,
        };

        let new_value = match value {
            None => return self.chain_option_value(chain, name),
            // Empty-label writes are a no-op for chains and accounts alike.
            Some("") if name == "label" => return self.chain_option_value(chain, name),
            Some(new_value) => new_value,
        };
        self.ensure_unlocked()?;

        let mut updated = chain.clone();
        match name {
            "label" => updated.label = new_value.to_string(),
            "active" => updated.active = parse_bool(new_value),
            "receive_on" => updated.receive_on = parse_bool(new_value),
            "look_ahead" => {
                let window: u32 = new_value
                    .parse()
                    .map_err(|_| WalletError::InvalidData("look_ahead expects a number"))?;
                updated.set_look_ahead(window)?;
            }
            _ => return Err(WalletError::NotFound("option")),
        }
        let result = self.chain_option_value(&updated, name)?;

        let mut txn = StoreTxn::begin(self.store.as_ref());
        match slot {
            ChainSlot::Loose(id) => {
                txn.put(Column::LooseKey, id, records::encode_chain(&updated));
                txn.commit()?;
                self.loose.insert(id, updated);
            }
            ChainSlot::Account(account_id, index) => {
                let mut account = self.accounts[&account_id].clone();
                if let Some(chain) = account.chain_mut(index) {
                    *chain = updated;
                }
                txn.put(
                    Column::Account,
                    account_id,
                    records::encode_account(&account),
                );
                txn.commit()?;
                self.accounts.insert(account_id, account);
            }
        }
        Ok(result)
    }

    fn manage_account_option(
        &mut self,
        id: &AccountId,
        name: &str,
        value: Option<&str>,
    ) -> Result<OptionValue, WalletError> {
        let account = self
            .accounts
            .get(id)
            .ok_or(WalletError::NotFound("account"))?;
        let current = |account: &Account| match name {
            "label" => Ok(OptionValue::Text(account.label.clone())),
            "active" => Ok(OptionValue::Flag(account.active)),
            _ => Err(WalletError::NotFound("option")),
        };

        let new_value = match value {
            None => return current(account),
            Some("") if name == "label" => return current(account),
            Some(new_value) => new_value,
        };
        self.ensure_unlocked()?;

        let mut updated = account.clone();
        match name {
            "label" => updated.label = new_value.to_string(),
            "active" => updated.active = parse_bool(new_value),
            _ => return Err(WalletError::NotFound("option")),
        }
        let result = current(&updated)?;

        let mut txn = StoreTxn::begin(self.store.as_ref());
        txn.put(Column::Account, *id, records::encode_account(&updated));
        txn.commit()?;
        self.accounts.insert(*id, updated);
        Ok(result)
    }

    /// Derive a new stealth address from an account's stealth chain: two
    /// hardened children, scan key then spend key.
    pub fn derive_stealth(
        &mut self,
        account_id: &AccountId,
        label: &str,
        prefix_bits: u8,
        prefix_source: Option<&str>,
    ) -> Result<StealthKey, WalletError> {
        self.ensure_unlocked()?;
        if prefix_bits > 32 {
            return Err(WalletError::OutOfRange("prefix_bits"));
        }
        let account = self
            .accounts
            .get(account_id)
            .ok_or(WalletError::NotFound("account"))?;
        let slot = account
            .role_index(ChainRole::Stealth)
            .ok_or(WalletError::NotFound("active stealth chain"))?;
        let chain = account.chain(slot).ok_or(WalletError::NotFound("chain"))?;
        if !chain.has_secret() {
            return Err(WalletError::HardenedFromPublicNotAllowed);
        }

        let mut updated = account.clone();
        let (scan_key, spend_key) = {
            let chain = updated
                .chain_mut(slot)
                .ok_or(WalletError::NotFound("chain"))?;
            let scan_index = chain.next_child_index(true)?;
            let scan = self
                .deriver
                .derive_child(&chain.key, scan_index)
                .map_err(|_| WalletError::DeriveFailed { index: scan_index })?;
            chain.bump_counter(true);
            let spend_index = chain.next_child_index(true)?;
            let spend = self
                .deriver
                .derive_child(&chain.key, spend_index)
                .map_err(|_| WalletError::DeriveFailed { index: spend_index })?;
            chain.bump_counter(true);
            (scan, spend)
        };

        let scan_secret = scan_key
            .secret()
            .ok_or(WalletError::InvalidSecret("scan key missing secret"))?;
        let spend_secret = spend_key
            .secret()
            .ok_or(WalletError::InvalidSecret("spend key missing secret"))?;

        let entry = StealthKey {
            label: label.to_string(),
            scan_secret,
            scan_pubkey: scan_key.public_bytes(),
            spend_pubkey: spend_key.public_bytes(),
            spend_secret: Some(spend_secret),
            prefix: self.build_prefix(prefix_bits, prefix_source, Some(&spend_secret))?,
            account: Some(*account_id),
        };
        let id = entry.id();
        if self.stealth.contains_key(&id) {
            return Err(WalletError::AddressExists);
        }

        let mut txn = StoreTxn::begin(self.store.as_ref());
        txn.put(Column::Stealth, id, records::encode_stealth(&entry));
        txn.put(
            Column::Account,
            *account_id,
            records::encode_account(&updated),
        );
        txn.commit()?;
        self.accounts.insert(*account_id, updated);
        self.stealth.insert(id, entry.clone());
        Ok(entry)
    }

    /// Import a stealth address as a wallet-level loose entry. The spend
    /// side may be a secret or, for watch-only entries, a public key; an
    /// exact (scan, spend) match against an existing entry upgrades it when
    /// the spend secret was missing and fails otherwise.
    pub fn import_stealth(
        &mut self,
        scan_secret_text: &str,
        spend_text: &str,
        label: &str,
        prefix_bits: u8,
        prefix_source: Option<&str>,
    ) -> Result<StealthImport, WalletError> {
        self.ensure_unlocked()?;
        if prefix_bits > 32 {
            return Err(WalletError::OutOfRange("prefix_bits"));
        }

        let scan_secret = stealth::decode_secret(scan_secret_text, &self.params)?;
        let scan_pubkey = stealth::secret_to_pubkey(&scan_secret)?;
        let (spend_secret, spend_pubkey) =
            match stealth::decode_spend_material(spend_text, &self.params)? {
                SpendMaterial::Secret(secret) => {
                    (Some(secret), stealth::secret_to_pubkey(&secret)?)
                }
                SpendMaterial::Public(point) => (None, point),
            };

        let existing = self
            .stealth
            .iter()
            .find(|(_, entry)| entry.scan_pubkey == scan_pubkey && entry.spend_pubkey == spend_pubkey)
            .map(|(id, entry)| (*id, entry.clone()));
        if let Some((id, mut entry)) = existing {
            if entry.has_spend_secret() || spend_secret.is_none() {
                return Err(WalletError::AddressExists);
            }
            entry.spend_secret = spend_secret;

            let mut txn = StoreTxn::begin(self.store.as_ref());
            txn.put(Column::Stealth, id, records::encode_stealth(&entry));
            txn.commit()?;
            self.stealth.insert(id, entry);
            shroudd_log::log_debug!("attached spend secret to existing stealth address");
            return Ok(StealthImport::Updated(id));
        }

        let entry = StealthKey {
            label: label.to_string(),
            scan_secret,
            scan_pubkey,
            spend_pubkey,
            spend_secret,
            prefix: self.build_prefix(prefix_bits, prefix_source, spend_secret.as_ref())?,
            account: None,
        };
        let id = entry.id();

        let mut txn = StoreTxn::begin(self.store.as_ref());
        txn.put(Column::Stealth, id, records::encode_stealth(&entry));
        txn.commit()?;
        self.stealth.insert(id, entry);
        Ok(StealthImport::Added(id))
    }

    fn build_prefix(
        &self,
        bits: u8,
        source: Option<&str>,
        spend_secret: Option<&[u8; 32]>,
    ) -> Result<Option<StealthPrefix>, WalletError> {
        if bits == 0 {
            return Ok(None);
        }
        let raw = match source {
            Some(text) => stealth::parse_prefix_source(text)?,
            None => {
                let secret = spend_secret.ok_or(WalletError::InvalidData(
                    "deterministic stealth prefix requires the spend secret",
                ))?;
                stealth::deterministic_prefix(secret)
            }
        };
        Ok(Some(StealthPrefix::new(bits, raw)))
    }
}
