//! Wire format for persisted wallet records.

use shroudd_primitives::encoding::{DecodeError, Decoder, Encoder};

use crate::account::{Account, AccountId};
use crate::chain::{MetaKey, StoredChain};
use crate::extkey::{ExtKey, KeyMaterial};
use crate::stealth::{StealthKey, StealthPrefix};

const CHAIN_RECORD_VERSION: u8 = 1;
const ACCOUNT_RECORD_VERSION: u8 = 1;
const STEALTH_RECORD_VERSION: u8 = 1;

/// Meta-column keys for the tree root state.
pub(crate) const META_MASTER_KEY: &[u8] = b"master_key_id";
pub(crate) const META_DEFAULT_ACCOUNT: &[u8] = b"default_account_id";

const MATERIAL_SECRET: u8 = 0;
const MATERIAL_PUBLIC: u8 = 1;

fn write_ext_key(encoder: &mut Encoder, key: &ExtKey) {
    encoder.write_u8(key.depth);
    encoder.write_bytes(&key.parent_fingerprint);
    encoder.write_u32_le(key.child_index);
    encoder.write_bytes(&key.chain_code);
    match key.material() {
        KeyMaterial::Secret(secret_key) => {
            encoder.write_u8(MATERIAL_SECRET);
            encoder.write_bytes(&secret_key.secret_bytes());
        }
        KeyMaterial::Public(public_key) => {
            encoder.write_u8(MATERIAL_PUBLIC);
            encoder.write_bytes(&public_key.serialize());
        }
    }
}

fn read_ext_key(decoder: &mut Decoder<'_>) -> Result<ExtKey, DecodeError> {
    let depth = decoder.read_u8()?;
    let parent_fingerprint = decoder.read_array::<4>()?;
    let child_index = decoder.read_u32_le()?;
    let chain_code = decoder.read_array::<32>()?;
    match decoder.read_u8()? {
        MATERIAL_SECRET => {
            let secret = decoder.read_array::<32>()?;
            ExtKey::from_secret(depth, parent_fingerprint, child_index, chain_code, &secret)
                .map_err(|_| DecodeError::InvalidData("invalid stored secret key"))
        }
        MATERIAL_PUBLIC => {
            let point = decoder.read_array::<33>()?;
            ExtKey::from_public(depth, parent_fingerprint, child_index, chain_code, &point)
                .map_err(|_| DecodeError::InvalidData("invalid stored public key"))
        }
        _ => Err(DecodeError::InvalidData("unknown key material tag")),
    }
}

fn write_chain(encoder: &mut Encoder, chain: &StoredChain) {
    encoder.write_var_str(&chain.label);
    encoder.write_bool(chain.active);
    encoder.write_bool(chain.receive_on);
    encoder.write_bool(chain.encrypted);
    write_ext_key(encoder, &chain.key);
    encoder.write_u32_le(chain.generated);
    encoder.write_u32_le(chain.generated_hardened);
    encoder.write_varint(chain.meta.len() as u64);
    for (key, value) in &chain.meta {
        encoder.write_u8(key.tag());
        encoder.write_var_bytes(value);
    }
}

fn read_chain(decoder: &mut Decoder<'_>) -> Result<StoredChain, DecodeError> {
    let label = decoder.read_var_str()?;
    let active = decoder.read_bool()?;
    let receive_on = decoder.read_bool()?;
    let encrypted = decoder.read_bool()?;
    let key = read_ext_key(decoder)?;
    let generated = decoder.read_u32_le()?;
    let generated_hardened = decoder.read_u32_le()?;

    let mut chain = StoredChain::new(key, &label);
    chain.active = active;
    chain.receive_on = receive_on;
    chain.encrypted = encrypted;
    chain.generated = generated;
    chain.generated_hardened = generated_hardened;

    let entries = decoder.read_varint()?;
    for _ in 0..entries {
        let tag = decoder.read_u8()?;
        let value = decoder.read_var_bytes()?;
        let key =
            MetaKey::from_tag(tag).ok_or(DecodeError::InvalidData("unknown chain meta tag"))?;
        chain.meta.insert(key, value);
    }
    Ok(chain)
}

pub(crate) fn encode_chain(chain: &StoredChain) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder.write_u8(CHAIN_RECORD_VERSION);
    write_chain(&mut encoder, chain);
    encoder.into_inner()
}

pub(crate) fn decode_chain(bytes: &[u8]) -> Result<StoredChain, DecodeError> {
    let mut decoder = Decoder::new(bytes);
    if decoder.read_u8()? != CHAIN_RECORD_VERSION {
        return Err(DecodeError::InvalidData("unsupported chain record version"));
    }
    let chain = read_chain(&mut decoder)?;
    decoder.finish()?;
    Ok(chain)
}

fn write_option_slot(encoder: &mut Encoder, slot: Option<usize>) {
    match slot {
        Some(index) => {
            encoder.write_bool(true);
            encoder.write_u32_le(index as u32);
        }
        None => encoder.write_bool(false),
    }
}

fn read_option_slot(decoder: &mut Decoder<'_>) -> Result<Option<usize>, DecodeError> {
    if decoder.read_bool()? {
        Ok(Some(decoder.read_u32_le()? as usize))
    } else {
        Ok(None)
    }
}

pub(crate) fn encode_account(account: &Account) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder.write_u8(ACCOUNT_RECORD_VERSION);
    encoder.write_var_str(&account.label);
    encoder.write_bool(account.active);
    match account.master_id {
        Some(id) => {
            encoder.write_bool(true);
            encoder.write_bytes(&id);
        }
        None => encoder.write_bool(false),
    }
    write_option_slot(&mut encoder, account.active_external);
    write_option_slot(&mut encoder, account.active_internal);
    write_option_slot(&mut encoder, account.active_stealth);
    encoder.write_varint(account.chains().len() as u64);
    for chain in account.chains() {
        write_chain(&mut encoder, chain);
    }
    encoder.into_inner()
}

pub(crate) fn decode_account(bytes: &[u8]) -> Result<Account, DecodeError> {
    let mut decoder = Decoder::new(bytes);
    if decoder.read_u8()? != ACCOUNT_RECORD_VERSION {
        return Err(DecodeError::InvalidData(
            "unsupported account record version",
        ));
    }
    let label = decoder.read_var_str()?;
    let active = decoder.read_bool()?;
    let master_id = if decoder.read_bool()? {
        Some(decoder.read_array::<20>()?)
    } else {
        None
    };
    let active_external = read_option_slot(&mut decoder)?;
    let active_internal = read_option_slot(&mut decoder)?;
    let active_stealth = read_option_slot(&mut decoder)?;

    let count = decoder.read_varint()?;
    if count == 0 {
        return Err(DecodeError::InvalidData("account record missing root chain"));
    }
    let mut chains = Vec::with_capacity(count as usize);
    for _ in 0..count {
        chains.push(read_chain(&mut decoder)?);
    }
    decoder.finish()?;

    for slot in [active_external, active_internal, active_stealth]
        .into_iter()
        .flatten()
    {
        if slot >= chains.len() {
            return Err(DecodeError::InvalidData("account role slot out of range"));
        }
    }

    Ok(Account::from_parts(
        label,
        active,
        master_id,
        chains,
        active_external,
        active_internal,
        active_stealth,
    ))
}

pub(crate) fn encode_stealth(entry: &StealthKey) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder.write_u8(STEALTH_RECORD_VERSION);
    encoder.write_var_str(&entry.label);
    encoder.write_bytes(&entry.scan_secret);
    encoder.write_bytes(&entry.scan_pubkey);
    encoder.write_bytes(&entry.spend_pubkey);
    match entry.spend_secret {
        Some(secret) => {
            encoder.write_bool(true);
            encoder.write_bytes(&secret);
        }
        None => encoder.write_bool(false),
    }
    match entry.prefix {
        Some(prefix) => {
            encoder.write_bool(true);
            encoder.write_u8(prefix.bits);
            encoder.write_u32_le(prefix.bitfield);
        }
        None => encoder.write_bool(false),
    }
    match entry.account {
        Some(id) => {
            encoder.write_bool(true);
            encoder.write_bytes(&id);
        }
        None => encoder.write_bool(false),
    }
    encoder.into_inner()
}

pub(crate) fn decode_stealth(bytes: &[u8]) -> Result<StealthKey, DecodeError> {
    let mut decoder = Decoder::new(bytes);
    if decoder.read_u8()? != STEALTH_RECORD_VERSION {
        return Err(DecodeError::InvalidData(
            "unsupported stealth record version",
        ));
    }
    let label = decoder.read_var_str()?;
    let scan_secret = decoder.read_array::<32>()?;
    let scan_pubkey = decoder.read_array::<33>()?;
    let spend_pubkey = decoder.read_array::<33>()?;
    let spend_secret = if decoder.read_bool()? {
        Some(decoder.read_array::<32>()?)
    } else {
        None
    };
    let prefix = if decoder.read_bool()? {
        let bits = decoder.read_u8()?;
        let bitfield = decoder.read_u32_le()?;
        if bits > 32 || bitfield & !StealthPrefix::mask(bits) != 0 {
            return Err(DecodeError::InvalidData("invalid stealth prefix"));
        }
        Some(StealthPrefix { bits, bitfield })
    } else {
        None
    };
    let account = if decoder.read_bool()? {
        Some(decoder.read_array::<20>()?)
    } else {
        None
    };
    decoder.finish()?;

    Ok(StealthKey {
        label,
        scan_secret,
        scan_pubkey,
        spend_pubkey,
        spend_secret,
        prefix,
        account,
    })
}

/// Child key id to owning chain link, for receive-address bookkeeping.
pub(crate) fn encode_key_link(account: &AccountId, slot: u32) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder.write_bytes(account);
    encoder.write_u32_le(slot);
    encoder.into_inner()
}

pub(crate) fn decode_key_link(bytes: &[u8]) -> Result<(AccountId, u32), DecodeError> {
    let mut decoder = Decoder::new(bytes);
    let account = decoder.read_array::<20>()?;
    let slot = decoder.read_u32_le()?;
    decoder.finish()?;
    Ok((account, slot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::ChainRole;
    use crate::chain::ChainKind;
    use crate::extkey::HARDENED_OFFSET;
    use crate::stealth::secret_to_pubkey;

    fn sample_chain(seed: u8) -> StoredChain {
        let key = ExtKey::from_secret(
            2,
            [seed; 4],
            HARDENED_OFFSET | u32::from(seed),
            [seed; 32],
            &[seed | 1; 32],
        )
        .expect("key");
        let mut chain = StoredChain::new(key, "spending");
        chain.receive_on = true;
        chain.generated = 12;
        chain.generated_hardened = 3;
        chain.set_kind(ChainKind::External);
        chain.set_created_at(1_700_000_000);
        chain.set_root_id([seed | 2; 20]);
        chain.set_path(&[HARDENED_OFFSET | 44, 5]);
        chain.set_look_ahead(128).expect("look ahead");
        chain
    }

    #[test]
    fn chain_record_round_trips() {
        let chain = sample_chain(0x20);
        let decoded = decode_chain(&encode_chain(&chain)).expect("decode");
        assert_eq!(decoded.id(), chain.id());
        assert_eq!(decoded.label, chain.label);
        assert_eq!(decoded.active, chain.active);
        assert_eq!(decoded.receive_on, chain.receive_on);
        assert_eq!(decoded.generated, 12);
        assert_eq!(decoded.generated_hardened, 3);
        assert_eq!(decoded.meta, chain.meta);
        assert_eq!(decoded.kind(), Some(ChainKind::External));
    }

    #[test]
    fn chain_record_rejects_trailing_bytes() {
        let mut bytes = encode_chain(&sample_chain(0x20));
        bytes.push(0);
        assert!(matches!(
            decode_chain(&bytes),
            Err(DecodeError::TrailingBytes)
        ));
    }

    #[test]
    fn account_record_round_trips() {
        let mut account = Account::new(sample_chain(0x20), "savings", Some([9u8; 20]));
        let slot = account.push_chain(sample_chain(0x30));
        account.set_role(ChainRole::External, slot);
        account.active = false;

        let decoded = decode_account(&encode_account(&account)).expect("decode");
        assert_eq!(decoded.id, account.id);
        assert_eq!(decoded.label, "savings");
        assert!(!decoded.active);
        assert_eq!(decoded.master_id, Some([9u8; 20]));
        assert_eq!(decoded.active_external, Some(slot));
        assert_eq!(decoded.active_internal, None);
        assert_eq!(decoded.chains().len(), 2);
        assert_eq!(decoded.chain(1).expect("chain").id(), account.chain(1).expect("chain").id());
    }

    #[test]
    fn truncated_account_record_rejected() {
        let account = Account::new(sample_chain(0x20), "", None);
        let mut bytes = encode_account(&account);
        bytes.truncate(bytes.len() - 1);
        assert!(decode_account(&bytes).is_err());
    }

    #[test]
    fn stealth_record_round_trips() {
        let scan_secret = [0x41u8; 32];
        let spend_secret = [0x42u8; 32];
        let entry = StealthKey {
            label: "tips".to_string(),
            scan_secret,
            scan_pubkey: secret_to_pubkey(&scan_secret).expect("scan"),
            spend_pubkey: secret_to_pubkey(&spend_secret).expect("spend"),
            spend_secret: Some(spend_secret),
            prefix: Some(StealthPrefix::new(10, 0xDEAD_BEEF)),
            account: Some([5u8; 20]),
        };
        let decoded = decode_stealth(&encode_stealth(&entry)).expect("decode");
        assert_eq!(decoded.id(), entry.id());
        assert_eq!(decoded.label, "tips");
        assert_eq!(decoded.spend_secret, Some(spend_secret));
        assert_eq!(decoded.prefix, entry.prefix);
        assert_eq!(decoded.account, Some([5u8; 20]));

        let watch = StealthKey {
            spend_secret: None,
            prefix: None,
            account: None,
            ..entry
        };
        let decoded = decode_stealth(&encode_stealth(&watch)).expect("decode");
        assert!(!decoded.has_spend_secret());
        assert_eq!(decoded.prefix, None);
        assert_eq!(decoded.account, None);
    }

    #[test]
    fn key_link_round_trips() {
        let bytes = encode_key_link(&[3u8; 20], 2);
        assert_eq!(decode_key_link(&bytes).expect("decode"), ([3u8; 20], 2));
        assert!(decode_key_link(&bytes[..10]).is_err());
    }
}
