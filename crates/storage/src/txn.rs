//! Begin/commit/abort discipline over a [`KeyValueStore`].
//!
//! A transaction stages every mutation in a [`WriteBatch`] and applies it as
//! one atomic `write_batch` call on commit. Nothing reaches the backend
//! before commit, so dropping the transaction aborts it with the store
//! untouched.

use crate::{Column, KeyValueStore, StoreError, WriteBatch, WriteOp};

pub struct StoreTxn<'a> {
    store: &'a dyn KeyValueStore,
    batch: WriteBatch,
}

impl<'a> StoreTxn<'a> {
    pub fn begin(store: &'a dyn KeyValueStore) -> Self {
        Self {
            store,
            batch: WriteBatch::new(),
        }
    }

    /// Read-through get: staged writes shadow the backing store.
    pub fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        for op in self.batch.ops().iter().rev() {
            match op {
                WriteOp::Put {
                    column: op_column,
                    key: op_key,
                    value,
                } if *op_column == column && op_key.as_slice() == key => {
                    return Ok(Some(value.as_slice().to_vec()));
                }
                WriteOp::Delete {
                    column: op_column,
                    key: op_key,
                } if *op_column == column && op_key.as_slice() == key => {
                    return Ok(None);
                }
                _ => {}
            }
        }
        self.store.get(column, key)
    }

    pub fn put(
        &mut self,
        column: Column,
        key: impl Into<crate::WriteKey>,
        value: impl Into<crate::WriteValue>,
    ) {
        self.batch.put(column, key, value);
    }

    pub fn delete(&mut self, column: Column, key: impl Into<crate::WriteKey>) {
        self.batch.delete(column, key);
    }

    /// Apply all staged writes atomically. Consumes the transaction; on
    /// error the backend is assumed to have applied none of the batch.
    pub fn commit(self) -> Result<(), StoreError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        self.store.write_batch(&self.batch)
    }

    /// Discard all staged writes. Equivalent to dropping the transaction;
    /// spelled out so call sites read as Begin/…/Abort.
    pub fn abort(self) {
        if !self.batch.is_empty() {
            shroudd_log::log_debug!(
                "aborting store transaction with {} staged ops",
                self.batch.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn commit_applies_all_staged_ops() {
        let store = MemoryStore::new();
        store.put(Column::Meta, b"seed", b"old").unwrap();

        let mut txn = StoreTxn::begin(&store);
        txn.put(Column::Meta, b"seed".as_slice(), b"new".as_slice());
        txn.put(Column::LooseKey, b"k1".as_slice(), b"v1".as_slice());
        txn.delete(Column::Meta, b"absent".as_slice());
        txn.commit().unwrap();

        assert_eq!(store.get(Column::Meta, b"seed").unwrap().as_deref(), Some(b"new".as_ref()));
        assert_eq!(store.get(Column::LooseKey, b"k1").unwrap().as_deref(), Some(b"v1".as_ref()));
    }

    #[test]
    fn abort_leaves_store_untouched() {
        let store = MemoryStore::new();
        store.put(Column::Meta, b"seed", b"old").unwrap();

        let mut txn = StoreTxn::begin(&store);
        txn.put(Column::Meta, b"seed".as_slice(), b"new".as_slice());
        txn.abort();

        assert_eq!(store.get(Column::Meta, b"seed").unwrap().as_deref(), Some(b"old".as_ref()));
    }

    #[test]
    fn get_sees_staged_writes_latest_first() {
        let store = MemoryStore::new();
        store.put(Column::Meta, b"a", b"disk").unwrap();

        let mut txn = StoreTxn::begin(&store);
        assert_eq!(txn.get(Column::Meta, b"a").unwrap().as_deref(), Some(b"disk".as_ref()));
        txn.put(Column::Meta, b"a".as_slice(), b"staged".as_slice());
        assert_eq!(txn.get(Column::Meta, b"a").unwrap().as_deref(), Some(b"staged".as_ref()));
        txn.delete(Column::Meta, b"a".as_slice());
        assert_eq!(txn.get(Column::Meta, b"a").unwrap(), None);
    }
}
