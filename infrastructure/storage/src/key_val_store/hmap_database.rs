// Copyright 2024, The Tari Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use crate::key_val_store::{IterationResult, KeyValStoreError, KeyValueStore};

/// The HashmapDatabase mimics the behaviour of an LMDB database without keeping a persistent copy of the records.
/// Records are kept in key order so prefix iteration behaves the same as it does on disk. Clones share the same
/// records, which lets a test "restart" a component by building a new one over a clone of the old store.
#[derive(Clone, Default)]
pub struct HashmapDatabase {
    db: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl HashmapDatabase {
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the total number of records in the database.
    pub fn len(&self) -> Result<usize, KeyValStoreError> {
        Ok(self.db.read().map_err(|_| KeyValStoreError::PoisonedAccess)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, KeyValStoreError> {
        Ok(self.len()? == 0)
    }
}

impl KeyValueStore for HashmapDatabase {
    fn insert(&self, key: &[u8], value: &[u8]) -> Result<(), KeyValStoreError> {
        self.db
            .write()
            .map_err(|_| KeyValStoreError::PoisonedAccess)?
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KeyValStoreError> {
        Ok(self
            .db
            .read()
            .map_err(|_| KeyValStoreError::PoisonedAccess)?
            .get(key)
            .cloned())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KeyValStoreError> {
        Ok(self
            .db
            .read()
            .map_err(|_| KeyValStoreError::PoisonedAccess)?
            .contains_key(key))
    }

    fn delete(&self, key: &[u8]) -> Result<(), KeyValStoreError> {
        self.db
            .write()
            .map_err(|_| KeyValStoreError::PoisonedAccess)?
            .remove(key);
        Ok(())
    }

    fn for_each_with_prefix<F>(&self, prefix: &[u8], mut f: F) -> Result<(), KeyValStoreError>
    where F: FnMut((Vec<u8>, Vec<u8>)) -> IterationResult {
        let snapshot = self
            .db
            .read()
            .map_err(|_| KeyValStoreError::PoisonedAccess)?
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect::<Vec<_>>();

        for pair in snapshot {
            if f(pair) == IterationResult::Break {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_hmap_kvstore() {
        let db = HashmapDatabase::new();
        db.insert(b"a/1", b"one").unwrap();
        db.insert(b"a/2", b"two").unwrap();
        db.insert(b"b/1", b"three").unwrap();

        assert_eq!(db.get(b"a/1").unwrap().unwrap(), b"one");
        assert_eq!(db.get(b"b/1").unwrap().unwrap(), b"three");
        assert!(db.get(b"c/1").unwrap().is_none());
        assert_eq!(db.len().unwrap(), 3);
        assert!(db.exists(b"a/2").unwrap());

        db.delete(b"a/2").unwrap();
        assert!(!db.exists(b"a/2").unwrap());
        assert_eq!(db.len().unwrap(), 2);
        // Deleting a missing key is fine
        db.delete(b"a/2").unwrap();
    }

    #[test]
    fn it_iterates_a_prefix_in_key_order() {
        let db = HashmapDatabase::new();
        db.insert(b"q/0003", b"c").unwrap();
        db.insert(b"q/0001", b"a").unwrap();
        db.insert(b"r/0000", b"x").unwrap();
        db.insert(b"q/0002", b"b").unwrap();
        db.insert(b"p/9999", b"y").unwrap();

        let keys = db.keys_with_prefix(b"q/").unwrap();
        assert_eq!(keys, vec![b"q/0001".to_vec(), b"q/0002".to_vec(), b"q/0003".to_vec()]);

        let mut values = Vec::new();
        db.for_each_with_prefix(b"q/", |(_, v)| {
            values.push(v);
            if values.len() == 2 {
                IterationResult::Break
            } else {
                IterationResult::Continue
            }
        })
        .unwrap();
        assert_eq!(values, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn it_allows_writes_during_iteration() {
        let db = HashmapDatabase::new();
        db.insert(b"k/1", b"").unwrap();
        db.insert(b"k/2", b"").unwrap();
        db.for_each_with_prefix(b"k/", |(key, _)| {
            db.delete(&key).unwrap();
            IterationResult::Continue
        })
        .unwrap();
        assert!(db.is_empty().unwrap());
    }

    #[test]
    fn clones_share_records() {
        let db = HashmapDatabase::new();
        let other = db.clone();
        db.insert(b"shared", b"1").unwrap();
        assert!(other.exists(b"shared").unwrap());
    }
}
