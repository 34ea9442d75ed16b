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

use crate::key_val_store::KeyValStoreError;

/// Returned from the `for_each_with_prefix` callback to continue or stop the iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationResult {
    Continue,
    Break,
}

/// General CRUD behaviour of key-value store implementations. Keys and values are raw bytes; callers that need
/// structure encode it themselves. Keys are ordered lexicographically, which callers may rely on to lay out
/// namespaces (a common key prefix) and sequences (fixed-width keys) within a single store.
///
/// Implementations must be safe to share between threads. Cloning a store is expected to be cheap and to yield a
/// handle to the same underlying data.
pub trait KeyValueStore: Send + Sync {
    /// Inserts a key-value pair, overwriting any existing value for the key.
    fn insert(&self, key: &[u8], value: &[u8]) -> Result<(), KeyValStoreError>;

    /// Get the value corresponding to the provided key, or None if the key does not exist.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KeyValStoreError>;

    /// Checks whether a record exists for the provided `key`.
    fn exists(&self, key: &[u8]) -> Result<bool, KeyValStoreError> {
        Ok(self.get(key)?.is_some())
    }

    /// Remove the record for the provided `key`. Removing a key that does not exist is not an error.
    fn delete(&self, key: &[u8]) -> Result<(), KeyValStoreError>;

    /// Iterate, in key order, over a snapshot of all records whose key starts with `prefix`. The snapshot is taken
    /// before `f` is first called, so `f` may safely write to the store.
    fn for_each_with_prefix<F>(&self, prefix: &[u8], f: F) -> Result<(), KeyValStoreError>
    where
        Self: Sized,
        F: FnMut((Vec<u8>, Vec<u8>)) -> IterationResult;

    /// Returns all keys that start with `prefix`, in key order.
    fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, KeyValStoreError>
    where Self: Sized {
        let mut keys = Vec::new();
        self.for_each_with_prefix(prefix, |(key, _)| {
            keys.push(key);
            IterationResult::Continue
        })?;
        Ok(keys)
    }
}
