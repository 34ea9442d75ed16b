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

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
        Mutex,
        RwLock,
    },
};

use anyhow::anyhow;
use async_trait::async_trait;
use blake2::{Blake2b512, Digest};
use tari_content_provider::{BlockPresence, ContentId, ContentRouter};
use tari_storage::{HashmapDatabase, IterationResult, KeyValStoreError, KeyValueStore};
use tari_test_utils::random;
use tokio::{sync::mpsc, time::Instant};

/// Routing mock that forwards every successfully announced id to a channel.
pub struct MockContentRouter {
    provided_tx: mpsc::UnboundedSender<ContentId>,
    failing: Mutex<HashSet<ContentId>>,
    calls: Mutex<Vec<Instant>>,
}

impl MockContentRouter {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ContentId>) {
        let (provided_tx, provided_rx) = mpsc::unbounded_channel();
        let router = Self {
            provided_tx,
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        };
        (Arc::new(router), provided_rx)
    }

    /// Make every announce of `id` fail
    pub fn fail_for(&self, id: ContentId) {
        self.failing.lock().unwrap().insert(id);
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ContentRouter for MockContentRouter {
    async fn announce(&self, id: &ContentId) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(Instant::now());
        if self.failing.lock().unwrap().contains(id) {
            return Err(anyhow!("routing table unavailable"));
        }
        self.provided_tx
            .send(id.clone())
            .map_err(|_| anyhow!("provided channel closed"))?;
        Ok(())
    }
}

/// Map-based block store
#[derive(Default)]
pub struct MapBlockstore {
    blocks: RwLock<HashMap<ContentId, Vec<u8>>>,
    failing: AtomicBool,
}

impl MapBlockstore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put(&self, id: ContentId, data: Vec<u8>) {
        self.blocks.write().unwrap().insert(id, data);
    }

    pub fn delete_block(&self, id: &ContentId) {
        self.blocks.write().unwrap().remove(id);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlockPresence for MapBlockstore {
    async fn has_block(&self, id: &ContentId) -> anyhow::Result<bool> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("block store is offline"));
        }
        Ok(self.blocks.read().unwrap().contains_key(id))
    }
}

/// Generates random blocks, identified by the Blake2b hash of their data.
pub struct BlockGenerator;

impl BlockGenerator {
    pub fn next() -> (ContentId, Vec<u8>) {
        let data = random::bytes(64);
        let id = ContentId::from_bytes(&Blake2b512::digest(&data)).unwrap();
        (id, data)
    }
}

/// A store that can be switched to fail every operation.
#[derive(Clone, Default)]
pub struct FailingStore {
    inner: HashmapDatabase,
    failing: Arc<AtomicBool>,
}

impl FailingStore {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), KeyValStoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(KeyValStoreError::DatabaseError("disk unavailable".to_string()));
        }
        Ok(())
    }
}

impl KeyValueStore for FailingStore {
    fn insert(&self, key: &[u8], value: &[u8]) -> Result<(), KeyValStoreError> {
        self.check()?;
        self.inner.insert(key, value)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KeyValStoreError> {
        self.check()?;
        self.inner.get(key)
    }

    fn delete(&self, key: &[u8]) -> Result<(), KeyValStoreError> {
        self.check()?;
        self.inner.delete(key)
    }

    fn for_each_with_prefix<F>(&self, prefix: &[u8], f: F) -> Result<(), KeyValStoreError>
    where F: FnMut((Vec<u8>, Vec<u8>)) -> IterationResult {
        self.check()?;
        self.inner.for_each_with_prefix(prefix, f)
    }
}
