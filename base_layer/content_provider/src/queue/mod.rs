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

//! A durable, deduplicating FIFO queue of content ids.
//!
//! Entries are stored under `/provider/queue/<namespace>/<sequence>` where the sequence number is zero padded to
//! 20 digits, so key order in the store is the order entries were first enqueued. The value of each entry is the
//! raw content id. An in-memory index mirrors the stored entries so that duplicates can be rejected without a
//! store scan; it is rebuilt from the store when a queue is constructed.

mod error;
pub use error::QueueError;

use std::{
    collections::{BTreeMap, HashMap},
    convert::TryFrom,
    sync::{Arc, Mutex, MutexGuard},
};

use log::*;
use tari_shutdown::ShutdownSignal;
use tari_storage::{IterationResult, KeyValueStore};
use tokio::sync::Notify;

use crate::ContentId;

const LOG_TARGET: &str = "c::provider::queue";

pub(crate) const QUEUE_PREFIX: &str = "/provider/queue/";

pub struct Queue<S> {
    inner: Arc<QueueInner<S>>,
}

struct QueueInner<S> {
    namespace: String,
    prefix: String,
    store: S,
    state: Mutex<QueueState>,
    available: Notify,
    shutdown_signal: ShutdownSignal,
}

#[derive(Default)]
struct QueueState {
    next_seq: u64,
    pending: BTreeMap<u64, ContentId>,
    index: HashMap<ContentId, u64>,
}

impl<S: KeyValueStore> Queue<S> {
    /// Open the queue for `namespace`, loading any entries left in the store by a previous process. Dequeue calls
    /// are cancelled once `shutdown_signal` is triggered.
    pub fn new(shutdown_signal: ShutdownSignal, namespace: &str, store: S) -> Result<Self, QueueError> {
        validate_namespace(namespace)?;
        let prefix = format!("{}{}/", QUEUE_PREFIX, namespace);
        let state = load_state(&store, &prefix)?;
        debug!(
            target: LOG_TARGET,
            "Opened queue '{}' with {} pending entries",
            namespace,
            state.pending.len()
        );

        Ok(Self {
            inner: Arc::new(QueueInner {
                namespace: namespace.to_string(),
                prefix,
                store,
                state: Mutex::new(state),
                available: Notify::new(),
                shutdown_signal,
            }),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Append `id` to the queue. If `id` is already pending this does nothing and its position is unchanged. The
    /// entry is durable once this returns.
    pub fn enqueue(&self, id: ContentId) -> Result<(), QueueError> {
        {
            let mut state = self.lock_state()?;
            if state.index.contains_key(&id) {
                trace!(target: LOG_TARGET, "{} is already queued", id);
                return Ok(());
            }
            let seq = state.next_seq;
            self.inner.store.insert(&self.entry_key(seq), id.as_bytes())?;
            state.next_seq += 1;
            state.pending.insert(seq, id.clone());
            state.index.insert(id, seq);
        }
        self.inner.available.notify_one();
        Ok(())
    }

    /// Wait for the oldest entry, remove it from the store and return it. Each entry is returned by at most one
    /// call. Returns `QueueError::Cancelled` once `shutdown_signal` or the queue's own shutdown signal is
    /// triggered.
    pub async fn dequeue(&self, mut shutdown_signal: ShutdownSignal) -> Result<ContentId, QueueError> {
        let mut queue_shutdown = self.inner.shutdown_signal.clone();
        loop {
            if shutdown_signal.is_triggered() || queue_shutdown.is_triggered() {
                return Err(QueueError::Cancelled);
            }
            let notified = self.inner.available.notified();
            if let Some(id) = self.try_dequeue()? {
                return Ok(id);
            }
            tokio::select! {
                _ = notified => {},
                _ = shutdown_signal.wait() => return Err(QueueError::Cancelled),
                _ = queue_shutdown.wait() => return Err(QueueError::Cancelled),
            }
        }
    }

    /// Remove and return the oldest entry without waiting.
    pub fn try_dequeue(&self) -> Result<Option<ContentId>, QueueError> {
        let mut state = self.lock_state()?;
        let seq = match state.pending.keys().next() {
            Some(seq) => *seq,
            None => return Ok(None),
        };
        // The store is updated first so that a failed delete leaves the entry queued
        self.inner.store.delete(&self.entry_key(seq))?;
        let id = state.pending.remove(&seq);
        if let Some(id) = &id {
            state.index.remove(id);
            trace!(target: LOG_TARGET, "Dequeued {} (seq {})", id, seq);
        }
        Ok(id)
    }

    pub fn len(&self) -> Result<usize, QueueError> {
        Ok(self.lock_state()?.pending.len())
    }

    pub fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len()? == 0)
    }

    fn entry_key(&self, seq: u64) -> Vec<u8> {
        format!("{}{:020}", self.inner.prefix, seq).into_bytes()
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, QueueState>, QueueError> {
        self.inner.state.lock().map_err(|_| QueueError::PoisonedAccess)
    }
}

impl<S> Clone for Queue<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

fn validate_namespace(namespace: &str) -> Result<(), QueueError> {
    let is_valid = !namespace.is_empty() &&
        namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if is_valid {
        Ok(())
    } else {
        Err(QueueError::InvalidNamespace(namespace.to_string()))
    }
}

fn load_state<S: KeyValueStore>(store: &S, prefix: &str) -> Result<QueueState, QueueError> {
    let mut entries = Vec::new();
    store.for_each_with_prefix(prefix.as_bytes(), |entry| {
        entries.push(entry);
        IterationResult::Continue
    })?;

    let mut state = QueueState::default();
    for (key, value) in entries {
        let seq = match parse_seq(&key[prefix.len()..]) {
            Some(seq) => seq,
            None => {
                warn!(
                    target: LOG_TARGET,
                    "Ignoring malformed queue key '{}'",
                    String::from_utf8_lossy(&key)
                );
                continue;
            },
        };
        state.next_seq = state.next_seq.max(seq + 1);

        let id = match ContentId::try_from(value) {
            Ok(id) => id,
            Err(err) => {
                warn!(target: LOG_TARGET, "Removing invalid queue entry {}: {}", seq, err);
                store.delete(&key)?;
                continue;
            },
        };
        // Entries are visited oldest first, so the first occurrence of an id keeps its place
        if state.index.contains_key(&id) {
            debug!(target: LOG_TARGET, "Removing duplicate queue entry {} for {}", seq, id);
            store.delete(&key)?;
            continue;
        }
        state.index.insert(id.clone(), seq);
        state.pending.insert(seq, id);
    }
    Ok(state)
}

fn parse_seq(suffix: &[u8]) -> Option<u64> {
    if suffix.len() != 20 || !suffix.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(suffix).ok()?.parse().ok()
}
