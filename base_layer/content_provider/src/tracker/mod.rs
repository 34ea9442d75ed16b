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

//! Durable set of content ids that should be kept announced.
//!
//! Each tracked id is a key `/provider/tracked/<hex id>` with an empty value in the backing store.

mod error;
pub use error::TrackerError;

use log::*;
use tari_storage::{IterationResult, KeyValueStore};

use crate::ContentId;

const LOG_TARGET: &str = "c::provider::tracker";

pub(crate) const TRACKED_PREFIX: &str = "/provider/tracked/";

#[derive(Clone)]
pub struct Tracker<S> {
    store: S,
}

impl<S: KeyValueStore> Tracker<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Add an id to the tracked set. Tracking an id that is already tracked has no effect.
    pub fn track(&self, id: &ContentId) -> Result<(), TrackerError> {
        self.store.insert(&Self::key(id), &[])?;
        trace!(target: LOG_TARGET, "Tracking {}", id);
        Ok(())
    }

    /// Remove an id from the tracked set. Untracking an id that is not tracked has no effect.
    pub fn untrack(&self, id: &ContentId) -> Result<(), TrackerError> {
        self.store.delete(&Self::key(id))?;
        trace!(target: LOG_TARGET, "Untracked {}", id);
        Ok(())
    }

    pub fn is_tracked(&self, id: &ContentId) -> Result<bool, TrackerError> {
        Ok(self.store.exists(&Self::key(id))?)
    }

    /// Returns a snapshot of every tracked id. Ids tracked or untracked while the snapshot is being taken may or
    /// may not be included.
    pub fn tracked(&self) -> Result<Vec<ContentId>, TrackerError> {
        let mut ids = Vec::new();
        self.store
            .for_each_with_prefix(TRACKED_PREFIX.as_bytes(), |(key, _)| {
                match parse_key(&key) {
                    Some(id) => ids.push(id),
                    None => warn!(
                        target: LOG_TARGET,
                        "Ignoring malformed tracker key '{}'",
                        String::from_utf8_lossy(&key)
                    ),
                }
                IterationResult::Continue
            })?;
        Ok(ids)
    }

    pub fn count(&self) -> Result<usize, TrackerError> {
        let mut count = 0;
        self.store.for_each_with_prefix(TRACKED_PREFIX.as_bytes(), |_| {
            count += 1;
            IterationResult::Continue
        })?;
        Ok(count)
    }

    fn key(id: &ContentId) -> Vec<u8> {
        format!("{}{}", TRACKED_PREFIX, id.to_hex()).into_bytes()
    }
}

fn parse_key(key: &[u8]) -> Option<ContentId> {
    let hex_id = key.strip_prefix(TRACKED_PREFIX.as_bytes())?;
    let hex_id = std::str::from_utf8(hex_id).ok()?;
    ContentId::from_hex(hex_id).ok()
}
