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

#![cfg_attr(not(debug_assertions), deny(unused_variables))]
#![cfg_attr(not(debug_assertions), deny(unused_imports))]
#![cfg_attr(not(debug_assertions), deny(dead_code))]
#![cfg_attr(not(debug_assertions), deny(unused_extern_crates))]
#![deny(unused_must_use)]
//! # Tari Content Provider
//!
//! Keeps locally held content discoverable by periodically announcing it to a content routing layer.
//!
//! The crate is made up of three parts which share a single [KeyValueStore](tari_storage::KeyValueStore):
//!
//! - [Tracker]: the durable set of content ids that should stay announced.
//! - [Queue]: a durable, deduplicating FIFO of content ids waiting to be announced.
//! - [Reprovider]: runs a _scheduler_ task which copies the tracked set into the queue on a timer or when
//!   triggered, and a _worker_ task which drains the queue, checks that the content is still held locally and
//!   announces it, never faster than the configured drain interval.
//!
//! The routing layer and the local block storage are reached through the [ContentRouter] and [BlockPresence]
//! traits. Background failures are published as [ReproviderEvent]s and logged.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use tari_content_provider::{BlockPresence, ContentRouter, Queue, Reprovider, ReproviderConfig, Tracker};
//! # use tari_shutdown::Shutdown;
//! # use tari_storage::HashmapDatabase;
//! # async fn example(presence: Arc<dyn BlockPresence>, router: Arc<dyn ContentRouter>) {
//! let shutdown = Shutdown::new();
//! let store = HashmapDatabase::new();
//! let queue = Queue::new(shutdown.to_signal(), "reprovide", store.clone()).unwrap();
//! let tracker = Tracker::new(store);
//! let mut reprovider = Reprovider::new(
//!     shutdown.to_signal(),
//!     queue,
//!     tracker.clone(),
//!     ReproviderConfig::default(),
//!     presence,
//!     router,
//! )
//! .unwrap();
//! reprovider.run().unwrap();
//! # }
//! ```

mod backoff;
pub use backoff::{Backoff, ExponentialBackoff};

mod content_id;
pub use content_id::{ContentId, ContentIdError};

pub mod queue;
pub use queue::{Queue, QueueError};

pub mod reprovider;
pub use reprovider::{
    ConfigError,
    Reprovider,
    ReproviderConfig,
    ReproviderError,
    ReproviderEvent,
    ReproviderHandle,
};

mod serializers;

mod traits;
pub use traits::{BlockPresence, ContentRouter};

pub mod tracker;
pub use tracker::{Tracker, TrackerError};
