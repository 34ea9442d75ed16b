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

use std::{sync::Arc, time::Duration};

use log::*;
use tari_shutdown::ShutdownSignal;
use tari_storage::KeyValueStore;
use tokio::{time, time::Instant};

use super::failures::StoreFailures;
use crate::{
    reprovider::{ReproviderEvent, ReproviderEventSender},
    BlockPresence,
    ContentRouter,
    Queue,
    QueueError,
};

const LOG_TARGET: &str = "c::provider::reprovider::worker";

/// Drains the queue, announcing each id that is still held locally. Consecutive announce calls start at least
/// `drain_interval` apart; the wait happens before dequeuing so that waiting ids stay in the durable queue.
pub(super) struct Worker<S> {
    pub queue: Queue<S>,
    pub block_presence: Arc<dyn BlockPresence>,
    pub content_router: Arc<dyn ContentRouter>,
    pub drain_interval: Duration,
    pub failures: StoreFailures,
    pub event_publisher: ReproviderEventSender,
    pub shutdown_signal: ShutdownSignal,
}

impl<S: KeyValueStore> Worker<S> {
    pub async fn run(mut self) {
        info!(
            target: LOG_TARGET,
            "Reprovider worker started on queue '{}' (drain interval: {:.2?})",
            self.queue.namespace(),
            self.drain_interval
        );
        let mut shutdown_signal = self.shutdown_signal.clone();
        let mut last_announce = None::<Instant>;

        loop {
            if let Some(last_announce) = last_announce {
                tokio::select! {
                    _ = time::sleep_until(last_announce + self.drain_interval) => {},
                    _ = shutdown_signal.wait() => break,
                }
            }

            let id = match self.queue.dequeue(shutdown_signal.clone()).await {
                Ok(id) => {
                    self.failures.reset();
                    id
                },
                Err(QueueError::Cancelled) => break,
                Err(err) => {
                    if self.failures.backoff_after(&err, &mut shutdown_signal).await {
                        continue;
                    }
                    break;
                },
            };

            let has_block = tokio::select! {
                result = self.block_presence.has_block(&id) => result,
                _ = shutdown_signal.wait() => break,
            };
            match has_block {
                Ok(true) => {},
                Ok(false) => {
                    debug!(target: LOG_TARGET, "Skipping {} because it is no longer held locally", id);
                    self.publish(ReproviderEvent::SkippedMissing(id));
                    continue;
                },
                Err(err) => {
                    warn!(target: LOG_TARGET, "Presence check for {} failed: {}. Skipping it this cycle", id, err);
                    self.publish(ReproviderEvent::PresenceCheckFailed(id, err.to_string()));
                    continue;
                },
            }

            last_announce = Some(Instant::now());
            let result = tokio::select! {
                result = self.content_router.announce(&id) => result,
                _ = shutdown_signal.wait() => break,
            };
            match result {
                Ok(()) => {
                    trace!(target: LOG_TARGET, "Announced {}", id);
                    self.publish(ReproviderEvent::Announced(id));
                },
                Err(err) => {
                    warn!(target: LOG_TARGET, "Failed to announce {}: {}", id, err);
                    self.publish(ReproviderEvent::AnnounceFailed(id, err.to_string()));
                },
            }
        }

        info!(target: LOG_TARGET, "Reprovider worker has stopped");
    }

    fn publish(&self, event: ReproviderEvent) {
        let _result = self.event_publisher.send(Arc::new(event));
    }
}
