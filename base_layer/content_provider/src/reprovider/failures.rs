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

use std::{fmt::Display, sync::Arc, time::Duration};

use log::*;
use tari_shutdown::ShutdownSignal;
use tokio::time;

use crate::{
    reprovider::{Activity, ReproviderConfig, ReproviderEvent, ReproviderEventSender},
    Backoff,
    ExponentialBackoff,
};

const LOG_TARGET: &str = "c::provider::reprovider::failures";

/// Counts consecutive store failures for one reprovider task and decides how long to wait before retrying.
pub(super) struct StoreFailures {
    activity: Activity,
    backoff: ExponentialBackoff,
    max_failures: usize,
    consecutive: usize,
    event_publisher: ReproviderEventSender,
}

impl StoreFailures {
    pub fn new(activity: Activity, config: &ReproviderConfig, event_publisher: ReproviderEventSender) -> Self {
        Self {
            activity,
            backoff: ExponentialBackoff::new(config.store_failure_backoff, config.max_store_failure_backoff),
            max_failures: config.max_store_failures,
            consecutive: 0,
            event_publisher,
        }
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    /// Record a failure. Returns the delay before the next attempt, or None once the failure budget is spent, in
    /// which case `Degraded` has been published.
    pub fn record<E: Display>(&mut self, err: &E) -> Option<Duration> {
        self.consecutive += 1;
        error!(
            target: LOG_TARGET,
            "Store failure during {} ({}/{}): {}", self.activity, self.consecutive, self.max_failures, err
        );
        self.publish(ReproviderEvent::StoreFailure {
            activity: self.activity,
            reason: err.to_string(),
        });

        if self.consecutive >= self.max_failures {
            error!(
                target: LOG_TARGET,
                "Giving up on {} after {} consecutive store failures. The reprovider is degraded.",
                self.activity,
                self.consecutive
            );
            self.publish(ReproviderEvent::Degraded(self.activity));
            return None;
        }
        Some(self.backoff.calculate_backoff(self.consecutive))
    }

    /// Record a failure and wait out the backoff. Returns false if the task should stop, either because the
    /// budget is spent or because shutdown was signalled while waiting.
    pub async fn backoff_after<E: Display>(&mut self, err: &E, shutdown_signal: &mut ShutdownSignal) -> bool {
        let delay = match self.record(err) {
            Some(delay) => delay,
            None => return false,
        };
        debug!(target: LOG_TARGET, "Retrying {} in {:.2?}", self.activity, delay);
        tokio::select! {
            _ = time::sleep(delay) => true,
            _ = shutdown_signal.wait() => false,
        }
    }

    fn publish(&self, event: ReproviderEvent) {
        let _result = self.event_publisher.send(Arc::new(event));
    }
}
