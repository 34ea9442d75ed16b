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

//! A shutdown trigger and the signals it resolves.
//!
//! The owner of a group of tasks holds a [Shutdown]. Each task receives a [ShutdownSignal] (cheap to clone) and
//! waits on it alongside its other work, usually as one arm of a `tokio::select!`. A signal can also be passed
//! into a single call to bound how long that call may wait.

use std::sync::Arc;

use tokio::sync::watch;

/// Trigger for shutdowns.
///
/// Use `to_signal` to create a [ShutdownSignal] which resolves when the `Shutdown` is triggered.
///
/// _Note_: Signals also resolve once every clone of the `Shutdown` has been dropped, so the instance should be held
/// for as long as the tasks it governs are required to run.
#[derive(Clone, Debug)]
pub struct Shutdown {
    sender: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Resolve all signals created from this instance. Calling this more than once has no further effect.
    pub fn trigger(&mut self) {
        self.sender.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn to_signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver end of a shutdown trigger. Once resolved the holder should stop what it is doing.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Returns true if the shutdown was triggered or the trigger no longer exists.
    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow() || self.receiver.has_changed().is_err()
    }

    /// Wait for the shutdown signal to trigger. Returns immediately if it already has.
    pub async fn wait(&mut self) {
        // An error means the trigger was dropped, which counts as a shutdown
        let _result = self.receiver.wait_for(|triggered| *triggered).await;
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::{task, time};

    use super::*;

    #[tokio::test]
    async fn trigger() {
        let mut shutdown = Shutdown::new();
        let mut signal = shutdown.to_signal();
        assert!(!shutdown.is_triggered());
        assert!(!signal.is_triggered());
        let fut = task::spawn(async move {
            signal.wait().await;
        });
        shutdown.trigger();
        assert!(shutdown.is_triggered());
        // Shutdown::trigger is idempotent
        shutdown.trigger();
        assert!(shutdown.is_triggered());
        fut.await.unwrap();
    }

    #[tokio::test]
    async fn signal_clone() {
        let mut shutdown = Shutdown::new();
        let mut signal = shutdown.to_signal();
        let mut signal_clone = signal.clone();
        let fut = task::spawn(async move {
            signal_clone.wait().await;
            signal.wait().await;
        });
        shutdown.trigger();
        fut.await.unwrap();
    }

    #[tokio::test]
    async fn drop_trigger() {
        let shutdown = Shutdown::new();
        let signal = shutdown.to_signal();
        let mut signal_clone = signal.clone();
        let fut = task::spawn(async move {
            signal_clone.wait().await;
        });
        drop(shutdown);
        fut.await.unwrap();
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn signal_created_after_trigger_resolves() {
        let mut shutdown = Shutdown::new();
        shutdown.trigger();
        let mut signal = shutdown.to_signal();
        assert!(signal.is_triggered());
        time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .expect("signal did not resolve");
    }

    #[tokio::test]
    async fn untriggered_signal_stays_pending() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.to_signal();
        assert!(time::timeout(Duration::from_millis(50), signal.wait()).await.is_err());
        assert!(!signal.is_triggered());
    }
}
