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

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use log::*;
use tari_shutdown::ShutdownSignal;
use tokio::sync::{mpsc, mpsc::error::TrySendError};

use crate::reprovider::{ReproviderError, ReproviderEventReceiver, ReproviderEventSender};

const LOG_TARGET: &str = "c::provider::reprovider::handle";

#[derive(Debug, Default)]
pub(super) struct RunState {
    started: AtomicBool,
    active_tasks: AtomicUsize,
}

impl RunState {
    pub fn set_started(&self) {
        self.started.store(true, Ordering::SeqCst);
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.is_started() && self.active_tasks.load(Ordering::SeqCst) > 0
    }
}

/// Marks a reprovider task as active for as long as it is held.
pub(super) struct ActiveTask(Arc<RunState>);

impl ActiveTask {
    pub fn new(state: Arc<RunState>) -> Self {
        state.active_tasks.fetch_add(1, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for ActiveTask {
    fn drop(&mut self) {
        self.0.active_tasks.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Cheaply cloneable handle for triggering sweeps and observing a [Reprovider](crate::Reprovider) from other
/// tasks.
#[derive(Clone)]
pub struct ReproviderHandle {
    trigger_tx: mpsc::Sender<()>,
    event_publisher: ReproviderEventSender,
    state: Arc<RunState>,
}

impl ReproviderHandle {
    pub(super) fn new(trigger_tx: mpsc::Sender<()>, event_publisher: ReproviderEventSender) -> Self {
        Self {
            trigger_tx,
            event_publisher,
            state: Arc::new(RunState::default()),
        }
    }

    /// Request an immediate sweep of the tracked set. The request is accepted without waiting: if the trigger
    /// buffer is full, a sweep is already pending and will cover this request too.
    ///
    /// Returns `ReproviderError::NotRunning` if the reprovider was never started or its scheduler has stopped, and
    /// `ReproviderError::Cancelled` if `shutdown_signal` has already fired.
    pub async fn trigger(&self, shutdown_signal: ShutdownSignal) -> Result<(), ReproviderError> {
        if !self.state.is_started() {
            return Err(ReproviderError::NotRunning);
        }
        if shutdown_signal.is_triggered() {
            return Err(ReproviderError::Cancelled);
        }
        match self.trigger_tx.try_send(()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                trace!(target: LOG_TARGET, "A sweep is already pending. Trigger request coalesced");
                Ok(())
            },
            Err(TrySendError::Closed(_)) => Err(ReproviderError::NotRunning),
        }
    }

    pub fn subscribe_events(&self) -> ReproviderEventReceiver {
        self.event_publisher.subscribe()
    }

    /// True once the reprovider has been started and until both of its tasks have stopped.
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub(super) fn event_publisher(&self) -> &ReproviderEventSender {
        &self.event_publisher
    }

    pub(super) fn run_state(&self) -> Arc<RunState> {
        self.state.clone()
    }
}
