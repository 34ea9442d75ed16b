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
use tokio::{
    sync::{broadcast, mpsc},
    task,
};

use super::{
    failures::StoreFailures,
    handle::ActiveTask,
    scheduler::Scheduler,
    worker::Worker,
};
use crate::{
    reprovider::{Activity, ReproviderConfig, ReproviderError, ReproviderEventReceiver, ReproviderHandle},
    BlockPresence,
    ContentRouter,
    Queue,
    Tracker,
};

const LOG_TARGET: &str = "c::provider::reprovider";

/// Keeps every tracked id announced.
///
/// [run](Reprovider::run) spawns two tasks:
/// - a scheduler, which copies the full tracked set into the queue every `sweep_interval` and whenever
///   [trigger](Reprovider::trigger) is called,
/// - a worker, which takes ids off the queue, skips those no longer held locally and announces the rest through
///   the [ContentRouter], starting announce calls no closer together than `drain_interval`.
///
/// Both tasks stop when the shutdown signal given at construction is triggered.
pub struct Reprovider<S> {
    config: ReproviderConfig,
    tracker: Tracker<S>,
    queue: Queue<S>,
    block_presence: Arc<dyn BlockPresence>,
    content_router: Arc<dyn ContentRouter>,
    trigger_rx: Option<mpsc::Receiver<()>>,
    handle: ReproviderHandle,
    shutdown_signal: ShutdownSignal,
}

impl<S> Reprovider<S>
where S: KeyValueStore + Clone + 'static
{
    pub fn new(
        shutdown_signal: ShutdownSignal,
        queue: Queue<S>,
        tracker: Tracker<S>,
        config: ReproviderConfig,
        block_presence: Arc<dyn BlockPresence>,
        content_router: Arc<dyn ContentRouter>,
    ) -> Result<Self, ReproviderError> {
        config.validate()?;
        let (trigger_tx, trigger_rx) = mpsc::channel(config.trigger_buffer_size);
        let (event_publisher, _) = broadcast::channel(config.event_buffer_size);

        Ok(Self {
            config,
            tracker,
            queue,
            block_presence,
            content_router,
            trigger_rx: Some(trigger_rx),
            handle: ReproviderHandle::new(trigger_tx, event_publisher),
            shutdown_signal,
        })
    }

    /// Create a reprovider with the default config apart from the two intervals.
    pub fn with_intervals(
        shutdown_signal: ShutdownSignal,
        queue: Queue<S>,
        tracker: Tracker<S>,
        sweep_interval: Duration,
        drain_interval: Duration,
        block_presence: Arc<dyn BlockPresence>,
        content_router: Arc<dyn ContentRouter>,
    ) -> Result<Self, ReproviderError> {
        Self::new(
            shutdown_signal,
            queue,
            tracker,
            ReproviderConfig::with_intervals(sweep_interval, drain_interval),
            block_presence,
            content_router,
        )
    }

    /// Spawn the scheduler and worker tasks and return immediately. Must be called within a tokio runtime. A
    /// reprovider can only be started once.
    pub fn run(&mut self) -> Result<(), ReproviderError> {
        let trigger_rx = self.trigger_rx.take().ok_or(ReproviderError::AlreadyRunning)?;
        let state = self.handle.run_state();
        state.set_started();
        info!(
            target: LOG_TARGET,
            "Starting reprovider for queue '{}' (sweep interval: {:.2?}, drain interval: {:.2?})",
            self.queue.namespace(),
            self.config.sweep_interval,
            self.config.drain_interval
        );

        let event_publisher = self.handle.event_publisher().clone();
        let scheduler = Scheduler {
            tracker: self.tracker.clone(),
            queue: self.queue.clone(),
            sweep_interval: self.config.sweep_interval,
            trigger_rx,
            failures: StoreFailures::new(Activity::Sweep, &self.config, event_publisher.clone()),
            event_publisher: event_publisher.clone(),
            shutdown_signal: self.shutdown_signal.clone(),
        };
        let active = ActiveTask::new(state.clone());
        task::spawn(async move {
            let _active = active;
            scheduler.run().await;
        });

        let worker = Worker {
            queue: self.queue.clone(),
            block_presence: self.block_presence.clone(),
            content_router: self.content_router.clone(),
            drain_interval: self.config.drain_interval,
            failures: StoreFailures::new(Activity::Drain, &self.config, event_publisher.clone()),
            event_publisher,
            shutdown_signal: self.shutdown_signal.clone(),
        };
        let active = ActiveTask::new(state);
        task::spawn(async move {
            let _active = active;
            worker.run().await;
        });

        Ok(())
    }

    /// Request an immediate sweep. See [ReproviderHandle::trigger].
    pub async fn trigger(&self, shutdown_signal: ShutdownSignal) -> Result<(), ReproviderError> {
        self.handle.trigger(shutdown_signal).await
    }

    pub fn subscribe_events(&self) -> ReproviderEventReceiver {
        self.handle.subscribe_events()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    pub fn get_handle(&self) -> ReproviderHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &ReproviderConfig {
        &self.config
    }
}
