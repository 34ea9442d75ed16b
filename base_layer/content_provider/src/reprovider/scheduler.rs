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

use std::{future, sync::Arc, time::Duration};

use log::*;
use tari_shutdown::ShutdownSignal;
use tari_storage::KeyValueStore;
use tokio::{
    sync::mpsc,
    task,
    time,
    time::{Instant, Interval, MissedTickBehavior},
};

use super::failures::StoreFailures;
use crate::{
    reprovider::{ReproviderError, ReproviderEvent, ReproviderEventSender, SweepReason},
    Queue,
    QueueError,
    Tracker,
};

const LOG_TARGET: &str = "c::provider::reprovider::scheduler";

/// Number of ids enqueued by a single blocking task during a sweep
const SWEEP_BATCH_SIZE: usize = 1024;

/// Copies the tracked set into the queue on a timer and whenever a trigger request is received.
pub(super) struct Scheduler<S> {
    pub tracker: Tracker<S>,
    pub queue: Queue<S>,
    pub sweep_interval: Duration,
    pub trigger_rx: mpsc::Receiver<()>,
    pub failures: StoreFailures,
    pub event_publisher: ReproviderEventSender,
    pub shutdown_signal: ShutdownSignal,
}

impl<S> Scheduler<S>
where S: KeyValueStore + Clone + 'static
{
    pub async fn run(mut self) {
        info!(
            target: LOG_TARGET,
            "Reprovider scheduler started (sweep interval: {:.2?})", self.sweep_interval
        );
        let mut timer = sweep_timer(self.sweep_interval);
        let mut shutdown_signal = self.shutdown_signal.clone();

        loop {
            let reason = tokio::select! {
                _ = next_tick(&mut timer) => SweepReason::Timer,
                Some(_) = self.trigger_rx.recv() => SweepReason::Trigger,
                _ = shutdown_signal.wait() => {
                    info!(target: LOG_TARGET, "Reprovider scheduler shutting down because the shutdown signal was received");
                    break;
                },
            };

            if !self.sweep_until_complete(reason).await {
                break;
            }
        }

        info!(target: LOG_TARGET, "Reprovider scheduler has stopped");
    }

    /// Sweep, retrying on store failures. Returns false if the scheduler should stop.
    async fn sweep_until_complete(&mut self, reason: SweepReason) -> bool {
        loop {
            match self.sweep().await {
                Ok(Some(enqueued)) => {
                    self.failures.reset();
                    debug!(
                        target: LOG_TARGET,
                        "{:?} sweep submitted {} tracked id(s) to queue '{}'",
                        reason,
                        enqueued,
                        self.queue.namespace()
                    );
                    let _result = self
                        .event_publisher
                        .send(Arc::new(ReproviderEvent::SweepCompleted { reason, enqueued }));
                    return true;
                },
                Ok(None) => return false,
                Err(err) => {
                    if !self.failures.backoff_after(&err, &mut self.shutdown_signal).await {
                        return false;
                    }
                },
            }
        }
    }

    /// Enqueue every tracked id. Returns the number of ids submitted, or None if shutdown interrupted the sweep.
    ///
    /// Store access is synchronous, so the snapshot and the enqueues run on the blocking thread pool in batches of
    /// `SWEEP_BATCH_SIZE`.
    async fn sweep(&mut self) -> Result<Option<usize>, ReproviderError> {
        let tracker = self.tracker.clone();
        let ids = task::spawn_blocking(move || tracker.tracked()).await??;
        let total = ids.len();
        for batch in ids.chunks(SWEEP_BATCH_SIZE) {
            let batch = batch.to_vec();
            let queue = self.queue.clone();
            let shutdown_signal = self.shutdown_signal.clone();
            let completed = task::spawn_blocking(move || -> Result<bool, QueueError> {
                for id in batch {
                    if shutdown_signal.is_triggered() {
                        return Ok(false);
                    }
                    queue.enqueue(id)?;
                }
                Ok(true)
            })
            .await??;
            if !completed {
                return Ok(None);
            }
        }
        Ok(Some(total))
    }
}

fn sweep_timer(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut timer = time::interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(timer)
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        },
        None => future::pending::<()>().await,
    }
}

#[cfg(test)]
mod test {
    use tari_shutdown::Shutdown;
    use tari_storage::HashmapDatabase;
    use tokio::sync::broadcast;

    use super::*;
    use crate::{
        reprovider::{Activity, ReproviderConfig},
        ContentId,
    };

    struct TestScheduler {
        scheduler: Scheduler<HashmapDatabase>,
        trigger_tx: mpsc::Sender<()>,
        events: broadcast::Receiver<Arc<ReproviderEvent>>,
        tracker: Tracker<HashmapDatabase>,
        queue: Queue<HashmapDatabase>,
        shutdown: Shutdown,
    }

    fn setup(sweep_interval: Duration) -> TestScheduler {
        let shutdown = Shutdown::new();
        let store = HashmapDatabase::new();
        let tracker = Tracker::new(store.clone());
        let queue = Queue::new(shutdown.to_signal(), "test", store).unwrap();
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (event_publisher, events) = broadcast::channel(10);
        let scheduler = Scheduler {
            tracker: tracker.clone(),
            queue: queue.clone(),
            sweep_interval,
            trigger_rx,
            failures: StoreFailures::new(Activity::Sweep, &ReproviderConfig::default(), event_publisher.clone()),
            event_publisher,
            shutdown_signal: shutdown.to_signal(),
        };
        TestScheduler {
            scheduler,
            trigger_tx,
            events,
            tracker,
            queue,
            shutdown,
        }
    }

    fn id(n: u8) -> ContentId {
        ContentId::from_bytes(&[n]).unwrap()
    }

    #[tokio::test]
    async fn it_sweeps_on_trigger() {
        let TestScheduler {
            scheduler,
            trigger_tx,
            mut events,
            tracker,
            queue,
            mut shutdown,
        } = setup(Duration::ZERO);
        for n in 1..=3 {
            tracker.track(&id(n)).unwrap();
        }
        let handle = task::spawn(scheduler.run());

        trigger_tx.send(()).await.unwrap();
        let event = time::timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap();
        assert_eq!(*event, ReproviderEvent::SweepCompleted {
            reason: SweepReason::Trigger,
            enqueued: 3
        });
        assert_eq!(queue.len().unwrap(), 3);

        // A second sweep does not duplicate entries
        trigger_tx.send(()).await.unwrap();
        let _event = time::timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap();
        assert_eq!(queue.len().unwrap(), 3);

        shutdown.trigger();
        time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        // The scheduler dropped its receiver
        assert!(trigger_tx.send(()).await.is_err());
    }

    #[tokio::test]
    async fn it_sweeps_large_sets_in_batches() {
        let TestScheduler {
            scheduler,
            trigger_tx,
            mut events,
            tracker,
            queue,
            shutdown: _shutdown,
        } = setup(Duration::ZERO);
        let total = 2 * SWEEP_BATCH_SIZE + 7;
        for n in 0..total {
            tracker
                .track(&ContentId::from_bytes(&(n as u32).to_be_bytes()).unwrap())
                .unwrap();
        }
        task::spawn(scheduler.run());

        trigger_tx.send(()).await.unwrap();
        let event = time::timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap();
        assert_eq!(*event, ReproviderEvent::SweepCompleted {
            reason: SweepReason::Trigger,
            enqueued: total
        });
        assert_eq!(queue.len().unwrap(), total);
    }

    #[tokio::test(start_paused = true)]
    async fn it_sweeps_on_the_timer() {
        let TestScheduler {
            scheduler,
            trigger_tx: _trigger_tx,
            mut events,
            tracker,
            queue,
            shutdown: _shutdown,
        } = setup(Duration::from_secs(60));
        tracker.track(&id(1)).unwrap();
        task::spawn(scheduler.run());

        // Nothing happens until one full interval has passed
        time::sleep(Duration::from_secs(59)).await;
        assert!(queue.is_empty().unwrap());

        let event = time::timeout(Duration::from_secs(2), events.recv()).await.unwrap().unwrap();
        assert_eq!(*event, ReproviderEvent::SweepCompleted {
            reason: SweepReason::Timer,
            enqueued: 1
        });
        assert_eq!(queue.try_dequeue().unwrap(), Some(id(1)));

        let event = time::timeout(Duration::from_secs(61), events.recv()).await.unwrap().unwrap();
        unpack_sweep_reason(&event, SweepReason::Timer);
        assert_eq!(queue.len().unwrap(), 1);
    }

    fn unpack_sweep_reason(event: &ReproviderEvent, expected: SweepReason) {
        match event {
            ReproviderEvent::SweepCompleted { reason, .. } => assert_eq!(*reason, expected),
            e => panic!("Unexpected event {}", e),
        }
    }
}
