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

mod harness;

use std::{collections::HashSet, sync::Arc, time::Duration};

use harness::{BlockGenerator, FailingStore, MapBlockstore, MockContentRouter};
use tari_content_provider::{
    reprovider::{Activity, SweepReason},
    ContentId,
    Queue,
    Reprovider,
    ReproviderConfig,
    ReproviderError,
    ReproviderEvent,
    Tracker,
};
use tari_shutdown::Shutdown;
use tari_storage::{HashmapDatabase, KeyValueStore};
use tari_test_utils::{async_assert_eventually, collect_recv, collect_try_recv, streams::get_item_counts, unpack_enum};
use tokio::{sync::mpsc::error::TryRecvError, time};

struct TestNode<S> {
    shutdown: Shutdown,
    store: S,
    queue: Queue<S>,
    tracker: Tracker<S>,
    blockstore: Arc<MapBlockstore>,
    router: Arc<MockContentRouter>,
}

fn setup<S: KeyValueStore + Clone>(store: S) -> (TestNode<S>, tokio::sync::mpsc::UnboundedReceiver<ContentId>) {
    let _ = env_logger::try_init();
    let shutdown = Shutdown::new();
    let queue = Queue::new(shutdown.to_signal(), "test", store.clone()).unwrap();
    let tracker = Tracker::new(store.clone());
    let (router, provided_rx) = MockContentRouter::new();
    let node = TestNode {
        shutdown,
        store,
        queue,
        tracker,
        blockstore: MapBlockstore::new(),
        router,
    };
    (node, provided_rx)
}

impl<S: KeyValueStore + Clone + 'static> TestNode<S> {
    fn reprovider(&self, config: ReproviderConfig) -> Reprovider<S> {
        Reprovider::new(
            self.shutdown.to_signal(),
            self.queue.clone(),
            self.tracker.clone(),
            config,
            self.blockstore.clone(),
            self.router.clone(),
        )
        .unwrap()
    }

    /// Track `n` new blocks that are present in the block store
    fn add_blocks(&self, n: usize) -> HashSet<ContentId> {
        (0..n)
            .map(|_| {
                let (id, data) = BlockGenerator::next();
                self.blockstore.put(id.clone(), data);
                self.tracker.track(&id).unwrap();
                id
            })
            .collect()
    }
}

fn fast_failures(max_store_failures: usize) -> ReproviderConfig {
    ReproviderConfig {
        sweep_interval: Duration::from_secs(60 * 60),
        drain_interval: Duration::from_millis(1),
        store_failure_backoff: Duration::from_millis(5),
        max_store_failure_backoff: Duration::from_millis(20),
        max_store_failures,
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reannouncement_trigger() {
    let (node, mut provided_rx) = setup(HashmapDatabase::new());
    let mut reprovider = Reprovider::with_intervals(
        node.shutdown.to_signal(),
        node.queue.clone(),
        node.tracker.clone(),
        Duration::from_secs(60 * 60),
        Duration::from_millis(10),
        node.blockstore.clone(),
        node.router.clone(),
    )
    .unwrap();
    reprovider.run().unwrap();

    let blocks = node.add_blocks(100);
    let handle = reprovider.get_handle();
    let signal = node.shutdown.to_signal();
    tokio::spawn(async move { handle.trigger(signal).await });

    let provided = collect_recv!(provided_rx, take = 100, timeout = Duration::from_secs(5));
    let provided = provided.into_iter().collect::<HashSet<_>>();
    assert_eq!(provided, blocks);

    // Nothing is announced twice without another sweep
    time::sleep(Duration::from_millis(50)).await;
    assert_eq!(provided_rx.try_recv().unwrap_err(), TryRecvError::Empty);
    assert_eq!(node.router.call_count(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reannouncement_tick() {
    let (node, mut provided_rx) = setup(HashmapDatabase::new());
    let blocks = node.add_blocks(100);
    let tick = Duration::from_millis(10);
    let mut reprovider = node.reprovider(ReproviderConfig::with_intervals(tick, tick));
    reprovider.run().unwrap();
    assert!(reprovider.is_running());

    // Later sweeps re-enqueue announced ids behind the first batch, so every id appears exactly once
    let provided = collect_recv!(provided_rx, take = 100, timeout = Duration::from_secs(5));
    let counts = get_item_counts(provided);
    assert_eq!(counts.keys().cloned().collect::<HashSet<_>>(), blocks);
    assert!(counts.values().all(|n| *n == 1));

    // Subsequent sweeps announce tracked ids again
    let provided = collect_recv!(provided_rx, take = 10, timeout = Duration::from_secs(5));
    assert!(provided.iter().all(|id| blocks.contains(id)));
}

#[tokio::test]
async fn it_skips_content_that_is_no_longer_held() {
    let (node, mut provided_rx) = setup(HashmapDatabase::new());
    let present = node.add_blocks(5);
    let removed = node.add_blocks(5);
    for id in &removed {
        node.blockstore.delete_block(id);
    }

    let mut reprovider = node.reprovider(ReproviderConfig::with_intervals(Duration::ZERO, Duration::ZERO));
    let mut events = reprovider.subscribe_events();
    reprovider.run().unwrap();
    reprovider.trigger(node.shutdown.to_signal()).await.unwrap();

    let events = collect_try_recv!(events, take = 11, timeout = Duration::from_secs(5));
    let mut announced = HashSet::new();
    let mut skipped = HashSet::new();
    for event in events {
        match &*event {
            ReproviderEvent::Announced(id) => {
                announced.insert(id.clone());
            },
            ReproviderEvent::SkippedMissing(id) => {
                skipped.insert(id.clone());
            },
            ReproviderEvent::SweepCompleted { reason, enqueued } => {
                assert_eq!(*reason, SweepReason::Trigger);
                assert_eq!(*enqueued, 10);
            },
            e => panic!("Unexpected event {}", e),
        }
    }
    assert_eq!(announced, present);
    assert_eq!(skipped, removed);

    let provided = collect_recv!(provided_rx, take = 5, timeout = Duration::from_secs(1));
    assert!(provided.iter().all(|id| present.contains(id)));
    assert_eq!(node.router.call_count(), 5);
}

#[tokio::test]
async fn announce_failures_do_not_stop_the_worker() {
    let (node, mut provided_rx) = setup(HashmapDatabase::new());
    let blocks = node.add_blocks(3);
    let failing = blocks.iter().next().unwrap().clone();
    node.router.fail_for(failing.clone());

    let mut reprovider = node.reprovider(ReproviderConfig::with_intervals(Duration::ZERO, Duration::ZERO));
    let mut events = reprovider.subscribe_events();
    reprovider.run().unwrap();
    reprovider.trigger(node.shutdown.to_signal()).await.unwrap();

    let provided = collect_recv!(provided_rx, take = 2, timeout = Duration::from_secs(5));
    assert!(!provided.contains(&failing));

    let events = collect_try_recv!(events, take = 4, timeout = Duration::from_secs(5));
    let failures = events
        .iter()
        .filter_map(|e| match &**e {
            ReproviderEvent::AnnounceFailed(id, reason) => Some((id.clone(), reason.clone())),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(failures, vec![(failing, "routing table unavailable".to_string())]);
    assert!(reprovider.is_running());
}

#[tokio::test]
async fn presence_check_failures_skip_the_id() {
    let (node, _provided_rx) = setup(HashmapDatabase::new());
    let blocks = node.add_blocks(2);
    node.blockstore.set_failing(true);

    let mut reprovider = node.reprovider(ReproviderConfig::with_intervals(Duration::ZERO, Duration::ZERO));
    let mut events = reprovider.subscribe_events();
    reprovider.run().unwrap();
    reprovider.trigger(node.shutdown.to_signal()).await.unwrap();

    let events = collect_try_recv!(events, take = 3, timeout = Duration::from_secs(5));
    let skipped = events
        .iter()
        .filter_map(|e| match &**e {
            ReproviderEvent::PresenceCheckFailed(id, _) => Some(id.clone()),
            _ => None,
        })
        .collect::<HashSet<_>>();
    assert_eq!(skipped, blocks);
    assert_eq!(node.router.call_count(), 0);
    assert!(node.queue.is_empty().unwrap());
}

#[tokio::test(start_paused = true)]
async fn announcements_respect_the_drain_interval() {
    let (node, mut provided_rx) = setup(HashmapDatabase::new());
    node.add_blocks(5);
    let drain_interval = Duration::from_millis(50);
    let mut reprovider = node.reprovider(ReproviderConfig::with_intervals(Duration::ZERO, drain_interval));
    reprovider.run().unwrap();
    reprovider.trigger(node.shutdown.to_signal()).await.unwrap();

    let _provided = collect_recv!(provided_rx, take = 1, timeout = Duration::from_secs(5));
    // Ids waiting for their turn stay in the queue
    assert_eq!(node.queue.len().unwrap(), 4);

    let _provided = collect_recv!(provided_rx, take = 4, timeout = Duration::from_secs(5));
    let times = node.router.call_times();
    assert_eq!(times.len(), 5);
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= drain_interval);
    }
    assert!(node.queue.is_empty().unwrap());
}

#[tokio::test]
async fn it_stops_on_shutdown() {
    let (mut node, mut provided_rx) = setup(HashmapDatabase::new());
    let mut reprovider = node.reprovider(ReproviderConfig::with_intervals(Duration::ZERO, Duration::ZERO));
    reprovider.run().unwrap();
    assert!(reprovider.is_running());

    node.shutdown.trigger();
    async_assert_eventually!(
        reprovider.is_running(),
        expect = false,
        max_attempts = 20,
        interval = Duration::from_millis(10)
    );

    node.add_blocks(3);
    let caller_shutdown = Shutdown::new();
    let result = reprovider.trigger(caller_shutdown.to_signal()).await;
    unpack_enum!(ReproviderError::NotRunning = result.unwrap_err());
    time::sleep(Duration::from_millis(20)).await;
    assert_eq!(provided_rx.try_recv().unwrap_err(), TryRecvError::Empty);
    assert!(node.queue.is_empty().unwrap());
}

#[tokio::test]
async fn trigger_and_run_errors() {
    let (node, _provided_rx) = setup(HashmapDatabase::new());
    let mut reprovider = node.reprovider(ReproviderConfig::default());

    let result = reprovider.trigger(node.shutdown.to_signal()).await;
    unpack_enum!(ReproviderError::NotRunning = result.unwrap_err());
    assert!(!reprovider.is_running());

    reprovider.run().unwrap();
    unpack_enum!(ReproviderError::AlreadyRunning = reprovider.run().unwrap_err());

    let mut caller_shutdown = Shutdown::new();
    let signal = caller_shutdown.to_signal();
    caller_shutdown.trigger();
    let result = reprovider.trigger(signal).await;
    unpack_enum!(ReproviderError::Cancelled = result.unwrap_err());

    let config = ReproviderConfig {
        event_buffer_size: 0,
        ..Default::default()
    };
    let result = Reprovider::new(
        node.shutdown.to_signal(),
        node.queue.clone(),
        node.tracker.clone(),
        config,
        node.blockstore.clone(),
        node.router.clone(),
    );
    unpack_enum!(ReproviderError::InvalidConfig(_err) = result.err().unwrap());
}

#[tokio::test]
async fn store_failures_are_retried() {
    let (node, mut provided_rx) = setup(FailingStore::new());
    let blocks = node.add_blocks(2);
    node.store.set_failing(true);

    let mut reprovider = node.reprovider(fast_failures(10));
    let mut events = reprovider.subscribe_events();
    reprovider.run().unwrap();
    reprovider.trigger(node.shutdown.to_signal()).await.unwrap();

    let event = collect_try_recv!(events, take = 1, timeout = Duration::from_secs(5)).remove(0);
    unpack_enum!(ReproviderEvent::StoreFailure { activity, reason } = (*event).clone());
    assert_eq!(activity, Activity::Sweep);
    assert!(reason.contains("disk unavailable"));

    node.store.set_failing(false);
    let provided = collect_recv!(provided_rx, take = 2, timeout = Duration::from_secs(5));
    assert_eq!(provided.into_iter().collect::<HashSet<_>>(), blocks);
}

#[tokio::test]
async fn sweep_degrades_after_repeated_store_failures() {
    let (node, _provided_rx) = setup(FailingStore::new());
    node.add_blocks(1);
    node.store.set_failing(true);

    let mut reprovider = node.reprovider(fast_failures(3));
    let mut events = reprovider.subscribe_events();
    reprovider.run().unwrap();
    reprovider.trigger(node.shutdown.to_signal()).await.unwrap();

    let events = collect_try_recv!(events, take = 4, timeout = Duration::from_secs(5));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(***e, ReproviderEvent::StoreFailure { .. }))
            .count(),
        3
    );
    assert_eq!(*events[3], ReproviderEvent::Degraded(Activity::Sweep));

    let handle = reprovider.get_handle();
    async_assert_eventually!(
        matches!(
            handle.trigger(node.shutdown.to_signal()).await,
            Err(ReproviderError::NotRunning)
        ),
        expect = true,
        max_attempts = 20,
        interval = Duration::from_millis(10)
    );
    // The worker is still waiting on the queue
    assert!(reprovider.is_running());
}

#[tokio::test]
async fn drain_degrades_after_repeated_store_failures() {
    let (node, _provided_rx) = setup(FailingStore::new());
    for id in node.add_blocks(2) {
        node.queue.enqueue(id).unwrap();
    }
    node.store.set_failing(true);

    let mut reprovider = node.reprovider(fast_failures(3));
    let mut events = reprovider.subscribe_events();
    reprovider.run().unwrap();

    let events = collect_try_recv!(events, take = 4, timeout = Duration::from_secs(5));
    for event in &events[..3] {
        unpack_enum!(ReproviderEvent::StoreFailure { activity, reason } = (**event).clone());
        assert_eq!(activity, Activity::Drain);
        assert!(reason.contains("disk unavailable"));
    }
    assert_eq!(*events[3], ReproviderEvent::Degraded(Activity::Drain));

    // Entries that could not be removed from the store stay queued
    assert_eq!(node.queue.len().unwrap(), 2);
    assert_eq!(node.router.call_count(), 0);
    // The scheduler keeps running
    assert!(reprovider.is_running());
}

#[tokio::test]
async fn triggers_do_not_wait_for_a_sweep_in_progress() {
    let (node, _provided_rx) = setup(FailingStore::new());
    node.add_blocks(1);
    node.store.set_failing(true);

    let config = ReproviderConfig {
        sweep_interval: Duration::ZERO,
        store_failure_backoff: Duration::from_secs(60),
        max_store_failure_backoff: Duration::from_secs(60),
        ..Default::default()
    };
    let mut reprovider = node.reprovider(config);
    let mut events = reprovider.subscribe_events();
    reprovider.run().unwrap();
    reprovider.trigger(node.shutdown.to_signal()).await.unwrap();

    // The sweep is now backing off after a store failure
    let event = collect_try_recv!(events, take = 1, timeout = Duration::from_secs(5)).remove(0);
    assert!(matches!(*event, ReproviderEvent::StoreFailure {
        activity: Activity::Sweep,
        ..
    }));

    // One request fills the trigger buffer, the rest are coalesced into the pending sweep
    for _ in 0..3 {
        time::timeout(Duration::from_secs(1), reprovider.trigger(node.shutdown.to_signal()))
            .await
            .unwrap()
            .unwrap();
    }
}
