//! Tick orchestration thread.
//!
//! Ticks never overlap and never queue: while one is in flight, new
//! requests bounce. The scheduler owns a dedicated thread, spawned
//! lazily on the first accepted request, that sleeps between ticks on
//! a wake channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::agents::AgentWorkPool;
use crate::engine::TickUpdate;
use crate::pubsub::PubSubRouter;
use crate::state::EngineState;
use crate::tick::run_tick;

/// What the scheduler is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No tick in flight; the next request will be accepted.
    Idle,
    /// A request was accepted but the tick thread has not picked it
    /// up yet.
    Armed,
    /// A tick is in flight.
    Ticking,
}

/// Everything the tick thread takes ownership of when it spawns.
struct SchedulerDeps {
    shared: Arc<Mutex<EngineState>>,
    pool: Arc<AgentWorkPool>,
    update_tx: Sender<TickUpdate>,
    update_rx: Receiver<TickUpdate>,
    router_seed: u64,
}

/// Coalescing, non-overlapping tick driver.
pub struct TickScheduler {
    deps: Option<SchedulerDeps>,
    wake_tx: Sender<()>,
    wake_rx: Option<Receiver<()>>,
    ticking: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl TickScheduler {
    pub(crate) fn new(
        shared: Arc<Mutex<EngineState>>,
        pool: Arc<AgentWorkPool>,
        update_tx: Sender<TickUpdate>,
        update_rx: Receiver<TickUpdate>,
        router_seed: u64,
    ) -> Self {
        let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);
        Self {
            deps: Some(SchedulerDeps {
                shared,
                pool,
                update_tx,
                update_rx,
                router_seed,
            }),
            wake_tx,
            wake_rx: Some(wake_rx),
            ticking: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    /// Request one tick. Returns `false` when a tick is already in
    /// flight or the scheduler has shut down; the request is dropped,
    /// not queued.
    pub fn request_tick(&mut self) -> bool {
        if self.shutdown.load(Ordering::Acquire) {
            return false;
        }
        self.ensure_thread();
        if self
            .ticking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        if self.wake_tx.try_send(()).is_err() {
            // Thread gone or wake slot jammed; un-claim the tick.
            self.ticking.store(false, Ordering::Release);
            return false;
        }
        true
    }

    /// Whether a tick is currently claimed or running.
    pub fn is_ticking(&self) -> bool {
        self.ticking.load(Ordering::Acquire)
    }

    /// Current scheduler state.
    pub fn state(&self) -> SchedulerState {
        if !self.is_ticking() {
            SchedulerState::Idle
        } else if self.wake_tx.is_full() {
            SchedulerState::Armed
        } else {
            SchedulerState::Ticking
        }
    }

    /// Block until no tick is in flight.
    pub fn wait_idle(&self) {
        while self.is_ticking() {
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Stop accepting requests, finish any in-flight tick, and join
    /// the tick thread. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        // Nudge a sleeping thread so it observes the flag.
        let _ = self.wake_tx.try_send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        self.ticking.store(false, Ordering::Release);
    }

    fn ensure_thread(&mut self) {
        if self.thread.is_some() {
            return;
        }
        let (Some(deps), Some(wake_rx)) = (self.deps.take(), self.wake_rx.take()) else {
            return;
        };
        let ticking = Arc::clone(&self.ticking);
        let shutdown = Arc::clone(&self.shutdown);
        let handle = thread::Builder::new()
            .name("lode-tick".into())
            .spawn(move || tick_loop(deps, wake_rx, ticking, shutdown))
            .expect("failed to spawn tick thread");
        self.thread = Some(handle);
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn tick_loop(
    deps: SchedulerDeps,
    wake_rx: Receiver<()>,
    ticking: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
) {
    let SchedulerDeps {
        shared,
        pool,
        update_tx,
        update_rx,
        router_seed,
    } = deps;
    let mut router = PubSubRouter::new(router_seed);
    while wake_rx.recv().is_ok() {
        if shutdown.load(Ordering::Acquire) {
            break;
        }
        run_tick(&shared, &pool, &mut router, &update_tx, &update_rx);
        ticking.store(false, Ordering::Release);
    }
}
