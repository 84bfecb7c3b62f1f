//! Bounded worker pool for parallel per-agent computation.
//!
//! Each tick, the scheduler scatters one unit of work per live agent
//! across the pool and blocks on a gather barrier until every unit
//! completes. A unit locks only its own agent instance while the
//! agent's logic runs, then takes the engine's shared lock just long
//! enough to submit the resulting command to the bridge: agent
//! computation is parallel, all traffic into the single-threaded core
//! is serialized.
//!
//! Workers receive tasks over a crossbeam channel and report
//! completion over a per-wave reply channel.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use lode_core::{
    AgentHandle, AgentHost, AgentInstance, ChannelFlags, ChannelSet, EntityId, ModuleFault,
};

use crate::state::EngineState;

// ── AgentHostContext ─────────────────────────────────────────────

/// Host callback surface for one agent call.
///
/// The staged payload is the censored world snapshot for this tick;
/// the output slot captures the agent's command bytes. Channel misuse
/// is reported on the agent's log surface and ignored, per the agent
/// ABI.
pub(crate) struct AgentHostContext<'a> {
    id: EntityId,
    channels: &'a mut ChannelSet,
    staged: Option<Arc<[u8]>>,
    command: Option<Vec<u8>>,
}

impl<'a> AgentHostContext<'a> {
    /// Context for a regular tick call, with the snapshot staged.
    pub fn for_tick(id: EntityId, channels: &'a mut ChannelSet, snapshot: Arc<[u8]>) -> Self {
        Self {
            id,
            channels,
            staged: Some(snapshot),
            command: None,
        }
    }

    /// Context for an `init` call: nothing staged, output discarded.
    pub fn for_init(id: EntityId, channels: &'a mut ChannelSet) -> Self {
        Self {
            id,
            channels,
            staged: None,
            command: None,
        }
    }

    /// The command the agent wrote, if any.
    pub fn into_command(self) -> Option<Vec<u8>> {
        self.command
    }
}

impl AgentHost for AgentHostContext<'_> {
    fn log(&mut self, message: &str) {
        log::info!(target: "lode::agent", "[{}] {message}", self.id);
    }

    fn read_buffer(&mut self, max_len: usize) -> Result<Vec<u8>, ModuleFault> {
        match self.staged.take() {
            None => Ok(Vec::new()),
            Some(payload) if payload.len() > max_len => {
                let len = payload.len();
                self.staged = Some(payload);
                Err(ModuleFault::BufferTooSmall { len, max_len })
            }
            Some(payload) => Ok(payload.to_vec()),
        }
    }

    fn write_buffer(&mut self, bytes: &[u8]) {
        self.command = Some(bytes.to_vec());
    }

    fn create_channel(&mut self, name: &str, flags: ChannelFlags) -> usize {
        self.channels.create(name, flags)
    }

    fn publish(&mut self, index: usize, msg: &[u8]) {
        if let Err(err) = self.channels.publish(index, msg.to_vec()) {
            log::warn!(target: "lode::agent", "[{}] publish ignored: {err}", self.id);
        }
    }

    fn has_message(&mut self, index: usize) -> bool {
        match self.channels.has_message(index) {
            Ok(pending) => pending,
            Err(err) => {
                log::warn!(target: "lode::agent", "[{}] has_message ignored: {err}", self.id);
                false
            }
        }
    }

    fn pop_message(&mut self, index: usize) -> Option<Vec<u8>> {
        match self.channels.pop_message(index) {
            Ok(msg) => msg,
            Err(err) => {
                log::warn!(target: "lode::agent", "[{}] pop_message ignored: {err}", self.id);
                None
            }
        }
    }
}

// ── AgentWorkPool ────────────────────────────────────────────────

/// One unit of agent work for the current tick.
pub(crate) struct AgentUnit {
    /// The agent entity's id.
    pub id: EntityId,
    /// Handle to the agent's live instance.
    pub exec: AgentHandle,
    /// This tick's censored world snapshot, shared across units.
    pub snapshot: Arc<[u8]>,
}

struct AgentTask {
    unit: AgentUnit,
    shared: Arc<Mutex<EngineState>>,
    done: Sender<()>,
}

/// Bounded pool of worker threads running per-agent computation.
pub struct AgentWorkPool {
    task_tx: Option<Sender<AgentTask>>,
    workers: Vec<JoinHandle<()>>,
}

impl AgentWorkPool {
    /// Spawn `worker_count` workers, each holding agent ticks to
    /// `call_budget`.
    pub(crate) fn new(worker_count: usize, call_budget: Duration) -> Self {
        let (task_tx, task_rx) = crossbeam_channel::bounded::<AgentTask>(worker_count * 4);
        let workers = (0..worker_count)
            .map(|i| {
                let rx = task_rx.clone();
                thread::Builder::new()
                    .name(format!("lode-agent-{i}"))
                    .spawn(move || worker_loop(rx, call_budget))
                    .expect("failed to spawn agent worker")
            })
            .collect();
        Self {
            task_tx: Some(task_tx),
            workers,
        }
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Scatter `units` across the pool and block until every unit has
    /// completed (commands submitted and all).
    pub(crate) fn run_wave(&self, units: Vec<AgentUnit>, shared: &Arc<Mutex<EngineState>>) {
        let Some(task_tx) = &self.task_tx else {
            return;
        };
        let expected = units.len();
        if expected == 0 {
            return;
        }
        let (done_tx, done_rx) = crossbeam_channel::bounded(expected);
        for unit in units {
            let task = AgentTask {
                unit,
                shared: Arc::clone(shared),
                done: done_tx.clone(),
            };
            if task_tx.send(task).is_err() {
                // Pool already shut down; nothing will complete.
                return;
            }
        }
        drop(done_tx);
        // Gather barrier: one completion per dispatched unit.
        for _ in 0..expected {
            if done_rx.recv().is_err() {
                break;
            }
        }
    }

    fn shutdown(&mut self) {
        // Closing the task channel ends every worker loop.
        self.task_tx = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for AgentWorkPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(task_rx: Receiver<AgentTask>, call_budget: Duration) {
    while let Ok(task) = task_rx.recv() {
        let AgentTask { unit, shared, done } = task;
        if let Some(command) = run_unit(&unit, call_budget) {
            // Commands funnel into the core one at a time; relative
            // order across agents is unspecified.
            let mut state = shared.lock().unwrap();
            if let Err(fault) = state.apply_agent_command(unit.id, &command) {
                log::warn!(
                    target: "lode::agents",
                    "command from agent {} rejected: {fault}",
                    unit.id
                );
            }
        }
        let _ = done.send(());
    }
}

/// Run one agent's tick against its own instance lock only.
///
/// The budget is checked after the call returns, the same way the
/// bridge polices core calls: a stalled agent still occupies its
/// worker, but its output is discarded.
fn run_unit(unit: &AgentUnit, call_budget: Duration) -> Option<Vec<u8>> {
    let mut instance = unit.exec.lock();
    let AgentInstance { module, channels } = &mut *instance;
    let mut host = AgentHostContext::for_tick(unit.id, channels, Arc::clone(&unit.snapshot));
    let started = Instant::now();
    let outcome = module.tick(&mut host);
    if started.elapsed() > call_budget {
        let fault = ModuleFault::Timeout {
            budget: call_budget,
        };
        log::warn!(target: "lode::agents", "agent {} tick failed: {fault}", unit.id);
        return None;
    }
    match outcome {
        Ok(()) => host.into_command(),
        Err(fault) => {
            log::warn!(target: "lode::agents", "agent {} tick failed: {fault}", unit.id);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lode_core::AgentModule;

    struct SnapshotEcho;

    impl AgentModule for SnapshotEcho {
        fn init(&mut self, _id: EntityId, _host: &mut dyn AgentHost) -> Result<(), ModuleFault> {
            Ok(())
        }

        fn tick(&mut self, host: &mut dyn AgentHost) -> Result<(), ModuleFault> {
            let snapshot = host.read_buffer(1024)?;
            host.write_buffer(&snapshot);
            Ok(())
        }
    }

    struct Stall {
        delay: Duration,
    }

    impl AgentModule for Stall {
        fn init(&mut self, _id: EntityId, _host: &mut dyn AgentHost) -> Result<(), ModuleFault> {
            Ok(())
        }

        fn tick(&mut self, host: &mut dyn AgentHost) -> Result<(), ModuleFault> {
            thread::sleep(self.delay);
            host.write_buffer(b"late");
            Ok(())
        }
    }

    #[test]
    fn unit_reads_snapshot_and_yields_command() {
        let unit = AgentUnit {
            id: EntityId::from_u128(1),
            exec: AgentHandle::new(AgentInstance::new(Box::new(SnapshotEcho))),
            snapshot: Arc::from(&[4, 5, 6][..]),
        };
        assert_eq!(
            run_unit(&unit, Duration::from_millis(250)),
            Some(vec![4, 5, 6])
        );
    }

    #[test]
    fn stalled_unit_forfeits_its_command() {
        let unit = AgentUnit {
            id: EntityId::from_u128(4),
            exec: AgentHandle::new(AgentInstance::new(Box::new(Stall {
                delay: Duration::from_millis(50),
            }))),
            snapshot: Arc::from(&[][..]),
        };
        assert_eq!(run_unit(&unit, Duration::from_millis(1)), None);
        // Within budget the same agent's command goes through.
        assert_eq!(
            run_unit(&unit, Duration::from_secs(5)),
            Some(b"late".to_vec())
        );
    }

    #[test]
    fn host_absorbs_channel_misuse() {
        let mut channels = ChannelSet::new();
        let mut host = AgentHostContext::for_init(EntityId::from_u128(2), &mut channels);
        host.publish(42, b"nope");
        assert!(!host.has_message(42));
        assert_eq!(host.pop_message(42), None);
        assert_eq!(host.into_command(), None);
    }

    #[test]
    fn oversized_snapshot_is_preserved_for_retry() {
        let mut channels = ChannelSet::new();
        let mut host = AgentHostContext::for_tick(
            EntityId::from_u128(3),
            &mut channels,
            Arc::from(&[0u8; 32][..]),
        );
        assert!(matches!(
            host.read_buffer(8),
            Err(ModuleFault::BufferTooSmall { len: 32, max_len: 8 })
        ));
        assert_eq!(host.read_buffer(32).unwrap().len(), 32);
    }
}
