//! Top-level engine handle tying the pieces together.

use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::Receiver;

use lode_core::{
    AgentFactory, CellCoord, ConfigError, CoreModule, Dims, Entity, EntityId, MeshDescriptor,
    ModuleFault,
};

use crate::agents::AgentWorkPool;
use crate::bridge::SimulationBridge;
use crate::config::EngineConfig;
use crate::scheduler::{SchedulerState, TickScheduler};
use crate::state::EngineState;

// ── TickUpdate ───────────────────────────────────────────────────

/// What a completed tick hands the consumer.
#[derive(Debug, Default)]
pub struct TickUpdate {
    /// Snapshot of every live entity after the tick.
    pub entities: Vec<Arc<Entity>>,
    /// Full serialized world state after the tick.
    pub export: Vec<u8>,
    /// Chunks whose geometry was rebuilt while collecting this
    /// update, filled in by [`Engine::drain_update`].
    pub rebuilt: Vec<CellCoord>,
}

// ── Engine ───────────────────────────────────────────────────────

/// The simulation engine: one core, one agent population, one tick
/// thread, one consumer.
pub struct Engine {
    shared: Arc<Mutex<EngineState>>,
    scheduler: TickScheduler,
    update_rx: Receiver<TickUpdate>,
}

impl Engine {
    /// Assemble an engine around a core module and an agent factory.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] when the configuration is invalid. No threads
    /// are running until the first accepted tick request.
    pub fn new(
        core: Box<dyn CoreModule>,
        factory: Arc<dyn AgentFactory>,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let bridge = SimulationBridge::new(core, &config);
        let shared = Arc::new(Mutex::new(EngineState::new(bridge, factory)));
        let pool = Arc::new(AgentWorkPool::new(
            config.resolved_worker_count(),
            config.call_budget,
        ));
        let (update_tx, update_rx) = crossbeam_channel::bounded(1);
        let scheduler = TickScheduler::new(
            Arc::clone(&shared),
            pool,
            update_tx,
            update_rx.clone(),
            config.seed,
        );
        Ok(Self {
            shared,
            scheduler,
            update_rx,
        })
    }

    /// Start a fresh world of `dims` chunks per axis.
    pub fn init(&self, dims: Dims) {
        self.lock().init(dims);
    }

    /// Restore a world from a previous [`export`](Self::export).
    ///
    /// # Errors
    ///
    /// A [`ModuleFault`] from the core abandons the restore.
    pub fn import(&self, payload: &[u8]) -> Result<(), ModuleFault> {
        self.lock().import(payload)
    }

    /// Serialize the current world state.
    ///
    /// # Errors
    ///
    /// A [`ModuleFault`] from the core abandons the export.
    pub fn export(&self) -> Result<Vec<u8>, ModuleFault> {
        self.lock().bridge.export()
    }

    /// Request one tick. Returns `false` if a tick is already in
    /// flight; the request is dropped, not queued.
    pub fn request_tick(&mut self) -> bool {
        self.scheduler.request_tick()
    }

    /// Whether a tick is currently in flight.
    pub fn is_ticking(&self) -> bool {
        self.scheduler.is_ticking()
    }

    /// Current scheduler state.
    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Block until no tick is in flight.
    pub fn wait_idle(&self) {
        self.scheduler.wait_idle();
    }

    /// Collect the most recent tick update, if one is waiting.
    ///
    /// Geometry for chunks dirtied since the last collection is
    /// rebuilt here, on the caller's thread, and reported in
    /// [`TickUpdate::rebuilt`].
    pub fn drain_update(&self) -> Option<TickUpdate> {
        let mut update = self.update_rx.try_recv().ok()?;
        update.rebuilt = self.lock().rebuild_dirty();
        Some(update)
    }

    /// Snapshot of every live entity.
    pub fn entities(&self) -> Vec<Arc<Entity>> {
        self.lock().registry.snapshot()
    }

    /// Look up a single entity by id.
    pub fn entity(&self, id: EntityId) -> Option<Arc<Entity>> {
        self.lock().registry.get(id).cloned()
    }

    /// World size in chunks per axis.
    pub fn dims(&self) -> Dims {
        self.lock().bridge.dims()
    }

    /// Number of chunks in the world.
    pub fn chunk_count(&self) -> usize {
        self.lock().chunks.len()
    }

    /// The stored mesh for one chunk, if the chunk exists.
    pub fn chunk_mesh(&self, cell: CellCoord) -> Option<MeshDescriptor> {
        self.lock().chunks.get(cell).map(|chunk| chunk.mesh().clone())
    }

    /// Stop the tick thread and the worker pool. Idempotent; also
    /// runs on drop.
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.shared.lock().unwrap()
    }
}
