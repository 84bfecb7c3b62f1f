//! Typed entry points into the opaque simulation core.
//!
//! [`SimulationBridge`] owns the boxed [`CoreModule`], the transfer
//! [`ByteChannel`], the RNG backing the core's `random` callback, and
//! the per-call execution budget. Every callback-bearing operation
//! builds a [`CoreCallContext`] for the duration of the call; entity
//! lifecycle notifications issued by the core are recorded as
//! [`EntityEvent`]s and returned to the caller, which applies them
//! after the call; the trampoline itself never touches the registry.
//!
//! The bridge performs no locking. Callers hold the engine's single
//! exclusion lock across an entire bridge operation, because one core
//! call may issue several buffer reads and writes that must observe a
//! consistent channel.

use std::time::{Duration, Instant};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use lode_core::{
    CellCoord, CoreHost, CoreModule, Dims, EntityEvent, EntityId, ExecDescriptor, GridPos,
    MeshDescriptor, ModuleFault,
};

use crate::buffer::ByteChannel;
use crate::config::EngineConfig;

// ── CoreCallContext ──────────────────────────────────────────────

/// Host callback surface for one core call.
///
/// Borrows the bridge's channel and RNG, and records lifecycle
/// notifications instead of applying them.
struct CoreCallContext<'a> {
    channel: &'a mut ByteChannel,
    rng: &'a mut ChaCha8Rng,
    events: &'a mut Vec<EntityEvent>,
}

impl CoreHost for CoreCallContext<'_> {
    fn random(&mut self, buf: &mut [u8]) {
        self.rng.fill_bytes(buf);
    }

    fn log(&mut self, message: &str) {
        log::info!(target: "lode::core", "{message}");
    }

    fn read_buffer(&mut self, max_len: usize) -> Result<Vec<u8>, ModuleFault> {
        self.channel.take(max_len)
    }

    fn write_buffer(&mut self, bytes: &[u8]) {
        self.channel.put(bytes.to_vec());
    }

    fn entity_removed(&mut self, id: EntityId) {
        self.events.push(EntityEvent::Removed { id });
    }

    fn entity_deposit(&mut self, id: EntityId, pos: GridPos, quantity: u32) {
        self.events.push(EntityEvent::Deposit { id, pos, quantity });
    }

    fn entity_agent(&mut self, id: EntityId, pos: GridPos) {
        self.events.push(EntityEvent::Agent { id, pos });
    }

    fn entity_tower(&mut self, id: EntityId, pos: GridPos, descriptor: ExecDescriptor) {
        self.events.push(EntityEvent::Tower {
            id,
            pos,
            descriptor,
        });
    }
}

// ── SimulationBridge ─────────────────────────────────────────────

/// Wraps the opaque simulation core with typed, budget-enforced call
/// entry points.
pub struct SimulationBridge {
    core: Box<dyn CoreModule>,
    channel: ByteChannel,
    rng: ChaCha8Rng,
    call_budget: Duration,
}

impl SimulationBridge {
    /// Wrap `core` with the transfer channel, callback RNG, and call
    /// budget from `config`.
    pub fn new(core: Box<dyn CoreModule>, config: &EngineConfig) -> Self {
        Self {
            core,
            channel: ByteChannel::new(config.buffer_capacity),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            call_budget: config.call_budget,
        }
    }

    /// (Re)establish world dimensions and reset core state.
    pub fn init(&mut self, dims: Dims) {
        self.channel.clear();
        self.core.init(dims);
    }

    /// Current world dimensions as reported by the core.
    pub fn dims(&self) -> Dims {
        self.core.dims()
    }

    /// Fetch the render mesh for chunk `cell`.
    pub fn get_chunk(&mut self, cell: CellCoord) -> MeshDescriptor {
        self.core.get_chunk(cell)
    }

    /// Advance the core one tick, returning the lifecycle events it
    /// issued.
    ///
    /// # Errors
    ///
    /// A [`ModuleFault`] abandons this tick's remaining work; the
    /// bridge does not retry.
    pub fn tick(&mut self) -> Result<Vec<EntityEvent>, ModuleFault> {
        self.call(|core, host| core.tick(host))
    }

    /// Ask the core to re-notify every live entity.
    ///
    /// # Errors
    ///
    /// A [`ModuleFault`] abandons the pass.
    pub fn entity_update(&mut self) -> Result<Vec<EntityEvent>, ModuleFault> {
        self.call(|core, host| core.entity_update(host))
    }

    /// Restore core state from `payload`, then re-enumerate entities
    /// so the caller can rebuild its bookkeeping.
    ///
    /// # Errors
    ///
    /// A [`ModuleFault`] from either the import or the re-enumeration
    /// abandons the restore; core state is unspecified until the next
    /// `init` or successful `import`.
    pub fn import(&mut self, payload: Vec<u8>) -> Result<Vec<EntityEvent>, ModuleFault> {
        self.channel.put(payload);
        let result = self.call(|core, host| core.import(host));
        // A core that rejected the payload may leave it unread; the
        // next call must start with a clean slot either way.
        self.channel.clear();
        let mut events = result?;
        events.extend(self.call(|core, host| core.entity_update(host))?);
        Ok(events)
    }

    /// Serialize full world state and return the payload.
    ///
    /// # Errors
    ///
    /// A [`ModuleFault`] abandons the export. In particular,
    /// [`ModuleFault::BufferTooSmall`] reports a core payload larger
    /// than the configured buffer capacity.
    pub fn export(&mut self) -> Result<Vec<u8>, ModuleFault> {
        self.call(|core, host| core.export(host))?;
        let max_len = self.channel.capacity();
        self.channel.take(max_len)
    }

    /// Serialize the redacted world view safe to expose to agents.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`export`](Self::export).
    pub fn export_censored(&mut self) -> Result<Vec<u8>, ModuleFault> {
        self.call(|core, host| core.export_censored(host))?;
        let max_len = self.channel.capacity();
        self.channel.take(max_len)
    }

    /// Inject `command` into entity `id`, returning any lifecycle
    /// events the injection triggered.
    ///
    /// # Errors
    ///
    /// A [`ModuleFault`] abandons the injection.
    pub fn set_command(
        &mut self,
        id: EntityId,
        command: &[u8],
    ) -> Result<Vec<EntityEvent>, ModuleFault> {
        self.channel.put(command.to_vec());
        let result = self.call(|core, host| core.set_command(id, host));
        // The core ignores commands for unknown ids without reading
        // the payload; clear it so the slot is clean for the next call.
        self.channel.clear();
        result
    }

    /// Run one core call with a fresh callback context and enforce the
    /// execution budget.
    fn call<F>(&mut self, f: F) -> Result<Vec<EntityEvent>, ModuleFault>
    where
        F: FnOnce(&mut dyn CoreModule, &mut dyn CoreHost) -> Result<(), ModuleFault>,
    {
        let Self {
            core,
            channel,
            rng,
            call_budget,
        } = self;
        let started = Instant::now();
        let mut events = Vec::new();
        let mut host = CoreCallContext {
            channel,
            rng,
            events: &mut events,
        };
        f(core.as_mut(), &mut host)?;
        if started.elapsed() > *call_budget {
            return Err(ModuleFault::Timeout {
                budget: *call_budget,
            });
        }
        Ok(events)
    }
}
