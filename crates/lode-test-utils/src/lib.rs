//! Test utilities and mock modules for Lode development.
//!
//! Provides scriptable implementations of the core and agent ABI
//! traits ([`CoreModule`], [`AgentModule`], [`AgentFactory`]) for
//! exercising the engine without a real simulation core.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use lode_core::{
    AgentFactory, AgentHost, AgentModule, CellCoord, ChannelFlags, CoreHost, CoreModule, Dims,
    EntityEvent, EntityId, MeshDescriptor, ModuleFault,
};

/// Shared observation log, cloneable across the test and the module
/// under test.
pub type SharedLog<T> = Arc<Mutex<Vec<T>>>;

fn replay(event: &EntityEvent, host: &mut dyn CoreHost) {
    match event {
        EntityEvent::Deposit { id, pos, quantity } => host.entity_deposit(*id, *pos, *quantity),
        EntityEvent::Agent { id, pos } => host.entity_agent(*id, *pos),
        EntityEvent::Tower {
            id,
            pos,
            descriptor,
        } => host.entity_tower(*id, *pos, descriptor.clone()),
        EntityEvent::Removed { id } => host.entity_removed(*id),
    }
}

// ── NoopCore ─────────────────────────────────────────────────────

/// A core that accepts every call and does nothing.
///
/// Never touches the transfer buffer except to export an empty
/// payload, so it doubles as a probe for payload-hygiene tests.
#[derive(Default)]
pub struct NoopCore {
    dims: Dims,
}

impl CoreModule for NoopCore {
    fn init(&mut self, dims: Dims) {
        self.dims = dims;
    }

    fn import(&mut self, _host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
        Ok(())
    }

    fn export(&mut self, host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
        host.write_buffer(&[]);
        Ok(())
    }

    fn export_censored(&mut self, host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
        host.write_buffer(&[]);
        Ok(())
    }

    fn tick(&mut self, _host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
        Ok(())
    }

    fn entity_update(&mut self, _host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
        Ok(())
    }

    fn set_command(&mut self, _id: EntityId, _host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
        Ok(())
    }

    fn get_chunk(&mut self, _cell: CellCoord) -> MeshDescriptor {
        MeshDescriptor::default()
    }

    fn dims(&self) -> Dims {
        self.dims
    }
}

// ── ScriptedCore ─────────────────────────────────────────────────

/// A core driven by pre-scripted tick outcomes.
///
/// Each [`script_tick`](Self::script_tick) call queues one tick's
/// worth of entity events. Replayed events also update an internal
/// live-entity map so `entity_update` (and therefore `import`)
/// re-enumerates a consistent population, the way a real core would.
pub struct ScriptedCore {
    /// Payload written by both `export` and `export_censored`.
    pub export_payload: Vec<u8>,
    script: VecDeque<Vec<EntityEvent>>,
    voxel_script: VecDeque<Vec<CellCoord>>,
    changed: BTreeSet<CellCoord>,
    mesh_revision: u8,
    live: BTreeMap<EntityId, EntityEvent>,
    commands: SharedLog<(EntityId, Vec<u8>)>,
    dims: Dims,
}

impl ScriptedCore {
    pub fn new() -> Self {
        Self {
            export_payload: Vec::new(),
            script: VecDeque::new(),
            voxel_script: VecDeque::new(),
            changed: BTreeSet::new(),
            mesh_revision: 0,
            live: BTreeMap::new(),
            commands: Arc::new(Mutex::new(Vec::new())),
            dims: Dims::default(),
        }
    }

    /// Queue the events the next unscripted `tick` call will emit.
    pub fn script_tick(&mut self, events: Vec<EntityEvent>) {
        self.script.push_back(events);
    }

    /// Queue cells whose voxel data the next `tick` call will alter.
    /// Altered cells report `dirty` (with fresh geometry) on their
    /// next `get_chunk` fetch.
    pub fn script_voxel_change(&mut self, cells: Vec<CellCoord>) {
        self.voxel_script.push_back(cells);
    }

    /// Handle to the log of commands injected via `set_command`.
    /// Clone it before boxing the core into an engine.
    pub fn command_log(&self) -> SharedLog<(EntityId, Vec<u8>)> {
        Arc::clone(&self.commands)
    }
}

impl Default for ScriptedCore {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreModule for ScriptedCore {
    fn init(&mut self, dims: Dims) {
        self.dims = dims;
        self.live.clear();
    }

    fn import(&mut self, host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
        // Consume the payload like a real core, then restore from the
        // in-memory live set; entity_update follows and re-enumerates.
        host.read_buffer(usize::MAX)?;
        Ok(())
    }

    fn export(&mut self, host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
        host.write_buffer(&self.export_payload);
        Ok(())
    }

    fn export_censored(&mut self, host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
        host.write_buffer(&self.export_payload);
        Ok(())
    }

    fn tick(&mut self, host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
        let altered = self.voxel_script.pop_front().unwrap_or_default();
        if !altered.is_empty() {
            self.changed.extend(altered);
            self.mesh_revision = self.mesh_revision.wrapping_add(1);
        }
        let events = self.script.pop_front().unwrap_or_default();
        for event in &events {
            replay(event, host);
            match event {
                EntityEvent::Removed { id } => {
                    self.live.remove(id);
                }
                other => {
                    self.live.insert(other.id(), other.clone());
                }
            }
        }
        Ok(())
    }

    fn entity_update(&mut self, host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
        for event in self.live.values() {
            replay(event, host);
        }
        Ok(())
    }

    fn set_command(&mut self, id: EntityId, host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
        let command = host.read_buffer(usize::MAX)?;
        self.commands.lock().unwrap().push((id, command));
        Ok(())
    }

    fn get_chunk(&mut self, cell: CellCoord) -> MeshDescriptor {
        // Deterministic per-cell geometry so tests can tell chunks
        // (and revisions) apart. Fetching consumes the dirty flag.
        MeshDescriptor {
            dirty: self.changed.remove(&cell),
            vertices: vec![cell.x as u8, cell.y as u8, cell.z as u8, self.mesh_revision],
            indices: vec![0],
        }
    }

    fn dims(&self) -> Dims {
        self.dims
    }
}

// ── SlowCore ─────────────────────────────────────────────────────

/// A core whose first `slow_ticks` tick calls stall for `delay`,
/// after which it behaves like [`NoopCore`]. For budget-enforcement
/// tests.
pub struct SlowCore {
    delay: Duration,
    slow_ticks: usize,
    ticks_seen: usize,
    dims: Dims,
}

impl SlowCore {
    pub fn new(delay: Duration, slow_ticks: usize) -> Self {
        Self {
            delay,
            slow_ticks,
            ticks_seen: 0,
            dims: Dims::default(),
        }
    }
}

impl CoreModule for SlowCore {
    fn init(&mut self, dims: Dims) {
        self.dims = dims;
    }

    fn import(&mut self, host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
        host.read_buffer(usize::MAX)?;
        Ok(())
    }

    fn export(&mut self, host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
        host.write_buffer(&[]);
        Ok(())
    }

    fn export_censored(&mut self, host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
        host.write_buffer(&[]);
        Ok(())
    }

    fn tick(&mut self, _host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
        if self.ticks_seen < self.slow_ticks {
            thread::sleep(self.delay);
        }
        self.ticks_seen += 1;
        Ok(())
    }

    fn entity_update(&mut self, _host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
        Ok(())
    }

    fn set_command(&mut self, _id: EntityId, _host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
        Ok(())
    }

    fn get_chunk(&mut self, _cell: CellCoord) -> MeshDescriptor {
        MeshDescriptor::default()
    }

    fn dims(&self) -> Dims {
        self.dims
    }
}

// ── Agents ───────────────────────────────────────────────────────

/// An agent that does nothing, every tick.
pub struct InertAgent;

impl AgentModule for InertAgent {
    fn init(&mut self, _id: EntityId, _host: &mut dyn AgentHost) -> Result<(), ModuleFault> {
        Ok(())
    }

    fn tick(&mut self, _host: &mut dyn AgentHost) -> Result<(), ModuleFault> {
        Ok(())
    }
}

/// A configurable agent for engine integration tests.
///
/// Records every snapshot it reads and every message it receives into
/// shared logs; optionally writes a fixed command each tick, publishes
/// queued messages on one topic, and subscribes to another.
pub struct ScriptedAgent {
    command: Option<Vec<u8>>,
    publish: Option<(String, VecDeque<Vec<u8>>)>,
    subscribe: Option<String>,
    publish_index: Option<usize>,
    subscribe_index: Option<usize>,
    received: SharedLog<Vec<u8>>,
    snapshots: SharedLog<Vec<u8>>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self {
            command: None,
            publish: None,
            subscribe: None,
            publish_index: None,
            subscribe_index: None,
            received: Arc::new(Mutex::new(Vec::new())),
            snapshots: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Write `command` to the host every tick.
    pub fn with_command(mut self, command: Vec<u8>) -> Self {
        self.command = Some(command);
        self
    }

    /// Publish one queued message per tick on `topic` until the queue
    /// runs dry.
    pub fn publishing(mut self, topic: &str, messages: Vec<Vec<u8>>) -> Self {
        self.publish = Some((topic.to_string(), messages.into()));
        self
    }

    /// Subscribe to `topic` and log everything that arrives.
    pub fn subscribing(mut self, topic: &str) -> Self {
        self.subscribe = Some(topic.to_string());
        self
    }

    /// Handle to the received-message log. Clone before handing the
    /// agent to a factory.
    pub fn received_log(&self) -> SharedLog<Vec<u8>> {
        Arc::clone(&self.received)
    }

    /// Handle to the per-tick snapshot log.
    pub fn snapshot_log(&self) -> SharedLog<Vec<u8>> {
        Arc::clone(&self.snapshots)
    }
}

impl Default for ScriptedAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentModule for ScriptedAgent {
    fn init(&mut self, _id: EntityId, host: &mut dyn AgentHost) -> Result<(), ModuleFault> {
        if let Some((topic, _)) = &self.publish {
            self.publish_index = Some(host.create_channel(topic, ChannelFlags::new(true, false)));
        }
        if let Some(topic) = &self.subscribe {
            self.subscribe_index = Some(host.create_channel(topic, ChannelFlags::new(false, true)));
        }
        Ok(())
    }

    fn tick(&mut self, host: &mut dyn AgentHost) -> Result<(), ModuleFault> {
        let snapshot = host.read_buffer(usize::MAX)?;
        self.snapshots.lock().unwrap().push(snapshot);

        if let Some(index) = self.subscribe_index {
            while let Some(msg) = host.pop_message(index) {
                self.received.lock().unwrap().push(msg);
            }
        }
        if let (Some(index), Some((_, queue))) = (self.publish_index, self.publish.as_mut()) {
            if let Some(msg) = queue.pop_front() {
                host.publish(index, &msg);
            }
        }
        if let Some(command) = &self.command {
            host.write_buffer(command);
        }
        Ok(())
    }
}

// ── Factories ────────────────────────────────────────────────────

/// A factory that builds an [`InertAgent`] for every id.
pub struct NullAgentFactory;

impl AgentFactory for NullAgentFactory {
    fn instantiate(&self, _id: EntityId) -> Box<dyn AgentModule> {
        Box::new(InertAgent)
    }
}

/// A factory backed by a closure, for one-off test wiring.
pub struct FnAgentFactory<F>(pub F);

impl<F> AgentFactory for FnAgentFactory<F>
where
    F: Fn(EntityId) -> Box<dyn AgentModule> + Send + Sync,
{
    fn instantiate(&self, id: EntityId) -> Box<dyn AgentModule> {
        (self.0)(id)
    }
}

/// A factory that hands out pre-built agents in order, one per
/// instantiation, then falls back to [`InertAgent`].
///
/// Lets a test construct agents up front (and keep their log handles)
/// before the engine spawns them.
pub struct QueueAgentFactory {
    queue: Mutex<VecDeque<Box<dyn AgentModule>>>,
}

impl QueueAgentFactory {
    pub fn new(agents: Vec<Box<dyn AgentModule>>) -> Self {
        Self {
            queue: Mutex::new(agents.into()),
        }
    }
}

impl AgentFactory for QueueAgentFactory {
    fn instantiate(&self, _id: EntityId) -> Box<dyn AgentModule> {
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Box::new(InertAgent))
    }
}
