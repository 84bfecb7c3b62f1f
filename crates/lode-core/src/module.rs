//! Trait seams over the simulation core and agent executable ABIs.
//!
//! The engine treats both the simulation core and each agent's logic
//! as opaque executable modules behind trait objects. A backend (e.g.
//! a wasm runtime) implements [`CoreModule`] / [`AgentModule`]; the
//! engine provides the host callback surface ([`CoreHost`] /
//! [`AgentHost`]) for the duration of each call. Callbacks run on the
//! calling thread, synchronously, nested inside the outer call; a
//! single call may issue any number of them at any point.

use std::fmt;
use std::sync::Arc;

use crate::channel::ChannelFlags;
use crate::error::ModuleFault;
use crate::id::{CellCoord, Dims, EntityId, GridPos};

// ── Opaque payloads ──────────────────────────────────────────────

/// Opaque render mesh payload for one chunk.
///
/// The engine stores and forwards mesh buffers without interpreting
/// them; only the renderer understands the layout. The `dirty` flag
/// is the core's own change signal: voxel edits happen inside the
/// opaque core, so the descriptor is the only place the host can
/// learn that a chunk's geometry went stale.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MeshDescriptor {
    /// Whether the cell's voxel data changed since the previous
    /// `get_chunk` for this cell. Fetching consumes the flag.
    pub dirty: bool,
    /// Packed vertex buffer.
    pub vertices: Vec<u8>,
    /// Packed index buffer.
    pub indices: Vec<u8>,
}

impl MeshDescriptor {
    /// Whether the mesh has no geometry.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.indices.is_empty()
    }
}

/// Opaque executable descriptor blob attached to a tower entity.
///
/// Cheap to clone; snapshots sharing a descriptor share the bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecDescriptor(Arc<[u8]>);

impl ExecDescriptor {
    /// Wrap a descriptor blob.
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    /// The raw descriptor bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the descriptor is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ExecDescriptor {
    fn default() -> Self {
        Self(Arc::from(&[][..]))
    }
}

impl fmt::Display for ExecDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExecDescriptor({} bytes)", self.0.len())
    }
}

// ── Core ABI ─────────────────────────────────────────────────────

/// Host callback surface available to the simulation core during a
/// call.
///
/// All callbacks execute synchronously on the calling thread while
/// the engine's exclusion lock is held. Entity notifications are
/// recorded, not applied: the engine consumes them once after the
/// outer call returns.
pub trait CoreHost {
    /// Fill `buf` with host-provided random bytes.
    fn random(&mut self, buf: &mut [u8]);

    /// Emit a UTF-8 log line on the core's behalf.
    fn log(&mut self, message: &str);

    /// Consume the pending transfer-buffer payload.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleFault::BufferTooSmall`] if the payload exceeds
    /// `max_len`; the payload is preserved and the call must unwind.
    fn read_buffer(&mut self, max_len: usize) -> Result<Vec<u8>, ModuleFault>;

    /// Store `bytes` as the transfer-buffer payload, replacing any
    /// previous payload.
    fn write_buffer(&mut self, bytes: &[u8]);

    /// The entity `id` was removed.
    fn entity_removed(&mut self, id: EntityId);

    /// A resource deposit was created or updated.
    fn entity_deposit(&mut self, id: EntityId, pos: GridPos, quantity: u32);

    /// An agent was created or updated.
    fn entity_agent(&mut self, id: EntityId, pos: GridPos);

    /// A tower was created or updated.
    fn entity_tower(&mut self, id: EntityId, pos: GridPos, descriptor: ExecDescriptor);
}

/// The opaque deterministic simulation core.
///
/// One instance per engine; the engine serializes every call, so
/// implementations may assume single-threaded access (`Send` is
/// required only to move the module onto the tick thread).
///
/// Calls that take a [`CoreHost`] may invoke any callback, any number
/// of times, before returning. A returned [`ModuleFault`] abandons
/// the call; the engine never retries it.
pub trait CoreModule: Send {
    /// (Re)establish world dimensions and reset world state.
    fn init(&mut self, dims: Dims);

    /// Restore world state from the payload pending in the transfer
    /// buffer.
    ///
    /// # Errors
    ///
    /// Any [`ModuleFault`] abandons the import; world state is
    /// unspecified until the next `init` or successful `import`.
    fn import(&mut self, host: &mut dyn CoreHost) -> Result<(), ModuleFault>;

    /// Serialize full world state into the transfer buffer.
    ///
    /// # Errors
    ///
    /// Any [`ModuleFault`] abandons the export.
    fn export(&mut self, host: &mut dyn CoreHost) -> Result<(), ModuleFault>;

    /// Serialize a redacted view of world state, safe to expose to
    /// agent logic, into the transfer buffer.
    ///
    /// # Errors
    ///
    /// Any [`ModuleFault`] abandons the export.
    fn export_censored(&mut self, host: &mut dyn CoreHost) -> Result<(), ModuleFault>;

    /// Advance the simulation one step.
    ///
    /// # Errors
    ///
    /// Any [`ModuleFault`] abandons this tick's remaining work.
    fn tick(&mut self, host: &mut dyn CoreHost) -> Result<(), ModuleFault>;

    /// Re-notify the host of every live entity via the lifecycle
    /// callbacks.
    ///
    /// # Errors
    ///
    /// Any [`ModuleFault`] abandons the pass.
    fn entity_update(&mut self, host: &mut dyn CoreHost) -> Result<(), ModuleFault>;

    /// Inject the command pending in the transfer buffer into entity
    /// `id`. Unknown ids are a no-op inside the core.
    ///
    /// # Errors
    ///
    /// Any [`ModuleFault`] abandons the injection.
    fn set_command(&mut self, id: EntityId, host: &mut dyn CoreHost) -> Result<(), ModuleFault>;

    /// Fetch the render mesh for chunk `cell`.
    ///
    /// The descriptor always carries current geometry; its `dirty`
    /// flag reports whether the cell's voxel data changed since the
    /// previous `get_chunk` for that cell, and the fetch consumes the
    /// flag.
    fn get_chunk(&mut self, cell: CellCoord) -> MeshDescriptor;

    /// Current world dimensions.
    fn dims(&self) -> Dims;
}

// ── Agent ABI ────────────────────────────────────────────────────

/// Host callback surface available to an agent executable during a
/// call.
///
/// The buffer here is the agent's private transfer slot, not the
/// engine's shared one: `read_buffer` yields the censored world
/// snapshot staged for this tick, `write_buffer` stores the agent's
/// resulting command bytes. Channel misuse (bad index, missing
/// publish flag) is reported on the agent's log surface and ignored.
pub trait AgentHost {
    /// Emit a UTF-8 log line on the agent's behalf.
    fn log(&mut self, message: &str);

    /// Consume the staged payload (the censored world snapshot).
    ///
    /// # Errors
    ///
    /// Returns [`ModuleFault::BufferTooSmall`] if the payload exceeds
    /// `max_len`; the payload is preserved.
    fn read_buffer(&mut self, max_len: usize) -> Result<Vec<u8>, ModuleFault>;

    /// Store `bytes` as the agent's command for this tick, replacing
    /// any previous value.
    fn write_buffer(&mut self, bytes: &[u8]);

    /// Create (or re-reference) the channel named `name`, returning
    /// its index. Flags are merged into an existing channel.
    fn create_channel(&mut self, name: &str, flags: ChannelFlags) -> usize;

    /// Queue a message on channel `index` for the router's next pass.
    fn publish(&mut self, index: usize, msg: &[u8]);

    /// Whether channel `index` has a delivered message waiting.
    fn has_message(&mut self, index: usize) -> bool;

    /// Take the next delivered message on channel `index`, if any.
    fn pop_message(&mut self, index: usize) -> Option<Vec<u8>>;
}

/// One agent's independently executable per-tick logic.
pub trait AgentModule: Send {
    /// One-time setup, called under the engine lock when the agent
    /// entity is first notified.
    ///
    /// # Errors
    ///
    /// A [`ModuleFault`] is logged; the agent still participates in
    /// later ticks.
    fn init(&mut self, id: EntityId, host: &mut dyn AgentHost) -> Result<(), ModuleFault>;

    /// One tick of agent logic: read the snapshot, decide, write a
    /// command (or nothing).
    ///
    /// # Errors
    ///
    /// A [`ModuleFault`] is logged and the agent's command for this
    /// tick is discarded.
    fn tick(&mut self, host: &mut dyn AgentHost) -> Result<(), ModuleFault>;
}

/// Instantiates executable logic for newly notified agent entities.
pub trait AgentFactory: Send + Sync {
    /// Build a fresh, uninitialized module for agent `id`.
    fn instantiate(&self, id: EntityId) -> Box<dyn AgentModule>;
}
