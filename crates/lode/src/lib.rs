//! Lode: a host-side tick engine for deterministic simulation cores.
//!
//! This is the top-level facade crate that re-exports the public API
//! from the Lode sub-crates. For most users, adding `lode` as a single
//! dependency is sufficient.
//!
//! Lode drives an opaque simulation core (anything implementing
//! [`prelude::CoreModule`]) through non-overlapping ticks on a
//! dedicated thread, mirrors the core's entity population on the host
//! side, fans per-agent computation out over a worker pool, and routes
//! pubsub messages between agents once per tick.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use lode::prelude::*;
//!
//! // A minimal core: an empty world that exports nothing.
//! #[derive(Default)]
//! struct EmptyCore {
//!     dims: Dims,
//! }
//!
//! impl CoreModule for EmptyCore {
//!     fn init(&mut self, dims: Dims) {
//!         self.dims = dims;
//!     }
//!     fn import(&mut self, host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
//!         host.read_buffer(usize::MAX)?;
//!         Ok(())
//!     }
//!     fn export(&mut self, host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
//!         host.write_buffer(&[]);
//!         Ok(())
//!     }
//!     fn export_censored(&mut self, host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
//!         host.write_buffer(&[]);
//!         Ok(())
//!     }
//!     fn tick(&mut self, _host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
//!         Ok(())
//!     }
//!     fn entity_update(&mut self, _host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
//!         Ok(())
//!     }
//!     fn set_command(&mut self, _id: EntityId, _host: &mut dyn CoreHost) -> Result<(), ModuleFault> {
//!         Ok(())
//!     }
//!     fn get_chunk(&mut self, _cell: CellCoord) -> MeshDescriptor {
//!         MeshDescriptor::default()
//!     }
//!     fn dims(&self) -> Dims {
//!         self.dims
//!     }
//! }
//!
//! // Agents are instantiated on demand; this world spawns none, so
//! // any factory will do.
//! struct NoAgents;
//! impl AgentFactory for NoAgents {
//!     fn instantiate(&self, _id: EntityId) -> Box<dyn AgentModule> {
//!         unreachable!("EmptyCore never spawns agents")
//!     }
//! }
//!
//! let mut engine = Engine::new(
//!     Box::new(EmptyCore::default()),
//!     Arc::new(NoAgents),
//!     EngineConfig::default(),
//! )
//! .unwrap();
//! engine.init(Dims::new(2, 2, 2));
//! assert_eq!(engine.chunk_count(), 8);
//!
//! assert!(engine.request_tick());
//! engine.wait_idle();
//! let update = engine.drain_update().unwrap();
//! assert!(update.entities.is_empty());
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in
//! the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `lode-core` | Ids, entity model, ABI traits, channels, errors |
//! | [`engine`] | `lode-engine` | The engine, scheduler, worker pool, and router |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and ids (`lode-core`).
///
/// Contains the entity model, the module ABI traits
/// ([`types::CoreModule`], [`types::AgentModule`]), pubsub channel
/// state, and error types.
pub use lode_core as types;

/// The tick engine (`lode-engine`).
///
/// [`engine::Engine`] is the main entry point; the sub-modules expose
/// the scheduler, worker pool, chunk store, and router individually.
pub use lode_engine as engine;

/// Common imports for typical Lode usage.
///
/// ```rust
/// use lode::prelude::*;
/// ```
pub mod prelude {
    // Ids and geometry
    pub use lode_core::{CellCoord, Dims, EntityId, GridPos, CHUNK_EDGE};

    // Entity model
    pub use lode_core::{Entity, EntityEvent, EntityKind, EntityPayload, ExecDescriptor};

    // ABI traits
    pub use lode_core::{
        AgentFactory, AgentHost, AgentModule, CoreHost, CoreModule, MeshDescriptor,
    };

    // Channels
    pub use lode_core::{ChannelFlags, CHANNEL_CAPACITY};

    // Errors
    pub use lode_core::{ChannelError, ConfigError, ModuleFault};

    // Engine
    pub use lode_engine::{Engine, EngineConfig, SchedulerState, TickUpdate};
}
