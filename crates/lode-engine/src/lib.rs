//! Threaded tick engine around an opaque simulation core.
//!
//! Provides the top-level [`Engine`] that owns the core module behind
//! a call bridge, mirrors its entity population, schedules
//! non-overlapping ticks on a dedicated thread, fans agent
//! computation out over a worker pool, and routes pubsub messages
//! between agents once per tick.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod agents;
pub mod bridge;
pub mod buffer;
pub mod chunks;
pub mod config;
pub mod engine;
pub mod pubsub;
pub mod registry;
pub mod scheduler;

mod state;
mod tick;

pub use agents::AgentWorkPool;
pub use bridge::SimulationBridge;
pub use buffer::ByteChannel;
pub use chunks::{Chunk, ChunkStore};
pub use config::EngineConfig;
pub use engine::{Engine, TickUpdate};
pub use pubsub::PubSubRouter;
pub use registry::EntityRegistry;
pub use scheduler::{SchedulerState, TickScheduler};
