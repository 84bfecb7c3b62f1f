//! Core types and traits for the Lode simulation engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions shared across the Lode workspace:
//! identifiers, the entity model, the module ABI trait seams, entity
//! lifecycle events, per-agent channel state, and error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod channel;
pub mod entity;
pub mod error;
pub mod event;
pub mod id;
pub mod module;

pub use channel::{ChannelFlags, ChannelSet, ChannelState, CHANNEL_CAPACITY};
pub use entity::{AgentHandle, AgentInstance, Entity, EntityKind, EntityPayload};
pub use error::{ChannelError, ConfigError, ModuleFault};
pub use event::EntityEvent;
pub use id::{CellCoord, Dims, EntityId, GridPos, CHUNK_EDGE};
pub use module::{
    AgentFactory, AgentHost, AgentModule, CoreHost, CoreModule, ExecDescriptor, MeshDescriptor,
};
