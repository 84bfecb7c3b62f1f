//! Typed entity lifecycle events.
//!
//! The callback trampoline never mutates engine state directly: each
//! lifecycle notification issued by the core during a call is recorded
//! as an [`EntityEvent`], and the engine applies the drained list once
//! after the call returns. This keeps registry/chunk mutation out of
//! the nested-callback path.

use crate::id::{EntityId, GridPos};
use crate::module::ExecDescriptor;

/// One entity lifecycle notification recorded during a core call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntityEvent {
    /// Create-or-update of a resource deposit.
    Deposit {
        /// Entity id.
        id: EntityId,
        /// World-cell position.
        pos: GridPos,
        /// Remaining resource quantity.
        quantity: u32,
    },
    /// Create-or-update of an agent.
    Agent {
        /// Entity id.
        id: EntityId,
        /// World-cell position.
        pos: GridPos,
    },
    /// Create-or-update of a tower.
    Tower {
        /// Entity id.
        id: EntityId,
        /// World-cell position.
        pos: GridPos,
        /// Executable descriptor carried by the tower.
        descriptor: ExecDescriptor,
    },
    /// Explicit removal of an entity.
    Removed {
        /// Entity id.
        id: EntityId,
    },
}

impl EntityEvent {
    /// The id of the entity this event concerns.
    pub fn id(&self) -> EntityId {
        match *self {
            Self::Deposit { id, .. }
            | Self::Agent { id, .. }
            | Self::Tower { id, .. }
            | Self::Removed { id } => id,
        }
    }
}
