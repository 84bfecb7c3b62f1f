//! Immutable entity snapshots and the shared agent execution handle.
//!
//! Every registry update replaces an entity's snapshot wholesale, so
//! an observer holding an `Arc<Entity>` never sees a half-updated
//! entity. The one deliberately shared piece is an agent's live
//! executable instance: the [`AgentHandle`] inside an agent snapshot
//! is a cloneable handle to the same instance across snapshot
//! generations, torn down when the entity is removed.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::channel::ChannelSet;
use crate::id::{CellCoord, EntityId, GridPos};
use crate::module::{AgentModule, ExecDescriptor};

// ── AgentInstance / AgentHandle ──────────────────────────────────

/// An agent's live executable instance plus its channel table.
///
/// Locked as a unit: the worker running this agent's tick and the
/// router delivering its messages both take the same lock, so module
/// state and channel state stay mutually consistent.
pub struct AgentInstance {
    /// The agent's executable logic.
    pub module: Box<dyn AgentModule>,
    /// The agent's pubsub channel table.
    pub channels: ChannelSet,
}

impl AgentInstance {
    /// Wrap a freshly instantiated module with an empty channel table.
    pub fn new(module: Box<dyn AgentModule>) -> Self {
        Self {
            module,
            channels: ChannelSet::new(),
        }
    }
}

/// Cloneable shared handle to a live [`AgentInstance`].
///
/// Clones refer to the same instance; the instance is dropped when
/// the last handle goes away (normally when the registry processes
/// the entity's removal and the final snapshot is released).
#[derive(Clone)]
pub struct AgentHandle(Arc<Mutex<AgentInstance>>);

impl AgentHandle {
    /// Create a handle owning a fresh instance.
    pub fn new(instance: AgentInstance) -> Self {
        Self(Arc::new(Mutex::new(instance)))
    }

    /// Lock the instance.
    ///
    /// # Panics
    ///
    /// Propagates the panic of a thread that poisoned the lock.
    pub fn lock(&self) -> MutexGuard<'_, AgentInstance> {
        self.0.lock().unwrap()
    }

    /// Whether two handles refer to the same instance.
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentHandle").finish_non_exhaustive()
    }
}

// ── Entity ───────────────────────────────────────────────────────

/// Entity kind discriminant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A resource deposit.
    Deposit,
    /// An autonomous agent.
    Agent,
    /// A tower.
    Tower,
}

/// Kind-specific entity payload.
#[derive(Clone, Debug)]
pub enum EntityPayload {
    /// Resource deposit payload.
    Deposit {
        /// Remaining resource quantity.
        quantity: u32,
    },
    /// Agent payload.
    Agent {
        /// Handle to the agent's live executable instance.
        exec: AgentHandle,
    },
    /// Tower payload.
    Tower {
        /// Executable descriptor carried by the tower.
        descriptor: ExecDescriptor,
    },
}

/// An immutable per-tick entity snapshot.
#[derive(Clone, Debug)]
pub struct Entity {
    /// Stable entity id.
    pub id: EntityId,
    /// World-cell position at snapshot time.
    pub pos: GridPos,
    /// Kind-specific payload.
    pub payload: EntityPayload,
}

impl Entity {
    /// The entity's kind.
    pub fn kind(&self) -> EntityKind {
        match self.payload {
            EntityPayload::Deposit { .. } => EntityKind::Deposit,
            EntityPayload::Agent { .. } => EntityKind::Agent,
            EntityPayload::Tower { .. } => EntityKind::Tower,
        }
    }

    /// The chunk cell this entity occupies.
    pub fn cell(&self) -> CellCoord {
        self.pos.cell()
    }

    /// The agent execution handle, if this is an agent.
    pub fn agent_handle(&self) -> Option<&AgentHandle> {
        match &self.payload {
            EntityPayload::Agent { exec } => Some(exec),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModuleFault;
    use crate::module::AgentHost;

    struct InertAgent;

    impl AgentModule for InertAgent {
        fn init(&mut self, _id: EntityId, _host: &mut dyn AgentHost) -> Result<(), ModuleFault> {
            Ok(())
        }

        fn tick(&mut self, _host: &mut dyn AgentHost) -> Result<(), ModuleFault> {
            Ok(())
        }
    }

    #[test]
    fn kind_matches_payload() {
        let deposit = Entity {
            id: EntityId::from_u128(1),
            pos: GridPos::new(0, 0, 0),
            payload: EntityPayload::Deposit { quantity: 12 },
        };
        assert_eq!(deposit.kind(), EntityKind::Deposit);
        assert!(deposit.agent_handle().is_none());
    }

    #[test]
    fn cloned_handles_share_the_instance() {
        let handle = AgentHandle::new(AgentInstance::new(Box::new(InertAgent)));
        let clone = handle.clone();
        assert!(handle.same_instance(&clone));

        let entity = Entity {
            id: EntityId::from_u128(2),
            pos: GridPos::new(20, 0, 0),
            payload: EntityPayload::Agent { exec: clone },
        };
        assert_eq!(entity.kind(), EntityKind::Agent);
        assert!(entity
            .agent_handle()
            .is_some_and(|h| h.same_instance(&handle)));
        assert_eq!(entity.cell(), CellCoord::new(1, 0, 0));
    }
}
