//! Authoritative mirror of the entity population reported by the core.
//!
//! The registry is a projection: the simulation core owns the truth
//! about which entities exist, and the registry replays the core's
//! entity callback stream into host-side state. Insertion order is
//! preserved so snapshots are stable across identical runs.

use indexmap::IndexMap;
use std::sync::Arc;

use lode_core::{
    AgentFactory, AgentHandle, AgentInstance, ChannelSet, Entity, EntityEvent, EntityId,
    EntityPayload,
};

use crate::agents::AgentHostContext;
use crate::chunks::ChunkStore;

/// Host-side mirror of all live entities, keyed by id.
#[derive(Default)]
pub struct EntityRegistry {
    entities: IndexMap<EntityId, Arc<Entity>>,
}

impl EntityRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the registry holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Look up an entity by id.
    pub fn get(&self, id: EntityId) -> Option<&Arc<Entity>> {
        self.entities.get(&id)
    }

    /// Replay one core event into the mirror, keeping the chunk index
    /// in sync.
    pub(crate) fn apply(
        &mut self,
        event: EntityEvent,
        chunks: &mut ChunkStore,
        factory: &dyn AgentFactory,
    ) {
        match event {
            EntityEvent::Deposit { id, pos, quantity } => {
                self.upsert(id, chunks, |_| Entity {
                    id,
                    pos,
                    payload: EntityPayload::Deposit { quantity },
                });
            }
            EntityEvent::Agent { id, pos } => {
                self.upsert(id, chunks, |prior| {
                    // A live agent keeps its instance and channels
                    // across position updates.
                    let exec = prior
                        .and_then(|entity| entity.agent_handle().cloned())
                        .unwrap_or_else(|| spawn_agent(id, factory));
                    Entity {
                        id,
                        pos,
                        payload: EntityPayload::Agent { exec },
                    }
                });
            }
            EntityEvent::Tower {
                id,
                pos,
                descriptor,
            } => {
                self.upsert(id, chunks, |_| Entity {
                    id,
                    pos,
                    payload: EntityPayload::Tower { descriptor },
                });
            }
            EntityEvent::Removed { id } => self.remove(id, chunks),
        }
    }

    fn upsert(
        &mut self,
        id: EntityId,
        chunks: &mut ChunkStore,
        build: impl FnOnce(Option<&Entity>) -> Entity,
    ) {
        let prior_cell = self.entities.get(&id).map(|entity| entity.cell());
        let entity = build(self.entities.get(&id).map(Arc::as_ref));
        let cell = entity.cell();
        if let Some(prior) = prior_cell {
            if prior != cell {
                chunks.deindex(prior, id);
            }
        }
        chunks.index(cell, id);
        self.entities.insert(id, Arc::new(entity));
    }

    fn remove(&mut self, id: EntityId, chunks: &mut ChunkStore) {
        match self.entities.shift_remove(&id) {
            Some(entity) => chunks.deindex(entity.cell(), id),
            None => {
                // Removal of an unknown id is a no-op; the core may
                // report a removal the host already processed.
                log::warn!(target: "lode::registry", "removal of unknown entity {id}");
            }
        }
    }

    /// Drop every entity and deindex them all.
    pub(crate) fn clear(&mut self, chunks: &mut ChunkStore) {
        for (id, entity) in self.entities.drain(..) {
            chunks.deindex(entity.cell(), id);
        }
    }

    /// Ids and handles of every live agent, in insertion order.
    pub(crate) fn agents(&self) -> Vec<(EntityId, AgentHandle)> {
        self.entities
            .values()
            .filter_map(|entity| {
                entity
                    .agent_handle()
                    .map(|handle| (entity.id, handle.clone()))
            })
            .collect()
    }

    /// Shared snapshot of every live entity, in insertion order.
    pub fn snapshot(&self) -> Vec<Arc<Entity>> {
        self.entities.values().cloned().collect()
    }
}

/// Build a fresh agent instance and run its one-time `init` call.
/// Output written during `init` is discarded; only channel
/// subscriptions stick.
fn spawn_agent(id: EntityId, factory: &dyn AgentFactory) -> AgentHandle {
    let mut module = factory.instantiate(id);
    let mut channels = ChannelSet::new();
    let mut host = AgentHostContext::for_init(id, &mut channels);
    if let Err(fault) = module.init(id, &mut host) {
        log::warn!(target: "lode::registry", "agent {id} init failed: {fault}");
    }
    AgentHandle::new(AgentInstance { module, channels })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lode_core::{AgentHost, AgentModule, CellCoord, Dims, EntityKind, GridPos, ModuleFault};

    struct Inert;

    impl AgentModule for Inert {
        fn init(&mut self, _id: EntityId, _host: &mut dyn AgentHost) -> Result<(), ModuleFault> {
            Ok(())
        }

        fn tick(&mut self, _host: &mut dyn AgentHost) -> Result<(), ModuleFault> {
            Ok(())
        }
    }

    struct InertFactory;

    impl AgentFactory for InertFactory {
        fn instantiate(&self, _id: EntityId) -> Box<dyn AgentModule> {
            Box::new(Inert)
        }
    }

    fn store() -> ChunkStore {
        let mut chunks = ChunkStore::new();
        chunks.resize(Dims { x: 2, y: 2, z: 2 });
        chunks
    }

    fn deposit(id: u128, pos: GridPos) -> EntityEvent {
        EntityEvent::Deposit {
            id: EntityId::from_u128(id),
            pos,
            quantity: 10,
        }
    }

    #[test]
    fn upsert_then_remove_round_trip() {
        let mut registry = EntityRegistry::new();
        let mut chunks = store();
        registry.apply(deposit(1, GridPos { x: 0, y: 0, z: 0 }), &mut chunks, &InertFactory);
        assert_eq!(registry.len(), 1);
        assert!(chunks
            .get(CellCoord { x: 0, y: 0, z: 0 })
            .unwrap()
            .contains(EntityId::from_u128(1)));

        registry.apply(
            EntityEvent::Removed {
                id: EntityId::from_u128(1),
            },
            &mut chunks,
            &InertFactory,
        );
        assert!(registry.is_empty());
        assert!(!chunks
            .get(CellCoord { x: 0, y: 0, z: 0 })
            .unwrap()
            .contains(EntityId::from_u128(1)));
    }

    #[test]
    fn removing_unknown_id_is_harmless() {
        let mut registry = EntityRegistry::new();
        let mut chunks = store();
        registry.apply(
            EntityEvent::Removed {
                id: EntityId::from_u128(9),
            },
            &mut chunks,
            &InertFactory,
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn cell_move_reindexes_and_dirties_both_chunks() {
        let mut registry = EntityRegistry::new();
        let mut chunks = store();
        let id = EntityId::from_u128(2);

        registry.apply(deposit(2, GridPos { x: 0, y: 0, z: 0 }), &mut chunks, &InertFactory);
        for cell in chunks.dirty_cells() {
            chunks.store_mesh(cell, Default::default());
        }

        registry.apply(deposit(2, GridPos { x: 16, y: 0, z: 0 }), &mut chunks, &InertFactory);
        let a = CellCoord { x: 0, y: 0, z: 0 };
        let b = CellCoord { x: 1, y: 0, z: 0 };
        assert!(!chunks.get(a).unwrap().contains(id));
        assert!(chunks.get(b).unwrap().contains(id));
        assert!(chunks.get(a).unwrap().is_dirty());
        assert!(chunks.get(b).unwrap().is_dirty());
    }

    #[test]
    fn agent_update_keeps_instance() {
        let mut registry = EntityRegistry::new();
        let mut chunks = store();
        let id = EntityId::from_u128(3);

        registry.apply(
            EntityEvent::Agent {
                id,
                pos: GridPos { x: 1, y: 1, z: 1 },
            },
            &mut chunks,
            &InertFactory,
        );
        let first = registry.get(id).unwrap().agent_handle().unwrap().clone();

        registry.apply(
            EntityEvent::Agent {
                id,
                pos: GridPos { x: 2, y: 2, z: 2 },
            },
            &mut chunks,
            &InertFactory,
        );
        let second = registry.get(id).unwrap().agent_handle().unwrap();
        assert!(first.same_instance(second));
        assert_eq!(registry.get(id).unwrap().kind(), EntityKind::Agent);
    }

    #[test]
    fn clear_empties_registry_and_index() {
        let mut registry = EntityRegistry::new();
        let mut chunks = store();
        registry.apply(deposit(4, GridPos { x: 0, y: 0, z: 0 }), &mut chunks, &InertFactory);
        registry.apply(deposit(5, GridPos { x: 17, y: 0, z: 0 }), &mut chunks, &InertFactory);

        registry.clear(&mut chunks);
        assert!(registry.is_empty());
        assert!(chunks.iter().all(|chunk| chunk.entities().next().is_none()));
    }

    #[test]
    fn snapshot_preserves_insertion_order() {
        let mut registry = EntityRegistry::new();
        let mut chunks = store();
        for id in [7u128, 3, 5] {
            registry.apply(deposit(id, GridPos { x: 0, y: 0, z: 0 }), &mut chunks, &InertFactory);
        }
        let ids: Vec<u128> = registry
            .snapshot()
            .iter()
            .map(|entity| entity.id.as_u128())
            .collect();
        assert_eq!(ids, vec![7, 3, 5]);
    }
}
