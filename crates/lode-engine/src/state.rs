//! Shared engine state behind the single exclusion lock.
//!
//! The bridge, the entity mirror, and the chunk index always change
//! together in response to a core call, so they live in one struct
//! guarded by one mutex. Anything that talks to the core goes through
//! this lock.

use std::sync::Arc;

use lode_core::{
    AgentFactory, CellCoord, Dims, EntityEvent, EntityId, ModuleFault,
};

use crate::bridge::SimulationBridge;
use crate::chunks::ChunkStore;
use crate::registry::EntityRegistry;

pub(crate) struct EngineState {
    pub bridge: SimulationBridge,
    pub registry: EntityRegistry,
    pub chunks: ChunkStore,
    pub factory: Arc<dyn AgentFactory>,
}

impl EngineState {
    pub fn new(bridge: SimulationBridge, factory: Arc<dyn AgentFactory>) -> Self {
        Self {
            bridge,
            registry: EntityRegistry::new(),
            chunks: ChunkStore::new(),
            factory,
        }
    }

    /// Replay a batch of core events into the mirror and chunk index.
    pub fn apply_events(&mut self, events: Vec<EntityEvent>) {
        for event in events {
            self.registry
                .apply(event, &mut self.chunks, self.factory.as_ref());
        }
    }

    /// Start a fresh world of the given size. Any prior population is
    /// discarded before the core builds the new one.
    pub fn init(&mut self, dims: Dims) {
        self.registry.clear(&mut self.chunks);
        self.bridge.init(dims);
        self.chunks.resize(self.bridge.dims());
    }

    /// Load a serialized world, rebuilding the mirror from scratch
    /// from the core's resync callbacks.
    pub fn import(&mut self, payload: &[u8]) -> Result<(), ModuleFault> {
        let events = self.bridge.import(payload.to_vec())?;
        self.registry.clear(&mut self.chunks);
        self.chunks.resize(self.bridge.dims());
        self.apply_events(events);
        Ok(())
    }

    /// Feed one agent's command into the core and fold the resulting
    /// entity changes back in.
    pub fn apply_agent_command(
        &mut self,
        id: EntityId,
        command: &[u8],
    ) -> Result<(), ModuleFault> {
        let events = self.bridge.set_command(id, command)?;
        self.apply_events(events);
        Ok(())
    }

    /// Refresh chunk geometry and return the cells that were rebuilt.
    ///
    /// Every cell is polled: the entity index only knows about
    /// occupancy changes, while voxel edits surface as the `dirty`
    /// flag on the descriptor the core hands back. A fetched mesh is
    /// stored when either side reports a change.
    pub fn rebuild_dirty(&mut self) -> Vec<CellCoord> {
        let cells: Vec<(CellCoord, bool)> = self
            .chunks
            .iter()
            .map(|chunk| (chunk.cell(), chunk.is_dirty()))
            .collect();
        let mut rebuilt = Vec::new();
        for (cell, entity_dirty) in cells {
            let mesh = self.bridge.get_chunk(cell);
            if entity_dirty || mesh.dirty {
                self.chunks.store_mesh(cell, mesh);
                rebuilt.push(cell);
            }
        }
        rebuilt
    }
}
