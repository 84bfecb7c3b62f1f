//! Spatial partition of the world into fixed-size chunk cells.
//!
//! Chunks are owned collections behind the engine lock; observers see
//! them only through snapshots and cloned mesh descriptors. A chunk
//! tracks the set of entity ids located inside it, the latest render
//! mesh fetched from the core, and a dirty flag raised when an entity
//! enters or leaves and cleared when the mesh is rebuilt. Voxel edits
//! are signalled by the core itself, on the descriptor it hands back.

use std::collections::{BTreeMap, BTreeSet};

use lode_core::{CellCoord, Dims, EntityId, MeshDescriptor};

// ── Chunk ────────────────────────────────────────────────────────

/// One fixed-size cubic cell of the world.
#[derive(Debug)]
pub struct Chunk {
    cell: CellCoord,
    entities: BTreeSet<EntityId>,
    dirty: bool,
    mesh: MeshDescriptor,
}

impl Chunk {
    fn new(cell: CellCoord) -> Self {
        Self {
            cell,
            entities: BTreeSet::new(),
            // A fresh chunk has no mesh yet, so it starts dirty.
            dirty: true,
            mesh: MeshDescriptor::default(),
        }
    }

    /// The chunk's cell coordinate.
    pub fn cell(&self) -> CellCoord {
        self.cell
    }

    /// Ids of entities currently located in this chunk.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter().copied()
    }

    /// Whether `id` is indexed in this chunk.
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains(&id)
    }

    /// Whether the chunk's mesh is stale.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The latest rebuilt mesh.
    pub fn mesh(&self) -> &MeshDescriptor {
        &self.mesh
    }
}

// ── ChunkStore ───────────────────────────────────────────────────

/// All chunks of the current world, keyed by cell coordinate.
#[derive(Debug, Default)]
pub struct ChunkStore {
    dims: Dims,
    chunks: BTreeMap<CellCoord, Chunk>,
}

impl ChunkStore {
    /// Create an empty store with zero dimensions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current world dimensions.
    pub fn dims(&self) -> Dims {
        self.dims
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the store holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Re-establish world dimensions: create chunks for newly
    /// in-range cells, discard chunks now out of range (dropping
    /// their meshes), and leave surviving chunks intact.
    pub fn resize(&mut self, new_dims: Dims) {
        self.chunks.retain(|&cell, _| new_dims.contains(cell));
        for cell in new_dims.cells() {
            self.chunks.entry(cell).or_insert_with(|| Chunk::new(cell));
        }
        self.dims = new_dims;
    }

    /// Register entity `id` in `cell`, marking the cell dirty if the
    /// id was not already indexed there.
    ///
    /// An out-of-range cell is logged and ignored; the registry keeps
    /// the entity, it just has no spatial index entry.
    pub fn index(&mut self, cell: CellCoord, id: EntityId) {
        match self.chunks.get_mut(&cell) {
            Some(chunk) => {
                if chunk.entities.insert(id) {
                    chunk.dirty = true;
                }
            }
            None => {
                log::warn!(target: "lode::chunks", "entity {id} at out-of-range cell {cell}");
            }
        }
    }

    /// Deregister entity `id` from `cell` and mark the cell dirty.
    pub fn deindex(&mut self, cell: CellCoord, id: EntityId) {
        match self.chunks.get_mut(&cell) {
            Some(chunk) => {
                if chunk.entities.remove(&id) {
                    chunk.dirty = true;
                } else {
                    log::warn!(target: "lode::chunks", "entity {id} was not indexed in {cell}");
                }
            }
            None => {
                log::warn!(target: "lode::chunks", "deindex of {id} from out-of-range cell {cell}");
            }
        }
    }

    /// Raise the dirty flag for `cell`.
    pub fn mark_dirty(&mut self, cell: CellCoord) {
        if let Some(chunk) = self.chunks.get_mut(&cell) {
            chunk.dirty = true;
        }
    }

    /// Cells whose mesh is stale, in coordinate order.
    pub fn dirty_cells(&self) -> Vec<CellCoord> {
        self.chunks
            .values()
            .filter(|c| c.dirty)
            .map(|c| c.cell)
            .collect()
    }

    /// Store a freshly built mesh for `cell` and clear its dirty
    /// flag.
    pub fn store_mesh(&mut self, cell: CellCoord, mesh: MeshDescriptor) {
        if let Some(chunk) = self.chunks.get_mut(&cell) {
            chunk.mesh = mesh;
            chunk.dirty = false;
        }
    }

    /// The chunk at `cell`, if in range.
    pub fn get(&self, cell: CellCoord) -> Option<&Chunk> {
        self.chunks.get(&cell)
    }

    /// Iterate all chunks in coordinate order.
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_creates_and_discards() {
        let mut store = ChunkStore::new();
        store.resize(Dims::new(4, 4, 4));
        assert_eq!(store.len(), 64);
        assert!(store.iter().all(Chunk::is_dirty));

        // Shrink: out-of-range chunks are discarded.
        store.resize(Dims::new(2, 2, 2));
        assert_eq!(store.len(), 8);
        assert!(store.get(CellCoord::new(3, 3, 3)).is_none());
    }

    #[test]
    fn resize_preserves_survivors() {
        let mut store = ChunkStore::new();
        store.resize(Dims::new(2, 2, 2));
        let cell = CellCoord::new(0, 0, 0);
        let id = EntityId::from_u128(1);
        store.index(cell, id);
        store.store_mesh(cell, MeshDescriptor::default());

        store.resize(Dims::new(3, 3, 3));
        let chunk = store.get(cell).unwrap();
        assert!(chunk.contains(id));
        assert!(!chunk.is_dirty());
    }

    #[test]
    fn index_and_deindex_toggle_dirty() {
        let mut store = ChunkStore::new();
        store.resize(Dims::new(1, 1, 1));
        let cell = CellCoord::new(0, 0, 0);
        let id = EntityId::from_u128(2);
        store.store_mesh(cell, MeshDescriptor::default());
        assert!(store.dirty_cells().is_empty());

        store.index(cell, id);
        assert_eq!(store.dirty_cells(), vec![cell]);

        store.store_mesh(cell, MeshDescriptor::default());
        store.deindex(cell, id);
        assert_eq!(store.dirty_cells(), vec![cell]);
        assert!(!store.get(cell).unwrap().contains(id));
    }

    #[test]
    fn reindexing_same_entity_keeps_chunk_clean() {
        let mut store = ChunkStore::new();
        store.resize(Dims::new(1, 1, 1));
        let cell = CellCoord::new(0, 0, 0);
        let id = EntityId::from_u128(4);
        store.index(cell, id);
        store.store_mesh(cell, MeshDescriptor::default());

        // An in-place update re-indexes the same id in the same cell;
        // the mesh has not gone stale.
        store.index(cell, id);
        assert!(store.dirty_cells().is_empty());
    }

    #[test]
    fn out_of_range_index_is_absorbed() {
        let mut store = ChunkStore::new();
        store.resize(Dims::new(1, 1, 1));
        store.index(CellCoord::new(5, 0, 0), EntityId::from_u128(3));
        assert_eq!(store.len(), 1);
        assert!(store.get(CellCoord::new(5, 0, 0)).is_none());
    }
}
