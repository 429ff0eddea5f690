//! Read-only lookup tables shared by the reasoner and the recommender.
//!
//! - [`KnowledgeEmbeddings`]: pretrained entity and relation matrices
//! - [`NeighborTable`]: fixed-width first-order adjacency per entity
//! - [`DocFeatures`]: external content vectors per news item
//!
//! The tables are built once by the loader and handed to the models behind an
//! `Arc`; nothing writes to them afterwards.

use anyhow::Result;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use indexmap::IndexMap;

use crate::backend::{int_tensor_1d, to_host_f32};
use crate::ids::{ids_to_i64, EntityId, ItemId, RelationId, PAD_ENTITY, PAD_RELATION};

// =============================================================================
// Pretrained embeddings
// =============================================================================

/// Pretrained entity and relation embedding matrices.
///
/// Both tables are indexed by 1-based ID; row `0` must be the zero vector so
/// that padding slots embed to nothing.
#[derive(Clone, Debug)]
pub struct KnowledgeEmbeddings<B: Backend> {
    entity: Tensor<B, 2>,
    relation: Tensor<B, 2>,
}

impl<B: Backend> KnowledgeEmbeddings<B> {
    /// Wrap pretrained matrices, enforcing the padding-row invariant.
    ///
    /// # Errors
    ///
    /// Fails if either table is empty, the widths differ, or row `0` of either
    /// table is not all zeros.
    pub fn new(entity: Tensor<B, 2>, relation: Tensor<B, 2>) -> Result<Self> {
        let [n_entities, entity_dim] = entity.dims();
        let [n_relations, relation_dim] = relation.dims();

        anyhow::ensure!(
            n_entities > 0 && n_relations > 0,
            "Embedding tables need at least the padding row (entities={}, relations={})",
            n_entities,
            n_relations
        );
        anyhow::ensure!(
            entity_dim == relation_dim,
            "Entity width {} does not match relation width {}",
            entity_dim,
            relation_dim
        );
        ensure_zero_padding_row(&entity, "entity")?;
        ensure_zero_padding_row(&relation, "relation")?;

        Ok(Self { entity, relation })
    }

    /// Number of entity rows, padding included.
    pub fn n_entities(&self) -> usize {
        self.entity.dims()[0]
    }

    /// Number of relation rows, padding included.
    pub fn n_relations(&self) -> usize {
        self.relation.dims()[0]
    }

    /// Width of the pretrained vectors.
    pub fn dim(&self) -> usize {
        self.entity.dims()[1]
    }

    pub fn device(&self) -> B::Device {
        self.entity.device()
    }

    /// Gather entity rows `[ids.len(), dim]`.
    ///
    /// # Panics
    ///
    /// Panics if any ID is outside the table.
    pub fn entities(&self, ids: &[EntityId]) -> Tensor<B, 2> {
        gather_rows(&self.entity, ids, "entity")
    }

    /// Gather relation rows `[ids.len(), dim]`.
    ///
    /// # Panics
    ///
    /// Panics if any ID is outside the table.
    pub fn relations(&self, ids: &[RelationId]) -> Tensor<B, 2> {
        gather_rows(&self.relation, ids, "relation")
    }
}

fn ensure_zero_padding_row<B: Backend>(table: &Tensor<B, 2>, name: &str) -> Result<()> {
    let dim = table.dims()[1];
    let row = to_host_f32(table.clone().slice([0..1, 0..dim]));
    anyhow::ensure!(
        row.iter().all(|&v| v == 0.0),
        "Row 0 of the {} table is reserved for padding and must be zero",
        name
    );
    Ok(())
}

fn gather_rows<B: Backend>(table: &Tensor<B, 2>, ids: &[u32], name: &str) -> Tensor<B, 2> {
    let n_rows = table.dims()[0];
    if let Some(&bad) = ids.iter().find(|&&id| id as usize >= n_rows) {
        panic!("{} id {} out of range for table with {} rows", name, bad, n_rows);
    }
    let indices = int_tensor_1d::<B>(ids_to_i64(ids), &table.device());
    table.clone().select(0, indices)
}

// =============================================================================
// First-order adjacency
// =============================================================================

/// Fixed-width `(neighbor, relation)` lists per entity, zero padded.
///
/// Row `0` belongs to the padding entity and is always all padding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NeighborTable {
    slots: usize,
    entities: Vec<EntityId>,
    relations: Vec<RelationId>,
}

impl NeighborTable {
    /// Wrap flat row-major `[n_entities, slots]` buffers.
    pub fn from_flat(
        slots: usize,
        entities: Vec<EntityId>,
        relations: Vec<RelationId>,
    ) -> Result<Self> {
        anyhow::ensure!(slots > 0, "Neighbor tables need at least one slot");
        anyhow::ensure!(
            entities.len() == relations.len(),
            "Neighbor entity buffer ({}) and relation buffer ({}) differ in length",
            entities.len(),
            relations.len()
        );
        anyhow::ensure!(
            entities.len() % slots == 0 && !entities.is_empty(),
            "Neighbor buffer of length {} is not a non-empty multiple of {} slots",
            entities.len(),
            slots
        );
        anyhow::ensure!(
            entities[..slots].iter().all(|&e| e == PAD_ENTITY)
                && relations[..slots].iter().all(|&r| r == PAD_RELATION),
            "Neighbor row 0 is reserved for padding and must be empty"
        );
        Ok(Self {
            slots,
            entities,
            relations,
        })
    }

    /// An all-padding table for `n_entities` rows (padding row included).
    pub fn empty(n_entities: usize, slots: usize) -> Self {
        Self {
            slots,
            entities: vec![PAD_ENTITY; n_entities * slots],
            relations: vec![PAD_RELATION; n_entities * slots],
        }
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Number of rows, padding row included.
    pub fn n_entities(&self) -> usize {
        self.entities.len() / self.slots
    }

    /// Neighbor entities and relations of `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` has no row.
    pub fn neighbors(&self, entity: EntityId) -> (&[EntityId], &[RelationId]) {
        let row = entity as usize;
        assert!(
            row < self.n_entities(),
            "entity {} out of range for neighbor table with {} rows",
            entity,
            self.n_entities()
        );
        let span = row * self.slots..(row + 1) * self.slots;
        (&self.entities[span.clone()], &self.relations[span])
    }

    /// Neighbor IDs for a list of entities, flattened to `len * slots`.
    pub fn gather(&self, entities: &[EntityId]) -> (Vec<EntityId>, Vec<RelationId>) {
        let mut out_entities = Vec::with_capacity(entities.len() * self.slots);
        let mut out_relations = Vec::with_capacity(entities.len() * self.slots);
        for &entity in entities {
            let (ents, rels) = self.neighbors(entity);
            out_entities.extend_from_slice(ents);
            out_relations.extend_from_slice(rels);
        }
        (out_entities, out_relations)
    }

    pub(crate) fn set_row(&mut self, entity: EntityId, row: &[(EntityId, RelationId)]) {
        let start = entity as usize * self.slots;
        for (slot, &(e, r)) in row.iter().take(self.slots).enumerate() {
            self.entities[start + slot] = e;
            self.relations[start + slot] = r;
        }
    }
}

// =============================================================================
// Document features
// =============================================================================

/// External content vectors per item, e.g. sentence-encoder output.
#[derive(Clone, Debug)]
pub struct DocFeatures<B: Backend> {
    index: IndexMap<ItemId, usize>,
    features: Tensor<B, 2>,
}

impl<B: Backend> DocFeatures<B> {
    /// Pair a `[n_items, doc_dim]` matrix with the item ID of each row.
    pub fn new(item_ids: Vec<ItemId>, features: Tensor<B, 2>) -> Result<Self> {
        let n_rows = features.dims()[0];
        anyhow::ensure!(
            item_ids.len() == n_rows,
            "Got {} item ids for {} feature rows",
            item_ids.len(),
            n_rows
        );

        let mut index = IndexMap::with_capacity(item_ids.len());
        for (row, item) in item_ids.into_iter().enumerate() {
            if index.insert(item.clone(), row).is_some() {
                anyhow::bail!("Duplicate item id {:?} in document features", item);
            }
        }
        Ok(Self { index, features })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.features.dims()[1]
    }

    pub fn contains(&self, item: &str) -> bool {
        self.index.contains_key(item)
    }

    /// Feature rows for a batch of items `[items.len(), doc_dim]`.
    ///
    /// # Errors
    ///
    /// Fails on the first item without a feature row.
    pub fn batch(&self, items: &[ItemId]) -> Result<Tensor<B, 2>> {
        let rows = items
            .iter()
            .map(|item| {
                self.index
                    .get(item.as_str())
                    .map(|&row| row as i64)
                    .ok_or_else(|| anyhow::anyhow!("No document features for item {:?}", item))
            })
            .collect::<Result<Vec<_>>>()?;
        let indices = int_tensor_1d::<B>(rows, &self.features.device());
        Ok(self.features.clone().select(0, indices))
    }
}
