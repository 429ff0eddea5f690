//! Identifier types shared by every crate in the workspace.
//!
//! Entity and relation IDs are 1-based: `0` is the universal padding sentinel
//! meaning "no entity" / "no relation", and row `0` of every embedding table
//! is reserved as a zero vector for it.

/// Index into the shared entity-embedding table. `0` is padding.
pub type EntityId = u32;

/// Index into the shared relation-embedding table. `0` is padding.
pub type RelationId = u32;

/// Opaque news-item identifier (e.g. `"N12345"`).
pub type ItemId = String;

/// Padding sentinel for entity slots.
pub const PAD_ENTITY: EntityId = 0;

/// Padding sentinel for relation slots.
pub const PAD_RELATION: RelationId = 0;

/// Returns `true` for any real (non-padding) entity.
#[inline]
pub const fn is_entity(id: EntityId) -> bool {
    id != PAD_ENTITY
}

/// Convert a slice of IDs into the `i64` layout burn expects for `Int` tensors.
pub fn ids_to_i64<T: Copy + Into<u64>>(ids: &[T]) -> Vec<i64> {
    ids.iter().map(|&id| id.into() as i64).collect()
}
