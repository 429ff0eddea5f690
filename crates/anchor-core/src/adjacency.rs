//! Build fixed-width neighbor tables from knowledge-graph triples.
//!
//! Each head entity keeps the first `slots` `(tail, relation)` pairs in triple
//! order; later triples for a full head are dropped. Unused slots and entities
//! without outgoing triples are padded with `(0, 0)`.

use anyhow::{Context, Result};
use std::path::Path;

use crate::ids::{EntityId, RelationId, PAD_ENTITY, PAD_RELATION};
use crate::tables::NeighborTable;

/// A `(head, relation, tail)` triple with 1-based IDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KgTriple {
    pub head: EntityId,
    pub relation: RelationId,
    pub tail: EntityId,
}

impl KgTriple {
    pub const fn new(head: EntityId, relation: RelationId, tail: EntityId) -> Self {
        Self {
            head,
            relation,
            tail,
        }
    }
}

impl NeighborTable {
    /// Build a table with `n_entities` rows (padding row included).
    ///
    /// # Errors
    ///
    /// Fails if a triple references the padding ID or an entity `>= n_entities`.
    pub fn from_triples(triples: &[KgTriple], n_entities: usize, slots: usize) -> Result<Self> {
        anyhow::ensure!(slots > 0, "Neighbor tables need at least one slot");
        anyhow::ensure!(n_entities > 0, "Neighbor tables need the padding row");

        let mut rows: Vec<Vec<(EntityId, RelationId)>> = vec![Vec::new(); n_entities];
        let mut dropped = 0usize;

        for (line, triple) in triples.iter().enumerate() {
            anyhow::ensure!(
                triple.head != PAD_ENTITY
                    && triple.tail != PAD_ENTITY
                    && triple.relation != PAD_RELATION,
                "Triple {} uses the padding id: {:?}",
                line,
                triple
            );
            for id in [triple.head, triple.tail] {
                anyhow::ensure!(
                    (id as usize) < n_entities,
                    "Triple {} references entity {} but the table has {} rows",
                    line,
                    id,
                    n_entities
                );
            }

            let row = &mut rows[triple.head as usize];
            if row.len() < slots {
                row.push((triple.tail, triple.relation));
            } else {
                dropped += 1;
            }
        }

        if dropped > 0 {
            tracing::debug!(dropped, slots, "Dropped triples beyond the neighbor slot limit");
        }

        let mut table = NeighborTable::empty(n_entities, slots);
        for (entity, row) in rows.iter().enumerate().skip(1) {
            table.set_row(entity as EntityId, row);
        }
        Ok(table)
    }
}

/// Read tab-separated `head\trelation\ttail` integer triples.
///
/// Blank lines are skipped.
pub fn load_kg_triples(path: &Path) -> Result<Vec<KgTriple>> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    parse_kg_triples(&contents).with_context(|| format!("Failed to parse triples in {:?}", path))
}

/// Parse triples from text; see [`load_kg_triples`].
pub fn parse_kg_triples(contents: &str) -> Result<Vec<KgTriple>> {
    let mut triples = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        anyhow::ensure!(
            fields.len() == 3,
            "Line {}: expected 3 tab-separated fields, got {}",
            line_no + 1,
            fields.len()
        );
        let parse = |field: &str, what: &str| -> Result<u32> {
            field
                .trim()
                .parse::<u32>()
                .with_context(|| format!("Line {}: invalid {} {:?}", line_no + 1, what, field))
        };
        triples.push(KgTriple::new(
            parse(fields[0], "head")?,
            parse(fields[1], "relation")?,
            parse(fields[2], "tail")?,
        ));
    }
    Ok(triples)
}
