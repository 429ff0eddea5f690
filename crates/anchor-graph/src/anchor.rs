//! Anchor-graph construction from sampler output.
//!
//! The upstream sampler delivers, for one side of a pair batch, three hop
//! layers of entity IDs nested as `[layer][item][slot]` (plus a parallel
//! relation array). This module regroups them per item:
//!
//! ```text
//! sampler:  layers[hop][item][slot]   ──►   AnchorGraph { layers[hop][slot] }  (one per item)
//!
//! hop 0:  k0 slots                 anchored directly to the item
//! hop 1:  k0*k1 slots              parent = slot / k1   (in hop 0)
//! hop 2:  k0*k1*k2 slots           parent = slot / k2   (in hop 1)
//! ```
//!
//! A slot is *live* when its entity is non-padding and its parent chain is
//! live. Dead slots may still hold stale IDs in the raw arrays; traversal
//! ([`AnchorGraph::edges`]) never yields them. Set-based views
//! ([`AnchorGraph::flat_nodes`], [`AnchorGraph::entity_set`]) follow the raw
//! arrays and only strip the `0` sentinel.

use anchor_core::config::ANCHOR_LAYERS;
use anchor_core::ids::{is_entity, EntityId, RelationId, PAD_RELATION};
use anchor_core::to_host_i64;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Raw sampler output for one side of a pair batch.
///
/// Both arrays are nested `[layer][item][slot]`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorSample {
    pub entities: Vec<Vec<Vec<EntityId>>>,
    pub relations: Vec<Vec<Vec<RelationId>>>,
}

impl AnchorSample {
    /// Number of items in the batch.
    pub fn batch_size(&self) -> usize {
        self.entities.first().map_or(0, Vec::len)
    }

    /// Copy `[batch, width]` `Int` tensors (one per layer) back to the host.
    ///
    /// # Panics
    ///
    /// Panics if a tensor holds a negative ID.
    pub fn from_tensors<B: Backend>(
        entities: &[Tensor<B, 2, Int>],
        relations: &[Tensor<B, 2, Int>],
    ) -> Self {
        Self {
            entities: entities.iter().map(layer_to_host).collect(),
            relations: relations.iter().map(layer_to_host).collect(),
        }
    }
}

fn layer_to_host<B: Backend>(layer: &Tensor<B, 2, Int>) -> Vec<Vec<u32>> {
    let [batch, width] = layer.dims();
    let flat = to_host_i64(layer.clone());
    (0..batch)
        .map(|i| {
            flat[i * width..(i + 1) * width]
                .iter()
                .map(|&id| u32::try_from(id).expect("anchor ids are non-negative"))
                .collect()
        })
        .collect()
}

/// Edge of an anchor tree, parent to child.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnchorEdge {
    /// Hop layer of the child (`1` or `2`).
    pub hop: usize,
    pub parent: EntityId,
    pub child: EntityId,
    pub relation: RelationId,
}

/// One item's anchor graph, organised by hop layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorGraph {
    topk: [usize; ANCHOR_LAYERS],
    layers: [Vec<EntityId>; ANCHOR_LAYERS],
    relations: [Vec<RelationId>; ANCHOR_LAYERS],
}

impl AnchorGraph {
    /// Build from per-layer slots.
    ///
    /// `relations` may be empty for a layer, meaning "all padding".
    ///
    /// # Panics
    ///
    /// Panics if a layer width is not the product of the `topk` prefix, or a
    /// non-empty relation layer does not match its entity layer.
    pub fn new(
        topk: [usize; ANCHOR_LAYERS],
        layers: [Vec<EntityId>; ANCHOR_LAYERS],
        relations: [Vec<RelationId>; ANCHOR_LAYERS],
    ) -> Self {
        let widths = layer_widths(topk);
        let mut relations = relations;
        for hop in 0..ANCHOR_LAYERS {
            assert_eq!(
                layers[hop].len(),
                widths[hop],
                "anchor layer {} has {} slots, topk {:?} requires {}",
                hop,
                layers[hop].len(),
                topk,
                widths[hop]
            );
            if relations[hop].is_empty() {
                relations[hop] = vec![PAD_RELATION; widths[hop]];
            }
            assert_eq!(
                relations[hop].len(),
                widths[hop],
                "relation layer {} has {} slots, expected {}",
                hop,
                relations[hop].len(),
                widths[hop]
            );
        }
        Self {
            topk,
            layers,
            relations,
        }
    }

    /// Anchor graph with only hop-0 entities; deeper layers are padding.
    pub fn from_roots(topk: [usize; ANCHOR_LAYERS], roots: &[EntityId]) -> Self {
        let widths = layer_widths(topk);
        let mut layer0 = roots.to_vec();
        layer0.resize(widths[0], 0);
        Self::new(
            topk,
            [layer0, vec![0; widths[1]], vec![0; widths[2]]],
            [Vec::new(), Vec::new(), Vec::new()],
        )
    }

    pub fn topk(&self) -> [usize; ANCHOR_LAYERS] {
        self.topk
    }

    /// Entity slots of hop layer `hop`.
    pub fn layer(&self, hop: usize) -> &[EntityId] {
        &self.layers[hop]
    }

    /// Relation slots of hop layer `hop` (relation from parent to the slot).
    pub fn relation_layer(&self, hop: usize) -> &[RelationId] {
        &self.relations[hop]
    }

    /// Slot index of the parent of `(hop, slot)` in layer `hop - 1`.
    ///
    /// # Panics
    ///
    /// Panics for `hop == 0` or when the computed parent is outside the
    /// parent layer.
    pub fn parent_slot(&self, hop: usize, slot: usize) -> usize {
        assert!(hop > 0 && hop < ANCHOR_LAYERS, "hop {} has no parent layer", hop);
        let parent = slot / self.topk[hop];
        assert!(
            parent < self.layers[hop - 1].len(),
            "slot {} of hop {} maps to parent {} outside a layer of {}",
            slot,
            hop,
            parent,
            self.layers[hop - 1].len()
        );
        parent
    }

    /// All slots in layer order, duplicates and padding kept.
    pub fn flat_nodes(&self) -> Vec<EntityId> {
        self.layers.iter().flatten().copied().collect()
    }

    /// Distinct non-padding entities.
    pub fn entity_set(&self) -> BTreeSet<EntityId> {
        self.layers
            .iter()
            .flatten()
            .copied()
            .filter(|&e| is_entity(e))
            .collect()
    }

    /// Live hop-0 entities, in slot order.
    pub fn roots(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.layers[0].iter().copied().filter(|&e| is_entity(e))
    }

    /// Liveness per slot: non-padding with a live parent chain.
    pub fn live_slots(&self) -> [Vec<bool>; ANCHOR_LAYERS] {
        let live0: Vec<bool> = self.layers[0].iter().map(|&e| is_entity(e)).collect();
        let live1 = self.child_liveness(1, &live0);
        let live2 = self.child_liveness(2, &live1);
        [live0, live1, live2]
    }

    fn child_liveness(&self, hop: usize, parent_live: &[bool]) -> Vec<bool> {
        self.layers[hop]
            .iter()
            .enumerate()
            .map(|(slot, &e)| is_entity(e) && parent_live[self.parent_slot(hop, slot)])
            .collect()
    }

    /// Parent-to-child edges between live slots, hop 1 before hop 2.
    pub fn edges(&self) -> Vec<AnchorEdge> {
        let live = self.live_slots();
        let mut edges = Vec::new();
        for hop in 1..ANCHOR_LAYERS {
            for (slot, &child) in self.layers[hop].iter().enumerate() {
                if !live[hop][slot] {
                    continue;
                }
                let parent = self.layers[hop - 1][self.parent_slot(hop, slot)];
                edges.push(AnchorEdge {
                    hop,
                    parent,
                    child,
                    relation: self.relations[hop][slot],
                });
            }
        }
        edges
    }
}

fn layer_widths(topk: [usize; ANCHOR_LAYERS]) -> [usize; ANCHOR_LAYERS] {
    [topk[0], topk[0] * topk[1], topk[0] * topk[1] * topk[2]]
}

/// Regroup sampler output into one [`AnchorGraph`] per item.
///
/// An empty `relations` array means every relation is padding; an empty
/// per-item relation row means the same for that item and layer.
///
/// # Panics
///
/// Panics if the sample does not have exactly three layers, any layer
/// (entity or relation) disagrees on batch size, or a layer width does not
/// match `topk`.
pub fn build_anchor_graphs(
    sample: &AnchorSample,
    topk: [usize; ANCHOR_LAYERS],
) -> Vec<AnchorGraph> {
    assert_eq!(
        sample.entities.len(),
        ANCHOR_LAYERS,
        "anchor sample must have {} entity layers",
        ANCHOR_LAYERS
    );
    assert!(
        sample.relations.is_empty() || sample.relations.len() == ANCHOR_LAYERS,
        "anchor sample must have 0 or {} relation layers, got {}",
        ANCHOR_LAYERS,
        sample.relations.len()
    );

    let batch = sample.batch_size();
    for (hop, layer) in sample.entities.iter().enumerate() {
        assert_eq!(layer.len(), batch, "entity layer {} has a different batch size", hop);
    }
    for (hop, layer) in sample.relations.iter().enumerate() {
        assert_eq!(layer.len(), batch, "relation layer {} has a different batch size", hop);
    }

    (0..batch)
        .map(|item| {
            let layer = |hop: usize| sample.entities[hop][item].clone();
            let relation = |hop: usize| {
                sample
                    .relations
                    .get(hop)
                    .map_or_else(Vec::new, |layer| layer[item].clone())
            };
            AnchorGraph::new(
                topk,
                [layer(0), layer(1), layer(2)],
                [relation(0), relation(1), relation(2)],
            )
        })
        .collect()
}

/// Flattened node lists (duplicates and padding kept), one per item.
pub fn flatten_anchor_graphs(graphs: &[AnchorGraph]) -> Vec<Vec<EntityId>> {
    graphs.iter().map(AnchorGraph::flat_nodes).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_core::{init_cpu_device, int_tensor_1d, CpuBackend};

    const TOPK: [usize; 3] = [2, 2, 1];

    fn sample_graph() -> AnchorGraph {
        // hop0: [5, 0]; hop1: [6, 7 | 8, 9]; hop2: [10, 11, 12, 13]
        AnchorGraph::new(
            TOPK,
            [vec![5, 0], vec![6, 0, 8, 9], vec![10, 11, 12, 13]],
            [vec![], vec![1, 2, 3, 4], vec![5, 6, 7, 8]],
        )
    }

    #[test]
    fn test_parent_slot_arithmetic() {
        let graph = AnchorGraph::new(
            [2, 3, 2],
            [vec![1; 2], vec![1; 6], vec![1; 12]],
            [vec![], vec![], vec![]],
        );
        assert_eq!(graph.parent_slot(1, 0), 0);
        assert_eq!(graph.parent_slot(1, 2), 0);
        assert_eq!(graph.parent_slot(1, 3), 1);
        assert_eq!(graph.parent_slot(2, 5), 2);
        assert_eq!(graph.parent_slot(2, 11), 5);
    }

    #[test]
    fn test_dead_subtrees_are_not_traversed() {
        let edges = sample_graph().edges();
        // Only the subtree under 5 survives: 5-6 (rel 1), then 6-10 (rel 5).
        // Slot 1 of hop1 is padding, so its child 11 is dead too.
        assert_eq!(
            edges,
            vec![
                AnchorEdge { hop: 1, parent: 5, child: 6, relation: 1 },
                AnchorEdge { hop: 2, parent: 6, child: 10, relation: 5 },
            ]
        );
    }

    #[test]
    fn test_entity_set_strips_padding_only() {
        let set = sample_graph().entity_set();
        assert!(!set.contains(&0));
        // Raw values under dead parents still count for set views
        assert!(set.contains(&8));
        assert_eq!(set.len(), 8);
    }

    #[test]
    fn test_build_regroups_layers_per_item() {
        let sample = AnchorSample {
            entities: vec![
                vec![vec![1, 2], vec![3, 0]],
                vec![vec![4, 0, 0, 0], vec![5, 0, 0, 0]],
                vec![vec![0; 4], vec![6, 0, 0, 0]],
            ],
            relations: vec![],
        };
        let graphs = build_anchor_graphs(&sample, TOPK);

        assert_eq!(graphs.len(), 2);
        assert_eq!(graphs[0].layer(0), &[1, 2]);
        assert_eq!(graphs[1].layer(1), &[5, 0, 0, 0]);
        assert_eq!(graphs[1].relation_layer(2), &[0, 0, 0, 0]);
        assert_eq!(
            flatten_anchor_graphs(&graphs)[1],
            vec![3, 0, 5, 0, 0, 0, 6, 0, 0, 0]
        );
    }

    #[test]
    #[should_panic(expected = "relation layer 1 has a different batch size")]
    fn test_short_relation_layer_panics() {
        let sample = AnchorSample {
            entities: vec![
                vec![vec![1, 2], vec![3, 0]],
                vec![vec![4, 0, 0, 0], vec![5, 0, 0, 0]],
                vec![vec![0; 4], vec![0; 4]],
            ],
            relations: vec![
                vec![vec![], vec![]],
                vec![vec![3, 0, 0, 0]],
                vec![vec![0; 4], vec![0; 4]],
            ],
        };
        build_anchor_graphs(&sample, TOPK);
    }

    #[test]
    fn test_from_tensors_regroups_per_item() {
        let device = init_cpu_device();
        let layer = |ids: Vec<i64>, width: usize| -> Tensor<CpuBackend, 2, Int> {
            int_tensor_1d::<CpuBackend>(ids, &device).reshape([2, width])
        };
        let entities = [
            layer(vec![5, 7, 1, 2], 2),
            layer(vec![8, 0, 0, 0, 9, 0, 0, 0], 4),
            layer(vec![0; 8], 4),
        ];
        let relations = [
            layer(vec![0; 4], 2),
            layer(vec![1, 0, 0, 0, 2, 0, 0, 0], 4),
            layer(vec![0; 8], 4),
        ];
        let sample = AnchorSample::from_tensors(&entities, &relations);

        assert_eq!(sample.batch_size(), 2);
        assert_eq!(sample.entities[0], vec![vec![5, 7], vec![1, 2]]);
        assert_eq!(sample.relations[1][1], vec![2, 0, 0, 0]);

        let graphs = build_anchor_graphs(&sample, TOPK);
        let edges = graphs[1].edges();
        assert_eq!(edges.len(), 1);
        assert_eq!((edges[0].parent, edges[0].child, edges[0].relation), (1, 9, 2));
    }

    #[test]
    #[should_panic(expected = "requires")]
    fn test_wrong_layer_width_panics() {
        AnchorGraph::new(TOPK, [vec![1, 2], vec![1], vec![0; 4]], [vec![], vec![], vec![]]);
    }

    #[test]
    fn test_from_roots_pads() {
        let graph = AnchorGraph::from_roots(TOPK, &[7]);
        assert_eq!(graph.layer(0), &[7, 0]);
        assert!(graph.edges().is_empty());
        assert_eq!(graph.roots().collect::<Vec<_>>(), vec![7]);
    }
}
