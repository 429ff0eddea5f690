//! Per-pair reasoning subgraph.
//!
//! Both items' anchor trees are merged into ONE undirected multigraph so that
//! paths can cross from item1's tree into item2's:
//!
//! ```text
//!   item1 ──0── e5 ──r── e6            item2 ──0── e7 ──r── e9
//!     └───0── e7 ──r'── e8                  (shared e7 joins the trees)
//! ```
//!
//! Nodes are interned into dense indices; edges keep their relation ID and
//! parallel edges between the same pair of nodes are all retained.

use anchor_core::ids::{is_entity, EntityId, ItemId, RelationId, PAD_RELATION};
use indexmap::IndexSet;
use std::fmt;

use crate::anchor::AnchorGraph;
use crate::overlap::PairOverlap;

/// A subgraph node: one of the two items, or a knowledge-graph entity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubgraphNode {
    Item(ItemId),
    Entity(EntityId),
}

impl fmt::Display for SubgraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubgraphNode::Item(id) => write!(f, "item:{}", id),
            SubgraphNode::Entity(id) => write!(f, "entity:{}", id),
        }
    }
}

/// An undirected edge between two interned nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubgraphEdge {
    pub a: usize,
    pub b: usize,
    pub relation: RelationId,
}

/// Undirected multigraph over items and entities.
#[derive(Clone, Debug, Default)]
pub struct PairSubgraph {
    nodes: IndexSet<SubgraphNode>,
    edges: Vec<SubgraphEdge>,
    /// `(neighbor, edge index)` per node, in insertion order.
    adjacency: Vec<Vec<(usize, usize)>>,
}

impl PairSubgraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `node`, returning its dense index.
    pub fn add_node(&mut self, node: SubgraphNode) -> usize {
        let (index, inserted) = self.nodes.insert_full(node);
        if inserted {
            self.adjacency.push(Vec::new());
        }
        index
    }

    /// Add an undirected edge. Edges touching the padding entity are dropped.
    ///
    /// Returns the new edge index, or `None` if the edge was dropped.
    pub fn add_edge(
        &mut self,
        a: SubgraphNode,
        b: SubgraphNode,
        relation: RelationId,
    ) -> Option<usize> {
        if is_padding(&a) || is_padding(&b) {
            return None;
        }
        let a = self.add_node(a);
        let b = self.add_node(b);
        let edge = self.edges.len();
        self.edges.push(SubgraphEdge { a, b, relation });
        self.adjacency[a].push((b, edge));
        if a != b {
            self.adjacency[b].push((a, edge));
        }
        Some(edge)
    }

    /// Attach one item's anchor tree: the item to each live hop-0 entity with
    /// relation `0`, then every live parent/child pair with its relation.
    pub fn add_anchor_graph(&mut self, item: &ItemId, graph: &AnchorGraph) {
        for root in graph.roots() {
            self.add_edge(
                SubgraphNode::Item(item.clone()),
                SubgraphNode::Entity(root),
                PAD_RELATION,
            );
        }
        for edge in graph.edges() {
            self.add_edge(
                SubgraphNode::Entity(edge.parent),
                SubgraphNode::Entity(edge.child),
                edge.relation,
            );
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Index of `node`, if present.
    pub fn index_of(&self, node: &SubgraphNode) -> Option<usize> {
        self.nodes.get_index_of(node)
    }

    /// Node at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn node(&self, index: usize) -> &SubgraphNode {
        self.nodes
            .get_index(index)
            .unwrap_or_else(|| {
                panic!("node index {} out of range ({} nodes)", index, self.nodes.len())
            })
    }

    pub fn edge(&self, index: usize) -> &SubgraphEdge {
        &self.edges[index]
    }

    pub fn edges(&self) -> &[SubgraphEdge] {
        &self.edges
    }

    /// `(neighbor, edge index)` incident to `node`. Parallel edges appear once each.
    pub fn neighbors(&self, node: usize) -> &[(usize, usize)] {
        &self.adjacency[node]
    }

    /// Number of edges between `a` and `b` (either direction).
    pub fn edge_multiplicity(&self, a: &SubgraphNode, b: &SubgraphNode) -> usize {
        match (self.index_of(a), self.index_of(b)) {
            (Some(a), Some(b)) => self.adjacency[a].iter().filter(|(n, _)| *n == b).count(),
            _ => 0,
        }
    }
}

fn is_padding(node: &SubgraphNode) -> bool {
    matches!(node, SubgraphNode::Entity(id) if !is_entity(*id))
}

/// Build the merged subgraph for one pair.
pub fn assemble_subgraph(
    item1: &ItemId,
    item2: &ItemId,
    graph1: &AnchorGraph,
    graph2: &AnchorGraph,
) -> PairSubgraph {
    let mut subgraph = PairSubgraph::new();
    subgraph.add_anchor_graph(item1, graph1);
    subgraph.add_anchor_graph(item2, graph2);
    subgraph
}

/// Build subgraphs for a batch; pairs without overlap get `None`.
///
/// # Panics
///
/// Panics if the input slices differ in length.
pub fn assemble_subgraphs(
    items1: &[ItemId],
    items2: &[ItemId],
    graphs1: &[AnchorGraph],
    graphs2: &[AnchorGraph],
    overlap: &[PairOverlap],
) -> Vec<Option<PairSubgraph>> {
    let batch = items1.len();
    assert!(
        items2.len() == batch
            && graphs1.len() == batch
            && graphs2.len() == batch
            && overlap.len() == batch,
        "pair batch inputs disagree on length: items {}/{}, graphs {}/{}, overlap {}",
        items1.len(),
        items2.len(),
        graphs1.len(),
        graphs2.len(),
        overlap.len()
    );

    (0..batch)
        .map(|i| {
            if !overlap[i].has_overlap() {
                return None;
            }
            let subgraph = assemble_subgraph(&items1[i], &items2[i], &graphs1[i], &graphs2[i]);
            tracing::debug!(
                pair = i,
                nodes = subgraph.n_nodes(),
                edges = subgraph.n_edges(),
                "Assembled pair subgraph"
            );
            Some(subgraph)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> SubgraphNode {
        SubgraphNode::Item(id.to_string())
    }

    fn entity(id: EntityId) -> SubgraphNode {
        SubgraphNode::Entity(id)
    }

    #[test]
    fn test_layer0_example_edges() {
        let topk = [2, 1, 1];
        let g1 = AnchorGraph::from_roots(topk, &[5, 7]);
        let g2 = AnchorGraph::from_roots(topk, &[7, 9]);
        let subgraph = assemble_subgraph(&"N1".to_string(), &"N2".to_string(), &g1, &g2);

        assert_eq!(subgraph.n_edges(), 4);
        assert_eq!(subgraph.n_nodes(), 5);
        let edges = [
            (item("N1"), entity(5)),
            (item("N1"), entity(7)),
            (item("N2"), entity(7)),
            (item("N2"), entity(9)),
        ];
        for (a, b) in edges {
            assert_eq!(subgraph.edge_multiplicity(&a, &b), 1, "{} - {}", a, b);
        }
        assert!(subgraph.edges().iter().all(|e| e.relation == 0));
    }

    #[test]
    fn test_parallel_edges_are_kept() {
        let topk = [1, 1, 1];
        let g1 = AnchorGraph::new(topk, [vec![5], vec![6], vec![0]], [vec![], vec![3], vec![]]);
        let g2 = AnchorGraph::new(topk, [vec![5], vec![6], vec![0]], [vec![], vec![4], vec![]]);
        let subgraph = assemble_subgraph(&"a".to_string(), &"b".to_string(), &g1, &g2);

        assert_eq!(subgraph.edge_multiplicity(&entity(5), &entity(6)), 2);
        let relations: Vec<RelationId> = subgraph
            .edges()
            .iter()
            .filter(|e| e.relation != 0)
            .map(|e| e.relation)
            .collect();
        assert_eq!(relations, vec![3, 4]);
    }

    #[test]
    fn test_padding_edges_are_dropped() {
        let mut subgraph = PairSubgraph::new();
        assert_eq!(subgraph.add_edge(item("x"), entity(0), 0), None);
        assert!(subgraph.is_empty());
        assert_eq!(subgraph.n_nodes(), 0);
    }

    #[test]
    fn test_batch_skips_pairs_without_overlap() {
        let topk = [1, 1, 1];
        let roots = |ids: [EntityId; 2]| {
            ids.map(|id| AnchorGraph::from_roots(topk, &[id])).to_vec()
        };
        let graphs1 = roots([1, 2]);
        let graphs2 = roots([1, 3]);
        let overlap: Vec<PairOverlap> = graphs1
            .iter()
            .zip(&graphs2)
            .map(|(a, b)| PairOverlap::from_nodes(&a.flat_nodes(), &b.flat_nodes()))
            .collect();
        let items1 = vec!["a".to_string(), "c".to_string()];
        let items2 = vec!["b".to_string(), "d".to_string()];

        let subgraphs = assemble_subgraphs(&items1, &items2, &graphs1, &graphs2, &overlap);
        assert!(subgraphs[0].is_some());
        assert!(subgraphs[1].is_none());
    }
}
