//! Bounded simple-path enumeration between the two items of a pair.
//!
//! A depth-first walk over [`PairSubgraph`] with an on-path mask; the walk
//! stops at the target and never extends a prefix that could not reach it
//! within `max_edges`. Parallel edges are separate choices, so a path that can
//! use either of two parallel edges is reported once per edge.
//!
//! A reported path keeps its interior entities and the relations of the
//! edges *leaving* the source and each interior node except the last:
//!
//! ```text
//! item1 ─r0─ e7 ─r1─ e8 ─r2─ item2     entities = [e7, e8]
//!                                      relations = [r0, r1]   (r0 == 0, the item edge)
//! ```
//!
//! Each relation is taken from the edge the path actually traverses. Between
//! two nodes joined by parallel edges this differs from a lookup keyed on the
//! node pair alone, which would report the first parallel edge's relation for
//! every such path.

use anchor_core::ids::{EntityId, ItemId, RelationId, PAD_ENTITY, PAD_RELATION};
use serde::{Deserialize, Serialize};

use crate::subgraph::{PairSubgraph, SubgraphNode};

/// Default maximum number of edges on a path, endpoint edges included.
pub const DEFAULT_MAX_PATH_EDGES: usize = 5;

/// Interior of one item-to-item path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningPath {
    pub entities: Vec<EntityId>,
    /// Same length as `entities`.
    pub relations: Vec<RelationId>,
}

impl ReasoningPath {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Paths found for one pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairPaths {
    /// The two anchor graphs share no entity; nothing was enumerated.
    NoOverlap,
    /// Enumeration ran; the list may be empty.
    Found(Vec<ReasoningPath>),
}

impl PairPaths {
    pub fn is_no_overlap(&self) -> bool {
        matches!(self, PairPaths::NoOverlap)
    }

    /// Enumerated paths; empty for [`PairPaths::NoOverlap`].
    pub fn paths(&self) -> &[ReasoningPath] {
        match self {
            PairPaths::NoOverlap => &[],
            PairPaths::Found(paths) => paths,
        }
    }

    /// Entity sequences, with the no-overlap case rendered as the single path `[0]`.
    pub fn node_trace(&self) -> Vec<Vec<EntityId>> {
        match self {
            PairPaths::NoOverlap => vec![vec![PAD_ENTITY]],
            PairPaths::Found(paths) => paths.iter().map(|p| p.entities.clone()).collect(),
        }
    }

    /// Relation sequences, rendered like [`PairPaths::node_trace`].
    pub fn relation_trace(&self) -> Vec<Vec<RelationId>> {
        match self {
            PairPaths::NoOverlap => vec![vec![PAD_RELATION]],
            PairPaths::Found(paths) => paths.iter().map(|p| p.relations.clone()).collect(),
        }
    }
}

/// A full path in subgraph indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubgraphPath {
    /// Node indices, source first and target last.
    pub nodes: Vec<usize>,
    /// Edge indices; `nodes.len() - 1` of them.
    pub edges: Vec<usize>,
}

/// Depth-bounded simple-path search.
#[derive(Clone, Copy, Debug)]
pub struct PathEnumerator {
    max_edges: usize,
}

impl Default for PathEnumerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PATH_EDGES)
    }
}

impl PathEnumerator {
    pub fn new(max_edges: usize) -> Self {
        Self { max_edges }
    }

    pub fn max_edges(&self) -> usize {
        self.max_edges
    }

    /// All simple paths from `source` to `target` with at most `max_edges` edges.
    ///
    /// Empty when either node is missing or `source == target`.
    pub fn simple_paths(
        &self,
        subgraph: &PairSubgraph,
        source: &SubgraphNode,
        target: &SubgraphNode,
    ) -> Vec<SubgraphPath> {
        let (Some(source), Some(target)) = (subgraph.index_of(source), subgraph.index_of(target))
        else {
            return Vec::new();
        };
        if source == target || self.max_edges == 0 {
            return Vec::new();
        }

        let mut on_path = vec![false; subgraph.n_nodes()];
        on_path[source] = true;
        let mut walk = Walk {
            subgraph,
            target,
            max_edges: self.max_edges,
            nodes: vec![source],
            edges: Vec::new(),
            on_path,
            found: Vec::new(),
        };
        walk.extend(source);
        walk.found
    }

    /// Reasoning paths between the two items of a pair.
    pub fn reasoning_paths(
        &self,
        subgraph: &PairSubgraph,
        item1: &ItemId,
        item2: &ItemId,
    ) -> Vec<ReasoningPath> {
        let source = SubgraphNode::Item(item1.clone());
        let target = SubgraphNode::Item(item2.clone());
        self.simple_paths(subgraph, &source, &target)
            .iter()
            .map(|path| to_reasoning_path(subgraph, path))
            .collect()
    }
}

struct Walk<'a> {
    subgraph: &'a PairSubgraph,
    target: usize,
    max_edges: usize,
    nodes: Vec<usize>,
    edges: Vec<usize>,
    on_path: Vec<bool>,
    found: Vec<SubgraphPath>,
}

impl Walk<'_> {
    fn extend(&mut self, current: usize) {
        let subgraph = self.subgraph;
        for &(next, edge) in subgraph.neighbors(current) {
            if self.on_path[next] {
                continue;
            }
            if next == self.target {
                let mut nodes = self.nodes.clone();
                nodes.push(next);
                let mut edges = self.edges.clone();
                edges.push(edge);
                self.found.push(SubgraphPath { nodes, edges });
                continue;
            }
            // A non-target step needs room for at least one more edge
            if self.edges.len() + 2 > self.max_edges {
                continue;
            }

            self.on_path[next] = true;
            self.nodes.push(next);
            self.edges.push(edge);
            self.extend(next);
            self.edges.pop();
            self.nodes.pop();
            self.on_path[next] = false;
        }
    }
}

fn to_reasoning_path(subgraph: &PairSubgraph, path: &SubgraphPath) -> ReasoningPath {
    let interior = &path.nodes[1..path.nodes.len() - 1];
    let entities = interior
        .iter()
        .map(|&index| match subgraph.node(index) {
            SubgraphNode::Entity(id) => *id,
            SubgraphNode::Item(id) => panic!("item {} found inside an item-to-item path", id),
        })
        .collect();
    let relations = path.edges[..interior.len()]
        .iter()
        .map(|&edge| subgraph.edge(edge).relation)
        .collect();
    ReasoningPath {
        entities,
        relations,
    }
}

/// Enumerate paths for a batch of optional subgraphs (`None` = no overlap).
///
/// # Panics
///
/// Panics if the input slices differ in length.
pub fn enumerate_pair_paths(
    enumerator: &PathEnumerator,
    items1: &[ItemId],
    items2: &[ItemId],
    subgraphs: &[Option<PairSubgraph>],
) -> Vec<PairPaths> {
    assert!(
        items1.len() == subgraphs.len() && items2.len() == subgraphs.len(),
        "pair batch inputs disagree on length: items {}/{}, subgraphs {}",
        items1.len(),
        items2.len(),
        subgraphs.len()
    );

    subgraphs
        .iter()
        .enumerate()
        .map(|(i, subgraph)| match subgraph {
            None => PairPaths::NoOverlap,
            Some(subgraph) => {
                let paths = enumerator.reasoning_paths(subgraph, &items1[i], &items2[i]);
                if paths.is_empty() {
                    tracing::warn!(
                        pair = i,
                        item1 = %items1[i],
                        item2 = %items2[i],
                        max_edges = enumerator.max_edges(),
                        "No reasoning path within the edge cutoff"
                    );
                } else {
                    tracing::debug!(pair = i, paths = paths.len(), "Enumerated reasoning paths");
                }
                PairPaths::Found(paths)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::AnchorGraph;
    use crate::subgraph::assemble_subgraph;

    fn ids(a: &str, b: &str) -> (ItemId, ItemId) {
        (a.to_string(), b.to_string())
    }

    #[test]
    fn test_layer0_example_single_path() {
        let topk = [2, 1, 1];
        let (n1, n2) = ids("N1", "N2");
        let subgraph = assemble_subgraph(
            &n1,
            &n2,
            &AnchorGraph::from_roots(topk, &[5, 7]),
            &AnchorGraph::from_roots(topk, &[7, 9]),
        );
        let paths = PathEnumerator::default().reasoning_paths(&subgraph, &n1, &n2);

        assert_eq!(
            paths,
            vec![ReasoningPath {
                entities: vec![7],
                relations: vec![0]
            }]
        );
    }

    #[test]
    fn test_relations_follow_traversed_edges() {
        // item1 - 5 -(r3)- 6 - item2 reached through item2's own tree
        let topk = [1, 1, 1];
        let (a, b) = ids("a", "b");
        let g1 = AnchorGraph::new(topk, [vec![5], vec![6], vec![0]], [vec![], vec![3], vec![]]);
        let g2 = AnchorGraph::from_roots(topk, &[6]);
        let subgraph = assemble_subgraph(&a, &b, &g1, &g2);

        let paths = PathEnumerator::default().reasoning_paths(&subgraph, &a, &b);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].entities, vec![5, 6]);
        assert_eq!(paths[0].relations, vec![0, 3]);
    }

    #[test]
    fn test_parallel_edges_yield_one_path_each() {
        let topk = [1, 1, 1];
        let (a, b) = ids("a", "b");
        let g1 = AnchorGraph::new(topk, [vec![5], vec![6], vec![0]], [vec![], vec![3], vec![]]);
        let g2 = AnchorGraph::new(topk, [vec![6], vec![5], vec![0]], [vec![], vec![4], vec![]]);
        let subgraph = assemble_subgraph(&a, &b, &g1, &g2);

        let mut relation_traces: Vec<Vec<RelationId>> = PathEnumerator::default()
            .reasoning_paths(&subgraph, &a, &b)
            .into_iter()
            .filter(|p| p.entities == vec![5, 6])
            .map(|p| p.relations)
            .collect();
        relation_traces.sort();
        assert_eq!(relation_traces, vec![vec![0, 3], vec![0, 4]]);
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        // Chain of 5 edges: a - 1 - 2 - 3 - 4 - b
        let mut subgraph = PairSubgraph::new();
        let chain = [
            SubgraphNode::Item("a".into()),
            SubgraphNode::Entity(1),
            SubgraphNode::Entity(2),
            SubgraphNode::Entity(3),
            SubgraphNode::Entity(4),
            SubgraphNode::Item("b".into()),
        ];
        for pair in chain.windows(2) {
            subgraph.add_edge(pair[0].clone(), pair[1].clone(), 1);
        }

        let (a, b) = ids("a", "b");
        assert_eq!(PathEnumerator::new(5).reasoning_paths(&subgraph, &a, &b).len(), 1);
        assert!(PathEnumerator::new(4).reasoning_paths(&subgraph, &a, &b).is_empty());
    }

    #[test]
    fn test_same_item_has_no_paths() {
        let topk = [1, 1, 1];
        let a = "a".to_string();
        let g = AnchorGraph::from_roots(topk, &[5]);
        let subgraph = assemble_subgraph(&a, &a, &g, &g);
        assert!(PathEnumerator::default().reasoning_paths(&subgraph, &a, &a).is_empty());
    }

    #[test]
    fn test_sentinel_traces() {
        assert_eq!(PairPaths::NoOverlap.node_trace(), vec![vec![0]]);
        assert_eq!(PairPaths::NoOverlap.relation_trace(), vec![vec![0]]);
        assert!(PairPaths::NoOverlap.paths().is_empty());
        assert!(PairPaths::Found(Vec::new()).node_trace().is_empty());
    }

    #[test]
    fn test_batch_maps_missing_subgraph_to_sentinel() {
        let (a, b) = ids("a", "b");
        let out = enumerate_pair_paths(
            &PathEnumerator::default(),
            &[a.clone(), a],
            &[b.clone(), b],
            &[None, Some(PairSubgraph::new())],
        );
        assert_eq!(out, vec![PairPaths::NoOverlap, PairPaths::Found(Vec::new())]);
    }
}
