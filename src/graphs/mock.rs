//! A module containing a mock graph struct useful for creating
//! test graphs in unit tests

use petgraph::graph::{DiGraph, Neighbors, NodeIndex, NodeIndices};
use petgraph::{Incoming, Outgoing};
use rustc_hash::FxHashMap;

use crate::graphs::AssemblyGraph;

pub(crate) type NIx = u32;

#[derive(Debug, Clone)]
pub(crate) struct MockNode {
    pub kmer: Vec<u8>,
    pub frequency: u16,
}

pub(crate) type MockGraph = DiGraph<MockNode, (), NIx>;

impl AssemblyGraph for MockGraph {
    type NodeIndex = NodeIndex<NIx>;

    type NodeIterator<'a> = NodeIndices<NIx>
        where Self: 'a;
    type PredecessorIterator<'a> = Neighbors<'a, (), NIx>
        where Self: 'a;
    type SuccessorIterator<'a> = Neighbors<'a, (), NIx>
        where Self: 'a;

    fn all_nodes(&self) -> Self::NodeIterator<'_> {
        self.node_indices()
    }

    fn node_count(&self) -> usize {
        DiGraph::node_count(self)
    }

    fn edge_count(&self) -> usize {
        DiGraph::edge_count(self)
    }

    fn kmer_size(&self) -> usize {
        self.node_weights().next().map(|n| n.kmer.len()).unwrap_or(0)
    }

    fn predecessors(&self, node: Self::NodeIndex) -> Self::PredecessorIterator<'_> {
        self.neighbors_directed(node, Incoming)
    }

    fn successors(&self, node: Self::NodeIndex) -> Self::SuccessorIterator<'_> {
        self.neighbors_directed(node, Outgoing)
    }

    fn kmer(&self, node: Self::NodeIndex) -> &[u8] {
        &self[node].kmer
    }

    fn frequency(&self, node: Self::NodeIndex) -> u16 {
        self[node].frequency
    }
}

/// Build a graph from `(kmer, frequency)` nodes and edges between them.
///
/// Edges are given in the order successors should be visited; petgraph lists the
/// most recently added edge first, so they are inserted in reverse.
pub(crate) fn build_graph(nodes: &[(&str, u16)], edges: &[(&str, &str)]) -> (MockGraph, FxHashMap<String, NodeIndex<NIx>>) {
    let mut nmap = FxHashMap::default();
    let mut g = MockGraph::default();

    for (kmer, frequency) in nodes {
        let nix = g.add_node(MockNode { kmer: kmer.as_bytes().to_vec(), frequency: *frequency });
        nmap.insert(kmer.to_string(), nix);
    }

    for (s, t) in edges.iter().rev() {
        g.add_edge(nmap[*s], nmap[*t], ());
    }

    (g, nmap)
}

/// Linear path `AACG -> ACGT -> CGTA -> GTAC`, every node seen once.
pub(crate) fn create_linear_graph() -> (MockGraph, FxHashMap<String, NodeIndex<NIx>>) {
    build_graph(
        &[("AACG", 1), ("ACGT", 1), ("CGTA", 1), ("GTAC", 1)],
        &[("AACG", "ACGT"), ("ACGT", "CGTA"), ("CGTA", "GTAC")],
    )
}

/// A root that forks into two dead ends with unequal support.
///
/// ```text
///            /-> CGTA (3) -> GTAA (3)
/// AACG -> ACGT
///            \-> CGTC (1) -> GTCC (1)
/// ```
pub(crate) fn create_fork_graph() -> (MockGraph, FxHashMap<String, NodeIndex<NIx>>) {
    build_graph(
        &[("AACG", 4), ("ACGT", 4), ("CGTA", 3), ("GTAA", 3), ("CGTC", 1), ("GTCC", 1)],
        &[
            ("AACG", "ACGT"),
            ("ACGT", "CGTA"),
            ("ACGT", "CGTC"),
            ("CGTA", "GTAA"),
            ("CGTC", "GTCC"),
        ],
    )
}

/// A root leading into a two-node cycle with no exit.
///
/// ```text
/// TTAC -> TACA <-> ACAC
/// ```
pub(crate) fn create_cycle_graph() -> (MockGraph, FxHashMap<String, NodeIndex<NIx>>) {
    build_graph(
        &[("TTAC", 1), ("TACA", 1), ("ACAC", 1)],
        &[("TTAC", "TACA"), ("TACA", "ACAC"), ("ACAC", "TACA")],
    )
}
