pub mod pretable;
pub mod kmer_graph;

#[cfg(test)]
pub(crate) mod mock;

use std::fmt::Debug;
use std::hash::Hash;

use petgraph::graph::IndexType;

pub trait NodeIndexType: Copy + Hash + PartialOrd + Ord + PartialEq + Eq + Debug + Send + Sync {
    fn index(&self) -> usize;
}

impl<T: IndexType + Send + Sync> NodeIndexType for petgraph::graph::NodeIndex<T> {
    #[inline(always)]
    fn index(&self) -> usize {
        petgraph::graph::NodeIndex::index(*self)
    }
}

/// Read-only view of a k-mer graph, as used by root discovery and contig enumeration.
///
/// Successor order is significant: the first successor is the one a contig continues
/// into, every further successor spawns a branch.
pub trait AssemblyGraph {
    type NodeIndex: NodeIndexType;
    type NodeIterator<'a>: Iterator<Item=Self::NodeIndex> + 'a
        where Self: 'a;
    type PredecessorIterator<'a>: Iterator<Item=Self::NodeIndex> + 'a
        where Self: 'a;
    type SuccessorIterator<'a>: Iterator<Item=Self::NodeIndex> + 'a
        where Self: 'a;

    fn all_nodes(&self) -> Self::NodeIterator<'_>;
    fn node_count(&self) -> usize;
    fn edge_count(&self) -> usize;
    fn kmer_size(&self) -> usize;

    fn predecessors(&self, node: Self::NodeIndex) -> Self::PredecessorIterator<'_>;
    fn successors(&self, node: Self::NodeIndex) -> Self::SuccessorIterator<'_>;

    fn in_degree(&self, node: Self::NodeIndex) -> usize {
        self.predecessors(node).count()
    }

    fn out_degree(&self, node: Self::NodeIndex) -> usize {
        self.successors(node).count()
    }

    fn kmer(&self, node: Self::NodeIndex) -> &[u8];
    fn frequency(&self, node: Self::NodeIndex) -> u16;

    fn kmer_string(&self, node: Self::NodeIndex) -> String {
        String::from_utf8_lossy(self.kmer(node)).into_owned()
    }
}
