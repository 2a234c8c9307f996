//! The k-mer graph built from admitted k-mers.
//!
//! Nodes never own their k-mer text; they borrow it from the read buffers in a
//! [`ReadArena`](crate::reads::ReadArena), which therefore has to outlive the graph.
//! Once built, the graph is only read, which is what allows the enumeration workers
//! to share it without locking.

use petgraph::graph::{DiGraph, NodeIndex, NodeIndices, Neighbors};
use petgraph::{Incoming, Outgoing};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::errors::{AssemblyError, AssemblyStatus};
use crate::graphs::pretable::{AdmissionFilter, MAX_FREQUENCY};
use crate::graphs::AssemblyGraph;
use crate::reads::{Record, RecordBuffer};

pub type KmerNodeIndex = NodeIndex<u32>;

#[derive(Debug, Clone, Copy)]
pub struct KmerNode<'a> {
    pub kmer: &'a [u8],
    pub frequency: u16,
}

impl<'a> KmerNode<'a> {
    fn new(kmer: &'a [u8]) -> Self {
        KmerNode { kmer, frequency: 1 }
    }

    fn increment_frequency(&mut self) {
        if self.frequency < MAX_FREQUENCY {
            self.frequency += 1;
        }
    }
}

pub type KmerGraphType<'a> = DiGraph<KmerNode<'a>, (), u32>;

pub struct KmerGraph<'a> {
    pub graph: KmerGraphType<'a>,
    index: FxHashMap<&'a [u8], KmerNodeIndex>,
    kmer_size: usize,
    max_nodes: usize,
}

impl<'a> KmerGraph<'a> {
    pub fn new(kmer_size: usize, max_nodes: usize) -> Self {
        KmerGraph {
            graph: KmerGraphType::default(),
            index: FxHashMap::default(),
            kmer_size,
            max_nodes,
        }
    }

    pub fn get_node(&self, kmer: &[u8]) -> Option<KmerNodeIndex> {
        self.index.get(kmer).copied()
    }

    /// Fetch the node for a k-mer, creating it on first sight. Repeated sightings
    /// bump the node frequency.
    pub fn fetch_or_create(&mut self, kmer: &'a [u8]) -> Result<KmerNodeIndex, AssemblyError> {
        if let Some(&ix) = self.index.get(kmer) {
            self.graph[ix].increment_frequency();
            return Ok(ix);
        }

        if self.graph.node_count() >= self.max_nodes {
            return Err(AssemblyError::Capacity(AssemblyStatus::TooManyNodes));
        }

        let ix = self.graph.add_node(KmerNode::new(kmer));
        self.index.insert(kmer, ix);

        Ok(ix)
    }

    /// Add an edge between two nodes, unless one already exists.
    pub fn link(&mut self, from: KmerNodeIndex, to: KmerNodeIndex) {
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, ());
        }
    }

    /// Walk the k-mer windows of a read and thread admitted k-mers into the graph.
    ///
    /// Consecutive admitted windows are linked; a window that is not admitted breaks
    /// the chain, so the next admitted window starts fresh.
    pub fn add_read(&mut self, record: Record<'a>, filter: &AdmissionFilter<'_>) -> Result<(), AssemblyError> {
        let k = self.kmer_size;
        if record.sequence.len() < k {
            return Ok(());
        }

        let mut prev = None;
        for kmer in record.sequence.windows(k) {
            if !filter.admit(kmer) {
                prev = None;
                continue;
            }

            let curr = self.fetch_or_create(kmer)?;
            if let Some(p) = prev {
                self.link(p, curr);
            }

            prev = Some(curr);
        }

        Ok(())
    }

    pub fn add_reads(&mut self, reads: &'a RecordBuffer, filter: &AdmissionFilter<'_>) -> Result<(), AssemblyError> {
        for (ix, record) in reads.records().enumerate() {
            self.add_read(record, filter)?;

            if (ix + 1) % 1_000_000 == 0 {
                info!(records = ix + 1, "graph build progress");
            }
        }

        debug!(reads = reads.len(), nodes = self.graph.node_count(), "Graph build pass done");

        Ok(())
    }
}

impl<'a> AssemblyGraph for KmerGraph<'a> {
    type NodeIndex = KmerNodeIndex;
    type NodeIterator<'b> = NodeIndices<u32>
        where Self: 'b;
    type PredecessorIterator<'b> = Neighbors<'b, (), u32>
        where Self: 'b;
    type SuccessorIterator<'b> = Neighbors<'b, (), u32>
        where Self: 'b;

    fn all_nodes(&self) -> Self::NodeIterator<'_> {
        self.graph.node_indices()
    }

    fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn kmer_size(&self) -> usize {
        self.kmer_size
    }

    fn predecessors(&self, node: Self::NodeIndex) -> Self::PredecessorIterator<'_> {
        self.graph.neighbors_directed(node, Incoming)
    }

    fn successors(&self, node: Self::NodeIndex) -> Self::SuccessorIterator<'_> {
        self.graph.neighbors_directed(node, Outgoing)
    }

    fn kmer(&self, node: Self::NodeIndex) -> &[u8] {
        self.graph[node].kmer
    }

    fn frequency(&self, node: Self::NodeIndex) -> u16 {
        self.graph[node].frequency
    }
}
