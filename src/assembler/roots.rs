//! Selection of the nodes contig enumeration starts from.
//!
//! Nodes without incoming edges over-count fragment starts, since every sequencing gap
//! leaves one behind. [`traceback`] walks each candidate back along its unique
//! predecessor chain to the nearest branch point or true source, and keeps the result
//! only when it shares a sub-k-mer with the reference V-region.

use rustc_hash::FxHashSet;
use tracing::{debug, info, trace};

use crate::graphs::AssemblyGraph;

/// All overlapping substrings of a fixed length from a single reference sequence.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    seed_len: usize,
    seeds: FxHashSet<Vec<u8>>,
}

impl ReferenceIndex {
    pub fn new(reference: &[u8], seed_len: usize) -> Self {
        let seeds = if seed_len > 1 {
            reference.windows(seed_len)
                .map(|w| w.to_ascii_uppercase())
                .collect()
        } else {
            FxHashSet::default()
        };

        debug!(seed_len, seeds = seeds.len(), "Built reference homology index");

        ReferenceIndex { seed_len, seeds }
    }

    /// An index that lets every k-mer through.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.seed_len > 1
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    pub fn has_homology(&self, kmer: &[u8]) -> bool {
        if !self.is_enabled() {
            return true;
        }

        kmer.windows(self.seed_len)
            .any(|w| self.seeds.contains(w))
    }
}

/// Every node without incoming edges.
///
/// A node whose only incoming edge is a self-loop is not a root; enumeration's repeat
/// handling deals with it.
pub fn identify_roots<G: AssemblyGraph>(graph: &G) -> Vec<G::NodeIndex> {
    let mut roots = Vec::new();
    let mut self_roots = 0;

    for node in graph.all_nodes() {
        let mut preds = graph.predecessors(node);
        match (preds.next(), preds.next()) {
            (None, _) => {
                trace!(frequency = graph.frequency(node), kmer = %graph.kmer_string(node), "ROOT_INIT");
                roots.push(node);
            },
            (Some(p), None) if p == node => {
                debug!(kmer = %graph.kmer_string(node), "SELF_ROOT");
                self_roots += 1;
            },
            _ => (),
        }
    }

    info!(root_candidates = roots.len(), self_roots, "Identified root candidates");

    roots
}

/// Follow unique predecessors back from `node`, at most `max_hops` steps.
pub fn walk_back<G: AssemblyGraph>(graph: &G, node: G::NodeIndex, max_hops: usize) -> (G::NodeIndex, usize) {
    let mut curr = node;
    let mut hops = 0;

    while hops < max_hops {
        let mut preds = graph.predecessors(curr);
        match (preds.next(), preds.next()) {
            (Some(p), None) => {
                curr = p;
                hops += 1;
            },
            _ => break,
        }
    }

    (curr, hops)
}

/// Trace root candidates back to their true start and filter by reference homology.
///
/// Each resulting node is kept at most once; candidates failing the homology test are
/// dropped.
pub fn traceback<G: AssemblyGraph>(
    graph: &G,
    candidates: &[G::NodeIndex],
    index: &ReferenceIndex,
    max_hops: usize,
) -> Vec<G::NodeIndex> {
    let mut roots = Vec::new();
    let mut seen: FxHashSet<&[u8]> = FxHashSet::default();
    let mut filtered = 0usize;

    for candidate in candidates {
        let (node, hops) = walk_back(graph, *candidate, max_hops);
        trace!(hops, "Traceback dist");

        let kmer = graph.kmer(node);
        if seen.contains(kmer) {
            continue;
        }

        if index.has_homology(kmer) {
            debug!(frequency = graph.frequency(node), kmer = %graph.kmer_string(node), "ROOT_NODE");
            seen.insert(kmer);
            roots.push(node);
        } else {
            debug!(frequency = graph.frequency(node), kmer = %graph.kmer_string(node), "FILTERED_NODE");
            filtered += 1;
        }
    }

    info!(roots = roots.len(), filtered, "Root traceback done");

    roots
}
