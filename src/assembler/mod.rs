//! End-to-end orchestration of one assembly run.
//!
//! The graph is built single-threaded and is never mutated once root traceback starts.
//! Enumeration workers then share it read-only, emitting into the window stage.

pub mod roots;
pub mod contig;
pub mod enumerate;
pub mod driver;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::config::{AssemblerConfig, GraphParams};
use crate::errors::AssemblyError;
use crate::external::{ContigMapper, CoverageValidator, RootScorer, WindowFinder};
use crate::graphs::kmer_graph::{KmerGraph, KmerNodeIndex};
use crate::graphs::pretable::PreTable;
use crate::graphs::AssemblyGraph;
use crate::io::dump_graph;
use crate::reads::ReadArena;
use crate::windows::WindowStage;

use self::driver::EnumerationDriver;
use self::roots::{identify_roots, traceback, ReferenceIndex};

pub const GRAPH_DUMP: &str = "graph.dot";

/// A built graph together with the root candidates seen after the aligned-read pass.
pub struct GraphBuild<'a> {
    pub graph: KmerGraph<'a>,
    pub root_candidates: Vec<KmerNodeIndex>,
    pub admitted_kmers: usize,
}

/// Build the k-mer graph from both read categories.
///
/// All reads go through the pre-table first. Root candidates are taken after the
/// aligned reads are threaded into the graph, before the unaligned reads extend it.
pub fn build_graph<'a>(arena: &'a ReadArena, params: &GraphParams) -> Result<GraphBuild<'a>, AssemblyError> {
    let filter = {
        let mut table = PreTable::new(params.clone());
        table.add_reads(&arena.aligned)?;
        table.add_reads(&arena.unaligned)?;
        info!(pre_nodes = table.len(), "Pre-table built");

        table.prune()
    };

    let mut graph = KmerGraph::new(params.kmer_size, params.max_nodes);
    graph.add_reads(&arena.aligned, &filter)?;
    let root_candidates = identify_roots(&graph);

    graph.add_reads(&arena.unaligned, &filter)?;
    info!(nodes = graph.node_count(), edges = graph.edge_count(), "Graph built");

    Ok(GraphBuild {
        graph,
        root_candidates,
        admitted_kmers: filter.len(),
    })
}

/// The collaborators a run consumes.
#[derive(Clone, Copy)]
pub struct Collaborators<'c> {
    pub scorer: &'c dyn RootScorer,
    pub finder: &'c dyn WindowFinder,
    pub mapper: &'c dyn ContigMapper,
    pub validator: &'c dyn CoverageValidator,
}

#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub output_dir: PathBuf,
    pub dump_graph: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub aligned_reads: usize,
    pub unaligned_reads: usize,
    pub admitted_kmers: usize,
    pub nodes: usize,
    pub edges: usize,
    pub root_candidates: usize,
    pub roots: usize,
    pub roots_enumerated: usize,
    pub roots_skipped: usize,
    pub roots_truncated: usize,
    pub roots_failed: usize,
    pub contigs_emitted: usize,
    pub contigs_searched: usize,
    pub candidate_windows: usize,
    pub accepted_windows: usize,
    pub windows_file: Option<PathBuf>,
    pub elapsed_secs: f64,
}

pub fn write_graph_dump<G: AssemblyGraph>(graph: &G, output_dir: &Path) -> Result<PathBuf, AssemblyError> {
    let path = output_dir.join(GRAPH_DUMP);
    let mut writer = BufWriter::new(File::create(&path)?);
    dump_graph(graph, &mut writer)?;

    info!(path = %path.display(), "Wrote graph");

    Ok(path)
}

pub struct Assembler<'c> {
    config: &'c AssemblerConfig,
    reference: &'c ReferenceIndex,
    collaborators: Collaborators<'c>,
}

impl<'c> Assembler<'c> {
    pub fn new(config: &'c AssemblerConfig, reference: &'c ReferenceIndex, collaborators: Collaborators<'c>) -> Self {
        Assembler { config, reference, collaborators }
    }

    /// Assemble the reads in `arena` and write the accepted windows to the output
    /// directory.
    pub fn run(&self, arena: &ReadArena, output: &OutputOptions) -> Result<RunSummary, AssemblyError> {
        let start = Instant::now();
        let config = self.config;

        info!(
            aligned = arena.aligned.len(),
            unaligned = arena.unaligned.len(),
            kmer_size = config.graph.kmer_size,
            "Assembling"
        );

        let GraphBuild { graph, root_candidates, admitted_kmers } = build_graph(arena, &config.graph)?;

        let roots = traceback(&graph, &root_candidates, self.reference, config.roots.traceback_max_hops);

        if output.dump_graph {
            write_graph_dump(&graph, &output.output_dir)?;
        }

        let stage = WindowStage::new(
            config.windows.clone(),
            config.graph.read_length,
            self.collaborators.finder,
            self.collaborators.mapper,
            self.collaborators.validator,
        );

        let driver = EnumerationDriver::new(
            &graph,
            self.collaborators.scorer,
            &stage,
            &config.enumeration,
            &config.driver,
            config.roots.min_homology_score,
        );
        let report = driver.run(&roots)?;

        let windows_file = stage.write_output(&output.output_dir)?;
        let counts = stage.counts();

        let summary = RunSummary {
            aligned_reads: arena.aligned.len(),
            unaligned_reads: arena.unaligned.len(),
            admitted_kmers,
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            root_candidates: root_candidates.len(),
            roots: roots.len(),
            roots_enumerated: report.roots_enumerated,
            roots_skipped: report.roots_skipped,
            roots_truncated: report.roots_truncated,
            roots_failed: report.failures.len(),
            contigs_emitted: report.contigs_emitted,
            contigs_searched: counts.contigs_searched,
            candidate_windows: counts.candidate_windows,
            accepted_windows: counts.accepted_windows,
            windows_file: Some(windows_file),
            elapsed_secs: start.elapsed().as_secs_f64(),
        };

        info!(
            nodes = summary.nodes,
            roots = summary.roots,
            contigs = summary.contigs_emitted,
            windows = summary.accepted_windows,
            elapsed_secs = summary.elapsed_secs,
            "Done assembling"
        );

        Ok(summary)
    }
}
