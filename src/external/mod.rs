//! Collaborators the assembler core consumes through narrow contracts.
//!
//! The core only depends on the traits in this module. The submodules hold the
//! implementations the `vdjer` binary wires in.

pub mod scorer;
pub mod anchors;
pub mod mapper;

use std::path::Path;

use crate::errors::AssemblyError;

pub use scorer::SeqScorer;
pub use anchors::VjAnchorFinder;
pub use mapper::{ReadCoverageValidator, ReadSeedMapper};

/// The two record-encoded read buffers of a run.
#[derive(Debug, Default, Clone)]
pub struct ReadBuffers {
    /// Reads used to seed roots and to build the graph
    pub aligned: Vec<u8>,

    /// Reads used only to extend the graph
    pub unaligned: Vec<u8>,
}

pub trait ReadSource {
    fn extract(&self) -> Result<ReadBuffers, AssemblyError>;
}

/// Scores a root k-mer against the reference V-region.
pub trait RootScorer: Sync {
    /// Best local alignment score of `query`, or a negative value when there is nothing
    /// to align against.
    fn homology_score(&self, query: &[u8]) -> i32;
}

/// Finds candidate V-J windows in a finished contig.
pub trait WindowFinder: Sync {
    fn find_windows(&self, contig: &[u8]) -> Vec<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedRead {
    /// Index of the read in the read arena
    pub read_ix: usize,

    /// 0-based position of the read start on the contig
    pub start: usize,
    pub len: usize,
    pub reverse: bool,
    pub mismatches: usize,
}

impl MappedRead {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContigMapping {
    pub reads: Vec<MappedRead>,
}

impl ContigMapping {
    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }
}

pub trait ContigMapper: Sync {
    fn map_contig(&self, id: &str, contig: &[u8]) -> Result<ContigMapping, AssemblyError>;

    /// Map every record of a FASTA file, for the final report.
    fn map_contig_file(&self, path: &Path) -> Result<(), AssemblyError>;
}

/// Everything a coverage validator gets to know about a candidate window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageRequest {
    pub read_length: usize,
    pub contig_len: usize,

    /// 1-based inclusive coverage evaluation window
    pub eval_start: usize,
    pub eval_stop: usize,

    pub read_span: usize,
    pub insert_low: usize,
    pub insert_high: usize,
    pub floor: usize,
}

pub trait CoverageValidator: Sync {
    fn is_valid(&self, request: &CoverageRequest, mapping: &ContigMapping) -> bool;
}
