//! Run parameters for an assembly.
//!
//! Parameters are grouped by the component that consumes them, so each stage only
//! receives the part of the configuration it needs.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::errors::AssemblyError;

/// Upper bound for accumulated per-position quality sums.
pub const MAX_QUAL_SUM: u8 = 255;

/// Longest k-mer the pre-table accepts.
pub const MAX_KMER_LEN: usize = 50;

/// Immunoglobulin chain being assembled.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Chain {
    #[value(name = "IGH")]
    Igh,
    #[value(name = "IGK")]
    Igk,
    #[value(name = "IGL")]
    Igl,
}

impl Chain {
    /// Conserved J amino acid and the allowed V-J window length for this chain.
    pub fn anchor_defaults(&self) -> (u8, usize, usize) {
        match self {
            Self::Igh => (b'W', 10, 90),
            Self::Igk | Self::Igl => (b'F', 0, 60),
        }
    }
}

/// What to do when enumeration from a root ends with a fatal status.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop the whole run and exit with the status code
    #[default]
    Abort,

    /// Log the failed root and keep going with the others
    PerRoot,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphParams {
    pub read_length: usize,
    pub kmer_size: usize,
    pub min_node_freq: u16,
    /// Minimum accumulated quality at every k-mer position
    pub min_base_quality: u8,
    /// Minimum single-observation base quality for a k-mer window to be counted
    pub min_kmer_base_quality: u8,
    pub max_nodes: usize,
}

impl Default for GraphParams {
    fn default() -> Self {
        GraphParams {
            read_length: 100,
            kmer_size: 35,
            min_node_freq: 3,
            min_base_quality: 90,
            min_kmer_base_quality: 20,
            max_nodes: 900_000_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnumerationLimits {
    pub min_contig_score: f64,
    pub max_node_visits: u32,
    pub max_contigs: usize,
    pub max_paths_from_root: usize,
    pub max_contig_len: usize,
    /// Abort a root's search on its first repeat
    pub stop_on_repeat: bool,
    /// Probe mode: hold finished contigs instead of emitting them
    pub hold_output: bool,
}

impl GraphParams {
    /// Check graph construction parameters, clamping the accumulated base quality the
    /// same way the quality sums saturate.
    pub fn validate(mut self) -> Result<Self, AssemblyError> {
        if self.min_base_quality == MAX_QUAL_SUM {
            self.min_base_quality = MAX_QUAL_SUM - 1;
        }

        if self.kmer_size == 0 || self.kmer_size > MAX_KMER_LEN {
            return Err(AssemblyError::InvalidConfig(
                format!("k-mer size must be between 1 and {MAX_KMER_LEN}, got {}", self.kmer_size)));
        }

        if self.kmer_size > self.read_length {
            return Err(AssemblyError::InvalidConfig(
                format!("k-mer size ({}) exceeds read length ({})", self.kmer_size, self.read_length)));
        }

        Ok(self)
    }
}

impl Default for EnumerationLimits {
    fn default() -> Self {
        EnumerationLimits {
            min_contig_score: -5.0,
            max_node_visits: 5,
            max_contigs: 50_000_000,
            max_paths_from_root: 500_000_000,
            max_contig_len: 600,
            stop_on_repeat: false,
            hold_output: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RootParams {
    pub traceback_max_hops: usize,
    /// Sub-k-mer length of the reference homology index. Values <= 1 disable the check.
    pub seed_len: usize,
    pub min_homology_score: i32,
}

impl Default for RootParams {
    fn default() -> Self {
        RootParams {
            traceback_max_hops: 300,
            seed_len: 15,
            min_homology_score: 30,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriverParams {
    pub threads: usize,
    pub roots_per_batch: usize,
    pub heartbeat_secs: u64,
    pub failure_policy: FailurePolicy,
}

impl Default for DriverParams {
    fn default() -> Self {
        DriverParams {
            threads: 1,
            roots_per_batch: 10,
            heartbeat_secs: 300,
            failure_policy: FailurePolicy::Abort,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowParams {
    pub min_contig_len: usize,
    /// 1-based first position of the coverage eval window
    pub eval_start: usize,
    /// 1-based last position of the coverage eval window
    pub eval_stop: usize,
    pub read_span: usize,
    pub insert_len: usize,
    pub read_floor: usize,
}

impl Default for WindowParams {
    fn default() -> Self {
        WindowParams {
            min_contig_len: 500,
            eval_start: 52,
            eval_stop: 411,
            read_span: 35,
            insert_len: 0,
            read_floor: 1,
        }
    }
}

impl WindowParams {
    /// Range of a candidate window that is kept once the window is accepted.
    pub fn trimmed_range(&self, window_len: usize) -> std::ops::Range<usize> {
        let start = self.eval_start.saturating_sub(1).min(window_len);
        let end = self.eval_stop.min(window_len);

        start..end
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchorParams {
    pub anchor_len: usize,
    pub max_mismatches: u32,
    pub min_window: usize,
    pub max_window: usize,
    pub j_conserved: u8,
    pub window_span: usize,
    pub j_extension: usize,
}

impl Default for AnchorParams {
    fn default() -> Self {
        let (j_conserved, min_window, max_window) = Chain::Igh.anchor_defaults();

        AnchorParams {
            anchor_len: 15,
            max_mismatches: 4,
            min_window,
            max_window,
            j_conserved,
            window_span: 486,
            j_extension: 162,
        }
    }
}

impl AnchorParams {
    pub fn for_chain(chain: Chain) -> Self {
        let (j_conserved, min_window, max_window) = chain.anchor_defaults();

        AnchorParams {
            j_conserved,
            min_window,
            max_window,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapperParams {
    pub seed_len: usize,
    pub max_mismatches: usize,
}

impl Default for MapperParams {
    fn default() -> Self {
        MapperParams {
            seed_len: 25,
            max_mismatches: 2,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssemblerConfig {
    pub graph: GraphParams,
    pub enumeration: EnumerationLimits,
    pub roots: RootParams,
    pub driver: DriverParams,
    pub windows: WindowParams,
    pub anchors: AnchorParams,
    pub mapper: MapperParams,
}

impl AssemblerConfig {
    /// Check parameters for consistency.
    pub fn validate(mut self) -> Result<Self, AssemblyError> {
        self.graph = self.graph.validate()?;
        let g = &self.graph;

        if self.enumeration.max_contig_len <= g.kmer_size + 1 {
            return Err(AssemblyError::InvalidConfig(
                "max contig length must exceed the k-mer size".to_string()));
        }

        if self.driver.threads == 0 || self.driver.roots_per_batch == 0 {
            return Err(AssemblyError::InvalidConfig(
                "threads and roots per batch must be > 0".to_string()));
        }

        let w = &self.windows;
        if w.eval_start == 0 || w.eval_stop < w.eval_start {
            return Err(AssemblyError::InvalidConfig(
                format!("invalid eval window {}..{}", w.eval_start, w.eval_stop)));
        }

        if w.insert_len == 0 {
            return Err(AssemblyError::InvalidConfig("insert length must be > 0".to_string()));
        }

        if w.eval_stop > self.anchors.window_span {
            return Err(AssemblyError::InvalidConfig(
                format!("eval stop ({}) lies beyond the window span ({})", w.eval_stop, self.anchors.window_span)));
        }

        if !matches!(self.anchors.j_conserved, b'W' | b'F') {
            return Err(AssemblyError::InvalidConfig(
                format!("conserved J AA must be W or F: {}", char::from(self.anchors.j_conserved))));
        }

        if self.anchors.anchor_len == 0 || self.anchors.anchor_len > 32 {
            return Err(AssemblyError::InvalidConfig(
                "anchor length must be between 1 and 32".to_string()));
        }

        Ok(self)
    }
}

/// Reference files resolved from a reference directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceFiles {
    pub v_anchors: PathBuf,
    pub j_anchors: PathBuf,
    /// Single-record V-region FASTA used for root homology
    pub v_region: PathBuf,
}

impl ReferenceFiles {
    pub fn from_dir(ref_dir: &Path) -> Self {
        ReferenceFiles {
            v_anchors: ref_dir.join("v_index"),
            j_anchors: ref_dir.join("j_index"),
            v_region: ref_dir.join("v_region.fa"),
        }
    }

    pub fn missing(&self) -> Vec<&Path> {
        [&self.v_anchors, &self.j_anchors, &self.v_region]
            .into_iter()
            .filter(|p| !p.exists())
            .map(|p| p.as_path())
            .collect()
    }
}
