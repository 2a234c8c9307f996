//! Candidate window extraction, validation and output.
//!
//! Finished contigs are searched for V-J windows. Each distinct window is mapped and
//! validated once; accepted windows are trimmed to their coverage eval range and kept
//! in a set that is written as FASTA at the end of the run.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use itertools::Itertools;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tracing::{debug, info, trace, warn};

use crate::assembler::enumerate::{ContigSink, EmittedContig};
use crate::config::WindowParams;
use crate::errors::AssemblyError;
use crate::external::{ContigMapper, CoverageRequest, CoverageValidator, WindowFinder};
use crate::io::fasta::{window_name, write_windows};

pub const WINDOW_FASTA: &str = "vdj_contigs.fa";

#[derive(Debug, Default)]
struct RegistryState {
    candidates: FxHashSet<Vec<u8>>,
    accepted: FxHashSet<Vec<u8>>,
    last_id: usize,
}

/// Dedup state shared by all workers. The lock is only held for set lookups and
/// inserts.
#[derive(Debug, Default)]
pub struct WindowRegistry {
    state: Mutex<RegistryState>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a candidate for processing.
    ///
    /// Returns a fresh window id unless the candidate was claimed before or a window with
    /// the same trimmed sequence was already accepted.
    pub fn reserve(&self, candidate: &[u8], trimmed: &[u8]) -> Option<String> {
        let mut state = self.state.lock();
        if state.candidates.contains(candidate) || state.accepted.contains(trimmed) {
            return None;
        }

        state.candidates.insert(candidate.to_vec());
        state.last_id += 1;

        Some(window_name(state.last_id))
    }

    pub fn accept(&self, window: Vec<u8>) -> bool {
        self.state.lock().accepted.insert(window)
    }

    pub fn num_candidates(&self) -> usize {
        self.state.lock().candidates.len()
    }

    pub fn num_accepted(&self) -> usize {
        self.state.lock().accepted.len()
    }

    /// Accepted windows in lexicographic order.
    pub fn accepted_windows(&self) -> Vec<Vec<u8>> {
        self.state.lock().accepted.iter()
            .sorted()
            .cloned()
            .collect()
    }
}

/// Counts for the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowCounts {
    pub contigs_received: usize,
    pub contigs_searched: usize,
    pub candidate_windows: usize,
    pub accepted_windows: usize,
}

/// The [`ContigSink`] every enumeration worker emits into.
pub struct WindowStage<'s> {
    params: WindowParams,
    read_length: usize,
    finder: &'s dyn WindowFinder,
    mapper: &'s dyn ContigMapper,
    validator: &'s dyn CoverageValidator,
    registry: WindowRegistry,
    contigs_received: AtomicUsize,
    contigs_searched: AtomicUsize,
}

impl<'s> WindowStage<'s> {
    pub fn new(
        params: WindowParams,
        read_length: usize,
        finder: &'s dyn WindowFinder,
        mapper: &'s dyn ContigMapper,
        validator: &'s dyn CoverageValidator,
    ) -> Self {
        WindowStage {
            params,
            read_length,
            finder,
            mapper,
            validator,
            registry: WindowRegistry::new(),
            contigs_received: AtomicUsize::new(0),
            contigs_searched: AtomicUsize::new(0),
        }
    }

    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    pub fn counts(&self) -> WindowCounts {
        WindowCounts {
            contigs_received: self.contigs_received.load(Ordering::Relaxed),
            contigs_searched: self.contigs_searched.load(Ordering::Relaxed),
            candidate_windows: self.registry.num_candidates(),
            accepted_windows: self.registry.num_accepted(),
        }
    }

    fn coverage_request(&self, window_len: usize) -> CoverageRequest {
        let p = &self.params;

        CoverageRequest {
            read_length: self.read_length,
            contig_len: window_len,
            eval_start: p.eval_start,
            eval_stop: p.eval_stop,
            read_span: p.read_span,
            insert_low: p.insert_len,
            insert_high: p.insert_len,
            floor: p.read_floor,
        }
    }

    /// Map and validate a candidate window unless an identical one was seen before.
    ///
    /// Returns whether the window was accepted.
    pub fn process_candidate(&self, candidate: &[u8]) -> bool {
        let range = self.params.trimmed_range(candidate.len());
        let Some(id) = self.registry.reserve(candidate, &candidate[range.clone()]) else {
            return false;
        };

        let mapping = match self.mapper.map_contig(&id, candidate) {
            Ok(mapping) => mapping,
            Err(e) => {
                warn!(id, error = %e, "Mapping failed, rejecting window");
                return false;
            }
        };

        if self.validator.is_valid(&self.coverage_request(candidate.len()), &mapping) {
            debug!(id, mapped = mapping.len(), "VALID_CONTIG");
            self.registry.accept(candidate[range].to_vec());
            true
        } else {
            trace!(id, mapped = mapping.len(), "INVALID_CONTIG");
            false
        }
    }

    /// Write all accepted windows to [`WINDOW_FASTA`] in `output_dir` and hand the file to
    /// the mapper for the final report.
    pub fn write_output(&self, output_dir: &Path) -> Result<PathBuf, AssemblyError> {
        let path = output_dir.join(WINDOW_FASTA);
        let windows = self.registry.accepted_windows();

        write_windows(&windows, BufWriter::new(File::create(&path)?))?;
        info!(windows = windows.len(), path = %path.display(), "Wrote accepted windows");

        if let Err(e) = self.mapper.map_contig_file(&path) {
            warn!(error = %e, "Final window mapping failed");
        }

        Ok(path)
    }
}

impl ContigSink for WindowStage<'_> {
    fn emit(&self, contig: EmittedContig) {
        let received = self.contigs_received.fetch_add(1, Ordering::Relaxed) + 1;
        if received % 100_000 == 0 {
            info!(contigs = received, "contig_candidates");
        }

        if contig.sequence.len() < self.params.min_contig_len {
            return;
        }

        self.contigs_searched.fetch_add(1, Ordering::Relaxed);

        for candidate in self.finder.find_windows(&contig.sequence) {
            self.process_candidate(&candidate);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::{ContigMapping, MappedRead};

    /// Treats the whole contig as the only window.
    struct WholeContig;

    impl WindowFinder for WholeContig {
        fn find_windows(&self, contig: &[u8]) -> Vec<Vec<u8>> {
            vec![contig.to_vec()]
        }
    }

    #[derive(Default)]
    struct CountingMapper {
        calls: AtomicUsize,
        fail: bool,
    }

    impl ContigMapper for CountingMapper {
        fn map_contig(&self, _id: &str, contig: &[u8]) -> Result<ContigMapping, AssemblyError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(AssemblyError::InvalidReference("no reads".to_string()));
            }

            Ok(ContigMapping {
                reads: vec![MappedRead { read_ix: 0, start: 0, len: contig.len(), reverse: false, mismatches: 0 }],
            })
        }

        fn map_contig_file(&self, _path: &Path) -> Result<(), AssemblyError> {
            Ok(())
        }
    }

    struct AcceptAll;

    impl CoverageValidator for AcceptAll {
        fn is_valid(&self, _request: &CoverageRequest, _mapping: &ContigMapping) -> bool {
            true
        }
    }

    fn params() -> WindowParams {
        WindowParams {
            min_contig_len: 8,
            eval_start: 3,
            eval_stop: 8,
            read_span: 2,
            insert_len: 0,
            read_floor: 1,
        }
    }

    fn contig(seq: &[u8]) -> EmittedContig {
        EmittedContig { sequence: seq.to_vec(), score: 0.0, is_repeat: false }
    }

    #[test]
    fn test_same_window_processed_once() {
        let mapper = CountingMapper::default();
        let stage = WindowStage::new(params(), 10, &WholeContig, &mapper, &AcceptAll);

        stage.emit(contig(b"AACCGGTTAA"));
        stage.emit(contig(b"AACCGGTTAA"));

        assert_eq!(mapper.calls.load(Ordering::Relaxed), 1);
        assert_eq!(stage.registry().accepted_windows(), vec![b"CCGGTT".to_vec()]);

        let counts = stage.counts();
        assert_eq!(counts.contigs_received, 2);
        assert_eq!(counts.candidate_windows, 1);
        assert_eq!(counts.accepted_windows, 1);
    }

    #[test]
    fn test_accepted_trimmed_key_blocks_new_candidate() {
        let mapper = CountingMapper::default();
        let stage = WindowStage::new(params(), 10, &WholeContig, &mapper, &AcceptAll);

        assert!(stage.process_candidate(b"AACCGGTTAA"));

        // Differs only outside the eval range
        assert!(!stage.process_candidate(b"TTCCGGTTGG"));
        assert_eq!(mapper.calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_short_contigs_skipped() {
        let mapper = CountingMapper::default();
        let stage = WindowStage::new(params(), 10, &WholeContig, &mapper, &AcceptAll);

        stage.emit(contig(b"ACGTACG"));
        assert_eq!(mapper.calls.load(Ordering::Relaxed), 0);
        assert_eq!(stage.counts().contigs_searched, 0);
    }

    #[test]
    fn test_mapping_failure_rejects() {
        let mapper = CountingMapper { fail: true, ..Default::default() };
        let stage = WindowStage::new(params(), 10, &WholeContig, &mapper, &AcceptAll);

        assert!(!stage.process_candidate(b"AACCGGTTAA"));
        assert_eq!(stage.registry().num_accepted(), 0);

        // Rejected candidates are not retried
        assert!(!stage.process_candidate(b"AACCGGTTAA"));
        assert_eq!(mapper.calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_write_output_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let mapper = CountingMapper::default();
        let stage = WindowStage::new(params(), 10, &WholeContig, &mapper, &AcceptAll);

        stage.process_candidate(b"AATTTTTTAA");
        stage.process_candidate(b"AACCCCCCAA");

        let path = stage.write_output(dir.path()).unwrap();
        let written = std::fs::read_to_string(path).unwrap();
        assert_eq!(written, ">vjf_1\nCCCCCC\n>vjf_2\nTTTTTT\n");
    }

    #[test]
    fn test_registry_ids() {
        let registry = WindowRegistry::new();
        assert_eq!(registry.reserve(b"AAAA", b"AA").as_deref(), Some("vjf_1"));
        assert_eq!(registry.reserve(b"AAAA", b"AA"), None);
        assert_eq!(registry.reserve(b"CCCC", b"CC").as_deref(), Some("vjf_2"));
    }
}
