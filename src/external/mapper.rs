//! Mapping reads back onto candidate windows, and read-coverage validation.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};

use crate::config::MapperParams;
use crate::errors::AssemblyError;
use crate::external::{ContigMapper, ContigMapping, CoverageRequest, CoverageValidator, MappedRead};
use crate::io::read_fasta_records;
use crate::reads::ReadArena;

pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|b| match b {
            b'A' => b'T',
            b'C' => b'G',
            b'G' => b'C',
            b'T' => b'A',
            other => *other,
        })
        .collect()
}

fn count_mismatches(a: &[u8], b: &[u8], max: usize) -> Option<usize> {
    let mut mismatches = 0;
    for (x, y) in a.iter().zip(b) {
        if x != y {
            mismatches += 1;
            if mismatches > max {
                return None;
            }
        }
    }

    Some(mismatches)
}

/// Read depth at every position of a sequence of length `len`.
pub fn depth_profile(len: usize, mapping: &ContigMapping) -> Vec<usize> {
    let mut depth = vec![0; len];
    for read in &mapping.reads {
        let end = read.end().min(len);
        for d in depth.iter_mut().take(end).skip(read.start) {
            *d += 1;
        }
    }

    depth
}

/// Maps reads by exact seed lookup on the read prefix followed by a full Hamming check.
///
/// Only read prefixes are indexed. Reverse-strand placements are found by scanning the
/// reverse complement of the window.
pub struct ReadSeedMapper<'a> {
    reads: Vec<&'a [u8]>,
    index: FxHashMap<&'a [u8], Vec<usize>>,
    params: MapperParams,
}

impl<'a> ReadSeedMapper<'a> {
    pub fn new(arena: &'a ReadArena, params: MapperParams) -> Self {
        let reads: Vec<&'a [u8]> = arena.aligned.records()
            .chain(arena.unaligned.records())
            .map(|r| r.sequence)
            .collect();

        let mut index: FxHashMap<&'a [u8], Vec<usize>> = FxHashMap::default();
        for (ix, read) in reads.iter().enumerate() {
            if read.len() >= params.seed_len {
                index.entry(&read[..params.seed_len]).or_default().push(ix);
            }
        }

        info!(reads = reads.len(), seeds = index.len(), "Indexed reads for mapping");

        ReadSeedMapper { reads, index, params }
    }

    fn map_strand(&self, seq: &[u8], reverse: bool, seen: &mut FxHashSet<(usize, bool, usize)>, mapping: &mut ContigMapping) {
        let seed_len = self.params.seed_len;
        if seed_len == 0 || seq.len() < seed_len {
            return;
        }

        for pos in 0..=seq.len() - seed_len {
            let Some(hits) = self.index.get(&seq[pos..pos + seed_len]) else {
                continue;
            };

            for &read_ix in hits {
                let read = self.reads[read_ix];
                if pos + read.len() > seq.len() {
                    continue;
                }

                let Some(mismatches) = count_mismatches(read, &seq[pos..pos + read.len()], self.params.max_mismatches) else {
                    continue;
                };

                if seen.insert((read_ix, reverse, pos)) {
                    let start = if reverse { seq.len() - pos - read.len() } else { pos };
                    mapping.reads.push(MappedRead { read_ix, start, len: read.len(), reverse, mismatches });
                }
            }
        }
    }
}

impl ContigMapper for ReadSeedMapper<'_> {
    fn map_contig(&self, id: &str, contig: &[u8]) -> Result<ContigMapping, AssemblyError> {
        let mut mapping = ContigMapping::default();
        let mut seen = FxHashSet::default();

        self.map_strand(contig, false, &mut seen, &mut mapping);
        self.map_strand(&reverse_complement(contig), true, &mut seen, &mut mapping);

        mapping.reads.sort_by_key(|r| (r.start, r.read_ix));
        debug!(id, mapped = mapping.len(), "Mapped reads to window");

        Ok(mapping)
    }

    fn map_contig_file(&self, path: &Path) -> Result<(), AssemblyError> {
        let report_path = path.with_extension("coverage.tsv");
        let mut writer = BufWriter::new(File::create(&report_path)?);
        writeln!(writer, "#id\tlength\tmapped_reads\tmin_depth\tmean_depth")?;

        let records = read_fasta_records(path)?;
        for (id, seq) in &records {
            let mapping = self.map_contig(id, seq)?;
            let depth = depth_profile(seq.len(), &mapping);

            let min_depth = depth.iter().min().copied().unwrap_or(0);
            let mean_depth = if depth.is_empty() {
                0.0
            } else {
                depth.iter().sum::<usize>() as f64 / depth.len() as f64
            };

            writeln!(writer, "{id}\t{}\t{}\t{min_depth}\t{mean_depth:.2}", seq.len(), mapping.len())?;
        }

        info!(windows = records.len(), report = %report_path.display(), "Wrote window coverage report");

        Ok(())
    }
}

/// Accepts a window when every position of its eval window is covered by at least
/// `floor` reads overlapping the eval window by `read_span` bases or more.
///
/// Insert bounds are ignored; no mate information is available to this validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadCoverageValidator;

impl CoverageValidator for ReadCoverageValidator {
    fn is_valid(&self, request: &CoverageRequest, mapping: &ContigMapping) -> bool {
        let begin = request.eval_start.saturating_sub(1);
        let end = request.eval_stop.min(request.contig_len);
        if begin >= end {
            return false;
        }

        let mut depth = vec![0usize; end - begin];
        for read in &mapping.reads {
            let s = read.start.max(begin);
            let e = read.end().min(end);
            if e <= s || e - s < request.read_span {
                continue;
            }

            for d in &mut depth[s - begin..e - begin] {
                *d += 1;
            }
        }

        depth.iter().all(|d| *d >= request.floor)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::reads::{encode_records, Strand};

    const CONTIG: &[u8] = b"AACCGGTTACGTACGTAGGT";

    fn arena() -> ReadArena {
        let aligned = encode_records([
            (Strand::Forward, &b"CCGGTTACGT"[..], &b"IIIIIIIIII"[..]),
        ]);
        let unaligned = encode_records([
            (Strand::Reverse, &b"CTACGTACGT"[..], &b"IIIIIIIIII"[..]),
            (Strand::Forward, &b"CCGGTTACGA"[..], &b"IIIIIIIIII"[..]),
        ]);

        ReadArena::new(aligned, unaligned, 10).unwrap()
    }

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement(b"AACGTN"), b"NACGTT");
    }

    #[test]
    fn test_map_both_strands() {
        let arena = arena();
        let mapper = ReadSeedMapper::new(&arena, MapperParams { seed_len: 5, max_mismatches: 1 });

        let mapping = mapper.map_contig("vjf_1", CONTIG).unwrap();
        let placed: Vec<_> = mapping.reads.iter()
            .map(|r| (r.read_ix, r.start, r.reverse, r.mismatches))
            .collect();

        assert_eq!(placed, vec![(0, 2, false, 0), (2, 2, false, 1), (1, 8, true, 0)]);
    }

    #[test]
    fn test_mismatch_limit() {
        let arena = arena();
        let mapper = ReadSeedMapper::new(&arena, MapperParams { seed_len: 5, max_mismatches: 0 });

        let mapping = mapper.map_contig("vjf_1", CONTIG).unwrap();
        assert_eq!(mapping.len(), 2);
        assert!(mapping.reads.iter().all(|r| r.mismatches == 0));
    }

    fn request(eval_start: usize, eval_stop: usize, read_span: usize, floor: usize) -> CoverageRequest {
        CoverageRequest {
            read_length: 10,
            contig_len: 20,
            eval_start,
            eval_stop,
            read_span,
            insert_low: 0,
            insert_high: 0,
            floor,
        }
    }

    fn mapped(start: usize) -> MappedRead {
        MappedRead { read_ix: start, start, len: 10, reverse: false, mismatches: 0 }
    }

    #[test]
    fn test_coverage_validator() {
        let mapping = ContigMapping { reads: vec![mapped(2), mapped(8)] };
        let validator = ReadCoverageValidator;

        // Positions 3..=18 are covered once
        assert!(validator.is_valid(&request(3, 18, 5, 1), &mapping));
        assert!(!validator.is_valid(&request(1, 18, 5, 1), &mapping));
        assert!(!validator.is_valid(&request(3, 18, 5, 2), &mapping));

        // A read overlapping the eval window by fewer than read_span bases does not count
        assert!(validator.is_valid(&request(11, 18, 8, 1), &mapping));
        assert!(!validator.is_valid(&request(11, 18, 9, 1), &mapping));

        // Eval window beyond the contig
        assert!(!validator.is_valid(&request(25, 30, 5, 1), &mapping));
    }

    #[test]
    fn test_depth_profile() {
        let mapping = ContigMapping { reads: vec![mapped(2), mapped(8)] };
        let depth = depth_profile(20, &mapping);

        assert_eq!(depth[0], 0);
        assert_eq!(depth[2], 1);
        assert_eq!(depth[9], 2);
        assert_eq!(depth[17], 1);
        assert_eq!(depth[18], 0);
    }

    #[test]
    fn test_map_contig_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vdj_contigs.fa");
        std::fs::write(&path, ">vjf_1\nAACCGGTTACGTACGTAGGT\n").unwrap();

        let arena = arena();
        let mapper = ReadSeedMapper::new(&arena, MapperParams { seed_len: 5, max_mismatches: 0 });
        mapper.map_contig_file(&path).unwrap();

        let report = std::fs::read_to_string(dir.path().join("vdj_contigs.coverage.tsv")).unwrap();
        let lines: Vec<_> = report.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("vjf_1\t20\t2\t0\t"));
    }
}
