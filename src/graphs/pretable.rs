//! Single-pass k-mer census used to decide which k-mers make it into the graph.
//!
//! Every k-mer window of every read is counted together with its per-position quality
//! sums and whether it was seen from more than one distinct read or strand. After all
//! reads are scanned, [`PreTable::prune`] reduces the table to an [`AdmissionFilter`].

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::{debug, info};

use crate::config::{GraphParams, MAX_KMER_LEN, MAX_QUAL_SUM};
use crate::errors::{AssemblyError, AssemblyStatus};
use crate::reads::{phred33, Record, RecordBuffer, Strand};

/// Frequencies saturate at this value.
pub const MAX_FREQUENCY: u16 = 32765;

/// Quality sums that would reach this value are pinned to [`MAX_QUAL_SUM`] instead.
const QUAL_SUM_CEILING: u16 = MAX_QUAL_SUM as u16 - 41;

#[inline]
pub(crate) fn is_ambiguous(base: u8) -> bool {
    !matches!(base, b'A' | b'C' | b'G' | b'T')
}

#[derive(Debug, Clone)]
pub struct PreRecord<'a> {
    contributing_read: &'a [u8],
    contributing_strand: Strand,
    pub frequency: u16,
    pub multiple_reads: bool,
    pub qual_sums: SmallVec<[u8; MAX_KMER_LEN]>,
}

impl<'a> PreRecord<'a> {
    fn new(read: &'a [u8], strand: Strand, kmer_qual: &[u8]) -> Self {
        PreRecord {
            contributing_read: read,
            contributing_strand: strand,
            frequency: 1,
            multiple_reads: false,
            qual_sums: kmer_qual.iter().map(|q| phred33(*q)).collect(),
        }
    }

    fn observe(&mut self, read: &[u8], strand: Strand, kmer_qual: &[u8]) {
        if self.frequency < MAX_FREQUENCY {
            self.frequency += 1;
        }

        if !self.multiple_reads
            && (self.contributing_read != read || self.contributing_strand != strand)
        {
            self.multiple_reads = true;
        }

        for (sum, q) in self.qual_sums.iter_mut().zip(kmer_qual) {
            let new_sum = *sum as u16 + phred33(*q) as u16;
            *sum = if new_sum < QUAL_SUM_CEILING { new_sum as u8 } else { MAX_QUAL_SUM };
        }
    }

    pub fn is_admissible(&self, params: &GraphParams) -> bool {
        self.frequency >= params.min_node_freq
            && self.multiple_reads
            && self.qual_sums.iter().all(|q| *q >= params.min_base_quality)
    }
}

/// K-mer census keyed by k-mer content borrowed from the read buffers.
pub struct PreTable<'a> {
    params: GraphParams,
    table: FxHashMap<&'a [u8], PreRecord<'a>>,
}

impl<'a> PreTable<'a> {
    pub fn new(params: GraphParams) -> Self {
        PreTable {
            params,
            table: FxHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn get(&self, kmer: &[u8]) -> Option<&PreRecord<'a>> {
        self.table.get(kmer)
    }

    /// Whether the k-mer window at `start` qualifies for counting: no ambiguous
    /// bases and no base below the single-observation quality floor.
    fn include_kmer(&self, sequence: &[u8], quality: &[u8], start: usize) -> bool {
        let end = start + self.params.kmer_size;

        sequence[start..end].iter()
            .zip(&quality[start..end])
            .all(|(base, q)| !is_ambiguous(*base) && phred33(*q) >= self.params.min_kmer_base_quality)
    }

    pub fn add_read(&mut self, record: Record<'a>) -> Result<(), AssemblyError> {
        let k = self.params.kmer_size;
        if record.sequence.len() < k {
            return Ok(());
        }

        for i in 0..=record.sequence.len() - k {
            if !self.include_kmer(record.sequence, record.quality, i) {
                continue;
            }

            let kmer = &record.sequence[i..i + k];
            let kmer_qual = &record.quality[i..i + k];

            if let Some(pre) = self.table.get_mut(kmer) {
                pre.observe(record.sequence, record.strand, kmer_qual);
            } else {
                if self.table.len() >= self.params.max_nodes {
                    return Err(AssemblyError::Capacity(AssemblyStatus::TooManyNodes));
                }

                self.table.insert(kmer, PreRecord::new(record.sequence, record.strand, kmer_qual));
            }
        }

        Ok(())
    }

    pub fn add_reads(&mut self, reads: &'a RecordBuffer) -> Result<(), AssemblyError> {
        for (ix, record) in reads.records().enumerate() {
            self.add_read(record)?;

            if (ix + 1) % 1_000_000 == 0 {
                info!(records = ix + 1, "pre-table progress");
            }
        }

        debug!(reads = reads.len(), pre_nodes = self.table.len(), "Pre-table scan done");

        Ok(())
    }

    /// Drop every k-mer failing the admission predicate and release the table.
    pub fn prune(self) -> AdmissionFilter<'a> {
        let before = self.table.len();
        let params = self.params;
        let kmers: FxHashSet<&'a [u8]> = self.table.into_iter()
            .filter(|(_, pre)| pre.is_admissible(&params))
            .map(|(kmer, _)| kmer)
            .collect();

        info!(before, after = kmers.len(), "Pruned pre-table");

        AdmissionFilter { kmers }
    }
}

/// The sole output of the pre-table: which k-mers may become graph nodes.
#[derive(Debug, Default)]
pub struct AdmissionFilter<'a> {
    kmers: FxHashSet<&'a [u8]>,
}

impl<'a> AdmissionFilter<'a> {
    #[inline]
    pub fn admit(&self, kmer: &[u8]) -> bool {
        self.kmers.contains(kmer)
    }

    pub fn len(&self) -> usize {
        self.kmers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kmers.is_empty()
    }
}
