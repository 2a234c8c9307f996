//! Root homology scoring against the reference V-region records.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::external::RootScorer;

pub const MATCH_SCORE: i32 = 1;
pub const MISMATCH_PENALTY: i32 = -1;
pub const GAP_PENALTY: i32 = -1;

/// Seed-and-score homology of a query against a small set of reference records.
///
/// Every seed-length substring of every record is indexed with its positions. A query
/// is scored only against reference windows of twice the k-mer length around its seed
/// hits.
pub struct SeqScorer {
    kmer_len: usize,
    seed_len: usize,
    records: Vec<Vec<u8>>,
    index: FxHashMap<Vec<u8>, Vec<(usize, usize)>>,
}

impl SeqScorer {
    pub fn new(kmer_len: usize, seed_len: usize, records: Vec<Vec<u8>>) -> Self {
        let mut index: FxHashMap<Vec<u8>, Vec<(usize, usize)>> = FxHashMap::default();

        for (rec_ix, record) in records.iter().enumerate() {
            if seed_len == 0 {
                break;
            }

            for (pos, seed) in record.windows(seed_len).enumerate() {
                index.entry(seed.to_ascii_uppercase())
                    .or_default()
                    .push((rec_ix, pos));
            }
        }

        debug!(records = records.len(), seeds = index.len(), "Initialized root scorer");

        SeqScorer { kmer_len, seed_len, records, index }
    }

    fn seed_hits(&self, query: &[u8]) -> BTreeSet<(usize, usize)> {
        let mut hits = BTreeSet::new();
        if self.seed_len == 0 {
            return hits;
        }

        for seed in query.windows(self.seed_len) {
            if let Some(positions) = self.index.get(seed) {
                hits.extend(positions.iter().copied());
            }
        }

        hits
    }

    fn reference_window(&self, rec_ix: usize, pos: usize) -> &[u8] {
        let record = &self.records[rec_ix];
        let span = 2 * self.kmer_len;

        let start = pos.saturating_sub(self.kmer_len)
            .min(record.len().saturating_sub(span));
        let end = (start + span).min(record.len());

        &record[start..end]
    }
}

impl RootScorer for SeqScorer {
    fn homology_score(&self, query: &[u8]) -> i32 {
        let hits = self.seed_hits(query);
        trace!(hits = hits.len(), "Root scorer seed hits");

        hits.into_iter()
            .map(|(rec_ix, pos)| local_score(query, self.reference_window(rec_ix, pos)))
            .max()
            .unwrap_or(-1)
    }
}

/// Maximum alignment score of `query` within `reference`.
///
/// The first row and column of the score matrix are zero, so alignments may start at
/// any position of either sequence and end anywhere. Cell scores are not floored at
/// zero.
pub fn local_score(query: &[u8], reference: &[u8]) -> i32 {
    let mut prev = vec![0i32; query.len() + 1];
    let mut curr = vec![0i32; query.len() + 1];
    let mut max = 0;

    for r in reference {
        curr[0] = 0;
        for (row, q) in query.iter().enumerate() {
            let diag = prev[row] + if q == r { MATCH_SCORE } else { MISMATCH_PENALTY };
            let left = prev[row + 1] + GAP_PENALTY;
            let up = curr[row] + GAP_PENALTY;

            let score = diag.max(left).max(up);
            max = max.max(score);
            curr[row + 1] = score;
        }

        std::mem::swap(&mut prev, &mut curr);
    }

    max
}
