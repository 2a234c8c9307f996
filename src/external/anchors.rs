//! V/J anchor search over finished contigs.
//!
//! Anchors are short k-mers near the 3' end of V genes and the 5' end of J genes. A
//! contig holding a V anchor followed by an in-frame J anchor at a plausible distance
//! yields a candidate window spanning the junction.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rustc_hash::FxHashSet;
use tracing::{debug, info};

use crate::config::AnchorParams;
use crate::errors::AssemblyError;
use crate::external::WindowFinder;

/// Anchor search starts this many bases into a contig.
pub const FRAME_PADDING: usize = 100;

/// Anchor search stops this many bases into a contig.
pub const VJ_SEARCH_END: usize = 1000;

/// 2-bit encode a k-mer of at most 32 bases, first base in the most significant bits.
pub fn encode_kmer(kmer: &[u8]) -> Option<u64> {
    kmer.iter().try_fold(0u64, |acc, base| {
        let bits = match base {
            b'A' | b'a' => 0,
            b'C' | b'c' => 1,
            b'G' | b'g' => 2,
            b'T' | b't' => 3,
            _ => return None,
        };

        Some((acc << 2) | bits)
    })
}

fn is_stop_codon(codon: &[u8]) -> bool {
    matches!(codon, b"TAG" | b"TAA" | b"TGA")
}

fn encodes(codon: &[u8], amino_acid: u8) -> bool {
    match amino_acid {
        b'W' => codon == b"TGG",
        b'F' => matches!(codon, b"TTT" | b"TTC"),
        _ => false,
    }
}

/// Load an anchor index file: one `<encoded k-mer>\t<mismatch distance>` per line.
///
/// Only anchors within `max_mismatches` of a germline anchor are kept.
pub fn load_anchor_index(path: &Path, max_mismatches: u32) -> Result<FxHashSet<u64>, AssemblyError> {
    let reader = BufReader::new(File::open(path)?);
    let mut anchors = FxHashSet::default();

    for (ix, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split('\t');
        let parsed = fields.next()
            .and_then(|f| f.trim().parse::<u64>().ok())
            .zip(fields.next().and_then(|f| f.trim().parse::<u32>().ok()));

        let Some((kmer, dist)) = parsed else {
            return Err(AssemblyError::InvalidAnchorIndex { path: path.to_path_buf(), line: ix + 1 });
        };

        if dist <= max_mismatches {
            anchors.insert(kmer);
        }
    }

    debug!(path = %path.display(), anchors = anchors.len(), "Loaded anchor index");

    Ok(anchors)
}

pub struct VjAnchorFinder {
    v_anchors: FxHashSet<u64>,
    j_anchors: FxHashSet<u64>,
    params: AnchorParams,
}

impl VjAnchorFinder {
    pub fn new(v_anchors: FxHashSet<u64>, j_anchors: FxHashSet<u64>, params: AnchorParams) -> Self {
        VjAnchorFinder { v_anchors, j_anchors, params }
    }

    pub fn from_files(v_path: &Path, j_path: &Path, params: AnchorParams) -> Result<Self, AssemblyError> {
        let v_anchors = load_anchor_index(v_path, params.max_mismatches)?;
        let j_anchors = load_anchor_index(j_path, params.max_mismatches)?;

        info!(v_anchors = v_anchors.len(), j_anchors = j_anchors.len(), "Loaded V/J anchors");

        Ok(Self::new(v_anchors, j_anchors, params))
    }

    /// Positions of V and J anchor hits in the searched part of `contig`.
    fn anchor_hits(&self, contig: &[u8]) -> (Vec<usize>, Vec<usize>) {
        let k = self.params.anchor_len;
        let mut v_hits = Vec::new();
        let mut j_hits = Vec::new();

        if contig.len() < k {
            return (v_hits, j_hits);
        }

        let last = (contig.len() - k).min(VJ_SEARCH_END.saturating_sub(1));
        for pos in FRAME_PADDING..=last {
            let Some(kmer) = encode_kmer(&contig[pos..pos + k]) else {
                continue;
            };

            if self.v_anchors.contains(&kmer) {
                v_hits.push(pos);
            }

            if self.j_anchors.contains(&kmer) {
                j_hits.push(pos);
            }
        }

        (v_hits, j_hits)
    }

    /// The window for a V hit at `v` and a J hit at `j`, if the pair forms a productive
    /// junction.
    fn window_for_pair<'c>(&self, contig: &'c [u8], v: usize, j: usize) -> Option<&'c [u8]> {
        let p = &self.params;
        let v_end = v + p.anchor_len;
        if j < v_end {
            return None;
        }

        let gap = j - v_end;
        if gap < p.min_window || gap > p.max_window {
            return None;
        }

        // First codon at or after the J anchor in the frame set by the V anchor
        let frame = v_end % 3;
        let j_codon = j + (frame + 3 - j % 3) % 3;
        let codon = contig.get(j_codon..j_codon + 3)?;
        if !encodes(codon, p.j_conserved) {
            return None;
        }

        let has_stop = (v_end..j_codon).step_by(3)
            .any(|pos| is_stop_codon(&contig[pos..pos + 3]));
        if has_stop {
            return None;
        }

        let end = j + p.anchor_len + p.j_extension;
        if end > contig.len() || end < p.window_span {
            return None;
        }

        Some(&contig[end - p.window_span..end])
    }
}

impl WindowFinder for VjAnchorFinder {
    fn find_windows(&self, contig: &[u8]) -> Vec<Vec<u8>> {
        let (v_hits, j_hits) = self.anchor_hits(contig);
        let mut windows: Vec<Vec<u8>> = Vec::new();

        for &v in &v_hits {
            for &j in &j_hits {
                if let Some(window) = self.window_for_pair(contig, v, j) {
                    if !windows.iter().any(|w| w == window) {
                        windows.push(window.to_vec());
                    }
                }
            }
        }

        windows
    }
}
