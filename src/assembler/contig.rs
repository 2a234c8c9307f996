use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::graphs::NodeIndexType;

/// Tail buffers are frozen into a shared fragment once they reach this size.
pub const MAX_FRAGMENT_SIZE: usize = 100;

/// One in-progress path of a contig search.
///
/// The sequence is kept as a list of immutable fragments plus a private tail. When a
/// contig branches, the tail is frozen first so both branches share all sequence
/// accumulated so far and only grow their own tails.
#[derive(Debug)]
pub struct Contig<N> {
    fragments: Vec<Rc<[u8]>>,
    tail: Vec<u8>,
    curr_node: N,
    visits: FxHashMap<N, u32>,
    score: f64,
    len: usize,
    is_repeat: bool,
}

impl<N> Contig<N>
where
    N: NodeIndexType,
{
    pub fn new(root: N) -> Self {
        Contig {
            fragments: Vec::new(),
            tail: Vec::with_capacity(MAX_FRAGMENT_SIZE),
            curr_node: root,
            visits: FxHashMap::default(),
            score: 0.0,
            len: 0,
            is_repeat: false,
        }
    }

    #[inline(always)]
    pub fn curr_node(&self) -> N {
        self.curr_node
    }

    /// Move to `node`, adding the log-probability of that step to the path score.
    #[inline]
    pub fn advance(&mut self, node: N, score_delta: f64) {
        self.curr_node = node;
        self.score += score_delta;
    }

    #[inline(always)]
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Number of bases accumulated so far.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub fn is_repeat(&self) -> bool {
        self.is_repeat
    }

    pub fn mark_repeat(&mut self) {
        self.is_repeat = true;
    }

    pub fn num_fragments(&self) -> usize {
        self.fragments.len()
    }

    fn freeze_tail(&mut self) {
        if !self.tail.is_empty() {
            let frag: Rc<[u8]> = Rc::from(std::mem::take(&mut self.tail));
            self.fragments.push(frag);
            self.tail.reserve(MAX_FRAGMENT_SIZE);
        }
    }

    fn make_room(&mut self, add_len: usize) {
        if self.tail.len() + add_len > MAX_FRAGMENT_SIZE {
            self.freeze_tail();
        }
    }

    pub fn append_base(&mut self, base: u8) {
        self.make_room(1);
        self.tail.push(base);
        self.len += 1;
    }

    pub fn append_kmer(&mut self, kmer: &[u8]) {
        self.make_room(kmer.len());
        self.tail.extend_from_slice(kmer);
        self.len += kmer.len();
    }

    /// Times the current node has been extended through on this path.
    pub fn curr_visits(&self) -> u32 {
        self.visits.get(&self.curr_node).copied().unwrap_or(0)
    }

    pub fn visit_curr_node(&mut self) {
        *self.visits.entry(self.curr_node).or_insert(0) += 1;
    }

    /// Fork a new path continuing into `node`.
    ///
    /// The branch shares every fragment with `self`, gets its own tail, and starts
    /// with an empty visit table rather than a copy of the parent's.
    pub fn branch(&mut self, node: N, score_delta: f64) -> Self {
        self.freeze_tail();

        Contig {
            fragments: self.fragments.clone(),
            tail: Vec::with_capacity(MAX_FRAGMENT_SIZE),
            curr_node: node,
            visits: FxHashMap::default(),
            score: self.score + score_delta,
            len: self.len,
            is_repeat: self.is_repeat,
        }
    }

    /// Concatenate all fragments and the tail.
    pub fn sequence(&self) -> Vec<u8> {
        let mut seq = Vec::with_capacity(self.len);
        for frag in &self.fragments {
            seq.extend_from_slice(frag);
        }
        seq.extend_from_slice(&self.tail);

        seq
    }
}
