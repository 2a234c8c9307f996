//! Depth-first contig enumeration from a single root.
//!
//! Paths are explored with an explicit stack of [`Contig`]s. Each step classifies the
//! contig on top of the stack as a repeat, a finished path, or one that extends by one
//! base. Extending moves the contig in place into its first successor and pushes a
//! branch for every further successor.

use tracing::{debug, trace};

use crate::assembler::contig::Contig;
use crate::config::EnumerationLimits;
use crate::errors::AssemblyStatus;
use crate::graphs::AssemblyGraph;

/// A finished path handed to a [`ContigSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedContig {
    pub sequence: Vec<u8>,
    pub score: f64,
    pub is_repeat: bool,
}

/// Receives contigs as they are finished. Shared between workers.
pub trait ContigSink {
    fn emit(&self, contig: EmittedContig);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContigState {
    Repeat,
    Terminal,
    Extend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumerationOutcome {
    pub status: AssemblyStatus,

    /// Contigs passed to the sink
    pub emitted: usize,

    /// Contigs finished but kept back (probe mode or stop-on-repeat)
    pub held: usize,

    pub paths: usize,
}

pub struct ContigEnumerator<'a, G> {
    graph: &'a G,
    limits: &'a EnumerationLimits,
}

impl<'a, G> ContigEnumerator<'a, G>
where
    G: AssemblyGraph,
{
    pub fn new(graph: &'a G, limits: &'a EnumerationLimits) -> Self {
        ContigEnumerator { graph, limits }
    }

    fn state(&self, contig: &Contig<G::NodeIndex>) -> ContigState {
        let node = contig.curr_node();

        if contig.curr_visits() >= self.limits.max_node_visits {
            ContigState::Repeat
        } else if self.graph.out_degree(node) == 0
            || contig.score() < self.limits.min_contig_score
            || contig.len() + self.graph.kmer_size() + 1 >= self.limits.max_contig_len
        {
            ContigState::Terminal
        } else {
            ContigState::Extend
        }
    }

    /// Move `contig` one node forward, pushing branches for all but the first successor.
    ///
    /// Returns the number of paths taken.
    fn extend(&self, contig: &mut Contig<G::NodeIndex>, stack: &mut Vec<Contig<G::NodeIndex>>) -> usize {
        let node = contig.curr_node();
        contig.append_base(self.graph.kmer(node)[0]);
        contig.visit_curr_node();

        let total: u32 = self.graph.successors(node)
            .map(|succ| self.graph.frequency(succ) as u32)
            .sum();
        let log10_total = (total as f64).log10();

        let mut succ_iter = self.graph.successors(node);
        let Some(first) = succ_iter.next() else {
            return 0;
        };

        let mut paths = 1;
        for succ in succ_iter {
            let delta = (self.graph.frequency(succ) as f64).log10() - log10_total;
            stack.push(contig.branch(succ, delta));
            paths += 1;
        }

        let delta = (self.graph.frequency(first) as f64).log10() - log10_total;
        contig.advance(first, delta);

        paths
    }

    fn finish<S: ContigSink>(&self, contig: Contig<G::NodeIndex>, hold: bool, sink: &S, held: &mut Vec<Contig<G::NodeIndex>>) -> bool {
        if hold {
            held.push(contig);
            false
        } else {
            sink.emit(EmittedContig {
                sequence: contig.sequence(),
                score: contig.score(),
                is_repeat: contig.is_repeat(),
            });
            true
        }
    }

    /// Enumerate every path from `root` until the stack runs empty or a ceiling is hit.
    pub fn enumerate<S: ContigSink>(&self, root: G::NodeIndex, sink: &S) -> EnumerationOutcome {
        let limits = self.limits;
        let mut stack = vec![Contig::new(root)];
        let mut held = Vec::new();

        let mut status = AssemblyStatus::Ok;
        // Every emission counts towards the contig ceiling, whatever its length
        let mut emitted = 0usize;
        let mut paths = 1usize;

        while status == AssemblyStatus::Ok {
            let Some(mut contig) = stack.pop() else {
                break;
            };

            match self.state(&contig) {
                ContigState::Repeat => {
                    debug!(kmer = %self.graph.kmer_string(contig.curr_node()), "Repeat node");
                    contig.mark_repeat();

                    let hold = limits.hold_output || limits.stop_on_repeat;
                    if self.finish(contig, hold, sink, &mut held) {
                        emitted += 1;
                    }

                    if limits.stop_on_repeat {
                        status = AssemblyStatus::StoppedOnRepeat;
                    }
                },
                ContigState::Terminal => {
                    let kmer = self.graph.kmer(contig.curr_node());
                    contig.append_kmer(kmer);

                    if self.finish(contig, limits.hold_output, sink, &mut held) {
                        emitted += 1;
                    }
                },
                ContigState::Extend => {
                    // The contig keeps its slot below any branches it spawns
                    let mut branches = Vec::new();
                    paths += self.extend(&mut contig, &mut branches);
                    stack.push(contig);
                    stack.append(&mut branches);
                },
            }

            // The soft path ceiling wins when both trip on the same step
            if status == AssemblyStatus::Ok && !stack.is_empty() {
                if paths >= limits.max_paths_from_root {
                    status = AssemblyStatus::TooManyPathsFromRoot;
                } else if emitted >= limits.max_contigs {
                    status = AssemblyStatus::TooManyContigs;
                }
            }
        }

        trace!(emitted, held = held.len(), paths, pending = stack.len(), %status, "Enumeration from root done");

        EnumerationOutcome {
            status,
            emitted,
            held: held.len(),
            paths,
        }
    }
}


#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::graphs::mock::{build_graph, create_cycle_graph, create_fork_graph, create_linear_graph};

    #[derive(Default)]
    struct CollectSink(RefCell<Vec<EmittedContig>>);

    impl ContigSink for CollectSink {
        fn emit(&self, contig: EmittedContig) {
            self.0.borrow_mut().push(contig);
        }
    }

    impl CollectSink {
        fn sequences(&self) -> Vec<String> {
            self.0.borrow().iter()
                .map(|c| String::from_utf8_lossy(&c.sequence).into_owned())
                .collect()
        }
    }

    #[test]
    fn test_linear_path() {
        let (g, nmap) = create_linear_graph();
        let limits = EnumerationLimits::default();
        let sink = CollectSink::default();

        let outcome = ContigEnumerator::new(&g, &limits).enumerate(nmap["AACG"], &sink);

        assert_eq!(outcome.status, AssemblyStatus::Ok);
        assert_eq!(outcome.emitted, 1);
        assert_eq!(sink.sequences(), vec!["AACGTAC"]);

        let contigs = sink.0.borrow();
        assert_eq!(contigs[0].score, 0.0);
        assert!(!contigs[0].is_repeat);
    }

    #[test]
    fn test_fork_scores() {
        let (g, nmap) = create_fork_graph();
        let limits = EnumerationLimits::default();
        let sink = CollectSink::default();

        let outcome = ContigEnumerator::new(&g, &limits).enumerate(nmap["AACG"], &sink);

        // One child per outgoing edge; the branch is pushed above the parent
        assert_eq!(outcome.emitted, 2);
        assert_eq!(sink.sequences(), vec!["AACGTCC", "AACGTAA"]);

        // Siblings share the same total outgoing frequency (3 + 1)
        let contigs = sink.0.borrow();
        let total = 4f64.log10();
        assert!((contigs[0].score - (1f64.log10() - total)).abs() < 1e-12);
        assert!((contigs[1].score - (3f64.log10() - total)).abs() < 1e-12);

        // Root, one extension into ACGT, two at the fork, one each afterwards
        assert_eq!(outcome.paths, 6);
    }

    #[test]
    fn test_three_way_fork() {
        let (g, nmap) = build_graph(
            &[("AAC", 1), ("ACA", 2), ("ACG", 3), ("ACT", 5)],
            &[("AAC", "ACA"), ("AAC", "ACG"), ("AAC", "ACT")],
        );
        let limits = EnumerationLimits::default();
        let sink = CollectSink::default();

        let outcome = ContigEnumerator::new(&g, &limits).enumerate(nmap["AAC"], &sink);
        assert_eq!(outcome.status, AssemblyStatus::Ok);
        assert_eq!(outcome.emitted, 3);
        assert_eq!(outcome.paths, 4);

        // Every sibling is scored against the same total (2 + 3 + 5)
        let mut scored: Vec<(String, f64)> = sink.0.borrow().iter()
            .map(|c| (String::from_utf8_lossy(&c.sequence).into_owned(), c.score))
            .collect();
        scored.sort_by(|a, b| a.0.cmp(&b.0));

        let expected = [("AACA", 2f64), ("AACG", 3f64), ("AACT", 5f64)];
        assert_eq!(scored.len(), expected.len());
        for ((seq, score), (exp_seq, freq)) in scored.iter().zip(expected) {
            assert_eq!(seq, exp_seq);
            assert!((score - (freq.log10() - 10f64.log10())).abs() < 1e-12);
        }
    }

    #[test]
    fn test_path_ceiling_wins_tie() {
        let (g, nmap) = create_fork_graph();
        let limits = EnumerationLimits {
            max_contigs: 0,
            max_paths_from_root: 1,
            ..Default::default()
        };
        let sink = CollectSink::default();

        // The first extension trips both ceilings at once
        let outcome = ContigEnumerator::new(&g, &limits).enumerate(nmap["AACG"], &sink);
        assert_eq!(outcome.status, AssemblyStatus::TooManyPathsFromRoot);
        assert_eq!(outcome.emitted, 0);
        assert_eq!(outcome.paths, 2);
    }

    #[test]
    fn test_maximal_paths() {
        // Two forks, three distinct maximal paths
        let (g, nmap) = build_graph(
            &[("AAC", 1), ("ACA", 1), ("ACG", 1), ("CAT", 1), ("CGT", 1), ("GTA", 1), ("GTC", 1)],
            &[
                ("AAC", "ACA"), ("AAC", "ACG"),
                ("ACA", "CAT"),
                ("ACG", "CGT"),
                ("CGT", "GTA"), ("CGT", "GTC"),
            ],
        );
        let limits = EnumerationLimits::default();
        let sink = CollectSink::default();

        let outcome = ContigEnumerator::new(&g, &limits).enumerate(nmap["AAC"], &sink);
        assert_eq!(outcome.status, AssemblyStatus::Ok);
        assert_eq!(outcome.emitted, 3);

        let mut seqs = sink.sequences();
        seqs.sort();
        assert_eq!(seqs, vec!["AACAT", "AACGTA", "AACGTC"]);
    }

    #[test]
    fn test_repeat_on_sixth_visit() {
        let (g, nmap) = create_cycle_graph();
        let limits = EnumerationLimits::default();
        let sink = CollectSink::default();

        let outcome = ContigEnumerator::new(&g, &limits).enumerate(nmap["TTAC"], &sink);

        assert_eq!(outcome.status, AssemblyStatus::Ok);
        assert_eq!(outcome.emitted, 1);

        // TACA and ACAC are each extended through five times before the sixth
        // arrival at TACA ends the walk.
        let contigs = sink.0.borrow();
        assert!(contigs[0].is_repeat);
        assert_eq!(contigs[0].sequence, b"TTATATATATA");
    }

    #[test]
    fn test_stop_on_repeat() {
        let (g, nmap) = create_cycle_graph();
        let limits = EnumerationLimits {
            stop_on_repeat: true,
            ..Default::default()
        };
        let sink = CollectSink::default();

        let outcome = ContigEnumerator::new(&g, &limits).enumerate(nmap["TTAC"], &sink);

        assert_eq!(outcome.status, AssemblyStatus::StoppedOnRepeat);
        assert!(outcome.status.is_fatal());
        assert_eq!(outcome.emitted, 0);
        assert_eq!(outcome.held, 1);
        assert!(sink.0.borrow().is_empty());
    }

    #[test]
    fn test_too_many_contigs() {
        let (g, nmap) = create_fork_graph();
        let limits = EnumerationLimits {
            max_contigs: 1,
            ..Default::default()
        };
        let sink = CollectSink::default();

        let outcome = ContigEnumerator::new(&g, &limits).enumerate(nmap["AACG"], &sink);

        assert_eq!(outcome.status, AssemblyStatus::TooManyContigs);
        assert_eq!(outcome.emitted, 1);
        assert_eq!(sink.0.borrow().len(), 1);
    }

    #[test]
    fn test_single_contig_at_ceiling_is_ok() {
        let (g, nmap) = create_linear_graph();
        let limits = EnumerationLimits {
            max_contigs: 1,
            ..Default::default()
        };
        let sink = CollectSink::default();

        let outcome = ContigEnumerator::new(&g, &limits).enumerate(nmap["AACG"], &sink);
        assert_eq!(outcome.status, AssemblyStatus::Ok);
        assert_eq!(outcome.emitted, 1);
    }

    #[test]
    fn test_too_many_paths_is_soft() {
        let (g, nmap) = create_fork_graph();
        let limits = EnumerationLimits {
            max_paths_from_root: 4,
            ..Default::default()
        };
        let sink = CollectSink::default();

        let outcome = ContigEnumerator::new(&g, &limits).enumerate(nmap["AACG"], &sink);

        assert_eq!(outcome.status, AssemblyStatus::TooManyPathsFromRoot);
        assert!(!outcome.status.is_fatal());
        assert_eq!(outcome.emitted, 0);
    }

    #[test]
    fn test_low_score_terminates() {
        let (g, nmap) = create_fork_graph();
        let limits = EnumerationLimits {
            min_contig_score: -0.5,
            ..Default::default()
        };
        let sink = CollectSink::default();

        ContigEnumerator::new(&g, &limits).enumerate(nmap["AACG"], &sink);

        // The CGTC branch drops below the threshold on arrival and ends there with
        // its full k-mer; the CGTA branch continues.
        assert_eq!(sink.sequences(), vec!["AACGTC", "AACGTAA"]);
    }

    #[test]
    fn test_max_contig_len_terminates() {
        let (g, nmap) = create_cycle_graph();
        let limits = EnumerationLimits {
            max_contig_len: 8,
            ..Default::default()
        };
        let sink = CollectSink::default();

        ContigEnumerator::new(&g, &limits).enumerate(nmap["TTAC"], &sink);

        // Extension stops once the length reaches 8 - 4 - 1 = 3
        let contigs = sink.0.borrow();
        assert!(!contigs[0].is_repeat);
        assert_eq!(contigs[0].sequence, b"TTATACA");
    }

    #[test]
    fn test_hold_output() {
        let (g, nmap) = create_fork_graph();
        let limits = EnumerationLimits {
            hold_output: true,
            ..Default::default()
        };
        let sink = CollectSink::default();

        let outcome = ContigEnumerator::new(&g, &limits).enumerate(nmap["AACG"], &sink);
        assert_eq!(outcome.status, AssemblyStatus::Ok);
        assert_eq!(outcome.held, 2);
        assert_eq!(outcome.emitted, 0);
        assert!(sink.0.borrow().is_empty());
    }
}
