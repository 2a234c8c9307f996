//! Parallel contig enumeration over batches of roots.
//!
//! A fixed number of workers pull batches of roots from a rendezvous channel, so the
//! dispatcher blocks while every worker is busy. The graph is shared read-only between
//! all workers.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, SendTimeoutError};
use tracing::{debug, error, info, warn};

use crate::assembler::enumerate::{ContigEnumerator, ContigSink};
use crate::config::{DriverParams, EnumerationLimits, FailurePolicy};
use crate::errors::{AssemblyError, AssemblyStatus};
use crate::external::RootScorer;
use crate::graphs::AssemblyGraph;

/// A root whose enumeration ended with a fatal status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootFailure {
    pub root: String,
    pub status: AssemblyStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverReport {
    pub batches: usize,
    pub roots_enumerated: usize,
    pub roots_skipped: usize,
    /// Roots whose search stopped at the path ceiling; their contigs are kept
    pub roots_truncated: usize,
    pub contigs_emitted: usize,
    pub failures: Vec<RootFailure>,
}

impl DriverReport {
    fn merge(&mut self, other: DriverReport) {
        self.batches += other.batches;
        self.roots_enumerated += other.roots_enumerated;
        self.roots_skipped += other.roots_skipped;
        self.roots_truncated += other.roots_truncated;
        self.contigs_emitted += other.contigs_emitted;
        self.failures.extend(other.failures);
    }
}

/// Everything a worker needs, shared by reference between all of them.
pub struct EnumerationDriver<'a, G, R: ?Sized, S> {
    graph: &'a G,
    scorer: &'a R,
    sink: &'a S,
    limits: &'a EnumerationLimits,
    params: &'a DriverParams,
    min_homology_score: i32,
    abort: AtomicBool,
    roots_done: AtomicUsize,
}

impl<'a, G, R, S> EnumerationDriver<'a, G, R, S>
where
    G: AssemblyGraph + Sync,
    R: RootScorer + ?Sized,
    S: ContigSink + Sync,
{
    pub fn new(
        graph: &'a G,
        scorer: &'a R,
        sink: &'a S,
        limits: &'a EnumerationLimits,
        params: &'a DriverParams,
        min_homology_score: i32,
    ) -> Self {
        EnumerationDriver {
            graph,
            scorer,
            sink,
            limits,
            params,
            min_homology_score,
            abort: AtomicBool::new(false),
            roots_done: AtomicUsize::new(0),
        }
    }

    /// Gate and enumerate every root of a batch in order.
    fn run_batch(&self, batch: &[G::NodeIndex]) -> DriverReport {
        let enumerator = ContigEnumerator::new(self.graph, self.limits);
        let mut report = DriverReport { batches: 1, ..Default::default() };

        for &root in batch {
            if self.abort.load(Ordering::Relaxed) {
                break;
            }

            let kmer = self.graph.kmer(root);
            let score = self.scorer.homology_score(kmer);
            if score < self.min_homology_score {
                debug!(score, kmer = %self.graph.kmer_string(root), "Skipping root");
                report.roots_skipped += 1;
                continue;
            }

            let outcome = enumerator.enumerate(root, self.sink);
            report.contigs_emitted += outcome.emitted;
            report.roots_enumerated += 1;

            let done = self.roots_done.fetch_add(1, Ordering::Relaxed) + 1;
            if done % 100 == 0 {
                info!(roots = done, "Processed roots");
            }

            if outcome.status == AssemblyStatus::TooManyPathsFromRoot {
                warn!(kmer = %self.graph.kmer_string(root), paths = outcome.paths, "Too many paths from root, keeping partial result");
                report.roots_truncated += 1;
            } else if outcome.status.is_fatal() {
                let failure = RootFailure { root: self.graph.kmer_string(root), status: outcome.status };

                match self.params.failure_policy {
                    FailurePolicy::Abort => {
                        error!(root = failure.root, status = %failure.status, "Enumeration failed, aborting run");
                        self.abort.store(true, Ordering::Relaxed);
                        report.failures.push(failure);
                        break;
                    },
                    FailurePolicy::PerRoot => {
                        warn!(root = failure.root, status = %failure.status, "Enumeration failed for root");
                        report.failures.push(failure);
                    }
                }
            }
        }

        report
    }

    fn heartbeat(&self, start: Instant, dispatched: usize, total: usize) {
        info!(
            elapsed_secs = start.elapsed().as_secs(),
            batches_dispatched = dispatched,
            batches_total = total,
            roots_done = self.roots_done.load(Ordering::Relaxed),
            "STATUS_UPDATE"
        );
    }

    /// Enumerate contigs from all `roots` using the configured number of workers.
    ///
    /// With [`FailurePolicy::Abort`], the first fatal status stops dispatch and is
    /// returned as [`AssemblyError::Aborted`].
    pub fn run(&self, roots: &[G::NodeIndex]) -> Result<DriverReport, AssemblyError> {
        let batches: Vec<&[G::NodeIndex]> = roots.chunks(self.params.roots_per_batch.max(1)).collect();
        let num_batches = batches.len();
        let heartbeat = Duration::from_secs(self.params.heartbeat_secs.max(1));
        let start = Instant::now();

        info!(roots = roots.len(), batches = num_batches, threads = self.params.threads, "Starting contig enumeration");

        let (job_tx, job_rx) = crossbeam_channel::bounded::<&[G::NodeIndex]>(0);
        let (done_tx, done_rx) = crossbeam_channel::unbounded::<DriverReport>();

        let mut report = DriverReport::default();

        thread::scope(|scope| {
            for _ in 0..self.params.threads.max(1) {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();

                scope.spawn(move || {
                    while let Ok(batch) = job_rx.recv() {
                        if done_tx.send(self.run_batch(batch)).is_err() {
                            break;
                        }
                    }
                });
            }

            drop(job_rx);
            drop(done_tx);

            'dispatch: for (ix, batch) in batches.into_iter().enumerate() {
                let mut batch = batch;
                loop {
                    if self.abort.load(Ordering::Relaxed) {
                        break 'dispatch;
                    }

                    match job_tx.send_timeout(batch, heartbeat) {
                        Ok(()) => break,
                        Err(SendTimeoutError::Timeout(b)) => {
                            self.heartbeat(start, ix, num_batches);
                            batch = b;
                        },
                        Err(SendTimeoutError::Disconnected(_)) => break 'dispatch,
                    }
                }
            }

            drop(job_tx);

            loop {
                match done_rx.recv_timeout(heartbeat) {
                    Ok(batch_report) => report.merge(batch_report),
                    Err(RecvTimeoutError::Timeout) => self.heartbeat(start, num_batches, num_batches),
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        info!(
            roots_enumerated = report.roots_enumerated,
            roots_skipped = report.roots_skipped,
            contigs = report.contigs_emitted,
            failures = report.failures.len(),
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Contig enumeration done"
        );

        if self.params.failure_policy == FailurePolicy::Abort {
            if let Some(failure) = report.failures.first() {
                return Err(AssemblyError::Aborted { root: failure.root.clone(), status: failure.status });
            }
        }

        Ok(report)
    }
}
