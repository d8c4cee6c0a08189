//! Compilation Scheduler
//!
//! Runs [`PendingJob`]s on a fixed pool of background workers and reports each
//! completion into the [`ProgramCache`].
//!
//! Jobs flow through an unbounded `flume` channel, so [`submit`] never waits
//! on compilation. Workers compile outside any cache lock and report with a
//! short write lock. The two jobs of one key may finish in either order; the
//! cache joins them.
//!
//! [`abort`] is best-effort: queued jobs are discarded, jobs already inside
//! the compiler finish and report normally. [`shutdown`] aborts, closes the
//! queue and joins every worker, after which no further reports can arrive.
//!
//! [`submit`]: CompilationScheduler::submit
//! [`abort`]: CompilationScheduler::abort
//! [`shutdown`]: CompilationScheduler::shutdown

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use super::cache::ProgramCache;
use super::enumerator::PendingJob;
use crate::compiler::{CompileError, CompileRequest, ProgramCompiler};
use crate::errors::{Result, VariantError};

// ─── Progress ────────────────────────────────────────────────────────────────

/// Snapshot of scheduler progress, for the external progress indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompileProgress {
    /// Jobs that ran to completion, successfully or not.
    pub completed: usize,
    /// Subset of `completed` that failed.
    pub failed: usize,
    /// Jobs dropped from the queue after an abort.
    pub discarded: usize,
    /// Jobs submitted so far.
    pub total: usize,
}

impl CompileProgress {
    /// Jobs that will never run again (completed or discarded).
    #[inline]
    #[must_use]
    pub fn finished(&self) -> usize {
        self.completed + self.discarded
    }

    /// Completion ratio in `[0, 1]`. An empty scheduler reports `1.0`.
    #[must_use]
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        (self.finished() as f32 / self.total as f32).min(1.0)
    }

    #[inline]
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.finished() >= self.total
    }
}

impl fmt::Display for CompileProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Compiling shaders {}/{} ({:.0}%)",
            self.finished(),
            self.total,
            self.fraction() * 100.0
        )?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        Ok(())
    }
}

// ─── Shared State ────────────────────────────────────────────────────────────

struct SchedulerShared<C: ProgramCompiler> {
    compiler: C,
    cache: Arc<ProgramCache<C::Program>>,
    total: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    discarded: AtomicUsize,
    aborted: AtomicBool,
}

impl<C: ProgramCompiler> SchedulerShared<C> {
    fn run(&self, job: &PendingJob) {
        let started = Instant::now();
        let request = CompileRequest::from(job);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.compiler.compile(&request)))
            .unwrap_or_else(|_| Err(CompileError::new("compiler panicked")));

        let report = match outcome {
            Ok(program) => {
                log::debug!(
                    "Compiled {} program for {} in {:.1?}",
                    job.stage,
                    job.key,
                    started.elapsed()
                );
                self.cache.mark_stage_ready(job.key, job.stage, program)
            }
            Err(err) => {
                log::error!(
                    "Failed to compile {} program ({}) for {}: {err}",
                    job.stage,
                    job.entry_point,
                    job.key
                );
                self.failed.fetch_add(1, Ordering::Relaxed);
                self.cache.mark_stage_failed(job.key, job.stage, err.message())
            }
        };

        if let Err(err) = report {
            log::error!("Compile report rejected by ProgramCache: {err}");
        }

        // Counted only after the cache has seen the report.
        self.completed.fetch_add(1, Ordering::AcqRel);
    }

    fn progress(&self) -> CompileProgress {
        CompileProgress {
            completed: self.completed.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Acquire),
            total: self.total.load(Ordering::Acquire),
        }
    }
}

fn worker_loop<C: ProgramCompiler>(
    shared: &SchedulerShared<C>,
    receiver: &flume::Receiver<PendingJob>,
) {
    while let Ok(job) = receiver.recv() {
        if shared.aborted.load(Ordering::Acquire) {
            shared.discarded.fetch_add(1, Ordering::AcqRel);
            continue;
        }
        shared.run(&job);
    }
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

/// Background compile pool reporting into a shared [`ProgramCache`].
pub struct CompilationScheduler<C: ProgramCompiler> {
    shared: Arc<SchedulerShared<C>>,
    sender: Option<flume::Sender<PendingJob>>,
    workers: Vec<JoinHandle<()>>,
}

impl<C: ProgramCompiler> CompilationScheduler<C> {
    /// Starts `worker_count` (at least one) compile workers.
    pub fn new(
        compiler: C,
        cache: Arc<ProgramCache<C::Program>>,
        worker_count: usize,
    ) -> Result<Self> {
        let shared = Arc::new(SchedulerShared {
            compiler,
            cache,
            total: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            discarded: AtomicUsize::new(0),
            aborted: AtomicBool::new(false),
        });

        let (sender, receiver) = flume::unbounded::<PendingJob>();
        let worker_count = worker_count.max(1);
        let mut workers = Vec::with_capacity(worker_count);

        for index in 0..worker_count {
            let shared = Arc::clone(&shared);
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("tessel-compile-{index}"))
                .spawn(move || worker_loop(&shared, &receiver));

            match handle {
                Ok(handle) => workers.push(handle),
                Err(err) if workers.is_empty() => return Err(VariantError::WorkerSpawn(err)),
                Err(err) => {
                    log::warn!("Compile worker {index} failed to start: {err}");
                    break;
                }
            }
        }

        log::info!("CompilationScheduler started with {} workers", workers.len());

        Ok(Self {
            shared,
            sender: Some(sender),
            workers,
        })
    }

    /// Enqueues jobs for background compilation and returns immediately.
    pub fn submit(&self, jobs: impl IntoIterator<Item = PendingJob>) -> Result<()> {
        if self.shared.aborted.load(Ordering::Acquire) {
            return Err(VariantError::SchedulerStopped);
        }
        let sender = self.sender.as_ref().ok_or(VariantError::SchedulerStopped)?;

        let jobs: Vec<PendingJob> = jobs.into_iter().collect();
        let count = jobs.len();
        // Total first, so progress never reports drained while jobs are queued.
        self.shared.total.fetch_add(count, Ordering::AcqRel);

        for (sent, job) in jobs.into_iter().enumerate() {
            if sender.send(job).is_err() {
                self.shared.total.fetch_sub(count - sent, Ordering::AcqRel);
                return Err(VariantError::SchedulerStopped);
            }
        }

        log::info!("Submitted {count} compile jobs");
        Ok(())
    }

    /// Non-blocking progress snapshot.
    #[must_use]
    pub fn poll_progress(&self) -> CompileProgress {
        self.shared.progress()
    }

    /// `true` once every submitted job has completed (or been discarded) and
    /// reported to the cache.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.poll_progress().is_drained()
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.shared.aborted.load(Ordering::Acquire)
    }

    /// Requests cancellation of queued jobs. In-flight jobs still report.
    pub fn abort(&self) {
        if !self.shared.aborted.swap(true, Ordering::AcqRel) {
            let progress = self.poll_progress();
            log::info!(
                "CompilationScheduler aborted with {} of {} jobs finished",
                progress.finished(),
                progress.total
            );
        }
    }

    /// Closes the queue and blocks until every submitted job has run.
    ///
    /// Intended for tools and tests; the render loop polls instead.
    pub fn wait_drained(&mut self) {
        self.sender = None;
        self.join_workers();
    }

    /// Aborts, closes the queue and joins every worker. Idempotent.
    ///
    /// After this returns no further reports reach the cache.
    pub fn shutdown(&mut self) {
        self.abort();
        self.sender = None;
        self.join_workers();
    }

    fn join_workers(&mut self) {
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Compile worker panicked during shutdown");
            }
        }
    }
}

impl<C: ProgramCompiler> Drop for CompilationScheduler<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variants::{FeatureFlags, VariantEnumerator, VariantKey, VariantStatus};

    struct EchoCompiler;

    impl ProgramCompiler for EchoCompiler {
        type Program = String;

        fn compile(
            &self,
            request: &CompileRequest<'_>,
        ) -> std::result::Result<String, CompileError> {
            Ok(format!("{}:{}", request.entry_point, request.key.bits()))
        }
    }

    struct PanickingCompiler;

    impl ProgramCompiler for PanickingCompiler {
        type Program = ();

        fn compile(
            &self,
            _request: &CompileRequest<'_>,
        ) -> std::result::Result<(), CompileError> {
            panic!("boom");
        }
    }

    #[test]
    fn test_progress_display_and_fraction() {
        let progress = CompileProgress {
            completed: 40,
            failed: 0,
            discarded: 0,
            total: 160,
        };
        assert!((progress.fraction() - 0.25).abs() < f32::EPSILON);
        assert_eq!(progress.to_string(), "Compiling shaders 40/160 (25%)");
        assert!(!progress.is_drained());
        assert!(CompileProgress::default().is_drained());
    }

    #[test]
    fn test_progress_display_counts_discarded_jobs() {
        let progress = CompileProgress {
            completed: 1,
            failed: 0,
            discarded: 159,
            total: 160,
        };
        assert!(progress.is_drained());
        assert_eq!(progress.to_string(), "Compiling shaders 160/160 (100%)");

        let partial = CompileProgress {
            completed: 30,
            failed: 2,
            discarded: 10,
            total: 160,
        };
        assert_eq!(
            partial.to_string(),
            "Compiling shaders 40/160 (25%), 2 failed"
        );
    }

    #[test]
    fn test_jobs_compile_and_join() {
        let cache = Arc::new(ProgramCache::new());
        let enumerator = VariantEnumerator::default();
        let key = VariantKey::from(FeatureFlags::PHONG | FeatureFlags::ORIENT_ADAPT);
        cache.ensure(key);

        let mut scheduler = CompilationScheduler::new(EchoCompiler, Arc::clone(&cache), 2).unwrap();
        scheduler.submit(enumerator.jobs_for(key)).unwrap();
        scheduler.wait_drained();

        let progress = scheduler.poll_progress();
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.total, 2);
        assert!(scheduler.is_drained());

        match cache.lookup(key) {
            VariantStatus::Ready(variant) => {
                assert_eq!(variant.subdivision(), "HS_PNTriangles:136");
                assert_eq!(variant.evaluation(), "DS_PNTriangles:136");
            }
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn test_compiler_panic_is_recorded_as_failure() {
        let cache = Arc::new(ProgramCache::new());
        let key = VariantKey::from(FeatureFlags::PNTRI);
        cache.ensure(key);

        let mut scheduler =
            CompilationScheduler::new(PanickingCompiler, Arc::clone(&cache), 1).unwrap();
        scheduler
            .submit(VariantEnumerator::default().jobs_for(key))
            .unwrap();
        scheduler.wait_drained();

        assert_eq!(scheduler.poll_progress().failed, 2);
        assert!(matches!(cache.lookup(key), VariantStatus::Failed(_)));
    }

    #[test]
    fn test_submit_after_abort_is_rejected() {
        let cache = Arc::new(ProgramCache::new());
        let mut scheduler = CompilationScheduler::new(EchoCompiler, cache, 1).unwrap();

        scheduler.abort();
        assert!(scheduler.is_aborted());
        let jobs = VariantEnumerator::default().jobs_for(VariantKey::from(FeatureFlags::PHONG));
        assert!(matches!(
            scheduler.submit(jobs),
            Err(VariantError::SchedulerStopped)
        ));

        scheduler.shutdown();
        scheduler.shutdown();
    }
}
