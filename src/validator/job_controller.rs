//! Job scheduling between the main thread and a thread pool
//!
//! Two unbounded queues:
//! - main-thread jobs, run only inside [`JobController::service_main_thread`]
//!   on the thread that owns the host
//! - parallel jobs, grouped into batches of `batch_size` and run on rayon
//!
//! Counters:
//! - `jobs_max` grows by one per main-thread job at enqueue time and by one
//!   per launched batch
//! - `jobs_done` grows by one when a main-thread job or a whole batch
//!   finishes, even if it panicked
//!
//! A panicking job is recorded as a [`JobFailure`] and never unwinds into the
//! caller.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_queue::SegQueue;

use super::config::{ValidatorConfig, BATCH_SIZE};
use super::diagnostic::Diagnostic;
use super::errors::{JobFailure, ValidatorError, ValidatorResult};
use crate::host::Host;

/// Main-thread side of a run: the host plus the diagnostic list.
///
/// Only main-thread jobs receive it, so only they can touch the host or
/// append diagnostics.
pub struct MainThread<'h> {
    host: &'h dyn Host,
    diagnostics: Vec<Diagnostic>,
}

impl<'h> MainThread<'h> {
    pub fn new(host: &'h dyn Host) -> Self {
        Self {
            host,
            diagnostics: Vec::new(),
        }
    }

    pub fn host(&self) -> &'h dyn Host {
        self.host
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

pub type MainThreadJob = Box<dyn FnOnce(&mut MainThread<'_>) + Send + 'static>;
pub type ParallelJob = Box<dyn FnOnce() + Send + 'static>;

/// What the caller of `service_main_thread` should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainThreadAction {
    RerunImmediately,
    RerunAfterDelay,
    Halt,
}

struct Inner {
    main_jobs: SegQueue<MainThreadJob>,
    parallel_jobs: SegQueue<ParallelJob>,
    failures: SegQueue<JobFailure>,
    jobs_done: AtomicU64,
    jobs_max: AtomicU64,
    running_batches: AtomicU64,
    batches_launched: AtomicU64,
    batch_size: usize,
    pool: Option<Arc<rayon::ThreadPool>>,
}

/// Cheap to clone; clones share the same queues and counters.
#[derive(Clone)]
pub struct JobController {
    inner: Arc<Inner>,
}

impl Default for JobController {
    fn default() -> Self {
        Self::new()
    }
}

impl JobController {
    pub fn new() -> Self {
        Self::with_batch_size(BATCH_SIZE)
    }

    pub fn with_batch_size(batch_size: usize) -> Self {
        Self::build(batch_size.max(1), None)
    }

    /// Uses a dedicated pool when `worker_threads` is set, else the global one.
    pub fn from_config(config: &ValidatorConfig) -> ValidatorResult<Self> {
        let pool = if config.worker_threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.worker_threads)
                .thread_name(|i| format!("objval-batch-{}", i))
                .build()
                .map_err(|e| ValidatorError::ThreadPool(e.to_string()))?;
            Some(Arc::new(pool))
        } else {
            None
        };
        Ok(Self::build(config.batch_size.max(1), pool))
    }

    fn build(batch_size: usize, pool: Option<Arc<rayon::ThreadPool>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                main_jobs: SegQueue::new(),
                parallel_jobs: SegQueue::new(),
                failures: SegQueue::new(),
                jobs_done: AtomicU64::new(0),
                jobs_max: AtomicU64::new(0),
                running_batches: AtomicU64::new(0),
                batches_launched: AtomicU64::new(0),
                batch_size,
                pool,
            }),
        }
    }

    pub fn enqueue_main_thread_job<F>(&self, job: F)
    where
        F: FnOnce(&mut MainThread<'_>) + Send + 'static,
    {
        self.inner.jobs_max.fetch_add(1, Ordering::SeqCst);
        self.inner.main_jobs.push(Box::new(job));
    }

    /// Queues a job for a later batch. Not counted until its batch launches.
    pub fn enqueue_parallel_job<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.parallel_jobs.push(Box::new(job));
    }

    /// Launches full batches, plus a final partial one when `force_under_batch_size`.
    /// Returns whether anything was launched.
    pub fn launch_parallel_jobs(&self, force_under_batch_size: bool) -> bool {
        let batch_size = self.inner.batch_size;
        let mut launched = false;

        loop {
            let queued = self.inner.parallel_jobs.len();
            if queued < batch_size && !(force_under_batch_size && queued > 0) {
                break;
            }
            let mut batch = Vec::with_capacity(batch_size);
            while batch.len() < batch_size {
                match self.inner.parallel_jobs.pop() {
                    Some(job) => batch.push(job),
                    None => break,
                }
            }
            if batch.is_empty() {
                break;
            }
            self.launch_batch(batch);
            launched = true;
        }
        launched
    }

    fn launch_batch(&self, batch: Vec<ParallelJob>) {
        let inner = Arc::clone(&self.inner);
        inner.jobs_max.fetch_add(1, Ordering::SeqCst);
        inner.running_batches.fetch_add(1, Ordering::SeqCst);
        inner.batches_launched.fetch_add(1, Ordering::Relaxed);

        let task_inner = Arc::clone(&inner);
        let task = move || {
            for job in batch {
                if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
                    task_inner
                        .failures
                        .push(JobFailure::new("parallel", panic_message(payload.as_ref())));
                }
            }
            task_inner.jobs_done.fetch_add(1, Ordering::SeqCst);
            task_inner.running_batches.fetch_sub(1, Ordering::SeqCst);
        };

        match &inner.pool {
            Some(pool) => pool.spawn(task),
            None => rayon::spawn(task),
        }
    }

    /// One scheduling step. Call repeatedly from the main thread until it
    /// returns [`MainThreadAction::Halt`].
    pub fn service_main_thread(
        &self,
        force_under_batch_size: bool,
        main: &mut MainThread<'_>,
    ) -> MainThreadAction {
        if self.launch_parallel_jobs(force_under_batch_size) {
            return MainThreadAction::RerunImmediately;
        }

        let mut ran_any = false;
        while let Some(job) = self.inner.main_jobs.pop() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| job(main))) {
                self.inner
                    .failures
                    .push(JobFailure::new("main", panic_message(payload.as_ref())));
            }
            self.inner.jobs_done.fetch_add(1, Ordering::SeqCst);
            ran_any = true;
        }
        if ran_any {
            return MainThreadAction::RerunImmediately;
        }

        if self.inner.running_batches.load(Ordering::SeqCst) != 0 {
            return MainThreadAction::RerunAfterDelay;
        }
        // A batch may have queued more work just before finishing.
        if self.inner.main_jobs.is_empty() && self.inner.parallel_jobs.is_empty() {
            MainThreadAction::Halt
        } else {
            MainThreadAction::RerunImmediately
        }
    }

    pub fn jobs_done(&self) -> u64 {
        self.inner.jobs_done.load(Ordering::SeqCst)
    }

    pub fn jobs_max(&self) -> u64 {
        self.inner.jobs_max.load(Ordering::SeqCst)
    }

    pub fn running_batches(&self) -> u64 {
        self.inner.running_batches.load(Ordering::SeqCst)
    }

    pub fn batches_launched(&self) -> u64 {
        self.inner.batches_launched.load(Ordering::Relaxed)
    }

    pub fn pending_main_jobs(&self) -> usize {
        self.inner.main_jobs.len()
    }

    pub fn pending_parallel_jobs(&self) -> usize {
        self.inner.parallel_jobs.len()
    }

    pub fn failure_count(&self) -> usize {
        self.inner.failures.len()
    }

    /// Removes and returns every recorded failure, oldest first.
    pub fn take_failures(&self) -> Vec<JobFailure> {
        let mut out = Vec::with_capacity(self.inner.failures.len());
        while let Some(failure) = self.inner.failures.pop() {
            out.push(failure);
        }
        out
    }

    pub fn is_idle(&self) -> bool {
        self.pending_main_jobs() == 0
            && self.pending_parallel_jobs() == 0
            && self.running_batches() == 0
    }
}

impl fmt::Display for JobController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "main={}, batched={}, jobs={}/{}, running={}",
            self.pending_main_jobs(),
            self.pending_parallel_jobs(),
            self.jobs_done(),
            self.jobs_max(),
            self.running_batches()
        )
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryHost;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn drain(controller: &JobController, main: &mut MainThread<'_>) {
        loop {
            match controller.service_main_thread(true, main) {
                MainThreadAction::Halt => break,
                MainThreadAction::RerunAfterDelay => std::thread::sleep(Duration::from_millis(1)),
                MainThreadAction::RerunImmediately => {}
            }
        }
    }

    #[test]
    fn test_empty_controller_halts() {
        let host = InMemoryHost::new();
        let mut main = MainThread::new(&host);
        let controller = JobController::new();
        assert_eq!(
            controller.service_main_thread(true, &mut main),
            MainThreadAction::Halt
        );
        assert_eq!(controller.jobs_done(), 0);
        assert_eq!(controller.jobs_max(), 0);
    }

    #[test]
    fn test_main_job_counted_at_enqueue() {
        let host = InMemoryHost::new();
        let mut main = MainThread::new(&host);
        let controller = JobController::new();

        controller.enqueue_main_thread_job(|main| {
            main.push(Diagnostic::asset_corrupted("a", "b"));
        });
        assert_eq!(controller.jobs_max(), 1);
        assert_eq!(controller.jobs_done(), 0);

        assert_eq!(
            controller.service_main_thread(false, &mut main),
            MainThreadAction::RerunImmediately
        );
        assert_eq!(controller.jobs_done(), 1);
        assert_eq!(main.diagnostics().len(), 1);
        assert_eq!(
            controller.service_main_thread(false, &mut main),
            MainThreadAction::Halt
        );
    }

    #[test]
    fn test_under_batch_size_not_launched() {
        let controller = JobController::new();
        for _ in 0..(BATCH_SIZE - 2) {
            controller.enqueue_parallel_job(|| {});
        }
        assert!(!controller.launch_parallel_jobs(false));
        assert_eq!(controller.jobs_max(), 0);
        assert_eq!(controller.pending_parallel_jobs(), BATCH_SIZE - 2);
    }

    #[test]
    fn test_exact_batch_size_launches_one_batch() {
        let host = InMemoryHost::new();
        let mut main = MainThread::new(&host);
        let controller = JobController::new();
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..BATCH_SIZE {
            let ran = Arc::clone(&ran);
            controller.enqueue_parallel_job(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(controller.launch_parallel_jobs(false));
        assert_eq!(controller.batches_launched(), 1);
        assert_eq!(controller.jobs_max(), 1);
        assert_eq!(controller.pending_parallel_jobs(), 0);

        drain(&controller, &mut main);
        assert_eq!(ran.load(Ordering::SeqCst), BATCH_SIZE);
        assert_eq!(controller.jobs_done(), controller.jobs_max());
    }

    #[test]
    fn test_force_launches_partial_batch() {
        let controller = JobController::with_batch_size(10);
        for _ in 0..25 {
            controller.enqueue_parallel_job(|| {});
        }
        assert!(controller.launch_parallel_jobs(false));
        assert_eq!(controller.batches_launched(), 2);
        assert_eq!(controller.pending_parallel_jobs(), 5);

        assert!(controller.launch_parallel_jobs(true));
        assert_eq!(controller.batches_launched(), 3);
        assert_eq!(controller.pending_parallel_jobs(), 0);
    }

    #[test]
    fn test_parallel_jobs_can_queue_main_jobs() {
        let host = InMemoryHost::new();
        let mut main = MainThread::new(&host);
        let controller = JobController::with_batch_size(4);
        for i in 0..10 {
            let c = controller.clone();
            controller.enqueue_parallel_job(move || {
                c.enqueue_main_thread_job(move |main| {
                    main.push(Diagnostic::asset_corrupted(format!("asset{}", i), "bad"));
                });
            });
        }
        drain(&controller, &mut main);

        assert_eq!(main.diagnostics().len(), 10);
        assert_eq!(controller.jobs_done(), controller.jobs_max());
        assert!(controller.is_idle());
    }

    #[test]
    fn test_panics_are_captured() {
        let host = InMemoryHost::new();
        let mut main = MainThread::new(&host);
        let controller = JobController::with_batch_size(2);
        controller.enqueue_parallel_job(|| panic!("parallel boom"));
        controller.enqueue_parallel_job(|| {});
        controller.enqueue_main_thread_job(|_| panic!("main boom"));

        drain(&controller, &mut main);

        assert_eq!(controller.jobs_done(), controller.jobs_max());
        let failures = controller.take_failures();
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().any(|f| f.queue == "main" && f.message == "main boom"));
        assert!(failures
            .iter()
            .any(|f| f.queue == "parallel" && f.message == "parallel boom"));
        assert_eq!(controller.failure_count(), 0);
    }

    #[test]
    fn test_dedicated_pool() {
        let host = InMemoryHost::new();
        let mut main = MainThread::new(&host);
        let config = ValidatorConfig {
            worker_threads: 2,
            batch_size: 3,
            ..ValidatorConfig::default()
        };
        let controller = JobController::from_config(&config).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..7 {
            let ran = Arc::clone(&ran);
            controller.enqueue_parallel_job(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            });
        }
        drain(&controller, &mut main);
        assert_eq!(ran.load(Ordering::SeqCst), 7);
        assert_eq!(controller.batches_launched(), 3);
    }

    #[test]
    fn test_display() {
        let controller = JobController::new();
        controller.enqueue_main_thread_job(|_| {});
        assert_eq!(
            controller.to_string(),
            "main=1, batched=0, jobs=0/1, running=0"
        );
    }
}
