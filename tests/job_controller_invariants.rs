//! Job Controller Invariant Tests
//!
//! - Parallel jobs launch only in full batches unless forced
//! - jobs_done catches up with jobs_max once the controller halts
//! - A panicking job is counted as done and captured, never propagated
//! - The aggregate failure keeps at most 25 inner failures

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use objval::host::InMemoryHost;
use objval::validator::{
    JobController, MainThread, MainThreadAction, ValidatorError, BATCH_SIZE,
    MAX_REPORTED_FAILURES,
};

// =============================================================================
// Helper Functions
// =============================================================================

/// Services the controller the way the driver does until it halts.
fn drain(jobs: &JobController, main: &mut MainThread<'_>) {
    loop {
        match jobs.service_main_thread(true, main) {
            MainThreadAction::RerunImmediately => {}
            MainThreadAction::RerunAfterDelay => thread::sleep(Duration::from_millis(1)),
            MainThreadAction::Halt => break,
        }
    }
}

// =============================================================================
// Batching
// =============================================================================

/// Fewer than BATCH_SIZE - 1 jobs never launch without force.
#[test]
fn test_partial_batch_not_launched() {
    let jobs = JobController::new();
    for _ in 0..BATCH_SIZE - 2 {
        jobs.enqueue_parallel_job(|| {});
    }
    assert!(!jobs.launch_parallel_jobs(false));
    assert_eq!(jobs.batches_launched(), 0);
    assert_eq!(jobs.pending_parallel_jobs(), BATCH_SIZE - 2);
}

/// Exactly BATCH_SIZE jobs launch exactly one batch.
#[test]
fn test_full_batch_launches_once() {
    let jobs = JobController::new();
    for _ in 0..BATCH_SIZE {
        jobs.enqueue_parallel_job(|| {});
    }
    assert!(jobs.launch_parallel_jobs(false));
    assert!(!jobs.launch_parallel_jobs(false));
    assert_eq!(jobs.batches_launched(), 1);
    assert_eq!(jobs.pending_parallel_jobs(), 0);
}

/// Forcing launches whatever is queued.
#[test]
fn test_forced_launch_takes_remainder() {
    let jobs = JobController::new();
    for _ in 0..BATCH_SIZE + 3 {
        jobs.enqueue_parallel_job(|| {});
    }
    assert!(jobs.launch_parallel_jobs(false));
    assert!(jobs.launch_parallel_jobs(true));
    assert_eq!(jobs.batches_launched(), 2);
}

// =============================================================================
// Counters
// =============================================================================

/// Every scheduled job is eventually counted as done.
#[test]
fn test_counters_converge() {
    let host = InMemoryHost::new();
    let mut main = MainThread::new(&host);
    let jobs = JobController::new();
    let ran = Arc::new(AtomicUsize::new(0));

    for _ in 0..250 {
        let ran = Arc::clone(&ran);
        let follow_up = jobs.clone();
        jobs.enqueue_parallel_job(move || {
            ran.fetch_add(1, Ordering::SeqCst);
            follow_up.enqueue_main_thread_job(|_main| {});
        });
    }
    for _ in 0..10 {
        jobs.enqueue_main_thread_job(|_main| {});
    }

    drain(&jobs, &mut main);

    assert_eq!(ran.load(Ordering::SeqCst), 250);
    assert_eq!(jobs.jobs_done(), jobs.jobs_max());
    assert!(jobs.is_idle());
    assert_eq!(jobs.failure_count(), 0);
}

/// An empty controller halts immediately.
#[test]
fn test_empty_controller_halts() {
    let host = InMemoryHost::new();
    let mut main = MainThread::new(&host);
    let jobs = JobController::new();
    assert_eq!(jobs.service_main_thread(true, &mut main), MainThreadAction::Halt);
    assert_eq!(jobs.jobs_done(), 0);
    assert_eq!(jobs.jobs_max(), 0);
}

// =============================================================================
// Failures
// =============================================================================

/// Panics inside jobs are captured and counted as done.
#[test]
fn test_panicking_jobs_are_captured() {
    let host = InMemoryHost::new();
    let mut main = MainThread::new(&host);
    let jobs = JobController::new();

    jobs.enqueue_parallel_job(|| panic!("parallel boom"));
    jobs.enqueue_main_thread_job(|_main| panic!("main boom"));
    drain(&jobs, &mut main);

    assert_eq!(jobs.jobs_done(), jobs.jobs_max());
    let failures = jobs.take_failures();
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().any(|f| f.queue == "parallel" && f.message == "parallel boom"));
    assert!(failures.iter().any(|f| f.queue == "main" && f.message == "main boom"));
}

/// The aggregate failure keeps the first 25 and counts the rest.
#[test]
fn test_aggregate_failure_is_capped() {
    let host = InMemoryHost::new();
    let mut main = MainThread::new(&host);
    let jobs = JobController::new();
    for i in 0..30 {
        jobs.enqueue_main_thread_job(move |_main| panic!("failure {}", i));
    }
    drain(&jobs, &mut main);

    let error = ValidatorError::job_failures(jobs.take_failures(), MAX_REPORTED_FAILURES);
    assert_eq!(error.to_string(), "Job controller had 30 exceptions, returning max 25!");
    match error {
        ValidatorError::JobFailures {
            total,
            dropped,
            failures,
        } => {
            assert_eq!(total, 30);
            assert_eq!(dropped, 5);
            assert_eq!(failures.len(), 25);
            assert_eq!(failures[0].message, "failure 0");
        }
        other => panic!("unexpected {:?}", other),
    }
}
