//! Run orchestration
//!
//! One run:
//! 1. expand roots into distinct live objects
//! 2. a worker thread walks every object (part A) while the calling thread
//!    runs the host checks (part B) and reports progress
//! 3. the calling thread drains the job controller until it halts and the
//!    worker has finished
//! 4. panicked jobs abort the run; duplicate values are appended and the
//!    final list is deduplicated
//!
//! The host is only ever touched from the calling thread.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::config::{CheckFlags, ValidatorConfig};
use super::custom::{join, CustomValidator};
use super::diagnostic::{CheckContext, Diagnostic};
use super::errors::{ValidatorError, ValidatorResult};
use super::job_controller::{panic_message, JobController, MainThread, MainThreadAction};
use super::main_thread::{check_component_main_thread_part, expand_components};
use super::progress::Progress;
use super::structure_cache::StructureCache;
use super::traversal::Traversal;
use super::unique_values::UniqueValuesCache;
use crate::host::Host;
use crate::model::ObjectRef;
use crate::observability::{
    log_event_with_fields, Event, MetricsSnapshot, ObservationScope, Timer, ValidatorMetrics,
};
use crate::schema::TypeRegistry;

/// Progress callback of a run. Returning `true` cancels.
pub type OnProgress<'p> = &'p mut dyn FnMut(&Progress<'_>) -> bool;

/// Outcome of a run that was not aborted.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub run_id: Uuid,
    pub context: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub objects_checked: usize,
    /// The progress callback stopped the run early; diagnostics are partial.
    pub cancelled: bool,
    pub jobs_done: u64,
    pub jobs_max: u64,
    pub diagnostics: Vec<Diagnostic>,
    pub metrics: MetricsSnapshot,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}

/// Entry point of the engine.
///
/// Holds everything that outlives a run: the type registry, the configuration
/// and the custom validators. Each run gets a fresh structure cache, job
/// controller and unique-values cache.
pub struct Validator {
    registry: Arc<TypeRegistry>,
    config: ValidatorConfig,
    custom: Option<Arc<dyn CustomValidator>>,
}

impl Validator {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            config: ValidatorConfig::default(),
            custom: None,
        }
    }

    pub fn with_config(mut self, config: ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a custom validator. Several are joined into one.
    pub fn with_custom_validator(mut self, validator: Arc<dyn CustomValidator>) -> Self {
        self.custom = Some(join(self.custom.take(), validator));
        self
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Checks the given objects and the children of containers among them.
    /// Does not follow references.
    pub fn check(
        &self,
        host: &dyn Host,
        context: &CheckContext,
        objects: &[ObjectRef],
        progress: Option<OnProgress<'_>>,
    ) -> ValidatorResult<ValidationReport> {
        self.run(host, context, objects, progress)
    }

    /// Checks the objects and everything they depend on.
    pub fn check_recursively(
        &self,
        host: &dyn Host,
        context: &CheckContext,
        roots: &[ObjectRef],
        progress: Option<OnProgress<'_>>,
    ) -> ValidatorResult<ValidationReport> {
        let dependencies = host.collect_dependencies(roots);
        self.run(host, context, &dependencies, progress)
    }

    /// [`Validator::check`], also returning the wall-clock time it took.
    pub fn check_with_time(
        &self,
        host: &dyn Host,
        context: &CheckContext,
        objects: &[ObjectRef],
        progress: Option<OnProgress<'_>>,
    ) -> ValidatorResult<(ValidationReport, Duration)> {
        let timer = Timer::new();
        let report = self.check(host, context, objects, progress)?;
        Ok((report, timer.elapsed()))
    }

    fn run(
        &self,
        host: &dyn Host,
        context: &CheckContext,
        roots: &[ObjectRef],
        mut progress: Option<OnProgress<'_>>,
    ) -> ValidatorResult<ValidationReport> {
        self.config.validate()?;

        let run_id = Uuid::new_v4();
        let run_id_str = run_id.to_string();
        let started_at = Utc::now();
        let timer = Timer::new();
        let scope = ObservationScope::with_fields(
            "VALIDATION",
            &[("run_id", run_id_str.as_str()), ("context", context.as_str())],
        );
        log_event_with_fields(
            Event::RunStart,
            &[
                ("run_id", run_id_str.as_str()),
                ("roots", roots.len().to_string().as_str()),
            ],
        );

        let checks = self.config.checks;
        let poll_delay = Duration::from_millis(self.config.poll_delay_ms);
        let metrics = Arc::new(ValidatorMetrics::new());
        let jobs = JobController::from_config(&self.config)?;
        let cache = Arc::new(StructureCache::new(Arc::clone(&self.registry)));
        let unique = Arc::new(UniqueValuesCache::new());
        let traversal = Traversal::new(Arc::clone(&cache), jobs.clone(), context.clone())
            .with_unique_values(Arc::clone(&unique))
            .with_tags(Arc::new(host.tags()))
            .with_validator(self.custom.clone())
            .with_checks(checks)
            .with_metrics(Arc::clone(&metrics));

        let mut main = MainThread::new(host);
        let expansion = expand_components(host, roots, checks);
        metrics.add_diagnostics(expansion.missing.len() as u64);
        for diagnostic in expansion.missing {
            main.push(diagnostic);
        }
        let objects = expansion.objects;
        let total = objects.len();

        let stop_worker = AtomicBool::new(false);
        let mut cancelled = false;

        let worker_panic = thread::scope(|s| -> ValidatorResult<Option<String>> {
            let worker = thread::Builder::new()
                .name("objval-traversal".to_string())
                .spawn_scoped(s, || {
                    for object in &objects {
                        if stop_worker.load(Ordering::Relaxed) {
                            break;
                        }
                        traversal.check_component(object);
                    }
                })?;

            let status = |label: &str| {
                if worker.is_finished() {
                    format!("[{}] {}", label, jobs)
                } else {
                    format!("[{}, Thread] {}", label, jobs)
                }
            };

            for (index, object) in objects.iter().enumerate() {
                if notify(&mut progress, index, total, &|| status("Main")) {
                    cancelled = true;
                    break;
                }
                let found = check_component_main_thread_part(host, &cache, object, context, checks);
                metrics.add_diagnostics(found.len() as u64);
                for diagnostic in found {
                    main.push(diagnostic);
                }
            }

            if !cancelled {
                cancelled = notify(&mut progress, total, total, &|| jobs.to_string());
            }

            while !cancelled {
                let done = clamp(jobs.jobs_done());
                let max = clamp(jobs.jobs_max());
                if notify(&mut progress, done, max, &|| status("Loop")) {
                    cancelled = true;
                    break;
                }
                // Read before servicing: a worker that finishes during the
                // step may still have queued jobs.
                let worker_done = worker.is_finished();
                match jobs.service_main_thread(true, &mut main) {
                    MainThreadAction::RerunImmediately => {}
                    MainThreadAction::RerunAfterDelay => thread::sleep(poll_delay),
                    MainThreadAction::Halt => {
                        if worker_done {
                            break;
                        }
                        thread::sleep(poll_delay);
                    }
                }
            }

            if cancelled {
                stop_worker.store(true, Ordering::Relaxed);
            }
            Ok(worker.join().err().map(|payload| panic_message(payload.as_ref())))
        })?;

        if let Some(message) = worker_panic {
            log_event_with_fields(
                Event::WorkerFailed,
                &[("run_id", run_id_str.as_str()), ("reason", message.as_str())],
            );
            metrics.increment_diagnostics();
            main.push(Diagnostic::validator_bug(host, message));
        }

        let failures = jobs.take_failures();
        if !failures.is_empty() {
            metrics.add_job_failures(failures.len() as u64);
            let error = ValidatorError::job_failures(failures, self.config.max_reported_failures);
            log_event_with_fields(
                Event::JobFailures,
                &[("run_id", run_id_str.as_str()), ("error", error.to_string().as_str())],
            );
            scope.fail_fatal(&error.to_string());
            return Err(error);
        }

        if checks.contains(CheckFlags::UNIQUE_VALUES) {
            let duplicates = unique.duplicates(self.config.report_same_owner_duplicates);
            if !duplicates.is_empty() {
                metrics.add_duplicates(duplicates.len() as u64);
                log_event_with_fields(
                    Event::DuplicatesFound,
                    &[
                        ("run_id", run_id_str.as_str()),
                        ("groups", duplicates.len().to_string().as_str()),
                    ],
                );
            }
            for duplicate in &duplicates {
                for owner in &duplicate.owners {
                    metrics.increment_diagnostics();
                    main.push(Diagnostic::duplicate_unique_value(
                        host,
                        &duplicate.category,
                        &duplicate.value,
                        owner,
                        context,
                    ));
                }
            }
        }

        let diagnostics = dedup(main.into_diagnostics());

        let report = ValidationReport {
            run_id,
            context: context.as_str().to_string(),
            started_at,
            elapsed_ms: u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX),
            objects_checked: total,
            cancelled,
            jobs_done: jobs.jobs_done(),
            jobs_max: jobs.jobs_max(),
            diagnostics,
            metrics: metrics.snapshot(),
        };

        let count = report.diagnostics.len().to_string();
        if cancelled {
            log_event_with_fields(
                Event::RunCancelled,
                &[("run_id", run_id_str.as_str()), ("diagnostics", count.as_str())],
            );
        } else {
            log_event_with_fields(
                Event::RunComplete,
                &[("run_id", run_id_str.as_str()), ("diagnostics", count.as_str())],
            );
        }
        scope.complete_with_fields(&[("diagnostics", count.as_str())]);
        Ok(report)
    }
}

fn notify(
    progress: &mut Option<OnProgress<'_>>,
    current: usize,
    total: usize,
    text: &dyn Fn() -> String,
) -> bool {
    match progress {
        Some(callback) => callback(&Progress::new(current, total, text)),
        None => false,
    }
}

fn clamp(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

/// Drops exact repeats, keeping first occurrences in order.
fn dedup(diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
    let mut seen = HashSet::with_capacity(diagnostics.len());
    diagnostics
        .into_iter()
        .filter(|d| seen.insert(d.clone()))
        .collect()
}

/// Writes every diagnostic of a report to the log.
pub fn show_diagnostics(report: &ValidationReport) {
    for diagnostic in &report.diagnostics {
        log_event_with_fields(
            Event::DiagnosticReported,
            &[
                ("code", diagnostic.kind.code()),
                ("kind", diagnostic.kind.as_str()),
                ("full_path", diagnostic.full_path.as_str()),
                ("location", diagnostic.location.to_string().as_str()),
                ("message", diagnostic.message.as_str()),
            ],
        );
    }
}
