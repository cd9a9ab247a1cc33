//! Validation engine
//!
//! Walks host objects against the schema and collects diagnostics.
//!
//! The traversal runs on a worker thread. Checks that must touch the host are
//! queued as main-thread jobs, and thread-safe user checks run in parallel
//! batches. [`Validator`] ties these together and returns one deduplicated
//! [`ValidationReport`] per run.

mod config;
mod custom;
mod diagnostic;
mod driver;
mod errors;
mod hierarchy;
mod job_controller;
mod main_thread;
mod progress;
mod structure_cache;
mod traversal;
mod unique_values;

pub use config::{CheckFlags, ValidatorConfig, BATCH_SIZE, MAX_REPORTED_FAILURES};
pub use custom::{join, CustomValidator, FnValidator, JoinedCustomValidator};
pub use diagnostic::{CheckContext, Diagnostic, DiagnosticKind, ErrorFactory};
pub use driver::{show_diagnostics, OnProgress, ValidationReport, Validator};
pub use errors::{JobFailure, ValidatorError, ValidatorResult};
pub use hierarchy::FieldHierarchy;
pub use job_controller::{
    JobController, MainThread, MainThreadAction, MainThreadJob, ParallelJob,
};
pub use main_thread::{check_component_main_thread_part, expand_components, Expansion};
pub use progress::{throttled, Progress, ProgressCallback};
pub use structure_cache::{ConditionAttribute, FieldMetadata, StructureCache, TypeMetadata};
pub use traversal::Traversal;
pub use unique_values::{CheckedField, DuplicateField, UniqueValuesCache};
