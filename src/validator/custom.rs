//! Pluggable custom validators
//!
//! A validator that reports `is_thread_safe() == true` promises it never needs
//! the host and may run on the worker thread or inside a parallel batch. All
//! others are deferred to main-thread jobs.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use super::job_controller::panic_message;
use super::structure_cache::FieldMetadata;
use crate::model::{ObjectRef, Value};
use crate::schema::{CheckFailure, ErrorMsg};

pub trait CustomValidator: Send + Sync {
    fn is_thread_safe(&self) -> bool;

    /// Checks one field value of `owner`.
    fn validate_field(
        &self,
        _owner: &ObjectRef,
        _value: &Value,
        _field: &FieldMetadata,
    ) -> Result<Vec<ErrorMsg>, CheckFailure> {
        Ok(Vec::new())
    }

    /// Checks a whole object once per run.
    fn validate_component(&self, _owner: &ObjectRef) -> Result<Vec<ErrorMsg>, CheckFailure> {
        Ok(Vec::new())
    }
}

/// Two validators run as one. Thread-safe only when both are.
pub struct JoinedCustomValidator {
    first: Arc<dyn CustomValidator>,
    second: Arc<dyn CustomValidator>,
}

impl JoinedCustomValidator {
    pub fn new(first: Arc<dyn CustomValidator>, second: Arc<dyn CustomValidator>) -> Self {
        Self { first, second }
    }
}

impl CustomValidator for JoinedCustomValidator {
    fn is_thread_safe(&self) -> bool {
        self.first.is_thread_safe() && self.second.is_thread_safe()
    }

    fn validate_field(
        &self,
        owner: &ObjectRef,
        value: &Value,
        field: &FieldMetadata,
    ) -> Result<Vec<ErrorMsg>, CheckFailure> {
        let mut errors = self.first.validate_field(owner, value, field)?;
        errors.extend(self.second.validate_field(owner, value, field)?);
        Ok(errors)
    }

    fn validate_component(&self, owner: &ObjectRef) -> Result<Vec<ErrorMsg>, CheckFailure> {
        let mut errors = self.first.validate_component(owner)?;
        errors.extend(self.second.validate_component(owner)?);
        Ok(errors)
    }
}

/// Joins an optional validator with another one.
pub fn join(
    existing: Option<Arc<dyn CustomValidator>>,
    next: Arc<dyn CustomValidator>,
) -> Arc<dyn CustomValidator> {
    match existing {
        Some(first) => Arc::new(JoinedCustomValidator::new(first, next)),
        None => next,
    }
}

type FieldFn =
    dyn Fn(&ObjectRef, &Value, &FieldMetadata) -> Result<Vec<ErrorMsg>, CheckFailure> + Send + Sync;
type ComponentFn = dyn Fn(&ObjectRef) -> Result<Vec<ErrorMsg>, CheckFailure> + Send + Sync;

/// A validator assembled from closures.
#[derive(Clone)]
pub struct FnValidator {
    thread_safe: bool,
    field: Option<Arc<FieldFn>>,
    component: Option<Arc<ComponentFn>>,
}

impl FnValidator {
    pub fn new(thread_safe: bool) -> Self {
        Self {
            thread_safe,
            field: None,
            component: None,
        }
    }

    pub fn on_field<F>(mut self, f: F) -> Self
    where
        F: Fn(&ObjectRef, &Value, &FieldMetadata) -> Result<Vec<ErrorMsg>, CheckFailure>
            + Send
            + Sync
            + 'static,
    {
        self.field = Some(Arc::new(f));
        self
    }

    pub fn on_component<F>(mut self, f: F) -> Self
    where
        F: Fn(&ObjectRef) -> Result<Vec<ErrorMsg>, CheckFailure> + Send + Sync + 'static,
    {
        self.component = Some(Arc::new(f));
        self
    }
}

impl CustomValidator for FnValidator {
    fn is_thread_safe(&self) -> bool {
        self.thread_safe
    }

    fn validate_field(
        &self,
        owner: &ObjectRef,
        value: &Value,
        field: &FieldMetadata,
    ) -> Result<Vec<ErrorMsg>, CheckFailure> {
        match &self.field {
            Some(f) => f(owner, value, field),
            None => Ok(Vec::new()),
        }
    }

    fn validate_component(&self, owner: &ObjectRef) -> Result<Vec<ErrorMsg>, CheckFailure> {
        match &self.component {
            Some(f) => f(owner),
            None => Ok(Vec::new()),
        }
    }
}

impl fmt::Debug for FnValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnValidator")
            .field("thread_safe", &self.thread_safe)
            .field("field", &self.field.is_some())
            .field("component", &self.component.is_some())
            .finish()
    }
}

/// Runs a user check, turning both `Err` and panics into a failure message.
pub(crate) fn run_guarded<F>(check: F) -> Result<Vec<ErrorMsg>, String>
where
    F: FnOnce() -> Result<Vec<ErrorMsg>, CheckFailure>,
{
    match catch_unwind(AssertUnwindSafe(check)) {
        Ok(Ok(errors)) => Ok(errors),
        Ok(Err(failure)) => Err(failure.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}
