//! Executable hooks attached to type descriptors
//!
//! These are the parts of a descriptor that cannot be loaded from data:
//! self-checks and named condition members. Both are plain closures behind
//! `Arc` so descriptors stay cheap to clone and safe to share.

use std::fmt;
use std::sync::Arc;

use crate::model::{ObjectRef, Value};

/// Error raised by a custom check. Converted into a diagnostic, never propagated.
pub type CheckFailure = Box<dyn std::error::Error + Send + Sync>;

/// A domain error message returned by a custom check.
///
/// When `context` is set the resulting diagnostic is attributed to that object
/// instead of the object being checked.
#[derive(Debug, Clone)]
pub struct ErrorMsg {
    pub message: String,
    pub context: Option<ObjectRef>,
}

impl ErrorMsg {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(message: impl Into<String>, context: ObjectRef) -> Self {
        Self {
            message: message.into(),
            context: Some(context),
        }
    }
}

impl fmt::Display for ErrorMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<&str> for ErrorMsg {
    fn from(s: &str) -> Self {
        ErrorMsg::new(s)
    }
}

impl From<String> for ErrorMsg {
    fn from(s: String) -> Self {
        ErrorMsg::new(s)
    }
}

type SelfCheckFn = dyn Fn(&Value, &ObjectRef) -> Result<Vec<ErrorMsg>, CheckFailure> + Send + Sync;

/// Self-validation capability of a type.
///
/// The closure receives the value being checked and the object that contains
/// it. Thread-safe checks run inline during traversal; the rest are deferred
/// to the main thread.
#[derive(Clone)]
pub struct SelfCheck {
    thread_safe: bool,
    check: Arc<SelfCheckFn>,
}

impl SelfCheck {
    pub fn new<F>(thread_safe: bool, check: F) -> Self
    where
        F: Fn(&Value, &ObjectRef) -> Result<Vec<ErrorMsg>, CheckFailure> + Send + Sync + 'static,
    {
        Self {
            thread_safe,
            check: Arc::new(check),
        }
    }

    pub fn is_thread_safe(&self) -> bool {
        self.thread_safe
    }

    pub fn run(&self, value: &Value, owner: &ObjectRef) -> Result<Vec<ErrorMsg>, CheckFailure> {
        (self.check)(value, owner)
    }
}

impl fmt::Debug for SelfCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfCheck")
            .field("thread_safe", &self.thread_safe)
            .finish_non_exhaustive()
    }
}

type PropertyFn = dyn Fn(&Value) -> bool + Send + Sync;
type PredicateFn = dyn Fn(&Value, &Value) -> bool + Send + Sync;
type WithMessageFn = dyn Fn(&Value, &Value) -> Result<(), String> + Send + Sync;

/// A member that a condition attribute refers to by name.
///
/// All variants receive the owner (the value whose field is being checked)
/// first. Predicates also receive the field value.
#[derive(Clone)]
pub enum ConditionMember {
    /// Boolean property of the owner.
    Property(Arc<PropertyFn>),
    /// Boolean predicate over the field value.
    Predicate(Arc<PredicateFn>),
    /// Predicate that explains its own failure.
    WithMessage(Arc<WithMessageFn>),
}

impl ConditionMember {
    pub fn property<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        ConditionMember::Property(Arc::new(f))
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        ConditionMember::Predicate(Arc::new(f))
    }

    pub fn with_message<F>(f: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<(), String> + Send + Sync + 'static,
    {
        ConditionMember::WithMessage(Arc::new(f))
    }

    /// Evaluates the member. `None` means the condition holds;
    /// `Some(msg)` is the failure message.
    pub fn evaluate(&self, owner: &Value, field_value: &Value, default_message: &str) -> Option<String> {
        match self {
            ConditionMember::Property(f) => {
                (!f(owner)).then(|| default_message.to_string())
            }
            ConditionMember::Predicate(f) => {
                (!f(owner, field_value)).then(|| default_message.to_string())
            }
            ConditionMember::WithMessage(f) => f(owner, field_value).err(),
        }
    }
}

impl fmt::Debug for ConditionMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ConditionMember::Property(_) => "Property",
            ConditionMember::Predicate(_) => "Predicate",
            ConditionMember::WithMessage(_) => "WithMessage",
        };
        write!(f, "ConditionMember::{}", kind)
    }
}
