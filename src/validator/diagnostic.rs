//! Diagnostics: the per-item error model
//!
//! A [`Diagnostic`] is one defect found in the checked data. Diagnostics are
//! immutable and value-equal, so the final list can be deduplicated by plain
//! equality.
//!
//! Building one needs the host (display path and location), which is why the
//! traversal defers construction to main-thread jobs.

use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::host::{Host, Location};
use crate::model::{ObjectRef, Value};
use crate::schema::ErrorMsg;

/// Kinds of defects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticKind {
    /// A container holds a destroyed child.
    MissingComponent,
    /// A type's required sibling is absent.
    MissingRequiredComponent,
    /// A serialized reference points at a destroyed object.
    MissingReference,
    NullReference,
    EmptyCollection,
    EmptyString,
    /// Callback names a method the target does not have.
    CallbackInvalidMethod,
    /// Callback entry lacks a target or a method.
    CallbackInvalid,
    /// String is not one of the allowed tags.
    DisallowedTag,
    CustomValidation,
    CustomValidationException,
    DuplicateUniqueValue,
    /// The engine's own invariant broke.
    ValidatorBug,
    /// The host failed to import a resource.
    AssetCorrupted,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingComponent => "MissingComponent",
            Self::MissingRequiredComponent => "MissingRequiredComponent",
            Self::MissingReference => "MissingReference",
            Self::NullReference => "NullReference",
            Self::EmptyCollection => "EmptyCollection",
            Self::EmptyString => "EmptyString",
            Self::CallbackInvalidMethod => "CallbackInvalidMethod",
            Self::CallbackInvalid => "CallbackInvalid",
            Self::DisallowedTag => "DisallowedTag",
            Self::CustomValidation => "CustomValidation",
            Self::CustomValidationException => "CustomValidationException",
            Self::DuplicateUniqueValue => "DuplicateUniqueValue",
            Self::ValidatorBug => "ValidatorBug",
            Self::AssetCorrupted => "AssetCorrupted",
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingComponent => "OBJVAL_MISSING_COMPONENT",
            Self::MissingRequiredComponent => "OBJVAL_MISSING_REQUIRED_COMPONENT",
            Self::MissingReference => "OBJVAL_MISSING_REFERENCE",
            Self::NullReference => "OBJVAL_NULL_REFERENCE",
            Self::EmptyCollection => "OBJVAL_EMPTY_COLLECTION",
            Self::EmptyString => "OBJVAL_EMPTY_STRING",
            Self::CallbackInvalidMethod => "OBJVAL_CALLBACK_INVALID_METHOD",
            Self::CallbackInvalid => "OBJVAL_CALLBACK_INVALID",
            Self::DisallowedTag => "OBJVAL_DISALLOWED_TAG",
            Self::CustomValidation => "OBJVAL_CUSTOM_VALIDATION",
            Self::CustomValidationException => "OBJVAL_CUSTOM_VALIDATION_EXCEPTION",
            Self::DuplicateUniqueValue => "OBJVAL_DUPLICATE_UNIQUE_VALUE",
            Self::ValidatorBug => "OBJVAL_VALIDATOR_BUG",
            Self::AssetCorrupted => "OBJVAL_ASSET_CORRUPTED",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Free-form label of a run, prefixed to most messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckContext(Arc<str>);

impl CheckContext {
    pub fn new(label: impl AsRef<str>) -> Self {
        CheckContext(Arc::from(label.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One defect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub object: Option<ObjectRef>,
    pub full_path: String,
    pub location: Location,
}

impl Diagnostic {
    /// Resolves the path and location of `object` through the host.
    pub fn new(
        host: &dyn Host,
        kind: DiagnosticKind,
        message: impl Into<String>,
        object: Option<&ObjectRef>,
    ) -> Self {
        let (full_path, location) = match object {
            Some(o) => (host.full_path(o), host.location(o)),
            None => ("null".to_string(), Location::Unknown),
        };
        Self {
            kind,
            message: message.into(),
            object: object.cloned(),
            full_path,
            location,
        }
    }

    pub fn missing_component(host: &dyn Host, container: &ObjectRef) -> Self {
        Self::new(host, DiagnosticKind::MissingComponent, "in container", Some(container))
    }

    pub fn missing_reference(
        host: &dyn Host,
        object: &ObjectRef,
        property: &str,
        context: &CheckContext,
    ) -> Self {
        Self::new(
            host,
            DiagnosticKind::MissingReference,
            format!("{}. Property: {}", context, property),
            Some(object),
        )
    }

    pub fn required_component_missing(
        host: &dyn Host,
        container: &ObjectRef,
        required: &str,
        required_by: &str,
        context: &CheckContext,
    ) -> Self {
        Self::new(
            host,
            DiagnosticKind::MissingRequiredComponent,
            format!("{}. {} missing (required by {})", context, required, required_by),
            Some(container),
        )
    }

    pub fn duplicate_unique_value(
        host: &dyn Host,
        category: &str,
        value: &Value,
        object: &ObjectRef,
        context: &CheckContext,
    ) -> Self {
        Self::new(
            host,
            DiagnosticKind::DuplicateUniqueValue,
            format!(
                "{}. Duplicate value '{}' in category '{}'",
                context, value, category
            ),
            Some(object),
        )
    }

    /// A validator bug not tied to any object.
    pub fn validator_bug(host: &dyn Host, message: impl Into<String>) -> Self {
        Self::new(host, DiagnosticKind::ValidatorBug, message, None)
    }

    /// A resource the host failed to import. Needs no host call.
    pub fn asset_corrupted(asset_path: impl Into<String>, message: impl Into<String>) -> Self {
        let path = asset_path.into();
        Self {
            kind: DiagnosticKind::AssetCorrupted,
            message: message.into(),
            object: None,
            full_path: path.clone(),
            location: Location::Asset(path),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Diagnostic[{} in '{}' @ '{}'. {}]",
            self.kind, self.full_path, self.location, self.message
        )
    }
}

impl Serialize for Diagnostic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Diagnostic", 6)?;
        state.serialize_field("kind", self.kind.as_str())?;
        state.serialize_field("code", self.kind.code())?;
        state.serialize_field("message", &self.message)?;
        state.serialize_field("object", &self.object.as_ref().map(|o| o.id().as_u64()))?;
        state.serialize_field("full_path", &self.full_path)?;
        state.serialize_field("location", &self.location)?;
        state.end()
    }
}

/// Builds diagnostics for one checked object.
#[derive(Debug, Clone)]
pub struct ErrorFactory {
    object: ObjectRef,
    context: CheckContext,
}

impl ErrorFactory {
    pub fn new(object: ObjectRef, context: CheckContext) -> Self {
        Self { object, context }
    }

    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    pub fn context(&self) -> &CheckContext {
        &self.context
    }

    fn property(&self, host: &dyn Host, kind: DiagnosticKind, path: &str) -> Diagnostic {
        Diagnostic::new(
            host,
            kind,
            format!("{}. Property: {}", self.context, path),
            Some(&self.object),
        )
    }

    pub fn null_field(&self, host: &dyn Host, path: &str) -> Diagnostic {
        self.property(host, DiagnosticKind::NullReference, path)
    }

    pub fn empty_collection(&self, host: &dyn Host, path: &str) -> Diagnostic {
        self.property(host, DiagnosticKind::EmptyCollection, path)
    }

    pub fn empty_string(&self, host: &dyn Host, path: &str) -> Diagnostic {
        self.property(host, DiagnosticKind::EmptyString, path)
    }

    pub fn disallowed_tag(&self, host: &dyn Host, path: &str) -> Diagnostic {
        self.property(host, DiagnosticKind::DisallowedTag, path)
    }

    fn callback_message(&self, path: &str, index: usize, problem: &str) -> String {
        format!(
            "In property '{}' callback at index {} of event {} in context '{}'.",
            path, index, problem, self.context
        )
    }

    pub fn callback_invalid(&self, host: &dyn Host, path: &str, index: usize) -> Diagnostic {
        Diagnostic::new(
            host,
            DiagnosticKind::CallbackInvalid,
            self.callback_message(path, index, "is not valid"),
            Some(&self.object),
        )
    }

    pub fn callback_invalid_method(&self, host: &dyn Host, path: &str, index: usize) -> Diagnostic {
        Diagnostic::new(
            host,
            DiagnosticKind::CallbackInvalidMethod,
            self.callback_message(path, index, "has invalid method"),
            Some(&self.object),
        )
    }

    /// A custom check returned `error`. With `use_error_context`, the
    /// diagnostic goes to the object the message names, if any.
    pub fn custom(
        &self,
        host: &dyn Host,
        path: &str,
        error: &ErrorMsg,
        use_error_context: bool,
    ) -> Diagnostic {
        let target = match (&error.context, use_error_context) {
            (Some(context), true) => context,
            _ => &self.object,
        };
        Diagnostic::new(
            host,
            DiagnosticKind::CustomValidation,
            format!("{}. Property: {}. Error: {}", self.context, path, error),
            Some(target),
        )
    }

    /// A custom check failed to run.
    pub fn custom_exception(&self, host: &dyn Host, path: &str, failure: &str) -> Diagnostic {
        Diagnostic::new(
            host,
            DiagnosticKind::CustomValidationException,
            format!(
                "{}. Property: {}. Error while running custom validation:\n{}",
                self.context, path, failure
            ),
            Some(&self.object),
        )
    }

    /// The host rejected a resource property named by a string field.
    pub fn host_resource(&self, host: &dyn Host, message: &str) -> Diagnostic {
        Diagnostic::new(
            host,
            DiagnosticKind::CustomValidationException,
            message,
            Some(&self.object),
        )
    }

    pub fn validator_bug(&self, host: &dyn Host, path: &str, message: &str) -> Diagnostic {
        Diagnostic::new(
            host,
            DiagnosticKind::ValidatorBug,
            format!("{}. Property: {}. {}", self.context, path, message),
            Some(&self.object),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryHost;

    fn factory(name: &str) -> (ErrorFactory, ObjectRef) {
        let object = ObjectRef::new("Thing", name);
        (
            ErrorFactory::new(object.clone(), CheckContext::new("Scene A")),
            object,
        )
    }

    #[test]
    fn test_property_message_format() {
        let host = InMemoryHost::new();
        let (factory, object) = factory("thing");
        let d = factory.null_field(&host, "weapon.ammo");
        assert_eq!(d.kind, DiagnosticKind::NullReference);
        assert_eq!(d.message, "Scene A. Property: weapon.ammo");
        assert_eq!(d.object.as_ref(), Some(&object));
        assert_eq!(d.full_path, "thing");
        assert_eq!(d.location, Location::Unknown);
    }

    #[test]
    fn test_display_format() {
        let host = InMemoryHost::new();
        let (factory, object) = factory("thing");
        host.set_scene_path(&object, "levels/one.scene");
        let d = factory.empty_string(&host, "name");
        assert_eq!(
            d.to_string(),
            "Diagnostic[EmptyString in 'thing' @ 'levels/one.scene'. Scene A. Property: name]"
        );
    }

    #[test]
    fn test_value_equality_dedups() {
        let host = InMemoryHost::new();
        let (factory, _) = factory("thing");
        let a = factory.empty_collection(&host, "items");
        let b = factory.empty_collection(&host, "items");
        let c = factory.empty_collection(&host, "others");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: std::collections::HashSet<_> = vec![a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_custom_uses_error_context() {
        let host = InMemoryHost::new();
        let (factory, object) = factory("thing");
        let other = ObjectRef::new("Thing", "other");
        let msg = ErrorMsg::with_context("bad", other.clone());

        assert_eq!(factory.custom(&host, "f", &msg, true).object, Some(other));
        assert_eq!(factory.custom(&host, "f", &msg, false).object, Some(object));
        assert_eq!(
            factory.custom(&host, "f", &msg, false).message,
            "Scene A. Property: f. Error: bad"
        );
    }

    #[test]
    fn test_callback_messages() {
        let host = InMemoryHost::new();
        let (factory, _) = factory("thing");
        assert_eq!(
            factory.callback_invalid(&host, "onClick", 2).message,
            "In property 'onClick' callback at index 2 of event is not valid in context 'Scene A'."
        );
        assert_eq!(
            factory.callback_invalid_method(&host, "onClick", 0).kind,
            DiagnosticKind::CallbackInvalidMethod
        );
    }

    #[test]
    fn test_duplicate_message() {
        let host = InMemoryHost::new();
        let object = ObjectRef::new("Thing", "a");
        let d = Diagnostic::duplicate_unique_value(
            &host,
            "id",
            &Value::str("x"),
            &object,
            &CheckContext::new("ctx"),
        );
        assert_eq!(d.message, "ctx. Duplicate value 'x' in category 'id'");
    }

    #[test]
    fn test_serialize_includes_code() {
        let d = Diagnostic::asset_corrupted("a/b.asset", "import failed");
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["code"], "OBJVAL_ASSET_CORRUPTED");
        assert_eq!(json["location"]["kind"], "asset");
        assert_eq!(json["location"]["path"], "a/b.asset");
        assert!(json["object"].is_null());
    }
}
