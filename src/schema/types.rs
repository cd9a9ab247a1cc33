//! Declarative type descriptors
//!
//! Every checkable type is described once, up front: its kind, its fields and
//! the attributes each field carries. The structure cache derives everything
//! the traversal needs from these descriptors, so nothing is inspected per
//! visit.
//!
//! Supported kinds:
//! - bool, int, float, string: primitives, value-like
//! - enum: named members, optionally a bit-flags enum
//! - struct: value type, compared structurally, value-like
//! - class: reference data type, value-like only when serializable
//! - host_object: host-managed reference, liveness checked on the main thread
//! - event: host callback list
//!
//! List types are not registered. `Foo[]` names a list of `Foo`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::checks::{CheckFailure, ConditionMember, ErrorMsg, SelfCheck};
use crate::model::{ObjectRef, Value};

/// Suffix marking a list type name.
pub const LIST_SUFFIX: &str = "[]";

/// One member of an enum type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
}

impl EnumMember {
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Kind of a registered type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeKind {
    Bool,
    Int,
    Float,
    String,
    Enum {
        members: Vec<EnumMember>,
        #[serde(default)]
        flags: bool,
    },
    Struct,
    Class {
        #[serde(default = "default_true")]
        serializable: bool,
    },
    HostObject,
    Event,
}

impl TypeKind {
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            TypeKind::Bool | TypeKind::Int | TypeKind::Float | TypeKind::String
        )
    }
}

fn default_true() -> bool {
    true
}

/// Capability tags a field can carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldAttribute {
    /// Value must not be null (or a dead host reference).
    NotNull,
    /// Strings and lists must not be empty.
    NonEmpty,
    /// Value must be unique across the run within `category`.
    Unique { category: String },
    /// String must be one of the host's tags.
    Tag,
    /// Field holds reference-typed data that must be walked; implies not-null.
    SerializeByReference,
    /// Named member on the owning type that must hold for this field.
    Condition {
        member: String,
        #[serde(default)]
        default_message: String,
    },
    /// String names a host resource property reachable via `getter`.
    HostResource { getter: String },
}

/// A field of a registered type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Whether the host persists this field. Only serialized fields get the
    /// null, emptiness and recursion checks.
    #[serde(default = "default_true")]
    pub serialized: bool,
    #[serde(default)]
    pub attributes: Vec<FieldAttribute>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            serialized: true,
            attributes: Vec::new(),
        }
    }

    pub fn attribute(mut self, attribute: FieldAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn not_null(self) -> Self {
        self.attribute(FieldAttribute::NotNull)
    }

    pub fn non_empty(self) -> Self {
        self.attribute(FieldAttribute::NonEmpty)
    }

    pub fn unique(self, category: impl Into<String>) -> Self {
        self.attribute(FieldAttribute::Unique {
            category: category.into(),
        })
    }

    pub fn tag(self) -> Self {
        self.attribute(FieldAttribute::Tag)
    }

    pub fn by_reference(self) -> Self {
        self.attribute(FieldAttribute::SerializeByReference)
    }

    pub fn condition(self, member: impl Into<String>, default_message: impl Into<String>) -> Self {
        self.attribute(FieldAttribute::Condition {
            member: member.into(),
            default_message: default_message.into(),
        })
    }

    pub fn host_resource(self, getter: impl Into<String>) -> Self {
        self.attribute(FieldAttribute::HostResource {
            getter: getter.into(),
        })
    }

    pub fn not_serialized(mut self) -> Self {
        self.serialized = false;
        self
    }
}

/// Description of one concrete type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    #[serde(flatten)]
    pub kind: TypeKind,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    /// Field names this type asks the traversal to skip.
    #[serde(default)]
    pub skip_fields: Vec<String>,
    /// Types that must be present as live siblings under the same container.
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(skip)]
    pub self_check: Option<SelfCheck>,
    #[serde(skip)]
    pub conditions: HashMap<String, ConditionMember>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            fields: Vec::new(),
            skip_fields: Vec::new(),
            requires: Vec::new(),
            self_check: None,
            conditions: HashMap::new(),
        }
    }

    pub fn host_object(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::HostObject)
    }

    pub fn record(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Struct)
    }

    pub fn class(name: impl Into<String>, serializable: bool) -> Self {
        Self::new(name, TypeKind::Class { serializable })
    }

    pub fn enumeration(name: impl Into<String>, members: Vec<EnumMember>, flags: bool) -> Self {
        Self::new(name, TypeKind::Enum { members, flags })
    }

    pub fn event(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Event)
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn skip_field(mut self, name: impl Into<String>) -> Self {
        self.skip_fields.push(name.into());
        self
    }

    pub fn requires(mut self, type_name: impl Into<String>) -> Self {
        self.requires.push(type_name.into());
        self
    }

    pub fn self_check<F>(mut self, thread_safe: bool, check: F) -> Self
    where
        F: Fn(&Value, &ObjectRef) -> Result<Vec<ErrorMsg>, CheckFailure> + Send + Sync + 'static,
    {
        self.self_check = Some(SelfCheck::new(thread_safe, check));
        self
    }

    pub fn condition_member(mut self, name: impl Into<String>, member: ConditionMember) -> Self {
        self.conditions.insert(name.into(), member);
        self
    }
}

/// Splits `Foo[]` into `Foo`.
pub fn list_element_name(type_name: &str) -> Option<&str> {
    type_name.strip_suffix(LIST_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_element_name() {
        assert_eq!(list_element_name("string[]"), Some("string"));
        assert_eq!(list_element_name("Foo[][]"), Some("Foo[]"));
        assert_eq!(list_element_name("Foo"), None);
    }

    #[test]
    fn test_descriptor_from_json() {
        let json = r#"{
            "name": "Player",
            "kind": "host_object",
            "fields": [
                {"name": "id", "type": "string", "attributes": [{"type": "unique", "category": "player-id"}]},
                {"name": "weapon", "type": "Weapon", "attributes": [{"type": "not_null"}]},
                {"name": "cache", "type": "int", "serialized": false}
            ],
            "requires": ["Collider"]
        }"#;

        let descriptor: TypeDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.name, "Player");
        assert_eq!(descriptor.kind, TypeKind::HostObject);
        assert_eq!(descriptor.fields.len(), 3);
        assert_eq!(
            descriptor.fields[0].attributes,
            vec![FieldAttribute::Unique { category: "player-id".into() }]
        );
        assert!(!descriptor.fields[2].serialized);
        assert_eq!(descriptor.requires, vec!["Collider".to_string()]);
    }

    #[test]
    fn test_enum_kind_from_json() {
        let json = r#"{"name": "Mask", "kind": "enum", "flags": true,
                       "members": [{"name": "A", "value": 1}, {"name": "B", "value": 2}]}"#;
        let descriptor: TypeDescriptor = serde_json::from_str(json).unwrap();
        match descriptor.kind {
            TypeKind::Enum { members, flags } => {
                assert!(flags);
                assert_eq!(members.len(), 2);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_class_defaults_to_serializable() {
        let descriptor: TypeDescriptor =
            serde_json::from_str(r#"{"name": "Data", "kind": "class"}"#).unwrap();
        assert_eq!(descriptor.kind, TypeKind::Class { serializable: true });
    }

    #[test]
    fn test_field_builder() {
        let field = FieldDescriptor::new("items", "Item[]").not_null().non_empty();
        assert_eq!(field.attributes, vec![FieldAttribute::NotNull, FieldAttribute::NonEmpty]);
        assert!(field.serialized);
    }
}
