//! Registry of type descriptors
//!
//! Descriptors are registered before a run and never change afterwards. The
//! registry is shared read-only (behind `Arc`) by the structure cache of every
//! run that uses it.

use std::collections::HashMap;
use std::sync::Arc;

use super::errors::{SchemaError, SchemaResult};
use super::types::{list_element_name, FieldAttribute, TypeDescriptor, TypeKind};

/// Names of the built-in primitive types.
pub const BUILTIN_TYPES: [&str; 4] = ["bool", "int", "float", "string"];

#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<TypeDescriptor>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Creates a registry holding only the built-in primitives.
    pub fn new() -> Self {
        let mut types = HashMap::new();
        for (name, kind) in [
            ("bool", TypeKind::Bool),
            ("int", TypeKind::Int),
            ("float", TypeKind::Float),
            ("string", TypeKind::String),
        ] {
            types.insert(name.to_string(), Arc::new(TypeDescriptor::new(name, kind)));
        }
        Self { types }
    }

    /// Registers a descriptor.
    ///
    /// A name can be registered once. List names (`Foo[]`) are implicit and
    /// cannot be registered.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> SchemaResult<()> {
        if self.types.contains_key(&descriptor.name) {
            return Err(SchemaError::type_immutable(&descriptor.name));
        }
        if descriptor.name.is_empty() || list_element_name(&descriptor.name).is_some() {
            return Err(SchemaError::malformed_type(
                &descriptor.name,
                "type names must be non-empty and must not end with []",
            ));
        }
        Self::check_consistency(&descriptor)?;
        self.types
            .insert(descriptor.name.clone(), Arc::new(descriptor));
        Ok(())
    }

    /// Registers every descriptor, stopping at the first failure.
    pub fn register_all(
        &mut self,
        descriptors: impl IntoIterator<Item = TypeDescriptor>,
    ) -> SchemaResult<()> {
        for descriptor in descriptors {
            self.register(descriptor)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TypeDescriptor>> {
        self.types.get(name)
    }

    /// Looks up a registered (non-list) type.
    pub fn require(&self, name: &str) -> SchemaResult<&Arc<TypeDescriptor>> {
        self.get(name).ok_or_else(|| SchemaError::unknown_type(name))
    }

    /// Whether `name` resolves, either directly or as a list of a known type.
    pub fn resolves(&self, name: &str) -> bool {
        match list_element_name(name) {
            Some(element) => self.resolves(element),
            None => self.types.contains_key(name),
        }
    }

    /// Checks that every field type referenced by a registered descriptor
    /// resolves. Run once after all types are registered.
    pub fn validate_references(&self) -> SchemaResult<()> {
        let mut names: Vec<&String> = self.types.keys().collect();
        names.sort();
        for name in names {
            let descriptor = &self.types[name];
            for field in &descriptor.fields {
                if !self.resolves(&field.type_name) {
                    return Err(SchemaError::malformed_type(
                        name,
                        format!(
                            "field '{}' refers to unknown type '{}'",
                            field.name, field.type_name
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn check_consistency(descriptor: &TypeDescriptor) -> SchemaResult<()> {
        let mut seen = std::collections::HashSet::new();
        for field in &descriptor.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::malformed_type(
                    &descriptor.name,
                    format!("duplicate field '{}'", field.name),
                ));
            }
            for attribute in &field.attributes {
                if let FieldAttribute::Unique { category } = attribute {
                    if category.is_empty() {
                        return Err(SchemaError::malformed_type(
                            &descriptor.name,
                            format!("field '{}' has an empty unique category", field.name),
                        ));
                    }
                }
            }
        }
        if let TypeKind::Enum { members, .. } = &descriptor.kind {
            if members.is_empty() {
                return Err(SchemaError::malformed_type(
                    &descriptor.name,
                    "enum without members",
                ));
            }
        }
        Ok(())
    }
}
