//! Memoized type and field metadata
//!
//! Everything the traversal asks about a type is derived from its descriptor
//! once and then served from the cache. Entries are never invalidated: the
//! registry behind the cache is immutable.
//!
//! Two threads may compute the same entry at the same time. Both results are
//! equal; the first one inserted wins and every reader sees a complete entry.

use std::sync::Arc;

use dashmap::DashMap;

use crate::model::{ListValue, TypeName};
use crate::schema::{
    list_element_name, FieldAttribute, FieldDescriptor, SchemaError, SchemaResult,
    TypeDescriptor, TypeKind, TypeRegistry,
};

/// Derived facts about one concrete type.
#[derive(Debug)]
pub struct TypeMetadata {
    pub name: TypeName,
    /// `None` for list types.
    pub descriptor: Option<Arc<TypeDescriptor>>,
    pub element_type: Option<Arc<TypeMetadata>>,
    pub is_value_like: bool,
    pub is_host_object: bool,
}

impl TypeMetadata {
    pub fn is_list(&self) -> bool {
        self.element_type.is_some()
    }

    pub fn kind(&self) -> Option<&TypeKind> {
        self.descriptor.as_ref().map(|d| &d.kind)
    }

    pub fn is_event(&self) -> bool {
        matches!(self.kind(), Some(TypeKind::Event))
    }

    /// Enum members and flags marker, for enum types.
    pub fn enum_members(&self) -> Option<(Vec<i64>, bool)> {
        match self.kind() {
            Some(TypeKind::Enum { members, flags }) => {
                Some((members.iter().map(|m| m.value).collect(), *flags))
            }
            _ => None,
        }
    }
}

/// A condition attribute resolved from a field descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionAttribute {
    pub member: String,
    pub default_message: String,
}

/// Derived facts about one field of one declaring type.
#[derive(Debug)]
pub struct FieldMetadata {
    pub name: String,
    pub declaring_type: TypeName,
    pub field_type: Arc<TypeMetadata>,
    pub serialized: bool,
    pub requires_not_null: bool,
    pub requires_non_empty: bool,
    /// Serialized and marked serialize-by-reference.
    pub serialize_by_reference: bool,
    pub unique_categories: Vec<String>,
    pub tag_constrained: bool,
    pub conditions: Vec<ConditionAttribute>,
    pub host_resource: Option<String>,
    pub descriptor: FieldDescriptor,
}

impl FieldMetadata {
    fn from_descriptor(
        declaring_type: &TypeName,
        descriptor: &FieldDescriptor,
        field_type: Arc<TypeMetadata>,
    ) -> Self {
        let has = |wanted: &FieldAttribute| descriptor.attributes.iter().any(|a| a == wanted);
        let by_reference = has(&FieldAttribute::SerializeByReference);

        let mut unique_categories = Vec::new();
        let mut conditions = Vec::new();
        let mut host_resource = None;
        for attribute in &descriptor.attributes {
            match attribute {
                FieldAttribute::Unique { category } => unique_categories.push(category.clone()),
                FieldAttribute::Condition {
                    member,
                    default_message,
                } => conditions.push(ConditionAttribute {
                    member: member.clone(),
                    default_message: default_message.clone(),
                }),
                FieldAttribute::HostResource { getter } => host_resource = Some(getter.clone()),
                _ => {}
            }
        }

        Self {
            name: descriptor.name.clone(),
            declaring_type: declaring_type.clone(),
            field_type,
            serialized: descriptor.serialized,
            requires_not_null: has(&FieldAttribute::NotNull) || by_reference,
            requires_non_empty: has(&FieldAttribute::NonEmpty),
            serialize_by_reference: descriptor.serialized && by_reference,
            unique_categories,
            tag_constrained: has(&FieldAttribute::Tag),
            conditions,
            host_resource,
            descriptor: descriptor.clone(),
        }
    }
}

pub struct StructureCache {
    registry: Arc<TypeRegistry>,
    types: DashMap<String, Arc<TypeMetadata>>,
    fields: DashMap<String, Arc<[Arc<FieldMetadata>]>>,
}

impl StructureCache {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            types: DashMap::new(),
            fields: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn type_metadata_for(&self, name: &str) -> SchemaResult<Arc<TypeMetadata>> {
        if let Some(cached) = self.types.get(name) {
            return Ok(Arc::clone(cached.value()));
        }
        let computed = Arc::new(self.compute_type(name)?);
        let entry = self
            .types
            .entry(name.to_string())
            .or_insert(computed);
        Ok(Arc::clone(entry.value()))
    }

    /// Fields of a type, in declaration order. Lists and primitives have none.
    pub fn fields_for(&self, name: &str) -> SchemaResult<Arc<[Arc<FieldMetadata>]>> {
        if let Some(cached) = self.fields.get(name) {
            return Ok(Arc::clone(cached.value()));
        }
        let computed = self.compute_fields(name)?;
        let entry = self.fields.entry(name.to_string()).or_insert(computed);
        Ok(Arc::clone(entry.value()))
    }

    /// Element type of a concrete list value.
    pub fn list_element_type_for(&self, list: &ListValue) -> SchemaResult<Arc<TypeMetadata>> {
        match &list.element_type {
            Some(element) => self.type_metadata_for(element),
            None => Err(SchemaError::unknown_list_element(format!(
                "untyped list with {} items",
                list.len()
            ))),
        }
    }

    /// Number of cached type entries.
    pub fn cached_types(&self) -> usize {
        self.types.len()
    }

    fn compute_type(&self, name: &str) -> SchemaResult<TypeMetadata> {
        let type_name: TypeName = Arc::from(name);
        if let Some(element) = list_element_name(name) {
            let element_type = self.type_metadata_for(element)?;
            return Ok(TypeMetadata {
                name: type_name,
                descriptor: None,
                element_type: Some(element_type),
                is_value_like: false,
                is_host_object: false,
            });
        }

        let descriptor = Arc::clone(self.registry.require(name)?);
        let is_value_like = match &descriptor.kind {
            kind if kind.is_primitive() => true,
            TypeKind::Struct => true,
            TypeKind::Class { serializable } => *serializable,
            // Event lists are host-serialized data: they are walked so their
            // callbacks get checked.
            TypeKind::Event => true,
            _ => false,
        };
        let is_host_object = matches!(descriptor.kind, TypeKind::HostObject);

        Ok(TypeMetadata {
            name: type_name,
            descriptor: Some(descriptor),
            element_type: None,
            is_value_like,
            is_host_object,
        })
    }

    fn compute_fields(&self, name: &str) -> SchemaResult<Arc<[Arc<FieldMetadata>]>> {
        let metadata = self.type_metadata_for(name)?;
        let descriptor = match &metadata.descriptor {
            Some(descriptor) => descriptor,
            None => return Ok(Arc::from(Vec::new())),
        };
        let mut fields = Vec::with_capacity(descriptor.fields.len());
        for field in &descriptor.fields {
            let field_type = self.type_metadata_for(&field.type_name).map_err(|e| {
                SchemaError::malformed_type(
                    name,
                    format!("field '{}': {}", field.name, e.message()),
                )
            })?;
            fields.push(Arc::new(FieldMetadata::from_descriptor(
                &metadata.name,
                field,
                field_type,
            )));
        }
        Ok(Arc::from(fields))
    }
}
