//! Schema subsystem for objval
//!
//! The declarative rule table: which types exist, which fields they have and
//! which checks each field asks for. Built once, before a run, then shared
//! read-only.

mod checks;
mod errors;
mod registry;
mod types;

pub use checks::{CheckFailure, ConditionMember, ErrorMsg, SelfCheck};
pub use errors::{SchemaError, SchemaErrorCode, SchemaResult};
pub use registry::{TypeRegistry, BUILTIN_TYPES};
pub use types::{
    list_element_name, EnumMember, FieldAttribute, FieldDescriptor, TypeDescriptor, TypeKind,
    LIST_SUFFIX,
};
