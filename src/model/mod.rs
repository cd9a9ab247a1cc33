//! Data model of the objects being checked
//!
//! The host owns these objects. The validator only reads them.

mod equality;
mod object;
mod value;

pub use equality::structural_eq;
pub use object::{ObjectId, ObjectRef};
pub use value::{Callback, EnumValue, EventValue, ListValue, Record, TypeName, Value};
