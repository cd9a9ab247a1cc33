//! Field values as seen by the traversal
//!
//! Values are cheap to clone: every compound payload sits behind an `Arc`.
//! Records are immutable value types, compared structurally. Reference-typed
//! data lives in [`ObjectRef`] and compares by identity.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::object::ObjectRef;

/// Name of a registered type, shared between descriptors and values.
pub type TypeName = Arc<str>;

/// A single field value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Enum(EnumValue),
    List(ListValue),
    Record(Record),
    Object(ObjectRef),
    Event(EventValue),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListValue> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Short variant name, used in loader and structure errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Enum(_) => "enum",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Object(_) => "object",
            Value::Event(_) => "event",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

impl From<ListValue> for Value {
    fn from(l: ListValue) -> Self {
        Value::List(l)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Enum(e) => write!(f, "{}", e.value),
            Value::List(l) => {
                write!(f, "[")?;
                for (i, item) in l.items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Record(r) => {
                write!(f, "{} {{", r.type_name)?;
                for (i, (name, value)) in r.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {}", name, value)?;
                }
                write!(f, " }}")
            }
            Value::Object(o) => write!(f, "{} ({})", o.name(), o.type_name()),
            Value::Event(e) => write!(f, "event({} callbacks)", e.callbacks.len()),
        }
    }
}

/// A value of an enum type. Holds the raw discriminant so values outside the
/// declared member set can be represented and reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub type_name: TypeName,
    pub value: i64,
}

impl EnumValue {
    pub fn new(type_name: impl AsRef<str>, value: i64) -> Self {
        Self {
            type_name: Arc::from(type_name.as_ref()),
            value,
        }
    }
}

/// An ordered sequence.
///
/// `element_type` is the concrete element type the list was created with. An
/// untyped list (`None`) can be stored and compared, but the structure cache
/// refuses to describe its elements.
#[derive(Debug, Clone)]
pub struct ListValue {
    pub element_type: Option<TypeName>,
    pub items: Arc<[Value]>,
}

impl ListValue {
    pub fn typed(element_type: impl AsRef<str>, items: Vec<Value>) -> Self {
        Self {
            element_type: Some(Arc::from(element_type.as_ref())),
            items: items.into(),
        }
    }

    pub fn untyped(items: Vec<Value>) -> Self {
        Self {
            element_type: None,
            items: items.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter()
    }
}

/// An immutable value-type instance with named fields.
#[derive(Debug, Clone)]
pub struct Record {
    pub type_name: TypeName,
    pub fields: Arc<IndexMap<String, Value>>,
}

impl Record {
    pub fn new(type_name: impl AsRef<str>, fields: IndexMap<String, Value>) -> Self {
        Self {
            type_name: Arc::from(type_name.as_ref()),
            fields: Arc::new(fields),
        }
    }

    /// Builds a record from `(name, value)` pairs, keeping their order.
    pub fn from_pairs<I, K>(type_name: impl AsRef<str>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::new(
            type_name,
            pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// One persistent callback entry of an event field.
#[derive(Debug, Clone)]
pub struct Callback {
    pub target: Option<ObjectRef>,
    pub method: Option<Arc<str>>,
}

impl Callback {
    pub fn new(target: ObjectRef, method: impl AsRef<str>) -> Self {
        Self {
            target: Some(target),
            method: Some(Arc::from(method.as_ref())),
        }
    }

    /// An entry is well-formed when it names both a target and a method.
    pub fn is_well_formed(&self) -> bool {
        self.target.is_some() && self.method.as_deref().map_or(false, |m| !m.is_empty())
    }
}

/// A host callback list. Checking it requires the host.
#[derive(Debug, Clone, Default)]
pub struct EventValue {
    pub callbacks: Arc<[Callback]>,
}

impl EventValue {
    pub fn new(callbacks: Vec<Callback>) -> Self {
        Self {
            callbacks: callbacks.into(),
        }
    }
}
