//! Reference-typed objects
//!
//! An [`ObjectRef`] is a shared handle with a stable identity. Host-managed
//! objects (scene nodes, components, assets) and reference-typed data both use
//! it. Fields are interior-mutable so graphs with cycles can be built; the
//! parent link is weak so a container does not keep itself alive through its
//! children.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use indexmap::IndexMap;

use super::value::{TypeName, Value};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique object identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct ObjectData {
    id: ObjectId,
    type_name: TypeName,
    name: String,
    fields: RwLock<IndexMap<String, Value>>,
    children: RwLock<Vec<ObjectRef>>,
    parent: RwLock<Weak<ObjectData>>,
}

/// Shared handle to an object. Equality and hashing are by identity.
#[derive(Clone)]
pub struct ObjectRef(Arc<ObjectData>);

impl ObjectRef {
    pub fn new(type_name: impl AsRef<str>, name: impl Into<String>) -> Self {
        ObjectRef(Arc::new(ObjectData {
            id: ObjectId::next(),
            type_name: Arc::from(type_name.as_ref()),
            name: name.into(),
            fields: RwLock::new(IndexMap::new()),
            children: RwLock::new(Vec::new()),
            parent: RwLock::new(Weak::new()),
        }))
    }

    /// Builder-style field assignment.
    pub fn with_field(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_field(name, value);
        self
    }

    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    pub fn type_name(&self) -> &TypeName {
        &self.0.type_name
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn set_field(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.0
            .fields
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value.into());
    }

    /// Current value of a field. A field that was never set reads as null.
    pub fn field(&self, name: &str) -> Value {
        self.0
            .fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Snapshot of all set fields in insertion order.
    pub fn fields(&self) -> Vec<(String, Value)> {
        self.0
            .fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Attaches `child` under this object, replacing any previous parent link.
    pub fn add_child(&self, child: &ObjectRef) {
        *child.0.parent.write().unwrap_or_else(PoisonError::into_inner) = Arc::downgrade(&self.0);
        self.0
            .children
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(child.clone());
    }

    pub fn children(&self) -> Vec<ObjectRef> {
        self.0
            .children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn parent(&self) -> Option<ObjectRef> {
        self.0
            .parent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade()
            .map(ObjectRef)
    }

    /// `[parent path]/name`, or just the name for a root.
    pub fn full_path(&self) -> String {
        match self.parent() {
            Some(parent) => format!("[{}]/{}", parent.full_path(), self.name()),
            None => self.name().to_string(),
        }
    }

    /// This object and every descendant, depth first.
    pub fn self_and_descendants(&self) -> Vec<ObjectRef> {
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(next) = stack.pop() {
            let children = next.children();
            out.push(next);
            stack.extend(children.into_iter().rev());
        }
        out
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ObjectRef {}

impl Hash for ObjectRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for ObjectRef {
    // Fields are deliberately left out: they may point back at this object.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("id", &self.0.id)
            .field("type", &self.0.type_name)
            .field("name", &self.0.name)
            .finish()
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_equality() {
        let a = ObjectRef::new("Thing", "a");
        let b = ObjectRef::new("Thing", "a");
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_unset_field_reads_null() {
        let a = ObjectRef::new("Thing", "a");
        assert!(a.field("missing").is_null());
        a.set_field("count", 3i64);
        assert!(matches!(a.field("count"), Value::Int(3)));
    }

    #[test]
    fn test_full_path_nests_parents() {
        let root = ObjectRef::new("Node", "root");
        let mid = ObjectRef::new("Node", "mid");
        let leaf = ObjectRef::new("Node", "leaf");
        root.add_child(&mid);
        mid.add_child(&leaf);

        assert_eq!(root.full_path(), "root");
        assert_eq!(mid.full_path(), "[root]/mid");
        assert_eq!(leaf.full_path(), "[[root]/mid]/leaf");
    }

    #[test]
    fn test_self_and_descendants_order() {
        let root = ObjectRef::new("Node", "root");
        let a = ObjectRef::new("Node", "a");
        let b = ObjectRef::new("Node", "b");
        let a1 = ObjectRef::new("Node", "a1");
        root.add_child(&a);
        root.add_child(&b);
        a.add_child(&a1);

        let names: Vec<_> = root
            .self_and_descendants()
            .iter()
            .map(|o| o.name().to_string())
            .collect();
        assert_eq!(names, vec!["root", "a", "a1", "b"]);
    }

    #[test]
    fn test_cycle_through_fields_does_not_leak_debug() {
        let a = ObjectRef::new("Node", "a");
        a.set_field("me", a.clone());
        let rendered = format!("{:?}", a);
        assert!(rendered.contains("Node"));
    }
}
