//! In-memory host
//!
//! Holds host state in plain collections behind `RefCell`, which also keeps the
//! type `!Sync` like a real main-thread API. Used by the snapshot loader and
//! by tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use super::{Host, Location};
use crate::model::{ObjectId, ObjectRef, Value};

#[derive(Debug, Default)]
pub struct InMemoryHost {
    destroyed: RefCell<HashSet<ObjectId>>,
    tags: RefCell<HashSet<String>>,
    asset_paths: RefCell<HashMap<ObjectId, String>>,
    scene_paths: RefCell<HashMap<ObjectId, String>>,
    /// Invocable methods per target type.
    methods: RefCell<HashMap<String, HashSet<String>>>,
    /// Known properties per resource getter.
    resources: RefCell<HashMap<String, HashSet<String>>>,
    calls: Cell<u64>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.borrow_mut().extend(tags.into_iter().map(Into::into));
        self
    }

    /// Marks an object as destroyed. References to it become dead.
    pub fn destroy(&self, object: &ObjectRef) {
        self.destroyed.borrow_mut().insert(object.id());
    }

    pub fn set_asset_path(&self, object: &ObjectRef, path: impl Into<String>) {
        self.asset_paths.borrow_mut().insert(object.id(), path.into());
    }

    pub fn set_scene_path(&self, object: &ObjectRef, path: impl Into<String>) {
        self.scene_paths.borrow_mut().insert(object.id(), path.into());
    }

    pub fn add_method(&self, type_name: impl Into<String>, method: impl Into<String>) {
        self.methods
            .borrow_mut()
            .entry(type_name.into())
            .or_default()
            .insert(method.into());
    }

    pub fn add_resource_property(&self, getter: impl Into<String>, property: impl Into<String>) {
        self.resources
            .borrow_mut()
            .entry(getter.into())
            .or_default()
            .insert(property.into());
    }

    /// Number of host API calls served so far.
    pub fn calls(&self) -> u64 {
        self.calls.get()
    }

    fn record_call(&self) {
        self.calls.set(self.calls.get() + 1);
    }

    /// Looks up a per-object path on the object itself, then on its ancestors.
    fn inherited_path(
        paths: &HashMap<ObjectId, String>,
        object: &ObjectRef,
    ) -> Option<String> {
        let mut current = Some(object.clone());
        while let Some(node) = current {
            if let Some(path) = paths.get(&node.id()) {
                return Some(path.clone());
            }
            current = node.parent();
        }
        None
    }
}

impl Host for InMemoryHost {
    fn is_alive(&self, object: &ObjectRef) -> bool {
        self.record_call();
        !self.destroyed.borrow().contains(&object.id())
    }

    fn full_path(&self, object: &ObjectRef) -> String {
        self.record_call();
        object.full_path()
    }

    fn location(&self, object: &ObjectRef) -> Location {
        self.record_call();
        if let Some(path) = Self::inherited_path(&self.asset_paths.borrow(), object) {
            return Location::Asset(path);
        }
        if let Some(path) = Self::inherited_path(&self.scene_paths.borrow(), object) {
            return Location::Scene(path);
        }
        Location::Unknown
    }

    fn tags(&self) -> HashSet<String> {
        self.record_call();
        self.tags.borrow().clone()
    }

    fn resolve_callback(&self, target: &ObjectRef, method: &str) -> bool {
        self.record_call();
        self.is_alive(target)
            && self
                .methods
                .borrow()
                .get(target.type_name().as_ref())
                .map_or(false, |methods| methods.contains(method))
    }

    fn check_resource_property(&self, _owner: &Value, getter: &str, property: &str) -> Option<String> {
        self.record_call();
        let resources = self.resources.borrow();
        let properties = resources.get(getter)?;
        if properties.contains(property) {
            None
        } else {
            Some(format!(
                "Resource returned by '{}' has no property '{}'",
                getter, property
            ))
        }
    }
}
