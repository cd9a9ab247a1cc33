//! Host runtime boundary
//!
//! The host owns the objects being checked and exposes an API that may only be
//! called from one designated thread. [`Host`] is intentionally not `Sync`:
//! the validator only hands it to jobs running on the main thread.

mod memory;

pub use memory::InMemoryHost;

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::model::{ObjectId, ObjectRef, Value};

/// Where an offending object lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum Location {
    Asset(String),
    Scene(String),
    Unknown,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Asset(path) | Location::Scene(path) => write!(f, "{}", path),
            Location::Unknown => write!(f, "Unknown location"),
        }
    }
}

/// Main-thread-affine host API.
pub trait Host {
    /// Whether a host-managed reference still points at a live object.
    fn is_alive(&self, object: &ObjectRef) -> bool;

    /// Display path of an object.
    fn full_path(&self, object: &ObjectRef) -> String {
        object.full_path()
    }

    fn location(&self, object: &ObjectRef) -> Location;

    /// Allowed values for tag-constrained strings.
    fn tags(&self) -> HashSet<String>;

    /// Whether `method` can be invoked on `target` by an event callback.
    fn resolve_callback(&self, target: &ObjectRef, method: &str) -> bool;

    /// Checks that `property` exists on the resource returned by `getter` on
    /// `owner`. Returns the failure message, if any.
    fn check_resource_property(&self, owner: &Value, getter: &str, property: &str) -> Option<String>;

    /// Expands roots into every object that should be checked with them:
    /// the roots, their descendants and every host object reachable through
    /// their fields. Deduplicated by identity, in discovery order.
    fn collect_dependencies(&self, roots: &[ObjectRef]) -> Vec<ObjectRef> {
        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut out = Vec::new();
        let mut pending: Vec<ObjectRef> = roots.iter().rev().cloned().collect();

        while let Some(object) = pending.pop() {
            if !seen.insert(object.id()) {
                continue;
            }
            let mut discovered = Vec::new();
            for (_, value) in object.fields() {
                collect_referenced_objects(&value, &mut discovered);
            }
            discovered.extend(object.children());
            out.push(object);
            pending.extend(discovered.into_iter().rev());
        }
        out
    }
}

fn collect_referenced_objects(value: &Value, out: &mut Vec<ObjectRef>) {
    match value {
        Value::Object(o) => out.push(o.clone()),
        Value::List(list) => list.iter().for_each(|v| collect_referenced_objects(v, out)),
        Value::Record(record) => record
            .fields
            .values()
            .for_each(|v| collect_referenced_objects(v, out)),
        _ => {}
    }
}
