//! JSON snapshot loader
//!
//! Builds a type registry, an [`InMemoryHost`] and the object graph from one
//! JSON document:
//!
//! ```json
//! {
//!   "context": "Scene: main",
//!   "types": [{ "name": "Player", "kind": "host_object", "fields": [...] }],
//!   "conditions": { "Player": { "isArmed": "armed" } },
//!   "tags": ["Enemy"],
//!   "methods": { "Door": ["Open"] },
//!   "resources": { "animator": ["Run"] },
//!   "objects": [{ "id": "p1", "type": "Player", "name": "Hero",
//!                 "fields": { "weapon": { "$ref": "w1" } }, "children": [] }],
//!   "roots": ["p1"]
//! }
//! ```
//!
//! Field values are converted using the declared field type. Fields the type
//! does not declare are still loaded (so stale references in them can be
//! found) with their shape inferred from the JSON.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value as Json;

use super::errors::{SnapshotError, SnapshotResult};
use crate::host::InMemoryHost;
use crate::model::{Callback, EnumValue, EventValue, ListValue, ObjectRef, Record, Value};
use crate::observability::{log_event_with_fields, Event};
use crate::schema::{list_element_name, ConditionMember, TypeDescriptor, TypeKind, TypeRegistry};
use crate::validator::CheckContext;

const REF_KEY: &str = "$ref";
const CALLBACKS_KEY: &str = "$callbacks";

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    #[serde(default = "default_context")]
    context: String,
    #[serde(default)]
    types: Vec<TypeDescriptor>,
    /// Type name -> condition member name -> bool field read on the owner
    #[serde(default)]
    conditions: HashMap<String, HashMap<String, String>>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    methods: HashMap<String, Vec<String>>,
    #[serde(default)]
    resources: HashMap<String, Vec<String>>,
    #[serde(default)]
    objects: Vec<ObjectEntry>,
    /// Defaults to every object without a parent, in declaration order.
    #[serde(default)]
    roots: Option<Vec<String>>,
}

fn default_context() -> String {
    "Snapshot".to_string()
}

#[derive(Debug, Deserialize)]
struct ObjectEntry {
    id: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    fields: serde_json::Map<String, Json>,
    #[serde(default)]
    children: Vec<String>,
    #[serde(default)]
    destroyed: bool,
    #[serde(default)]
    asset_path: Option<String>,
    #[serde(default)]
    scene_path: Option<String>,
}

/// A loaded snapshot, ready to be handed to a [`crate::validator::Validator`].
pub struct Snapshot {
    pub registry: Arc<TypeRegistry>,
    pub host: InMemoryHost,
    pub context: CheckContext,
    /// Every object by snapshot id, in declaration order
    pub objects: IndexMap<String, ObjectRef>,
    pub roots: Vec<ObjectRef>,
}

impl Snapshot {
    pub fn load(path: &Path) -> SnapshotResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SnapshotError::io_error(path, e))?;
        let snapshot = Self::from_json_str(&content)?;
        log_event_with_fields(
            Event::SnapshotLoaded,
            &[
                ("path", path.display().to_string().as_str()),
                ("objects", snapshot.objects.len().to_string().as_str()),
                ("roots", snapshot.roots.len().to_string().as_str()),
            ],
        );
        Ok(snapshot)
    }

    pub fn from_json_str(content: &str) -> SnapshotResult<Self> {
        let file: SnapshotFile = serde_json::from_str(content)
            .map_err(|e| SnapshotError::parse_error(format!("Invalid snapshot JSON: {}", e)))?;
        Self::build(file)
    }

    pub fn from_json(json: Json) -> SnapshotResult<Self> {
        let file: SnapshotFile = serde_json::from_value(json)
            .map_err(|e| SnapshotError::parse_error(format!("Invalid snapshot JSON: {}", e)))?;
        Self::build(file)
    }

    pub fn object(&self, id: &str) -> Option<&ObjectRef> {
        self.objects.get(id)
    }

    fn build(file: SnapshotFile) -> SnapshotResult<Self> {
        let registry = Arc::new(build_registry(file.types, file.conditions)?);

        let host = InMemoryHost::new().with_tags(file.tags);
        for (type_name, methods) in file.methods {
            for method in methods {
                host.add_method(type_name.clone(), method);
            }
        }
        for (getter, properties) in file.resources {
            for property in properties {
                host.add_resource_property(getter.clone(), property);
            }
        }

        let mut objects: IndexMap<String, ObjectRef> = IndexMap::new();
        for entry in &file.objects {
            if !registry.resolves(&entry.type_name) {
                return Err(SnapshotError::invalid(format!(
                    "unknown type '{}'",
                    entry.type_name
                ))
                .at(format!("objects[{}]", entry.id)));
            }
            let name = entry.name.clone().unwrap_or_else(|| entry.id.clone());
            let object = ObjectRef::new(&entry.type_name, name);
            if objects.insert(entry.id.clone(), object).is_some() {
                return Err(SnapshotError::invalid(format!("duplicate object id '{}'", entry.id)));
            }
        }

        let converter = Converter {
            registry: &registry,
            objects: &objects,
        };
        let mut has_parent: HashSet<&str> = HashSet::new();
        for entry in &file.objects {
            let object = &objects[entry.id.as_str()];
            let declared = registry.get(&entry.type_name);

            for (field, json) in &entry.fields {
                let location = format!("objects[{}].{}", entry.id, field);
                let declared_type = declared
                    .and_then(|d| d.fields.iter().find(|f| &f.name == field))
                    .map(|f| f.type_name.as_str());
                let value = match declared_type {
                    Some(type_name) => converter.convert(json, type_name, &location)?,
                    None => converter.infer(json, &location)?,
                };
                object.set_field(field.clone(), value);
            }

            for child_id in &entry.children {
                let child = converter.lookup(child_id, &format!("objects[{}].children", entry.id))?;
                object.add_child(child);
                has_parent.insert(child_id.as_str());
            }

            if entry.destroyed {
                host.destroy(object);
            }
            if let Some(path) = &entry.asset_path {
                host.set_asset_path(object, path.clone());
            }
            if let Some(path) = &entry.scene_path {
                host.set_scene_path(object, path.clone());
            }
        }

        let roots = match &file.roots {
            Some(ids) => ids
                .iter()
                .map(|id| converter.lookup(id, "roots").cloned())
                .collect::<SnapshotResult<Vec<_>>>()?,
            None => objects
                .iter()
                .filter(|(id, _)| !has_parent.contains(id.as_str()))
                .map(|(_, object)| object.clone())
                .collect(),
        };

        Ok(Self {
            registry,
            host,
            context: CheckContext::new(file.context),
            objects,
            roots,
        })
    }
}

fn build_registry(
    types: Vec<TypeDescriptor>,
    mut conditions: HashMap<String, HashMap<String, String>>,
) -> SnapshotResult<TypeRegistry> {
    let mut registry = TypeRegistry::new();
    for mut descriptor in types {
        if let Some(members) = conditions.remove(&descriptor.name) {
            for (member, field) in members {
                descriptor = descriptor.condition_member(member, bool_field_member(field));
            }
        }
        registry.register(descriptor)?;
    }
    if let Some(type_name) = conditions.keys().next() {
        return Err(SnapshotError::invalid(format!(
            "conditions declared for unknown type '{}'",
            type_name
        )));
    }
    registry.validate_references()?;
    Ok(registry)
}

/// A condition member backed by a boolean field of the owner. A missing or
/// non-boolean field counts as false.
fn bool_field_member(field: String) -> ConditionMember {
    ConditionMember::property(move |owner| {
        let value = match owner {
            Value::Object(object) => Some(object.field(&field)),
            Value::Record(record) => record.field(&field).cloned(),
            _ => None,
        };
        value.and_then(|v| v.as_bool()).unwrap_or(false)
    })
}

struct Converter<'a> {
    registry: &'a TypeRegistry,
    objects: &'a IndexMap<String, ObjectRef>,
}

impl<'a> Converter<'a> {
    fn lookup(&self, id: &str, location: &str) -> SnapshotResult<&'a ObjectRef> {
        self.objects.get(id).ok_or_else(|| {
            SnapshotError::invalid(format!("reference to unknown object '{}'", id)).at(location)
        })
    }

    fn convert(&self, json: &Json, type_name: &str, location: &str) -> SnapshotResult<Value> {
        if json.is_null() {
            return Ok(Value::Null);
        }
        if let Some(element) = list_element_name(type_name) {
            let items = json
                .as_array()
                .ok_or_else(|| mismatch(json, type_name, location))?
                .iter()
                .enumerate()
                .map(|(i, item)| self.convert(item, element, &format!("{}[{}]", location, i)))
                .collect::<SnapshotResult<Vec<_>>>()?;
            return Ok(Value::List(ListValue::typed(element, items)));
        }

        let descriptor = self.registry.get(type_name).ok_or_else(|| {
            SnapshotError::invalid(format!("unknown type '{}'", type_name)).at(location)
        })?;
        let value = match &descriptor.kind {
            TypeKind::Bool => json.as_bool().map(Value::Bool),
            TypeKind::Int => json.as_i64().map(Value::Int),
            TypeKind::Float => json.as_f64().map(Value::Float),
            TypeKind::String => json.as_str().map(Value::str),
            TypeKind::Enum { members, flags } => {
                let raw = match json {
                    Json::Number(n) => n.as_i64(),
                    Json::String(s) => Some(parse_enum_name(s, members, *flags, type_name, location)?),
                    _ => None,
                };
                raw.map(|raw| Value::Enum(EnumValue::new(type_name, raw)))
            }
            TypeKind::Struct | TypeKind::Class { .. } => match json.as_object() {
                Some(map) => Some(self.record(map, descriptor, location)?),
                None => None,
            },
            TypeKind::HostObject => match ref_id(json) {
                Some(id) => Some(Value::Object(self.lookup(id, location)?.clone())),
                None => None,
            },
            TypeKind::Event => match callbacks(json) {
                Some(entries) => Some(self.event(entries, location)?),
                None => None,
            },
        };
        value.ok_or_else(|| mismatch(json, type_name, location))
    }

    fn record(
        &self,
        map: &serde_json::Map<String, Json>,
        descriptor: &TypeDescriptor,
        location: &str,
    ) -> SnapshotResult<Value> {
        let mut fields = IndexMap::new();
        for (name, json) in map {
            let field_location = format!("{}.{}", location, name);
            let value = match descriptor.fields.iter().find(|f| &f.name == name) {
                Some(field) => self.convert(json, &field.type_name, &field_location)?,
                None => self.infer(json, &field_location)?,
            };
            fields.insert(name.clone(), value);
        }
        Ok(Value::Record(Record::new(&descriptor.name, fields)))
    }

    fn event(&self, entries: &[Json], location: &str) -> SnapshotResult<Value> {
        let mut out = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let entry_location = format!("{}.callbacks[{}]", location, i);
            let target = match entry.get("target").and_then(Json::as_str) {
                Some(id) => Some(self.lookup(id, &entry_location)?.clone()),
                None => None,
            };
            let method = entry
                .get("method")
                .and_then(Json::as_str)
                .map(Arc::from);
            out.push(Callback { target, method });
        }
        Ok(Value::Event(EventValue::new(out)))
    }

    /// Best-effort conversion for fields without a declared type.
    fn infer(&self, json: &Json, location: &str) -> SnapshotResult<Value> {
        if let Some(id) = ref_id(json) {
            return Ok(Value::Object(self.lookup(id, location)?.clone()));
        }
        if let Some(entries) = callbacks(json) {
            return self.event(entries, location);
        }
        Ok(match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            Json::String(s) => Value::str(s),
            Json::Array(items) => Value::List(ListValue::untyped(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.infer(item, &format!("{}[{}]", location, i)))
                    .collect::<SnapshotResult<Vec<_>>>()?,
            )),
            Json::Object(map) => {
                let mut fields = IndexMap::new();
                for (name, item) in map {
                    fields.insert(name.clone(), self.infer(item, &format!("{}.{}", location, name))?);
                }
                Value::Record(Record::new("object", fields))
            }
        })
    }
}

fn ref_id(json: &Json) -> Option<&str> {
    json.as_object()
        .filter(|map| map.len() == 1)
        .and_then(|map| map.get(REF_KEY))
        .and_then(Json::as_str)
}

fn callbacks(json: &Json) -> Option<&[Json]> {
    json.as_object()
        .and_then(|map| map.get(CALLBACKS_KEY))
        .and_then(Json::as_array)
        .map(Vec::as_slice)
}

/// Parses a member name, or `A|B` for flag enums.
fn parse_enum_name(
    text: &str,
    members: &[crate::schema::EnumMember],
    flags: bool,
    type_name: &str,
    location: &str,
) -> SnapshotResult<i64> {
    let find = |name: &str| {
        members
            .iter()
            .find(|m| m.name == name.trim())
            .map(|m| m.value)
            .ok_or_else(|| {
                SnapshotError::invalid(format!("'{}' is not a member of '{}'", name.trim(), type_name))
                    .at(location)
            })
    };
    if flags {
        text.split('|').try_fold(0, |acc, name| Ok(acc | find(name)?))
    } else {
        find(text)
    }
}

fn mismatch(json: &Json, type_name: &str, location: &str) -> SnapshotError {
    SnapshotError::invalid(format!("value {} does not fit type '{}'", json, type_name)).at(location)
}
