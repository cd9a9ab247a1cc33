//! Main-thread part of a run (part B) and root expansion
//!
//! These checks call the host directly and are cheap, so they run
//! synchronously on the calling thread instead of going through the queue.

use std::collections::HashSet;

use super::config::CheckFlags;
use super::diagnostic::{CheckContext, Diagnostic};
use super::structure_cache::StructureCache;
use crate::host::Host;
use crate::model::{ObjectId, ObjectRef, Value};

/// Objects selected for a run plus the containers found holding dead children.
#[derive(Debug, Default)]
pub struct Expansion {
    pub objects: Vec<ObjectRef>,
    pub missing: Vec<Diagnostic>,
}

/// Expands roots into every distinct live object under them, in depth-first
/// order. A destroyed child is reported on its container and not descended into.
pub fn expand_components(host: &dyn Host, roots: &[ObjectRef], checks: CheckFlags) -> Expansion {
    let mut expansion = Expansion::default();
    let mut seen: HashSet<ObjectId> = HashSet::new();
    let report = checks.contains(CheckFlags::MISSING_COMPONENTS);

    let mut stack: Vec<ObjectRef> = roots
        .iter()
        .rev()
        .filter(|root| host.is_alive(root))
        .cloned()
        .collect();

    while let Some(object) = stack.pop() {
        if !seen.insert(object.id()) {
            continue;
        }
        let children = object.children();
        for child in children.iter().rev() {
            if host.is_alive(child) {
                stack.push(child.clone());
            } else if report {
                expansion.missing.push(Diagnostic::missing_component(host, &object));
            }
        }
        expansion.objects.push(object);
    }
    expansion
}

/// Part B for one object: required siblings and references to destroyed objects.
pub fn check_component_main_thread_part(
    host: &dyn Host,
    cache: &StructureCache,
    component: &ObjectRef,
    context: &CheckContext,
    checks: CheckFlags,
) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    if checks.contains(CheckFlags::REQUIRED_COMPONENTS) {
        check_required_components(host, cache, component, context, &mut out);
    }
    if checks.contains(CheckFlags::MISSING_REFERENCES) {
        check_missing_references(host, cache, component, context, &mut out);
    }
    out
}

fn check_required_components(
    host: &dyn Host,
    cache: &StructureCache,
    component: &ObjectRef,
    context: &CheckContext,
    out: &mut Vec<Diagnostic>,
) {
    let requires = match cache
        .type_metadata_for(component.type_name())
        .ok()
        .and_then(|m| m.descriptor.clone())
    {
        Some(descriptor) if !descriptor.requires.is_empty() => descriptor,
        _ => return,
    };
    let container = match component.parent() {
        Some(parent) => parent,
        None => return,
    };

    let siblings: Vec<ObjectRef> = container
        .children()
        .into_iter()
        .filter(|c| host.is_alive(c))
        .collect();

    for required in &requires.requires {
        let present = siblings.iter().any(|s| s.type_name().as_ref() == required.as_str());
        if !present {
            out.push(Diagnostic::required_component_missing(
                host,
                &container,
                required,
                component.type_name(),
                context,
            ));
        }
    }
}

fn check_missing_references(
    host: &dyn Host,
    cache: &StructureCache,
    component: &ObjectRef,
    context: &CheckContext,
    out: &mut Vec<Diagnostic>,
) {
    let skipped: HashSet<String> = cache
        .fields_for(component.type_name())
        .map(|fields| {
            fields
                .iter()
                .filter(|f| !f.serialized)
                .map(|f| f.name.clone())
                .collect()
        })
        .unwrap_or_default();

    for (name, value) in component.fields() {
        if skipped.contains(&name) {
            continue;
        }
        scan_references(host, component, context, &value, &name, out);
    }
}

/// Reports every reference under `value` whose target is destroyed. Does not
/// follow references into other objects.
fn scan_references(
    host: &dyn Host,
    component: &ObjectRef,
    context: &CheckContext,
    value: &Value,
    property: &str,
    out: &mut Vec<Diagnostic>,
) {
    match value {
        Value::Object(target) => {
            if !host.is_alive(target) {
                out.push(Diagnostic::missing_reference(host, component, property, context));
            }
        }
        Value::List(list) => {
            for (index, item) in list.iter().enumerate() {
                let path = format!("{}[{}]", property, index);
                scan_references(host, component, context, item, &path, out);
            }
        }
        Value::Record(record) => {
            for (field, item) in record.fields.iter() {
                let path = format!("{}.{}", property, field);
                scan_references(host, component, context, item, &path, out);
            }
        }
        Value::Event(event) => {
            for (index, callback) in event.callbacks.iter().enumerate() {
                if let Some(target) = &callback.target {
                    if !host.is_alive(target) {
                        let path = format!("{}.callbacks[{}].target", property, index);
                        out.push(Diagnostic::missing_reference(host, component, &path, context));
                    }
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryHost;
    use crate::model::{Callback, EventValue, ListValue, Record};
    use crate::schema::{FieldDescriptor, TypeDescriptor, TypeRegistry};
    use crate::validator::diagnostic::DiagnosticKind;
    use std::sync::Arc;

    fn cache() -> StructureCache {
        let mut registry = TypeRegistry::new();
        registry
            .register_all(vec![
                TypeDescriptor::host_object("Entity"),
                TypeDescriptor::host_object("Body"),
                TypeDescriptor::host_object("Collider")
                    .requires("Body")
                    .field(FieldDescriptor::new("target", "Entity"))
                    .field(FieldDescriptor::new("cache", "Entity").not_serialized()),
            ])
            .unwrap();
        StructureCache::new(Arc::new(registry))
    }

    #[test]
    fn test_expansion_reports_dead_children() {
        let host = InMemoryHost::new();
        let root = ObjectRef::new("Entity", "root");
        let a = ObjectRef::new("Entity", "a");
        let dead = ObjectRef::new("Body", "dead");
        let a1 = ObjectRef::new("Entity", "a1");
        root.add_child(&a);
        root.add_child(&dead);
        a.add_child(&a1);
        host.destroy(&dead);

        let expansion = expand_components(&host, &[root.clone(), a.clone()], CheckFlags::all());
        let names: Vec<_> = expansion.objects.iter().map(|o| o.name().to_string()).collect();
        assert_eq!(names, vec!["root", "a", "a1"]);
        assert_eq!(expansion.missing.len(), 1);
        assert_eq!(expansion.missing[0].kind, DiagnosticKind::MissingComponent);
        assert_eq!(expansion.missing[0].object.as_ref(), Some(&root));

        let quiet = expand_components(&host, &[root], CheckFlags::all() - CheckFlags::MISSING_COMPONENTS);
        assert_eq!(quiet.objects.len(), 3);
        assert!(quiet.missing.is_empty());
    }

    #[test]
    fn test_required_component_missing() {
        let host = InMemoryHost::new();
        let cache = cache();
        let context = CheckContext::new("ctx");
        let entity = ObjectRef::new("Entity", "e");
        let collider = ObjectRef::new("Collider", "c");
        entity.add_child(&collider);

        let found = check_component_main_thread_part(&host, &cache, &collider, &context, CheckFlags::all());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, DiagnosticKind::MissingRequiredComponent);
        assert_eq!(found[0].message, "ctx. Body missing (required by Collider)");
        assert_eq!(found[0].object.as_ref(), Some(&entity));

        let body = ObjectRef::new("Body", "b");
        entity.add_child(&body);
        assert!(check_component_main_thread_part(&host, &cache, &collider, &context, CheckFlags::all()).is_empty());

        host.destroy(&body);
        assert_eq!(
            check_component_main_thread_part(&host, &cache, &collider, &context, CheckFlags::all()).len(),
            1
        );
    }

    #[test]
    fn test_missing_references_walk_nested_data() {
        let host = InMemoryHost::new();
        let cache = cache();
        let context = CheckContext::new("ctx");
        let gone = ObjectRef::new("Entity", "gone");
        host.destroy(&gone);

        let collider = ObjectRef::new("Collider", "c")
            .with_field("target", gone.clone())
            .with_field("cache", gone.clone())
            .with_field(
                "extra",
                ListValue::typed(
                    "Pair",
                    vec![Value::Record(Record::from_pairs(
                        "Pair",
                        vec![("left", Value::Object(gone.clone()))],
                    ))],
                ),
            )
            .with_field(
                "onHit",
                Value::Event(EventValue::new(vec![Callback::new(gone, "run")])),
            );

        let found = check_component_main_thread_part(
            &host,
            &cache,
            &collider,
            &context,
            CheckFlags::MISSING_REFERENCES,
        );
        let messages: Vec<_> = found.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "ctx. Property: target",
                "ctx. Property: extra[0].left",
                "ctx. Property: onHit.callbacks[0].target",
            ]
        );
        assert!(found.iter().all(|d| d.kind == DiagnosticKind::MissingReference));
    }
}
