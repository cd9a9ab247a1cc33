//! Recursive field traversal (part A of a run)
//!
//! Runs on the worker thread and never touches the host. Every check that
//! needs the host, and every diagnostic (building one resolves a display path),
//! is handed to the [`JobController`] as a main-thread job.
//!
//! Recursion follows value-like data and serialize-by-reference fields only.
//! Host objects met through a field are checked for liveness, not walked.

use std::collections::HashSet;
use std::sync::Arc;

use super::config::CheckFlags;
use super::custom::{run_guarded, CustomValidator};
use super::diagnostic::{CheckContext, Diagnostic, ErrorFactory};
use super::hierarchy::FieldHierarchy;
use super::job_controller::{JobController, MainThread};
use super::structure_cache::{ConditionAttribute, FieldMetadata, StructureCache, TypeMetadata};
use super::unique_values::UniqueValuesCache;
use crate::host::Host;
use crate::model::{EventValue, ListValue, ObjectId, ObjectRef, Value};
use crate::observability::ValidatorMetrics;
use crate::schema::ErrorMsg;

/// Shared state of one run's traversal. Cheap to clone; every clone feeds the
/// same queues, caches and counters.
#[derive(Clone)]
pub struct Traversal {
    cache: Arc<StructureCache>,
    jobs: JobController,
    unique: Option<Arc<UniqueValuesCache>>,
    tags: Arc<HashSet<String>>,
    validator: Option<Arc<dyn CustomValidator>>,
    checks: CheckFlags,
    context: CheckContext,
    metrics: Arc<ValidatorMetrics>,
}

impl Traversal {
    pub fn new(cache: Arc<StructureCache>, jobs: JobController, context: CheckContext) -> Self {
        Self {
            cache,
            jobs,
            unique: None,
            tags: Arc::new(HashSet::new()),
            validator: None,
            checks: CheckFlags::all(),
            context,
            metrics: Arc::new(ValidatorMetrics::new()),
        }
    }

    pub fn with_unique_values(mut self, unique: Arc<UniqueValuesCache>) -> Self {
        self.unique = Some(unique);
        self
    }

    /// Allowed tags, snapshotted from the host on the main thread.
    pub fn with_tags(mut self, tags: Arc<HashSet<String>>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_validator(mut self, validator: Option<Arc<dyn CustomValidator>>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_checks(mut self, checks: CheckFlags) -> Self {
        self.checks = checks;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ValidatorMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn jobs(&self) -> &JobController {
        &self.jobs
    }

    pub fn context(&self) -> &CheckContext {
        &self.context
    }

    pub fn metrics(&self) -> &Arc<ValidatorMetrics> {
        &self.metrics
    }

    fn enabled(&self, flags: CheckFlags) -> bool {
        self.checks.contains(flags)
    }

    /// Checks one object: its fields recursively, then the component-level
    /// custom validator.
    pub fn check_component(&self, component: &ObjectRef) {
        self.metrics.increment_objects_checked();
        let factory = ErrorFactory::new(component.clone(), self.context.clone());

        let mut walk = Walk {
            traversal: self,
            factory: factory.clone(),
            visiting: HashSet::new(),
        };
        let root = Value::Object(component.clone());
        walk.validate_fields(&root, component.type_name(), &FieldHierarchy::root());

        if !self.enabled(CheckFlags::CUSTOM_VALIDATORS) {
            return;
        }
        if let Some(validator) = &self.validator {
            let validator = Arc::clone(validator);
            let component = component.clone();
            let traversal = self.clone();
            let run = move || {
                let outcome = run_guarded(|| validator.validate_component(&component));
                traversal.report_custom(&factory, String::new(), outcome);
            };
            if self.validator_is_thread_safe() {
                self.metrics.increment_parallel_jobs();
                self.jobs.enqueue_parallel_job(run);
            } else {
                self.on_main(move |_| run());
            }
        }
    }

    fn validator_is_thread_safe(&self) -> bool {
        self.validator.as_ref().map_or(false, |v| v.is_thread_safe())
    }

    fn on_main<F>(&self, job: F)
    where
        F: FnOnce(&mut MainThread<'_>) + Send + 'static,
    {
        self.metrics.increment_main_jobs();
        self.jobs.enqueue_main_thread_job(job);
    }

    /// Defers building a diagnostic to the main thread.
    fn add_error<F>(&self, build: F)
    where
        F: FnOnce(&dyn Host) -> Diagnostic + Send + 'static,
    {
        let metrics = Arc::clone(&self.metrics);
        self.on_main(move |main| {
            let diagnostic = build(main.host());
            metrics.increment_diagnostics();
            main.push(diagnostic);
        });
    }

    fn emit(&self, main: &mut MainThread<'_>, diagnostic: Diagnostic) {
        self.metrics.increment_diagnostics();
        main.push(diagnostic);
    }

    /// Turns the outcome of a custom check into diagnostics.
    fn report_custom(
        &self,
        factory: &ErrorFactory,
        path: String,
        outcome: Result<Vec<ErrorMsg>, String>,
    ) {
        match outcome {
            Ok(errors) => {
                for error in errors {
                    let factory = factory.clone();
                    let path = path.clone();
                    self.add_error(move |host| factory.custom(host, &path, &error, true));
                }
            }
            Err(failure) => {
                let factory = factory.clone();
                self.add_error(move |host| factory.custom_exception(host, &path, &failure));
            }
        }
    }
}

/// Traversal of one root object.
struct Walk<'t> {
    traversal: &'t Traversal,
    factory: ErrorFactory,
    /// Objects on the current recursion path.
    visiting: HashSet<ObjectId>,
}

impl<'t> Walk<'t> {
    fn validate_fields(&mut self, node: &Value, declared_type: &str, path: &FieldHierarchy) {
        let t = self.traversal;

        if node.is_null() {
            if t.enabled(CheckFlags::NOT_NULL) {
                let factory = self.factory.clone();
                let path = path.render();
                t.add_error(move |host| factory.null_field(host, &path));
            }
            return;
        }

        let entered = match node {
            Value::Object(object) => {
                if !self.visiting.insert(object.id()) {
                    return;
                }
                Some(object.id())
            }
            _ => None,
        };

        self.validate_node(node, runtime_type(node, declared_type), path);

        if let Some(id) = entered {
            self.visiting.remove(&id);
        }
    }

    fn validate_node(&mut self, node: &Value, type_name: &str, path: &FieldHierarchy) {
        let t = self.traversal;

        let metadata = match t.cache.type_metadata_for(type_name) {
            Ok(metadata) => metadata,
            Err(e) => {
                self.bug(path, e.to_string());
                return;
            }
        };

        if let Some(descriptor) = &metadata.descriptor {
            if let (Some(check), true) = (&descriptor.self_check, t.enabled(CheckFlags::SELF_CHECKS)) {
                let thread_safe = check.is_thread_safe();
                let check = check.clone();
                let node = node.clone();
                let owner = self.factory.object().clone();
                let factory = self.factory.clone();
                let traversal = t.clone();
                let path = path.render();
                let run = move || {
                    let outcome = run_guarded(|| check.run(&node, &owner));
                    traversal.report_custom(&factory, path, outcome);
                };
                if thread_safe {
                    run();
                } else {
                    t.on_main(move |_| run());
                }
            }
        }

        if let Value::Event(event) = node {
            if t.enabled(CheckFlags::EVENTS) {
                self.check_event(event, path);
            }
        }

        let fields = match t.cache.fields_for(type_name) {
            Ok(fields) => fields,
            Err(e) => {
                self.bug(path, e.to_string());
                return;
            }
        };
        let skipped: &[String] = metadata
            .descriptor
            .as_ref()
            .map_or(&[], |d| d.skip_fields.as_slice());

        for field in fields.iter() {
            if skipped.iter().any(|s| *s == field.name) {
                continue;
            }
            self.validate_field(node, &metadata, field, path);
        }
    }

    fn validate_field(
        &mut self,
        node: &Value,
        node_type: &TypeMetadata,
        field: &Arc<FieldMetadata>,
        parent: &FieldHierarchy,
    ) {
        let t = self.traversal;
        t.metrics.increment_fields_visited();

        let value = field_value(node, &field.name);
        let path = parent.push(&field.name);
        let owner = self.factory.object().clone();

        if let (Some(validator), true) = (&t.validator, t.enabled(CheckFlags::CUSTOM_VALIDATORS)) {
            if validator.is_thread_safe() {
                let outcome = run_guarded(|| validator.validate_field(&owner, &value, field));
                t.report_custom(&self.factory, path.render(), outcome);
            } else {
                let validator = Arc::clone(validator);
                let owner = owner.clone();
                let value = value.clone();
                let field = Arc::clone(field);
                let factory = self.factory.clone();
                let traversal = t.clone();
                let path = path.render();
                t.on_main(move |_| {
                    let outcome = run_guarded(|| validator.validate_field(&owner, &value, &field));
                    traversal.report_custom(&factory, path, outcome);
                });
            }
        }

        if let (Some(unique), true) = (&t.unique, t.enabled(CheckFlags::UNIQUE_VALUES)) {
            for category in &field.unique_categories {
                unique.add(category.as_str(), value.clone(), owner.clone());
                t.metrics.increment_unique_observations();
            }
        }

        if let Value::Str(s) = &value {
            self.validate_string(node, field, s, &path);
        }

        if !field.serialized {
            return;
        }

        if t.enabled(CheckFlags::CONDITIONS) {
            for condition in &field.conditions {
                self.validate_condition(node, node_type, condition, &value, &path);
            }
        }

        match &value {
            Value::Null => {
                if field.requires_not_null && t.enabled(CheckFlags::NOT_NULL) {
                    let factory = self.factory.clone();
                    let path = path.render();
                    t.add_error(move |host| factory.null_field(host, &path));
                }
            }
            Value::Object(object) => {
                if field.requires_not_null && t.enabled(CheckFlags::NOT_NULL) {
                    let object = object.clone();
                    let factory = self.factory.clone();
                    let traversal = t.clone();
                    let path = path.render();
                    t.on_main(move |main| {
                        if !main.host().is_alive(&object) {
                            let diagnostic = factory.null_field(main.host(), &path);
                            traversal.emit(main, diagnostic);
                        }
                    });
                }
                let walkable = field.serialize_by_reference || field.field_type.is_value_like;
                if walkable && !field.field_type.is_host_object {
                    self.validate_fields(&value, &field.field_type.name, &path);
                }
            }
            Value::List(list) => {
                if list.is_empty() {
                    if field.requires_non_empty && t.enabled(CheckFlags::NON_EMPTY) {
                        let factory = self.factory.clone();
                        let path = path.render();
                        t.add_error(move |host| factory.empty_collection(host, &path));
                    }
                } else {
                    self.validate_list_elements(list, field, &path);
                }
            }
            _ => {
                let walkable = matches!(value, Value::Record(_) | Value::Event(_));
                if walkable && (field.field_type.is_value_like || field.serialize_by_reference) {
                    self.validate_fields(&value, &field.field_type.name, &path);
                }
                if t.enabled(CheckFlags::ENUMS) {
                    self.validate_enum(&value, field, &path);
                }
            }
        }
    }

    fn validate_string(&self, node: &Value, field: &FieldMetadata, s: &str, path: &FieldHierarchy) {
        let t = self.traversal;

        if field.tag_constrained && t.enabled(CheckFlags::TAGS) && !t.tags.contains(s) {
            let factory = self.factory.clone();
            let path = path.render();
            t.add_error(move |host| factory.disallowed_tag(host, &path));
        }

        if field.requires_non_empty && s.is_empty() && t.enabled(CheckFlags::NON_EMPTY) {
            let factory = self.factory.clone();
            let path = path.render();
            t.add_error(move |host| factory.empty_string(host, &path));
        }

        if let (Some(getter), true) = (&field.host_resource, t.enabled(CheckFlags::HOST_RESOURCES)) {
            let getter = getter.clone();
            let property = s.to_string();
            let node = node.clone();
            let factory = self.factory.clone();
            let traversal = t.clone();
            t.on_main(move |main| {
                if let Some(message) = main.host().check_resource_property(&node, &getter, &property) {
                    let diagnostic = factory.host_resource(main.host(), &message);
                    traversal.emit(main, diagnostic);
                }
            });
        }
    }

    /// Resolves the condition member now; evaluates it on the main thread.
    fn validate_condition(
        &self,
        node: &Value,
        node_type: &TypeMetadata,
        condition: &ConditionAttribute,
        value: &Value,
        path: &FieldHierarchy,
    ) {
        let t = self.traversal;
        let member = node_type
            .descriptor
            .as_ref()
            .and_then(|d| d.conditions.get(&condition.member))
            .cloned();

        let member = match member {
            Some(member) => member,
            None => {
                self.bug(
                    path,
                    format!(
                        "Validator method or property not found. Looked for method or property with a name {} on type {}",
                        condition.member, node_type.name
                    ),
                );
                return;
            }
        };

        let node = node.clone();
        let value = value.clone();
        let default_message = condition.default_message.clone();
        let factory = self.factory.clone();
        let traversal = t.clone();
        let path = path.render();
        t.on_main(move |main| {
            let outcome = run_guarded(|| {
                let failed = member.evaluate(&node, &value, &default_message);
                Ok(failed
                    .map(|m| ErrorMsg::new(format!("Custom validation failed with message: {}", m)))
                    .into_iter()
                    .collect())
            });
            let diagnostics: Vec<Diagnostic> = match outcome {
                Ok(errors) => errors
                    .iter()
                    .map(|e| factory.custom(main.host(), &path, e, false))
                    .collect(),
                Err(failure) => vec![factory.custom_exception(main.host(), &path, &failure)],
            };
            for diagnostic in diagnostics {
                traversal.emit(main, diagnostic);
            }
        });
    }

    fn validate_enum(&self, value: &Value, field: &FieldMetadata, path: &FieldHierarchy) {
        let (members, flags) = match field.field_type.enum_members() {
            Some(found) => found,
            None => return,
        };
        if flags {
            return;
        }
        let raw = match value {
            Value::Enum(e) => e.value,
            Value::Int(i) => *i,
            _ => return,
        };
        if members.contains(&raw) {
            return;
        }
        let message = ErrorMsg::new(format!(
            "Invalid enum value of '{}' for enum field of type '{}'.",
            raw, field.field_type.name
        ));
        let factory = self.factory.clone();
        let path = path.render();
        self.traversal
            .add_error(move |host| factory.custom(host, &path, &message, false));
    }

    fn validate_list_elements(&mut self, list: &ListValue, field: &FieldMetadata, path: &FieldHierarchy) {
        let t = self.traversal;

        let element = match t.cache.list_element_type_for(list) {
            Ok(element) => element,
            Err(e) => {
                self.bug(path, e.to_string());
                return;
            }
        };

        if (element.is_host_object || field.serialize_by_reference)
            && field.requires_not_null
            && t.enabled(CheckFlags::NOT_NULL)
        {
            let list = list.clone();
            let factory = self.factory.clone();
            let traversal = t.clone();
            let path = path.clone();
            t.on_main(move |main| {
                for (index, item) in list.iter().enumerate() {
                    let dead = match item {
                        Value::Null => true,
                        Value::Object(object) => !main.host().is_alive(object),
                        _ => false,
                    };
                    if dead {
                        let diagnostic =
                            factory.null_field(main.host(), &path.push_index(index).render());
                        traversal.emit(main, diagnostic);
                    }
                }
            });
        }

        if element.is_value_like || field.serialize_by_reference {
            for (index, item) in list.iter().enumerate() {
                self.validate_fields(item, &element.name, &path.push_index(index));
            }
        }
    }

    fn check_event(&self, event: &EventValue, path: &FieldHierarchy) {
        let t = self.traversal;
        let event = event.clone();
        let factory = self.factory.clone();
        let traversal = t.clone();
        let path = path.render();
        t.on_main(move |main| {
            for (index, callback) in event.callbacks.iter().enumerate() {
                let diagnostic = match (&callback.target, &callback.method) {
                    (Some(target), Some(method)) if callback.is_well_formed() => {
                        if main.host().resolve_callback(target, method) {
                            continue;
                        }
                        factory.callback_invalid_method(main.host(), &path, index)
                    }
                    _ => factory.callback_invalid(main.host(), &path, index),
                };
                traversal.emit(main, diagnostic);
            }
        });
    }

    fn bug(&self, path: &FieldHierarchy, message: String) {
        let factory = self.factory.clone();
        let path = path.render();
        self.traversal
            .add_error(move |host| factory.validator_bug(host, &path, &message));
    }
}

/// Concrete type of a node, falling back to the declared one.
fn runtime_type<'a>(node: &'a Value, declared: &'a str) -> &'a str {
    match node {
        Value::Object(object) => object.type_name().as_ref(),
        Value::Record(record) => record.type_name.as_ref(),
        Value::Enum(e) => e.type_name.as_ref(),
        _ => declared,
    }
}

fn field_value(node: &Value, name: &str) -> Value {
    match node {
        Value::Object(object) => object.field(name),
        Value::Record(record) => record.field(name).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}
