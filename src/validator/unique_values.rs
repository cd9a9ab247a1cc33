//! Cross-object duplicate detection
//!
//! Observations are appended from any thread during the run and read after
//! it. Reading never removes an observation. Grouping uses [`structural_eq`] inside a category with a
//! linear scan: values have no cheap hash that agrees with structural
//! equality, so none is used.

use std::sync::{Mutex, PoisonError};

use crossbeam_queue::SegQueue;
use indexmap::IndexMap;

use crate::model::{structural_eq, ObjectRef, Value};

/// One uniqueness observation.
#[derive(Debug, Clone)]
pub struct CheckedField {
    pub category: String,
    pub value: Value,
    pub owner: ObjectRef,
}

/// Owners sharing a structurally equal value within a category.
#[derive(Debug, Clone)]
pub struct DuplicateField {
    pub category: String,
    pub value: Value,
    /// Distinct owners in order of first observation.
    pub owners: Vec<ObjectRef>,
    /// Observations in the group, counting repeats by the same owner.
    pub observations: usize,
}

#[derive(Debug, Default)]
pub struct UniqueValuesCache {
    /// Lock-free landing queue for observations made during the run.
    pending: SegQueue<CheckedField>,
    /// Observations already moved out of `pending`, in arrival order.
    settled: Mutex<Vec<CheckedField>>,
}

impl UniqueValuesCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, category: impl Into<String>, value: Value, owner: ObjectRef) {
        self.pending.push(CheckedField {
            category: category.into(),
            value,
            owner,
        });
    }

    pub fn len(&self) -> usize {
        let settled = self.settled.lock().unwrap_or_else(PoisonError::into_inner);
        settled.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every observation made so far, in arrival order.
    pub fn observations(&self) -> Vec<CheckedField> {
        let mut settled = self.settled.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(field) = self.pending.pop() {
            settled.push(field);
        }
        settled.clone()
    }

    /// Groups duplicates over every observation made so far.
    ///
    /// A group is reported when it has more than one distinct owner, or, with
    /// `count_same_owner`, when it has more than one observation at all.
    pub fn duplicates(&self, count_same_owner: bool) -> Vec<DuplicateField> {
        let mut by_category: IndexMap<String, Vec<CheckedField>> = IndexMap::new();
        for field in self.observations() {
            by_category
                .entry(field.category.clone())
                .or_default()
                .push(field);
        }

        let mut out = Vec::new();
        for (category, fields) in by_category {
            let mut groups: Vec<DuplicateField> = Vec::new();
            for field in fields {
                match groups
                    .iter_mut()
                    .find(|g| structural_eq(&g.value, &field.value))
                {
                    Some(group) => {
                        group.observations += 1;
                        if !group.owners.contains(&field.owner) {
                            group.owners.push(field.owner);
                        }
                    }
                    None => groups.push(DuplicateField {
                        category: category.clone(),
                        value: field.value,
                        owners: vec![field.owner],
                        observations: 1,
                    }),
                }
            }
            out.extend(groups.into_iter().filter(|g| {
                g.owners.len() > 1 || (count_same_owner && g.observations > 1)
            }));
        }
        out
    }
}
