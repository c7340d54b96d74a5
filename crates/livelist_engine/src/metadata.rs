//! Attribute value histograms.
//!
//! For every tracked attribute the index keeps the distinct values present in
//! the live list together with the number of entities carrying them. Array
//! attributes contribute one count per element. The index is maintained
//! incrementally by the same mutation paths that change the live list and
//! must always equal a from-scratch recomputation ([`MetadataIndex::rebuild`]).

use crate::entity::Entity;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Kind of change being folded into the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataAction {
    /// A new entity entered the live list.
    Create,
    /// An existing entity changed.
    Update,
    /// An entity left the live list.
    Delete,
}

/// One distinct value of a tracked attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataEntry {
    /// The attribute value.
    pub value: Value,
    /// Number of live entities carrying the value. Always at least one.
    pub count: u64,
}

/// Value histograms for a fixed set of attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataIndex {
    table: BTreeMap<String, Vec<MetadataEntry>>,
}

impl MetadataIndex {
    /// Creates an empty index tracking `attributes`.
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: attributes
                .into_iter()
                .map(|name| (name.into(), Vec::new()))
                .collect(),
        }
    }

    /// Builds an index from scratch over `entities`.
    pub fn rebuild<'a, I, S>(attributes: I, entities: impl IntoIterator<Item = &'a Entity>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = Self::new(attributes);
        for entity in entities {
            index.update(entity, MetadataAction::Create, None);
        }
        index
    }

    /// Returns the tracked attribute names.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    /// Returns the entries of one attribute, in first-seen order.
    pub fn entries(&self, attribute: &str) -> &[MetadataEntry] {
        self.table.get(attribute).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the count for one value (zero if absent).
    pub fn count(&self, attribute: &str, value: &Value) -> u64 {
        self.entries(attribute)
            .iter()
            .find(|entry| &entry.value == value)
            .map(|entry| entry.count)
            .unwrap_or(0)
    }

    /// Returns an order-independent view of one attribute.
    ///
    /// Entries are keyed by their JSON text and sorted, so two indexes built
    /// through different mutation orders compare equal.
    pub fn histogram(&self, attribute: &str) -> Vec<(String, u64)> {
        let mut histogram: Vec<(String, u64)> = self
            .entries(attribute)
            .iter()
            .map(|entry| (entry.value.to_string(), entry.count))
            .collect();
        histogram.sort();
        histogram
    }

    /// Returns true if both indexes hold the same counts, ignoring order.
    pub fn same_counts(&self, other: &MetadataIndex) -> bool {
        self.table.len() == other.table.len()
            && self
                .table
                .keys()
                .all(|attr| self.histogram(attr) == other.histogram(attr))
    }

    /// Folds a change of `item` into every tracked attribute.
    ///
    /// For [`MetadataAction::Update`], `old_item` is the entity being
    /// replaced; without it the update is ignored.
    pub fn update(&mut self, item: &Entity, action: MetadataAction, old_item: Option<&Entity>) {
        for (attribute, entries) in self.table.iter_mut() {
            let new_values = values_of(item.get(attribute));
            match action {
                MetadataAction::Create => {
                    for value in new_values {
                        increment(entries, value);
                    }
                }
                MetadataAction::Delete => {
                    for value in new_values {
                        decrement(entries, value);
                    }
                }
                MetadataAction::Update => {
                    let Some(old_item) = old_item else {
                        continue;
                    };
                    let (created, deleted) =
                        multiset_difference(values_of(old_item.get(attribute)), new_values);
                    for value in deleted {
                        decrement(entries, value);
                    }
                    for value in created {
                        increment(entries, value);
                    }
                }
            }
        }
    }
}

/// Values an attribute contributes to its histogram.
///
/// Scalars contribute themselves, arrays their elements. `null` and empty
/// strings never count.
fn values_of(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter(|v| !is_empty(v)).collect(),
        Some(v) if is_empty(v) => Vec::new(),
        Some(v) => vec![v],
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Splits an old/new pair into (only-in-new, only-in-old).
///
/// Each new element cancels at most one equal old element.
fn multiset_difference<'a>(
    old: Vec<&'a Value>,
    new: Vec<&'a Value>,
) -> (Vec<&'a Value>, Vec<&'a Value>) {
    let mut deleted = old;
    let mut created = Vec::new();
    for value in new {
        match deleted.iter().position(|old| *old == value) {
            Some(idx) => {
                deleted.remove(idx);
            }
            None => created.push(value),
        }
    }
    (created, deleted)
}

fn increment(entries: &mut Vec<MetadataEntry>, value: &Value) {
    match entries.iter_mut().find(|entry| &entry.value == value) {
        Some(entry) => entry.count += 1,
        None => entries.push(MetadataEntry {
            value: value.clone(),
            count: 1,
        }),
    }
}

fn decrement(entries: &mut Vec<MetadataEntry>, value: &Value) {
    if let Some(idx) = entries.iter().position(|entry| &entry.value == value) {
        let entry = &mut entries[idx];
        entry.count = entry.count.saturating_sub(1);
        if entry.count == 0 {
            entries.remove(idx);
        }
    }
}
