//! Session-scoped table of claimed domain values
//!
//! Every Domain field that holds a value owns exactly one slot, keyed by the
//! step it lives on and its field name. A field only ever writes its own
//! slot; validators read the whole table.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identifies the owner of a registry slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub step: String,
    pub field: String,
}

impl SlotKey {
    pub fn new(step: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            field: field.into(),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.step, self.field)
    }
}

/// Claimed canonical values for fields requiring global exclusivity
#[derive(Debug, Clone, Default)]
pub struct UniquenessRegistry {
    slots: BTreeMap<SlotKey, String>,
}

impl UniquenessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` as claimed by `(step, field)`.
    ///
    /// An empty value releases the slot instead, so a cleared field never
    /// leaves a claim behind.
    pub fn claim(&mut self, step: &str, field: &str, value: &str) {
        let key = SlotKey::new(step, field);
        if value.is_empty() {
            if self.slots.remove(&key).is_some() {
                tracing::debug!(slot = %key, "released domain claim");
            }
            return;
        }
        tracing::debug!(slot = %key, value, "claimed domain");
        self.slots.insert(key, value.to_string());
    }

    /// Drop the claim owned by `(step, field)`, if any
    pub fn release(&mut self, step: &str, field: &str) -> Option<String> {
        let released = self.slots.remove(&SlotKey::new(step, field));
        if released.is_some() {
            tracing::debug!(step, field, "released domain claim");
        }
        released
    }

    /// Drop every claim owned by fields of `step` (step teardown)
    pub fn release_step(&mut self, step: &str) -> usize {
        let before = self.slots.len();
        self.slots.retain(|key, _| key.step != step);
        let released = before - self.slots.len();
        if released > 0 {
            tracing::debug!(step, released, "released step claims");
        }
        released
    }

    /// Value currently claimed by `(step, field)`
    pub fn get(&self, step: &str, field: &str) -> Option<&str> {
        self.slots
            .get(&SlotKey::new(step, field))
            .map(String::as_str)
    }

    /// Every claimed value except the one owned by `(step, field)`
    pub fn values_except(&self, step: &str, field: &str) -> BTreeSet<&str> {
        self.slots
            .iter()
            .filter(|(key, _)| !(key.step == step && key.field == field))
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// Find which slot claims `value`
    pub fn owner_of(&self, value: &str) -> Option<&SlotKey> {
        self.slots
            .iter()
            .find(|(_, claimed)| claimed.as_str() == value)
            .map(|(key, _)| key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SlotKey, &str)> {
        self.slots.iter().map(|(key, value)| (key, value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Forget every claim (session end)
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
