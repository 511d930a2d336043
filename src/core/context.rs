//! Per-step field values

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::datatype::Datatype;

/// Current state of one field, always in canonical form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub value: String,
    pub valid: bool,
    #[serde(rename = "type")]
    pub datatype: Datatype,
}

/// Field name -> value for a single step. Owned by that step alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepContext {
    fields: BTreeMap<String, FieldValue>,
}

impl StepContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field's value
    pub fn set(&mut self, name: &str, value: FieldValue) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    /// A step is valid iff every field in it is valid
    pub fn is_valid(&self) -> bool {
        self.fields.values().all(|field| field.valid)
    }

    /// Names of fields currently failing validation
    pub fn invalid_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, field)| !field.valid)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Values of every field of `datatype`, excluding `except`
    pub fn values_of<'a>(
        &'a self,
        datatype: Datatype,
        except: Option<&'a str>,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(name, field)| {
                field.datatype == datatype && Some(name.as_str()) != except
            })
            .map(|(_, field)| field.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
