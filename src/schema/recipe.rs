//! Recipes: the per-application field schemas a wizard step is built from

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::core::datatype::Datatype;
use crate::core::provider::CloudProvider;

/// One configurable field of an application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,

    #[serde(alias = "type")]
    pub datatype: Datatype,

    /// Initial value in local (display) form
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_message: Option<String>,

    #[serde(default)]
    pub optional: bool,
}

impl FieldConfig {
    pub fn new(name: impl Into<String>, datatype: Datatype) -> Self {
        Self {
            name: name.into(),
            datatype,
            default: None,
            placeholder: None,
            documentation: None,
            validation_pattern: None,
            validation_message: None,
            optional: false,
        }
    }

    pub fn with_pattern(mut self, pattern: &str, message: &str) -> Self {
        self.validation_pattern = Some(pattern.to_string());
        self.validation_message = Some(message.to_string());
        self
    }

    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Accept `default: 3` and `default: true` as well as strings
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a scalar default, found {}",
            other
        ))),
    }
}

/// Schema of configurable fields for one application + provider pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// Application key; filled from the recipe's location when omitted
    #[serde(default)]
    pub application: String,

    #[serde(default)]
    pub provider: CloudProvider,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Applications that must be installed alongside this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,

    /// Restricted applications cannot be configured from the wizard
    #[serde(default)]
    pub restricted: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restriction_reason: Option<String>,

    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

impl Recipe {
    pub fn new(application: impl Into<String>, provider: CloudProvider) -> Self {
        Self {
            application: application.into(),
            provider,
            label: None,
            requires: Vec::new(),
            restricted: false,
            restriction_reason: None,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldConfig) -> Self {
        self.fields.push(field);
        self
    }

    pub fn requiring(mut self, application: &str) -> Self {
        self.requires.push(application.to_string());
        self
    }

    pub fn restricted(mut self, reason: &str) -> Self {
        self.restricted = true;
        self.restriction_reason = Some(reason.to_string());
        self
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.application)
    }

    /// Parse a recipe from YAML and check it
    pub fn from_yaml(contents: &str) -> Result<Self, RecipeError> {
        let recipe: Recipe = serde_yml::from_str(contents).map_err(|e| RecipeError::Parse {
            message: e.to_string(),
        })?;
        recipe.check()?;
        Ok(recipe)
    }

    /// Reject recipes a form could not be built from
    pub fn check(&self) -> Result<(), RecipeError> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(RecipeError::DuplicateField {
                    application: self.application.clone(),
                    field: field.name.clone(),
                });
            }
            if let Some(pattern) = &field.validation_pattern {
                Regex::new(pattern).map_err(|e| RecipeError::InvalidPattern {
                    field: field.name.clone(),
                    message: e.to_string(),
                })?;
            }
        }
        Ok(())
    }

    /// Convert into the outcome a step consumes
    pub fn into_outcome(self) -> RecipeOutcome {
        if self.restricted {
            let reason = self
                .restriction_reason
                .clone()
                .unwrap_or_else(|| format!("{} cannot be installed from this wizard", self.label()));
            RecipeOutcome::Restricted { reason }
        } else {
            RecipeOutcome::Fields(self)
        }
    }
}

/// What a recipe lookup produced
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeOutcome {
    Fields(Recipe),
    Restricted { reason: String },
    NotFound,
}

/// Errors raised while reading or checking recipes
#[derive(Debug, Clone, Error)]
pub enum RecipeError {
    #[error("failed to parse recipe: {message}")]
    Parse { message: String },

    #[error("recipe for {application} declares field '{field}' more than once")]
    DuplicateField { application: String, field: String },

    #[error("field '{field}' has an invalid validation pattern: {message}")]
    InvalidPattern { field: String, message: String },

    #[error("recipe fetch failed: {0}")]
    Fetch(String),

    #[error("IO error: {0}")]
    IoError(String),
}
