//! A single form field: its recipe entry, modifier and validator

use crate::core::context::StepContext;
use crate::core::datatype::Datatype;
use crate::core::project::ProjectContext;
use crate::schema::modifier::ValueModifier;
use crate::schema::recipe::{FieldConfig, RecipeError};
use crate::schema::validator::{binding, FieldValidator, ValidationScope};

/// Notification a field publishes after every edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub name: String,
    pub canonical: String,
    pub valid: bool,
    pub datatype: Datatype,
    pub message: String,
}

/// Form state of one field. Local values never leave this type.
#[derive(Debug, Clone)]
pub struct FieldForm {
    config: FieldConfig,
    modifier: ValueModifier,
    validator: FieldValidator,
    message: String,
}

impl FieldForm {
    /// Resolve the datatype binding once for this field
    pub fn new(config: FieldConfig, project: &ProjectContext) -> Result<Self, RecipeError> {
        let binding = binding(config.datatype);
        let modifier = ValueModifier::resolve(binding.modifier, project);
        let validator = FieldValidator::build(&config)?;
        Ok(Self {
            config,
            modifier,
            validator,
            message: String::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn datatype(&self) -> Datatype {
        self.config.datatype
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    pub fn modifier(&self) -> &ValueModifier {
        &self.modifier
    }

    /// Message from the last validation, empty when valid
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Starting local value: the project's stored default, else the recipe default
    pub fn initial_local(&self, project: &ProjectContext, application: &str) -> String {
        if let Some(stored) = project.default_value(application, self.name()) {
            return self.modifier.trim(&stored);
        }
        self.config.default.clone().unwrap_or_default()
    }

    /// Local value recomputed from the step's canonical value
    pub fn local_value(&self, context: &StepContext) -> String {
        context
            .get(self.name())
            .map(|field| self.modifier.trim(&field.value))
            .unwrap_or_default()
    }

    /// Handle a user edit of the local value
    pub fn edit(&mut self, local: &str, scope: &ValidationScope<'_>) -> FieldChange {
        let canonical = self.modifier.apply(local);
        let result = self.validator.validate(&canonical, scope);
        self.message = result.message.clone();

        FieldChange {
            name: self.config.name.clone(),
            canonical,
            valid: result.valid,
            datatype: self.config.datatype,
            message: result.message,
        }
    }
}
