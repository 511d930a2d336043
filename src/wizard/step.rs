//! Wizard steps and their per-step state

use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::core::context::{FieldValue, StepContext};
use crate::core::datatype::Datatype;
use crate::core::project::ProjectContext;
use crate::core::registry::UniquenessRegistry;
use crate::schema::recipe::{Recipe, RecipeError};
use crate::schema::validator::ValidationScope;
use crate::wizard::field::{FieldChange, FieldForm};

/// Where a step sits in the flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Fixed first step: choose applications
    Picker,
    /// One per selected (or required) application
    Application,
    /// Fixed last step: review and install
    Summary,
}

/// Progress of a step's recipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepPhase {
    Loading,
    Failed(String),
    /// Terminal: no transition to valid exists while the application is selected
    Restricted(String),
    Ready,
}

/// Lifecycle status shown to the navigation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    NotVisited,
    Active,
    Valid,
    Invalid,
    /// Left while valid; data is cached
    Completed,
    Restricted,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::NotVisited => "not visited",
            StepStatus::Active => "active",
            StepStatus::Valid => "valid",
            StepStatus::Invalid => "invalid",
            StepStatus::Completed => "completed",
            StepStatus::Restricted => "restricted",
        };
        write!(f, "{}", s)
    }
}

/// One wizard page
#[derive(Debug, Clone)]
pub struct WizardStep {
    key: String,
    label: String,
    kind: StepKind,
    pub(crate) is_dependency: bool,
    pub(crate) dependency_of: BTreeSet<String>,
    phase: StepPhase,
    status: StepStatus,
    context: StepContext,
    forms: Vec<FieldForm>,
}

impl WizardStep {
    /// A fixed anchor step (picker or summary)
    pub fn anchor(key: &str, label: &str, kind: StepKind) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            kind,
            is_dependency: false,
            dependency_of: BTreeSet::new(),
            phase: StepPhase::Ready,
            status: StepStatus::NotVisited,
            context: StepContext::new(),
            forms: Vec::new(),
        }
    }

    /// A step materialized for an application; its recipe is not loaded yet
    pub fn application(key: &str, label: &str) -> Self {
        Self {
            kind: StepKind::Application,
            phase: StepPhase::Loading,
            ..Self::anchor(key, label, StepKind::Application)
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn is_dependency(&self) -> bool {
        self.is_dependency
    }

    pub fn dependency_of(&self) -> &BTreeSet<String> {
        &self.dependency_of
    }

    pub fn phase(&self) -> &StepPhase {
        &self.phase
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub fn context(&self) -> &StepContext {
        &self.context
    }

    pub fn forms(&self) -> &[FieldForm] {
        &self.forms
    }

    pub fn form(&self, name: &str) -> Option<&FieldForm> {
        self.forms.iter().find(|f| f.name() == name)
    }

    pub fn is_ready(&self) -> bool {
        self.phase == StepPhase::Ready
    }

    pub fn is_restricted(&self) -> bool {
        matches!(self.phase, StepPhase::Restricted(_))
    }

    /// Whether the step's own data lets the user move on.
    ///
    /// Anchor steps are judged by the controller, which knows the selection
    /// and the other steps.
    pub fn is_valid(&self) -> bool {
        self.phase == StepPhase::Ready && self.context.is_valid()
    }

    /// Display value of a field, recomputed from its canonical value
    pub fn local_value(&self, field: &str) -> Option<String> {
        self.form(field).map(|form| form.local_value(&self.context))
    }

    pub(crate) fn enter(&mut self) {
        if !self.is_restricted() {
            self.status = StepStatus::Active;
        }
    }

    pub(crate) fn leave(&mut self, valid: bool) {
        if self.is_restricted() {
            return;
        }
        self.status = if valid {
            StepStatus::Completed
        } else {
            StepStatus::Invalid
        };
    }

    pub(crate) fn set_status(&mut self, status: StepStatus) {
        if !self.is_restricted() {
            self.status = status;
        }
    }

    pub(crate) fn set_loading(&mut self) {
        self.phase = StepPhase::Loading;
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.phase = StepPhase::Failed(message);
    }

    pub(crate) fn restrict(&mut self, reason: String, registry: &mut UniquenessRegistry) {
        registry.release_step(&self.key);
        self.context = StepContext::new();
        self.forms.clear();
        self.phase = StepPhase::Restricted(reason);
        self.status = StepStatus::Restricted;
    }

    /// Build the form from a recipe and publish every field's initial value
    pub(crate) fn load(
        &mut self,
        recipe: &Recipe,
        project: &ProjectContext,
        registry: &mut UniquenessRegistry,
    ) -> Result<(), RecipeError> {
        recipe.check()?;
        let forms = recipe
            .fields
            .iter()
            .cloned()
            .map(|config| FieldForm::new(config, project))
            .collect::<Result<Vec<_>, _>>()?;

        // Fields dropped by a reloaded recipe must not keep their claims
        let names: HashSet<&str> = forms.iter().map(|f| f.name()).collect();
        let stale: Vec<String> = self
            .context
            .iter()
            .map(|(name, _)| name.to_string())
            .filter(|name| !names.contains(name.as_str()))
            .collect();
        for name in stale {
            self.context.remove(&name);
            registry.release(&self.key, &name);
        }

        self.forms = forms;
        if let Some(label) = &recipe.label {
            self.label = label.clone();
        }

        for index in 0..self.forms.len() {
            let local = self.forms[index].initial_local(project, &self.key);
            self.edit_at(index, &local, &project.domains, registry);
        }

        self.phase = StepPhase::Ready;
        Ok(())
    }

    /// Apply an edit to a field; `None` when the step has no such field
    pub(crate) fn edit(
        &mut self,
        field: &str,
        local: &str,
        registered_domains: &BTreeSet<String>,
        registry: &mut UniquenessRegistry,
    ) -> Option<FieldChange> {
        let index = self.forms.iter().position(|f| f.name() == field)?;
        let change = self.edit_at(index, local, registered_domains, registry);
        self.status = if self.context.is_valid() {
            StepStatus::Valid
        } else {
            StepStatus::Invalid
        };
        Some(change)
    }

    fn edit_at(
        &mut self,
        index: usize,
        local: &str,
        registered_domains: &BTreeSet<String>,
        registry: &mut UniquenessRegistry,
    ) -> FieldChange {
        let change = {
            let name = self.forms[index].name().to_string();
            let scope = ValidationScope {
                step: &self.key,
                field: &name,
                siblings: &self.context,
                registry: &*registry,
                registered_domains,
            };
            self.forms[index].edit(local, &scope)
        };
        self.on_change(&change, registry);
        change
    }

    /// Sync a field notification into the step context and the registry
    fn on_change(&mut self, change: &FieldChange, registry: &mut UniquenessRegistry) {
        let previous = self.context.get(&change.name).map(|f| f.datatype);

        self.context.set(
            &change.name,
            FieldValue {
                value: change.canonical.clone(),
                valid: change.valid,
                datatype: change.datatype,
            },
        );

        if change.datatype == Datatype::Domain {
            if change.valid {
                registry.claim(&self.key, &change.name, &change.canonical);
            } else {
                registry.release(&self.key, &change.name);
            }
        } else if previous == Some(Datatype::Domain) {
            registry.release(&self.key, &change.name);
        }
    }

    /// Drop all data and claims (deselection or session end)
    pub(crate) fn teardown(&mut self, registry: &mut UniquenessRegistry) {
        registry.release_step(&self.key);
        self.context = StepContext::new();
        self.forms.clear();
        self.phase = StepPhase::Loading;
        self.status = StepStatus::NotVisited;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provider::CloudProvider;
    use crate::schema::recipe::FieldConfig;

    fn recipe() -> Recipe {
        Recipe::new("airflow", CloudProvider::Aws)
            .with_field(FieldConfig::new("domain", Datatype::Domain).with_default("airflow"))
            .with_field(
                FieldConfig::new("name", Datatype::String).with_pattern("^[a-z]+$", "Lowercase only."),
            )
    }

    #[test]
    fn test_load_publishes_initial_values() {
        let project = ProjectContext::default();
        let mut registry = UniquenessRegistry::new();
        let mut step = WizardStep::application("airflow", "airflow");

        step.load(&recipe(), &project, &mut registry).unwrap();

        assert!(step.is_ready());
        assert_eq!(step.context().len(), 2);
        assert_eq!(step.context().get("domain").unwrap().value, "airflow");
        assert_eq!(registry.get("airflow", "domain"), Some("airflow"));
        // Empty required name fails its pattern
        assert!(!step.is_valid());
    }

    #[test]
    fn test_edit_toggles_step_validity() {
        let project = ProjectContext::default();
        let mut registry = UniquenessRegistry::new();
        let mut step = WizardStep::application("airflow", "airflow");
        step.load(&recipe(), &project, &mut registry).unwrap();
        let none = BTreeSet::new();

        step.edit("name", "flows", &none, &mut registry).unwrap();
        assert!(step.is_valid());
        assert_eq!(step.status(), StepStatus::Valid);

        let change = step.edit("name", "Flows", &none, &mut registry).unwrap();
        assert!(!change.valid);
        assert_eq!(change.message, "Lowercase only.");
        assert!(!step.is_valid());
        assert_eq!(step.status(), StepStatus::Invalid);
        assert_eq!(step.form("name").unwrap().message(), "Lowercase only.");

        assert!(step.edit("missing", "x", &none, &mut registry).is_none());
    }

    #[test]
    fn test_clearing_domain_releases_claim() {
        let project = ProjectContext::default();
        let mut registry = UniquenessRegistry::new();
        let mut step = WizardStep::application("airflow", "airflow");
        step.load(&recipe(), &project, &mut registry).unwrap();

        step.edit("domain", "", &BTreeSet::new(), &mut registry).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reload_with_changed_datatype_releases_claim() {
        let project = ProjectContext::default();
        let mut registry = UniquenessRegistry::new();
        let mut step = WizardStep::application("airflow", "airflow");
        step.load(&recipe(), &project, &mut registry).unwrap();
        assert_eq!(registry.len(), 1);

        let changed = Recipe::new("airflow", CloudProvider::Aws)
            .with_field(FieldConfig::new("domain", Datatype::String).with_default("airflow"));
        step.load(&changed, &project, &mut registry).unwrap();
        assert!(registry.is_empty());
        assert_eq!(step.context().len(), 1);
    }

    #[test]
    fn test_teardown_and_restrict_release_claims() {
        let project = ProjectContext::default();
        let mut registry = UniquenessRegistry::new();
        let mut step = WizardStep::application("airflow", "airflow");
        step.load(&recipe(), &project, &mut registry).unwrap();

        step.teardown(&mut registry);
        assert!(registry.is_empty());
        assert!(step.context().is_empty());

        step.load(&recipe(), &project, &mut registry).unwrap();
        step.restrict("licence".to_string(), &mut registry);
        assert!(registry.is_empty());
        assert_eq!(step.status(), StepStatus::Restricted);
        step.enter();
        assert_eq!(step.status(), StepStatus::Restricted);
        assert!(!step.is_valid());
    }
}
