//! Wizard navigation, step materialization and the stale response guard

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::core::project::ProjectContext;
use crate::core::registry::UniquenessRegistry;
use crate::schema::provider::ApplicationInfo;
use crate::schema::recipe::{RecipeError, RecipeOutcome};
use crate::wizard::aggregate::{Aggregate, ConfigurationAggregator};
use crate::wizard::field::FieldChange;
use crate::wizard::step::{StepKind, StepPhase, StepStatus, WizardStep};

/// Key of the fixed application picker step
pub const PICKER_KEY: &str = "applications";

/// Key of the fixed install summary step
pub const SUMMARY_KEY: &str = "summary";

/// Identifies one recipe request. A response is only applied while its
/// ticket still names the current step and navigation generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub step: String,
    pub generation: u64,
}

/// What happened to a fetch result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchApplied {
    Applied,
    /// The user moved on before the response arrived; it was discarded
    Stale,
}

/// What the navigation layer sees of a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepView {
    pub key: String,
    pub label: String,
    pub kind: StepKind,
    pub valid: bool,
    pub status: StepStatus,
    pub is_dependency: bool,
    pub dependency_of: BTreeSet<String>,
}

/// Errors raised by wizard operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("unknown application '{0}'")]
    UnknownApplication(String),

    #[error("applications can only be changed on the application picker")]
    NotOnPicker,

    #[error("application '{0}' is not selected")]
    NotSelected(String),

    #[error("'{application}' is required by {}", by.join(", "))]
    RequiredBy { application: String, by: Vec<String> },

    #[error("step '{step}' is not valid (invalid fields: {})", fields.join(", "))]
    StepInvalid { step: String, fields: Vec<String> },

    #[error("step '{step}' is not ready")]
    StepNotReady { step: String },

    #[error("step '{step}' cannot be completed: {reason}")]
    Restricted { step: String, reason: String },

    #[error("step '{step}' has no field '{field}'")]
    UnknownField { step: String, field: String },

    #[error("already at the first step")]
    AtStart,

    #[error("already at the last step")]
    AtEnd,

    #[error("install can only be triggered from the summary step")]
    NotAtSummary,
}

/// Owns the ordered step list, the current position and the session registry
#[derive(Debug, Clone)]
pub struct WizardController {
    project: ProjectContext,
    catalog: BTreeMap<String, ApplicationInfo>,
    selected: Vec<String>,
    steps: Vec<WizardStep>,
    current: usize,
    generation: u64,
    registry: UniquenessRegistry,
}

impl WizardController {
    pub fn new(project: ProjectContext, catalog: Vec<ApplicationInfo>) -> Self {
        let mut picker = WizardStep::anchor(PICKER_KEY, "Applications", StepKind::Picker);
        picker.enter();
        Self {
            project,
            catalog: catalog.into_iter().map(|app| (app.key.clone(), app)).collect(),
            selected: Vec::new(),
            steps: vec![
                picker,
                WizardStep::anchor(SUMMARY_KEY, "Install", StepKind::Summary),
            ],
            current: 0,
            generation: 0,
            registry: UniquenessRegistry::new(),
        }
    }

    pub fn project(&self) -> &ProjectContext {
        &self.project
    }

    pub fn catalog(&self) -> impl Iterator<Item = &ApplicationInfo> {
        self.catalog.values()
    }

    pub fn registry(&self) -> &UniquenessRegistry {
        &self.registry
    }

    /// Explicitly selected applications, in selection order
    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn steps(&self) -> &[WizardStep] {
        &self.steps
    }

    pub fn step(&self, key: &str) -> Option<&WizardStep> {
        self.steps.iter().find(|s| s.key() == key)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_step(&self) -> &WizardStep {
        &self.steps[self.current]
    }

    pub fn is_at_summary(&self) -> bool {
        self.current_step().kind() == StepKind::Summary
    }

    /// Application steps in flow order
    pub fn application_steps(&self) -> impl Iterator<Item = &WizardStep> {
        self.steps
            .iter()
            .filter(|s| s.kind() == StepKind::Application)
    }

    // ----------------------------------------------------------------------
    // Selection
    // ----------------------------------------------------------------------

    /// Select an application, materializing its step and those it requires
    pub fn select(&mut self, application: &str) -> Result<(), WizardError> {
        self.require_picker()?;
        if !self.catalog.contains_key(application) {
            return Err(WizardError::UnknownApplication(application.to_string()));
        }
        if self.selected.iter().any(|s| s == application) {
            return Ok(());
        }

        self.selected.push(application.to_string());
        match self.position(application) {
            Some(index) => self.steps[index].is_dependency = false,
            None => self.insert_step(application, false),
        }
        self.materialize_requirements(application);

        tracing::info!(application, "selected application");
        Ok(())
    }

    /// Deselect an application and tear down steps nothing requires any more
    pub fn deselect(&mut self, application: &str) -> Result<(), WizardError> {
        self.require_picker()?;
        let Some(selected_at) = self.selected.iter().position(|s| s == application) else {
            return match self.step(application) {
                Some(step) if step.kind() == StepKind::Application => Err(WizardError::RequiredBy {
                    application: application.to_string(),
                    by: step.dependency_of().iter().cloned().collect(),
                }),
                _ => Err(WizardError::NotSelected(application.to_string())),
            };
        };
        self.selected.remove(selected_at);

        self.prune_unreachable();

        tracing::info!(application, "deselected application");
        Ok(())
    }

    fn materialize_requirements(&mut self, application: &str) {
        let mut pending = vec![application.to_string()];
        while let Some(dependent) = pending.pop() {
            let requires = self
                .catalog
                .get(&dependent)
                .map(|app| app.requires.clone())
                .unwrap_or_default();

            for required in requires {
                if required == dependent {
                    continue;
                }
                match self.position(&required) {
                    Some(index) => {
                        self.steps[index].dependency_of.insert(dependent.clone());
                    }
                    None => {
                        tracing::debug!(application = %required, by = %dependent, "adding dependency step");
                        self.insert_step(&required, true);
                        if let Some(index) = self.position(&required) {
                            self.steps[index].dependency_of.insert(dependent.clone());
                        }
                        pending.push(required);
                    }
                }
            }
        }
    }

    /// Tear down every step no longer reachable from the selection through
    /// `requires`, then rebuild the dependency links of the steps that remain.
    /// Requirement loops are dropped together once nothing selected reaches them.
    fn prune_unreachable(&mut self) {
        let mut reachable: BTreeSet<String> = BTreeSet::new();
        let mut pending = self.selected.clone();
        while let Some(key) = pending.pop() {
            if !reachable.insert(key.clone()) {
                continue;
            }
            if let Some(app) = self.catalog.get(&key) {
                pending.extend(app.requires.iter().cloned());
            }
        }

        let mut index = 0;
        while index < self.steps.len() {
            let step = &self.steps[index];
            if step.kind() == StepKind::Application && !reachable.contains(step.key()) {
                let mut step = self.steps.remove(index);
                step.teardown(&mut self.registry);
                tracing::debug!(step = %step.key(), "tore down step");
            } else {
                index += 1;
            }
        }

        let catalog = &self.catalog;
        let selected = &self.selected;
        for step in self.steps.iter_mut() {
            if step.kind() != StepKind::Application {
                continue;
            }
            let key = step.key().to_string();
            step.dependency_of = reachable
                .iter()
                .filter(|dependent| **dependent != key)
                .filter(|dependent| {
                    catalog
                        .get(dependent.as_str())
                        .is_some_and(|app| app.requires.iter().any(|r| *r == key))
                })
                .cloned()
                .collect();
            step.is_dependency = !selected.iter().any(|s| *s == key);
        }
    }

    fn insert_step(&mut self, application: &str, is_dependency: bool) {
        let label = self
            .catalog
            .get(application)
            .map(|app| app.label.clone())
            .unwrap_or_else(|| application.to_string());
        let mut step = WizardStep::application(application, &label);
        step.is_dependency = is_dependency;
        let summary = self.steps.len() - 1;
        self.steps.insert(summary, step);
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.key() == key)
    }

    fn require_picker(&self) -> Result<(), WizardError> {
        if self.current_step().kind() == StepKind::Picker {
            Ok(())
        } else {
            Err(WizardError::NotOnPicker)
        }
    }

    // ----------------------------------------------------------------------
    // Validity
    // ----------------------------------------------------------------------

    /// Validity of the step at `index`
    pub fn step_valid(&self, index: usize) -> bool {
        let Some(step) = self.steps.get(index) else {
            return false;
        };
        match step.kind() {
            StepKind::Picker => !self.selected.is_empty(),
            StepKind::Application => step.is_valid(),
            StepKind::Summary => (0..index).all(|i| self.step_valid(i)),
        }
    }

    pub fn current_valid(&self) -> bool {
        self.step_valid(self.current)
    }

    pub fn step_status(&self, key: &str) -> Option<StepStatus> {
        self.step(key).map(|step| step.status())
    }

    pub fn step_views(&self) -> Vec<StepView> {
        self.steps
            .iter()
            .enumerate()
            .map(|(index, step)| StepView {
                key: step.key().to_string(),
                label: step.label().to_string(),
                kind: step.kind(),
                valid: self.step_valid(index),
                status: step.status(),
                is_dependency: step.is_dependency(),
                dependency_of: step.dependency_of().clone(),
            })
            .collect()
    }

    // ----------------------------------------------------------------------
    // Navigation
    // ----------------------------------------------------------------------

    /// Move forward. Blocked unless the current step is valid.
    pub fn next(&mut self) -> Result<Option<FetchTicket>, WizardError> {
        if self.current + 1 >= self.steps.len() {
            return Err(WizardError::AtEnd);
        }

        let step = self.current_step();
        if let StepPhase::Restricted(reason) = step.phase() {
            return Err(WizardError::Restricted {
                step: step.key().to_string(),
                reason: reason.clone(),
            });
        }
        if !self.current_valid() {
            return Err(WizardError::StepInvalid {
                step: step.key().to_string(),
                fields: step
                    .context()
                    .invalid_fields()
                    .into_iter()
                    .map(String::from)
                    .collect(),
            });
        }

        Ok(self.move_to(self.current + 1))
    }

    /// Move back. Always permitted; cached step data is left untouched.
    pub fn back(&mut self) -> Result<Option<FetchTicket>, WizardError> {
        if self.current == 0 {
            return Err(WizardError::AtStart);
        }
        Ok(self.move_to(self.current - 1))
    }

    fn move_to(&mut self, target: usize) -> Option<FetchTicket> {
        let valid = self.current_valid();
        self.steps[self.current].leave(valid);

        self.current = target;
        self.generation += 1;
        self.steps[self.current].enter();
        if self.current_step().kind() == StepKind::Summary && self.current_valid() {
            self.steps[self.current].set_status(StepStatus::Valid);
        }

        tracing::debug!(
            step = %self.current_step().key(),
            generation = self.generation,
            "entered step"
        );
        self.pending_fetch()
    }

    /// Ticket for the current step if its recipe still has to be fetched
    fn pending_fetch(&mut self) -> Option<FetchTicket> {
        let step = &mut self.steps[self.current];
        if step.kind() != StepKind::Application {
            return None;
        }
        if !matches!(step.phase(), StepPhase::Loading | StepPhase::Failed(_)) {
            return None;
        }
        step.set_loading();
        Some(FetchTicket {
            step: step.key().to_string(),
            generation: self.generation,
        })
    }

    /// Ticket for the current step while its fetch is outstanding
    pub fn fetch_ticket(&self) -> Option<FetchTicket> {
        let step = self.current_step();
        (step.kind() == StepKind::Application && *step.phase() == StepPhase::Loading).then(|| {
            FetchTicket {
                step: step.key().to_string(),
                generation: self.generation,
            }
        })
    }

    /// Re-issue the fetch for a step whose recipe failed to load
    pub fn retry_fetch(&mut self) -> Result<FetchTicket, WizardError> {
        let step = self.current_step();
        if !matches!(step.phase(), StepPhase::Failed(_)) {
            return Err(WizardError::StepNotReady {
                step: step.key().to_string(),
            });
        }
        self.generation += 1;
        self.pending_fetch().ok_or_else(|| WizardError::StepNotReady {
            step: self.current_step().key().to_string(),
        })
    }

    /// Apply a recipe response, unless the user has moved on since it was requested
    pub fn complete_fetch(
        &mut self,
        ticket: &FetchTicket,
        result: Result<RecipeOutcome, RecipeError>,
    ) -> FetchApplied {
        let active = self.current_step();
        if ticket.generation != self.generation
            || ticket.step != active.key()
            || *active.phase() != StepPhase::Loading
        {
            tracing::debug!(
                step = %ticket.step,
                generation = ticket.generation,
                current = self.generation,
                "discarding stale recipe response"
            );
            return FetchApplied::Stale;
        }

        let project = &self.project;
        let registry = &mut self.registry;
        let step = &mut self.steps[self.current];
        match result {
            Ok(RecipeOutcome::Fields(recipe)) => {
                if let Err(e) = step.load(&recipe, project, registry) {
                    tracing::warn!(step = %ticket.step, error = %e, "recipe rejected");
                    step.fail(e.to_string());
                }
            }
            Ok(RecipeOutcome::Restricted { reason }) => {
                tracing::info!(step = %ticket.step, %reason, "application is restricted");
                step.restrict(reason, registry);
            }
            Ok(RecipeOutcome::NotFound) => {
                step.fail(format!(
                    "no recipe for {} on {}",
                    ticket.step, project.provider
                ));
            }
            Err(e) => {
                tracing::warn!(step = %ticket.step, error = %e, "recipe fetch failed");
                step.fail(e.to_string());
            }
        }
        FetchApplied::Applied
    }

    // ----------------------------------------------------------------------
    // Editing
    // ----------------------------------------------------------------------

    /// Edit a field of the current step with a local (display) value
    pub fn edit(&mut self, field: &str, local: &str) -> Result<FieldChange, WizardError> {
        let step = &mut self.steps[self.current];
        if step.kind() != StepKind::Application || !step.is_ready() {
            return Err(WizardError::StepNotReady {
                step: step.key().to_string(),
            });
        }
        step.edit(field, local, &self.project.domains, &mut self.registry)
            .ok_or_else(|| WizardError::UnknownField {
                step: step.key().to_string(),
                field: field.to_string(),
            })
    }

    /// Display value of a field, recomputed from its canonical value
    pub fn local_value(&self, step: &str, field: &str) -> Option<String> {
        self.step(step)?.local_value(field)
    }

    /// Last validation message of a field
    pub fn field_message(&self, step: &str, field: &str) -> Option<&str> {
        self.step(step)?.form(field).map(|form| form.message())
    }

    // ----------------------------------------------------------------------
    // Commit
    // ----------------------------------------------------------------------

    /// The commit trigger: only from the summary with every prior step valid
    pub fn prepare_install(&self) -> Result<Aggregate, WizardError> {
        if !self.is_at_summary() {
            return Err(WizardError::NotAtSummary);
        }
        if let Some(index) = (0..self.current).find(|i| !self.step_valid(*i)) {
            let step = &self.steps[index];
            return Err(WizardError::StepInvalid {
                step: step.key().to_string(),
                fields: step
                    .context()
                    .invalid_fields()
                    .into_iter()
                    .map(String::from)
                    .collect(),
            });
        }

        Ok(ConfigurationAggregator::aggregate(
            &self.project,
            self.application_steps().map(|s| (s.key(), s.context())),
        ))
    }

    /// End the session: drop every application step and all claims
    pub fn reset(&mut self) {
        for step in self.steps.iter_mut() {
            step.teardown(&mut self.registry);
        }
        self.steps.retain(|s| s.kind() != StepKind::Application);
        self.registry.clear();
        self.selected.clear();
        self.current = 0;
        self.generation += 1;
        for step in self.steps.iter_mut() {
            *step = WizardStep::anchor(step.key(), step.label(), step.kind());
        }
        self.steps[0].enter();
        tracing::info!("wizard session reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::datatype::Datatype;
    use crate::core::provider::CloudProvider;
    use crate::schema::recipe::{FieldConfig, Recipe};
    use serde_json::json;

    fn app(key: &str, requires: &[&str]) -> ApplicationInfo {
        ApplicationInfo {
            key: key.to_string(),
            label: key.to_string(),
            requires: requires.iter().map(|s| s.to_string()).collect(),
            restricted: false,
        }
    }

    fn domain_recipe(app: &str) -> RecipeOutcome {
        RecipeOutcome::Fields(
            Recipe::new(app, CloudProvider::Aws)
                .with_field(FieldConfig::new("domain", Datatype::Domain).optional()),
        )
    }

    fn controller() -> WizardController {
        WizardController::new(
            ProjectContext::default(),
            vec![app("airflow", &["postgres"]), app("console", &[]), app("postgres", &[])],
        )
    }

    /// Advance from the current step and load `outcome` into the next one
    fn advance(wizard: &mut WizardController, outcome: RecipeOutcome) {
        let ticket = wizard.next().unwrap().expect("application step needs a fetch");
        assert_eq!(wizard.complete_fetch(&ticket, Ok(outcome)), FetchApplied::Applied);
    }

    fn keys(wizard: &WizardController) -> Vec<&str> {
        wizard.steps().iter().map(|s| s.key()).collect()
    }

    #[test]
    fn test_picker_requires_a_selection() {
        let mut wizard = controller();
        assert_eq!(keys(&wizard), vec![PICKER_KEY, SUMMARY_KEY]);
        assert!(matches!(wizard.next(), Err(WizardError::StepInvalid { .. })));

        wizard.select("console").unwrap();
        assert!(wizard.current_valid());
        assert_eq!(wizard.select("nope"), Err(WizardError::UnknownApplication("nope".into())));
    }

    #[test]
    fn test_selection_materializes_dependencies() {
        let mut wizard = controller();
        wizard.select("airflow").unwrap();

        assert_eq!(keys(&wizard), vec![PICKER_KEY, "airflow", "postgres", SUMMARY_KEY]);
        let postgres = wizard.step("postgres").unwrap();
        assert!(postgres.is_dependency());
        assert!(postgres.dependency_of().contains("airflow"));

        // A pure dependency cannot be deselected on its own
        assert!(matches!(
            wizard.deselect("postgres"),
            Err(WizardError::RequiredBy { .. })
        ));

        wizard.deselect("airflow").unwrap();
        assert_eq!(keys(&wizard), vec![PICKER_KEY, SUMMARY_KEY]);
    }

    #[test]
    fn test_explicit_selection_of_dependency_survives_dependent() {
        let mut wizard = controller();
        wizard.select("airflow").unwrap();
        wizard.select("postgres").unwrap();
        assert!(!wizard.step("postgres").unwrap().is_dependency());

        wizard.deselect("airflow").unwrap();
        assert_eq!(keys(&wizard), vec![PICKER_KEY, "postgres", SUMMARY_KEY]);

        wizard.select("airflow").unwrap();
        wizard.deselect("postgres").unwrap();
        let postgres = wizard.step("postgres").unwrap();
        assert!(postgres.is_dependency());
    }

    #[test]
    fn test_deselect_drops_requirement_loop() {
        let mut wizard = WizardController::new(
            ProjectContext::default(),
            vec![app("a", &["b"]), app("b", &["a"]), app("c", &[])],
        );
        wizard.select("a").unwrap();
        assert_eq!(keys(&wizard), vec![PICKER_KEY, "a", "b", SUMMARY_KEY]);
        assert!(wizard.step("a").unwrap().dependency_of().contains("b"));

        wizard.deselect("a").unwrap();
        assert_eq!(keys(&wizard), vec![PICKER_KEY, SUMMARY_KEY]);
        assert!(wizard.selected().is_empty());
        assert_eq!(wizard.deselect("b"), Err(WizardError::NotSelected("b".into())));

        wizard.select("c").unwrap();
        let apps: Vec<&str> = wizard.application_steps().map(|s| s.key()).collect();
        assert_eq!(apps, vec!["c"]);
    }

    #[test]
    fn test_deselect_keeps_loop_reached_from_selection() {
        let mut wizard = WizardController::new(
            ProjectContext::default(),
            vec![app("a", &["b"]), app("b", &["a"]), app("c", &["a"])],
        );
        wizard.select("c").unwrap();
        wizard.select("a").unwrap();
        wizard.deselect("a").unwrap();

        assert_eq!(keys(&wizard), vec![PICKER_KEY, "c", "a", "b", SUMMARY_KEY]);
        let a = wizard.step("a").unwrap();
        assert!(a.is_dependency());
        assert_eq!(
            a.dependency_of().iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["b", "c"]
        );

        wizard.deselect("c").unwrap();
        assert_eq!(keys(&wizard), vec![PICKER_KEY, SUMMARY_KEY]);
    }

    #[test]
    fn test_forward_blocked_until_valid_and_back_always_allowed() {
        let mut wizard = controller();
        wizard.select("console").unwrap();
        advance(
            &mut wizard,
            RecipeOutcome::Fields(Recipe::new("console", CloudProvider::Aws).with_field(
                FieldConfig::new("name", Datatype::String).with_pattern("^[a-z]+$", "Lowercase only."),
            )),
        );

        assert_eq!(wizard.current_step().status(), StepStatus::Active);
        let err = wizard.next().unwrap_err();
        assert_eq!(
            err,
            WizardError::StepInvalid {
                step: "console".into(),
                fields: vec!["name".into()]
            }
        );

        let change = wizard.edit("name", "ABC").unwrap();
        assert!(!change.valid);
        assert_eq!(wizard.current_step().status(), StepStatus::Invalid);

        wizard.edit("name", "abc").unwrap();
        assert_eq!(wizard.current_step().status(), StepStatus::Valid);
        assert!(wizard.next().unwrap().is_none());
        assert!(wizard.is_at_summary());
        assert_eq!(wizard.step_status("console"), Some(StepStatus::Completed));
        assert_eq!(wizard.step_status(SUMMARY_KEY), Some(StepStatus::Valid));

        assert!(wizard.back().unwrap().is_none());
        assert!(wizard.back().unwrap().is_none());
        assert_eq!(wizard.back(), Err(WizardError::AtStart));
    }

    #[test]
    fn test_domain_uniqueness_across_steps() {
        let mut wizard = controller();
        wizard.select("airflow").unwrap();
        wizard.select("console").unwrap();

        advance(&mut wizard, domain_recipe("airflow"));
        let change = wizard.edit("domain", "shared").unwrap();
        assert!(change.valid);

        advance(&mut wizard, domain_recipe("postgres"));
        advance(&mut wizard, domain_recipe("console"));
        let change = wizard.edit("domain", "shared").unwrap();
        assert!(!change.valid);
        assert_eq!(change.message, "Domain shared already used.");
        assert_eq!(wizard.field_message("console", "domain"), Some("Domain shared already used."));

        let airflow = wizard.step("airflow").unwrap();
        assert!(airflow.context().get("domain").unwrap().valid);
        assert!(airflow.is_valid());
    }

    #[test]
    fn test_cleared_domain_can_be_reused() {
        let mut wizard = controller();
        wizard.select("airflow").unwrap();
        wizard.select("console").unwrap();

        advance(&mut wizard, domain_recipe("airflow"));
        wizard.edit("domain", "shared").unwrap();
        wizard.edit("domain", "").unwrap();
        assert!(wizard.registry().is_empty());

        advance(&mut wizard, domain_recipe("postgres"));
        advance(&mut wizard, domain_recipe("console"));
        assert!(wizard.edit("domain", "shared").unwrap().valid);
    }

    #[test]
    fn test_deselect_releases_claims() {
        let mut wizard = controller();
        wizard.select("console").unwrap();
        advance(&mut wizard, domain_recipe("console"));
        wizard.edit("domain", "shared").unwrap();
        assert_eq!(wizard.registry().len(), 1);

        wizard.back().unwrap();
        wizard.deselect("console").unwrap();
        assert!(wizard.registry().is_empty());
    }

    #[test]
    fn test_back_then_forward_preserves_context() {
        let mut wizard = controller();
        wizard.select("console").unwrap();
        advance(&mut wizard, domain_recipe("console"));
        wizard.edit("domain", "ui").unwrap();
        let before = wizard.current_step().context().clone();

        wizard.back().unwrap();
        let ticket = wizard.next().unwrap();
        assert!(ticket.is_none(), "cached step must not be refetched");
        assert_eq!(wizard.current_step().context(), &before);
        assert_eq!(wizard.local_value("console", "domain").as_deref(), Some("ui"));
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let mut wizard = controller();
        wizard.select("console").unwrap();
        let ticket = wizard.next().unwrap().unwrap();
        assert_eq!(wizard.fetch_ticket(), Some(ticket.clone()));

        wizard.back().unwrap();
        assert_eq!(
            wizard.complete_fetch(&ticket, Ok(domain_recipe("console"))),
            FetchApplied::Stale
        );
        assert_eq!(*wizard.step("console").unwrap().phase(), StepPhase::Loading);

        // Returning issues a fresh ticket; the old one stays stale
        let fresh = wizard.next().unwrap().unwrap();
        assert_ne!(fresh, ticket);
        assert_eq!(
            wizard.complete_fetch(&ticket, Ok(domain_recipe("console"))),
            FetchApplied::Stale
        );
        assert_eq!(
            wizard.complete_fetch(&fresh, Ok(domain_recipe("console"))),
            FetchApplied::Applied
        );
        assert!(wizard.current_step().is_ready());
    }

    #[test]
    fn test_redelivered_response_keeps_edits() {
        let mut wizard = controller();
        wizard.select("console").unwrap();
        let ticket = wizard.next().unwrap().unwrap();
        assert_eq!(
            wizard.complete_fetch(&ticket, Ok(domain_recipe("console"))),
            FetchApplied::Applied
        );
        wizard.edit("domain", "edited").unwrap();
        assert_eq!(wizard.fetch_ticket(), None);

        assert_eq!(
            wizard.complete_fetch(&ticket, Ok(domain_recipe("console"))),
            FetchApplied::Stale
        );
        assert_eq!(wizard.local_value("console", "domain").as_deref(), Some("edited"));
        assert_eq!(wizard.registry().len(), 1);
    }

    #[test]
    fn test_pending_and_failed_fetch_block_navigation() {
        let mut wizard = controller();
        wizard.select("console").unwrap();
        let ticket = wizard.next().unwrap().unwrap();
        assert!(!wizard.current_valid());
        assert!(matches!(wizard.next(), Err(WizardError::StepInvalid { .. })));

        wizard.complete_fetch(&ticket, Err(RecipeError::Fetch("timeout".into())));
        assert!(matches!(wizard.current_step().phase(), StepPhase::Failed(_)));
        assert!(matches!(wizard.next(), Err(WizardError::StepInvalid { .. })));

        let retry = wizard.retry_fetch().unwrap();
        wizard.complete_fetch(&retry, Ok(domain_recipe("console")));
        assert!(wizard.current_valid());
    }

    #[test]
    fn test_restricted_step_is_terminal() {
        let mut wizard = controller();
        wizard.select("console").unwrap();
        advance(
            &mut wizard,
            RecipeOutcome::Restricted {
                reason: "licence required".into(),
            },
        );

        assert_eq!(wizard.current_step().status(), StepStatus::Restricted);
        assert_eq!(
            wizard.next(),
            Err(WizardError::Restricted {
                step: "console".into(),
                reason: "licence required".into()
            })
        );
        assert!(matches!(wizard.edit("domain", "x"), Err(WizardError::StepNotReady { .. })));
        assert!(wizard.retry_fetch().is_err());

        // Leaving and coming back does not refetch or clear the restriction
        wizard.back().unwrap();
        assert!(wizard.next().unwrap().is_none());
        assert_eq!(wizard.current_step().status(), StepStatus::Restricted);

        // Deselecting upstream is the only way out
        wizard.back().unwrap();
        wizard.deselect("console").unwrap();
        assert!(wizard.step("console").is_none());
    }

    #[test]
    fn test_prepare_install_merges_defaults() {
        let mut project = ProjectContext::default();
        project
            .configuration
            .entry("console".to_string())
            .or_default()
            .insert("key".to_string(), json!("v1"));
        let mut wizard = WizardController::new(project, vec![app("console", &[])]);
        wizard.select("console").unwrap();
        advance(
            &mut wizard,
            RecipeOutcome::Fields(
                Recipe::new("console", CloudProvider::Aws)
                    .with_field(FieldConfig::new("key", Datatype::String)),
            ),
        );
        assert_eq!(wizard.local_value("console", "key").as_deref(), Some("v1"));
        assert_eq!(wizard.prepare_install(), Err(WizardError::NotAtSummary));

        wizard.edit("key", "v2").unwrap();
        wizard.next().unwrap();
        let aggregate = wizard.prepare_install().unwrap();
        assert_eq!(
            aggregate.application("console").unwrap().context.get("key"),
            Some(&json!("v2"))
        );
    }

    #[test]
    fn test_reset_clears_session() {
        let mut wizard = controller();
        wizard.select("console").unwrap();
        advance(&mut wizard, domain_recipe("console"));
        wizard.edit("domain", "ui").unwrap();

        wizard.reset();
        assert_eq!(keys(&wizard), vec![PICKER_KEY, SUMMARY_KEY]);
        assert!(wizard.registry().is_empty());
        assert!(wizard.selected().is_empty());
        assert_eq!(wizard.current_index(), 0);
        assert_eq!(wizard.current_step().status(), StepStatus::Active);
    }
}
