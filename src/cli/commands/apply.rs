//! `appconf apply` command - Drive the wizard from an answers file
//!
//! The answers file names the applications to select and the local value
//! to enter for each field:
//!
//! ```yaml
//! applications: [airflow, console]
//! values:
//!   airflow:
//!     domain: flows
//!     workers: 4
//! ```
//!
//! Fields without an answer keep their initial value. The run stops at the
//! first step that cannot be completed and prints the field errors.

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cli::helpers::{print_structured, Workspace};
use crate::cli::GlobalOpts;
use crate::wizard::install::ManifestInstaller;
use crate::wizard::session::WizardSession;
use crate::wizard::step::{StepKind, StepPhase};

#[derive(clap::Args, Debug)]
pub struct ApplyArgs {
    /// Answers file (YAML)
    #[arg(long, short = 'a')]
    pub answers: PathBuf,

    /// Validate and print the aggregated configuration without installing
    #[arg(long)]
    pub dry_run: bool,
}

/// Parsed answers file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Answers {
    pub applications: Vec<String>,
    pub values: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Answers {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .map_err(|e| e.wrap_err(format!("cannot read answers file {}", path.display())))?;
        serde_yml::from_str(&contents)
            .into_diagnostic()
            .map_err(|e| e.wrap_err(format!("invalid answers file {}", path.display())))
    }

    /// Answers for one application as local strings
    pub fn for_application(&self, application: &str) -> Result<Vec<(String, String)>> {
        let Some(fields) = self.values.get(application) else {
            return Ok(Vec::new());
        };
        fields
            .iter()
            .map(|(field, value)| {
                let local = match value {
                    Value::Null => String::new(),
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => {
                        return Err(miette::miette!(
                            "answer for {}.{} must be a scalar",
                            application,
                            field
                        ))
                    }
                };
                Ok((field.clone(), local))
            })
            .collect()
    }
}

pub async fn run(args: ApplyArgs, global: &GlobalOpts) -> Result<()> {
    let answers = Answers::load(&args.answers)?;
    let workspace = Workspace::open(global)?;
    let mut session = WizardSession::load_catalog(workspace.context.clone(), workspace.recipes())
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    if answers.applications.is_empty() {
        return Err(miette::miette!("answers file selects no applications"));
    }
    for application in &answers.applications {
        session
            .controller_mut()
            .select(application)
            .map_err(|e| miette::miette!("{}", e))?;
    }
    for application in answers.values.keys() {
        if !answers.applications.contains(application) && session.controller().step(application).is_none() {
            tracing::warn!(application = %application, "ignoring answers for unselected application");
        }
    }

    while !session.controller().is_at_summary() {
        let step = session.controller().current_step();
        if step.kind() == StepKind::Application {
            let key = step.key().to_string();
            match step.phase() {
                StepPhase::Failed(message) => {
                    return Err(miette::miette!("cannot load recipe for '{}': {}", key, message));
                }
                StepPhase::Restricted(reason) => {
                    return Err(miette::miette!("'{}' cannot be installed: {}", key, reason));
                }
                StepPhase::Loading | StepPhase::Ready => {}
            }
            fill_step(&mut session, &key, &answers)?;
            if !global.quiet {
                eprintln!("{} {}", style("✓").green(), style(&key).bold());
            }
        }

        session.next().await.map_err(|e| miette::miette!("{}", e))?;
    }

    let aggregate = session
        .controller()
        .prepare_install()
        .map_err(|e| miette::miette!("{}", e))?;
    print_structured(&aggregate, workspace.format(global))?;

    if args.dry_run {
        if !global.quiet {
            eprintln!("{} Dry run, nothing installed", style("!").yellow());
        }
        return Ok(());
    }

    let installer = ManifestInstaller::new(workspace.config.install_dir(&workspace.project));
    let receipt = session
        .install(&installer)
        .await
        .map_err(|e| miette::miette!("{}", e))?;
    if !global.quiet {
        if let Some(path) = receipt.manifest {
            eprintln!(
                "{} Installed {} application(s), manifest {}",
                style("✓").green(),
                receipt.applications.len(),
                style(path.display()).cyan()
            );
        }
    }
    Ok(())
}

/// Enter every answer for the current step and report what stays invalid
fn fill_step(session: &mut WizardSession, key: &str, answers: &Answers) -> Result<()> {
    for (field, local) in answers.for_application(key)? {
        session
            .controller_mut()
            .edit(&field, &local)
            .map_err(|e| miette::miette!("{}", e))?;
    }

    let controller = session.controller();
    if controller.current_valid() {
        return Ok(());
    }

    let invalid = controller.current_step().context().invalid_fields();
    for field in &invalid {
        eprintln!(
            "  {} {}.{}: {}",
            style("✗").red(),
            key,
            field,
            controller.field_message(key, field).unwrap_or("Invalid value.")
        );
    }
    Err(miette::miette!(
        "{} invalid field(s) in '{}'",
        invalid.len(),
        key
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answers_scalars_become_local_strings() {
        let answers: Answers = serde_yml::from_str(
            "applications: [airflow]\nvalues:\n  airflow:\n    workers: 4\n    sso: true\n    domain: flows\n    banner: ~\n",
        )
        .unwrap();

        let values = answers.for_application("airflow").unwrap();
        assert_eq!(
            values,
            vec![
                ("banner".to_string(), String::new()),
                ("domain".to_string(), "flows".to_string()),
                ("sso".to_string(), "true".to_string()),
                ("workers".to_string(), "4".to_string()),
            ]
        );
        assert!(answers.for_application("console").unwrap().is_empty());
    }

    #[test]
    fn test_answers_reject_nested_values() {
        let answers: Answers =
            serde_yml::from_str("values:\n  airflow:\n    domain: [a, b]\n").unwrap();
        assert!(answers.for_application("airflow").is_err());
    }
}
