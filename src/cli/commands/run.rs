//! `appconf run` command - Interactive configuration wizard

use console::style;
use dialoguer::{theme::ColorfulTheme, Input, MultiSelect, Password, Select};
use miette::{IntoDiagnostic, Result};
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{field_title, print_structured, Workspace};
use crate::cli::GlobalOpts;
use crate::core::datatype::Datatype;
use crate::schema::modifier::ValueModifier;
use crate::schema::provider::ApplicationInfo;
use crate::wizard::controller::WizardError;
use crate::wizard::field::FieldForm;
use crate::wizard::install::ManifestInstaller;
use crate::wizard::session::WizardSession;
use crate::wizard::step::{StepKind, StepPhase};

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Walk the wizard but do not write an install manifest
    #[arg(long)]
    pub dry_run: bool,
}

/// What the user chose to do after a step
enum Action {
    Next,
    Back,
    Stay,
    Quit,
}

pub async fn run(args: RunArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::open(global)?;
    let mut session = WizardSession::load_catalog(workspace.context.clone(), workspace.recipes())
        .await
        .map_err(|e| miette::miette!("{}", e))?;
    let theme = ColorfulTheme::default();

    if session.controller().catalog().next().is_none() {
        return Err(miette::miette!(
            "no applications available on {}",
            workspace.context.provider
        ));
    }

    println!();
    println!(
        "{} Configuring applications on {}",
        style("◆").cyan(),
        style(workspace.context.provider).bold()
    );
    println!("{}", style("─".repeat(50)).dim());

    loop {
        let kind = session.controller().current_step().kind();
        let action = match kind {
            StepKind::Picker => pick_applications(&mut session, &theme)?,
            StepKind::Application => configure_step(&mut session, &theme).await?,
            StepKind::Summary => {
                match review(&session, &theme, &workspace, global)? {
                    Action::Next => {
                        let installer = ManifestInstaller::new(workspace.config.install_dir(&workspace.project))
                            .dry_run(args.dry_run);
                        let receipt = session
                            .install(&installer)
                            .await
                            .map_err(|e| miette::miette!("{}", e))?;
                        match receipt.manifest {
                            Some(path) => println!(
                                "{} Installed {} application(s), manifest {}",
                                style("✓").green(),
                                receipt.applications.len(),
                                style(path.display()).cyan()
                            ),
                            None => println!("{} Dry run, nothing installed", style("!").yellow()),
                        }
                        return Ok(());
                    }
                    other => other,
                }
            }
        };

        match action {
            Action::Next => {
                if let Err(e) = session.next().await {
                    println!("{} {}", style("✗").red(), e);
                }
            }
            Action::Back => {
                if let Err(e) = session.back().await {
                    println!("{} {}", style("✗").red(), e);
                }
            }
            Action::Stay => {}
            Action::Quit => {
                println!("{} Wizard cancelled, nothing installed", style("!").yellow());
                return Ok(());
            }
        }
    }
}

fn pick_applications(session: &mut WizardSession, theme: &ColorfulTheme) -> Result<Action> {
    let catalog: Vec<ApplicationInfo> = session.controller().catalog().cloned().collect();
    let items: Vec<String> = catalog.iter().map(catalog_item).collect();
    let checked: Vec<bool> = catalog
        .iter()
        .map(|app| session.controller().selected().contains(&app.key))
        .collect();

    println!();
    let picked = MultiSelect::with_theme(theme)
        .with_prompt("Applications (space to toggle)")
        .items(&items)
        .defaults(&checked)
        .interact()
        .into_diagnostic()?;

    let controller = session.controller_mut();
    for (index, app) in catalog.iter().enumerate() {
        let wanted = picked.contains(&index);
        let result = match (wanted, checked[index]) {
            (true, false) => controller.select(&app.key),
            (false, true) => controller.deselect(&app.key),
            _ => Ok(()),
        };
        if let Err(e) = result {
            println!("{} {}", style("!").yellow(), e);
        }
    }

    let required: Vec<String> = controller
        .application_steps()
        .filter(|step| step.is_dependency())
        .map(|step| step.key().to_string())
        .collect();
    if !required.is_empty() {
        println!(
            "  {} also configuring {}",
            style("+").dim(),
            style(required.join(", ")).dim()
        );
    }

    if controller.selected().is_empty() {
        println!("{} Select at least one application", style("✗").red());
        return Ok(Action::Stay);
    }
    Ok(Action::Next)
}

fn catalog_item(app: &ApplicationInfo) -> String {
    let mut item = app.label.clone();
    if !app.requires.is_empty() {
        item.push_str(&format!(" (requires {})", app.requires.join(", ")));
    }
    if app.restricted {
        item.push_str(" [restricted]");
    }
    item
}

async fn configure_step(session: &mut WizardSession, theme: &ColorfulTheme) -> Result<Action> {
    session.enter_current().await;

    let step = session.controller().current_step();
    let key = step.key().to_string();
    println!();
    println!("{} {}", style("◆").cyan(), style(step.label()).bold());
    if step.is_dependency() {
        let by: Vec<&str> = step.dependency_of().iter().map(String::as_str).collect();
        println!("  {}", style(format!("required by {}", by.join(", "))).dim());
    }

    match step.phase().clone() {
        StepPhase::Restricted(reason) => {
            println!("{} {}", style("✗").red(), reason);
            println!("  Go back and deselect it to continue.");
            return choose(theme, &["Back", "Quit"]).map(|i| match i {
                0 => Action::Back,
                _ => Action::Quit,
            });
        }
        StepPhase::Failed(message) => {
            println!("{} {}", style("✗").red(), message);
            return match choose(theme, &["Retry", "Back", "Quit"])? {
                0 => {
                    if let Err(e) = session.retry().await {
                        println!("{} {}", style("✗").red(), e);
                    }
                    Ok(Action::Stay)
                }
                1 => Ok(Action::Back),
                _ => Ok(Action::Quit),
            };
        }
        StepPhase::Loading => return Ok(Action::Stay),
        StepPhase::Ready => {}
    }

    let forms: Vec<FieldForm> = step.forms().to_vec();
    for form in &forms {
        prompt_field(session, theme, &key, form)?;
    }

    match choose(theme, &["Next", "Edit again", "Back", "Quit"])? {
        0 => Ok(Action::Next),
        1 => Ok(Action::Stay),
        2 => Ok(Action::Back),
        _ => Ok(Action::Quit),
    }
}

/// Prompt until the field validates
fn prompt_field(
    session: &mut WizardSession,
    theme: &ColorfulTheme,
    key: &str,
    form: &FieldForm,
) -> Result<()> {
    let config = form.config();
    let prompt = field_prompt(form);
    if let Some(doc) = &config.documentation {
        println!("  {}", style(doc).dim());
    }

    loop {
        let current = session
            .controller()
            .local_value(key, form.name())
            .unwrap_or_default();

        let local = match form.datatype() {
            Datatype::Password => Password::with_theme(theme)
                .with_prompt(&prompt)
                .allow_empty_password(config.optional || !current.is_empty())
                .interact()
                .into_diagnostic()
                .map(|entered| if entered.is_empty() { current.clone() } else { entered })?,
            Datatype::Bool => {
                let default = if current == "true" { 0 } else { 1 };
                let picked = Select::with_theme(theme)
                    .with_prompt(&prompt)
                    .items(&["Yes", "No"])
                    .default(default)
                    .interact()
                    .into_diagnostic()?;
                (picked == 0).to_string()
            }
            _ => {
                let mut input = Input::<String>::with_theme(theme)
                    .with_prompt(&prompt)
                    .allow_empty(true);
                if !current.is_empty() {
                    input = input.default(current.clone());
                }
                input.interact_text().into_diagnostic()?
            }
        };

        match session.controller_mut().edit(form.name(), &local) {
            Ok(change) if change.valid => return Ok(()),
            Ok(change) => println!("  {} {}", style("✗").red(), change.message),
            Err(WizardError::UnknownField { .. }) => return Ok(()),
            Err(e) => return Err(miette::miette!("{}", e)),
        }
    }
}

fn field_prompt(form: &FieldForm) -> String {
    let title = field_title(form.config());
    let affix = match form.modifier() {
        ValueModifier::Prefix(prefix) => format!(" {}", style(format!("{}…", prefix)).dim()),
        ValueModifier::Suffix(suffix) => format!(" {}", style(format!("…{}", suffix)).dim()),
        ValueModifier::Identity => String::new(),
    };
    let mut prompt = format!("{}{}", title, affix);
    if let Some(placeholder) = &form.config().placeholder {
        prompt.push_str(&format!(" {}", style(format!("e.g. {}", placeholder)).dim()));
    }
    if form.config().optional {
        prompt.push_str(&format!(" {}", style("(optional)").dim()));
    }
    prompt
}

fn review(
    session: &WizardSession,
    theme: &ColorfulTheme,
    workspace: &Workspace,
    global: &GlobalOpts,
) -> Result<Action> {
    let controller = session.controller();
    println!();
    println!("{} Review", style("◆").cyan());

    let mut builder = Builder::default();
    builder.push_record(["STEP", "STATUS", "VALID"]);
    for view in controller.step_views() {
        if view.kind != StepKind::Application {
            continue;
        }
        builder.push_record([
            view.label,
            view.status.to_string(),
            if view.valid { "yes" } else { "no" }.to_string(),
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));

    match controller.prepare_install() {
        Ok(aggregate) => {
            if !global.quiet {
                println!();
                print_structured(&aggregate, workspace.format(global))?;
            }
        }
        Err(e) => {
            println!("{} {}", style("✗").red(), e);
            return choose(theme, &["Back", "Quit"]).map(|i| match i {
                0 => Action::Back,
                _ => Action::Quit,
            });
        }
    }

    println!();
    match choose(theme, &["Install", "Back", "Quit"])? {
        0 => Ok(Action::Next),
        1 => Ok(Action::Back),
        _ => Ok(Action::Quit),
    }
}

fn choose(theme: &ColorfulTheme, items: &[&str]) -> Result<usize> {
    Select::with_theme(theme)
        .items(items)
        .default(0)
        .interact()
        .into_diagnostic()
}
