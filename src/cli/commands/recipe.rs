//! `appconf recipe` command - Inspect the recipes the wizard is built from

use clap::Subcommand;
use console::style;
use miette::Result;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{print_structured, truncate_str, Workspace};
use crate::cli::GlobalOpts;
use crate::schema::recipe::RecipeOutcome;

#[derive(Subcommand, Debug)]
pub enum RecipeCommands {
    /// List applications available on the project's provider
    List,

    /// Show the fields of one application's recipe
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Application key (airflow, console, etc.)
    pub application: String,
}

pub async fn run(cmd: RecipeCommands, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::open(global)?;
    match cmd {
        RecipeCommands::List => list(&workspace, global).await,
        RecipeCommands::Show(args) => show(&workspace, args, global).await,
    }
}

async fn list(workspace: &Workspace, global: &GlobalOpts) -> Result<()> {
    let provider = workspace.context.provider;
    let catalog = workspace
        .recipes()
        .catalog(provider)
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    if global.format.is_some() {
        return print_structured(&catalog, workspace.format(global));
    }

    if catalog.is_empty() {
        println!("No applications available on {}", style(provider).cyan());
        return Ok(());
    }

    let mut builder = Builder::default();
    builder.push_record(["APPLICATION", "LABEL", "REQUIRES", "RESTRICTED"]);
    for app in &catalog {
        builder.push_record([
            app.key.clone(),
            truncate_str(&app.label, 30),
            app.requires.join(", "),
            if app.restricted { "yes".to_string() } else { String::new() },
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));

    if !global.quiet {
        println!();
        println!(
            "{} application(s) on {}",
            style(catalog.len()).cyan(),
            style(provider).cyan()
        );
    }
    Ok(())
}

async fn show(workspace: &Workspace, args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let provider = workspace.context.provider;
    let outcome = workspace
        .recipes()
        .fetch(&args.application, provider)
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    let recipe = match outcome {
        RecipeOutcome::Fields(recipe) => recipe,
        RecipeOutcome::Restricted { reason } => {
            println!(
                "{} {} is restricted: {}",
                style("!").yellow(),
                style(&args.application).bold(),
                reason
            );
            return Ok(());
        }
        RecipeOutcome::NotFound => {
            return Err(miette::miette!(
                "no recipe for '{}' on {}",
                args.application,
                provider
            ));
        }
    };

    if global.format.is_some() {
        return print_structured(&recipe, workspace.format(global));
    }

    println!(
        "{} {} ({})",
        style("◆").cyan(),
        style(recipe.label()).bold(),
        provider
    );
    if !recipe.requires.is_empty() {
        println!("  requires: {}", recipe.requires.join(", "));
    }
    println!();

    let mut builder = Builder::default();
    builder.push_record(["FIELD", "TYPE", "DEFAULT", "REQUIRED", "PATTERN"]);
    for field in &recipe.fields {
        builder.push_record([
            field.name.clone(),
            field.datatype.to_string(),
            field.default.clone().unwrap_or_default(),
            if field.optional { "no" } else { "yes" }.to_string(),
            truncate_str(field.validation_pattern.as_deref().unwrap_or(""), 30),
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));
    Ok(())
}
