//! Shared helper functions for CLI commands
//!
//! Project discovery, recipe source selection and structured output used
//! by more than one command.

use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::sync::Arc;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::config::Config;
use crate::core::project::{Project, ProjectContext};
use crate::schema::provider::{DirectoryRecipeProvider, RecipeProvider, StaticRecipeProvider};
use crate::schema::recipe::FieldConfig;

/// Everything a wizard command needs from the environment
pub struct Workspace {
    pub project: Project,
    pub config: Config,
    pub context: ProjectContext,
}

impl Workspace {
    /// Discover the project, then load its config and context.
    /// A configured provider overrides the one in the project context.
    pub fn open(global: &GlobalOpts) -> Result<Self> {
        let project = match &global.project {
            Some(root) => Project::discover_from(root),
            None => Project::discover(),
        }
        .map_err(|e| miette::miette!("{}", e))?;

        let config = Config::load_for(Some(&project));
        let mut context = project.context().map_err(|e| miette::miette!("{}", e))?;
        if let Some(provider) = config.provider {
            context.provider = provider;
        }

        Ok(Self {
            project,
            config,
            context,
        })
    }

    /// Recipes from the configured directory, or the embedded set when it is missing
    pub fn recipes(&self) -> Arc<dyn RecipeProvider> {
        let dir = self.config.recipes_dir(&self.project);
        if dir.is_dir() {
            Arc::new(DirectoryRecipeProvider::new(dir))
        } else {
            tracing::debug!(path = %dir.display(), "recipe directory missing, using embedded recipes");
            Arc::new(StaticRecipeProvider::embedded())
        }
    }

    pub fn format(&self, global: &GlobalOpts) -> OutputFormat {
        OutputFormat::resolve(global.format, self.config.default_format.as_deref())
    }
}

/// Print a value to stdout in the requested format
pub fn print_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let text = match format {
        OutputFormat::Yaml => serde_yml::to_string(value).into_diagnostic()?,
        OutputFormat::Json => serde_json::to_string_pretty(value).into_diagnostic()?,
    };
    println!("{}", text.trim_end());
    Ok(())
}

/// Human label for a field: "admin_password" becomes "Admin Password"
pub fn field_title(field: &FieldConfig) -> String {
    field
        .name
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => c.to_uppercase().chain(chars).collect(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Truncate a string to max_len, adding "..." if truncated
///
/// Useful for table columns that need fixed-width output.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::datatype::Datatype;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hi", 2), "hi");
    }

    #[test]
    fn test_field_title() {
        let field = FieldConfig::new("admin_password", Datatype::Password);
        assert_eq!(field_title(&field), "Admin Password");
        let field = FieldConfig::new("domain", Datatype::Domain);
        assert_eq!(field_title(&field), "Domain");
    }
}
