//! Recipe providers
//!
//! A provider answers "which fields does application X expose on provider
//! Y". Lookups are asynchronous; the wizard decides whether a late answer is
//! still wanted.

use async_trait::async_trait;
use rust_embed::Embed;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::core::provider::CloudProvider;
use crate::schema::recipe::{Recipe, RecipeError, RecipeOutcome};

/// Sample recipes shipped with the binary and seeded by `appconf init`
#[derive(Embed)]
#[folder = "recipes/"]
struct EmbeddedRecipes;

/// An application as listed by the picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationInfo {
    pub key: String,
    pub label: String,
    pub requires: Vec<String>,
    pub restricted: bool,
}

impl From<&Recipe> for ApplicationInfo {
    fn from(recipe: &Recipe) -> Self {
        Self {
            key: recipe.application.clone(),
            label: recipe.label().to_string(),
            requires: recipe.requires.clone(),
            restricted: recipe.restricted,
        }
    }
}

#[async_trait]
pub trait RecipeProvider: Send + Sync {
    /// Fetch the recipe for one application
    async fn fetch(
        &self,
        application: &str,
        provider: CloudProvider,
    ) -> Result<RecipeOutcome, RecipeError>;

    /// List applications available on a provider, sorted by key
    async fn catalog(&self, provider: CloudProvider) -> Result<Vec<ApplicationInfo>, RecipeError>;
}

/// Reads `<root>/<application>/<provider>.yaml`
#[derive(Debug, Clone)]
pub struct DirectoryRecipeProvider {
    root: PathBuf,
}

impl DirectoryRecipeProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn recipe_path(&self, application: &str, provider: CloudProvider) -> PathBuf {
        self.root
            .join(application)
            .join(format!("{}.yaml", provider.as_str()))
    }

    fn parse(contents: &str, application: &str) -> Result<Recipe, RecipeError> {
        let mut recipe = Recipe::from_yaml(contents)?;
        if recipe.application.is_empty() {
            recipe.application = application.to_string();
        }
        Ok(recipe)
    }
}

#[async_trait]
impl RecipeProvider for DirectoryRecipeProvider {
    async fn fetch(
        &self,
        application: &str,
        provider: CloudProvider,
    ) -> Result<RecipeOutcome, RecipeError> {
        let path = self.recipe_path(application, provider);
        tracing::debug!(path = %path.display(), "reading recipe");

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(RecipeOutcome::NotFound)
            }
            Err(e) => return Err(RecipeError::IoError(e.to_string())),
        };

        Ok(Self::parse(&contents, application)?.into_outcome())
    }

    async fn catalog(&self, provider: CloudProvider) -> Result<Vec<ApplicationInfo>, RecipeError> {
        if !self.root.is_dir() {
            return Err(RecipeError::IoError(format!(
                "recipe directory {} does not exist",
                self.root.display()
            )));
        }

        let file_name = format!("{}.yaml", provider.as_str());
        let mut apps = Vec::new();

        for entry in WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && e.file_name().to_string_lossy() == file_name)
        {
            let Some(application) = entry
                .path()
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
            else {
                continue;
            };

            let parsed = std::fs::read_to_string(entry.path())
                .map_err(|e| RecipeError::IoError(e.to_string()))
                .and_then(|contents| Self::parse(&contents, &application));
            match parsed {
                Ok(recipe) => apps.push(ApplicationInfo::from(&recipe)),
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "skipping recipe")
                }
            }
        }

        apps.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(apps)
    }
}

/// In-memory recipes, keyed by application and provider
#[derive(Debug, Clone, Default)]
pub struct StaticRecipeProvider {
    entries: HashMap<(String, CloudProvider), Result<Recipe, RecipeError>>,
}

impl StaticRecipeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider holding the recipes embedded in the binary
    pub fn embedded() -> Self {
        let mut provider = Self::new();
        for (path, contents) in embedded_files() {
            let Some((application, _)) = path.split_once('/') else {
                continue;
            };
            match DirectoryRecipeProvider::parse(&contents, application) {
                Ok(recipe) => provider.insert(recipe),
                Err(e) => tracing::warn!(path = %path, error = %e, "skipping embedded recipe"),
            }
        }
        provider
    }

    pub fn insert(&mut self, recipe: Recipe) {
        self.entries
            .insert((recipe.application.clone(), recipe.provider), Ok(recipe));
    }

    pub fn with(mut self, recipe: Recipe) -> Self {
        self.insert(recipe);
        self
    }

    /// Make every fetch of `application` fail
    pub fn failing(mut self, application: &str, provider: CloudProvider, message: &str) -> Self {
        self.entries.insert(
            (application.to_string(), provider),
            Err(RecipeError::Fetch(message.to_string())),
        );
        self
    }
}

#[async_trait]
impl RecipeProvider for StaticRecipeProvider {
    async fn fetch(
        &self,
        application: &str,
        provider: CloudProvider,
    ) -> Result<RecipeOutcome, RecipeError> {
        match self.entries.get(&(application.to_string(), provider)) {
            Some(Ok(recipe)) => Ok(recipe.clone().into_outcome()),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(RecipeOutcome::NotFound),
        }
    }

    async fn catalog(&self, provider: CloudProvider) -> Result<Vec<ApplicationInfo>, RecipeError> {
        let mut apps: Vec<ApplicationInfo> = self
            .entries
            .iter()
            .filter(|((_, p), _)| *p == provider)
            .filter_map(|(_, entry)| entry.as_ref().ok())
            .map(ApplicationInfo::from)
            .collect();
        apps.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(apps)
    }
}

/// Relative path and contents of each embedded recipe
fn embedded_files() -> Vec<(String, String)> {
    EmbeddedRecipes::iter()
        .filter_map(|path| {
            let file = EmbeddedRecipes::get(&path)?;
            let contents = String::from_utf8(file.data.into_owned()).ok()?;
            Some((path.to_string(), contents))
        })
        .collect()
}

/// Write the embedded recipes into `dir`, keeping files that already exist
pub fn seed_recipes(dir: &Path) -> Result<usize, RecipeError> {
    let mut written = 0;
    for (path, contents) in embedded_files() {
        let target = dir.join(&path);
        if target.exists() {
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RecipeError::IoError(e.to_string()))?;
        }
        std::fs::write(&target, contents).map_err(|e| RecipeError::IoError(e.to_string()))?;
        written += 1;
    }
    Ok(written)
}
