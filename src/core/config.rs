//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::project::Project;
use crate::core::provider::CloudProvider;

/// appconf configuration with layered hierarchy
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider to fetch recipes for, overriding the project context
    pub provider: Option<CloudProvider>,

    /// Directory holding `<app>/<provider>.yaml` recipes
    pub recipes_dir: Option<PathBuf>,

    /// Directory install manifests are written to
    pub install_dir: Option<PathBuf>,

    /// Default output format
    pub default_format: Option<String>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Self {
        Self::load_for(Project::discover().ok().as_ref())
    }

    /// Load configuration for a known project (or none)
    pub fn load_for(project: Option<&Project>) -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Global user config (~/.config/appconf/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read_layer(&global_path) {
                config.merge(global);
            }
        }

        // 3. Project config (.appconf/config.yaml)
        if let Some(project) = project {
            if let Some(project_config) = Self::read_layer(&project.appconf_dir().join("config.yaml")) {
                config.merge(project_config);
            }
        }

        // 4. Environment variables
        config.merge(Self::from_env());

        config
    }

    fn read_layer(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable config");
                return None;
            }
        };
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping malformed config");
                None
            }
        }
    }

    fn from_env() -> Config {
        let mut config = Config::default();
        if let Ok(provider) = std::env::var("APPCONF_PROVIDER") {
            match provider.parse() {
                Ok(p) => config.provider = Some(p),
                Err(e) => tracing::warn!(error = %e, "ignoring APPCONF_PROVIDER"),
            }
        }
        if let Ok(dir) = std::env::var("APPCONF_RECIPES") {
            config.recipes_dir = Some(PathBuf::from(dir));
        }
        if let Ok(format) = std::env::var("APPCONF_FORMAT") {
            config.default_format = Some(format);
        }
        config
    }

    /// Get the path to the global config file
    pub fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "appconf")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.provider.is_some() {
            self.provider = other.provider;
        }
        if other.recipes_dir.is_some() {
            self.recipes_dir = other.recipes_dir;
        }
        if other.install_dir.is_some() {
            self.install_dir = other.install_dir;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
    }

    /// Recipe directory, falling back to the project's own
    pub fn recipes_dir(&self, project: &Project) -> PathBuf {
        self.recipes_dir
            .clone()
            .map(|dir| Self::resolve(project, dir))
            .unwrap_or_else(|| project.recipes_dir())
    }

    /// Install manifest directory, falling back to the project's own
    pub fn install_dir(&self, project: &Project) -> PathBuf {
        self.install_dir
            .clone()
            .map(|dir| Self::resolve(project, dir))
            .unwrap_or_else(|| project.installs_dir())
    }

    fn resolve(project: &Project, dir: PathBuf) -> PathBuf {
        if dir.is_absolute() {
            dir
        } else {
            project.root().join(dir)
        }
    }
}
