//! Project discovery, structure and the project context snapshot

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::provider::CloudProvider;

/// Name of the directory that marks a project root
pub const PROJECT_DIR: &str = ".appconf";

/// Represents an appconf project
#[derive(Debug)]
pub struct Project {
    /// Root directory of the project (parent of .appconf/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current = std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create a new project structure at the given path
    pub fn init(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if root.join(PROJECT_DIR).exists() {
            return Err(ProjectError::AlreadyExists(root));
        }
        Self::create_structure(root)
    }

    /// Force initialization even if .appconf/ exists
    pub fn init_force(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Self::create_structure(root)
    }

    fn create_structure(root: PathBuf) -> Result<Self, ProjectError> {
        let dir = root.join(PROJECT_DIR);
        for sub in ["recipes", "installs"] {
            std::fs::create_dir_all(dir.join(sub))
                .map_err(|e| ProjectError::IoError(e.to_string()))?;
        }

        std::fs::write(dir.join("config.yaml"), Self::default_config())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::write(dir.join("project.yaml"), Self::default_context())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        Ok(Self { root })
    }

    fn default_config() -> &'static str {
        r#"# appconf configuration
# Values here override the global user config; APPCONF_* environment
# variables override both.

# Provider to fetch recipes for (default: the provider in project.yaml)
# provider: aws

# Where recipes are read from (default: .appconf/recipes)
# recipes_dir: ""

# Where install manifests are written (default: .appconf/installs)
# install_dir: ""

# Output format for `appconf apply` (yaml, json)
# default_format: yaml
"#
    }

    fn default_context() -> &'static str {
        r#"# Project context shared by every wizard run
provider: aws

# Buckets are stored as "<bucket_prefix>-<cluster>-<name>"
bucket_prefix: ""
cluster: ""

network:
  # Domains are stored as "<name>.<subdomain>"
  subdomain: ""

# Domains and buckets already taken by installed applications
domains: []
buckets: []

# Per-application default field values (canonical form)
configuration: {}
"#
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .appconf configuration directory
    pub fn appconf_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    /// Default directory holding `<app>/<provider>.yaml` recipes
    pub fn recipes_dir(&self) -> PathBuf {
        self.appconf_dir().join("recipes")
    }

    /// Default directory install manifests are written to
    pub fn installs_dir(&self) -> PathBuf {
        self.appconf_dir().join("installs")
    }

    /// Path of the project context file
    pub fn context_path(&self) -> PathBuf {
        self.appconf_dir().join("project.yaml")
    }

    /// Load the project context snapshot
    pub fn context(&self) -> Result<ProjectContext, ProjectError> {
        ProjectContext::load(&self.context_path())
    }
}

/// Network settings of the target cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Network {
    pub subdomain: Option<String>,
}

/// Snapshot of project metadata read once per wizard session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectContext {
    pub provider: CloudProvider,
    pub bucket_prefix: Option<String>,
    pub cluster: Option<String>,
    pub network: Network,

    /// Domains registered by applications installed outside this run
    pub domains: BTreeSet<String>,

    /// Buckets registered by applications installed outside this run
    pub buckets: BTreeSet<String>,

    /// Application key -> field name -> canonical default
    pub configuration: BTreeMap<String, BTreeMap<String, Value>>,
}

impl ProjectContext {
    /// Load a context snapshot from a YAML file
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        if !path.exists() {
            return Err(ProjectError::ContextMissing(path.to_path_buf()));
        }
        let contents =
            std::fs::read_to_string(path).map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::from_yaml(&contents).map_err(|e| ProjectError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(contents)
    }

    pub fn bucket_prefix(&self) -> Option<&str> {
        non_empty(self.bucket_prefix.as_deref())
    }

    pub fn cluster(&self) -> Option<&str> {
        non_empty(self.cluster.as_deref())
    }

    pub fn subdomain(&self) -> Option<&str> {
        non_empty(self.network.subdomain.as_deref())
    }

    /// Default field values for one application (empty when none configured)
    pub fn defaults(&self, application: &str) -> BTreeMap<String, Value> {
        self.configuration
            .get(application)
            .cloned()
            .unwrap_or_default()
    }

    /// A configured default as a canonical string, if it is a scalar
    pub fn default_value(&self, application: &str, field: &str) -> Option<String> {
        match self.configuration.get(application)?.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Errors that can occur during project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not an appconf project (searched from {searched_from:?}). Run 'appconf init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("appconf project already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("project context not found at {0:?}")]
    ContextMissing(PathBuf),

    #[error("failed to parse project context {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    IoError(String),
}
