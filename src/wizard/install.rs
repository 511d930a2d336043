//! Install invocation
//!
//! The wizard hands one [`InstallRequest`] to an [`Installer`]. The request
//! is made exactly once per commit; failures are reported, never retried.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use ulid::Ulid;

use crate::core::provider::CloudProvider;
use crate::wizard::aggregate::Aggregate;

/// Everything the install backend receives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallRequest {
    pub session: Ulid,
    pub created: DateTime<Utc>,
    pub provider: CloudProvider,
    pub aggregate: Aggregate,
}

impl InstallRequest {
    pub fn new(session: Ulid, provider: CloudProvider, aggregate: Aggregate) -> Self {
        Self {
            session,
            created: Utc::now(),
            provider,
            aggregate,
        }
    }
}

/// Result of a completed install
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReceipt {
    pub session: Ulid,
    /// Where the manifest went; `None` for a dry run
    pub manifest: Option<PathBuf>,
    pub applications: Vec<String>,
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("failed to serialize install request: {0}")]
    Serialize(String),

    #[error("failed to write manifest {path:?}: {message}")]
    Write { path: PathBuf, message: String },
}

#[async_trait]
pub trait Installer: Send + Sync {
    async fn install(&self, request: &InstallRequest) -> Result<InstallReceipt, InstallError>;
}

/// Writes each request as a YAML manifest named after its session
#[derive(Debug, Clone)]
pub struct ManifestInstaller {
    dir: PathBuf,
    dry_run: bool,
}

impl ManifestInstaller {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self, session: Ulid) -> PathBuf {
        self.dir.join(format!("{}.yaml", session))
    }
}

#[async_trait]
impl Installer for ManifestInstaller {
    async fn install(&self, request: &InstallRequest) -> Result<InstallReceipt, InstallError> {
        let yaml =
            serde_yml::to_string(request).map_err(|e| InstallError::Serialize(e.to_string()))?;
        let applications = request
            .aggregate
            .applications()
            .iter()
            .map(|app| app.key.clone())
            .collect();

        if self.dry_run {
            tracing::info!(session = %request.session, "dry run, manifest not written");
            return Ok(InstallReceipt {
                session: request.session,
                manifest: None,
                applications,
            });
        }

        let path = self.manifest_path(request.session);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| write_error(&self.dir, e))?;

        // Never leave a half-written manifest behind
        let partial = path.with_extension("yaml.partial");
        tokio::fs::write(&partial, yaml)
            .await
            .map_err(|e| write_error(&partial, e))?;
        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(write_error(&path, e));
        }

        tracing::info!(session = %request.session, path = %path.display(), "install manifest written");
        Ok(InstallReceipt {
            session: request.session,
            manifest: Some(path),
            applications,
        })
    }
}

fn write_error(path: &Path, e: std::io::Error) -> InstallError {
    InstallError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::{FieldValue, StepContext};
    use crate::core::datatype::Datatype;
    use crate::core::project::ProjectContext;
    use crate::wizard::aggregate::ConfigurationAggregator;
    use tempfile::tempdir;

    fn request() -> InstallRequest {
        let mut ctx = StepContext::new();
        ctx.set(
            "domain",
            FieldValue {
                value: "flows.acme.io".to_string(),
                valid: true,
                datatype: Datatype::Domain,
            },
        );
        let aggregate =
            ConfigurationAggregator::aggregate(&ProjectContext::default(), [("airflow", &ctx)]);
        InstallRequest::new(Ulid::new(), CloudProvider::Aws, aggregate)
    }

    #[tokio::test]
    async fn test_manifest_written_once() {
        let tmp = tempdir().unwrap();
        let installer = ManifestInstaller::new(tmp.path().join("installs"));
        let request = request();

        let receipt = installer.install(&request).await.unwrap();
        let path = receipt.manifest.unwrap();
        assert_eq!(path, installer.manifest_path(request.session));
        assert_eq!(receipt.applications, vec!["airflow".to_string()]);

        let written: InstallRequest =
            serde_yml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, request);

        let leftovers: Vec<_> = std::fs::read_dir(installer.dir()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let tmp = tempdir().unwrap();
        let installer = ManifestInstaller::new(tmp.path().join("installs")).dry_run(true);

        let receipt = installer.install(&request()).await.unwrap();
        assert!(receipt.manifest.is_none());
        assert!(!installer.dir().exists());
    }
}
