//! Drives a controller against a recipe provider and an installer

use std::sync::Arc;
use thiserror::Error;
use ulid::Ulid;

use crate::core::project::ProjectContext;
use crate::schema::provider::RecipeProvider;
use crate::schema::recipe::RecipeError;
use crate::wizard::controller::{FetchApplied, FetchTicket, WizardController, WizardError};
use crate::wizard::install::{InstallError, InstallReceipt, InstallRequest, Installer};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Wizard(#[from] WizardError),

    #[error("failed to load application catalog: {0}")]
    Catalog(#[from] RecipeError),

    #[error(transparent)]
    Install(#[from] InstallError),
}

/// One run of the wizard, from catalog to install
pub struct WizardSession {
    id: Ulid,
    controller: WizardController,
    recipes: Arc<dyn RecipeProvider>,
}

impl WizardSession {
    /// Start a session with the applications the provider offers
    pub async fn load_catalog(
        project: ProjectContext,
        recipes: Arc<dyn RecipeProvider>,
    ) -> Result<Self, SessionError> {
        let catalog = recipes.catalog(project.provider).await?;
        let id = Ulid::new();
        tracing::info!(session = %id, provider = %project.provider, applications = catalog.len(), "wizard session started");
        Ok(Self {
            id,
            controller: WizardController::new(project, catalog),
            recipes,
        })
    }

    pub fn id(&self) -> Ulid {
        self.id
    }

    pub fn controller(&self) -> &WizardController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut WizardController {
        &mut self.controller
    }

    /// Fetch the recipe behind a ticket and apply it through the stale guard
    pub async fn fulfil(&mut self, ticket: FetchTicket) -> FetchApplied {
        let provider = self.controller.project().provider;
        let result = self.recipes.fetch(&ticket.step, provider).await;
        self.controller.complete_fetch(&ticket, result)
    }

    /// Load the current step's recipe if it is still outstanding
    pub async fn enter_current(&mut self) -> Option<FetchApplied> {
        let ticket = self.controller.fetch_ticket()?;
        Some(self.fulfil(ticket).await)
    }

    pub async fn next(&mut self) -> Result<(), SessionError> {
        if let Some(ticket) = self.controller.next()? {
            self.fulfil(ticket).await;
        }
        Ok(())
    }

    pub async fn back(&mut self) -> Result<(), SessionError> {
        if let Some(ticket) = self.controller.back()? {
            self.fulfil(ticket).await;
        }
        Ok(())
    }

    pub async fn retry(&mut self) -> Result<(), SessionError> {
        let ticket = self.controller.retry_fetch()?;
        self.fulfil(ticket).await;
        Ok(())
    }

    /// The commit: aggregate, invoke the installer once, then end the session
    pub async fn install(&mut self, installer: &dyn Installer) -> Result<InstallReceipt, SessionError> {
        let aggregate = self.controller.prepare_install()?;
        let request = InstallRequest::new(self.id, self.controller.project().provider, aggregate);
        let receipt = installer.install(&request).await?;
        self.controller.reset();
        Ok(receipt)
    }
}
