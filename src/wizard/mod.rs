//! Wizard module - steps, navigation, aggregation and install

pub mod aggregate;
pub mod controller;
pub mod field;
pub mod install;
pub mod session;
pub mod step;

pub use aggregate::{Aggregate, ApplicationConfig, ConfigurationAggregator};
pub use controller::{
    FetchApplied, FetchTicket, StepView, WizardController, WizardError, PICKER_KEY, SUMMARY_KEY,
};
pub use field::{FieldChange, FieldForm};
pub use install::{InstallError, InstallReceipt, InstallRequest, Installer, ManifestInstaller};
pub use session::{SessionError, WizardSession};
pub use step::{StepKind, StepPhase, StepStatus, WizardStep};
