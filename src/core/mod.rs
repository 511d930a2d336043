//! Core module - fundamental types, project metadata and configuration

pub mod config;
pub mod context;
pub mod datatype;
pub mod project;
pub mod provider;
pub mod registry;

pub use config::Config;
pub use context::{FieldValue, StepContext};
pub use datatype::{Datatype, DatatypeParseError};
pub use project::{Network, Project, ProjectContext, ProjectError};
pub use provider::{CloudProvider, ProviderParseError};
pub use registry::{SlotKey, UniquenessRegistry};
