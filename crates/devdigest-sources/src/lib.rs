//! dev-digest data sources
//!
//! Concrete [`Module`](devdigest_core::Module) implementations for TeamCity
//! and Azure DevOps, plus the registry the CLI runs with.

pub mod azure;
pub mod error;
pub mod http;
pub mod teamcity;

use std::sync::Arc;

use devdigest_core::{ModuleRegistry, RegistryError};

pub use azure::{AzureBoardsModule, AzureReposModule};
pub use error::SourceError;
pub use teamcity::TeamCityModule;

/// The producers shipped with dev-digest, in execution order.
///
/// Boards runs before Repos because Repos matches branches against the
/// feature ids Boards leaves in the run's facts.
pub fn builtin_registry() -> Result<ModuleRegistry, RegistryError> {
    let mut registry = ModuleRegistry::new();
    registry
        .register(Arc::new(TeamCityModule))?
        .register(Arc::new(AzureBoardsModule))?
        .register(Arc::new(AzureReposModule))?;
    Ok(registry)
}
