//! Explicit, ordered registry of modules.
//!
//! Built once at startup and handed to the [`Runner`](crate::runner::Runner).
//! Registration order is execution order, which is what lets a later module
//! read the [`Facts`](crate::facts::Facts) an earlier one wrote.

use std::sync::Arc;

use crate::error::RegistryError;
use crate::module::Module;

#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn Module>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a module. A second module with an already registered name is
    /// rejected and the registry is left unchanged.
    pub fn register(&mut self, module: Arc<dyn Module>) -> Result<&mut Self, RegistryError> {
        if self.contains(module.name()) {
            return Err(RegistryError::DuplicateModule {
                name: module.name().to_string(),
            });
        }
        self.modules.push(module);
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m.name() == name)
    }

    /// Copy of the registered modules, in registration order.
    pub fn snapshot(&self) -> Vec<Arc<dyn Module>> {
        self.modules.clone()
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.names())
            .finish()
    }
}
