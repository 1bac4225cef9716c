//! Built-in transform modules.
//!
//! Module fragments resolve their `module` key against the registry built
//! by [`builtin_registry`]; adding a transform means implementing
//! [`crate::pipeline::ComposeModule`] and registering it here.

use std::sync::Arc;

use crate::pipeline::ModuleRegistry;

pub mod backend;
pub mod upstream_import;

pub use backend::BackendWiring;
pub use upstream_import::UpstreamImport;

/// Builds the registry of all compiled-in transforms.
#[must_use]
pub fn builtin_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register(Arc::new(BackendWiring));
    registry.register(Arc::new(UpstreamImport));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_transforms_are_registered() {
        let registry = builtin_registry();
        assert!(registry.get("backend-wiring").is_some());
        assert!(registry.get("upstream-import").is_some());
        assert!(registry.get("nonexistent").is_none());
    }
}
