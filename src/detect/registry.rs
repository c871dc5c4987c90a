use std::collections::HashMap;

use anyhow::{anyhow, Result};

use super::backend::InferenceBackend;

/// Registry of inference backends available at startup.
///
/// The pipeline owns exactly one backend for a session; the chosen backend is
/// moved out of the registry with `take` / `take_default`.
pub struct BackendRegistry {
    backends: HashMap<String, Box<dyn InferenceBackend>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: InferenceBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Box::new(backend));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// List registered backends, sorted by name.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove a backend by name.
    pub fn take(&mut self, name: &str) -> Result<Box<dyn InferenceBackend>> {
        let backend = self
            .backends
            .remove(name)
            .ok_or_else(|| anyhow!("backend '{}' not registered", name))?;
        if self.default_name.as_deref() == Some(name) {
            self.default_name = None;
        }
        Ok(backend)
    }

    /// Remove the default backend.
    pub fn take_default(&mut self) -> Result<Box<dyn InferenceBackend>> {
        let name = self
            .default_name
            .clone()
            .ok_or_else(|| anyhow!("no default backend registered"))?;
        self.take(&name)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::ScriptedBackend;

    #[test]
    fn first_registered_is_default() -> Result<()> {
        let mut registry = BackendRegistry::new();
        registry.register(ScriptedBackend::default());
        assert_eq!(registry.default_name(), Some("scripted"));
        assert_eq!(registry.list(), vec!["scripted".to_string()]);

        let backend = registry.take_default()?;
        assert_eq!(backend.name(), "scripted");
        assert!(registry.take_default().is_err());
        Ok(())
    }

    #[test]
    fn unknown_default_is_rejected() {
        let mut registry = BackendRegistry::new();
        assert!(registry.set_default("tract").is_err());
    }
}
