//! Capability registry

use crate::actions::descriptor::ActionDescriptor;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Descriptors keyed by name, in registration order
#[derive(Debug, Default, Clone)]
pub struct ActionRegistry {
    descriptors: Vec<Arc<ActionDescriptor>>,
    index: HashMap<String, usize>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a batch of descriptors. A duplicate name fails the whole batch
    /// and leaves the registry untouched.
    pub fn register(&mut self, descriptors: Vec<ActionDescriptor>) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for descriptor in &descriptors {
            if self.index.contains_key(&descriptor.name) || !seen.insert(descriptor.name.as_str()) {
                return Err(Error::Config(format!(
                    "Duplicate action name: {}",
                    descriptor.name
                )));
            }
        }

        for descriptor in descriptors {
            self.index
                .insert(descriptor.name.clone(), self.descriptors.len());
            self.descriptors.push(Arc::new(descriptor));
        }
        Ok(())
    }

    pub fn list(&self) -> &[Arc<ActionDescriptor>] {
        &self.descriptors
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ActionDescriptor>> {
        self.index.get(name).map(|&i| &self.descriptors[i])
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
