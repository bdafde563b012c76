//! Master registry: promoted master name to template handle

use indexmap::IndexMap;
use labforge_platform::VmRef;

/// Masters registered during promotion, keyed case-insensitively by live name
#[derive(Debug, Clone, Default)]
pub struct MasterRegistry {
    masters: IndexMap<String, (String, VmRef)>,
}

impl MasterRegistry {
    /// Empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a master under its live name
    pub fn insert(&mut self, name: &str, vm: VmRef) {
        self.masters.insert(name.to_lowercase(), (name.to_string(), vm));
    }

    /// Handle of the master named `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&VmRef> {
        self.masters.get(&name.to_lowercase()).map(|(_, vm)| vm)
    }

    /// Registered masters in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VmRef)> {
        self.masters.values().map(|(name, vm)| (name.as_str(), vm))
    }

    /// Number of registered masters
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.masters.len()
    }

    /// Whether nothing is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.masters.is_empty()
    }

    /// Forget every master
    pub fn clear(&mut self) {
        self.masters.clear();
    }
}
