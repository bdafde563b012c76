//! Engine settings derived from the infrastructure configuration

use labforge_platform::{Placement, WaitPolicy};
use labforge_spec::{Thresholds, VsphereConfig};
use std::time::Duration;

/// Everything the engine needs from the infrastructure configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Folder path treated as the server root
    pub server_root: String,
    /// Template folder path, under the server root
    pub template_folder: String,
    /// Clone placement
    pub placement: Placement,
    /// Default virtual switch
    pub vswitch: String,
    /// Create missing base networks
    pub default_create: bool,
    /// Instance-count thresholds
    pub thresholds: Thresholds,
    /// Task wait timing
    pub wait: WaitPolicy,
}

impl EngineSettings {
    /// Settings with defaults and the given template folder
    #[must_use]
    pub fn new(template_folder: impl Into<String>) -> Self {
        Self::from_vsphere(&VsphereConfig::new(template_folder))
    }

    /// Settings from a `vmware-vsphere` block
    #[must_use]
    pub fn from_vsphere(config: &VsphereConfig) -> Self {
        Self {
            server_root: config.server_root.clone().unwrap_or_default(),
            template_folder: config.template_folder.clone(),
            placement: Placement {
                resource_pool: config.resource_pool.clone(),
                datastore: config.datastore.clone(),
                host: config.host.clone(),
            },
            vswitch: config.vswitch.clone(),
            default_create: config.default_create,
            thresholds: config.thresholds,
            wait: WaitPolicy::default().with_timeout(Duration::from_secs(config.timeout_secs)),
        }
    }

    /// With server root
    #[inline]
    #[must_use]
    pub fn with_server_root(mut self, root: impl Into<String>) -> Self {
        self.server_root = root.into();
        self
    }

    /// With thresholds
    #[inline]
    #[must_use]
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// With base-network creation switched on or off
    #[inline]
    #[must_use]
    pub fn with_default_create(mut self, create: bool) -> Self {
        self.default_create = create;
        self
    }

    /// With a wait policy
    #[inline]
    #[must_use]
    pub fn with_wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }
}
