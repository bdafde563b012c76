//! Network resolution and lazy realization of generic networks
//!
//! A unique network resolves to its own name for every instance. A generic
//! network resolves to `<name>-GENERIC-<index>`; the first resolution of a
//! realized name in a run checks the platform and creates the port group if
//! it is missing, later resolutions hit the realization cache.
//!
//! New port groups never reuse a VLAN tag already carried by a network on
//! the platform, so runs in separate processes stay tag-disjoint.

use crate::error::{EngineError, LookupKind};
use crate::naming::generic_network_name;
use crate::vlan::VlanAllocator;
use indexmap::IndexMap;
use labforge_platform::{NetworkOps, PortGroupSpec};
use labforge_spec::{NetworkCatalog, NetworkDef, NetworkKind};

/// What [`NetworkResolver::create_base_network`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseNetwork {
    /// The network already existed
    Existing,
    /// The network was created
    Created,
    /// The network is missing and creation is disabled
    Skipped,
}

/// Per-run network resolver
#[derive(Debug, Clone)]
pub struct NetworkResolver {
    default_vswitch: String,
    vlans: VlanAllocator,
    realized: IndexMap<String, String>,
}

impl NetworkResolver {
    /// Resolver creating port groups on `default_vswitch` unless a network
    /// names its own
    #[must_use]
    pub fn new(default_vswitch: impl Into<String>) -> Self {
        Self {
            default_vswitch: default_vswitch.into(),
            vlans: VlanAllocator::new(),
            realized: IndexMap::new(),
        }
    }

    /// Replace the VLAN allocator
    #[inline]
    #[must_use]
    pub fn with_allocator(mut self, vlans: VlanAllocator) -> Self {
        self.vlans = vlans;
        self
    }

    /// Realized generic networks of this run, in realization order
    pub fn realized(&self) -> impl Iterator<Item = &str> {
        self.realized.values().map(String::as_str)
    }

    /// Drop realized names so the next resolution checks the platform again
    ///
    /// Call after the realized port groups were destroyed.
    pub fn forget_realized(&mut self) {
        self.realized.clear();
    }

    /// Platform name of `name` for one instance
    ///
    /// `instance` is ignored for unique networks and required for generic ones.
    ///
    /// # Errors
    /// - [`EngineError::Lookup`] if `name` is not declared
    /// - [`EngineError::InvalidArgument`] for a generic network without an index
    /// - [`EngineError::VlanExhausted`] or a platform fault while creating
    pub async fn resolve<N: NetworkOps + ?Sized>(
        &mut self,
        platform: &N,
        catalog: &NetworkCatalog,
        name: &str,
        instance: Option<u32>,
    ) -> Result<String, EngineError> {
        let def = catalog
            .get(name)
            .ok_or_else(|| EngineError::lookup(LookupKind::Network, name))?;
        match def.kind {
            NetworkKind::Unique => Ok(def.name.clone()),
            NetworkKind::Generic => {
                let index = instance.ok_or_else(|| {
                    EngineError::InvalidArgument(format!(
                        "generic network '{}' resolved without an instance index",
                        def.name
                    ))
                })?;
                self.realize(platform, def, index).await
            }
        }
    }

    async fn realize<N: NetworkOps + ?Sized>(
        &mut self,
        platform: &N,
        def: &NetworkDef,
        index: u32,
    ) -> Result<String, EngineError> {
        let realized = generic_network_name(&def.name, index);
        let key = realized.to_lowercase();
        if self.realized.contains_key(&key) {
            return Ok(realized);
        }

        if platform.network_exists(&realized).await? {
            tracing::debug!(network = %realized, "generic network already present");
        } else {
            let vlan = self.allocate(platform).await?;
            let spec = PortGroupSpec {
                name: realized.clone(),
                vswitch: def.vswitch.clone().unwrap_or_else(|| self.default_vswitch.clone()),
                vlan,
                promiscuous: false,
            };
            platform.ensure_network(&spec).await?;
            tracing::info!(network = %realized, vlan, vswitch = %spec.vswitch, "realized generic network");
        }
        self.realized.insert(key, realized.clone());
        Ok(realized)
    }

    /// Make sure a declared network exists under its own name
    ///
    /// Unique networks keep a declared VLAN tag; everything else draws from
    /// the allocator.
    ///
    /// # Errors
    /// Returns [`EngineError::VlanExhausted`] or the platform fault
    pub async fn create_base_network<N: NetworkOps + ?Sized>(
        &mut self,
        platform: &N,
        def: &NetworkDef,
        default_create: bool,
    ) -> Result<BaseNetwork, EngineError> {
        if platform.network_exists(&def.name).await? {
            tracing::debug!(network = %def.name, kind = %def.kind, "base network exists");
            return Ok(BaseNetwork::Existing);
        }
        if !default_create {
            tracing::warn!(network = %def.name, "base network missing and default-create is off, skipping");
            return Ok(BaseNetwork::Skipped);
        }
        let vlan = match (def.kind, def.vlan) {
            (NetworkKind::Unique, Some(vlan)) => vlan,
            _ => self.allocate(platform).await?,
        };
        let spec = PortGroupSpec {
            name: def.name.clone(),
            vswitch: def.vswitch.clone().unwrap_or_else(|| self.default_vswitch.clone()),
            vlan,
            promiscuous: false,
        };
        platform.ensure_network(&spec).await?;
        tracing::info!(network = %def.name, kind = %def.kind, vlan, "created base network");
        Ok(BaseNetwork::Created)
    }

    async fn allocate<N: NetworkOps + ?Sized>(&mut self, platform: &N) -> Result<u16, EngineError> {
        self.vlans.reserve(platform.network_vlans().await?);
        self.vlans.next_vlan()
    }
}
