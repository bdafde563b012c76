//! NIC reconciliation against a list of resolved networks

use crate::context::MaterializationContext;
use crate::error::EngineError;
use labforge_platform::{NicModel, Platform, VmRef};
use labforge_spec::NetworkCatalog;

/// Resolve the network references of one service instance
///
/// `instance` is `None` while mastering, where every reference resolves to
/// its declared base network, and the outer folder index while deploying.
/// References that cannot be resolved are recorded against `entity` and
/// dropped; the remaining networks keep their relative order.
///
/// # Errors
/// Returns cancellation and structural errors only
pub async fn resolve_networks<P: Platform + ?Sized>(
    platform: &P,
    ctx: &mut MaterializationContext,
    catalog: &NetworkCatalog,
    entity: &str,
    refs: &[String],
    instance: Option<u32>,
) -> Result<Vec<String>, EngineError> {
    let mut resolved = Vec::with_capacity(refs.len());
    for name in refs {
        let result = match instance {
            None => catalog
                .get(name)
                .map(|def| def.name.clone())
                .ok_or_else(|| EngineError::lookup(crate::error::LookupKind::Network, name)),
            Some(index) => ctx.networks.resolve(platform, catalog, name, Some(index)).await,
        };
        if let Some(network) = ctx.absorb(&format!("{entity} -> {name}"), result)? {
            resolved.push(network);
        }
    }
    Ok(resolved)
}

/// Make the NICs of `vm` match `networks` in order
///
/// Excess NICs are removed highest index first, NICs present on both sides
/// are rebound when their network differs, and missing NICs are appended
/// with a model chosen from the VM's guest-tools status.
///
/// # Errors
/// Returns the first failing platform operation
pub async fn reconcile_nics<P: Platform + ?Sized>(
    platform: &P,
    ctx: &MaterializationContext,
    vm: &VmRef,
    networks: &[String],
) -> Result<(), EngineError> {
    let info = platform.vm_info(vm).await?;
    let current = info.nics.len();
    let wanted = networks.len();

    for index in (wanted..current).rev() {
        ctx.wait(platform.remove_nic(vm, index).await?).await?;
        tracing::debug!(vm = %info.name, index, "removed NIC");
    }

    for (index, (nic, network)) in info.nics.iter().zip(networks).enumerate() {
        let bound = nic
            .network
            .as_deref()
            .is_some_and(|current| current.eq_ignore_ascii_case(network));
        if !bound {
            ctx.wait(platform.edit_nic(vm, index, network).await?).await?;
            tracing::debug!(vm = %info.name, index, network = %network, "rebound NIC");
        }
    }

    let model = NicModel::for_tools(info.has_tools);
    for network in networks.iter().skip(current) {
        ctx.wait(platform.add_nic(vm, network, model).await?).await?;
        tracing::debug!(vm = %info.name, network = %network, %model, "added NIC");
    }
    Ok(())
}
