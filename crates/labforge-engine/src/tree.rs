//! Text rendering of a folder subtree

use futures::future::BoxFuture;
use labforge_platform::{Entity, FolderRef, Platform, PlatformError};
use std::fmt::Write as _;

/// Render `folder` and everything below it as an indented tree
///
/// Folders end with `/`, templates are marked `[template]` and VMs list
/// the networks their NICs are bound to.
///
/// # Errors
/// Returns the first failing platform lookup
pub async fn render_tree<P: Platform + ?Sized>(
    platform: &P,
    folder: &FolderRef,
    label: &str,
) -> Result<String, PlatformError> {
    let mut out = format!("{label}/\n");
    render_children(platform, folder, 1, &mut out).await?;
    Ok(out)
}

fn render_children<'s, P: Platform + ?Sized>(
    platform: &'s P,
    folder: &'s FolderRef,
    depth: usize,
    out: &'s mut String,
) -> BoxFuture<'s, Result<(), PlatformError>> {
    Box::pin(async move {
        let indent = "  ".repeat(depth);
        for child in platform.children(folder).await? {
            match child {
                Entity::Folder { handle, name } => {
                    let _ = writeln!(out, "{indent}{name}/");
                    render_children(platform, &handle, depth + 1, out).await?;
                }
                Entity::Vm { handle, name } => {
                    let info = platform.vm_info(&handle).await?;
                    let mut line = format!("{indent}{name}");
                    if info.is_template {
                        line.push_str(" [template]");
                    }
                    let networks: Vec<&str> = info
                        .nics
                        .iter()
                        .map(|nic| nic.network.as_deref().unwrap_or("-"))
                        .collect();
                    if !networks.is_empty() {
                        let _ = write!(line, " ({})", networks.join(", "));
                    }
                    let _ = writeln!(out, "{line}");
                }
                Entity::Other { name, kind } => {
                    let _ = writeln!(out, "{indent}{name} <{kind}>");
                }
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use labforge_platform::{PortGroupSpec, SimPlatform, SimVm, VmOps};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn renders_nested_tree() {
        let sim = SimPlatform::new();
        sim.add_network(PortGroupSpec {
            name: "lan".into(),
            vswitch: "vSwitch0".into(),
            vlan: 2000,
            promiscuous: false,
        });
        let pod = sim.ensure_folder_path("Lab/Pod 00").unwrap();
        let vm = sim.add_vm(&pod, "web", SimVm::vm(true, 1)).unwrap();
        let task = sim.edit_nic(&vm, 0, "lan").await.unwrap();
        labforge_platform::wait_for_task(task, &Default::default(), &Default::default())
            .await
            .unwrap();
        let lab = sim.lookup("Lab").unwrap().as_folder().unwrap().clone();
        sim.add_vm(&lab, "(MASTER) web", SimVm::template(true, 0)).unwrap();

        let text = render_tree(&sim, &lab, "Lab").await.unwrap();
        assert_eq!(text, "Lab/\n  Pod 00/\n    web (lan)\n  (MASTER) web [template]\n");
    }
}
