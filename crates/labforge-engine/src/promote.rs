//! Master to template promotion

use crate::context::MaterializationContext;
use crate::error::EngineError;
use futures::future::BoxFuture;
use labforge_platform::{Entity, FolderRef, Platform, PowerState, VmRef};

/// Snapshot taken on every master right before conversion
pub const EXERCISE_SNAPSHOT: &str = "Start of exercise";

/// Promote every VM below `folder` to a template and register it
///
/// Masters that already are templates are registered and left alone, so a
/// second pass over a promoted tree issues no power, snapshot or convert
/// request.
///
/// # Errors
/// Entity failures are recorded in the report; only cancellation and
/// structural errors are returned
pub fn promote_tree<'s, P: Platform + ?Sized>(
    platform: &'s P,
    ctx: &'s mut MaterializationContext,
    folder: &'s FolderRef,
    path: &'s str,
    exercise: &'s str,
) -> BoxFuture<'s, Result<(), EngineError>> {
    Box::pin(async move {
        let listed = platform.children(folder).await.map_err(EngineError::from);
        let Some(children) = ctx.absorb(path, listed)? else {
            return Ok(());
        };

        for child in children {
            ctx.check_cancelled()?;
            match child {
                Entity::Vm { handle, name } => {
                    let entity = format!("{path}/{name}");
                    let result = promote_vm(platform, ctx, &handle, &name, exercise).await;
                    ctx.absorb(&entity, result)?;
                }
                Entity::Folder { handle, name } => {
                    let nested = format!("{path}/{name}");
                    promote_tree(platform, ctx, &handle, &nested, exercise).await?;
                }
                Entity::Other { name, kind } => {
                    tracing::warn!(entity = %name, kind = %kind, "ignoring unexpected object in master tree");
                }
            }
        }
        Ok(())
    })
}

async fn promote_vm<P: Platform + ?Sized>(
    platform: &P,
    ctx: &mut MaterializationContext,
    vm: &VmRef,
    name: &str,
    exercise: &str,
) -> Result<(), EngineError> {
    ctx.registry.insert(name, vm.clone());

    let info = platform.vm_info(vm).await?;
    if info.is_template {
        tracing::debug!(master = name, "already a template");
        ctx.report.templates_reused += 1;
        return Ok(());
    }

    if info.power_state == PowerState::PoweredOn {
        ctx.wait(platform.power_off(vm, true).await?).await?;
        tracing::info!(master = name, "powered off master");
    }

    let description = format!("Start of exercise {exercise}");
    ctx.wait(platform.snapshot(vm, EXERCISE_SNAPSHOT, &description).await?)
        .await?;
    platform.convert_to_template(vm).await?;

    if !platform.is_template(vm).await? {
        return Err(EngineError::PromotionFailed { name: name.to_string() });
    }
    ctx.report.masters_promoted += 1;
    tracing::info!(master = name, "promoted master to template");
    Ok(())
}
