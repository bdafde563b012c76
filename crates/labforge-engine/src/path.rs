//! Folder path lookup and idempotent folder creation

use labforge_platform::{Entity, FolderOps, FolderRef, PlatformError};

/// Whether [`ensure_folder`] created the folder or found it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderOutcome {
    /// Newly created
    Created,
    /// Already present
    Reused,
}

/// Entity at a '/'-separated path below `start`, matching names case-insensitively
///
/// An empty path resolves to `start` itself.
///
/// # Errors
/// Returns the platform fault of a failing lookup
pub async fn resolve_path<F: FolderOps + ?Sized>(
    platform: &F,
    start: &FolderRef,
    path: &str,
) -> Result<Option<Entity>, PlatformError> {
    let mut current = Entity::Folder {
        handle: start.clone(),
        name: String::new(),
    };
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let Some(folder) = current.as_folder() else {
            return Ok(None);
        };
        match platform.find_by_name(folder, segment).await? {
            Some(child) => current = child,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

/// Folder at a path below `start`; `None` if absent or not a folder
///
/// # Errors
/// Returns the platform fault of a failing lookup
pub async fn resolve_folder_path<F: FolderOps + ?Sized>(
    platform: &F,
    start: &FolderRef,
    path: &str,
) -> Result<Option<FolderRef>, PlatformError> {
    Ok(resolve_path(platform, start, path)
        .await?
        .and_then(|entity| entity.as_folder().cloned()))
}

/// Child folder `name` of `parent`, created if absent
///
/// # Errors
/// - [`PlatformError::DuplicateName`] if a non-folder already holds the name
/// - the platform fault of a failing lookup or creation
pub async fn ensure_folder<F: FolderOps + ?Sized>(
    platform: &F,
    parent: &FolderRef,
    name: &str,
) -> Result<(FolderRef, FolderOutcome), PlatformError> {
    match platform.find_by_name(parent, name).await? {
        Some(Entity::Folder { handle, .. }) => {
            tracing::debug!(folder = name, "reusing existing folder");
            Ok((handle, FolderOutcome::Reused))
        }
        Some(_) => Err(PlatformError::DuplicateName { name: name.to_string() }),
        None => {
            let handle = platform.create_folder(parent, name).await?;
            tracing::info!(folder = name, "created folder");
            Ok((handle, FolderOutcome::Created))
        }
    }
}
