//! JSON-persisted simulated platform

use anyhow::Context;
use labforge_engine::naming::join_path;
use labforge_engine::EngineSettings;
use labforge_platform::SimPlatform;
use labforge_spec::Exercise;
use std::path::Path;

/// Restore the inventory at `state`, or start one with the exercise parent
/// folder and every template the exercise names
///
/// # Errors
/// Fails if the state file exists but cannot be parsed, or seeding fails
pub fn open(state: &Path, exercise: &Exercise, settings: &EngineSettings) -> anyhow::Result<SimPlatform> {
    if state.exists() {
        return SimPlatform::load(state).with_context(|| format!("loading inventory {}", state.display()));
    }

    let platform = SimPlatform::new();
    let parent = join_path(&[&settings.server_root, &exercise.metadata.root_path]);
    platform
        .ensure_folder_path(&parent)
        .with_context(|| format!("creating folder {parent}"))?;
    let templates = join_path(&[&settings.server_root, &settings.template_folder]);
    let seeded = platform
        .seed_templates(exercise, &templates)
        .with_context(|| format!("seeding templates under {templates}"))?;
    tracing::info!(state = %state.display(), seeded, "starting a new simulated inventory");
    Ok(platform)
}

/// Write the inventory back to `state`
///
/// # Errors
/// Fails if the file cannot be written
pub fn save(platform: &SimPlatform, state: &Path) -> anyhow::Result<()> {
    platform
        .save(state)
        .with_context(|| format!("saving inventory {}", state.display()))
}
