//! Subcommand execution

use crate::args::{Cli, Command};
use crate::backend;
use anyhow::{bail, Context};
use indexmap::IndexMap;
use labforge_engine::{EngineSettings, Materializer, RunReport};
use labforge_platform::{CancelFlag, SimPlatform};
use labforge_spec::{Exercise, Folder, FolderNode, InfraConfig, NetworkKind};
use std::fmt::Write as _;

/// Run the parsed command line and return what should be printed on stdout
///
/// The simulated inventory is saved after every materializing command, even
/// when the command fails part-way.
///
/// # Errors
/// Fails on unreadable input files, unresolved references found by `check`,
/// and structural engine errors
pub async fn run(cli: &Cli, cancel: CancelFlag) -> anyhow::Result<String> {
    let spec = cli.command.spec();
    let exercise = Exercise::load(spec).with_context(|| format!("loading specification {}", spec.display()))?;
    if let Command::Check { .. } = cli.command {
        return check(&exercise);
    }

    let settings = load_settings(cli)?;
    let platform = backend::open(&cli.state, &exercise, &settings)?;
    let mut materializer = Materializer::new(platform.clone(), exercise, settings).with_cancel_flag(cancel);
    let result = execute(&mut materializer, &cli.command, cli.json).await;
    backend::save(&platform, &cli.state)?;
    result
}

fn load_settings(cli: &Cli) -> anyhow::Result<EngineSettings> {
    let Some(path) = cli.infra.as_ref() else {
        bail!("--infra is required for this command");
    };
    let infra = InfraConfig::load(path).with_context(|| format!("loading infrastructure {}", path.display()))?;
    let vsphere = infra
        .vsphere
        .with_context(|| format!("{} configures no vmware-vsphere platform", path.display()))?;
    Ok(EngineSettings::from_vsphere(&vsphere))
}

async fn execute(run: &mut Materializer<SimPlatform>, command: &Command, json: bool) -> anyhow::Result<String> {
    match command {
        Command::Check { .. } => check(run.exercise()),
        Command::Masters { .. } => {
            let report = run.create_masters().await?;
            format_reports(&[report], json)
        }
        Command::Deploy { .. } => {
            let report = run.deploy_environment().await?;
            let mut out = format_reports(&[report], json)?;
            if !json {
                out.push('\n');
                out.push_str(&run.render().await?);
            }
            Ok(out)
        }
        Command::Cleanup { masters, networks, .. } => {
            let mut reports = vec![run.cleanup_environment(*networks).await?];
            if *masters {
                reports.push(run.cleanup_masters(*networks).await?);
            }
            format_reports(&reports, json)
        }
        Command::Tree { .. } => Ok(run.render().await?),
    }
}

fn format_reports(reports: &[RunReport], json: bool) -> anyhow::Result<String> {
    if json {
        let text = match reports {
            [one] => serde_json::to_string_pretty(one)?,
            many => serde_json::to_string_pretty(many)?,
        };
        return Ok(text);
    }
    Ok(reports.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))
}

/// Summary of a loaded specification
///
/// # Errors
/// Fails when a service instance names an undeclared service or network
pub fn check(exercise: &Exercise) -> anyhow::Result<String> {
    let mut unresolved = Vec::new();
    let entries = count_entries(exercise, &exercise.folders, "", &mut unresolved);
    if !unresolved.is_empty() {
        bail!("{} unresolved references:\n  {}", unresolved.len(), unresolved.join("\n  "));
    }

    let generic = exercise
        .networks
        .iter()
        .filter(|def| def.kind == NetworkKind::Generic)
        .count();
    let mut out = String::new();
    let meta = &exercise.metadata;
    let _ = writeln!(out, "exercise '{}' in '{}/{}'", meta.name, meta.root_path, meta.root_folder_name());
    let _ = writeln!(out, "  services            {}", exercise.services.len());
    let _ = writeln!(
        out,
        "  networks            {} ({} unique, {generic} generic)",
        exercise.networks.len(),
        exercise.networks.len() - generic
    );
    let _ = writeln!(out, "  folders             {}", exercise.folder_count());
    let _ = write!(out, "  service entries     {entries}");
    Ok(out)
}

/// Declared service entries, before folder and instance multiplication
fn count_entries(
    exercise: &Exercise,
    folders: &IndexMap<String, Folder>,
    path: &str,
    unresolved: &mut Vec<String>,
) -> usize {
    let mut total = 0;
    for folder in folders.values() {
        let here = format!("{path}/{}", folder.name);
        match &folder.node {
            FolderNode::Parent(children) => total += count_entries(exercise, children, &here, unresolved),
            FolderNode::Base(services) => {
                for instance in services.values() {
                    total += 1;
                    if exercise.services.get(&instance.service).is_none() {
                        unresolved.push(format!("{here}/{}: service '{}'", instance.name, instance.service));
                    }
                    for network in &instance.networks {
                        if exercise.networks.get(network).is_none() {
                            unresolved.push(format!("{here}/{}: network '{network}'", instance.name));
                        }
                    }
                }
            }
        }
    }
    total
}
