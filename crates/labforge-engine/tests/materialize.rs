//! Master, promotion and deployment passes against the simulated platform

use labforge_engine::{EngineSettings, Materializer, Phase, EXERCISE_SNAPSHOT, MASTERING_SNAPSHOT};
use labforge_platform::{SimOp, SimPlatform, SimVm};
use labforge_spec::Exercise;
use labforge_test_utils::{nested_exercise, pod_exercise, root_path, seeded_platform, vsphere_config};
use pretty_assertions::assert_eq;

fn materializer(exercise: &Exercise) -> (SimPlatform, Materializer<SimPlatform>) {
    let sim = seeded_platform(exercise);
    let settings = EngineSettings::from_vsphere(&vsphere_config());
    (sim.clone(), Materializer::new(sim, exercise.clone(), settings))
}

fn vm_at(sim: &SimPlatform, path: &str) -> SimVm {
    let entity = sim.lookup(path).unwrap_or_else(|| panic!("{path} missing"));
    sim.vm(entity.as_vm().unwrap()).unwrap()
}

fn networks_of(vm: &SimVm) -> Vec<String> {
    vm.nics.iter().map(|nic| nic.network.clone().unwrap_or_default()).collect()
}

#[tokio::test]
async fn pod_deployment_end_to_end() {
    let exercise = pod_exercise();
    let (sim, mut run) = materializer(&exercise);
    let root = root_path(&exercise);

    let masters = run.create_masters().await.unwrap();
    assert!(masters.is_clean(), "{masters}");
    assert_eq!(masters.vms_cloned, 1);
    assert_eq!(masters.networks_created, 2);
    assert_eq!(run.phase(), Phase::MastersBuilt);

    let master = vm_at(&sim, &format!("{root}/MASTER-FOLDERS/(MASTER) Pod/(MASTER) nginx"));
    assert_eq!(networks_of(&master), vec!["lan"]);
    assert_eq!(master.snapshots, vec![MASTERING_SNAPSHOT.to_string()]);

    let report = run.deploy_environment().await.unwrap();
    assert!(report.is_clean(), "{report}");
    assert_eq!(report.masters_promoted, 1);
    assert_eq!(report.vms_cloned, 2);
    assert_eq!(run.phase(), Phase::Deployed);

    for i in 0..2 {
        let web = vm_at(&sim, &format!("{root}/Pod 0{i}/web"));
        assert_eq!(networks_of(&web), vec![format!("lan-GENERIC-0{i}")]);
        assert!(!web.is_template);
    }
    assert_eq!(
        sim.count_ops(|op| matches!(op, SimOp::CloneVm { source, .. } if source == "(MASTER) nginx")),
        2
    );

    let master = vm_at(&sim, &format!("{root}/MASTER-FOLDERS/(MASTER) Pod/(MASTER) nginx"));
    assert!(master.is_template);
    assert_eq!(
        master.snapshots,
        vec![MASTERING_SNAPSHOT.to_string(), EXERCISE_SNAPSHOT.to_string()]
    );
}

#[tokio::test]
async fn nested_expansion_multiplies_folders_and_services() {
    let exercise = nested_exercise();
    let (sim, mut run) = materializer(&exercise);
    let root = root_path(&exercise);

    run.create_masters().await.unwrap();
    sim.clear_ops();
    let report = run.deploy_environment().await.unwrap();
    assert!(report.is_clean(), "{report}");

    assert_eq!(
        sim.count_ops(|op| matches!(op, SimOp::CloneVm { source, .. } if source == "(MASTER) kali")),
        6
    );
    for team in 0..3 {
        for ws in 0..2 {
            let vm = vm_at(&sim, &format!("{root}/Team 0{team}/Hosts/ws 0{ws}"));
            assert_eq!(networks_of(&vm), vec![format!("lan-GENERIC-0{team}"), "mgmt".to_string()]);
        }
    }

    let realized: Vec<String> = sim
        .ops()
        .into_iter()
        .filter_map(|op| match op {
            SimOp::CreateNetwork { name, .. } => Some(name),
            _ => None,
        })
        .collect();
    assert_eq!(realized, vec!["lan-GENERIC-00", "lan-GENERIC-01", "lan-GENERIC-02"]);
}

#[tokio::test]
async fn generic_networks_get_distinct_vlans() {
    let exercise = nested_exercise();
    let (sim, mut run) = materializer(&exercise);
    run.create_masters().await.unwrap();
    run.deploy_environment().await.unwrap();

    let mut vlans: Vec<u16> = ["mgmt", "lan", "lan-GENERIC-00", "lan-GENERIC-01", "lan-GENERIC-02"]
        .iter()
        .map(|name| sim.network(name).unwrap().vlan)
        .collect();
    assert_eq!(vlans[0], 100);
    assert!(vlans[1..].iter().all(|vlan| (2000..4096).contains(vlan)));
    vlans.sort_unstable();
    vlans.dedup();
    assert_eq!(vlans.len(), 5);
}

#[tokio::test]
async fn separate_invocations_never_share_vlans() {
    let exercise = pod_exercise();
    let (sim, mut masters) = materializer(&exercise);
    masters.create_masters().await.unwrap();

    let settings = EngineSettings::from_vsphere(&vsphere_config());
    let mut deploy = Materializer::new(sim.clone(), exercise.clone(), settings);
    let report = deploy.deploy_environment().await.unwrap();
    assert!(report.is_clean(), "{report}");

    let mut vlans: Vec<u16> = ["lan", "lan-GENERIC-00", "lan-GENERIC-01"]
        .iter()
        .map(|name| sim.network(name).unwrap().vlan)
        .collect();
    vlans.sort_unstable();
    vlans.dedup();
    assert_eq!(vlans.len(), 3);
}

#[tokio::test]
async fn promotion_is_idempotent() {
    let exercise = pod_exercise();
    let (sim, mut run) = materializer(&exercise);
    run.create_masters().await.unwrap();
    let first = run.promote_masters().await.unwrap();
    assert_eq!(first.masters_promoted, 1);

    sim.clear_ops();
    let second = run.promote_masters().await.unwrap();
    assert_eq!(second.masters_promoted, 0);
    assert_eq!(second.templates_reused, 1);
    assert_eq!(
        sim.count_ops(|op| matches!(
            op,
            SimOp::PowerOff { .. } | SimOp::Snapshot { .. } | SimOp::ConvertToTemplate { .. }
        )),
        0
    );
    assert_eq!(run.context().registry.len(), 1);
}

#[tokio::test]
async fn powered_on_master_is_shut_down_through_the_guest() {
    let exercise = pod_exercise();
    let (sim, mut run) = materializer(&exercise);
    let root = root_path(&exercise);
    run.create_masters().await.unwrap();

    let master = sim
        .lookup(&format!("{root}/MASTER-FOLDERS/(MASTER) Pod/(MASTER) nginx"))
        .unwrap();
    sim.set_power(master.as_vm().unwrap(), labforge_platform::PowerState::PoweredOn)
        .unwrap();
    run.promote_masters().await.unwrap();

    assert_eq!(sim.count_ops(|op| matches!(op, SimOp::PowerOff { guest: true, .. })), 1);
}

#[tokio::test]
async fn rerunning_masters_reuses_existing_vms() {
    let exercise = pod_exercise();
    let (sim, mut run) = materializer(&exercise);
    run.create_masters().await.unwrap();
    sim.clear_ops();

    let again = run.create_masters().await.unwrap();
    assert_eq!(again.vms_reused, 1);
    assert_eq!(again.vms_cloned, 0);
    assert_eq!(sim.count_ops(|op| matches!(op, SimOp::CloneVm { .. })), 0);
    assert!(again.folders_reused >= 3);
}

#[tokio::test]
async fn fresh_facade_discovers_masters_before_deploying() {
    let exercise = pod_exercise();
    let (sim, mut first) = materializer(&exercise);
    first.create_masters().await.unwrap();

    let settings = EngineSettings::from_vsphere(&vsphere_config());
    let mut second = Materializer::new(sim.clone(), exercise.clone(), settings);
    assert_eq!(second.phase(), Phase::NotStarted);
    let report = second.deploy_environment().await.unwrap();
    assert!(report.is_clean(), "{report}");
    assert_eq!(report.masters_promoted, 1);
    assert_eq!(second.phase(), Phase::Deployed);
}

#[tokio::test]
async fn phases_follow_the_run() {
    let exercise = pod_exercise();
    let (_sim, mut run) = materializer(&exercise);
    assert_eq!(run.phase(), Phase::NotStarted);
    run.create_masters().await.unwrap();
    assert_eq!(run.phase(), Phase::MastersBuilt);
    run.promote_masters().await.unwrap();
    assert_eq!(run.phase(), Phase::Promoted);
    run.deploy_environment().await.unwrap();
    assert_eq!(run.phase(), Phase::Deployed);
    run.cleanup_environment(false).await.unwrap();
    assert_eq!(run.phase(), Phase::Promoted);
    run.cleanup_masters(false).await.unwrap();
    assert_eq!(run.phase(), Phase::NotStarted);
    assert!(run.context().registry.is_empty());
}

#[tokio::test]
async fn rendered_tree_shows_deployment() {
    let exercise = pod_exercise();
    let (_sim, mut run) = materializer(&exercise);
    run.create_masters().await.unwrap();
    run.deploy_environment().await.unwrap();

    let tree = run.render().await.unwrap();
    assert!(tree.starts_with(&format!("{}/\n", root_path(&exercise))));
    assert!(tree.contains("  MASTER-FOLDERS/\n    (MASTER) Pod/\n      (MASTER) nginx [template] (lan)\n"));
    assert!(tree.contains("  Pod 00/\n    web (lan-GENERIC-00)\n"));
    assert!(tree.contains("  Pod 01/\n    web (lan-GENERIC-01)\n"));
}
