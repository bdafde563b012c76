//! Entity-level failures are recorded and skipped; structural ones abort

use labforge_engine::{EngineError, EngineSettings, LookupKind, Materializer};
use labforge_platform::{CancelFlag, SimFaults, SimOp, SimPlatform};
use labforge_spec::{Exercise, Folder, InstanceCount, ServiceInstance, Threshold, Thresholds};
use labforge_test_utils::{exercise, pod_exercise, root_path, seeded_platform, vsphere_config};

fn run_for(exercise: &Exercise, settings: EngineSettings) -> (SimPlatform, Materializer<SimPlatform>) {
    let sim = seeded_platform(exercise);
    (sim.clone(), Materializer::new(sim, exercise.clone(), settings))
}

fn settings() -> EngineSettings {
    EngineSettings::from_vsphere(&vsphere_config())
}

fn web(folder: &str) -> Folder {
    Folder::base(folder, vec![ServiceInstance::new("web", "nginx", &["lan"])])
}

#[tokio::test]
async fn deploy_without_masters_is_structural() {
    let exercise = pod_exercise();
    let (sim, mut run) = run_for(&exercise, settings());

    let err = run.deploy_environment().await.unwrap_err();
    assert!(matches!(err, EngineError::MasterFolderAbsent { .. }));
    assert!(err.is_structural());
    assert_eq!(sim.count_ops(|op| matches!(op, SimOp::CloneVm { .. })), 0);
}

#[tokio::test]
async fn missing_template_root_is_structural() {
    let exercise = pod_exercise();
    let sim = SimPlatform::new();
    sim.ensure_folder_path("Datacenter/Exercises").unwrap();
    let mut run = Materializer::new(sim, exercise, settings());

    let err = run.create_masters().await.unwrap_err();
    assert!(matches!(err, EngineError::TemplateRootMissing { .. }));
}

#[tokio::test]
async fn missing_root_parent_is_structural() {
    let exercise = pod_exercise();
    let sim = SimPlatform::new();
    let mut run = Materializer::new(sim, exercise, settings());

    let err = run.create_masters().await.unwrap_err();
    assert!(matches!(err, EngineError::RootFolderUnavailable { .. }));
}

#[tokio::test]
async fn folder_above_error_threshold_is_skipped_with_siblings_deployed() {
    let exercise = exercise(vec![web("Pod").with_instances(InstanceCount::fixed(4)), web("Solo")]);
    let thresholds = Thresholds {
        folder: Threshold::new(2, 3),
        ..Thresholds::default()
    };
    let (sim, mut run) = run_for(&exercise, settings().with_thresholds(thresholds));
    let root = root_path(&exercise);
    run.create_masters().await.unwrap();

    let report = run.deploy_environment().await.unwrap();
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].reason.contains("above the error threshold of 3"));
    assert!(sim.lookup(&format!("{root}/Pod 00")).is_none());
    assert!(sim.lookup(&format!("{root}/Solo/web")).is_some());
}

#[tokio::test]
async fn count_at_error_threshold_proceeds_with_one_warning() {
    let exercise = exercise(vec![web("Pod").with_instances(InstanceCount::fixed(3))]);
    let thresholds = Thresholds {
        folder: Threshold::new(2, 3),
        ..Thresholds::default()
    };
    let (sim, mut run) = run_for(&exercise, settings().with_thresholds(thresholds));
    run.create_masters().await.unwrap();

    let report = run.deploy_environment().await.unwrap();
    assert!(report.is_clean(), "{report}");
    assert_eq!(report.warnings, 1);
    assert_eq!(report.vms_cloned, 3);
    assert!(sim.lookup(&format!("{}/Pod 02/web", root_path(&exercise))).is_some());
}

#[tokio::test]
async fn service_without_master_fails_each_instance() {
    let exercise = exercise(vec![Folder::base(
        "Pod",
        vec![ServiceInstance::new("web", "nginx", &["lan"]).with_instances(InstanceCount::fixed(2))],
    )]);
    let (sim, mut run) = run_for(&exercise, settings());
    sim.set_faults(SimFaults {
        failing_clones: vec!["(MASTER) nginx".to_string()],
        ..SimFaults::default()
    });

    let masters = run.create_masters().await.unwrap();
    assert_eq!(masters.failures.len(), 1);

    let report = run.deploy_environment().await.unwrap();
    let entities: Vec<&str> = report.failures.iter().map(|f| f.entity.as_str()).collect();
    let root = root_path(&exercise);
    assert_eq!(
        entities,
        vec![format!("{root}/Pod/web 00"), format!("{root}/Pod/web 01")]
    );
    assert!(report
        .failures
        .iter()
        .all(|f| f.reason == EngineError::lookup(LookupKind::Master, "(MASTER) nginx").to_string()));
    assert!(sim.lookup(&format!("{root}/Pod")).is_some());
}

#[tokio::test]
async fn clone_fault_skips_only_that_service() {
    let exercise = exercise(vec![Folder::base(
        "Pod",
        vec![
            ServiceInstance::new("web", "nginx", &["lan"]),
            ServiceInstance::new("attacker", "kali", &["lan"]),
        ],
    )]);
    let (sim, mut run) = run_for(&exercise, settings());
    run.create_masters().await.unwrap();
    sim.set_faults(SimFaults {
        failing_clones: vec!["web".to_string()],
        ..SimFaults::default()
    });

    let report = run.deploy_environment().await.unwrap();
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].entity.ends_with("Pod/web"));
    assert_eq!(report.vms_cloned, 1);
    assert!(sim
        .lookup(&format!("{}/Pod/attacker", root_path(&exercise)))
        .is_some());
}

#[tokio::test]
async fn rerun_rebinds_nics_of_reused_instances() {
    let exercise = pod_exercise();
    let (sim, mut run) = run_for(&exercise, settings());
    let root = root_path(&exercise);
    run.create_masters().await.unwrap();
    sim.set_faults(SimFaults {
        failing_nics: vec!["web".to_string()],
        ..SimFaults::default()
    });

    let failed = run.deploy_environment().await.unwrap();
    assert_eq!(failed.failures.len(), 2);
    assert_eq!(failed.vms_cloned, 2);

    sim.set_faults(SimFaults::default());
    let report = run.deploy_environment().await.unwrap();
    assert!(report.is_clean(), "{report}");
    assert_eq!(report.vms_reused, 2);
    assert_eq!(report.vms_cloned, 0);
    for i in 0..2 {
        let entity = sim.lookup(&format!("{root}/Pod 0{i}/web")).unwrap();
        let web = sim.vm(entity.as_vm().unwrap()).unwrap();
        let bound: Vec<Option<String>> = web.nics.into_iter().map(|nic| nic.network).collect();
        assert_eq!(bound, vec![Some(format!("lan-GENERIC-0{i}"))]);
    }
}

#[tokio::test]
async fn rerun_rebinds_nics_of_reused_master() {
    let exercise = pod_exercise();
    let (sim, mut run) = run_for(&exercise, settings());
    sim.set_faults(SimFaults {
        failing_nics: vec!["(MASTER) nginx".to_string()],
        ..SimFaults::default()
    });
    let failed = run.create_masters().await.unwrap();
    assert_eq!(failed.failures.len(), 1);

    sim.set_faults(SimFaults::default());
    let report = run.create_masters().await.unwrap();
    assert!(report.is_clean(), "{report}");
    assert_eq!(report.vms_reused, 1);
    let path = format!("{}/MASTER-FOLDERS/(MASTER) Pod/(MASTER) nginx", root_path(&exercise));
    let master = sim.vm(sim.lookup(&path).unwrap().as_vm().unwrap()).unwrap();
    let bound: Vec<Option<String>> = master.nics.into_iter().map(|nic| nic.network).collect();
    assert_eq!(bound, vec![Some("lan".to_string())]);
}

#[tokio::test]
async fn failed_master_clone_is_retried_for_the_next_folder() {
    let exercise = exercise(vec![web("Red"), web("Blue")]);
    let (sim, mut run) = run_for(&exercise, settings());
    sim.set_faults(SimFaults {
        failing_clones: vec!["(MASTER) nginx".to_string()],
        ..SimFaults::default()
    });

    let masters = run.create_masters().await.unwrap();
    assert_eq!(masters.failures.len(), 2);
    assert_eq!(masters.skipped, 0);
    assert_eq!(sim.count_ops(|op| matches!(op, SimOp::CloneVm { .. })), 2);
}

#[tokio::test]
async fn disabled_folders_and_foreign_services_are_skipped() {
    let exercise = exercise(vec![
        web("Off").with_enabled(false),
        Folder::base("Cache", vec![ServiceInstance::new("db", "redis", &["lan"])]),
    ]);
    let (sim, mut run) = run_for(&exercise, settings());

    let masters = run.create_masters().await.unwrap();
    assert!(masters.is_clean(), "{masters}");
    assert_eq!(masters.skipped, 2);
    assert_eq!(sim.count_ops(|op| matches!(op, SimOp::CloneVm { .. })), 0);
    let root = root_path(&exercise);
    assert!(sim.lookup(&format!("{root}/MASTER-FOLDERS/(MASTER) Off")).is_none());
    assert!(sim.lookup(&format!("{root}/MASTER-FOLDERS/(MASTER) Cache")).is_some());
}

#[tokio::test]
async fn service_mastered_once_per_run() {
    let exercise = exercise(vec![web("Red"), web("Blue")]);
    let (sim, mut run) = run_for(&exercise, settings());

    let masters = run.create_masters().await.unwrap();
    assert_eq!(masters.vms_cloned, 1);
    assert_eq!(masters.skipped, 1);
    assert_eq!(sim.count_ops(|op| matches!(op, SimOp::CloneVm { .. })), 1);

    let report = run.deploy_environment().await.unwrap();
    assert!(report.is_clean(), "{report}");
    assert_eq!(report.vms_cloned, 2);
}

#[tokio::test]
async fn cancelled_run_stops_before_materializing() {
    let exercise = pod_exercise();
    let cancel = CancelFlag::new();
    let (sim, run) = run_for(&exercise, settings());
    let mut run = run.with_cancel_flag(cancel.clone());
    cancel.cancel();

    let err = run.create_masters().await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(sim.count_ops(|op| matches!(op, SimOp::CloneVm { .. })), 0);
}
