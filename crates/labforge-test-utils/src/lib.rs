//! Testing utilities for the labforge workspace
//!
//! Exercise builders and seeded simulated platforms shared by the
//! integration tests of every crate.

#![allow(missing_docs)]

use indexmap::IndexMap;
use labforge_platform::SimPlatform;
use labforge_spec::{
    Exercise, Folder, InstanceCount, Metadata, NetworkCatalog, NetworkDef, NetworkKind, Service, ServiceCatalog,
    ServiceInstance, ServiceSource, VsphereConfig,
};

pub const SERVER_ROOT: &str = "Datacenter";
pub const TEMPLATE_FOLDER: &str = "Templates";
pub const ROOT_PATH: &str = "Exercises";
pub const EXERCISE_NAME: &str = "demo";

/// Infrastructure block matching [`seeded_platform`]
pub fn vsphere_config() -> VsphereConfig {
    VsphereConfig::new(TEMPLATE_FOLDER).with_server_root(SERVER_ROOT)
}

pub fn network(name: &str, kind: NetworkKind) -> NetworkDef {
    NetworkDef {
        name: name.to_string(),
        kind,
        subnet: None,
        vswitch: None,
        vlan: None,
        description: None,
    }
}

pub fn networks() -> NetworkCatalog {
    let mut catalog = NetworkCatalog::new();
    catalog.insert(NetworkDef {
        vlan: Some(100),
        ..network("mgmt", NetworkKind::Unique)
    });
    catalog.insert(network("lan", NetworkKind::Generic));
    catalog
}

pub fn services() -> ServiceCatalog {
    let mut catalog = ServiceCatalog::new();
    catalog.insert(Service::template("nginx", "Linux/nginx"));
    catalog.insert(Service::template("kali", "Linux/kali"));
    catalog.insert(Service {
        name: "redis".to_string(),
        source: ServiceSource::Container {
            image: Some("redis:7".to_string()),
            dockerfile: None,
        },
        note: None,
        resources: labforge_spec::ResourceConfig::default(),
    });
    catalog
}

pub fn exercise(folders: Vec<Folder>) -> Exercise {
    Exercise {
        metadata: Metadata {
            name: EXERCISE_NAME.to_string(),
            root_path: ROOT_PATH.to_string(),
            ..Metadata::default()
        },
        groups: IndexMap::new(),
        services: services(),
        networks: networks(),
        folders: folders.into_iter().map(|f| (f.name.clone(), f)).collect(),
    }
}

/// `Pod` x2 holding `web` (nginx) on the generic `lan`
pub fn pod_exercise() -> Exercise {
    exercise(vec![Folder::base(
        "Pod",
        vec![ServiceInstance::new("web", "nginx", &["lan"])],
    )
    .with_instances(InstanceCount::fixed(2))])
}

/// `Team` x3 wrapping `Hosts` with `ws` (kali) x2 on `lan` and `mgmt`
pub fn nested_exercise() -> Exercise {
    let hosts = Folder::base(
        "Hosts",
        vec![ServiceInstance::new("ws", "kali", &["lan", "mgmt"]).with_instances(InstanceCount::fixed(2))],
    );
    exercise(vec![
        Folder::parent("Team", vec![hosts]).with_instances(InstanceCount::fixed(3))
    ])
}

/// Simulated platform with the exercise parent folder and every template in place
pub fn seeded_platform(exercise: &Exercise) -> SimPlatform {
    let sim = SimPlatform::new();
    sim.ensure_folder_path(&format!("{SERVER_ROOT}/{}", exercise.metadata.root_path))
        .unwrap();
    sim.seed_templates(exercise, &format!("{SERVER_ROOT}/{TEMPLATE_FOLDER}"))
        .unwrap();
    sim
}

/// Path of the deployed exercise root in [`seeded_platform`]
pub fn root_path(exercise: &Exercise) -> String {
    format!(
        "{SERVER_ROOT}/{}/{}",
        exercise.metadata.root_path,
        exercise.metadata.root_folder_name()
    )
}
