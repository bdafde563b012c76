//! Labforge Engine - specification-driven materialization
//!
//! Turns a normalized [`labforge_spec::Exercise`] into folders, VMs and
//! networks on a [`labforge_platform::Platform`], in two phases:
//! - **mastering**: one master per distinct service, wired to the base networks
//! - **deployment**: every folder and service multiplied by its instance
//!   count, cloned from the promoted masters, wired to per-instance networks
//!
//! Promotion of masters to templates sits between the two and is enforced
//! by the [`Phase`] state machine.
//!
//! # Example
//!
//! ```rust,ignore
//! use labforge_engine::{EngineSettings, Materializer};
//!
//! let mut run = Materializer::new(platform, exercise, EngineSettings::new("Templates"));
//! run.create_masters().await?;
//! let report = run.deploy_environment().await?;
//! println!("{report}");
//! ```

#![warn(unreachable_pub)]

pub mod cleanup;
pub mod context;
pub mod deploy;
pub mod error;
pub mod instances;
pub mod master;
pub mod materializer;
pub mod naming;
pub mod network;
pub mod nics;
pub mod path;
pub mod phase;
pub mod promote;
pub mod registry;
pub mod report;
pub mod settings;
pub mod threshold;
pub mod tree;
pub mod vlan;

pub use cleanup::{cleanup, CleanupOptions};
pub use context::MaterializationContext;
pub use deploy::Deployer;
pub use error::{EngineError, LookupKind};
pub use instances::{resolve_instances, Resolved};
pub use master::{MasterBuilder, MASTERING_SNAPSHOT};
pub use materializer::Materializer;
pub use naming::{
    folder_instance_name, generic_network_name, master_name, pad, pad_to, service_instance_name, MASTER_FOLDER_NAME,
    MASTER_PREFIX,
};
pub use network::{BaseNetwork, NetworkResolver};
pub use phase::{allowed_transitions, validate_transition, Phase, PhaseError};
pub use promote::{promote_tree, EXERCISE_SNAPSHOT};
pub use registry::MasterRegistry;
pub use report::{EntityFailure, RunReport};
pub use settings::EngineSettings;
pub use threshold::{ThresholdExceeded, ThresholdGuard, Verdict};
pub use tree::render_tree;
pub use vlan::{VlanAllocator, VLAN_RANGE};
