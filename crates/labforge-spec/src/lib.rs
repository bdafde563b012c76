//! Labforge Spec - exercise specification model
//!
//! Reads the declarative description of a lab environment:
//! - `metadata`, `groups`, `services`, `networks` and `folders` sections
//! - folder trees normalized into [`FolderNode`] (parent vs. base folders)
//! - instance-count specifications
//! - the infrastructure configuration (thresholds, placement, vswitch)
//!
//! # Example
//!
//! ```rust,ignore
//! use labforge_spec::{Exercise, InfraConfig};
//!
//! let exercise = Exercise::load("exercise.yaml")?;
//! let infra = InfraConfig::load("infra.yaml")?;
//! println!("{} top-level folders", exercise.folders.len());
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod exercise;
pub mod folder;
pub mod infra;
pub mod instances;
pub mod network;
pub mod service;

pub use error::SpecError;
pub use exercise::{Exercise, GroupSpec, Metadata};
pub use folder::{is_reserved_key, Folder, FolderMeta, FolderNode, ServiceInstance, RESERVED_KEYS};
pub use infra::{InfraConfig, ObjectKind, Threshold, Thresholds, VsphereConfig};
pub use instances::InstanceCount;
pub use network::{normalize_network_name, NetworkCatalog, NetworkDef, NetworkKind};
pub use service::{PlatformKind, ResourceConfig, Service, ServiceCatalog, ServiceSource};
