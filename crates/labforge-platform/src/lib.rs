//! Labforge Platform - capabilities of a materialization target
//!
//! The engine depends on a target platform only through:
//! - [`FolderOps`], [`VmOps`] and [`NetworkOps`], combined as [`Platform`]
//! - opaque handles ([`FolderRef`], [`VmRef`]) and value types
//! - [`PlatformTask`], waited on with [`wait_for_task`]
//!
//! [`sim::SimPlatform`] implements every capability over an in-memory
//! inventory and backs both the test suites and the CLI.

#![warn(unreachable_pub)]

pub mod error;
pub mod handle;
pub mod ops;
pub mod sim;
pub mod task;

pub use error::PlatformError;
pub use handle::{Entity, FolderRef, NicInfo, NicModel, Placement, PortGroupSpec, PowerState, VmInfo, VmRef};
pub use ops::{FolderOps, NetworkOps, Platform, VmOps};
pub use sim::{SimFaults, SimOp, SimPlatform, SimVm};
pub use task::{wait_for_task, CancelFlag, PlatformTask, TaskOutput, TaskState, WaitPolicy};
