//! Labforge CLI - command-line front end
//!
//! Wires the [`labforge_engine::Materializer`] facade to:
//! - clap subcommands (`check`, `masters`, `deploy`, `cleanup`, `tree`)
//! - a `tracing-subscriber` setup writing to stderr
//! - a simulated platform persisted as JSON between invocations
//! - ctrl-c cancellation at the next wait boundary
//!
//! # Example
//!
//! ```rust,ignore
//! use clap::Parser;
//! use labforge_cli::{run, Cli};
//!
//! let cli = Cli::parse();
//! let output = run(&cli, CancelFlag::new()).await?;
//! println!("{output}");
//! ```

#![warn(unreachable_pub)]

pub mod args;
pub mod backend;
pub mod commands;
pub mod logging;

pub use args::{Cli, Command, LogFormat};
pub use commands::run;
