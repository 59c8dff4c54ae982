//! Provenance command-line support
//!
//! Project configuration, the git-backed revision source and text
//! rendering used by the `prov` binary.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cli;
pub mod config;
pub mod git;
pub mod project;
pub mod render;

pub use config::{ConfigError, ProvConfig};
pub use git::GitRevisionSource;
pub use project::Project;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
