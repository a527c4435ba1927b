//! # Resolvers
//!
//! A library for resolving git merge conflicts with an external merge tool.
//! This library provides:
//!
//! - Conflict classification from index stages and materialization of the
//!   BASE, LOCAL and REMOTE sides into temporary files
//! - Merge tool resolution from git configuration with placeholder substitution
//! - A resolution engine that launches the tool, confirms with the user and
//!   stages or deletes the result
//! - Configuration management and logging for the `resolvers` binary
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resolvers::{
//!     ConflictResolutionEngine, DialoguerPrompter, EngineOptions, GitConfigStore,
//!     GitRepository, TokioLauncher, VcsBackend,
//! };
//! use std::path::Path;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = GitRepository::open("git", Path::new("."))?;
//! let config = GitConfigStore::new("git", repo.working_dir());
//! let mut engine = ConflictResolutionEngine::new(
//!     repo,
//!     config,
//!     TokioLauncher::new(),
//!     DialoguerPrompter::new(),
//!     EngineOptions::default(),
//! )?;
//!
//! for (path, outcome) in engine.resolve_all().await? {
//!     println!("{path}: {outcome}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod git;
pub mod git_config;
pub mod logging;
pub mod models;
pub mod parsed_property;
pub mod process;
pub mod prompt;

// Re-export commonly used types for convenience
pub use config::{Config, ResolvedConfig};
pub use crate::core::ExitCode;
pub use crate::core::operations::{ConflictShape, ConflictSideResolver, MergeToolConfig, Side, StagingGateway};
pub use crate::core::runner::{ConflictResolutionEngine, EngineOptions, ResolutionOutcome, SessionCompletion};
pub use crate::core::traits::{ConfigStore, ProcessLauncher, Prompter, VcsBackend};
pub use git::GitRepository;
pub use git_config::GitConfigStore;
pub use models::Args;
pub use process::TokioLauncher;
pub use prompt::DialoguerPrompter;

/// Core result type used throughout the binary
pub type Result<T> = anyhow::Result<T>;

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Short git hash of the build, with `-dirty` for uncommitted changes
pub const GIT_HASH: &str = env!("GIT_HASH");

/// Version string shown by `--version`
pub const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");
