//! Unified error handling for the resolvers library.
//!
//! This module provides the error hierarchy using `thiserror` so callers can
//! react to specific failures (for example, telling the user to configure a
//! merge tool) instead of matching on message text.
//!
//! ## Error Categories
//!
//! - [`ResolveError`]: Errors raised while classifying or resolving a conflict
//! - [`ConfigError`]: Errors from loading the application configuration file
//!
//! ## Example
//!
//! ```rust,no_run
//! use resolvers::error::{ResolveError, ResolveResult};
//!
//! fn example() -> ResolveResult<()> {
//!     Err(ResolveError::NoMergeToolConfigured)
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

use crate::core::operations::classify::Side;

/// The main error type for conflict resolution.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The backend reports no unmerged index entries for the path.
    #[error("'{path}' is not in a conflicted state")]
    NotAConflict {
        /// Repository-relative path that was requested.
        path: String,
    },

    /// Neither the local nor the global configuration names a merge tool.
    #[error(
        "There is no merge tool configured. Set one with 'git config merge.tool <name>' and try again"
    )]
    NoMergeToolConfigured,

    /// A merge tool is named but its command or executable cannot be determined.
    #[error("Merge tool '{tool}' is not fully configured: {message}")]
    IncompleteMergeToolConfig {
        /// The configured tool name.
        tool: String,
        /// What is missing.
        message: String,
    },

    /// A version-control command exited unsuccessfully.
    #[error("Git command failed: {command} (exit code {exit_code:?}): {stderr}")]
    BackendCommandFailed {
        /// The command line that was run.
        command: String,
        /// Exit code, if the process exited normally.
        exit_code: Option<i32>,
        /// Standard error output, verbatim.
        stderr: String,
    },

    /// The conflict's stage combination matches no resolvable shape.
    ///
    /// The engine logs this as a diagnostic and hands the path to
    /// `git mergetool`; it is not returned from a resolution.
    #[error("Conflict stages for '{path}' do not match any resolvable shape")]
    InvariantViolation {
        /// Repository-relative path of the conflict.
        path: String,
    },

    /// The requested side does not exist for this conflict.
    #[error("'{path}' has no {side} version")]
    SideNotPresent {
        /// Repository-relative path of the conflict.
        path: String,
        /// The side that was requested.
        side: Side,
    },

    /// The merge tool process could not be started.
    #[error("Failed to launch '{program}': {message}")]
    ToolLaunchFailed {
        /// Executable that was launched.
        program: String,
        /// Launch error.
        message: String,
    },

    /// The merge tool did not exit within the configured timeout.
    #[error("'{program}' did not exit within {seconds} seconds")]
    ToolTimedOut {
        /// Executable that was launched.
        program: String,
        /// Configured timeout.
        seconds: u64,
    },

    /// Reading a confirmation from the user failed.
    #[error("Failed to read user input: {0}")]
    Prompt(String),

    /// An I/O error occurred while materializing or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The application configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ResolveError {
    /// Returns true for errors caused by merge tool configuration.
    pub fn is_tool_config(&self) -> bool {
        matches!(
            self,
            ResolveError::NoMergeToolConfigured | ResolveError::IncompleteMergeToolConfig { .. }
        )
    }
}

/// Errors that can occur during configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file at {path}: {message}")]
    FileReadError {
        /// Path to the config file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Failed to parse the configuration file.
    #[error("Failed to parse config file at {path}: {message}")]
    ParseError {
        /// Path to the config file.
        path: PathBuf,
        /// Parse error message.
        message: String,
    },

    /// An invalid value was provided for a configuration field.
    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        /// Name of the field with invalid value.
        field: String,
        /// Description of why the value is invalid.
        message: String,
    },

    /// Failed to create config directory.
    #[error("Failed to create config directory at {path}: {message}")]
    DirectoryCreationError {
        /// Path where directory creation failed.
        path: PathBuf,
        /// Error message.
        message: String,
    },
}

/// Type alias for Results using ResolveError.
///
/// Note: This is not re-exported from the crate root to avoid shadowing `anyhow::Result`.
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;
