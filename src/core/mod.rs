//! Core module for conflict resolution.
//!
//! This module provides the foundational abstractions for resolving merge
//! conflicts, including:
//!
//! - Traits for the backend, configuration, process and prompt seams
//! - Core operations (classification, tool resolution, staging)
//! - The resolution engine and session completion logic
//! - Output formatting for different display modes
//! - Exit codes for CLI operations

pub mod operations;
pub mod output;
pub mod runner;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

use crate::error::ResolveError;

/// Exit codes for the command-line front end.
///
/// These codes are designed for consumption by scripts and editor
/// integrations, providing clear semantics for different outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// All operations completed successfully.
    Success = 0,

    /// General error (configuration, git, I/O, etc.).
    GeneralError = 1,

    /// Conflicted paths remain after the command finished.
    ConflictsRemain = 2,

    /// No merge tool is configured, or its configuration is incomplete.
    NoMergeTool = 3,

    /// The requested path is not conflicted.
    NotAConflict = 4,
}

impl ExitCode {
    /// Returns the numeric exit code value.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Returns a human-readable description of the exit code.
    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "All operations completed successfully",
            ExitCode::GeneralError => "General error occurred",
            ExitCode::ConflictsRemain => "Unresolved conflicts remain",
            ExitCode::NoMergeTool => "No usable merge tool is configured",
            ExitCode::NotAConflict => "The requested path is not in a conflicted state",
        }
    }

    /// Maps a library error to the exit code reported for it.
    pub fn for_error(error: &ResolveError) -> Self {
        match error {
            ResolveError::NoMergeToolConfigured
            | ResolveError::IncompleteMergeToolConfig { .. } => ExitCode::NoMergeTool,
            ResolveError::NotAConflict { .. } => ExitCode::NotAConflict,
            _ => ExitCode::GeneralError,
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.code())
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
