//! Configuration management for resolvers.
//!
//! This module handles loading configuration from multiple sources:
//! - TOML configuration files following XDG Base Directory specification
//! - Environment variables
//! - Command line arguments (see [`crate::models`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use resolvers::Config;
//!
//! // Load configuration from file, with fallback to defaults
//! let config = Config::load_from_file().unwrap();
//!
//! // Load from environment variables
//! let env_config = Config::load_from_env();
//!
//! // Merge configurations (env takes precedence)
//! let merged = Config::default().merge(config).merge(env_config);
//! println!("Git command: {}", merged.resolve().unwrap().git_command);
//! ```

use crate::error::ConfigError;
use crate::parsed_property::ParsedProperty;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Temporary struct for deserializing TOML configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    pub git_command: Option<String>,
    pub merge_tool: Option<String>,
    pub tool_timeout_secs: Option<u64>,
    pub capture_tool_output: Option<bool>,
    pub offer_commit: Option<bool>,
    pub repo_aliases: Option<HashMap<String, String>>,
}

/// Application configuration assembled from CLI arguments, environment variables, config file, and defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Executable used for git commands.
    pub git_command: Option<ParsedProperty<String>>,
    /// Merge tool name used instead of git's `merge.tool`.
    pub merge_tool: Option<ParsedProperty<String>>,
    /// Seconds a merge tool may run before it is terminated.
    pub tool_timeout_secs: Option<ParsedProperty<u64>>,
    /// Capture the tool's output instead of sharing the terminal.
    pub capture_tool_output: Option<ParsedProperty<bool>>,
    /// Offer to commit once all conflicts are resolved.
    pub offer_commit: Option<ParsedProperty<bool>>,
    /// Repository aliases (e.g., "api" -> "/path/to/api-backend")
    pub repo_aliases: Option<ParsedProperty<HashMap<String, String>>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            git_command: Some(ParsedProperty::Default("git".to_string())),
            merge_tool: None,
            tool_timeout_secs: None,
            capture_tool_output: Some(ParsedProperty::Default(true)),
            offer_commit: Some(ParsedProperty::Default(true)),
            repo_aliases: None,
        }
    }
}

/// Final configuration values used by the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub git_command: String,
    pub merge_tool: Option<String>,
    pub tool_timeout: Option<Duration>,
    pub capture_tool_output: bool,
    pub offer_commit: bool,
    pub repo_aliases: HashMap<String, String>,
}

impl Config {
    /// A config with every field unset.
    pub fn empty() -> Self {
        Self {
            git_command: None,
            merge_tool: None,
            tool_timeout_secs: None,
            capture_tool_output: None,
            offer_commit: None,
            repo_aliases: None,
        }
    }

    /// Load configuration from XDG config directory
    #[must_use = "this returns the loaded configuration which should be used"]
    pub fn load_from_file() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            return Ok(Self::empty());
        }

        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_path(config_path: &Path) -> Result<Self, ConfigError> {
        let config_content =
            fs::read_to_string(config_path).map_err(|e| ConfigError::FileReadError {
                path: config_path.to_path_buf(),
                message: e.to_string(),
            })?;

        let config_file: ConfigFile =
            toml::from_str(&config_content).map_err(|e| ConfigError::ParseError {
                path: config_path.to_path_buf(),
                message: e.to_string(),
            })?;

        let path = config_path.to_path_buf();
        Ok(Self {
            git_command: config_file
                .git_command
                .map(|v| ParsedProperty::File(v.clone(), path.clone(), v)),
            merge_tool: config_file
                .merge_tool
                .map(|v| ParsedProperty::File(v.clone(), path.clone(), v)),
            tool_timeout_secs: config_file
                .tool_timeout_secs
                .map(|v| ParsedProperty::File(v, path.clone(), v.to_string())),
            capture_tool_output: config_file
                .capture_tool_output
                .map(|v| ParsedProperty::File(v, path.clone(), v.to_string())),
            offer_commit: config_file
                .offer_commit
                .map(|v| ParsedProperty::File(v, path.clone(), v.to_string())),
            repo_aliases: config_file
                .repo_aliases
                .map(|v| ParsedProperty::File(v.clone(), path.clone(), format!("{:?}", v))),
        })
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Self {
        Self {
            git_command: std::env::var("RESOLVERS_GIT_COMMAND")
                .ok()
                .map(|v| ParsedProperty::Env(v.clone(), v)),
            merge_tool: std::env::var("RESOLVERS_MERGE_TOOL")
                .ok()
                .map(|v| ParsedProperty::Env(v.clone(), v)),
            tool_timeout_secs: std::env::var("RESOLVERS_TOOL_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok().map(|v| ParsedProperty::Env(v, s))),
            capture_tool_output: std::env::var("RESOLVERS_CAPTURE_TOOL_OUTPUT")
                .ok()
                .and_then(|s| {
                    s.parse::<bool>()
                        .ok()
                        .map(|v| ParsedProperty::Env(v, s.clone()))
                }),
            offer_commit: std::env::var("RESOLVERS_OFFER_COMMIT").ok().and_then(|s| {
                s.parse::<bool>()
                    .ok()
                    .map(|v| ParsedProperty::Env(v, s.clone()))
            }),
            // repo_aliases is configured via file only, not environment variables
            repo_aliases: None,
        }
    }

    /// Get the XDG config file path for resolvers
    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        // Use XDG_CONFIG_HOME if set, otherwise ~/.config
        let config_dir = match std::env::var("XDG_CONFIG_HOME") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir()
                .ok_or_else(|| ConfigError::InvalidValue {
                    field: "XDG_CONFIG_HOME".to_string(),
                    message: "not set and the home directory could not be determined"
                        .to_string(),
                })?
                .join(".config"),
        };

        Ok(config_dir.join("resolvers").join("config.toml"))
    }

    /// Merge this config with another, preferring values from other when they exist
    pub fn merge(self, other: Self) -> Self {
        Self {
            git_command: other.git_command.or(self.git_command),
            merge_tool: other.merge_tool.or(self.merge_tool),
            tool_timeout_secs: other.tool_timeout_secs.or(self.tool_timeout_secs),
            capture_tool_output: other.capture_tool_output.or(self.capture_tool_output),
            offer_commit: other.offer_commit.or(self.offer_commit),
            repo_aliases: other.repo_aliases.or(self.repo_aliases),
        }
    }

    /// Validate and flatten into the values the application uses
    pub fn resolve(self) -> Result<ResolvedConfig, ConfigError> {
        let git_command = self
            .git_command
            .map(ParsedProperty::into_value)
            .unwrap_or_else(|| "git".to_string());
        if git_command.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "git_command".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let tool_timeout = match self.tool_timeout_secs {
            Some(prop) if *prop.value() == 0 => {
                return Err(ConfigError::InvalidValue {
                    field: "tool_timeout_secs".to_string(),
                    message: format!(
                        "must be a positive number of seconds (from {})",
                        prop.origin()
                    ),
                });
            }
            Some(prop) => Some(Duration::from_secs(prop.into_value())),
            None => None,
        };

        Ok(ResolvedConfig {
            git_command,
            merge_tool: self
                .merge_tool
                .map(ParsedProperty::into_value)
                .filter(|tool| !tool.trim().is_empty()),
            tool_timeout,
            capture_tool_output: self
                .capture_tool_output
                .map(ParsedProperty::into_value)
                .unwrap_or(true),
            offer_commit: self
                .offer_commit
                .map(ParsedProperty::into_value)
                .unwrap_or(true),
            repo_aliases: self
                .repo_aliases
                .map(ParsedProperty::into_value)
                .unwrap_or_default(),
        })
    }

    /// Create a sample config file for user reference
    ///
    /// Returns the path written, or `None` when a config file already exists.
    #[must_use = "this operation can fail and the result should be checked"]
    pub fn create_sample_config() -> Result<Option<PathBuf>> {
        let config_path = Self::get_config_path()?;

        // Don't overwrite existing config
        if config_path.exists() {
            return Ok(None);
        }

        if let Some(config_dir) = config_path.parent() {
            fs::create_dir_all(config_dir).map_err(|e| ConfigError::DirectoryCreationError {
                path: config_dir.to_path_buf(),
                message: e.to_string(),
            })?;
        }

        let sample_config = r#"# Resolvers Configuration File
# This file follows the XDG Base Directory specification
# Location: ~/.config/resolvers/config.toml

# Git executable (optional, defaults to "git")
# git_command = "git"

# Merge tool name, overriding git's merge.tool (optional)
# The tool's command and path are still read from mergetool.<name>.cmd/.path
# merge_tool = "kdiff3"

# Seconds a merge tool may run before it is terminated (optional, waits forever by default)
# tool_timeout_secs = 3600

# Capture the merge tool's output (optional, defaults to true)
# Set to false for terminal tools such as vimdiff
capture_tool_output = true

# Offer to commit once all conflicts are resolved (optional, defaults to true)
offer_commit = true

# Repository aliases for quick access
# Maps short names to full paths (usable with --repo)
# [repo_aliases]
# api = "/path/to/api-backend"
# web = "/path/to/web-frontend"
"#;

        fs::write(&config_path, sample_config).with_context(|| {
            format!(
                "Failed to write sample config to: {}",
                config_path.display()
            )
        })?;

        Ok(Some(config_path))
    }
}

/// Resolve repository path from alias or path.
///
/// # Arguments
///
/// * `path_or_alias` - Optional path or alias (e.g., "api", "/path/to/repo")
/// * `aliases` - Map of alias names to paths from config
///
/// # Returns
///
/// Resolved PathBuf to the repository.
pub fn resolve_repo_path(
    path_or_alias: Option<&str>,
    aliases: &HashMap<String, String>,
) -> Result<PathBuf> {
    match path_or_alias {
        None => std::env::current_dir().context("Failed to get current directory"),
        Some(input) => {
            if let Some(path) = aliases.get(input) {
                return Ok(PathBuf::from(path));
            }

            let path = PathBuf::from(input);
            if path.exists() {
                Ok(path)
            } else {
                anyhow::bail!(
                    "Path '{}' does not exist. If this is an alias, configure it in ~/.config/resolvers/config.toml under [repo_aliases]",
                    input
                )
            }
        }
    }
}
