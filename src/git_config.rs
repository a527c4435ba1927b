use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use tracing::debug;

use crate::core::traits::{ConfigScope, ConfigStore};
use crate::error::{ResolveError, ResolveResult};

// Static regex patterns compiled once using OnceLock
static SECTION_REGEX: OnceLock<Regex> = OnceLock::new();
static PATH_KEY_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_section_regex() -> &'static Regex {
    SECTION_REGEX.get_or_init(|| {
        Regex::new(r#"^\s*\[\s*([A-Za-z0-9.-]+)(?:\s+"((?:[^"\\]|\\.)*)")?\s*\]"#)
            .expect("Failed to compile section regex")
    })
}

fn get_path_key_regex() -> &'static Regex {
    PATH_KEY_REGEX.get_or_init(|| {
        Regex::new(r"(?i)^\s*path\s*=\s*(.*?)\s*$").expect("Failed to compile path key regex")
    })
}

/// Reads git configuration through `git config`.
#[derive(Debug, Clone)]
pub struct GitConfigStore {
    git_command: String,
    working_dir: PathBuf,
    global_file: Option<PathBuf>,
}

impl GitConfigStore {
    pub fn new(git_command: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            git_command: git_command.into(),
            working_dir: working_dir.into(),
            global_file: None,
        }
    }

    /// Reads the global scope from `path` instead of the user's global config.
    pub fn with_global_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_file = Some(path.into());
        self
    }
}

impl ConfigStore for GitConfigStore {
    fn get(&self, scope: ConfigScope, key: &str) -> ResolveResult<Option<String>> {
        let mut cmd = Command::new(&self.git_command);
        cmd.current_dir(&self.working_dir).arg("config");
        match (scope, &self.global_file) {
            (ConfigScope::Global, Some(file)) => {
                cmd.arg("--file").arg(file);
            }
            _ => {
                cmd.arg(scope.flag());
            }
        }
        cmd.args(["--get", key]);

        let command = format!("{} config {} --get {}", self.git_command, scope.flag(), key);
        let output = cmd.output().map_err(|e| ResolveError::BackendCommandFailed {
            command: command.clone(),
            exit_code: None,
            stderr: e.to_string(),
        })?;

        match output.status.code() {
            Some(0) => {
                let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
                debug!(key, scope = ?scope, value = %value, "read git config");
                Ok(Some(value))
            }
            // Exit status 1 means the key is not set
            Some(1) => Ok(None),
            code => Err(ResolveError::BackendCommandFailed {
                command,
                exit_code: code,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }
}

/// Submodule paths registered in a working tree's `.gitmodules`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmoduleRegistry {
    paths: Vec<String>,
}

impl SubmoduleRegistry {
    /// Loads `<working_dir>/.gitmodules`. A missing file is an empty registry.
    pub fn load(working_dir: &Path) -> io::Result<Self> {
        match fs::read_to_string(working_dir.join(".gitmodules")) {
            Ok(contents) => Ok(Self::parse(&contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Collects the `path` key of every `[submodule "..."]` section.
    pub fn parse(contents: &str) -> Self {
        let mut paths = Vec::new();
        let mut in_submodule = false;

        for line in contents.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }
            if let Some(captures) = get_section_regex().captures(line) {
                in_submodule = captures
                    .get(1)
                    .is_some_and(|m| m.as_str().eq_ignore_ascii_case("submodule"));
                continue;
            }
            if in_submodule && let Some(captures) = get_path_key_regex().captures(line) {
                let value = captures.get(1).map_or("", |m| m.as_str());
                let value = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value)
                    .trim();
                if !value.is_empty() {
                    paths.push(value.to_string());
                }
            }
        }

        Self { paths }
    }

    /// Returns true if `path` exactly matches a registered submodule path.
    pub fn contains(&self, path: &str) -> bool {
        let path = path.trim();
        self.paths.iter().any(|p| p == path)
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}
