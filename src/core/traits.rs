//! Traits for the collaborators the resolution engine depends on.
//!
//! These traits abstract the version-control backend, the configuration
//! store, the process launcher and the presentation layer to enable:
//! - Mocking for unit tests
//! - Alternative implementations
//! - Running the engine without a terminal

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;

use crate::core::operations::classify::Side;
use crate::error::ResolveResult;

/// Scope of a configuration lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigScope {
    /// Repository-local configuration (`.git/config`).
    Local,
    /// User-wide configuration (`~/.gitconfig`).
    Global,
}

impl ConfigScope {
    /// Returns the `git config` flag selecting this scope.
    pub fn flag(&self) -> &'static str {
        match self {
            ConfigScope::Local => "--local",
            ConfigScope::Global => "--global",
        }
    }
}

/// A multi-step operation that can leave the working tree conflicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Merge,
    Rebase,
    CherryPick,
    PatchApply,
}

impl OperationKind {
    /// Arguments that abort this operation.
    pub fn abort_args(&self) -> [&'static str; 2] {
        match self {
            OperationKind::Merge => ["merge", "--abort"],
            OperationKind::Rebase => ["rebase", "--abort"],
            OperationKind::CherryPick => ["cherry-pick", "--abort"],
            OperationKind::PatchApply => ["am", "--abort"],
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Merge => write!(f, "merge"),
            OperationKind::Rebase => write!(f, "rebase"),
            OperationKind::CherryPick => write!(f, "cherry-pick"),
            OperationKind::PatchApply => write!(f, "patch apply"),
        }
    }
}

/// One unmerged index entry (a single stage of a conflicted path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    /// File mode as reported by the index, e.g. `100644`.
    pub mode: String,
    /// Object id of the blob.
    pub object: String,
}

impl BlobRef {
    pub fn new(mode: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            object: object.into(),
        }
    }

    /// Returns true if this entry records a submodule commit.
    pub fn is_gitlink(&self) -> bool {
        self.mode == "160000"
    }
}

/// The base/local/remote index stages of one conflicted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictTriple {
    /// Repository-relative path.
    pub path: String,
    /// Stage 1, the common ancestor.
    pub base: Option<BlobRef>,
    /// Stage 2, the checked-out side.
    pub local: Option<BlobRef>,
    /// Stage 3, the side being merged in.
    pub remote: Option<BlobRef>,
}

impl ConflictTriple {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            base: None,
            local: None,
            remote: None,
        }
    }

    /// Returns the blob for a side, if that stage exists.
    pub fn stage(&self, side: Side) -> Option<&BlobRef> {
        match side {
            Side::Base => self.base.as_ref(),
            Side::Local => self.local.as_ref(),
            Side::Remote => self.remote.as_ref(),
        }
    }

    /// Mutable access to the slot for a side.
    pub fn stage_mut(&mut self, side: Side) -> &mut Option<BlobRef> {
        match side {
            Side::Base => &mut self.base,
            Side::Local => &mut self.local,
            Side::Remote => &mut self.remote,
        }
    }
}

/// Version-control operations needed to resolve conflicts.
pub trait VcsBackend {
    /// Root of the working tree. Conflict paths are relative to it.
    fn working_dir(&self) -> &Path;

    /// Lists conflicted paths in index order, optionally limited to a pathspec.
    fn conflicted_files(&self, filter: Option<&str>) -> ResolveResult<Vec<ConflictTriple>>;

    /// Reads the contents of a stage blob.
    fn read_blob(&self, blob: &BlobRef) -> ResolveResult<Vec<u8>>;

    /// Writes a stage blob to `dest`.
    fn write_blob(&self, blob: &BlobRef, dest: &Path) -> ResolveResult<()> {
        let contents = self.read_blob(blob)?;
        std::fs::write(dest, contents)?;
        Ok(())
    }

    /// Overwrites the working-tree file at `path` with the given stage.
    fn checkout_stage(&self, path: &str, blob: &BlobRef) -> ResolveResult<()> {
        let dest = self.working_dir().join(path);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.write_blob(blob, &dest)
    }

    fn is_in_rebase(&self) -> ResolveResult<bool>;
    fn is_in_merge(&self) -> ResolveResult<bool>;
    fn is_in_patch_apply(&self) -> ResolveResult<bool>;
    fn is_in_cherry_pick(&self) -> ResolveResult<bool>;

    /// The operation currently in progress, if any.
    ///
    /// Patch application is checked before rebase because `git am` keeps its
    /// state in the same directory as the apply-based rebase backend.
    fn operation_in_progress(&self) -> ResolveResult<Option<OperationKind>> {
        if self.is_in_patch_apply()? {
            return Ok(Some(OperationKind::PatchApply));
        }
        if self.is_in_rebase()? {
            return Ok(Some(OperationKind::Rebase));
        }
        if self.is_in_cherry_pick()? {
            return Ok(Some(OperationKind::CherryPick));
        }
        if self.is_in_merge()? {
            return Ok(Some(OperationKind::Merge));
        }
        Ok(None)
    }

    /// Marks `path` as resolved by adding it to the index.
    fn stage(&self, path: &str) -> ResolveResult<()>;

    /// Removes `path` from the index and working tree.
    fn remove(&self, path: &str) -> ResolveResult<()>;

    /// Aborts the given in-progress operation.
    fn abort(&self, operation: OperationKind) -> ResolveResult<()>;

    /// Runs the backend's own interactive merge tool driver.
    fn run_mergetool(&self, path: Option<&str>) -> ResolveResult<()>;

    /// Starts an interactive commit.
    fn commit(&self) -> ResolveResult<()>;
}

/// Scoped key-value configuration.
pub trait ConfigStore {
    /// Reads `key` from a single scope. Absent keys are `Ok(None)`.
    fn get(&self, scope: ConfigScope, key: &str) -> ResolveResult<Option<String>>;

    /// Reads `key` from the local scope, falling back to global when the local
    /// value is absent or empty.
    fn get_effective(&self, key: &str) -> ResolveResult<Option<String>> {
        for scope in [ConfigScope::Local, ConfigScope::Global] {
            if let Some(value) = self.get(scope, key)?
                && !value.trim().is_empty()
            {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

/// How a launched process's standard streams are connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StdioMode {
    /// Capture stdout and stderr.
    #[default]
    Capture,
    /// Share the terminal with the launched process.
    Inherit,
}

/// A request to run an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub stdio: StdioMode,
}

impl LaunchRequest {
    /// Renders the command line for logs and messages.
    pub fn display_command(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                line.push('"');
                line.push_str(arg);
                line.push('"');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// Exit status and captured output of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    /// Exit code, `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external programs to completion.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Runs the program and waits for it to exit.
    ///
    /// Dropping the returned future before completion terminates the child.
    async fn run(&self, request: &LaunchRequest) -> ResolveResult<ProcessOutput>;
}

/// A yes/no question asked during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Checkpoint {
    /// The conflict is a submodule; stage it as-is?
    MarkSubmoduleResolved { path: String },
    /// The file looks binary; open it in the merge tool anyway?
    OpenBinary { path: String, tool: String },
    /// The merge tool exited; is the conflict solved?
    ConflictSolved { path: String },
    /// All conflicts are resolved; commit now?
    CommitNow,
}

impl Checkpoint {
    /// Question shown to the user.
    pub fn message(&self) -> String {
        match self {
            Checkpoint::MarkSubmoduleResolved { path } => format!(
                "The selected merge conflict '{}' is a submodule. Mark conflict as resolved?",
                path
            ),
            Checkpoint::OpenBinary { path, tool } => format!(
                "'{}' appears to be a binary file. Are you sure you want to open it in {}?",
                path, tool
            ),
            Checkpoint::ConflictSolved { path } => {
                format!("Is the merge conflict in '{}' solved?", path)
            }
            Checkpoint::CommitNow => {
                "All merge conflicts are resolved, you can commit. Do you want to commit now?"
                    .to_string()
            }
        }
    }

    /// Answer used when the user just presses enter.
    pub fn default_answer(&self) -> bool {
        !matches!(self, Checkpoint::OpenBinary { .. })
    }
}

/// Which flavour of one-sided conflict is being decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurvivorKind {
    /// One side modified the file, the other deleted it.
    Modified,
    /// One side created the file, the other has no version of it.
    Created,
}

impl SurvivorKind {
    pub fn question(&self) -> &'static str {
        match self {
            SurvivorKind::Modified => "Use modified or deleted file?",
            SurvivorKind::Created => "Use created or deleted file?",
        }
    }

    pub fn keep_label(&self) -> &'static str {
        match self {
            SurvivorKind::Modified => "Modified",
            SurvivorKind::Created => "Created",
        }
    }
}

/// The user's answer to a modify/delete or create/delete conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionChoice {
    /// Keep the surviving version.
    UseSurviving,
    /// Accept the deletion.
    Delete,
    /// Leave the conflict untouched.
    Abort,
}

/// Presentation-layer hooks for the engine's confirmation checkpoints.
pub trait Prompter {
    /// Asks a yes/no question.
    fn confirm(&self, checkpoint: &Checkpoint) -> ResolveResult<bool>;

    /// Asks how to settle a conflict where one side no longer has the file.
    fn choose_survivor(
        &self,
        path: &str,
        kind: SurvivorKind,
        surviving: Side,
    ) -> ResolveResult<DeletionChoice>;
}
