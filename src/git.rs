use std::{
    path::{Component, Path, PathBuf},
    process::{Command, Output},
};
use tracing::debug;

use crate::core::operations::classify::Side;
use crate::core::traits::{BlobRef, ConflictTriple, OperationKind, VcsBackend};
use crate::error::{ResolveError, ResolveResult};

/// A git working tree driven through the `git` executable.
#[derive(Debug, Clone)]
pub struct GitRepository {
    git_command: String,
    work_dir: PathBuf,
}

impl GitRepository {
    /// Opens the working tree containing `path`.
    pub fn open(git_command: impl Into<String>, path: &Path) -> ResolveResult<Self> {
        let git_command = git_command.into();
        let probe = Self {
            git_command,
            work_dir: path.to_path_buf(),
        };
        let stdout = probe.run_checked(&["rev-parse", "--show-toplevel"])?;
        let toplevel = String::from_utf8_lossy(&stdout).trim().to_string();
        debug!(toplevel = %toplevel, "opened repository");

        Ok(Self {
            git_command: probe.git_command,
            work_dir: PathBuf::from(toplevel),
        })
    }

    pub fn git_command(&self) -> &str {
        &self.git_command
    }

    fn describe(&self, args: &[&str]) -> String {
        format!("{} {}", self.git_command, args.join(" "))
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.git_command);
        cmd.current_dir(&self.work_dir).args(args);
        cmd
    }

    fn run(&self, args: &[&str]) -> ResolveResult<Output> {
        debug!(command = %self.describe(args), "running git");
        self.command(args)
            .output()
            .map_err(|e| ResolveError::BackendCommandFailed {
                command: self.describe(args),
                exit_code: None,
                stderr: e.to_string(),
            })
    }

    fn run_checked(&self, args: &[&str]) -> ResolveResult<Vec<u8>> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(ResolveError::BackendCommandFailed {
                command: self.describe(args),
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// Runs git attached to the terminal, for commands that prompt or open an editor.
    fn run_interactive(&self, args: &[&str]) -> ResolveResult<()> {
        debug!(command = %self.describe(args), "running interactive git");
        let status = self
            .command(args)
            .status()
            .map_err(|e| ResolveError::BackendCommandFailed {
                command: self.describe(args),
                exit_code: None,
                stderr: e.to_string(),
            })?;
        if !status.success() {
            return Err(ResolveError::BackendCommandFailed {
                command: self.describe(args),
                exit_code: status.code(),
                stderr: String::new(),
            });
        }
        Ok(())
    }

    /// Returns true if the named file under the git directory exists.
    fn git_path_exists(&self, name: &str) -> ResolveResult<bool> {
        let stdout = self.run_checked(&["rev-parse", "--git-path", name])?;
        let relative = String::from_utf8_lossy(&stdout).trim().to_string();
        Ok(self.work_dir.join(relative).exists())
    }

    /// Turns a path typed in `cwd` into the repository-relative form git
    /// reports for conflicts.
    ///
    /// Arguments are left as given when `cwd` lies outside the working tree,
    /// so `-C <repo>` invocations keep naming paths from the top level.
    pub fn repo_relative(&self, cwd: &Path, arg: &str) -> String {
        let root = self
            .work_dir
            .canonicalize()
            .unwrap_or_else(|_| self.work_dir.clone());
        let cwd = cwd.canonicalize().unwrap_or_else(|_| cwd.to_path_buf());
        if !cwd.starts_with(&root) {
            return arg.to_string();
        }

        let mut joined = PathBuf::new();
        for component in cwd.join(arg).components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    joined.pop();
                }
                other => joined.push(other),
            }
        }

        match joined.strip_prefix(&root) {
            Ok(relative) if relative.as_os_str().is_empty() => ".".to_string(),
            Ok(relative) => relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => arg.to_string(),
        }
    }
}

/// Parses `git ls-files -u -z` output into one triple per path.
///
/// Records are `<mode> SP <object> SP <stage> TAB <path>` separated by NUL.
/// Paths keep the order in which they first appear.
pub fn parse_unmerged(output: &[u8]) -> Vec<ConflictTriple> {
    let mut triples: Vec<ConflictTriple> = Vec::new();

    for record in output.split(|b| *b == 0) {
        if record.is_empty() {
            continue;
        }
        let record = String::from_utf8_lossy(record);
        let Some((meta, path)) = record.split_once('\t') else {
            continue;
        };
        let mut fields = meta.split_whitespace();
        let (Some(mode), Some(object), Some(stage)) = (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        let Some(side) = stage.parse::<u8>().ok().and_then(Side::from_stage_number) else {
            continue;
        };

        let index = match triples.iter().position(|t| t.path == path) {
            Some(index) => index,
            None => {
                triples.push(ConflictTriple::new(path));
                triples.len() - 1
            }
        };
        *triples[index].stage_mut(side) = Some(BlobRef::new(mode, object));
    }

    triples
}

impl VcsBackend for GitRepository {
    fn working_dir(&self) -> &Path {
        &self.work_dir
    }

    fn conflicted_files(&self, filter: Option<&str>) -> ResolveResult<Vec<ConflictTriple>> {
        let mut args = vec!["ls-files", "-u", "-z"];
        if let Some(filter) = filter {
            args.extend(["--", filter]);
        }
        let stdout = self.run_checked(&args)?;
        Ok(parse_unmerged(&stdout))
    }

    fn read_blob(&self, blob: &BlobRef) -> ResolveResult<Vec<u8>> {
        self.run_checked(&["cat-file", "blob", &blob.object])
    }

    fn is_in_rebase(&self) -> ResolveResult<bool> {
        if self.git_path_exists("rebase-merge")? {
            return Ok(true);
        }
        Ok(self.git_path_exists("rebase-apply")? && !self.is_in_patch_apply()?)
    }

    fn is_in_merge(&self) -> ResolveResult<bool> {
        self.git_path_exists("MERGE_HEAD")
    }

    fn is_in_patch_apply(&self) -> ResolveResult<bool> {
        self.git_path_exists("rebase-apply/applying")
    }

    fn is_in_cherry_pick(&self) -> ResolveResult<bool> {
        self.git_path_exists("CHERRY_PICK_HEAD")
    }

    fn stage(&self, path: &str) -> ResolveResult<()> {
        self.run_checked(&["add", "--", path]).map(|_| ())
    }

    fn remove(&self, path: &str) -> ResolveResult<()> {
        self.run_checked(&["rm", "--quiet", "--", path]).map(|_| ())
    }

    fn abort(&self, operation: OperationKind) -> ResolveResult<()> {
        self.run_checked(&operation.abort_args()).map(|_| ())
    }

    fn run_mergetool(&self, path: Option<&str>) -> ResolveResult<()> {
        match path {
            Some(path) => self.run_interactive(&["mergetool", "--", path]),
            None => self.run_interactive(&["mergetool"]),
        }
    }

    fn commit(&self) -> ResolveResult<()> {
        self.run_interactive(&["commit"])
    }
}
