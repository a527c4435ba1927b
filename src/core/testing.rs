//! In-memory implementations of the engine's collaborator traits.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::core::operations::classify::Side;
use crate::core::traits::{
    BlobRef, Checkpoint, ConfigScope, ConfigStore, ConflictTriple, DeletionChoice, LaunchRequest,
    OperationKind, ProcessLauncher, ProcessOutput, Prompter, SurvivorKind, VcsBackend,
};
use crate::error::{ResolveError, ResolveResult};

#[derive(Default)]
struct FakeState {
    conflicts: Vec<ConflictTriple>,
    blobs: HashMap<String, Vec<u8>>,
    blob_reads: usize,
    fail_reads_after: Option<usize>,
    written: Vec<PathBuf>,
    operations: Vec<String>,
    mutation_error: Option<String>,
    mergetool_error: Option<String>,
    operation: Option<OperationKind>,
}

/// A backend whose index lives in memory and whose working tree is a temp dir.
pub struct FakeBackend {
    dir: TempDir,
    state: RefCell<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            state: RefCell::new(FakeState::default()),
        }
    }

    fn blob(&self, content: &[u8]) -> BlobRef {
        let mut state = self.state.borrow_mut();
        let object = format!("{:040x}", state.blobs.len() + 1);
        state.blobs.insert(object.clone(), content.to_vec());
        BlobRef::new("100644", object)
    }

    /// Registers a conflict and writes a plausible working-tree file.
    pub fn add_conflict(
        &self,
        path: &str,
        base: Option<&str>,
        local: Option<&str>,
        remote: Option<&str>,
    ) {
        let mut triple = ConflictTriple::new(path);
        for (side, content) in [(Side::Base, base), (Side::Local, local), (Side::Remote, remote)] {
            if let Some(content) = content {
                *triple.stage_mut(side) = Some(self.blob(content.as_bytes()));
            }
        }

        let worktree = match (local, remote) {
            (Some(l), Some(r)) => Some(format!("<<<<<<< ours\n{l}=======\n{r}>>>>>>> theirs\n")),
            (Some(l), None) => Some(l.to_string()),
            (None, Some(r)) => Some(r.to_string()),
            (None, None) => None,
        };
        if let Some(content) = worktree {
            self.write_worktree(path, content.as_bytes());
        }

        self.state.borrow_mut().conflicts.push(triple);
    }

    /// Registers a conflict whose stages are submodule commits.
    pub fn add_gitlink_conflict(&self, path: &str) {
        let mut triple = ConflictTriple::new(path);
        for (side, commit) in [(Side::Base, "a"), (Side::Local, "b"), (Side::Remote, "c")] {
            *triple.stage_mut(side) = Some(BlobRef::new("160000", commit.repeat(40)));
        }
        self.state.borrow_mut().conflicts.push(triple);
    }

    pub fn write_worktree(&self, path: &str, content: &[u8]) {
        let dest = self.dir.path().join(path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(dest, content).unwrap();
    }

    pub fn set_operation(&self, operation: Option<OperationKind>) {
        self.state.borrow_mut().operation = operation;
    }

    /// Makes every mutating call fail with `stderr`.
    pub fn fail_mutations(&self, stderr: &str) {
        self.state.borrow_mut().mutation_error = Some(stderr.to_string());
    }

    /// Makes `git mergetool` fail with `stderr`, leaving conflicts in place.
    pub fn fail_mergetool(&self, stderr: &str) {
        self.state.borrow_mut().mergetool_error = Some(stderr.to_string());
    }

    /// Makes blob reads fail once `reads` reads have succeeded.
    pub fn fail_blob_reads_after(&self, reads: usize) {
        self.state.borrow_mut().fail_reads_after = Some(reads);
    }

    pub fn conflict_count(&self) -> usize {
        self.state.borrow().conflicts.len()
    }

    pub fn blob_reads(&self) -> usize {
        self.state.borrow().blob_reads
    }

    pub fn written_paths(&self) -> Vec<PathBuf> {
        self.state.borrow().written.clone()
    }

    /// Mutations performed so far, e.g. `add a.txt` or `abort rebase`.
    pub fn operations(&self) -> Vec<String> {
        self.state.borrow().operations.clone()
    }

    fn mutate(&self, command: String, record: String) -> ResolveResult<()> {
        let mut state = self.state.borrow_mut();
        if let Some(stderr) = &state.mutation_error {
            return Err(ResolveError::BackendCommandFailed {
                command,
                exit_code: Some(128),
                stderr: stderr.clone(),
            });
        }
        state.operations.push(record);
        Ok(())
    }

    fn drop_conflict(&self, path: &str) {
        self.state
            .borrow_mut()
            .conflicts
            .retain(|triple| triple.path != path);
    }
}

impl VcsBackend for FakeBackend {
    fn working_dir(&self) -> &Path {
        self.dir.path()
    }

    fn conflicted_files(&self, filter: Option<&str>) -> ResolveResult<Vec<ConflictTriple>> {
        let state = self.state.borrow();
        Ok(state
            .conflicts
            .iter()
            .filter(|triple| match filter {
                Some(filter) => {
                    triple.path == filter || triple.path.starts_with(&format!("{filter}/"))
                }
                None => true,
            })
            .cloned()
            .collect())
    }

    fn read_blob(&self, blob: &BlobRef) -> ResolveResult<Vec<u8>> {
        let mut state = self.state.borrow_mut();
        state.blob_reads += 1;
        if state
            .fail_reads_after
            .is_some_and(|limit| state.blob_reads > limit)
        {
            return Err(ResolveError::BackendCommandFailed {
                command: format!("git cat-file blob {}", blob.object),
                exit_code: Some(128),
                stderr: "fatal: unable to read object".to_string(),
            });
        }
        state
            .blobs
            .get(&blob.object)
            .cloned()
            .ok_or_else(|| ResolveError::BackendCommandFailed {
                command: format!("git cat-file blob {}", blob.object),
                exit_code: Some(128),
                stderr: "fatal: not a valid object name".to_string(),
            })
    }

    fn write_blob(&self, blob: &BlobRef, dest: &Path) -> ResolveResult<()> {
        let contents = self.read_blob(blob)?;
        fs::write(dest, contents)?;
        self.state.borrow_mut().written.push(dest.to_path_buf());
        Ok(())
    }

    fn is_in_rebase(&self) -> ResolveResult<bool> {
        Ok(self.state.borrow().operation == Some(OperationKind::Rebase))
    }

    fn is_in_merge(&self) -> ResolveResult<bool> {
        Ok(self.state.borrow().operation == Some(OperationKind::Merge))
    }

    fn is_in_patch_apply(&self) -> ResolveResult<bool> {
        Ok(self.state.borrow().operation == Some(OperationKind::PatchApply))
    }

    fn is_in_cherry_pick(&self) -> ResolveResult<bool> {
        Ok(self.state.borrow().operation == Some(OperationKind::CherryPick))
    }

    fn stage(&self, path: &str) -> ResolveResult<()> {
        self.mutate(format!("git add -- {path}"), format!("add {path}"))?;
        self.drop_conflict(path);
        Ok(())
    }

    fn remove(&self, path: &str) -> ResolveResult<()> {
        self.mutate(format!("git rm -- {path}"), format!("rm {path}"))?;
        self.drop_conflict(path);
        let full = self.dir.path().join(path);
        if full.is_file() {
            fs::remove_file(full)?;
        }
        Ok(())
    }

    fn abort(&self, operation: OperationKind) -> ResolveResult<()> {
        let [command, flag] = operation.abort_args();
        self.mutate(
            format!("git {command} {flag}"),
            format!("abort {operation}"),
        )?;
        let mut state = self.state.borrow_mut();
        state.operation = None;
        state.conflicts.clear();
        Ok(())
    }

    fn run_mergetool(&self, path: Option<&str>) -> ResolveResult<()> {
        let record = match path {
            Some(path) => format!("mergetool {path}"),
            None => "mergetool".to_string(),
        };
        if let Some(stderr) = self.state.borrow().mergetool_error.clone() {
            return Err(ResolveError::BackendCommandFailed {
                command: "git mergetool".to_string(),
                exit_code: Some(1),
                stderr,
            });
        }
        self.mutate("git mergetool".to_string(), record)?;
        let mut state = self.state.borrow_mut();
        state
            .conflicts
            .retain(|triple| path.is_some_and(|path| triple.path != path));
        Ok(())
    }

    fn commit(&self) -> ResolveResult<()> {
        self.mutate("git commit".to_string(), "commit".to_string())
    }
}

/// Configuration held in a map, counting lookups.
#[derive(Default)]
pub struct FakeConfigStore {
    values: HashMap<(ConfigScope, String), String>,
    lookups: Cell<usize>,
}

impl FakeConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, scope: ConfigScope, key: &str, value: &str) -> Self {
        self.values
            .insert((scope, key.to_string()), value.to_string());
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.get()
    }
}

impl ConfigStore for FakeConfigStore {
    fn get(&self, scope: ConfigScope, key: &str) -> ResolveResult<Option<String>> {
        self.lookups.set(self.lookups.get() + 1);
        Ok(self.values.get(&(scope, key.to_string())).cloned())
    }
}

#[derive(Default)]
struct LaunchLog {
    requests: Vec<LaunchRequest>,
    observed: Vec<PathBuf>,
}

enum LaunchBehavior {
    Exit(i32),
    FailToLaunch(String),
    TimeOut(u64),
}

/// A launcher that records requests instead of starting processes.
pub struct FakeLauncher {
    behavior: LaunchBehavior,
    merged_write: Option<(String, String)>,
    log: Mutex<LaunchLog>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self {
            behavior: LaunchBehavior::Exit(0),
            merged_write: None,
            log: Mutex::new(LaunchLog::default()),
        }
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.behavior = LaunchBehavior::Exit(code);
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.behavior = LaunchBehavior::FailToLaunch(message.to_string());
        self
    }

    pub fn timing_out(mut self, seconds: u64) -> Self {
        self.behavior = LaunchBehavior::TimeOut(seconds);
        self
    }

    /// Writes `content` to `path` (relative to the request's working dir) on each run.
    pub fn writing_merged(mut self, path: &str, content: &str) -> Self {
        self.merged_write = Some((path.to_string(), content.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<LaunchRequest> {
        self.log.lock().unwrap().requests.clone()
    }

    /// Absolute argument paths that existed when the tool was launched.
    pub fn observed_files(&self) -> Vec<PathBuf> {
        self.log.lock().unwrap().observed.clone()
    }
}

#[async_trait]
impl ProcessLauncher for FakeLauncher {
    async fn run(&self, request: &LaunchRequest) -> ResolveResult<ProcessOutput> {
        {
            let mut log = self.log.lock().unwrap();
            log.requests.push(request.clone());
            for arg in &request.args {
                let path = Path::new(arg);
                if path.is_absolute() && path.exists() {
                    log.observed.push(path.to_path_buf());
                }
            }
        }

        let program = request.program.display().to_string();
        match &self.behavior {
            LaunchBehavior::FailToLaunch(message) => Err(ResolveError::ToolLaunchFailed {
                program,
                message: message.clone(),
            }),
            LaunchBehavior::TimeOut(seconds) => Err(ResolveError::ToolTimedOut {
                program,
                seconds: *seconds,
            }),
            LaunchBehavior::Exit(code) => {
                if let Some((path, content)) = &self.merged_write {
                    fs::write(request.working_dir.join(path), content)?;
                }
                Ok(ProcessOutput {
                    exit_code: Some(*code),
                    stdout: String::new(),
                    stderr: String::new(),
                })
            }
        }
    }
}

enum Answer {
    Confirm(bool),
    Survivor(DeletionChoice),
}

/// A prompter that replays queued answers and records the questions asked.
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: RefCell<VecDeque<Answer>>,
    asked: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_confirm(self, answer: bool) -> Self {
        self.answers.borrow_mut().push_back(Answer::Confirm(answer));
        self
    }

    pub fn then_choose(self, choice: DeletionChoice) -> Self {
        self.answers
            .borrow_mut()
            .push_back(Answer::Survivor(choice));
        self
    }

    /// Questions asked so far, in order.
    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.answers.borrow().len()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, checkpoint: &Checkpoint) -> ResolveResult<bool> {
        self.asked.borrow_mut().push(checkpoint.message());
        match self.answers.borrow_mut().pop_front() {
            Some(Answer::Confirm(answer)) => Ok(answer),
            _ => Err(ResolveError::Prompt(format!(
                "unexpected question: {}",
                checkpoint.message()
            ))),
        }
    }

    fn choose_survivor(
        &self,
        path: &str,
        kind: SurvivorKind,
        _surviving: Side,
    ) -> ResolveResult<DeletionChoice> {
        self.asked.borrow_mut().push(kind.question().to_string());
        match self.answers.borrow_mut().pop_front() {
            Some(Answer::Survivor(choice)) => Ok(choice),
            _ => Err(ResolveError::Prompt(format!(
                "unexpected survivor question for {path}"
            ))),
        }
    }
}
