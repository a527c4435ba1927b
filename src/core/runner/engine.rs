//! Orchestrates the resolution of conflicted paths.
//!
//! Each call to [`ConflictResolutionEngine::resolve`] walks one conflict
//! through classification, side materialization, the merge tool and the
//! user's confirmation, ending in exactly one [`ResolutionOutcome`]. Temp
//! files are removed on every exit path.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::operations::classify::{
    Classification, ConflictEntry, ConflictShape, ConflictSideResolver, Side, is_binary,
};
use crate::core::operations::merge_tool::{MergeToolConfig, MergeToolInvocation, ToolPaths};
use crate::core::operations::sides::{SaveTarget, SideChooser};
use crate::core::operations::staging::StagingGateway;
use crate::core::runner::session::{CompletionStep, SessionCompletion, evaluate_completion};
use crate::core::traits::{
    Checkpoint, ConfigStore, DeletionChoice, OperationKind, ProcessLauncher, Prompter,
    StdioMode, SurvivorKind, VcsBackend,
};
use crate::error::{ResolveError, ResolveResult};

/// Terminal state of one resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// The resolved file was added to the index.
    StagedResolved,
    /// The path was removed from the index and working tree.
    MarkedDeleted,
    /// The user declined; the conflict is untouched.
    Aborted,
    /// Handed to `git mergetool`.
    DeferredToExternalTool,
}

impl fmt::Display for ResolutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionOutcome::StagedResolved => write!(f, "resolved"),
            ResolutionOutcome::MarkedDeleted => write!(f, "deleted"),
            ResolutionOutcome::Aborted => write!(f, "aborted"),
            ResolutionOutcome::DeferredToExternalTool => write!(f, "deferred to git mergetool"),
        }
    }
}

/// Settings for an engine session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Tool name used instead of `merge.tool`.
    pub tool_override: Option<String>,
    /// How the merge tool's streams are connected.
    pub stdio: StdioMode,
    /// Whether to offer a commit once all conflicts are resolved.
    pub offer_commit: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            tool_override: None,
            stdio: StdioMode::Capture,
            offer_commit: true,
        }
    }
}

/// Drives conflict resolution for one working tree.
pub struct ConflictResolutionEngine<B, C, L, P> {
    backend: B,
    config: C,
    launcher: L,
    prompter: P,
    options: EngineOptions,
    invocation: Option<MergeToolInvocation>,
    started_with_conflicts: bool,
}

impl<B, C, L, P> ConflictResolutionEngine<B, C, L, P>
where
    B: VcsBackend,
    C: ConfigStore,
    L: ProcessLauncher,
    P: Prompter,
{
    /// Starts a session, recording whether the tree had conflicts.
    pub fn new(
        backend: B,
        config: C,
        launcher: L,
        prompter: P,
        options: EngineOptions,
    ) -> ResolveResult<Self> {
        let conflicts = backend.conflicted_files(None)?.len();
        info!(conflicts, "starting resolution session");
        Ok(Self {
            backend,
            config,
            launcher,
            prompter,
            options,
            invocation: None,
            started_with_conflicts: conflicts > 0,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn started_with_conflicts(&self) -> bool {
        self.started_with_conflicts
    }

    /// Lists conflicted paths with their previewed shapes.
    pub fn list_conflicts(&self) -> ResolveResult<Vec<ConflictEntry>> {
        ConflictSideResolver::new(&self.backend).list()
    }

    /// The merge tool for this session, resolved on first use.
    pub fn invocation(&mut self) -> ResolveResult<&MergeToolInvocation> {
        let invocation = match self.invocation.take() {
            Some(invocation) => invocation,
            None => MergeToolConfig::new(&self.config)
                .with_tool_override(self.options.tool_override.clone())
                .resolve()?,
        };
        Ok(self.invocation.insert(invocation))
    }

    /// True while a rebase is in progress, when local and remote swap meaning.
    pub fn in_rebase(&self) -> ResolveResult<bool> {
        self.backend.is_in_rebase()
    }

    /// Resolves one conflicted path.
    pub async fn resolve(&mut self, path: &str) -> ResolveResult<ResolutionOutcome> {
        info!(path, "resolving conflict");
        let mut classification = ConflictSideResolver::new(&self.backend).classify(path)?;
        debug!(path, shape = ?classification.shape, "classified conflict");

        let result = self.drive(&mut classification).await;
        if let Err(e) = classification.cleanup() {
            warn!(path, error = %e, "failed to remove temp files");
        }

        match &result {
            Ok(outcome) => info!(path, outcome = %outcome, "conflict resolution finished"),
            Err(e) => warn!(path, error = %e, "conflict resolution failed"),
        }
        result
    }

    async fn drive(
        &mut self,
        classification: &mut Classification,
    ) -> ResolveResult<ResolutionOutcome> {
        let path = classification.path.clone();
        let shape = classification.shape;
        match shape {
            ConflictShape::Submodule => self.resolve_submodule(&path),
            ConflictShape::ModifiedOrDeleted { surviving } => {
                self.resolve_one_sided(&path, SurvivorKind::Modified, surviving)
            }
            ConflictShape::CreatedOrDeleted { surviving } => {
                self.resolve_one_sided(&path, SurvivorKind::Created, surviving)
            }
            ConflictShape::Unresolvable => {
                classification.cleanup()?;
                let violation = ResolveError::InvariantViolation { path: path.clone() };
                warn!(path = %path, error = %violation, "delegating to git mergetool");
                // git mergetool exits nonzero when the user gives up on a file
                if let Err(e) = self.backend.run_mergetool(Some(&path)) {
                    warn!(path = %path, error = %e, "git mergetool left the conflict unresolved");
                }
                Ok(ResolutionOutcome::DeferredToExternalTool)
            }
            ConflictShape::AllThreePresent => self.resolve_with_tool(classification).await,
        }
    }

    fn resolve_submodule(&self, path: &str) -> ResolveResult<ResolutionOutcome> {
        let checkpoint = Checkpoint::MarkSubmoduleResolved {
            path: path.to_string(),
        };
        if !self.prompter.confirm(&checkpoint)? {
            return Ok(ResolutionOutcome::Aborted);
        }
        StagingGateway::new(&self.backend).stage(path)?;
        Ok(ResolutionOutcome::StagedResolved)
    }

    fn resolve_one_sided(
        &self,
        path: &str,
        kind: SurvivorKind,
        surviving: Side,
    ) -> ResolveResult<ResolutionOutcome> {
        match self.prompter.choose_survivor(path, kind, surviving)? {
            DeletionChoice::UseSurviving => {
                if !self.backend.working_dir().join(path).exists() {
                    let triple = ConflictSideResolver::new(&self.backend).find(path)?;
                    let blob =
                        triple
                            .stage(surviving)
                            .ok_or_else(|| ResolveError::SideNotPresent {
                                path: path.to_string(),
                                side: surviving,
                            })?;
                    self.backend.checkout_stage(path, blob)?;
                }
                StagingGateway::new(&self.backend).stage(path)?;
                Ok(ResolutionOutcome::StagedResolved)
            }
            DeletionChoice::Delete => {
                StagingGateway::new(&self.backend).remove(path)?;
                Ok(ResolutionOutcome::MarkedDeleted)
            }
            DeletionChoice::Abort => Ok(ResolutionOutcome::Aborted),
        }
    }

    async fn resolve_with_tool(
        &mut self,
        classification: &Classification,
    ) -> ResolveResult<ResolutionOutcome> {
        let path = classification.path.as_str();
        let invocation = self.invocation()?.clone();

        if is_binary(self.backend.working_dir(), path)? {
            let checkpoint = Checkpoint::OpenBinary {
                path: path.to_string(),
                tool: invocation.tool.clone(),
            };
            if !self.prompter.confirm(&checkpoint)? {
                return Ok(ResolutionOutcome::Aborted);
            }
        }

        let side_path = |side: Side| {
            classification
                .sides
                .as_ref()
                .and_then(|sides| sides.path(side))
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        };
        let paths = ToolPaths {
            base: side_path(Side::Base),
            local: side_path(Side::Local),
            remote: side_path(Side::Remote),
            merged: path.to_string(),
        };

        let request =
            invocation.launch_request(&paths, self.backend.working_dir(), self.options.stdio);
        info!(path, command = %request.display_command(), "launching merge tool");
        let output = self.launcher.run(&request).await?;
        if !output.success() {
            warn!(
                path,
                tool = %invocation.tool,
                exit_code = ?output.exit_code,
                stderr = %output.stderr.trim(),
                "merge tool exited unsuccessfully"
            );
        }

        let checkpoint = Checkpoint::ConflictSolved {
            path: path.to_string(),
        };
        if !self.prompter.confirm(&checkpoint)? {
            return Ok(ResolutionOutcome::Aborted);
        }
        StagingGateway::new(&self.backend).stage(path)?;
        Ok(ResolutionOutcome::StagedResolved)
    }

    /// Resolves every listed conflict in order.
    ///
    /// Declined and delegated conflicts stay listed and the batch continues;
    /// errors stop it.
    pub async fn resolve_all(&mut self) -> ResolveResult<Vec<(String, ResolutionOutcome)>> {
        let paths: Vec<String> = self
            .backend
            .conflicted_files(None)?
            .into_iter()
            .map(|triple| triple.path)
            .collect();

        let mut outcomes = Vec::with_capacity(paths.len());
        for path in paths {
            match self.resolve(&path).await {
                Ok(outcome) => outcomes.push((path, outcome)),
                // Resolved as a side effect of an earlier step
                Err(ResolveError::NotAConflict { .. }) => {
                    debug!(path = %path, "conflict disappeared before its turn");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(outcomes)
    }

    /// Marks a conflicted path resolved as it is in the working tree.
    pub fn mark_resolved(&self, path: &str) -> ResolveResult<ResolutionOutcome> {
        ConflictSideResolver::new(&self.backend).find(path)?;
        StagingGateway::new(&self.backend).stage(path)?;
        Ok(ResolutionOutcome::StagedResolved)
    }

    /// Resolves a conflict by taking one side.
    pub fn choose_side(&self, path: &str, side: Side) -> ResolveResult<ResolutionOutcome> {
        SideChooser::new(&self.backend).choose(path, side)?;
        Ok(ResolutionOutcome::StagedResolved)
    }

    /// Writes one side of a conflict without resolving it.
    pub fn save_side(&self, path: &str, side: Side, target: &SaveTarget) -> ResolveResult<()> {
        SideChooser::new(&self.backend).save_as(path, side, target)
    }

    /// Runs `git mergetool`, for one path or all conflicts.
    pub fn run_backend_mergetool(&self, path: Option<&str>) -> ResolveResult<()> {
        self.backend.run_mergetool(path)
    }

    /// Aborts the operation in progress.
    pub fn abort_operation(&self) -> Option<OperationKind> {
        StagingGateway::new(&self.backend).abort_operation()
    }

    /// Checks whether the session is complete, offering a commit when appropriate.
    pub fn finish(&self) -> ResolveResult<SessionCompletion> {
        let remaining = self.backend.conflicted_files(None)?.len();
        let operation = self.backend.operation_in_progress()?;

        let completion = match evaluate_completion(
            remaining,
            operation,
            self.started_with_conflicts,
            self.options.offer_commit,
        ) {
            CompletionStep::Done(completion) => completion,
            CompletionStep::OfferCommit => {
                let committed = self.prompter.confirm(&Checkpoint::CommitNow)?;
                if committed {
                    self.backend.commit()?;
                }
                SessionCompletion::ReadyToCommit { committed }
            }
        };
        info!(completion = ?completion, "session finished");
        Ok(completion)
    }
}
