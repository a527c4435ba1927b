//! Index mutations that settle a conflict or abandon the operation.

use tracing::{info, warn};

use crate::core::traits::{OperationKind, VcsBackend};
use crate::error::ResolveResult;

/// Marks paths resolved, deletes them, or aborts the in-progress operation.
pub struct StagingGateway<'a, B: VcsBackend + ?Sized> {
    backend: &'a B,
}

impl<'a, B: VcsBackend + ?Sized> StagingGateway<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Adds the working-tree version of `path` to the index.
    pub fn stage(&self, path: &str) -> ResolveResult<()> {
        self.backend.stage(path)?;
        info!(path, "staged resolution");
        Ok(())
    }

    /// Removes `path` from the index and working tree.
    pub fn remove(&self, path: &str) -> ResolveResult<()> {
        self.backend.remove(path)?;
        info!(path, "removed conflicted path");
        Ok(())
    }

    /// Aborts whichever operation is in progress.
    ///
    /// Returns the aborted operation, or `None` when nothing was in progress
    /// or the abort command failed.
    pub fn abort_operation(&self) -> Option<OperationKind> {
        let operation = match self.backend.operation_in_progress() {
            Ok(Some(operation)) => operation,
            Ok(None) => {
                info!("no operation in progress to abort");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "could not determine operation in progress");
                return None;
            }
        };

        match self.backend.abort(operation) {
            Ok(()) => {
                info!(operation = %operation, "aborted operation");
                Some(operation)
            }
            Err(e) => {
                warn!(operation = %operation, error = %e, "abort failed");
                None
            }
        }
    }

    /// Aborts whichever operation is in progress, reporting success.
    pub fn abort_current_operation(&self) -> bool {
        self.abort_operation().is_some()
    }
}
