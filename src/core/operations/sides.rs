//! Whole-file resolution by picking one side.

use std::io::Write;
use std::path::PathBuf;

use tracing::info;

use crate::core::operations::classify::Side;
use crate::core::operations::staging::StagingGateway;
use crate::core::traits::{ConflictTriple, VcsBackend};
use crate::error::{ResolveError, ResolveResult};

/// Where [`SideChooser::save_as`] writes a side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    Path(PathBuf),
    Stdout,
}

impl SaveTarget {
    /// `-` selects stdout, anything else is a file path.
    pub fn parse(value: &str) -> Self {
        if value == "-" {
            SaveTarget::Stdout
        } else {
            SaveTarget::Path(PathBuf::from(value))
        }
    }
}

/// Resolves a conflict by taking one side verbatim.
pub struct SideChooser<'a, B: VcsBackend + ?Sized> {
    backend: &'a B,
}

impl<'a, B: VcsBackend + ?Sized> SideChooser<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    fn triple(&self, path: &str) -> ResolveResult<ConflictTriple> {
        self.backend
            .conflicted_files(Some(path))?
            .into_iter()
            .find(|triple| triple.path == path)
            .ok_or_else(|| ResolveError::NotAConflict {
                path: path.to_string(),
            })
    }

    /// Overwrites the working-tree file with `side` and stages it.
    pub fn choose(&self, path: &str, side: Side) -> ResolveResult<()> {
        let triple = self.triple(path)?;
        let blob = triple
            .stage(side)
            .ok_or_else(|| ResolveError::SideNotPresent {
                path: path.to_string(),
                side,
            })?;

        self.backend.checkout_stage(path, blob)?;
        StagingGateway::new(self.backend).stage(path)?;
        info!(path, side = %side, "resolved by choosing side");
        Ok(())
    }

    /// Writes `side` to `target` without touching the index.
    pub fn save_as(&self, path: &str, side: Side, target: &SaveTarget) -> ResolveResult<()> {
        let triple = self.triple(path)?;
        let blob = triple
            .stage(side)
            .ok_or_else(|| ResolveError::SideNotPresent {
                path: path.to_string(),
                side,
            })?;

        match target {
            SaveTarget::Path(dest) => {
                self.backend.write_blob(blob, dest)?;
                info!(path, side = %side, dest = %dest.display(), "saved side");
            }
            SaveTarget::Stdout => {
                let contents = self.backend.read_blob(blob)?;
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&contents)?;
                stdout.flush()?;
            }
        }
        Ok(())
    }
}

/// Label for a side, accounting for the swapped meaning during a rebase.
///
/// While rebasing, the local side is the upstream being rebased onto and the
/// remote side is the commit being replayed.
pub fn side_label(side: Side, in_rebase: bool) -> &'static str {
    match (side, in_rebase) {
        (Side::Base, _) => "base",
        (Side::Local, true) => "local (theirs)",
        (Side::Remote, true) => "remote (ours)",
        (Side::Local, false) => "local (ours)",
        (Side::Remote, false) => "remote (theirs)",
    }
}

/// Label for the abort action.
pub fn abort_label(in_rebase: bool) -> &'static str {
    if in_rebase {
        "Abort rebase"
    } else {
        "Abort merge"
    }
}
