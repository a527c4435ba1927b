//! Conflict classification and side materialization.
//!
//! For a conflicted path this module works out which of the three index
//! stages exist, writes each present stage to a temporary file, and maps
//! the presence set onto a [`ConflictShape`] that the rest of the engine
//! matches on.
//!
//! # Shapes
//!
//! | base | local | remote | shape |
//! |------|-------|--------|-------|
//! | yes  | yes   | yes    | [`ConflictShape::AllThreePresent`] |
//! | yes  | yes   | no     | [`ConflictShape::ModifiedOrDeleted`] (local survives) |
//! | yes  | no    | yes    | [`ConflictShape::ModifiedOrDeleted`] (remote survives) |
//! | no   | yes   | no     | [`ConflictShape::CreatedOrDeleted`] (local survives) |
//! | no   | no    | yes    | [`ConflictShape::CreatedOrDeleted`] (remote survives) |
//! | other |      |        | [`ConflictShape::Unresolvable`] |
//!
//! Submodules are detected before the table is consulted.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::core::traits::{ConflictTriple, VcsBackend};
use crate::error::{ResolveError, ResolveResult};
use crate::git_config::SubmoduleRegistry;

/// Number of leading bytes inspected when sniffing for binary content.
const BINARY_SNIFF_LEN: usize = 8000;

/// One of the three versions of a conflicted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Base,
    Local,
    Remote,
}

impl Side {
    pub const ALL: [Side; 3] = [Side::Base, Side::Local, Side::Remote];

    /// Index stage number holding this side.
    pub fn stage_number(&self) -> u8 {
        match self {
            Side::Base => 1,
            Side::Local => 2,
            Side::Remote => 3,
        }
    }

    /// Maps an index stage number back to a side.
    pub fn from_stage_number(stage: u8) -> Option<Self> {
        match stage {
            1 => Some(Side::Base),
            2 => Some(Side::Local),
            3 => Some(Side::Remote),
            _ => None,
        }
    }

    /// Upper-case name used in temp file names and placeholders.
    pub fn token(&self) -> &'static str {
        match self {
            Side::Base => "BASE",
            Side::Local => "LOCAL",
            Side::Remote => "REMOTE",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Which stages of a conflicted path are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StagePresence {
    pub base: bool,
    pub local: bool,
    pub remote: bool,
}

impl StagePresence {
    pub fn new(base: bool, local: bool, remote: bool) -> Self {
        Self {
            base,
            local,
            remote,
        }
    }

    /// Presence as recorded in the index.
    pub fn from_triple(triple: &ConflictTriple) -> Self {
        Self {
            base: triple.base.is_some(),
            local: triple.local.is_some(),
            remote: triple.remote.is_some(),
        }
    }

    pub fn contains(&self, side: Side) -> bool {
        match side {
            Side::Base => self.base,
            Side::Local => self.local,
            Side::Remote => self.remote,
        }
    }

    pub fn count(&self) -> usize {
        [self.base, self.local, self.remote]
            .iter()
            .filter(|present| **present)
            .count()
    }
}

/// The kind of conflict, derived once and matched on downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictShape {
    /// Base, local and remote all exist: a content merge.
    AllThreePresent,
    /// One side modified the file, the other deleted it.
    ModifiedOrDeleted { surviving: Side },
    /// One side created the file and the other has no version of it.
    CreatedOrDeleted { surviving: Side },
    /// The path is a registered submodule.
    Submodule,
    /// No resolvable shape; handed to the backend's own tool driver.
    Unresolvable,
}

impl ConflictShape {
    /// Classifies a presence set.
    pub fn from_presence(presence: StagePresence) -> Self {
        match (presence.base, presence.local, presence.remote) {
            (true, true, true) => ConflictShape::AllThreePresent,
            (true, true, false) => ConflictShape::ModifiedOrDeleted {
                surviving: Side::Local,
            },
            (true, false, true) => ConflictShape::ModifiedOrDeleted {
                surviving: Side::Remote,
            },
            (false, true, false) => ConflictShape::CreatedOrDeleted {
                surviving: Side::Local,
            },
            (false, false, true) => ConflictShape::CreatedOrDeleted {
                surviving: Side::Remote,
            },
            _ => ConflictShape::Unresolvable,
        }
    }

    /// Short human-readable status.
    pub fn description(&self) -> &'static str {
        match self {
            ConflictShape::AllThreePresent => "both modified",
            ConflictShape::ModifiedOrDeleted {
                surviving: Side::Remote,
            } => "deleted by local",
            ConflictShape::ModifiedOrDeleted { .. } => "deleted by remote",
            ConflictShape::CreatedOrDeleted {
                surviving: Side::Remote,
            } => "added by remote",
            ConflictShape::CreatedOrDeleted { .. } => "added by local",
            ConflictShape::Submodule => "submodule",
            ConflictShape::Unresolvable => "unresolvable",
        }
    }
}

/// A conflicted path as listed to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictEntry {
    pub path: String,
    pub presence: StagePresence,
    pub shape: ConflictShape,
}

/// Temp files holding the materialized sides of one conflict.
///
/// The files live in a private temp directory. [`cleanup`](Self::cleanup)
/// removes them and may be called any number of times; dropping the value
/// cleans up as well.
#[derive(Debug)]
pub struct MaterializedSides {
    dir: Option<TempDir>,
    base: Option<PathBuf>,
    local: Option<PathBuf>,
    remote: Option<PathBuf>,
}

impl MaterializedSides {
    fn new(dir: TempDir) -> Self {
        Self {
            dir: Some(dir),
            base: None,
            local: None,
            remote: None,
        }
    }

    fn slot(&mut self, side: Side) -> &mut Option<PathBuf> {
        match side {
            Side::Base => &mut self.base,
            Side::Local => &mut self.local,
            Side::Remote => &mut self.remote,
        }
    }

    /// Path of the temp file for a side, if it was materialized.
    pub fn path(&self, side: Side) -> Option<&Path> {
        match side {
            Side::Base => self.base.as_deref(),
            Side::Local => self.local.as_deref(),
            Side::Remote => self.remote.as_deref(),
        }
    }

    /// Which sides were successfully written.
    pub fn presence(&self) -> StagePresence {
        StagePresence::new(
            self.base.is_some(),
            self.local.is_some(),
            self.remote.is_some(),
        )
    }

    /// Number of temp files written.
    pub fn file_count(&self) -> usize {
        self.presence().count()
    }

    /// All materialized file paths, in base/local/remote order.
    pub fn paths(&self) -> Vec<PathBuf> {
        Side::ALL
            .iter()
            .filter_map(|side| self.path(*side).map(Path::to_path_buf))
            .collect()
    }

    /// Returns true once the temp files have been removed.
    pub fn is_cleaned_up(&self) -> bool {
        self.dir.is_none()
    }

    /// Deletes the temp files. Subsequent calls do nothing.
    pub fn cleanup(&mut self) -> io::Result<()> {
        match self.dir.take() {
            Some(dir) => {
                debug!(dir = %dir.path().display(), "removing materialized sides");
                dir.close()
            }
            None => Ok(()),
        }
    }
}

impl Drop for MaterializedSides {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            warn!(error = %e, "failed to remove materialized sides");
        }
    }
}

/// Result of classifying a conflicted path.
#[derive(Debug)]
pub struct Classification {
    pub path: String,
    pub shape: ConflictShape,
    pub presence: StagePresence,
    /// Temp files for the present sides; `None` for submodules.
    pub sides: Option<MaterializedSides>,
}

impl Classification {
    /// Deletes any materialized temp files.
    pub fn cleanup(&mut self) -> io::Result<()> {
        match self.sides.as_mut() {
            Some(sides) => sides.cleanup(),
            None => Ok(()),
        }
    }
}

/// Determines which sides of a conflict exist and what kind of conflict it is.
pub struct ConflictSideResolver<'a, B: VcsBackend + ?Sized> {
    backend: &'a B,
    registry: Option<SubmoduleRegistry>,
}

impl<'a, B: VcsBackend + ?Sized> ConflictSideResolver<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            registry: None,
        }
    }

    /// Lists every conflicted path with a shape previewed from index presence.
    pub fn list(&mut self) -> ResolveResult<Vec<ConflictEntry>> {
        let triples = self.backend.conflicted_files(None)?;
        let mut entries = Vec::with_capacity(triples.len());
        for triple in &triples {
            entries.push(self.preview(triple)?);
        }
        Ok(entries)
    }

    /// Classifies from index presence alone, without writing temp files.
    pub fn preview(&mut self, triple: &ConflictTriple) -> ResolveResult<ConflictEntry> {
        let presence = StagePresence::from_triple(triple);
        let shape = if self.is_submodule(&triple.path)? {
            ConflictShape::Submodule
        } else {
            ConflictShape::from_presence(presence)
        };
        Ok(ConflictEntry {
            path: triple.path.clone(),
            presence,
            shape,
        })
    }

    /// Finds the conflict record for exactly `path`.
    pub fn find(&self, path: &str) -> ResolveResult<ConflictTriple> {
        self.backend
            .conflicted_files(Some(path))?
            .into_iter()
            .find(|triple| triple.path == path)
            .ok_or_else(|| ResolveError::NotAConflict {
                path: path.to_string(),
            })
    }

    /// Classifies `path`, materializing every present side to a temp file.
    ///
    /// Ownership of the temp files passes to the returned [`Classification`].
    pub fn classify(&mut self, path: &str) -> ResolveResult<Classification> {
        let triple = self.find(path)?;

        if self.is_submodule(path)? {
            debug!(path, "conflict is a registered submodule");
            return Ok(Classification {
                path: path.to_string(),
                shape: ConflictShape::Submodule,
                presence: StagePresence::from_triple(&triple),
                sides: None,
            });
        }

        let sides = self.materialize(&triple)?;
        let presence = sides.presence();
        let shape = ConflictShape::from_presence(presence);
        if shape == ConflictShape::Unresolvable {
            warn!(
                path,
                base = presence.base,
                local = presence.local,
                remote = presence.remote,
                "conflict stages match no resolvable shape"
            );
        }

        Ok(Classification {
            path: path.to_string(),
            shape,
            presence,
            sides: Some(sides),
        })
    }

    /// Writes every present stage of `triple` into a fresh temp directory.
    pub fn materialize(&self, triple: &ConflictTriple) -> ResolveResult<MaterializedSides> {
        let dir = tempfile::Builder::new().prefix("resolvers-").tempdir()?;
        let mut sides = MaterializedSides::new(dir);

        for side in Side::ALL {
            let Some(blob) = triple.stage(side) else {
                continue;
            };
            let Some(dir) = sides.dir.as_ref() else {
                break;
            };
            let dest = dir.path().join(side_file_name(&triple.path, side));
            // On failure `sides` drops here and removes what was written.
            self.backend.write_blob(blob, &dest)?;
            debug!(path = %triple.path, side = %side, dest = %dest.display(), "materialized side");
            *sides.slot(side) = Some(dest);
        }

        Ok(sides)
    }

    fn is_submodule(&mut self, path: &str) -> ResolveResult<bool> {
        let full = self.backend.working_dir().join(path);
        if !full.is_dir() {
            return Ok(false);
        }
        if self.registry.is_none() {
            self.registry = Some(SubmoduleRegistry::load(self.backend.working_dir())?);
        }
        Ok(self
            .registry
            .as_ref()
            .is_some_and(|registry| registry.contains(path)))
    }
}

/// Temp file name for a side: `<stem>_<SIDE><.ext>` from the path's basename.
pub fn side_file_name(path: &str, side: Side) -> String {
    let basename = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match basename.rfind('.') {
        Some(dot) if dot > 0 => format!(
            "{}_{}{}",
            &basename[..dot],
            side.token(),
            &basename[dot..]
        ),
        _ => format!("{}_{}", basename, side.token()),
    }
}

/// Returns true if the working-tree file at `path` looks binary.
pub fn is_binary(working_dir: &Path, path: &str) -> io::Result<bool> {
    is_binary_file(&working_dir.join(path))
}

/// Returns true if the file's leading bytes contain a NUL byte.
///
/// Missing files are reported as not binary.
pub fn is_binary_file(path: &Path) -> io::Result<bool> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    let mut buffer = Vec::with_capacity(BINARY_SNIFF_LEN);
    file.take(BINARY_SNIFF_LEN as u64).read_to_end(&mut buffer)?;
    Ok(buffer.contains(&0))
}
