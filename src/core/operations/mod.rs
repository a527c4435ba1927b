//! Core operations for conflict resolution.
//!
//! These operations are independent of the terminal front end and are
//! driven by the engine in [`crate::core::runner`].
//!
//! # Modules
//!
//! - [`classify`] - Determining conflict sides and shape
//! - [`merge_tool`] - Resolving the configured merge tool
//! - [`staging`] - Marking paths resolved, deleting, aborting
//! - [`sides`] - Taking or saving a single side

pub mod classify;
pub mod merge_tool;
pub mod sides;
pub mod staging;

// Re-export commonly used types
pub use classify::{
    Classification, ConflictEntry, ConflictShape, ConflictSideResolver, MaterializedSides, Side,
    StagePresence, is_binary, is_binary_file, side_file_name,
};
pub use merge_tool::{
    KDIFF3, KDIFF3_TEMPLATE, MergeToolConfig, MergeToolInvocation, ToolPaths, split_launcher,
    split_words, substitute_placeholders,
};
pub use sides::{SaveTarget, SideChooser, abort_label, side_label};
pub use staging::StagingGateway;
