//! Output system for the command-line front end.
//!
//! Renders conflict listings, resolution outcomes, session completion and
//! the resolved merge tool as human-readable text or JSON.

mod format;

pub use format::OutputWriter;
