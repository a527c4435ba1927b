//! Runner module for conflict resolution sessions.
//!
//! # Architecture
//!
//! - `engine.rs` - Drives a single conflict to an outcome and runs batches
//! - `session.rs` - Decides how a session ends once conflicts are gone

pub mod engine;
pub mod session;

pub use engine::{ConflictResolutionEngine, EngineOptions, ResolutionOutcome};
pub use session::{CompletionStep, SessionCompletion, evaluate_completion};

// Re-export OutputFormat from models for convenience
pub use crate::models::OutputFormat;
