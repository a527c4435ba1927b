//! Terminal prompts for the resolution checkpoints.

use dialoguer::{Confirm, Select};

use crate::core::operations::classify::Side;
use crate::core::traits::{Checkpoint, DeletionChoice, Prompter, SurvivorKind};
use crate::error::{ResolveError, ResolveResult};

/// Asks checkpoint questions on the terminal with `dialoguer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DialoguerPrompter;

impl DialoguerPrompter {
    pub fn new() -> Self {
        Self
    }
}

/// Menu entries for a one-sided conflict, in [`DeletionChoice`] order.
pub fn survivor_items(kind: SurvivorKind, surviving: Side) -> [String; 3] {
    [
        format!("{} ({})", kind.keep_label(), surviving.token().to_lowercase()),
        "Deleted".to_string(),
        "Abort".to_string(),
    ]
}

impl Prompter for DialoguerPrompter {
    fn confirm(&self, checkpoint: &Checkpoint) -> ResolveResult<bool> {
        Confirm::new()
            .with_prompt(checkpoint.message())
            .default(checkpoint.default_answer())
            .interact()
            .map_err(|e| ResolveError::Prompt(e.to_string()))
    }

    fn choose_survivor(
        &self,
        path: &str,
        kind: SurvivorKind,
        surviving: Side,
    ) -> ResolveResult<DeletionChoice> {
        let choice = Select::new()
            .with_prompt(format!("{}: {}", path, kind.question()))
            .items(&survivor_items(kind, surviving))
            .default(0)
            .interact()
            .map_err(|e| ResolveError::Prompt(e.to_string()))?;

        Ok(match choice {
            0 => DeletionChoice::UseSurviving,
            1 => DeletionChoice::Delete,
            _ => DeletionChoice::Abort,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_survivor_items() {
        assert_eq!(
            survivor_items(SurvivorKind::Modified, Side::Remote),
            ["Modified (remote)", "Deleted", "Abort"]
        );
        assert_eq!(
            survivor_items(SurvivorKind::Created, Side::Local)[0],
            "Created (local)"
        );
    }
}
