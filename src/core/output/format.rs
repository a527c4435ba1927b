//! Output formatting for text and JSON modes.

use serde::Serialize;
use std::io::{self, Write};

use crate::core::operations::classify::{ConflictEntry, Side};
use crate::core::operations::merge_tool::MergeToolInvocation;
use crate::core::operations::sides::side_label;
use crate::core::runner::engine::ResolutionOutcome;
use crate::core::runner::session::SessionCompletion;
use crate::models::OutputFormat;

#[derive(Serialize)]
struct OutcomeRecord<'a> {
    path: &'a str,
    outcome: ResolutionOutcome,
}

#[derive(Serialize)]
struct ResolutionReport<'a> {
    outcomes: Vec<OutcomeRecord<'a>>,
    completion: &'a SessionCompletion,
}

#[derive(Serialize)]
struct ConflictListing<'a> {
    in_rebase: bool,
    conflicts: &'a [ConflictEntry],
}

fn outcome_records(outcomes: &[(String, ResolutionOutcome)]) -> Vec<OutcomeRecord<'_>> {
    outcomes
        .iter()
        .map(|(path, outcome)| OutcomeRecord {
            path,
            outcome: *outcome,
        })
        .collect()
}

/// Writer that formats output according to the specified format.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
}

impl<W: Write> OutputWriter<W> {
    /// Creates a new OutputWriter with the specified format.
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self { writer, format }
    }

    /// Returns the output format.
    pub fn format(&self) -> &OutputFormat {
        &self.format
    }

    /// Consumes the writer, returning the underlying sink.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Writes a line of text.
    fn writeln(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.writer, "{}", text)
    }

    fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        self.writeln(&json)
    }

    /// Writes the list of conflicted paths.
    pub fn write_conflicts(&mut self, conflicts: &[ConflictEntry], in_rebase: bool) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => {
                if conflicts.is_empty() {
                    return self.writeln("No merge conflicts.");
                }
                self.writeln(&format!(
                    "{} conflicted {}:",
                    conflicts.len(),
                    if conflicts.len() == 1 { "file" } else { "files" }
                ))?;
                for entry in conflicts {
                    let sides: Vec<&str> = Side::ALL
                        .iter()
                        .filter(|side| entry.presence.contains(**side))
                        .map(|side| side_label(*side, in_rebase))
                        .collect();
                    self.writeln(&format!(
                        "  {:<18} {}  [{}]",
                        entry.shape.description(),
                        entry.path,
                        sides.join(", ")
                    ))?;
                }
                Ok(())
            }
            OutputFormat::Json => self.write_json(&ConflictListing {
                in_rebase,
                conflicts,
            }),
        }
    }

    /// Writes the outcome of resolving one or more paths.
    pub fn write_outcomes(&mut self, outcomes: &[(String, ResolutionOutcome)]) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => {
                for (path, outcome) in outcomes {
                    self.writeln(&format!("{}: {}", path, outcome))?;
                }
                Ok(())
            }
            OutputFormat::Json => self.write_json(&outcome_records(outcomes)),
        }
    }

    /// Writes outcomes followed by the session completion, as one document in JSON mode.
    pub fn write_resolution(
        &mut self,
        outcomes: &[(String, ResolutionOutcome)],
        completion: &SessionCompletion,
    ) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => {
                self.write_outcomes(outcomes)?;
                self.write_completion(completion)
            }
            OutputFormat::Json => self.write_json(&ResolutionReport {
                outcomes: outcome_records(outcomes),
                completion,
            }),
        }
    }

    /// Writes how the session ended.
    pub fn write_completion(&mut self, completion: &SessionCompletion) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => {
                let line = match completion {
                    SessionCompletion::Pending { remaining } => format!(
                        "{} conflicted {} remaining.",
                        remaining,
                        if *remaining == 1 { "file" } else { "files" }
                    ),
                    SessionCompletion::ReadyToCommit { committed: true } => {
                        "All merge conflicts are resolved and committed.".to_string()
                    }
                    SessionCompletion::ReadyToCommit { committed: false } => {
                        "All merge conflicts are resolved, you can commit.".to_string()
                    }
                    SessionCompletion::HandedBack { operation } => format!(
                        "All merge conflicts are resolved. Continue the {}.",
                        operation
                    ),
                    SessionCompletion::NothingToDo => "No merge conflicts.".to_string(),
                };
                self.writeln(&line)
            }
            OutputFormat::Json => self.write_json(completion),
        }
    }

    /// Writes the resolved merge tool.
    pub fn write_invocation(&mut self, invocation: &MergeToolInvocation) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => {
                self.writeln(&format!("Tool:       {}", invocation.tool))?;
                self.writeln(&format!(
                    "Executable: {}",
                    invocation.executable.display()
                ))?;
                self.writeln(&format!("Arguments:  {}", invocation.argument_template))
            }
            OutputFormat::Json => self.write_json(invocation),
        }
    }

    /// Flushes any buffered output.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::operations::classify::{ConflictShape, StagePresence};
    use crate::core::traits::OperationKind;
    use insta::assert_snapshot;
    use std::path::PathBuf;

    fn entries() -> Vec<ConflictEntry> {
        vec![
            ConflictEntry {
                path: "src/lib.rs".to_string(),
                presence: StagePresence::new(true, true, true),
                shape: ConflictShape::AllThreePresent,
            },
            ConflictEntry {
                path: "docs/old.md".to_string(),
                presence: StagePresence::new(true, false, true),
                shape: ConflictShape::ModifiedOrDeleted {
                    surviving: Side::Remote,
                },
            },
        ]
    }

    fn render(format: OutputFormat, f: impl FnOnce(&mut OutputWriter<Vec<u8>>)) -> String {
        let mut writer = OutputWriter::new(Vec::new(), format);
        f(&mut writer);
        String::from_utf8(writer.into_inner()).unwrap()
    }

    /// # Text Conflict Listing
    ///
    /// Tests the text rendering of a conflict list during a rebase.
    ///
    /// ## Test Scenario
    /// - Two conflicts with different shapes, rebase in progress
    ///
    /// ## Expected Outcome
    /// - Rebase labels and shape descriptions are shown
    #[test]
    fn test_text_conflict_listing() {
        let output = render(OutputFormat::Text, |w| {
            w.write_conflicts(&entries(), true).unwrap()
        });
        assert_snapshot!(output, @r"
        2 conflicted files:
          both modified      src/lib.rs  [base, local (theirs), remote (ours)]
          deleted by local   docs/old.md  [base, remote (ours)]
        ");
    }

    /// # JSON Conflict Listing
    ///
    /// Tests that JSON output carries shape and presence.
    ///
    /// ## Test Scenario
    /// - Render the same conflicts as JSON and parse them back
    ///
    /// ## Expected Outcome
    /// - Shapes are tagged by kind with the surviving side
    #[test]
    fn test_json_conflict_listing() {
        let output = render(OutputFormat::Json, |w| {
            w.write_conflicts(&entries(), false).unwrap()
        });
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["in_rebase"], false);
        assert_eq!(value["conflicts"][0]["shape"]["kind"], "all_three_present");
        assert_eq!(value["conflicts"][1]["shape"]["kind"], "modified_or_deleted");
        assert_eq!(value["conflicts"][1]["shape"]["surviving"], "remote");
        assert_eq!(value["conflicts"][1]["presence"]["local"], false);
    }

    /// # Outcomes And Completion
    ///
    /// Tests text and JSON rendering of outcomes and session completion.
    ///
    /// ## Test Scenario
    /// - Two outcomes followed by a hand-back during a cherry-pick
    ///
    /// ## Expected Outcome
    /// - Text names each path; JSON uses snake_case outcomes
    #[test]
    fn test_outcomes_and_completion() {
        let outcomes = vec![
            ("a.txt".to_string(), ResolutionOutcome::StagedResolved),
            ("b.txt".to_string(), ResolutionOutcome::Aborted),
        ];

        let text = render(OutputFormat::Text, |w| {
            w.write_outcomes(&outcomes).unwrap();
            w.write_completion(&SessionCompletion::HandedBack {
                operation: OperationKind::CherryPick,
            })
            .unwrap();
        });
        assert_snapshot!(text, @r"
        a.txt: resolved
        b.txt: aborted
        All merge conflicts are resolved. Continue the cherry-pick.
        ");

        let json = render(OutputFormat::Json, |w| w.write_outcomes(&outcomes).unwrap());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["outcome"], "staged_resolved");
        assert_eq!(value[1]["path"], "b.txt");

        let json = render(OutputFormat::Json, |w| {
            w.write_completion(&SessionCompletion::Pending { remaining: 2 })
                .unwrap()
        });
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "pending");
        assert_eq!(value["remaining"], 2);
    }

    /// # Resolution Report
    ///
    /// Tests the combined outcome and completion output.
    ///
    /// ## Test Scenario
    /// - One staged path, session ready and committed
    ///
    /// ## Expected Outcome
    /// - Text prints both parts; JSON nests them in one object
    #[test]
    fn test_resolution_report() {
        let outcomes = vec![("a.txt".to_string(), ResolutionOutcome::StagedResolved)];
        let completion = SessionCompletion::ReadyToCommit { committed: true };

        let text = render(OutputFormat::Text, |w| {
            w.write_resolution(&outcomes, &completion).unwrap()
        });
        assert_snapshot!(text, @r"
        a.txt: resolved
        All merge conflicts are resolved and committed.
        ");

        let json = render(OutputFormat::Json, |w| {
            w.write_resolution(&outcomes, &completion).unwrap()
        });
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["outcomes"][0]["path"], "a.txt");
        assert_eq!(value["completion"]["status"], "ready_to_commit");
        assert_eq!(value["completion"]["committed"], true);
    }

    #[test]
    fn test_text_invocation() {
        let invocation = MergeToolInvocation {
            tool: "kdiff3".to_string(),
            executable: PathBuf::from("/usr/bin/kdiff3"),
            argument_template: "\"$BASE\" \"$LOCAL\" \"$REMOTE\" -o \"$MERGED\"".to_string(),
        };
        let output = render(OutputFormat::Text, |w| w.write_invocation(&invocation).unwrap());
        assert!(output.contains("Executable: /usr/bin/kdiff3"));
        assert!(output.contains("-o \"$MERGED\""));
    }
}
