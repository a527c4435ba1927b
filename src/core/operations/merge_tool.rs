//! Merge tool resolution and placeholder substitution.
//!
//! The effective tool is read from git configuration with repository-local
//! values overriding global ones key by key:
//!
//! - `merge.tool` names the tool
//! - `mergetool.<name>.cmd` is the command line with `$BASE`, `$LOCAL`,
//!   `$REMOTE` and `$MERGED` placeholders
//! - `mergetool.<name>.path` overrides the executable
//!
//! `kdiff3` works without a `.cmd` entry.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::traits::{ConfigStore, LaunchRequest, StdioMode};
use crate::error::{ResolveError, ResolveResult};

/// Tool name with a built-in argument template.
pub const KDIFF3: &str = "kdiff3";

/// Argument template used for kdiff3 when no `.cmd` is configured.
pub const KDIFF3_TEMPLATE: &str = "\"$BASE\" \"$LOCAL\" \"$REMOTE\" -o \"$MERGED\"";

const PLACEHOLDERS: [&str; 4] = ["$BASE", "$LOCAL", "$REMOTE", "$MERGED"];

/// Paths substituted for the four placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolPaths {
    pub base: String,
    pub local: String,
    pub remote: String,
    /// Repository-relative path of the conflicted file.
    pub merged: String,
}

impl ToolPaths {
    fn lookup(&self, placeholder: &str) -> Option<&str> {
        match placeholder {
            "$BASE" => Some(&self.base),
            "$LOCAL" => Some(&self.local),
            "$REMOTE" => Some(&self.remote),
            "$MERGED" => Some(&self.merged),
            _ => None,
        }
    }
}

/// A fully resolved merge tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeToolInvocation {
    pub tool: String,
    pub executable: PathBuf,
    pub argument_template: String,
}

impl MergeToolInvocation {
    /// The argument template with placeholders replaced, as one string.
    pub fn argument_string(&self, paths: &ToolPaths) -> String {
        substitute_placeholders(&self.argument_template, paths)
    }

    /// Splits the template into words, then substitutes each word.
    ///
    /// Splitting first keeps paths containing spaces or quotes intact.
    pub fn arguments(&self, paths: &ToolPaths) -> Vec<String> {
        split_words(&self.argument_template)
            .iter()
            .map(|word| substitute_placeholders(word, paths))
            .collect()
    }

    /// Builds the process request for one conflict.
    pub fn launch_request(
        &self,
        paths: &ToolPaths,
        working_dir: &Path,
        stdio: StdioMode,
    ) -> LaunchRequest {
        LaunchRequest {
            program: self.executable.clone(),
            args: self.arguments(paths),
            working_dir: working_dir.to_path_buf(),
            stdio,
        }
    }
}

/// Replaces placeholders in a single left-to-right pass.
///
/// Substituted text is never re-scanned, so a path containing `$LOCAL` stays
/// as written.
pub fn substitute_placeholders(template: &str, paths: &ToolPaths) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match PLACEHOLDERS
            .iter()
            .find(|placeholder| tail.starts_with(**placeholder))
        {
            Some(placeholder) => {
                result.push_str(paths.lookup(placeholder).unwrap_or_default());
                rest = &tail[placeholder.len()..];
            }
            None => {
                result.push('$');
                rest = &tail[1..];
            }
        }
    }
    result.push_str(rest);
    result
}

/// Splits a command line into words.
///
/// Double and single quotes group text; a backslash escapes `"` or `\`
/// inside double quotes only.
pub fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_word = true;
                while let Some(inner) = chars.next() {
                    match inner {
                        '"' => break,
                        '\\' if matches!(chars.peek(), Some('"') | Some('\\')) => {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                        }
                        other => current.push(other),
                    }
                }
            }
            '\'' => {
                in_word = true;
                for inner in chars.by_ref() {
                    if inner == '\'' {
                        break;
                    }
                    current.push(inner);
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            other => {
                in_word = true;
                current.push(other);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

/// Splits a `.cmd` value into its launcher word and the remaining template.
///
/// Returns `None` for a blank command.
pub fn split_launcher(cmd: &str) -> Option<(String, &str)> {
    let trimmed = cmd.trim_start();
    let first = trimmed.chars().next()?;

    let end = if first == '"' || first == '\'' {
        trimmed[1..]
            .find(first)
            .map_or(trimmed.len(), |close| close + 2)
    } else {
        trimmed.find(char::is_whitespace).unwrap_or(trimmed.len())
    };

    let launcher = split_words(&trimmed[..end]).into_iter().next()?;
    Some((launcher, trimmed[end..].trim()))
}

/// Resolves the effective merge tool from configuration.
pub struct MergeToolConfig<'a, C: ConfigStore + ?Sized> {
    store: &'a C,
    tool_override: Option<String>,
}

impl<'a, C: ConfigStore + ?Sized> MergeToolConfig<'a, C> {
    pub fn new(store: &'a C) -> Self {
        Self {
            store,
            tool_override: None,
        }
    }

    /// Uses `tool` instead of `merge.tool` when set.
    pub fn with_tool_override(mut self, tool: Option<String>) -> Self {
        self.tool_override = tool.filter(|t| !t.trim().is_empty());
        self
    }

    /// The configured tool name.
    pub fn tool_name(&self) -> ResolveResult<String> {
        if let Some(tool) = &self.tool_override {
            return Ok(tool.trim().to_string());
        }
        self.store
            .get_effective("merge.tool")?
            .map(|tool| tool.trim().to_string())
            .ok_or(ResolveError::NoMergeToolConfigured)
    }

    /// Resolves the tool name, executable and argument template.
    pub fn resolve(&self) -> ResolveResult<MergeToolInvocation> {
        let tool = self.tool_name()?;
        let path = self
            .store
            .get_effective(&format!("mergetool.{}.path", tool))?
            .map(|p| p.trim().to_string());
        let cmd = self
            .store
            .get_effective(&format!("mergetool.{}.cmd", tool))?;

        let (launcher, argument_template) = match cmd.as_deref().and_then(split_launcher) {
            Some((launcher, template)) => (launcher, template.to_string()),
            None if tool.eq_ignore_ascii_case(KDIFF3) => {
                (KDIFF3.to_string(), KDIFF3_TEMPLATE.to_string())
            }
            None => {
                return Err(ResolveError::IncompleteMergeToolConfig {
                    message: format!("mergetool.{}.cmd is not set", tool),
                    tool,
                });
            }
        };

        let executable = path.unwrap_or(launcher);
        if executable.is_empty() {
            return Err(ResolveError::IncompleteMergeToolConfig {
                message: format!("no executable configured in mergetool.{}.path", tool),
                tool,
            });
        }

        let invocation = MergeToolInvocation {
            executable: locate_executable(&executable),
            tool,
            argument_template,
        };
        info!(
            tool = %invocation.tool,
            executable = %invocation.executable.display(),
            template = %invocation.argument_template,
            "resolved merge tool"
        );
        Ok(invocation)
    }
}

/// Looks up bare command names on `PATH`; other values are kept as given.
fn locate_executable(executable: &str) -> PathBuf {
    let candidate = Path::new(executable);
    if candidate.components().count() > 1 {
        return candidate.to_path_buf();
    }
    match which::which(executable) {
        Ok(found) => {
            debug!(executable, found = %found.display(), "located merge tool on PATH");
            found
        }
        Err(e) => {
            warn!(executable, error = %e, "merge tool executable not found on PATH");
            candidate.to_path_buf()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::FakeConfigStore;
    use crate::core::traits::ConfigScope;

    fn paths() -> ToolPaths {
        ToolPaths {
            base: "/tmp/a.BASE".to_string(),
            local: "/tmp/a.LOCAL".to_string(),
            remote: "/tmp/a.REMOTE".to_string(),
            merged: "src/a.txt".to_string(),
        }
    }

    /// # Placeholder Substitution
    ///
    /// Tests the kdiff3 template with the four placeholder paths.
    ///
    /// ## Test Scenario
    /// - Substitutes the built-in kdiff3 template
    ///
    /// ## Expected Outcome
    /// - Each path appears exactly once in its position with no `$` left
    #[test]
    fn test_substitute_kdiff3_template() {
        let result = substitute_placeholders(KDIFF3_TEMPLATE, &paths());
        assert_eq!(
            result,
            "\"/tmp/a.BASE\" \"/tmp/a.LOCAL\" \"/tmp/a.REMOTE\" -o \"src/a.txt\""
        );
        for path in ["/tmp/a.BASE", "/tmp/a.LOCAL", "/tmp/a.REMOTE", "src/a.txt"] {
            assert_eq!(result.matches(path).count(), 1);
        }
        assert!(!result.contains('$'));
    }

    /// # Single Pass Substitution
    ///
    /// Tests that substituted text is not scanned again.
    ///
    /// ## Test Scenario
    /// - The base path itself contains `$LOCAL`
    /// - The template has an unknown `$HOME` token and a repeated placeholder
    ///
    /// ## Expected Outcome
    /// - `$LOCAL` inside the base path survives, unknown tokens are untouched
    #[test]
    fn test_substitution_is_single_pass() {
        let mut p = paths();
        p.base = "/tmp/$LOCAL/x".to_string();

        assert_eq!(
            substitute_placeholders("$BASE $LOCAL $HOME $MERGED$MERGED $", &p),
            "/tmp/$LOCAL/x /tmp/a.LOCAL $HOME src/a.txtsrc/a.txt $"
        );
    }

    /// # Word Splitting
    ///
    /// Tests quote-aware command splitting.
    ///
    /// ## Test Scenario
    /// - Double quotes, single quotes, escapes and extra whitespace
    ///
    /// ## Expected Outcome
    /// - Quotes group words and are removed
    #[test]
    fn test_split_words() {
        assert_eq!(
            split_words("  \"$BASE\"  -o 'a b' x\\y \"say \\\"hi\\\"\" \"\""),
            vec!["$BASE", "-o", "a b", "x\\y", "say \"hi\"", ""]
        );
        assert!(split_words("   ").is_empty());
    }

    /// # Arguments With Spaces
    ///
    /// Tests that substituted paths containing spaces stay one argument.
    ///
    /// ## Test Scenario
    /// - Merged path contains a space
    ///
    /// ## Expected Outcome
    /// - The argument vector keeps the path as a single element
    #[test]
    fn test_arguments_keep_paths_whole() {
        let invocation = MergeToolInvocation {
            tool: KDIFF3.to_string(),
            executable: PathBuf::from("kdiff3"),
            argument_template: KDIFF3_TEMPLATE.to_string(),
        };
        let mut p = paths();
        p.merged = "docs/read me.md".to_string();

        assert_eq!(
            invocation.arguments(&p),
            vec![
                "/tmp/a.BASE",
                "/tmp/a.LOCAL",
                "/tmp/a.REMOTE",
                "-o",
                "docs/read me.md"
            ]
        );
    }

    /// # Launcher Splitting
    ///
    /// Tests separating the executable from a `.cmd` value.
    ///
    /// ## Test Scenario
    /// - Quoted launcher with spaces, bare launcher, launcher only, blank
    ///
    /// ## Expected Outcome
    /// - Launcher and template are split at the first word
    #[test]
    fn test_split_launcher() {
        let (launcher, template) =
            split_launcher("\"C:/Program Files/Meld/meld.exe\" \"$LOCAL\" \"$MERGED\"").unwrap();
        assert_eq!(launcher, "C:/Program Files/Meld/meld.exe");
        assert_eq!(template, "\"$LOCAL\" \"$MERGED\"");

        let (launcher, template) = split_launcher("meld $LOCAL $MERGED").unwrap();
        assert_eq!(launcher, "meld");
        assert_eq!(template, "$LOCAL $MERGED");

        assert_eq!(split_launcher("vimdiff").unwrap(), ("vimdiff".to_string(), ""));
        assert!(split_launcher("   ").is_none());
    }

    /// # Tool Name Precedence
    ///
    /// Tests local-over-global lookup of merge.tool.
    ///
    /// ## Test Scenario
    /// - Local and global set, only global set, neither set
    ///
    /// ## Expected Outcome
    /// - Local wins, global is the fallback, absence is NoMergeToolConfigured
    #[test]
    fn test_tool_name_precedence() {
        let store = FakeConfigStore::new()
            .with(ConfigScope::Local, "merge.tool", "meld")
            .with(ConfigScope::Global, "merge.tool", "kdiff3");
        assert_eq!(MergeToolConfig::new(&store).tool_name().unwrap(), "meld");

        let store = FakeConfigStore::new().with(ConfigScope::Global, "merge.tool", "kdiff3");
        assert_eq!(MergeToolConfig::new(&store).tool_name().unwrap(), "kdiff3");

        let store = FakeConfigStore::new();
        let err = MergeToolConfig::new(&store).resolve().unwrap_err();
        assert!(matches!(err, ResolveError::NoMergeToolConfigured));
    }

    /// # Tool Override
    ///
    /// Tests that an application-level tool name wins over git config.
    ///
    /// ## Test Scenario
    /// - merge.tool is meld, override is kdiff3; a blank override
    ///
    /// ## Expected Outcome
    /// - The override is used; a blank override is ignored
    #[test]
    fn test_tool_override() {
        let store = FakeConfigStore::new().with(ConfigScope::Local, "merge.tool", "meld");
        let config = MergeToolConfig::new(&store).with_tool_override(Some("kdiff3".to_string()));
        assert_eq!(config.tool_name().unwrap(), "kdiff3");

        let config = MergeToolConfig::new(&store).with_tool_override(Some(" ".to_string()));
        assert_eq!(config.tool_name().unwrap(), "meld");
    }

    /// # Kdiff3 Defaults
    ///
    /// Tests the built-in kdiff3 template.
    ///
    /// ## Test Scenario
    /// - Tool is kdiff3 with only a global `.path`
    ///
    /// ## Expected Outcome
    /// - The default template is used with the configured executable
    #[test]
    fn test_resolve_kdiff3_default() {
        let store = FakeConfigStore::new()
            .with(ConfigScope::Local, "merge.tool", "kdiff3")
            .with(ConfigScope::Global, "mergetool.kdiff3.path", "/opt/kdiff3/bin/kdiff3");

        let invocation = MergeToolConfig::new(&store).resolve().unwrap();
        assert_eq!(invocation.tool, "kdiff3");
        assert_eq!(
            invocation.executable,
            PathBuf::from("/opt/kdiff3/bin/kdiff3")
        );
        assert_eq!(invocation.argument_template, KDIFF3_TEMPLATE);
    }

    /// # Custom Command
    ///
    /// Tests resolution from a `.cmd` value, with and without `.path`.
    ///
    /// ## Test Scenario
    /// - Local cmd with an absolute launcher; then a `.path` override
    ///
    /// ## Expected Outcome
    /// - Template is the remainder; `.path` replaces the launcher word
    #[test]
    fn test_resolve_custom_cmd() {
        let store = FakeConfigStore::new()
            .with(ConfigScope::Global, "merge.tool", "meld")
            .with(
                ConfigScope::Local,
                "mergetool.meld.cmd",
                "/usr/local/bin/meld \"$LOCAL\" \"$BASE\" \"$REMOTE\" --output \"$MERGED\"",
            );

        let invocation = MergeToolConfig::new(&store).resolve().unwrap();
        assert_eq!(invocation.executable, PathBuf::from("/usr/local/bin/meld"));
        assert_eq!(
            invocation.argument_template,
            "\"$LOCAL\" \"$BASE\" \"$REMOTE\" --output \"$MERGED\""
        );

        let store = store.with(ConfigScope::Local, "mergetool.meld.path", "/opt/meld");
        let invocation = MergeToolConfig::new(&store).resolve().unwrap();
        assert_eq!(invocation.executable, PathBuf::from("/opt/meld"));
    }

    /// # Incomplete Configuration
    ///
    /// Tests an unknown tool with no `.cmd`.
    ///
    /// ## Test Scenario
    /// - merge.tool is `mytool` with only a `.path`
    ///
    /// ## Expected Outcome
    /// - IncompleteMergeToolConfig naming the tool
    #[test]
    fn test_resolve_incomplete() {
        let store = FakeConfigStore::new()
            .with(ConfigScope::Local, "merge.tool", "mytool")
            .with(ConfigScope::Local, "mergetool.mytool.path", "/bin/mytool");

        let err = MergeToolConfig::new(&store).resolve().unwrap_err();
        match err {
            ResolveError::IncompleteMergeToolConfig { tool, message } => {
                assert_eq!(tool, "mytool");
                assert!(message.contains("mergetool.mytool.cmd"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    /// # Empty Executable
    ///
    /// Tests that a blank `.path` with a quoted empty launcher is rejected.
    ///
    /// ## Test Scenario
    /// - `.cmd` starts with `""`
    ///
    /// ## Expected Outcome
    /// - IncompleteMergeToolConfig
    #[test]
    fn test_resolve_empty_executable() {
        let store = FakeConfigStore::new()
            .with(ConfigScope::Local, "merge.tool", "odd")
            .with(ConfigScope::Local, "mergetool.odd.cmd", "\"\" $MERGED");

        let err = MergeToolConfig::new(&store).resolve().unwrap_err();
        assert!(err.is_tool_config());
    }
}
