use crate::{
    config::{Config, ResolvedConfig},
    core::operations::classify::Side,
    parsed_property::ParsedProperty,
};
use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// A conflict side as named on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SideArg {
    /// The common ancestor.
    Base,
    /// The branch being merged into.
    Local,
    /// The branch being merged in.
    Remote,
}

impl From<SideArg> for Side {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Base => Side::Base,
            SideArg::Local => Side::Local,
            SideArg::Remote => Side::Remote,
        }
    }
}

/// Arguments accepted by every command
#[derive(ClapArgs, Clone, Default, Debug)]
pub struct GlobalArgs {
    // Repository Options
    /// Repository path or alias from the config file [default: current directory]
    #[arg(short = 'C', long, global = true, help_heading = "Repository Options")]
    pub repo: Option<String>,

    /// Git executable to run [default: git]
    #[arg(long, global = true, help_heading = "Repository Options")]
    pub git: Option<String>,

    // Merge Tool
    /// Merge tool name, overriding git's merge.tool
    #[arg(short = 't', long, global = true, help_heading = "Merge Tool")]
    pub merge_tool: Option<String>,

    /// Seconds the merge tool may run before it is terminated
    #[arg(long, value_name = "SECS", global = true, help_heading = "Merge Tool")]
    pub tool_timeout: Option<u64>,

    /// Let the merge tool use the terminal (for console tools such as vimdiff)
    #[arg(long, global = true, help_heading = "Merge Tool")]
    pub no_capture: bool,

    // Behavior
    /// Do not offer to commit once all conflicts are resolved
    #[arg(long, global = true, help_heading = "Behavior")]
    pub no_commit: bool,

    // Output Options
    /// Output format
    #[arg(
        short,
        long,
        value_enum,
        default_value_t,
        global = true,
        help_heading = "Output Options"
    )]
    pub output: OutputFormat,

    // Logging (read early by logging::parse_early_log_config)
    /// Log level: trace, debug, info, warn, error [default: off]
    #[arg(long, global = true, help_heading = "Logging")]
    pub log_level: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, help_heading = "Logging")]
    pub log_file: Option<PathBuf>,

    /// Log format: text or json
    #[arg(long, global = true, help_heading = "Logging")]
    pub log_format: Option<String>,
}

/// Available commands
#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Commands {
    /// List conflicted files and their conflict kind
    #[command(visible_alias = "ls")]
    List,

    /// Resolve conflicts with the configured merge tool
    #[command(
        visible_alias = "r",
        long_about = "Resolve conflicts with the configured merge tool.\n\n\
            Both-modified files are opened in the merge tool with BASE, LOCAL and REMOTE\n\
            copies; you are asked whether the result is solved before it is staged.\n\
            Modify/delete conflicts ask which version survives. Submodules are staged\n\
            after confirmation. Without paths every conflicted file is visited."
    )]
    Resolve {
        /// Paths relative to the current directory [default: all conflicted files]
        paths: Vec<String>,
    },

    /// Mark files resolved as they are in the working tree
    Mark {
        /// Paths to mark resolved, relative to the current directory
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Resolve files by taking one side as-is
    Choose {
        /// Side to keep
        #[arg(value_enum)]
        side: SideArg,
        /// Paths to resolve, relative to the current directory
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Write one side of a conflict to a file, or to stdout with "-"
    Save {
        /// Side to write
        #[arg(value_enum)]
        side: SideArg,
        /// Conflicted path
        path: String,
        /// Destination file, or "-" for stdout
        dest: String,
    },

    /// Hand conflicts to `git mergetool`
    Mergetool {
        /// Path to resolve [default: all conflicted files]
        path: Option<String>,
    },

    /// Abort the merge, rebase, cherry-pick or patch apply in progress
    Abort,

    /// Show the merge tool that would be launched
    Tool,
}

#[derive(Parser, Clone, Debug)]
#[command(
    name = "resolvers",
    author,
    version = crate::LONG_VERSION,
    about = "Resolve git merge conflicts with an external merge tool",
    long_about = "Resolve git merge conflicts with an external merge tool.\n\n\
        Resolvers walks every conflicted file, opens real conflicts in the merge tool\n\
        configured with merge.tool and mergetool.<tool>.cmd, asks before staging, and\n\
        handles modify/delete conflicts and submodules.\n\n\
        Configuration can be provided via CLI arguments, environment variables (RESOLVERS_*),\n\
        or the config file (~/.config/resolvers/config.toml).",
    after_help = "EXAMPLES:\n    \
        # Resolve every conflict\n    \
        resolvers\n\n    \
        # Resolve two files with meld\n    \
        resolvers --merge-tool meld resolve src/a.rs src/b.rs\n\n    \
        # Keep the remote version of a file\n    \
        resolvers choose remote Cargo.lock\n\n    \
        # Print the base version\n    \
        resolvers save base src/a.rs -\n\n    \
        # Create sample config file\n    \
        resolvers --create-config"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub global: GlobalArgs,

    /// Create a sample configuration file at ~/.config/resolvers/config.toml
    #[arg(long)]
    pub create_config: bool,
}

impl Args {
    /// The command to run; no subcommand resolves everything.
    pub fn command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or(Commands::Resolve { paths: Vec::new() })
    }

    /// Configuration layer holding only values given on the command line
    pub fn cli_config(&self) -> Config {
        let global = &self.global;
        Config {
            git_command: global
                .git
                .as_ref()
                .map(|v| ParsedProperty::Cli(v.clone(), format!("--git {}", v))),
            merge_tool: global
                .merge_tool
                .as_ref()
                .map(|v| ParsedProperty::Cli(v.clone(), format!("--merge-tool {}", v))),
            tool_timeout_secs: global
                .tool_timeout
                .map(|v| ParsedProperty::Cli(v, format!("--tool-timeout {}", v))),
            capture_tool_output: global
                .no_capture
                .then(|| ParsedProperty::Cli(false, "--no-capture".to_string())),
            offer_commit: global
                .no_commit
                .then(|| ParsedProperty::Cli(false, "--no-commit".to_string())),
            repo_aliases: None,
        }
    }

    /// Resolve configuration from CLI args, environment variables and config file
    /// Priority: CLI args > environment variables > config file > defaults
    pub fn resolve_config(&self) -> Result<ResolvedConfig> {
        let file_config = Config::load_from_file().context("Failed to load config file")?;
        let env_config = Config::load_from_env();

        Config::default()
            .merge(file_config)
            .merge(env_config)
            .merge(self.cli_config())
            .resolve()
            .context("Invalid configuration")
    }
}
