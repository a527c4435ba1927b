//! Optional tracing output for the `resolvers` binary.
//!
//! Logging is off unless a level is given. Records go to stderr or to a
//! file, as text or JSON, through a non-blocking writer.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Case-insensitive; `warning` is accepted for `warn`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Where and how to log, gathered before argument parsing.
#[derive(Debug, Default)]
pub struct LogConfig {
    /// `None` disables logging.
    pub level: Option<LogLevel>,
    /// `None` logs to stderr.
    pub file: Option<PathBuf>,
    pub format: LogFormat,
    /// The merge tool inherits the terminal, so stderr must stay quiet.
    pub tool_shares_terminal: bool,
}

/// Flushes buffered records when dropped; hold it until exit.
pub struct LogGuard {
    _writer: WorkerGuard,
}

/// Installs the global subscriber described by `config`.
///
/// Returns `None` when logging is disabled, when the log file cannot be
/// opened, or when stderr is reserved for a terminal merge tool.
///
/// ```rust,no_run
/// use resolvers::logging::{LogConfig, LogLevel, LogFormat, init_logging};
/// use std::path::PathBuf;
///
/// let _guard = init_logging(LogConfig {
///     level: Some(LogLevel::Debug),
///     file: Some(PathBuf::from("/tmp/resolvers.log")),
///     format: LogFormat::Text,
///     tool_shares_terminal: false,
/// });
/// ```
#[must_use = "the returned guard must be held until application exit"]
pub fn init_logging(config: LogConfig) -> Option<LogGuard> {
    let level = config.level?;

    // Only our own crate; git and tokio internals are noise here
    let filter = EnvFilter::new(format!("resolvers={}", level.as_filter_str()));

    let (writer, guard) = match (&config.file, config.tool_shares_terminal) {
        (Some(path), _) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()?;
            tracing_appender::non_blocking(file)
        }
        (None, false) => tracing_appender::non_blocking(std::io::stderr()),
        (None, true) => return None,
    };
    let to_file = config.file.is_some();

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .json()
                    .with_span_events(FmtSpan::CLOSE)
                    .with_file(to_file)
                    .with_line_number(to_file),
            )
            .init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_file(to_file)
                    .with_line_number(to_file)
                    .with_ansi(!to_file),
            )
            .init(),
    }

    Some(LogGuard { _writer: guard })
}

/// Reads the `--log-*` flags and `RESOLVERS_LOG_*` variables, flags first.
///
/// Runs before clap so that argument errors can still be logged.
#[must_use]
pub fn parse_early_log_config(args: &[String]) -> LogConfig {
    let cli_level = extract_arg_value(args, "--log-level");
    let cli_file = extract_arg_value(args, "--log-file");
    let cli_format = extract_arg_value(args, "--log-format");

    let env_level = std::env::var("RESOLVERS_LOG_LEVEL").ok();
    let env_file = std::env::var("RESOLVERS_LOG_FILE").ok();
    let env_format = std::env::var("RESOLVERS_LOG_FORMAT").ok();

    let level_str = cli_level.or(env_level);
    let file_str = cli_file.or(env_file);
    let format_str = cli_format.or(env_format);

    let tool_shares_terminal = args.iter().any(|a| a == "--no-capture")
        || std::env::var("RESOLVERS_CAPTURE_TOOL_OUTPUT")
            .is_ok_and(|v| v.eq_ignore_ascii_case("false"));

    LogConfig {
        level: level_str.and_then(|s| LogLevel::parse(&s)),
        file: file_str.map(PathBuf::from),
        format: format_str
            .and_then(|s| LogFormat::parse(&s))
            .unwrap_or_default(),
        tool_shares_terminal,
    }
}

/// `--flag value` or `--flag=value`.
fn extract_arg_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{}=", flag);
    args.iter()
        .find_map(|a| a.strip_prefix(&prefix).map(str::to_string))
        .or_else(|| args.windows(2).find(|w| w[0] == flag).map(|w| w[1].clone()))
}
