use anyhow::{Context, Result};
use clap::Parser;
use std::io;

use resolvers::{
    Args, Config, ConflictResolutionEngine, DialoguerPrompter, EngineOptions, ExitCode,
    GitConfigStore, GitRepository, ResolutionOutcome, SessionCompletion, TokioLauncher,
    VcsBackend,
    config::resolve_repo_path,
    core::{operations::SaveTarget, output::OutputWriter, traits::StdioMode},
    error::ResolveError,
    logging::{init_logging, parse_early_log_config},
    models::Commands,
};

type Engine = ConflictResolutionEngine<GitRepository, GitConfigStore, TokioLauncher, DialoguerPrompter>;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let raw_args: Vec<String> = std::env::args().collect();
    let _log_guard = init_logging(parse_early_log_config(&raw_args));

    let args = Args::parse();

    match run(args).await {
        Ok(code) => code.into(),
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "command failed");
            eprintln!("Error: {err:#}");
            err.downcast_ref::<ResolveError>()
                .map(ExitCode::for_error)
                .unwrap_or(ExitCode::GeneralError)
                .into()
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    // Handle --create-config flag
    if args.create_config {
        match Config::create_sample_config()? {
            Some(path) => println!("Sample configuration written to {}", path.display()),
            None => println!(
                "Configuration file already exists at {}",
                Config::get_config_path()?.display()
            ),
        }
        return Ok(ExitCode::Success);
    }

    let config = args.resolve_config()?;
    let repo_path = resolve_repo_path(args.global.repo.as_deref(), &config.repo_aliases)?;

    let repo = GitRepository::open(config.git_command.clone(), &repo_path)?;
    let paths_repo = repo.clone();
    let store = GitConfigStore::new(config.git_command.clone(), repo.working_dir());
    let launcher = TokioLauncher::new().with_timeout(config.tool_timeout);
    let options = EngineOptions {
        tool_override: config.merge_tool.clone(),
        stdio: if config.capture_tool_output {
            StdioMode::Capture
        } else {
            StdioMode::Inherit
        },
        offer_commit: config.offer_commit,
    };

    let mut engine = ConflictResolutionEngine::new(
        repo,
        store,
        launcher,
        DialoguerPrompter::new(),
        options,
    )?;
    let mut out = OutputWriter::new(io::stdout(), args.global.output);
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    let relative = |path: String| paths_repo.repo_relative(&cwd, &path);

    let code = match args.command() {
        Commands::List => {
            let conflicts = engine.list_conflicts()?;
            out.write_conflicts(&conflicts, engine.in_rebase()?)?;
            ExitCode::Success
        }
        Commands::Resolve { paths } => {
            let paths: Vec<String> = paths.into_iter().map(relative).collect();
            let outcomes = if paths.is_empty() {
                engine.resolve_all().await?
            } else {
                let mut outcomes = Vec::with_capacity(paths.len());
                for path in paths {
                    let outcome = engine.resolve(&path).await?;
                    outcomes.push((path, outcome));
                }
                outcomes
            };
            finish_session(&engine, &mut out, &outcomes)?
        }
        Commands::Mark { paths } => {
            let paths = paths.into_iter().map(relative).collect();
            let outcomes = apply_each(paths, |path| engine.mark_resolved(path))?;
            finish_session(&engine, &mut out, &outcomes)?
        }
        Commands::Choose { side, paths } => {
            let paths = paths.into_iter().map(relative).collect();
            let outcomes = apply_each(paths, |path| engine.choose_side(path, side.into()))?;
            finish_session(&engine, &mut out, &outcomes)?
        }
        Commands::Save { side, path, dest } => {
            engine.save_side(&relative(path), side.into(), &SaveTarget::parse(&dest))?;
            ExitCode::Success
        }
        Commands::Mergetool { path } => {
            engine.run_backend_mergetool(path.map(relative).as_deref())?;
            finish_session(&engine, &mut out, &[])?
        }
        Commands::Abort => match engine.abort_operation() {
            Some(operation) => {
                println!("Aborted the {}.", operation);
                ExitCode::Success
            }
            None => {
                eprintln!("No merge, rebase, cherry-pick or patch apply to abort.");
                ExitCode::GeneralError
            }
        },
        Commands::Tool => {
            let invocation = engine.invocation()?.clone();
            out.write_invocation(&invocation)?;
            ExitCode::Success
        }
    };

    out.flush().context("Failed to write output")?;
    Ok(code)
}

/// Runs `op` for each path in order, stopping at the first error.
fn apply_each(
    paths: Vec<String>,
    mut op: impl FnMut(&str) -> Result<ResolutionOutcome, ResolveError>,
) -> Result<Vec<(String, ResolutionOutcome)>> {
    let mut outcomes = Vec::with_capacity(paths.len());
    for path in paths {
        let outcome = op(&path)?;
        outcomes.push((path, outcome));
    }
    Ok(outcomes)
}

fn finish_session(
    engine: &Engine,
    out: &mut OutputWriter<io::Stdout>,
    outcomes: &[(String, ResolutionOutcome)],
) -> Result<ExitCode> {
    let completion = engine.finish()?;
    out.write_resolution(outcomes, &completion)?;
    Ok(match completion {
        SessionCompletion::Pending { .. } => ExitCode::ConflictsRemain,
        _ => ExitCode::Success,
    })
}
