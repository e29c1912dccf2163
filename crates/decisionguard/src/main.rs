use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info, warn};

use decisionguard_core::{FailOn, FileMatcher, render_json, render_markdown};
use decisionguard_diff::parse_unified_diff;
use decisionguard_types::DecisionFile;

mod config_loader;

use config_loader::{load_decisions, load_engine_config};

#[derive(Parser)]
#[command(name = "decisionguard")]
#[command(about = "Match changed files against architecture decisions", long_about = None)]
struct Cli {
    /// Enable verbose (info-level) logging to stderr.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Enable debug-level logging to stderr.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report which decisions a unified diff touches.
    Check(CheckArgs),

    /// Compile a decisions file and report every problem found.
    Validate(ValidateArgs),

    /// Print the JSON schema of the decisions file.
    Schema,
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// Decisions file (JSON or TOML).
    #[arg(long)]
    decisions: PathBuf,

    /// Path to a config file. If omitted, uses ./decisionguard.toml if present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read unified diff input from a file, or '-' for stdin (the default).
    #[arg(long, value_name = "PATH")]
    diff_file: Option<PathBuf>,

    /// Match on file paths only, ignoring diff content. Input may be a
    /// unified diff or one path per line.
    #[arg(long)]
    paths_only: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
    format: OutputFormat,

    /// Lowest severity that makes the run exit with code 2.
    #[arg(long, value_enum, default_value_t = FailOnArg::Critical)]
    fail_on: FailOnArg,
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Decisions file (JSON or TOML).
    #[arg(long)]
    decisions: PathBuf,

    /// Path to a config file. If omitted, uses ./decisionguard.toml if present.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FailOnArg {
    Critical,
    Warning,
    Never,
}

impl From<FailOnArg> for FailOn {
    fn from(v: FailOnArg) -> Self {
        match v {
            FailOnArg::Critical => FailOn::Critical,
            FailOnArg::Warning => FailOn::Warning,
            FailOnArg::Never => FailOn::Never,
        }
    }
}

fn main() -> std::process::ExitCode {
    match run_with_args(std::env::args_os()) {
        Ok(code) => std::process::ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("{err:?}");
            std::process::ExitCode::from(1)
        }
    }
}

fn run_with_args<I, T>(args: I) -> Result<i32>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    init_logging(cli.verbose, cli.debug);

    match cli.command {
        Commands::Check(args) => cmd_check(args),
        Commands::Validate(args) => cmd_validate(args),
        Commands::Schema => {
            cmd_schema()?;
            Ok(0)
        }
    }
}

fn init_logging(verbose: bool, debug: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    debug!("Logging initialized at level: {}", level);
}

fn read_diff(diff_file: Option<&Path>) -> Result<String> {
    match diff_file {
        Some(p) if p != Path::new("-") => {
            info!("Reading unified diff from file: {}", p.display());
            std::fs::read_to_string(p).with_context(|| format!("read diff {}", p.display()))
        }
        _ => {
            info!("Reading unified diff from stdin");
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("read diff from stdin")?;
            Ok(buf)
        }
    }
}

fn cmd_check(args: CheckArgs) -> Result<i32> {
    let config = load_engine_config(args.config.as_deref())?;
    let loaded = load_decisions(&args.decisions)?;
    let matcher = FileMatcher::new(&loaded.decisions, config);
    info!(
        "{} of {} decision(s) ready",
        matcher.decision_count(),
        loaded.decisions.len()
    );

    let diff_text = read_diff(args.diff_file.as_deref())?;
    let diffs = parse_unified_diff(&diff_text);
    if diffs.is_empty() && !args.paths_only {
        warn!("diff input contains no files");
    }

    let mut outcome = if args.paths_only {
        let paths: Vec<&str> = if diffs.is_empty() {
            // `git diff --name-only` style input.
            diff_text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect()
        } else {
            diffs.iter().map(|d| d.filename.as_str()).collect()
        };
        matcher.find_matches_by_path(&paths)
    } else {
        matcher.find_matches_with_diffs(&diffs)
    };

    let mut warnings = loaded.warnings;
    warnings.append(&mut outcome.warnings);
    outcome.warnings = warnings;

    let rendered = match args.format {
        OutputFormat::Markdown => render_markdown(&outcome),
        OutputFormat::Json => {
            let mut s = render_json(&outcome).context("render json")?;
            s.push('\n');
            s
        }
    };
    print!("{rendered}");

    let fail_on = FailOn::from(args.fail_on);
    if fail_on.is_tripped_by(&outcome.matches) {
        info!("fail-on threshold reached");
        return Ok(2);
    }
    Ok(0)
}

fn cmd_validate(args: ValidateArgs) -> Result<i32> {
    info!("Validating decisions file");

    let config = load_engine_config(args.config.as_deref())?;
    let loaded = load_decisions(&args.decisions)?;
    let matcher = FileMatcher::new(&loaded.decisions, config);

    let problems: Vec<_> = loaded
        .warnings
        .iter()
        .chain(matcher.warnings())
        .collect();

    if problems.is_empty() {
        println!(
            "{}: {} decision(s) OK",
            args.decisions.display(),
            matcher.decision_count()
        );
        return Ok(0);
    }

    eprintln!(
        "{}: {} problem(s) found",
        args.decisions.display(),
        problems.len()
    );
    for w in problems {
        eprintln!("  {}: {}", w.decision_id, w.message);
    }
    Ok(1)
}

fn cmd_schema() -> Result<()> {
    let schema = schemars::schema_for!(DecisionFile);
    let s = serde_json::to_string_pretty(&schema).context("render schema")?;
    println!("{s}");
    Ok(())
}
