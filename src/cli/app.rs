//! Main CLI application

use crate::config::{
    build_target_tree, find_build_script, initial_properties, parse_script_file,
};
use crate::log::{ConsoleLogger, Logger, TracingLogger, Verbosity};
use crate::runner::TaskContext;
use anyhow::{bail, Context as _};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Everything the command line can ask for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Target to run; the script default (or `help`) when absent
    pub target: Option<String>,

    /// Build script path; discovered when absent
    pub file: Option<PathBuf>,

    pub dry_run: bool,

    /// Property overrides, applied after the script's own properties
    pub properties: Vec<(String, String)>,

    pub verbosity: Verbosity,

    /// Send build output to `tracing` instead of the console
    pub use_tracing: bool,
}

impl Options {
    pub fn from_matches(matches: &ArgMatches) -> anyhow::Result<Self> {
        let properties = matches
            .get_many::<String>("property")
            .into_iter()
            .flatten()
            .map(|raw| parse_property(raw))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Options {
            target: matches.get_one::<String>("target").cloned(),
            file: matches.get_one::<String>("file").map(PathBuf::from),
            dry_run: matches.get_flag("dry-run"),
            properties,
            verbosity: get_verbosity(matches),
            use_tracing: matches.get_flag("tracing"),
        })
    }
}

/// Build the clap command
pub fn build_command() -> Command {
    Command::new("buildtree")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Runs targets from a buildtree.yml build script")
        .arg(
            Arg::new("target")
                .value_name("TARGET")
                .help("Target to run (defaults to the script's default target, then 'help')"),
        )
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .help("Path to the buildtree.yml build script"),
        )
        .arg(
            Arg::new("dry-run")
                .short('n')
                .long("dry-run")
                .help("Show what would run without side effects")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("property")
                .short('D')
                .long("property")
                .value_name("KEY=VALUE")
                .help("Set a build property")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only print errors")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("silent")
                .short('s')
                .long("silent")
                .help("Print no output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print verbose output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("tracing")
                .long("tracing")
                .help("Write build output as tracing events (filtered by RUST_LOG)")
                .action(ArgAction::SetTrue),
        )
}

/// Get verbosity level from matches
fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    if matches.get_flag("silent") {
        Verbosity::Silent
    } else if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

fn parse_property(raw: &str) -> anyhow::Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => bail!("invalid property '{}', expected KEY=VALUE", raw),
    }
}

fn init_tracing(options: &Options) {
    let fallback = match (options.use_tracing, options.verbosity) {
        (true, Verbosity::Verbose) => "debug",
        (true, _) => "info",
        (false, _) => "warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_writer(std::io::stderr)
        .try_init();
}

/// Load the build script and run the requested target.
///
/// Build failures are reported through the build log and turned into a
/// failing exit code; problems loading the script are returned as errors.
pub fn execute(options: &Options) -> anyhow::Result<ExitCode> {
    let script_path = match &options.file {
        Some(path) => path.clone(),
        None => find_build_script()?,
    };
    let script = parse_script_file(&script_path)
        .with_context(|| format!("failed to load {}", script_path.display()))?;
    let mut tree = build_target_tree(&script)
        .with_context(|| format!("invalid build script {}", script_path.display()))?;

    let logger: Box<dyn Logger> = if options.use_tracing {
        Box::new(TracingLogger)
    } else {
        Box::new(ConsoleLogger::new(options.verbosity))
    };
    let mut ctx = TaskContext::new(logger)
        .with_dry_run(options.dry_run)
        .with_working_dir(script_dir(&script_path))
        .with_properties(initial_properties(&script));
    for (key, value) in &options.properties {
        ctx.properties_mut().set(key.clone(), value.clone());
    }

    if options.dry_run {
        ctx.write_info("Dry run: tasks with side effects are skipped");
    }

    let started = Instant::now();
    let result = match &options.target {
        Some(target) => tree.run_target(&mut ctx, target),
        None => tree.run_default(&mut ctx),
    };
    let seconds = started.elapsed().as_secs_f64();

    match result {
        Ok(()) => {
            ctx.write_debug(&format!("Build succeeded (took {:.2}s)", seconds));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            ctx.write_error(&format!("Build failed: {}", e));
            if e.is_configuration_error() {
                ctx.write_info("Run 'buildtree help' to list the available targets");
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn script_dir(script_path: &Path) -> PathBuf {
    match script_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Run the CLI application with the process arguments
pub fn run() -> anyhow::Result<ExitCode> {
    let matches = build_command().get_matches();
    let options = Options::from_matches(&matches)?;
    init_tracing(&options);
    execute(&options)
}
