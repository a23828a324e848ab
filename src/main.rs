//! treewalk command line
//!
//! Runs the configured actions with the current directory as source tree.

use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use treewalk::{DryRunner, Registry, RuleEngine, ShellRunner, Walker};

#[derive(Parser, Debug)]
#[command(name = "treewalk")]
#[command(author, version, about = "XML configurable tree walking")]
struct Cli {
    /// Configuration file
    #[arg(short = 'f', long, value_name = "FILE", default_value = treewalk::config::DEFAULT_CONFIG)]
    config: PathBuf,

    /// Options declared by the config file, separated by ','
    #[arg(short = 'a', long = "options", value_name = "OPTIONS", value_delimiter = ',')]
    options: Vec<String>,

    /// Interactive mode
    #[arg(short, long)]
    interactive: bool,

    /// Verbosity level (0-3)
    #[arg(short, long, value_name = "LVL", default_value_t = 0)]
    verbose: u8,

    /// Print the commands instead of running them
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// List the options declared by the config file and exit
    #[arg(short, long)]
    list_options: bool,

    /// Destination tree
    #[arg(value_name = "PATH", required_unless_present = "list_options")]
    dest: Option<PathBuf>,
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("TREEWALK_LOG").unwrap_or_else(|_| log_level.to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn print_options(registry: &Registry) {
    if registry.options.is_empty() {
        return;
    }
    println!("Valid options:");
    for line in registry.option_help() {
        println!("{line}");
    }
}

fn run(cli: Cli) -> Result<()> {
    let registry = Registry::load(&cli.config)?;

    if cli.list_options {
        print_options(&registry);
        return Ok(());
    }

    let options = match registry.option_set(&cli.options) {
        Ok(options) => options,
        Err(e) => {
            print_options(&registry);
            return Err(e.into());
        }
    };

    let dest = cli.dest.context("missing destination tree")?;
    let source = std::env::current_dir().context("Could not determine current directory")?;

    if cli.interactive {
        debug!("Interactive mode requested");
    }
    info!(
        "Walking {} -> {} with options [{}]",
        source.display(),
        dest.display(),
        options.iter().collect::<Vec<_>>().join(",")
    );

    let engine = RuleEngine::new(&registry, options);
    if cli.dry_run {
        let stats = Walker::new(&engine, source, dest, DryRunner::default()).run()?;
        info!("Dry run planned {} commands", stats.commands);
    } else {
        Walker::new(&engine, source, dest, ShellRunner::new()).run()?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
