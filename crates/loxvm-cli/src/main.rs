//! `loxvm` - the host driver for the loxvm bytecode virtual machine.
//!
//! Loads a serialized chunk, wires up logging and configuration, runs it
//! through `loxvm-vm`, and reports diagnostics and the process exit code
//! (`SPEC_FULL.md` §0).

mod commands;
mod config;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{init, run as run_cmd};
use config::Config;
use error::Result;

/// loxvm - a bytecode virtual machine for a Lox-family scripting language.
#[derive(Parser, Debug)]
#[command(name = "loxvm")]
#[command(author = "loxvm contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run compiled loxvm bytecode chunks", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true, env = "LOXVM_VERBOSE")]
    verbose: bool,

    /// Path to a `loxvm.toml` project config, overriding the search order.
    #[arg(short, long, global = true, env = "LOXVM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a compiled chunk file.
    Run(RunCommand),

    /// Scaffold a fresh `loxvm.toml` project config.
    Init(InitCommand),
}

#[derive(Parser, Debug)]
struct RunCommand {
    /// Path to a `bincode`-serialized chunk.
    chunk: PathBuf,

    /// Override the GC's initial allocation threshold, in bytes.
    #[arg(long)]
    gc_initial_threshold: Option<usize>,

    /// Override the GC's threshold growth factor.
    #[arg(long)]
    gc_growth_factor: Option<usize>,

    /// Override the maximum live call-frame depth.
    #[arg(long)]
    frames_max: Option<usize>,
}

#[derive(Parser, Debug)]
struct InitCommand {
    /// Directory to initialize (default: current directory).
    path: Option<PathBuf>,

    /// Overwrite an existing `loxvm.toml`.
    #[arg(short, long)]
    force: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match dispatch(cli) {
        Ok(code) => code,
        Err(err) => {
            log::error!("{err}");
            err.exit_code()
        }
    };
    std::process::exit(exit_code);
}

/// Install `env_logger`, defaulting to `info` unless `-v`/`RUST_LOG` asks
/// for more (`SPEC_FULL.md` §10.2).
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

fn dispatch(cli: Cli) -> Result<i32> {
    let mut config = load_config(cli.config.as_deref())?;
    config.verbose = config.verbose || cli.verbose;

    match cli.command {
        Commands::Run(args) => {
            let mut vm_config = config.to_vm_config();
            if let Some(v) = args.gc_initial_threshold {
                vm_config.gc_initial_threshold = v;
            }
            if let Some(v) = args.gc_growth_factor {
                vm_config.gc_growth_factor = v;
            }
            if let Some(v) = args.frames_max {
                vm_config.frames_max = v;
            }
            run_cmd::run(run_cmd::RunArgs { chunk: args.chunk, vm_config })
        }
        Commands::Init(args) => {
            init::run(init::InitArgs { verbose: config.verbose, force: args.force, path: args.path })?;
            Ok(0)
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_with_a_chunk_path() {
        let cli = Cli::parse_from(["loxvm", "run", "program.chunk"]);
        match cli.command {
            Commands::Run(args) => assert_eq!(args.chunk, PathBuf::from("program.chunk")),
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_run_with_limit_overrides() {
        let cli = Cli::parse_from(["loxvm", "run", "p.chunk", "--frames-max", "32"]);
        match cli.command {
            Commands::Run(args) => assert_eq!(args.frames_max, Some(32)),
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_init_with_force() {
        let cli = Cli::parse_from(["loxvm", "init", "--force"]);
        match cli.command {
            Commands::Init(args) => assert!(args.force),
            _ => panic!("expected Init command"),
        }
    }

    #[test]
    fn cli_parses_global_verbose_before_subcommand() {
        let cli = Cli::parse_from(["loxvm", "--verbose", "init"]);
        assert!(cli.verbose);
    }
}
