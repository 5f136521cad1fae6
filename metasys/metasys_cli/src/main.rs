use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use metasys_core::LogLevel;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod config;

use commands::{fs, net, process};
use config::CliConfig;

/// Metasys Command Line Interface
///
/// Small file, network and process tools built on the Metasys handle
/// wrappers.
#[derive(Parser)]
#[clap(name = "metasys", author, version, about)]
struct Cli {
    /// TOML configuration file
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Log level: error, warning, info, debug or trace
    #[clap(long, global = true)]
    log_level: Option<LogLevel>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy files to standard output
    Cat(fs::CatArgs),

    /// Write text to a file
    Write(fs::WriteArgs),

    /// List a directory
    Ls(fs::LsArgs),

    /// Show file status
    Stat(fs::StatArgs),

    /// Resolve a host and service to IPv4 TCP addresses
    Resolve(net::ResolveArgs),

    /// Check that a TCP endpoint accepts connections
    Probe(net::ProbeArgs),

    /// Run an epoll echo server
    Serve(net::ServeArgs),

    /// Run a program in a child process
    Run(process::RunArgs),

    /// Print the effective configuration as JSON
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("metasys: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<ExitCode> {
    let mut config = match &cli.config {
        Some(path) => CliConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => CliConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    env_logger::Builder::new()
        .filter_level(config.log_level.to_filter())
        .parse_default_env()
        .init();
    log::debug!("effective configuration: {:?}", config);

    match cli.command {
        Commands::Cat(args) => fs::execute_cat(&args, config.buffer_size)?,
        Commands::Write(args) => fs::execute_write(&args)?,
        Commands::Ls(args) => fs::execute_ls(&args)?,
        Commands::Stat(args) => fs::execute_stat(&args)?,
        Commands::Resolve(args) => net::execute_resolve(&args)?,
        Commands::Probe(args) => net::execute_probe(&args)?,
        Commands::Serve(args) => net::execute_serve(&args, &config.serve, config.buffer_size)?,
        Commands::Run(args) => {
            let status = process::execute_run(&args)?;
            return Ok(ExitCode::from(process::exit_code(status)));
        }
        Commands::Config => {
            println!("{}", config.to_json()?);
        }
    }
    Ok(ExitCode::SUCCESS)
}
