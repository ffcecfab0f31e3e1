//! Unified tcprelay CLI.
//!
//! - `tcprelay serve` - Run the relay server
//! - `tcprelay check` - Validate a config file and print the effective relay settings
//!
//! The server can also be run as the standalone `tcprelay-server` binary.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tcprelay_config::{CliOverrides, apply_overrides, load_config, validate_config};

/// tcprelay unified CLI.
#[derive(Parser)]
#[command(
    name = "tcprelay",
    version,
    about = "Bidirectional TCP relay and port forwarder",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server.
    #[command(name = "serve", alias = "server")]
    Serve(Box<tcprelay_server::ServerArgs>),

    /// Validate a config file without starting the server.
    #[command(name = "check")]
    Check {
        /// Config file path (json/yaml/toml)
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,

        #[command(flatten)]
        overrides: CliOverrides,
    },
}

fn check(config: PathBuf, overrides: CliOverrides) -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = load_config(&config)?;
    apply_overrides(&mut cfg, &overrides);
    validate_config(&cfg)?;
    let opts = cfg.relay_options();
    opts.validate()?;
    println!(
        "{}: ok (listen {} -> remote {}, connect timeout {:?}, io timeout {:?}, buffer {} bytes)",
        config.display(),
        cfg.server.listen,
        opts.remote_addr,
        opts.connect_timeout,
        opts.io_timeout,
        opts.buffer_size
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => tcprelay_server::cli::run(*args).await,
        Commands::Check { config, overrides } => check(config, overrides),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
