//! Baler CLI - fast asset bundler with hot stylesheet updates.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use baler_build::BuildMode;

mod commands;

#[derive(Parser)]
#[command(name = "baler")]
#[command(about = "Fast asset bundler with hot stylesheet updates")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to baler.toml config file
    #[arg(short, long, default_value = "baler.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a project in the current directory
    Init {
        /// Skip interactive prompts, use defaults
        #[arg(short, long)]
        yes: bool,
    },

    /// Start development server with hot updates
    Dev {
        /// Port to listen on (defaults to config or 8080)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind (defaults to config or "localhost")
        #[arg(long)]
        host: Option<String>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Build bundles once and write them to the output directory
    Build {
        /// Build mode (falls back to BALER_MODE, then development)
        #[arg(short, long)]
        mode: Option<BuildMode>,

        /// Output directory (defaults to config or "dist")
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip minification
        #[arg(long)]
        no_minify: bool,
    },

    /// Preview built output
    Serve {
        /// Port to listen on (defaults to config or 8080)
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory to serve (defaults to config or "dist")
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    // Execute command
    match cli.command {
        Commands::Init { yes } => {
            commands::init::run(yes).await?;
        }
        Commands::Dev {
            port,
            host,
            no_open,
        } => {
            commands::dev::run(&cli.config, port, host, !no_open).await?;
        }
        Commands::Build {
            mode,
            output,
            no_minify,
        } => {
            let env_mode = std::env::var("BALER_MODE").ok();
            let mode = BuildMode::resolve(mode, env_mode.as_deref());
            let minify = if no_minify { Some(false) } else { None };
            commands::build::run(&cli.config, mode, output, minify).await?;
        }
        Commands::Serve { port, dir, no_open } => {
            commands::serve::run(&cli.config, port, dir, !no_open).await?;
        }
    }

    Ok(())
}
