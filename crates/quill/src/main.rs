//! Quill CLI - blog markup compiler.
//!
//! Provides commands for:
//! - `render`: Compile markdown posts to HTML, encrypting protected content
//! - `decrypt`: Unlock a compiled page with its password

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{DecryptArgs, RenderArgs};
use output::Output;

/// Quill - blog markup compiler.
#[derive(Parser)]
#[command(name = "quill", version, about)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile markdown posts to HTML.
    Render(RenderArgs),
    /// Unlock an encrypted page and print its content.
    Decrypt(DecryptArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Render(args) => args.execute(),
        Commands::Decrypt(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
