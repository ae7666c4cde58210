use clap::Parser;
use snafu::prelude::*;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod cmd;

use cmd::{RenderArgs, ValidateArgs, handle_render, handle_validate};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Validate error: {source}"))]
    Validate { source: cmd::validate::Error },

    #[snafu(display("Render error: {source}"))]
    Render { source: cmd::render::Error },
}

#[derive(Parser, Debug)]
#[command(name = "magpie")]
#[command(author = "Armin Graf")]
#[command(version = "0.1.0")]
#[command(about = "Build, validate, and render workflow definitions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug-level logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate workflow document(s) against the model's invariants
    Validate(ValidateArgs),
    /// Render a workflow as a Mermaid state diagram
    Render(RenderArgs),
}

/// Initialize tracing/logging.
fn init_tracing(verbose: bool) {
    let filter_layer = if verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"))
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Validate(args) => handle_validate(args).context(ValidateSnafu),
        Commands::Render(args) => handle_render(args).context(RenderSnafu),
    }
}
