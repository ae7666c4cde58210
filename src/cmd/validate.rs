use std::path::PathBuf;

use clap::Parser;
use console::style;
use snafu::prelude::*;

use magpie::codec;

use super::is_json_path;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read '{}': {source}", path.display()))]
    Io { path: PathBuf, source: std::io::Error },

    #[snafu(display("failed to decode '{}': {source}", path.display()))]
    Decode { path: PathBuf, source: codec::Error },

    #[snafu(display("{count} workflow(s) failed validation"))]
    AnyFailed { count: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Workflow file(s) to validate (YAML or JSON, sniffed by extension)
    #[arg(required = true, value_name = "WORKFLOW")]
    pub workflows: Vec<PathBuf>,

    /// Print the task count on success
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

fn validate_one(path: &PathBuf) -> Result<usize> {
    tracing::debug!(path = %path.display(), "validating workflow file");
    let text = std::fs::read_to_string(path).context(IoSnafu { path: path.clone() })?;
    let workflow = if is_json_path(path) {
        codec::decode_json_validated(&text)
    } else {
        codec::decode_yaml_validated(&text)
    }
    .context(DecodeSnafu { path: path.clone() })?;
    tracing::debug!(path = %path.display(), tasks = workflow.tasks.len(), "workflow validated");
    Ok(workflow.tasks.len())
}

pub fn handle_validate(args: ValidateArgs) -> Result<()> {
    let mut failed = 0;

    for path in &args.workflows {
        print!("{} {} ... ", style("Validating").bold().cyan(), path.display());
        match validate_one(path) {
            Ok(task_count) => {
                println!("{}", style("ok").green().bold());
                if args.verbose {
                    println!("  {task_count} task(s)");
                }
            }
            Err(e) => {
                failed += 1;
                println!("{}", style("failed").red().bold());
                println!("  {e}");
            }
        }
    }

    if failed > 0 {
        return Err(Error::AnyFailed { count: failed });
    }
    Ok(())
}
