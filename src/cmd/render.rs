use std::path::PathBuf;

use clap::Parser;
use snafu::prelude::*;

use magpie::codec;
use magpie::mermaid::to_mermaid;

use super::is_json_path;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read '{}': {source}", workflow.display()))]
    Io { workflow: PathBuf, source: std::io::Error },

    #[snafu(display("failed to decode '{}': {source}", workflow.display()))]
    Decode { workflow: PathBuf, source: codec::Error },

    #[snafu(display("failed to write '{}': {source}", output.display()))]
    Write { output: PathBuf, source: std::io::Error },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Parser, Debug)]
pub struct RenderArgs {
    /// Workflow file to render (YAML or JSON, sniffed by extension)
    #[arg(value_name = "WORKFLOW")]
    pub workflow: PathBuf,

    /// Write the Mermaid source here instead of stdout
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

pub fn handle_render(args: RenderArgs) -> Result<()> {
    tracing::debug!(workflow = %args.workflow.display(), "rendering workflow file");
    let text = std::fs::read_to_string(&args.workflow).context(IoSnafu {
        workflow: args.workflow.clone(),
    })?;
    let workflow = if is_json_path(&args.workflow) {
        codec::decode_json(&text)
    } else {
        codec::decode_yaml(&text)
    }
    .context(DecodeSnafu {
        workflow: args.workflow.clone(),
    })?;

    let mermaid = to_mermaid(&workflow);

    match &args.output {
        Some(output) => {
            tracing::debug!(output = %output.display(), "writing mermaid source");
            std::fs::write(output, mermaid).context(WriteSnafu { output: output.clone() })?;
        }
        None => println!("{mermaid}"),
    }
    Ok(())
}
