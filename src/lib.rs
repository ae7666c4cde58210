//! # Magpie - Workflow Definition DSL
//!
//! Magpie is a data model and fluent builder for describing workflows as
//! directed task graphs: a closed taxonomy of operators (`task`, `activity`,
//! `condition`, `wait`, `parallel`, `foreach`, `while`, `emit_event`,
//! `wait_for_event`, `switch`, `join`), a YAML/JSON wire codec that accepts
//! historical document shapes, and a Mermaid renderer for inspection.
//!
//! ## Core Modules
//!
//! - [`model`] - The operator taxonomy, shared envelope, and workflow container
//! - [`builder`] - Fluent, auto-threading construction of a [`model::Workflow`]
//! - [`codec`] - YAML/JSON encode/decode, including legacy-shape normalization
//! - [`mermaid`] - `stateDiagram-v2` projection for inspection and diagramming
//!
//! ## Example Usage
//!
//! ```rust
//! use magpie::builder::{TaskOpts, WorkflowBuilder};
//! use magpie::codec;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let workflow = WorkflowBuilder::new("etl", "2.0.0")?
//!     .task("extract", "jobs.extract", TaskOpts::default())
//!     .task("load", "jobs.load", TaskOpts::default())
//!     .build()
//!     .map_err(|errors| format!("{errors:?}"))?;
//!
//! let yaml = codec::encode_yaml(&workflow)?;
//! println!("{yaml}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Command-Line Interface
//!
//! Magpie provides a command-line tool for validating and rendering
//! workflow documents:
//!
//! ```bash
//! # Validate one or more workflow documents
//! magpie validate workflow.yaml
//!
//! # Render a workflow as a Mermaid state diagram
//! magpie render workflow.yaml -o diagram.mmd
//! ```

pub mod builder;
pub mod codec;
pub mod mermaid;
pub mod model;

pub use builder::WorkflowBuilder;
pub use model::Workflow;
