//! Bidirectional YAML/JSON encoding (C3): polymorphic dispatch on
//! `operator_type`, legacy-shape normalization, and the round-trip law
//! `decode(encode(w)) == w` (spec.md §8).

mod legacy;

use snafu::prelude::*;

use crate::model::workflow::{self, Workflow};

#[derive(Debug, snafu::Snafu)]
pub enum Error {
    #[snafu(display("failed to parse YAML: {source}"))]
    YamlParse { source: serde_yaml::Error },

    #[snafu(display("failed to parse JSON: {source}"))]
    JsonParse { source: serde_json::Error },

    #[snafu(display("failed to decode workflow: {source}"))]
    Deserialize { source: serde_json::Error },

    #[snafu(display("failed to encode workflow as YAML: {source}"))]
    EncodeYaml { source: serde_yaml::Error },

    #[snafu(display("failed to encode workflow as JSON: {source}"))]
    EncodeJson { source: serde_json::Error },

    #[snafu(display("task '{task_id}' has unknown operator_type '{tag}'"))]
    UnknownOperatorType { task_id: String, tag: String },

    #[snafu(display("task '{task_id}' is missing required field '{field}'"))]
    MissingField { task_id: String, field: String },

    #[snafu(display("decoded workflow failed validation: {source}"))]
    Validation { source: workflow::ValidationError },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Decode a YAML document into a [`Workflow`], accepting every historical
/// shape spec.md §6 lists (missing phase-2+ fields, legacy `task_chain`,
/// legacy sibling-task `Parallel` branches).
///
/// # Errors
/// Returns [`Error::YamlParse`] on malformed YAML, [`Error::UnknownOperatorType`]
/// / [`Error::MissingField`] on an unrecognized or absent discriminator, or
/// [`Error::Deserialize`] if the normalized tree doesn't match the model.
pub fn decode_yaml(text: &str) -> Result<Workflow> {
    let mut value: serde_json::Value = serde_yaml::from_str(text).context(YamlParseSnafu)?;
    normalize(&mut value)?;
    serde_json::from_value(value).context(DeserializeSnafu)
}

/// # Errors
/// See [`decode_yaml`]; returns [`Error::JsonParse`] instead of
/// [`Error::YamlParse`] on malformed input.
pub fn decode_json(text: &str) -> Result<Workflow> {
    let mut value: serde_json::Value = serde_json::from_str(text).context(JsonParseSnafu)?;
    normalize(&mut value)?;
    serde_json::from_value(value).context(DeserializeSnafu)
}

/// Decode then run the full I1-I8 check (spec.md §4.4: "implementations may
/// run it at decode time and/or at build finalization"). Kept as a separate
/// entry point so callers that want tolerant decoding of partially-formed
/// documents (e.g. inspection tools) can still use [`decode_yaml`] directly.
///
/// # Errors
/// See [`decode_yaml`], plus [`Error::Validation`] if the decoded workflow
/// fails [`Workflow::validate`].
pub fn decode_yaml_validated(text: &str) -> Result<Workflow> {
    let workflow = decode_yaml(text)?;
    workflow.validate().context(ValidationSnafu)?;
    Ok(workflow)
}

/// # Errors
/// See [`decode_yaml_validated`].
pub fn decode_json_validated(text: &str) -> Result<Workflow> {
    let workflow = decode_json(text)?;
    workflow.validate().context(ValidationSnafu)?;
    Ok(workflow)
}

fn normalize(value: &mut serde_json::Value) -> Result<()> {
    if let Some(tasks) = value.get_mut("tasks").and_then(|v| v.as_object_mut()) {
        legacy::normalize_foreach_task_chain(tasks);
    }
    legacy::normalize_legacy_parallel(value);

    if let Some(tasks) = value.get("tasks").and_then(|v| v.as_object()) {
        for (task_id, task) in tasks {
            legacy::check_known_operator_types(task, task_id)?;
        }
    }
    Ok(())
}

/// Block-style YAML, no flow collections, unset optionals omitted (they
/// are simply never present in the serde model thanks to
/// `skip_serializing_if`).
///
/// # Errors
/// Returns [`Error::EncodeYaml`] on serialization failure.
pub fn encode_yaml(workflow: &Workflow) -> Result<String> {
    serde_yaml::to_string(workflow).context(EncodeYamlSnafu)
}

/// # Errors
/// Returns [`Error::EncodeJson`] on serialization failure.
pub fn encode_json(workflow: &Workflow) -> Result<String> {
    serde_json::to_string_pretty(workflow).context(EncodeJsonSnafu)
}
