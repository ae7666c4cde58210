//! Normalization of historical wire shapes into the modern in-memory form
//! (spec.md §9 "Legacy `task_chain` / old Parallel encoding"). Runs on the
//! raw [`serde_json::Value`] tree before it is deserialized into
//! [`crate::model::Workflow`], so the typed model never has to represent
//! shapes it no longer emits.

use serde_json::{Map, Value};

use crate::model::operator;

/// `ForEach.task_chain: [task_id]` instead of `loop_body: [Operator]`. The
/// referenced tasks are assumed to sit as siblings in the same task map
/// (the only shape the historical encoder produced); they are moved into
/// `loop_body` and removed from the parent map.
pub fn normalize_foreach_task_chain(tasks: &mut Map<String, Value>) {
    let keys: Vec<String> = tasks.keys().cloned().collect();
    for key in keys {
        let Some(task) = tasks.get(&key) else { continue };
        let is_legacy_foreach = task.get("operator_type").and_then(Value::as_str) == Some("foreach")
            && task.get("task_chain").is_some()
            && task.get("loop_body").is_none();
        if !is_legacy_foreach {
            continue;
        }

        let chain_ids: Vec<String> = task
            .get("task_chain")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let mut loop_body = Vec::new();
        for id in &chain_ids {
            if let Some(mut t) = tasks.get(id).cloned() {
                if let Some(obj) = t.as_object_mut() {
                    obj.insert("is_internal_loop_task".to_string(), Value::Bool(true));
                }
                loop_body.push(t);
            }
        }

        if let Some(obj) = tasks.get_mut(&key).and_then(Value::as_object_mut) {
            obj.remove("task_chain");
            obj.insert("loop_body".to_string(), Value::Array(loop_body));
        }
        for id in &chain_ids {
            tasks.remove(id);
        }
    }
}

/// Parallel branch bodies as sibling tasks in the parent map, with the
/// parallel id injected into their `dependencies` (the pre-fork-only
/// shape). Lifts each branch's tasks into a synthetic `branch_workflows`
/// sub-workflow, strips the injected dependency, and marks them internal
/// (I7, I8), removing them from the parent map.
pub fn normalize_legacy_parallel(root: &mut Value) {
    let version = root
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or("2.0.0")
        .to_string();

    let Some(tasks) = root.get_mut("tasks").and_then(Value::as_object_mut) else {
        return;
    };

    let keys: Vec<String> = tasks.keys().cloned().collect();
    for key in keys {
        let needs_fork = tasks.get(&key).is_some_and(|v| {
            v.get("operator_type").and_then(Value::as_str) == Some("parallel")
                && v.get("branch_workflows")
                    .and_then(Value::as_object)
                    .is_none_or(Map::is_empty)
                && v.get("branches")
                    .and_then(Value::as_object)
                    .is_some_and(|m| !m.is_empty())
        });
        if !needs_fork {
            continue;
        }

        let branches: Map<String, Value> = tasks
            .get(&key)
            .and_then(|v| v.get("branches"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let mut branch_workflows = Map::new();

        for (branch_name, ids_value) in &branches {
            let ids: Vec<String> = ids_value
                .as_array()
                .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default();

            let mut branch_tasks = Map::new();
            for id in &ids {
                if let Some(mut t) = tasks.remove(id) {
                    if let Some(obj) = t.as_object_mut() {
                        obj.insert("is_internal_parallel_task".to_string(), Value::Bool(true));
                        if let Some(deps) = obj.get_mut("dependencies").and_then(Value::as_array_mut) {
                            deps.retain(|d| d.as_str() != Some(key.as_str()));
                        }
                    }
                    branch_tasks.insert(id.clone(), t);
                }
            }

            let sub_name = format!("{key}_{branch_name}").to_lowercase();
            branch_workflows.insert(
                branch_name.clone(),
                serde_json::json!({
                    "name": sub_name,
                    "version": version,
                    "tasks": branch_tasks,
                }),
            );
        }

        if let Some(obj) = tasks.get_mut(&key).and_then(Value::as_object_mut) {
            obj.insert("branch_workflows".to_string(), Value::Object(branch_workflows));
        }
    }
}

/// Recursively check every task's `operator_type` against the closed set
/// (spec.md §4.3 "If `operator_type` is missing or unknown, fail").
pub fn check_known_operator_types(task: &Value, task_id: &str) -> Result<(), super::Error> {
    match task.get("operator_type").and_then(Value::as_str) {
        Some(tag) if operator::is_known_operator_type(tag) => {}
        Some(tag) => {
            return Err(super::Error::UnknownOperatorType {
                task_id: task_id.to_string(),
                tag: tag.to_string(),
            });
        }
        None => {
            return Err(super::Error::MissingField {
                task_id: task_id.to_string(),
                field: "operator_type".to_string(),
            });
        }
    }

    if let Some(body) = task.get("loop_body").and_then(Value::as_array) {
        for (i, sub) in body.iter().enumerate() {
            check_known_operator_types(sub, &format!("{task_id}[{i}]"))?;
        }
    }
    if let Some(branch_workflows) = task.get("branch_workflows").and_then(Value::as_object) {
        for (branch_name, wf) in branch_workflows {
            if let Some(branch_tasks) = wf.get("tasks").and_then(Value::as_object) {
                for (sub_id, sub_task) in branch_tasks {
                    check_known_operator_types(sub_task, &format!("{task_id}.{branch_name}.{sub_id}"))?;
                }
            }
        }
    }
    Ok(())
}
