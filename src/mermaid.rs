//! The Mermaid renderer (C5): a deterministic projection of a [`Workflow`]
//! to `stateDiagram-v2` text, including composite states for containers
//! (spec.md §4.5).

use std::collections::HashSet;

use crate::model::operator::Operator;
use crate::model::workflow::Workflow;

/// Seam shared by the CLI's `render` subcommand, modeled on the teacher's
/// `VisualizationProvider` trait, even though Mermaid is the only
/// implementation shipped.
pub trait Render {
    fn generate_source(&self, workflow: &Workflow) -> String;
}

pub struct MermaidRenderer;

impl Render for MermaidRenderer {
    fn generate_source(&self, workflow: &Workflow) -> String {
        to_mermaid(workflow)
    }
}

/// Project `workflow` to a `stateDiagram-v2` text block. Line-oriented and
/// deterministic given `workflow.tasks`'s iteration order.
#[must_use]
pub fn to_mermaid(workflow: &Workflow) -> String {
    let mut lines = vec!["stateDiagram-v2".to_string()];

    let all_dependencies: HashSet<&str> = workflow
        .tasks
        .values()
        .flat_map(|op| op.dependencies().iter().map(String::as_str))
        .collect();

    for (task_id, op) in &workflow.tasks {
        let env = op.envelope();
        let is_loop_container = matches!(op, Operator::ForEach(_) | Operator::While(_));

        if !env.description.is_empty() && !is_loop_container {
            lines.push(format!("    state \"{}\" as {task_id}", env.description));
        }

        if env.dependencies.is_empty() {
            let is_entry = workflow.start_task.as_deref() == Some(task_id.as_str())
                || workflow.start_task.is_none();
            if is_entry {
                lines.push(format!("    [*] --> {task_id}"));
            }
        } else {
            for dep in &env.dependencies {
                lines.push(format!("    {dep} --> {task_id}"));
            }
        }

        let mut has_branch_target = false;
        if let Operator::Condition(c) = op {
            if let Some(target) = &c.fields.if_true {
                lines.push(format!("    {task_id} --> {target} : True"));
                has_branch_target = true;
            }
            if let Some(target) = &c.fields.if_false {
                lines.push(format!("    {task_id} --> {target} : False"));
                has_branch_target = true;
            }
        }

        if let Operator::Parallel(p) = op {
            lines.push(format!("    state {task_id} {{"));
            let branch_count = p.fields.branches.len();
            for (i, branch_name) in p.fields.branches.keys().enumerate() {
                lines.push(format!("        state \"Branch {}\" as {branch_name}", i + 1));
                if i + 1 < branch_count {
                    lines.push("        --".to_string());
                }
            }
            lines.push("    }".to_string());
        }

        if let Operator::ForEach(f) = op {
            lines.push(format!("    state {task_id} {{"));
            push_loop_body_states(&mut lines, &f.fields.loop_body);
            lines.push("    }".to_string());
        }

        if let Operator::While(w) = op {
            lines.push(format!("    state {task_id} {{"));
            push_loop_body_states(&mut lines, &w.fields.loop_body);
            lines.push("    }".to_string());
        }

        if !all_dependencies.contains(task_id.as_str()) && !has_branch_target {
            lines.push(format!("    {task_id} --> [*]"));
        }
    }

    lines.join("\n")
}

fn push_loop_body_states(lines: &mut Vec<String>, loop_body: &[Operator]) {
    for sub in loop_body {
        let sub_env = sub.envelope();
        if sub_env.description.is_empty() {
            lines.push(format!("        {}", sub.task_id()));
        } else {
            lines.push(format!("        state \"{}\" as {}", sub_env.description, sub.task_id()));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::{EnvelopeOpts, TaskOpts, WorkflowBuilder};

    use super::*;

    #[test]
    fn linear_chain_renders_entry_edges_and_exit() {
        let wf = WorkflowBuilder::new("w", "2.0.0")
            .unwrap()
            .task("extract", "f.e", TaskOpts::default())
            .task("load", "f.l", TaskOpts::default())
            .build()
            .unwrap();

        let mermaid = to_mermaid(&wf);
        assert!(mermaid.starts_with("stateDiagram-v2"));
        assert!(mermaid.contains("[*] --> extract"));
        assert!(mermaid.contains("extract --> load"));
        assert!(mermaid.contains("load --> [*]"));
        assert!(!mermaid.contains("extract --> [*]"));
    }

    #[test]
    fn condition_renders_labeled_transitions() {
        let wf = WorkflowBuilder::new("w", "2.0.0")
            .unwrap()
            .condition(
                "route",
                "x > 0",
                |b| b.task("hi", "f.h", TaskOpts::default()),
                |b| b.task("lo", "f.l", TaskOpts::default()),
                EnvelopeOpts::default(),
            )
            .build()
            .unwrap();

        let mermaid = to_mermaid(&wf);
        assert!(mermaid.contains("route --> hi : True"));
        assert!(mermaid.contains("route --> lo : False"));
        assert!(!mermaid.contains("route --> [*]"));
    }

    #[test]
    fn parallel_renders_composite_branch_state() {
        let wf = WorkflowBuilder::new("w", "2.0.0")
            .unwrap()
            .parallel(
                "deploy",
                vec![(
                    "api".to_string(),
                    Box::new(|b: WorkflowBuilder| b.task("deploy_api", "d.api", TaskOpts::default())) as _,
                )],
                EnvelopeOpts::default(),
            )
            .build()
            .unwrap();

        let mermaid = to_mermaid(&wf);
        assert!(mermaid.contains("state deploy {"));
        assert!(mermaid.contains("state \"Branch 1\" as api"));
    }

    #[test]
    fn foreach_renders_loop_body_composite_state() {
        let wf = WorkflowBuilder::new("w", "2.0.0")
            .unwrap()
            .foreach(
                "each_order",
                "orders",
                false,
                |b| b.task("ship", "f.ship", TaskOpts::default()),
                EnvelopeOpts::default(),
            )
            .build()
            .unwrap();

        let mermaid = to_mermaid(&wf);
        assert!(mermaid.contains("state each_order {"));
        assert!(mermaid.contains("        ship"));
    }
}
