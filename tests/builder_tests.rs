use magpie::builder::{EnvelopeOpts, TaskOpts, WorkflowBuilder};
use magpie::model::envelope::{JoinMode, TriggerRule};
use magpie::model::operator::Operator;

#[test]
fn linear_chain_auto_threads_and_defaults_start_task() {
    let wf = WorkflowBuilder::new("etl", "2.0.0")
        .unwrap()
        .task("extract", "jobs.extract", TaskOpts::default())
        .task("transform", "jobs.transform", TaskOpts::default())
        .task("load", "jobs.load", TaskOpts::default())
        .build()
        .unwrap();

    assert_eq!(wf.start_task.as_deref(), Some("extract"));
    assert_eq!(wf.tasks["transform"].dependencies(), [String::from("extract")]);
    assert_eq!(wf.tasks["load"].dependencies(), [String::from("transform")]);
}

#[test]
fn on_success_handler_breaks_auto_chain() {
    let wf = WorkflowBuilder::new("w", "2.0.0")
        .unwrap()
        .task("charge", "billing.charge", TaskOpts::default())
        .on_success("notify")
        .task("notify", "billing.notify", TaskOpts::default())
        .build()
        .unwrap();

    assert!(wf.tasks["notify"].dependencies().is_empty());
    assert_eq!(wf.tasks["charge"].envelope().on_success_task_id.as_deref(), Some("notify"));
}

#[test]
fn switch_and_join_round_trip_through_builder() {
    let mut cases = indexmap::IndexMap::new();
    cases.insert("gold".to_string(), "ship_gold".to_string());
    cases.insert("silver".to_string(), "ship_silver".to_string());

    let wf = WorkflowBuilder::new("w", "2.0.0")
        .unwrap()
        .task("classify", "tier.classify", TaskOpts::default())
        .switch("route", "tier", cases, Some("ship_standard".to_string()), EnvelopeOpts::default())
        .task("ship_gold", "ship.gold", TaskOpts::default())
        .task("ship_silver", "ship.silver", TaskOpts::default())
        .task("ship_standard", "ship.standard", TaskOpts::default())
        .join(
            "all_shipped",
            vec!["ship_gold".to_string(), "ship_silver".to_string(), "ship_standard".to_string()],
            JoinMode::AnyOf,
            EnvelopeOpts {
                dependencies: vec![
                    "ship_gold".to_string(),
                    "ship_silver".to_string(),
                    "ship_standard".to_string(),
                ],
                ..Default::default()
            },
        )
        .build()
        .unwrap();

    match &wf.tasks["route"] {
        Operator::Switch(s) => {
            assert_eq!(s.fields.cases["gold"], "ship_gold");
            assert_eq!(s.fields.default.as_deref(), Some("ship_standard"));
        }
        other => panic!("expected switch, got {other:?}"),
    }
    match &wf.tasks["all_shipped"] {
        Operator::Join(j) => assert_eq!(j.fields.join_mode, JoinMode::AnyOf),
        other => panic!("expected join, got {other:?}"),
    }
}

#[test]
fn retry_only_applies_to_task_not_activity() {
    let policy = magpie::model::envelope::RetryPolicy {
        max_retries: 3,
        delay: std::time::Duration::from_secs(5),
        backoff_factor: 2.0,
    };

    let wf = WorkflowBuilder::new("w", "2.0.0")
        .unwrap()
        .activity("long_job", "jobs.long", TaskOpts::default())
        .retry(policy.clone())
        .build()
        .unwrap();

    assert!(wf.tasks["long_job"].envelope().retry_policy.is_none());
}

#[test]
fn default_trigger_rule_is_all_success() {
    let wf = WorkflowBuilder::new("w", "2.0.0")
        .unwrap()
        .task("a", "f.a", TaskOpts::default())
        .build()
        .unwrap();

    assert_eq!(wf.tasks["a"].envelope().trigger_rule, TriggerRule::AllSuccess);
}
