use magpie::builder::{EnvelopeOpts, TaskOpts, WorkflowBuilder};
use magpie::codec;
use magpie::model::operator::WaitFor;

fn sample() -> magpie::Workflow {
    WorkflowBuilder::new("pipeline", "2.0.0")
        .unwrap()
        .task("extract", "jobs.extract", TaskOpts::default())
        .wait("pause", WaitFor::Duration(std::time::Duration::from_secs(3600)), EnvelopeOpts::default())
        .condition(
            "route",
            "result.ok",
            |b| b.task("hi", "jobs.hi", TaskOpts::default()),
            |b| b.task("lo", "jobs.lo", TaskOpts::default()),
            EnvelopeOpts::default(),
        )
        .parallel(
            "deploy",
            vec![(
                "api".to_string(),
                Box::new(|b: WorkflowBuilder| b.task("deploy_api", "d.api", TaskOpts::default())) as _,
            )],
            EnvelopeOpts::default(),
        )
        .build()
        .unwrap()
}

#[test]
fn yaml_round_trip_preserves_task_set_and_fields() {
    let wf = sample();
    let yaml = codec::encode_yaml(&wf).unwrap();
    let decoded = codec::decode_yaml(&yaml).unwrap();
    assert_eq!(decoded, wf);
}

#[test]
fn json_round_trip_preserves_task_set_and_fields() {
    let wf = sample();
    let json = codec::encode_json(&wf).unwrap();
    let decoded = codec::decode_json(&json).unwrap();
    assert_eq!(decoded, wf);
}

#[test]
fn cross_format_round_trip_is_stable_both_directions() {
    let wf = sample();

    let via_yaml = codec::decode_yaml(&codec::encode_yaml(&wf).unwrap()).unwrap();
    let back_through_json = codec::decode_json(&codec::encode_json(&via_yaml).unwrap()).unwrap();
    assert_eq!(back_through_json, wf);

    let via_json = codec::decode_json(&codec::encode_json(&wf).unwrap()).unwrap();
    let back_through_yaml = codec::decode_yaml(&codec::encode_yaml(&via_json).unwrap()).unwrap();
    assert_eq!(back_through_yaml, wf);
}

#[test]
fn dependencies_stay_sorted_and_deduplicated_across_the_graph() {
    let wf = sample();
    for op in wf.tasks.values() {
        let deps = op.dependencies();
        let mut sorted = deps.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(deps, sorted.as_slice(), "task '{}' deps not canonical", op.task_id());
    }
}

#[test]
fn parallel_branch_sub_workflow_round_trips_independently() {
    let wf = sample();
    match &wf.tasks["deploy"] {
        magpie::model::operator::Operator::Parallel(p) => {
            let branch = &p.fields.branch_workflows["api"];
            let yaml = codec::encode_yaml(branch).unwrap();
            let decoded = codec::decode_yaml(&yaml).unwrap();
            assert_eq!(&decoded, branch);
        }
        other => panic!("expected parallel, got {other:?}"),
    }
}
