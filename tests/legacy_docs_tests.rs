use magpie::codec;
use magpie::model::operator::Operator;

#[test]
fn legacy_duration_and_datetime_prefixes_decode() {
    let yaml = r"
name: legacy_waits
tasks:
  pause:
    operator_type: wait
    wait_for: 'duration:1800'
  resume_at:
    operator_type: wait
    wait_for: 'datetime:2026-01-01T00:00:00Z'
    dependencies: [pause]
";
    let wf = codec::decode_yaml(yaml).unwrap();
    match &wf.tasks["pause"] {
        Operator::Wait(w) => {
            assert_eq!(w.fields.wait_for, magpie::model::operator::WaitFor::Duration(std::time::Duration::from_secs(1800)));
        }
        other => panic!("expected wait, got {other:?}"),
    }
}

#[test]
fn legacy_parallel_sibling_branches_fork_into_branch_workflows() {
    let yaml = r"
name: legacy_parallel
tasks:
  fanout:
    operator_type: parallel
    branches:
      api: [deploy_api]
      web: [deploy_web]
  deploy_api:
    operator_type: task
    function: d.api
    dependencies: [fanout]
  deploy_web:
    operator_type: task
    function: d.web
    dependencies: [fanout]
start_task: fanout
";
    let wf = codec::decode_yaml(yaml).unwrap();
    assert!(!wf.tasks.contains_key("deploy_api"));
    assert!(!wf.tasks.contains_key("deploy_web"));

    match &wf.tasks["fanout"] {
        Operator::Parallel(p) => {
            assert!(p.fields.branch_workflows["api"].tasks.contains_key("deploy_api"));
            assert!(p.fields.branch_workflows["web"].tasks.contains_key("deploy_web"));
        }
        other => panic!("expected parallel, got {other:?}"),
    }
    assert!(wf.validate().is_ok());
}

#[test]
fn legacy_foreach_task_chain_lifts_into_loop_body() {
    let yaml = r"
name: legacy_foreach
tasks:
  each_order:
    operator_type: foreach
    items: orders
    task_chain: [ship, notify]
  ship:
    operator_type: task
    function: f.ship
    dependencies: [each_order]
  notify:
    operator_type: task
    function: f.notify
    dependencies: [ship]
start_task: each_order
";
    let wf = codec::decode_yaml(yaml).unwrap();
    match &wf.tasks["each_order"] {
        Operator::ForEach(f) => {
            assert_eq!(f.fields.loop_body.len(), 2);
            assert_eq!(f.fields.loop_body[0].task_id(), "ship");
            assert_eq!(f.fields.loop_body[1].task_id(), "notify");
        }
        other => panic!("expected foreach, got {other:?}"),
    }
    assert!(wf.validate().is_ok());
}
