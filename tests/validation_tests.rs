use magpie::builder::{EnvelopeOpts, TaskOpts, WorkflowBuilder};
use magpie::codec;
use magpie::model::workflow::ValidationError;

#[test]
fn double_underscore_name_is_rejected_immediately() {
    let err = WorkflowBuilder::new("double__underscore", "1.0.0").unwrap_err();
    assert!(matches!(err, ValidationError::ReservedSeparator { .. }));
}

#[test]
fn bad_name_characters_are_rejected() {
    let err = WorkflowBuilder::new("Bad-Name!", "1.0.0").unwrap_err();
    assert!(matches!(err, ValidationError::NameInvalid { .. }));
}

#[test]
fn unknown_operator_type_is_rejected_on_decode() {
    let yaml = "name: w\ntasks:\n  a:\n    operator_type: unknown_operator\n";
    let err = codec::decode_yaml(yaml).unwrap_err();
    assert!(matches!(err, codec::Error::UnknownOperatorType { .. }));
}

#[test]
fn missing_handler_reference_fails_build() {
    let result = WorkflowBuilder::new("w", "2.0.0")
        .unwrap()
        .task("a", "f.a", TaskOpts::default())
        .on_failure("missing")
        .build();

    assert!(result.is_err());
}

#[test]
fn dangling_dependency_fails_full_validation() {
    let yaml = "name: w\ntasks:\n  a:\n    operator_type: task\n    function: f.a\n    dependencies: [ghost]\nstart_task: a\n";
    let wf = codec::decode_yaml(yaml).unwrap();
    let err = wf.validate().unwrap_err();
    assert!(matches!(err, ValidationError::DanglingReference { .. }));
}

#[test]
fn tasks_with_no_start_task_set_fail_validation() {
    let yaml = "name: w\ntasks:\n  a:\n    operator_type: task\n    function: f.a\n";
    let wf = codec::decode_yaml(yaml).unwrap();
    assert!(matches!(wf.validate(), Err(ValidationError::MissingStartTask)));
}

#[test]
fn empty_workflow_with_no_tasks_validates() {
    let wf = WorkflowBuilder::new("empty", "2.0.0").unwrap().build().unwrap();
    assert!(wf.validate().is_ok());
}

#[test]
fn builder_rejects_self_referential_condition() {
    let result = WorkflowBuilder::new("w", "2.0.0")
        .unwrap()
        .condition(
            "route",
            "x",
            |b| b.task("route", "f.noop", TaskOpts::default()),
            |b| b,
            EnvelopeOpts::default(),
        )
        .build();

    assert!(result.is_err());
}
