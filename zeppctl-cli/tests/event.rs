use predicates::prelude::*;
use rstest::rstest;

mod common;

#[rstest]
#[case("absent", "blocked")]
#[case("waiting", "waiting")]
#[case("lost", "waiting")]
fn test_relation_events_report_status(#[case] event: &str, #[case] expected: &str) {
    let ctx = common::zeppctl();
    ctx.new_cmd()
        .args(["event", event])
        .assert()
        .success()
        .stdout(predicate::str::contains(expected));
}

#[test]
fn test_ready_without_artifact_reports_blocked() {
    let ctx = common::zeppctl();
    ctx.new_cmd()
        .args(["event", "ready"])
        .assert()
        .success()
        .stdout(predicate::str::contains("blocked"));
}

#[test]
fn test_notebook_import_rejected_while_stopped() {
    let ctx = common::zeppctl();
    let note = ctx.scratch().join("note.json");
    std::fs::write(&note, "{\"name\": \"test\"}").unwrap();

    ctx.new_cmd()
        .args(["notebook", "import"])
        .arg(&note)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not running"));
}

#[test]
fn test_interpreter_set_requires_property() {
    let ctx = common::zeppctl();
    ctx.new_cmd()
        .args(["interpreter", "set", "spark"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--property"));
}
