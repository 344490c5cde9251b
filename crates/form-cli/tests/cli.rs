use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

fn formfill() -> Command {
    Command::cargo_bin("formfill").expect("binary builds")
}

#[test]
fn new_writes_a_definition_that_show_can_outline() {
    let temp = assert_fs::TempDir::new().expect("tempdir");
    let form = temp.path().join("starter.json");
    let form_path = form.to_str().expect("utf8 path");

    formfill()
        .args(["new", form_path])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote starter form"));

    let source = std::fs::read_to_string(&form).expect("definition written");
    assert!(source.contains("starter_form"));

    formfill()
        .args(["show", form_path])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[root]")
                .and(predicate::str::contains("[page]"))
                .and(predicate::str::contains("pet_name")),
        );
}

#[test]
fn skeleton_prints_a_json_document() {
    let temp = assert_fs::TempDir::new().expect("tempdir");
    let form = temp.path().join("starter.json");
    let form_path = form.to_str().expect("utf8 path");
    formfill().args(["new", form_path]).assert().success();

    let output = formfill()
        .args(["skeleton", form_path])
        .output()
        .expect("run skeleton");
    assert!(output.status.success());
    let skeleton: Value = serde_json::from_slice(&output.stdout).expect("json skeleton");
    // both pages contribute defaults
    assert_eq!(skeleton.as_object().expect("object").len(), 2);
}

#[test]
fn schema_prints_the_definition_schema() {
    formfill()
        .args(["schema"])
        .assert()
        .success()
        .stdout(predicate::str::contains("container_type"));
}

#[test]
fn fill_with_no_input_exports_defaults_and_saves_a_session() {
    let temp = assert_fs::TempDir::new().expect("tempdir");
    let form = temp.path().join("starter.json");
    let session = temp.path().join("session.json");
    let form_path = form.to_str().expect("utf8 path");
    let session_path = session.to_str().expect("utf8 path");
    formfill().args(["new", form_path]).assert().success();

    // every prompt is skipped, the group is not grown
    formfill()
        .args(["fill", form_path, "--save-session", session_path])
        .write_stdin("")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("profile").and(predicate::str::contains("wrap_up")),
        );

    let saved = std::fs::read_to_string(&session).expect("session written");
    let state: Value = serde_json::from_str(&saved).expect("session json");
    assert!(state.get("answers").is_some());

    formfill()
        .args(["export", form_path, session_path])
        .assert()
        .success()
        .stdout(predicate::str::contains("coffee_orders"));
}
