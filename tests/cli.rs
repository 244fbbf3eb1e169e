// End-to-end coverage of the `pyobfuscate` binary: validation
// failures, dry-run reporting, and a real transform with --json output.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn write(dir: &std::path::Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn rejects_input_without_gitignore() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    fs::remove_dir(output.path()).unwrap();
    write(input.path(), "a.py", "x = 1\n");

    Command::cargo_bin("pyobfuscate")
        .unwrap()
        .args(["--input", input.path().to_str().unwrap()])
        .args(["--output", output.path().to_str().unwrap()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains(".gitignore"));
}

#[test]
fn rejects_nonempty_output_directory() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write(input.path(), ".gitignore", "");
    write(input.path(), "a.py", "x = 1\n");
    write(output.path(), "leftover.txt", "stale\n");

    Command::cargo_bin("pyobfuscate")
        .unwrap()
        .args(["--input", input.path().to_str().unwrap()])
        .args(["--output", output.path().to_str().unwrap()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not empty"));
}

#[test]
fn dry_run_does_not_write_output() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    fs::remove_dir(output.path()).unwrap();
    write(input.path(), ".gitignore", "");
    write(
        input.path(),
        "a.py",
        "class Widget:\n    def draw(self):\n        return 1\n",
    );

    Command::cargo_bin("pyobfuscate")
        .unwrap()
        .args(["--input", input.path().to_str().unwrap()])
        .args(["--output", output.path().to_str().unwrap()])
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("dry-run"));

    let copied = fs::read_to_string(output.path().join("a.py")).unwrap();
    assert!(
        copied.contains("class Widget"),
        "dry-run still copies sources but must not rewrite them: {copied}"
    );
}

#[test]
fn transforms_project_and_emits_json_summary() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    fs::remove_dir(output.path()).unwrap();
    write(input.path(), ".gitignore", "__pycache__/\n");
    write(
        input.path(),
        "a.py",
        "class Widget:\n    def draw(self):\n        return 1\n",
    );

    let assert = Command::cargo_bin("pyobfuscate")
        .unwrap()
        .args(["--input", input.path().to_str().unwrap()])
        .args(["--output", output.path().to_str().unwrap()])
        .arg("--json")
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let summary: serde_json::Value = serde_json::from_str(
        stdout
            .lines()
            .take_while(|l| !l.starts_with("status="))
            .collect::<Vec<_>>()
            .join("\n")
            .as_str(),
    )
    .expect("stdout up to the status line must be valid JSON");

    assert!(summary["symbols_renamed"].as_u64().unwrap() > 0);
    assert_eq!(summary["python_files_processed"].as_u64().unwrap(), 1);

    let rewritten = fs::read_to_string(output.path().join("a.py")).unwrap();
    assert!(!rewritten.contains("Widget"));
}
