//! Integration tests for the command-line interface.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const DOC: &str = "# Notes\n\nCats are great.\n\n```callout\n{\n  \"id\": \"callout_1\",\n  \"title\": \"Reminder\"\n}\n```\n";

fn setup_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("doc.md"), DOC).unwrap();
    dir
}

fn docpatch(workspace: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_docpatch"))
        .arg("--workspace")
        .arg(workspace)
        .args(args)
        .current_dir(workspace)
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to run docpatch")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn apply_writes_patched_document() {
    let dir = setup_workspace();
    fs::write(dir.path().join("fix.patch"), "-Cats are great.\n+Cats are wonderful.\n").unwrap();

    let output = docpatch(dir.path(), &["apply", "doc.md", "--patch", "fix.patch", "--write"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("doc.md: 1 hunk(s) applied"));

    let updated = fs::read_to_string(dir.path().join("doc.md")).unwrap();
    assert!(updated.contains("Cats are wonderful.\n"));
    assert!(!updated.contains("Cats are great."));
}

#[test]
fn apply_without_write_prints_result() {
    let dir = setup_workspace();
    let patch = dir.path().join("fix.patch");
    fs::write(&patch, "-# Notes\n+# Meeting notes\n").unwrap();

    let output = docpatch(
        dir.path(),
        &["apply", "doc.md", "--patch", patch.to_str().unwrap()],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).starts_with("# Meeting notes\n"));
    assert_eq!(fs::read_to_string(dir.path().join("doc.md")).unwrap(), DOC);
}

#[test]
fn apply_reports_unmatched_text() {
    let dir = setup_workspace();
    fs::write(dir.path().join("bad.patch"), "-Dogs are great.\n+Dogs are fine.\n").unwrap();

    let output = docpatch(dir.path(), &["apply", "doc.md", "--patch", "bad.patch"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Could not find text to replace"));
}

#[test]
fn validate_reports_issues() {
    let dir = setup_workspace();
    fs::write(
        dir.path().join("bad.md"),
        "Text.\n\n```attributes\n{\"annotations\": [{\"text\": \"penguins\"}]}\n```\n",
    )
    .unwrap();

    let ok = docpatch(dir.path(), &["validate", "doc.md"]);
    assert!(ok.status.success(), "stderr: {}", stderr(&ok));
    assert!(stdout(&ok).contains("doc.md: 1 block(s) valid"));

    let bad = docpatch(dir.path(), &["validate", "doc.md", "bad.md"]);
    assert!(!bad.status.success());
    assert!(stderr(&bad).contains("\"penguins\" not found in document"));
    assert!(stderr(&bad).contains("1 document(s) failed validation"));
}

#[test]
fn json_patch_updates_callout() {
    let dir = setup_workspace();
    fs::write(
        dir.path().join("ops.json"),
        r#"[{"op": "replace", "path": "/title", "value": "Follow up"}]"#,
    )
    .unwrap();

    let output = docpatch(
        dir.path(),
        &[
            "json-patch", "doc.md", "--language", "callout", "--id", "callout_1", "--ops", "ops.json", "--write",
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Updated callout block \"callout_1\""));

    let updated = fs::read_to_string(dir.path().join("doc.md")).unwrap();
    assert!(updated.contains("\"title\": \"Follow up\""));
    assert!(updated.contains("\"actor\": \"agent\""));
}

#[test]
fn json_patch_error_exits_nonzero() {
    let dir = setup_workspace();
    fs::write(
        dir.path().join("ops.json"),
        r#"[{"op": "replace", "path": "/title", "value": "x"}]"#,
    )
    .unwrap();

    let output = docpatch(
        dir.path(),
        &["json-patch", "doc.md", "--language", "callout", "--ops", "ops.json"],
    );
    assert!(!output.status.success());
    assert!(stdout(&output).contains("an id is required"));
    assert_eq!(fs::read_to_string(dir.path().join("doc.md")).unwrap(), DOC);
}

#[test]
fn config_actor_is_used() {
    let dir = setup_workspace();
    fs::write(dir.path().join("docpatch.toml"), "[actor]\nname = \"reviewer\"\n").unwrap();
    fs::write(
        dir.path().join("ops.json"),
        r#"[{"op": "add", "path": "/body", "value": "Check the budget."}]"#,
    )
    .unwrap();

    let output = docpatch(
        dir.path(),
        &[
            "json-patch", "doc.md", "-l", "callout", "--id", "callout_1", "-o", "ops.json", "--write",
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let updated = fs::read_to_string(dir.path().join("doc.md")).unwrap();
    assert!(updated.contains("\"actor\": \"reviewer\""));
}

#[test]
fn invalid_config_is_rejected() {
    let dir = setup_workspace();
    fs::write(dir.path().join("docpatch.toml"), "[matching]\nrange_threshold = 2.0\n").unwrap();

    let output = docpatch(dir.path(), &["blocks", "doc.md"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("matching.range_threshold"));
}

#[test]
fn blocks_lists_fences() {
    let dir = setup_workspace();
    let output = docpatch(dir.path(), &["blocks", "doc.md"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("callout"));
    assert!(out.contains("callout_1"));
    assert!(out.contains("valid"));
}

#[test]
fn diff_prints_applicable_patch() {
    let dir = setup_workspace();
    fs::write(dir.path().join("old.md"), "a\nb\nc\n").unwrap();
    fs::write(dir.path().join("new.md"), "a\nB\nc\n").unwrap();

    let output = docpatch(
        dir.path(),
        &[
            "diff",
            dir.path().join("old.md").to_str().unwrap(),
            dir.path().join("new.md").to_str().unwrap(),
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "-b\n+B\n");
}

#[test]
fn refs_reports_and_resolves_markers() {
    let dir = setup_workspace();
    fs::write(dir.path().join("todo.md"), "See #[callout_1] and #[callout_7].\n").unwrap();

    let report = docpatch(dir.path(), &["refs"]);
    assert!(report.status.success(), "stderr: {}", stderr(&report));
    let out = stdout(&report);
    assert!(out.contains("#[callout_1] now defined"));
    assert!(out.contains("#[callout_7] pending"));

    let resolve = docpatch(dir.path(), &["refs", "--resolve"]);
    assert!(resolve.status.success(), "stderr: {}", stderr(&resolve));
    assert_eq!(
        fs::read_to_string(dir.path().join("todo.md")).unwrap(),
        "See callout_1 and #[callout_7].\n"
    );
}

#[test]
fn refs_mark_flags_undefined_ids() {
    let dir = setup_workspace();
    fs::write(
        dir.path().join("links.md"),
        "```callout\n{\"id\": \"callout_2\", \"target\": \"callout_9\", \"see\": \"callout_1\"}\n```\n",
    )
    .unwrap();

    let output = docpatch(dir.path(), &["refs", "--mark", "target", "--mark", "see"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("#[callout_9] pending"));
    assert_eq!(
        fs::read_to_string(dir.path().join("links.md")).unwrap(),
        "```callout\n{\"id\": \"callout_2\", \"target\": \"#[callout_9]\", \"see\": \"callout_1\"}\n```\n"
    );
    assert_eq!(fs::read_to_string(dir.path().join("doc.md")).unwrap(), DOC);
}

#[test]
fn config_workspace_root_is_used_without_flag() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("docs")).unwrap();
    fs::write(dir.path().join("docs").join("doc.md"), DOC).unwrap();
    fs::write(dir.path().join("docpatch.toml"), "[workspace]\nroot = \"docs\"\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_docpatch"))
        .args(["blocks", "doc.md"])
        .current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to run docpatch");
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("callout_1"));
}
