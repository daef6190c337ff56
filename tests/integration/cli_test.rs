use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn copybara() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("copybara").unwrap()
}

const CONFIG: &str = r#"
[[workflow]]
name = "default"
description = "Publish the library"
origin_files = { include = ["**"], exclude = ["internal/**"] }

[workflow.origin]
type = "folder"
path = "src"

[workflow.destination]
type = "folder"
path = "out"

[workflow.authoring]
mode = "overwrite"
default = "Bot <bot@example.com>"

[[workflow.transformations]]
type = "replace"
before = "INTERNAL"
after = "PUBLIC"
"#;

const SECOND_WORKFLOW: &str = r#"
[[workflow]]
name = "raw"
mode = "ITERATIVE"

[workflow.origin]
type = "folder"

[workflow.destination]
type = "folder"
path = "raw-out"

[workflow.authoring]
mode = "pass_thru"
default = "Bot <bot@example.com>"
"#;

fn setup(config: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src/internal")).unwrap();
    fs::write(dir.path().join("src/lib.txt"), "visibility: INTERNAL\n").unwrap();
    fs::write(dir.path().join("src/internal/secret.txt"), "secret\n").unwrap();
    fs::write(dir.path().join("copy.bara.toml"), config).unwrap();
    dir
}

fn config_arg(dir: &TempDir) -> String {
    dir.path().join("copy.bara.toml").to_string_lossy().into_owned()
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn migrate_folder_to_folder() {
    let dir = setup(CONFIG);
    copybara()
        .args(["migrate", &config_arg(&dir)])
        .assert()
        .success()
        .stdout(predicates::str::contains("Created"));

    let out = dir.path().join("out");
    assert_eq!(read(&out.join("lib.txt")), "visibility: PUBLIC\n");
    assert!(!out.join("internal/secret.txt").exists());
}

#[test]
fn migrate_replaces_stale_destination_files() {
    let dir = setup(CONFIG);
    fs::create_dir_all(dir.path().join("out")).unwrap();
    fs::write(dir.path().join("out/stale.txt"), "old\n").unwrap();

    copybara()
        .args(["migrate", &config_arg(&dir), "default"])
        .assert()
        .success();

    assert!(!dir.path().join("out/stale.txt").exists());
    assert!(dir.path().join("out/lib.txt").exists());
}

#[test]
fn iterative_migration_needs_init_history_without_destination_history() {
    let dir = setup(&format!("{}{}", CONFIG, SECOND_WORKFLOW));
    let src = dir.path().join("src").to_string_lossy().into_owned();
    copybara()
        .args(["migrate", &config_arg(&dir), "raw", &src])
        .assert()
        .code(3)
        .stderr(predicates::str::contains("--init-history"));

    copybara()
        .args(["migrate", &config_arg(&dir), "raw", &src, "--init-history"])
        .assert()
        .success();

    let out = dir.path().join("raw-out");
    assert_eq!(read(&out.join("lib.txt")), "visibility: INTERNAL\n");
    assert!(out.join("internal/secret.txt").exists());
}

#[test]
fn migrate_dry_run_writes_nothing() {
    let dir = setup(CONFIG);
    copybara()
        .args(["migrate", &config_arg(&dir), "--dry-run"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Noop"));

    assert!(!dir.path().join("out").exists());
}

#[test]
fn migrate_keeps_existing_files_in_work_dir() {
    let dir = setup(CONFIG);
    let work = dir.path().join("mywork");
    fs::create_dir_all(&work).unwrap();
    fs::write(work.join("precious.txt"), "keep me\n").unwrap();

    copybara()
        .args([
            "migrate",
            &config_arg(&dir),
            "default",
            "--work-dir",
            work.to_str().unwrap(),
        ])
        .assert()
        .success();

    assert_eq!(read(&work.join("precious.txt")), "keep me\n");
    assert!(dir.path().join("out/lib.txt").exists());
}

#[test]
fn migrate_json_lists_effects() {
    let dir = setup(CONFIG);
    let output = copybara()
        .args(["migrate", &config_arg(&dir), "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let effects: Value = serde_json::from_slice(&output.stdout).unwrap();
    let effects = effects.as_array().unwrap();
    assert_eq!(effects.len(), 1);
    assert!(effects[0]["summary"]
        .as_str()
        .unwrap()
        .contains("Copied result to"));
}

#[test]
fn migrate_unknown_workflow_is_a_command_line_error() {
    let dir = setup(CONFIG);
    copybara()
        .args(["migrate", &config_arg(&dir), "nope"])
        .assert()
        .code(1)
        .stderr(predicates::str::contains("Available workflows: [default]"));
}

#[test]
fn migrate_rejects_multiple_source_refs() {
    let dir = setup(CONFIG);
    copybara()
        .args(["migrate", &config_arg(&dir), "default", "a", "b"])
        .assert()
        .code(1);
    assert!(!dir.path().join("out").exists());
}

#[test]
fn migrate_missing_config_file() {
    let dir = TempDir::new().unwrap();
    copybara()
        .args([
            "migrate",
            dir.path().join("missing.toml").to_str().unwrap(),
        ])
        .assert()
        .code(1)
        .stderr(predicates::str::contains("Configuration file not found"));
}

#[test]
fn invalid_toml_is_a_configuration_error() {
    let dir = setup("[[workflow]]\nname = \n");
    copybara()
        .args(["validate", &config_arg(&dir)])
        .assert()
        .code(2)
        .stderr(predicates::str::contains("invalid configuration"));
}

#[test]
fn invalid_workflow_is_a_configuration_error() {
    let config = CONFIG.replace(
        "description = \"Publish the library\"",
        "smart_prune = true",
    );
    let dir = setup(&config);
    copybara()
        .args(["validate", &config_arg(&dir)])
        .assert()
        .code(2)
        .stderr(predicates::str::contains("smart_prune"));
}

#[test]
fn bad_author_flag_is_a_command_line_error() {
    let dir = setup(CONFIG);
    copybara()
        .args(["migrate", &config_arg(&dir), "--force-author", "no email"])
        .assert()
        .code(1)
        .stderr(predicates::str::contains("--force-author"));
}

#[test]
fn validate_reports_workflows() {
    let dir = setup(&format!("{}{}", CONFIG, SECOND_WORKFLOW));
    copybara()
        .args(["validate", &config_arg(&dir)])
        .assert()
        .success()
        .stdout(predicates::str::contains("is valid"))
        .stdout(predicates::str::contains("workflow raw"));
}

#[test]
fn info_lists_workflows() {
    let dir = setup(&format!("{}{}", CONFIG, SECOND_WORKFLOW));
    copybara()
        .args(["info", &config_arg(&dir)])
        .assert()
        .success()
        .stdout(predicates::str::contains("default  SQUASH"))
        .stdout(predicates::str::contains("raw  ITERATIVE"))
        .stdout(predicates::str::contains("Publish the library"));
}

#[test]
fn info_json_listing() {
    let dir = setup(&format!("{}{}", CONFIG, SECOND_WORKFLOW));
    let output = copybara()
        .args(["info", &config_arg(&dir), "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let workflows: Value = serde_json::from_slice(&output.stdout).unwrap();
    let workflows = workflows.as_array().unwrap();
    assert_eq!(workflows.len(), 2);
    assert_eq!(workflows[0]["name"], "default");
    assert_eq!(workflows[0]["mode"], "SQUASH");
    assert_eq!(workflows[1]["mode"], "ITERATIVE");
    assert!(workflows[1]["description"].is_null());
}

#[test]
fn info_for_one_workflow() {
    let dir = setup(CONFIG);
    let output = copybara()
        .args(["info", &config_arg(&dir), "default", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let info: Value = serde_json::from_slice(&output.stdout).unwrap();
    let reference = &info["migration_references"][0];
    assert_eq!(reference["label"], "workflow_default");
    assert!(reference["last_migrated"].is_null());
    assert!(info["destination_description"]
        .as_str()
        .unwrap()
        .starts_with("folder.destination("));
}
