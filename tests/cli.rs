//! End-to-end tests of the `cms-seed` binary against a file-backed local
//! store in a temp directory.

mod common;

use common::Project;
use serde_json::{Value, json};

fn parse(stdout: &str) -> Value {
    serde_json::from_str(stdout).unwrap_or_else(|e| panic!("invalid JSON ({e}):\n{stdout}"))
}

fn document_count(store: &Value, api_id: &str) -> usize {
    store["documents"][api_id].as_array().map_or(0, Vec::len)
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[test]
fn check_accepts_the_sample_dataset() {
    let project = Project::new();
    let out = project.ok(&["check"]);
    assert!(out.starts_with("[OK] data/seed-data.json: 16 document(s)"), "{out}");
    assert!(!project.store_path().exists(), "check must not open a store");
}

#[test]
fn check_reports_every_violation() {
    let project = Project::new();
    project.write_dataset(&json!({
        "navigationItems": [{"label": "Blog", "href": "/blog", "page": "blog"}],
        "pages": [{"title": "T".repeat(81), "slug": "home"}]
    }));

    let out = project.run(&["check", "--format", "json"]);
    assert!(!out.status.success());
    let parsed = parse(&String::from_utf8_lossy(&out.stdout));
    assert_eq!(parsed["valid"], json!(false));
    let paths: Vec<&str> = parsed["violations"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v["path"].as_str())
        .collect();
    assert_eq!(paths, ["pages[0].title", "navigationItems[0].page"]);
}

#[test]
fn check_rejects_unknown_fields() {
    let project = Project::new();
    project.write_dataset(&json!({"pages": [{"title": "Home", "slug": "home", "colour": "red"}]}));
    let stderr = project.fails(&["check"]);
    assert!(stderr.contains("unknown field `colour`"), "{stderr}");
}

#[test]
fn missing_dataset_explains_the_fix() {
    let project = Project::new();
    let stderr = project.fails(&["check", "--dataset", "nope.json"]);
    assert!(stderr.contains("cannot read dataset nope.json"), "{stderr}");
    assert!(stderr.contains("To fix:"), "{stderr}");
}

// ---------------------------------------------------------------------------
// run and the run guard
// ---------------------------------------------------------------------------

#[test]
fn first_run_seeds_second_run_skips() {
    let project = Project::new();
    let out = project.ok(&["run"]);
    assert!(out.contains("16 created, 0 updated, 0 failed, 6 relation(s) wired"), "{out}");
    assert!(out.contains("Seed completed."), "{out}");

    let store = project.store_json();
    assert_eq!(document_count(&store, "page"), 3);
    assert_eq!(document_count(&store, "section"), 7);
    assert!(store["flags"]["development"]["initHasRun"]["attemptedAt"].is_string());

    let out = project.ok(&["run"]);
    assert!(out.contains("Seed already ran for environment 'development'"), "{out}");
    assert_eq!(project.store_json(), store);
}

#[test]
fn forced_run_updates_in_place() {
    let project = Project::new();
    project.ok(&["run"]);
    let out = project.ok(&["run", "--force", "--format", "json"]);
    let parsed = parse(&out);
    assert_eq!(parsed["status"], json!("seeded"));
    let entities = parsed["report"]["entities"].as_array().unwrap();
    assert_eq!(entities.len(), 16);
    assert!(entities.iter().all(|e| e["action"] == json!("updated")));

    let store = project.store_json();
    assert_eq!(document_count(&store, "page"), 3);
    assert_eq!(document_count(&store, "navigation-item"), 4);
}

#[test]
fn guard_status_and_reset() {
    let project = Project::new();
    let out = project.ok(&["guard", "status"]);
    assert!(out.contains("has not been seeded"), "{out}");

    project.ok(&["run"]);
    let status = parse(&project.ok(&["guard", "status", "--format", "json"]));
    assert_eq!(status["set"], json!(true));
    assert_eq!(status["environment"], json!("development"));
    assert_eq!(status["key"], json!("initHasRun"));
    assert!(status["record"]["fingerprint"].as_str().is_some_and(|f| f.len() == 64));

    let out = project.ok(&["guard", "reset"]);
    assert!(out.contains("Cleared 'initHasRun'"), "{out}");
    let out = project.ok(&["guard", "reset"]);
    assert!(out.contains("nothing to clear"), "{out}");

    let out = project.ok(&["run"]);
    assert!(out.contains("0 created, 16 updated"), "{out}");
}

#[test]
fn environments_are_guarded_separately() {
    let project = Project::new();
    project.ok(&["run"]);
    let out = project.ok(&["run", "--environment", "staging"]);
    assert!(out.contains("Seed completed."), "{out}");
    let store = project.store_json();
    assert!(store["flags"]["staging"]["initHasRun"].is_object());
}

#[test]
fn dry_run_writes_nothing() {
    let project = Project::new();
    let out = project.ok(&["run", "--dry-run"]);
    assert!(out.starts_with("cms-seed run (dry run)"), "{out}");
    assert!(out.contains("Planned writes:"), "{out}");
    assert!(!project.store_path().exists());

    let parsed = parse(&project.ok(&["run", "--dry-run", "--format", "json"]));
    assert_eq!(parsed["status"], json!("planned"));
    assert!(parsed["report"]["planned"].as_array().is_some_and(|p| !p.is_empty()));

    let status = parse(&project.ok(&["guard", "status", "--format", "json"]));
    assert_eq!(status["set"], json!(false));
}

#[test]
fn invalid_dataset_does_not_consume_the_guard() {
    let project = Project::new();
    project.write_dataset(&json!({
        "pages": [{"title": "Home", "slug": "home"}],
        "sections": {"blog": [{"type": "hero", "anchor": "hero"}]}
    }));
    let stderr = project.fails(&["run"]);
    assert!(stderr.contains("sections.blog: no page with slug `blog`"), "{stderr}");
    assert!(!project.store_path().exists());
}

// ---------------------------------------------------------------------------
// verify
// ---------------------------------------------------------------------------

#[test]
fn verify_fails_before_and_passes_after_a_run() {
    let project = Project::new();
    let out = project.run(&["verify"]);
    assert!(!out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("[FAIL] page `home`: missing"), "{stdout}");

    project.ok(&["run"]);
    let out = project.ok(&["verify"]);
    assert!(out.contains("[OK] page `home` sections: 3 section(s) connected"), "{out}");
    assert!(out.contains("0 failed"), "{out}");

    let parsed = parse(&project.ok(&["verify", "--format", "json"]));
    let checks = parsed["checks"].as_array().unwrap();
    assert!(checks.iter().all(|c| c["status"] == json!("ok")), "{parsed:#}");
}

// ---------------------------------------------------------------------------
// configuration
// ---------------------------------------------------------------------------

#[test]
fn config_file_selects_paths_and_environment() {
    let project = Project::new();
    project.write("content/site.json", common::SAMPLE_DATASET);
    project.write(
        "cms-seed.toml",
        r#"
[target]
local_path = "var/store.json"
environment = "preview"

[seed]
dataset = "content/site.json"
relation_strategy = "forward"
"#,
    );
    let out = project.ok(&["run"]);
    assert!(out.contains("16 created"), "{out}");
    assert!(!project.store_path().exists());

    let text = std::fs::read_to_string(project.path().join("var/store.json")).unwrap();
    let store: Value = serde_json::from_str(&text).unwrap();
    assert!(store["flags"]["preview"]["initHasRun"].is_object());
    assert_eq!(document_count(&store, "section"), 7);
}

#[test]
fn invalid_config_reports_the_line() {
    let project = Project::new();
    project.write("cms-seed.toml", "[target]\nkind = \"local\"\ntimeout_seconds = \"soon\"\n");
    let stderr = project.fails(&["check"]);
    assert!(stderr.contains("cms-seed.toml"), "{stderr}");
    assert!(stderr.contains("line 3"), "{stderr}");
}

#[test]
fn explicit_config_path_is_used() {
    let project = Project::new();
    project.write("conf/seed.toml", "[target]\nenvironment = \"qa\"\n");
    project.ok(&["run", "--config", "conf/seed.toml"]);
    let store = project.store_json();
    assert!(store["flags"]["qa"]["initHasRun"].is_object());
}

#[test]
fn unreachable_remote_fails_without_touching_the_guard() {
    let project = Project::new();
    let stderr = project.fails(&[
        "run",
        "--target",
        "remote",
        "--url",
        "http://127.0.0.1:9",
    ]);
    assert!(stderr.contains("cannot use content store"), "{stderr}");
    assert!(!project.path().join(".cms-seed/state.json").exists());
}
