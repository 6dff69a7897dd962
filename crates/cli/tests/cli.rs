use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[allow(deprecated)]
fn cli(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("entity-enrich").expect("binary");
    cmd.current_dir(workdir).env_remove("ENTITY_ENRICH_CONCURRENCY").env_remove("ENTITY_ENRICH_RETRIES");
    cmd
}

fn run_json(workdir: &Path, args: &[&str]) -> Value {
    let output = cli(workdir).args(args).output().expect("command run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

fn setup_project() -> tempfile::TempDir {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("package.json"), r#"{ "name": "shop" }"#).unwrap();
    fs::write(
        root.join("src/api.ts"),
        "/** Loads one user */\nexport function fetchUser(id) {\n  return fetch(`/users/${id}`);\n}\n",
    )
    .unwrap();
    fs::write(
        root.join("src/page.ts"),
        "import { fetchUser } from './api';\n\nexport function loadPage() {\n  return fetchUser(1);\n}\n",
    )
    .unwrap();
    temp
}

#[test]
fn help_lists_subcommands() {
    let temp = tempdir().unwrap();
    cli(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("enrich"))
        .stdout(predicate::str::contains("refresh-static"))
        .stdout(predicate::str::contains("graph"));
}

#[test]
fn extract_then_enrich_writes_both_snapshots() {
    let temp = setup_project();
    let root = temp.path();

    let extracted = run_json(root, &["extract", "--json"]);
    assert_eq!(extracted["stats"]["entities"], 2);
    let base: Vec<Value> = serde_json::from_slice(&fs::read(root.join("entities.json")).unwrap()).unwrap();
    let mut ids: Vec<&str> = base.iter().map(|row| row["id"].as_str().unwrap()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["Function:fetchUser", "Function:loadPage"]);

    let enriched = run_json(root, &["enrich", "--json", "--retry-delay", "1"]);
    assert_eq!(enriched["stats"]["relabeled"], 2);
    assert_eq!(enriched["stats"]["failed"], 0);

    let rows: Vec<Value> =
        serde_json::from_slice(&fs::read(root.join("entities.enriched.json")).unwrap()).unwrap();
    let page = rows.iter().find(|row| row["id"] == "Function:loadPage").unwrap();
    assert_eq!(page["IMPORTS"], serde_json::json!(["Function:fetchUser"]));
    assert_eq!(page["CALLS"], serde_json::json!(["Function:fetchUser"]));
    let api = rows.iter().find(|row| row["id"] == "Function:fetchUser").unwrap();
    assert_eq!(api["summary"], "Loads one user");
    for row in &rows {
        assert!(row["publishTag"].is_string());
    }

    let again = run_json(root, &["enrich", "--json"]);
    assert_eq!(again["stats"]["unchanged"], 2);

    let refreshed = run_json(root, &["refresh-static", "--json"]);
    assert_eq!(refreshed["stats"]["total"], 2);
}

#[test]
fn graph_lists_dependents() {
    let temp = setup_project();
    let root = temp.path();
    run_json(root, &["extract", "--json"]);
    run_json(root, &["enrich", "--json", "--no-write"]);

    let references = run_json(root, &["graph", "--json", "--id", "Function:fetchUser"]);
    assert_eq!(
        references["dependents"],
        serde_json::json!([
            { "id": "Function:loadPage", "kind": "imports" },
            { "id": "Function:loadPage", "kind": "calls" }
        ])
    );

    cli(root)
        .args(["graph", "--id", "Function:missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Function:missing"));
}

#[test]
fn missing_input_fails() {
    let temp = setup_project();
    cli(temp.path())
        .args(["enrich", "missing.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Enrichment failed"));
}

#[test]
fn zero_concurrency_is_rejected() {
    let temp = setup_project();
    cli(temp.path())
        .args(["enrich", "--concurrency", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("concurrency must be > 0"));
}
