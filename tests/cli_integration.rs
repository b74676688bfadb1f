//! CLI integration tests for harbour-graph.
//!
//! These tests write graph files to a temporary directory and run the
//! binary against them.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the harbour-graph binary command.
fn harbour_graph() -> Command {
    Command::cargo_bin("harbour-graph").unwrap()
}

/// Create a temporary directory for graph files.
fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

fn write_graph(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("graph.toml");
    fs::write(&path, contents).unwrap();
    path
}

const APP_KIT: &str = r#"
[[manifests]]
display-name = "App"
kind = { root = "/work/App" }
dependencies = [{ kind = { file-system = "/deps/Kit" } }]

[[manifests.modules]]
name = "App"
kind = "executable"
dependencies = [{ kind = "product", name = "Kit", package = "Kit" }]

[[manifests.modules]]
name = "AppTests"
kind = "test"
dependencies = [{ kind = "module", name = "App" }]

[[manifests.products]]
name = "App"
kind = "executable"
modules = ["App"]

[[manifests]]
display-name = "Kit"
kind = { file-system = "/deps/Kit" }

[[manifests.traits]]
name = "default"
enabled-traits = ["Json"]

[[manifests.traits]]
name = "Json"

[[manifests.modules]]
name = "Kit"
kind = "library"

[[manifests.modules]]
name = "KitTests"
kind = "test"
dependencies = [{ kind = "module", name = "Kit" }]

[[manifests.products]]
name = "Kit"
kind = "library"
modules = ["Kit"]
"#;

const DUPLICATE_UTILS: &str = r#"
[[manifests]]
display-name = "App"
kind = { root = "/work/App" }
dependencies = [
    { kind = { file-system = "/deps/One" } },
    { kind = { file-system = "/deps/Two" } },
]

[[manifests.modules]]
name = "App"
kind = "executable"

[[manifests]]
display-name = "One"
kind = { file-system = "/deps/One" }
modules = [{ name = "One", kind = "library" }]
products = [{ name = "Utils", kind = "library", modules = ["One"] }]

[[manifests]]
display-name = "Two"
kind = { file-system = "/deps/Two" }
modules = [{ name = "Two", kind = "library" }]
products = [{ name = "Utils", kind = "library", modules = ["Two"] }]
"#;

// ============================================================================
// harbour-graph check
// ============================================================================

#[test]
fn test_check_prints_summary() {
    let tmp = temp_dir();
    let graph = write_graph(tmp.path(), APP_KIT);

    harbour_graph()
        .arg("check")
        .arg(&graph)
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded package graph for app"))
        .stdout(predicate::str::contains("packages: 2 (1 root)"))
        .stdout(predicate::str::contains("kit (/deps/Kit)"))
        .stdout(predicate::str::contains("kit: Json"));
}

#[test]
fn test_check_json_excludes_dependency_tests() {
    let tmp = temp_dir();
    let graph = write_graph(tmp.path(), APP_KIT);

    let output = harbour_graph()
        .args(["check", "--json"])
        .arg(&graph)
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let modules: Vec<&str> = summary["modules"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m.as_str().unwrap())
        .collect();
    assert!(modules.contains(&"kit:Kit"));
    assert!(modules.contains(&"app:AppTests"));
    assert!(!modules.contains(&"kit:KitTests"));
    assert_eq!(summary["reachable-products"].as_array().unwrap().len(), 3);
}

#[test]
fn test_check_reports_duplicate_products() {
    let tmp = temp_dir();
    let graph = write_graph(tmp.path(), DUPLICATE_UTILS);

    harbour_graph()
        .arg("check")
        .arg(&graph)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "error: multiple packages ('one' (at '/deps/One'), 'two' (at '/deps/Two')) declare products with a conflicting name: 'Utils'",
        ))
        .stderr(predicate::str::contains("help: consider:"));
}

#[test]
fn test_check_rejects_unknown_traits() {
    let tmp = temp_dir();
    let graph = write_graph(tmp.path(), APP_KIT);

    harbour_graph()
        .args(["check", "--traits", "Fast"])
        .arg(&graph)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Package 'App' does not have any available traits defined.",
        ));
}

#[test]
fn test_check_with_product_filter() {
    let tmp = temp_dir();
    let graph = write_graph(tmp.path(), APP_KIT);

    harbour_graph()
        .args(["check", "--product", "App"])
        .arg(&graph)
        .assert()
        .success()
        .stdout(predicate::str::contains("packages: 2 (1 root)"));
}

#[test]
fn test_check_missing_file() {
    let tmp = temp_dir();

    harbour_graph()
        .arg("check")
        .arg(tmp.path().join("missing.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read graph file"));
}

#[test]
fn test_check_requires_a_root() {
    let tmp = temp_dir();
    let graph = write_graph(
        tmp.path(),
        r#"
[[manifests]]
display-name = "Kit"
kind = { file-system = "/deps/Kit" }
"#,
    );

    harbour_graph()
        .arg("check")
        .arg(&graph)
        .assert()
        .failure()
        .stderr(predicate::str::contains("declares no root package"));
}

#[test]
fn test_check_warns_about_unhandled_files() {
    let tmp = temp_dir();
    let root = tmp.path().join("App");
    fs::create_dir_all(root.join("Sources/App")).unwrap();
    fs::write(root.join("Sources/App/main.c"), "int main(void) { return 0; }\n").unwrap();
    fs::write(root.join("Sources/App/notes.xyz"), "").unwrap();

    let contents = format!(
        r#"
[[manifests]]
display-name = "App"
kind = {{ root = "{}" }}
modules = [{{ name = "App", kind = "executable" }}]
"#,
        root.display().to_string().replace('\\', "/")
    );
    let graph = write_graph(tmp.path(), &contents);

    harbour_graph()
        .arg("check")
        .arg(&graph)
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "found 1 file(s) which are unhandled; explicitly declare them as resources or exclude from the target",
        ));
}

// ============================================================================
// harbour-graph tree
// ============================================================================

#[test]
fn test_tree_shows_packages() {
    let tmp = temp_dir();
    let graph = write_graph(tmp.path(), APP_KIT);

    harbour_graph()
        .args(["tree", "--modules"])
        .arg(&graph)
        .assert()
        .success()
        .stdout(predicate::str::contains("'app' (at '/work/App')"))
        .stdout(predicate::str::contains("├── 'kit' (at '/deps/Kit')"))
        .stdout(predicate::str::contains("App (executable)"));
}

#[test]
fn test_tree_depth_limit() {
    let tmp = temp_dir();
    let graph = write_graph(tmp.path(), APP_KIT);

    harbour_graph()
        .args(["tree", "--depth", "0"])
        .arg(&graph)
        .assert()
        .success()
        .stdout(predicate::str::contains("'app'"))
        .stdout(predicate::str::contains("'kit'").not());
}

// ============================================================================
// harbour-graph tests
// ============================================================================

#[test]
fn test_tests_maps_executables() {
    let tmp = temp_dir();
    let graph = write_graph(tmp.path(), APP_KIT);

    harbour_graph()
        .arg("tests")
        .arg(&graph)
        .assert()
        .success()
        .stdout(predicate::str::contains("App: AppTests"));
}

#[test]
fn test_tests_json() {
    let tmp = temp_dir();
    let graph = write_graph(tmp.path(), APP_KIT);

    let output = harbour_graph()
        .args(["tests", "--json"])
        .arg(&graph)
        .output()
        .unwrap();
    assert!(output.status.success());

    let mapping: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(mapping["App"][0], "AppTests");
}

// ============================================================================
// harbour-graph completions
// ============================================================================

#[test]
fn test_completions_bash() {
    harbour_graph()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("harbour-graph"));
}
