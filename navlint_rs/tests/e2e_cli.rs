//! End-to-End CLI tests for navlint.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn navlint() -> Command {
    Command::cargo_bin("navlint").expect("binary should build")
}

const ENTITY_FIXTURE: &str = r#"
import { Collection } from "@lazyorm/core";
import { NavigationCollectionProxyGenerated } from "navlint/runtime";

class TestItem {}

@NavigationCollectionProxyGenerated
class TestA {
  items: Collection<TestItem>;
}

class Consumer {
  call(): void {
    const instance = new TestA();
    instance.items.getItems();
  }
}
"#;

fn fixture_project() -> TempDir {
    let dir = tempfile::Builder::new().prefix("navlint").tempdir().expect("tempdir");
    fs::write(dir.path().join("models.ts"), ENTITY_FIXTURE).expect("write fixture");
    dir
}

mod cli_basics {
    use super::*;

    #[test]
    fn shows_help() {
        navlint()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("navlint"))
            .stdout(predicate::str::contains("--generate"))
            .stdout(predicate::str::contains("--fix"));
    }

    #[test]
    fn shows_version() {
        navlint()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn rejects_unknown_options() {
        navlint().arg("--bogus").assert().code(2);
    }
}

mod analyze_mode {
    use super::*;

    #[test]
    fn reports_violation_with_stable_id() {
        let dir = fixture_project();
        navlint()
            .arg(dir.path())
            .arg("--no-color")
            .assert()
            .success()
            .stdout(predicate::str::contains("EFPA01"))
            .stdout(predicate::str::contains("Use the itemsQuery() method"))
            .stdout(predicate::str::contains("models.ts"));
    }

    #[test]
    fn fail_on_violations_sets_exit_code() {
        let dir = fixture_project();
        navlint()
            .arg(dir.path())
            .arg("--no-color")
            .arg("--fail-on-violations")
            .assert()
            .failure();
    }

    #[test]
    fn clean_project_reports_nothing() {
        let dir = tempfile::Builder::new().prefix("navlint").tempdir().unwrap();
        fs::write(dir.path().join("app.ts"), "export const answer = 42;\n").unwrap();
        navlint()
            .arg(dir.path())
            .arg("--no-color")
            .arg("--fail-on-violations")
            .assert()
            .success()
            .stdout(predicate::str::contains("no collection navigation violations"));
    }

    #[test]
    fn json_output_is_machine_readable() {
        let dir = fixture_project();
        let output = navlint()
            .arg(dir.path())
            .arg("--json")
            .output()
            .expect("run navlint");
        let payload: serde_json::Value =
            serde_json::from_slice(&output.stdout).expect("valid json");
        assert_eq!(payload["diagnostics"][0]["id"], "EFPA01");
        assert_eq!(payload["diagnostics"][0]["property"], "items");
    }

    #[test]
    fn sarif_output_declares_schema() {
        let dir = fixture_project();
        let output = navlint()
            .arg(dir.path())
            .arg("--sarif")
            .output()
            .expect("run navlint");
        let payload: serde_json::Value =
            serde_json::from_slice(&output.stdout).expect("valid sarif");
        assert_eq!(payload["version"], "2.1.0");
        assert_eq!(payload["runs"][0]["results"][0]["ruleId"], "EFPA01");
    }

    #[test]
    fn writes_findings_artifact() {
        let dir = fixture_project();
        navlint().arg(dir.path()).arg("--no-color").assert().success();
        let findings =
            fs::read_to_string(dir.path().join(".navlint/findings.json")).expect("findings");
        assert!(findings.contains("EFPA01"));
    }
}

mod fix_mode {
    use super::*;

    #[test]
    fn rewrites_access_to_query_call() {
        let dir = fixture_project();
        navlint()
            .arg(dir.path())
            .arg("--no-color")
            .arg("--fix")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "Avoid collection navigation property usage",
            ));
        let fixed = fs::read_to_string(dir.path().join("models.ts")).unwrap();
        assert!(fixed.contains("instance.itemsQuery().getItems();"));
    }
}

mod generate_mode {
    use super::*;

    #[test]
    fn emits_proxy_companion_next_to_entity() {
        let dir = fixture_project();
        navlint()
            .arg(dir.path())
            .arg("--no-color")
            .arg("--generate")
            .assert()
            .success()
            .stdout(predicate::str::contains("generated 1 proxy module(s)"));
        let artifact = dir.path().join("TestA.NavigationCollectionProxy.ts");
        let text = fs::read_to_string(artifact).expect("artifact written");
        assert!(text.starts_with("// <auto-generated>"));
        assert!(text.contains("itemsQuery(): Query<TestItem>;"));
    }

    #[test]
    fn second_run_is_incremental() {
        let dir = fixture_project();
        navlint().arg(dir.path()).arg("--generate").assert().success();
        navlint()
            .arg(dir.path())
            .arg("--no-color")
            .arg("--generate")
            .assert()
            .success()
            .stdout(predicate::str::contains("1 up-to-date"));
    }

    #[test]
    fn force_generate_ignores_the_cache() {
        let dir = fixture_project();
        navlint().arg(dir.path()).arg("--generate").assert().success();
        navlint()
            .arg(dir.path())
            .arg("--no-color")
            .arg("--force-generate")
            .assert()
            .success()
            .stdout(predicate::str::contains("generated 1 proxy module(s)"));
    }
}
