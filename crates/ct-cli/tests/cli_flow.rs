//! End-to-end tests driving the `ct` binary against an on-disk database.
//!
//! Each test gets its own temp `HOME` and config file so nothing touches the
//! real user data directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn ct_binary() -> String {
    env!("CARGO_BIN_EXE_ct").to_string()
}

struct Harness {
    temp: TempDir,
    config: PathBuf,
}

impl Harness {
    fn new(extra_config: &str) -> Self {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("ct.toml");
        let db_path = temp.path().join("data").join("ct.db");
        std::fs::write(
            &config,
            format!(
                "database_path = {:?}\n{extra_config}",
                db_path.display().to_string()
            ),
        )
        .unwrap();
        Self { temp, config }
    }

    fn home(&self) -> &Path {
        self.temp.path()
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(ct_binary())
            .env("HOME", self.home())
            .env("XDG_CONFIG_HOME", self.home().join(".config"))
            .env("XDG_DATA_HOME", self.home().join(".local/share"))
            .env_remove("CT_DATABASE_PATH")
            .env_remove("CT_BREAK_POLICY")
            .arg("--config")
            .arg(&self.config)
            .args(args)
            .output()
            .expect("failed to run ct")
    }

    fn run_ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "ct {args:?} should succeed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }

    fn json(&self, args: &[&str]) -> serde_json::Value {
        serde_json::from_str(&self.run_ok(args)).expect("valid JSON output")
    }
}

#[test]
fn toggle_records_contractions_and_breaks() {
    let harness = Harness::new("");

    let started = harness.run_ok(&["toggle", "--at", "2025-01-01T00:00:00Z"]);
    assert!(started.starts_with("Contraction started at"));
    assert_eq!(harness.json(&["status", "--json"])["tracking"], true);

    let stopped = harness.run_ok(&["toggle", "--at", "2025-01-01T00:00:40Z"]);
    assert_eq!(stopped, "Contraction recorded: 0m 40s\n");

    harness.run_ok(&["toggle", "--at", "2025-01-01T00:05:00Z"]);
    harness.run_ok(&["toggle", "--at", "2025-01-01T00:05:50Z"]);

    let history = harness.json(&["history", "--json"]);
    let kinds: Vec<&str> = history["intervals"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["contraction", "break", "contraction"]);
    assert_eq!(history["intervals"][1]["start"], "2025-01-01T00:00:40Z");
    assert_eq!(history["intervals"][1]["end"], "2025-01-01T00:05:00Z");
    assert!(history["open"].is_null());

    let status = harness.json(&["status", "--json"]);
    assert_eq!(status["tracking"], false);
    assert_eq!(status["contractions"], 2);
    assert_eq!(status["last_length_secs"], 50);
    assert_eq!(status["mean_length_secs"], 45);
    assert_eq!(status["mean_frequency_secs"], 300);
}

#[test]
fn contractions_only_policy_skips_breaks() {
    let harness = Harness::new("break_policy = \"contractions_only\"\n");

    for at in [
        "2025-01-01T00:00:00Z",
        "2025-01-01T00:00:40Z",
        "2025-01-01T00:05:00Z",
        "2025-01-01T00:05:50Z",
    ] {
        harness.run_ok(&["toggle", "--at", at]);
    }

    let history = harness.json(&["history", "--json"]);
    assert_eq!(history["intervals"].as_array().unwrap().len(), 2);
}

#[test]
fn reset_needs_confirmation() {
    let harness = Harness::new("");
    harness.run_ok(&["toggle", "--at", "2025-01-01T00:00:00Z"]);
    harness.run_ok(&["toggle", "--at", "2025-01-01T00:00:40Z"]);

    let refused = harness.run(&["reset"]);
    assert!(!refused.status.success());
    assert!(String::from_utf8_lossy(&refused.stderr).contains("--yes"));

    harness.run_ok(&["reset", "--yes"]);
    let status = harness.json(&["status", "--json"]);
    assert_eq!(status["contractions"], 0);
    assert!(status["mean_length_secs"].is_null());
    assert!(status["frequency"].is_null());
}

#[test]
fn seed_then_migrate_drops_breaks() {
    let harness = Harness::new("");
    assert_eq!(harness.run_ok(&["seed"]), "Seeded 10 sample contractions.\n");

    let history = harness.json(&["history", "--json"]);
    assert_eq!(history["intervals"].as_array().unwrap().len(), 19);

    assert_eq!(
        harness.run_ok(&["migrate"]),
        "Removed 9 break interval(s).\n"
    );
    assert_eq!(
        harness.run_ok(&["migrate"]),
        "History already holds contractions only.\n"
    );

    let status = harness.json(&["status", "--json"]);
    assert_eq!(status["contractions"], 10);
    assert_eq!(status["last_frequency_secs"], 363);
}

#[test]
fn invalid_toggle_time_is_rejected() {
    let harness = Harness::new("");
    let output = harness.run(&["toggle", "--at", "yesterday"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid datetime"));
}
