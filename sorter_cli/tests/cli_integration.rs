use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Fast sim config: 1 ms ticks, short gaps between bottles
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[classifier]
ambient_clear = 22
high_band_clear = 30
no_cap_clear = 300

[timing]
tick_ms = 1
key_debounce_ms = 20
operation_timeout_s = 60

[sim]
gap_samples = 2
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn sorter(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("sorter").unwrap();
    cmd.arg("--config").arg(cfg).arg("--log-level").arg("warn");
    cmd
}

fn write_trace(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("trace.csv");
    let mut f = fs::File::create(&path).unwrap();
    write!(f, "{body}").unwrap();
    path
}

// One capped bottle: rising edge, top band red/blue high, bottom band high, then ambient
const ONE_BOTTLE: &str = "clear,red,green,blue
10,2,2,2
40,30,10,10
40,40,10,10
10,2,2,2
10,2,2,2
10,2,2,2
10,2,2,2
";

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["run", "--max-ticks", "5"], 0, "Stopped in standby", "stdout")]
#[case(&["set-clock", "--default"], 0, "17/02/05 21:35:50", "stdout")]
#[case(&["set-clock", "--at", "24-06-15 12:01:59"], 0, "24/06/15 12:01:59", "stdout")]
#[case(&["set-clock"], 2, "required", "stderr")]
#[case(&["set-clock", "--at", "24-13-01 00:00:00"], 2, "YY-MM-DD", "stderr")]
#[case(&["self-check"], 0, "self-check ok", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = sorter(&cfg);
    for a in args {
        cmd.arg(a);
    }
    let assert = cmd.assert().code(exit_code);

    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[test]
fn replay_counts_one_bottle() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let trace = write_trace(&dir, ONE_BOTTLE);

    sorter(&cfg)
        .arg("replay")
        .arg("--trace")
        .arg(&trace)
        .assert()
        .success()
        .stdout(predicate::str::contains("Replayed 7 samples"))
        .stdout(predicate::str::is_match(r"Total\s+1").unwrap());
}

#[test]
fn replay_json_lists_commits() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let trace = write_trace(&dir, ONE_BOTTLE);

    let out = sorter(&cfg)
        .arg("--json")
        .arg("replay")
        .arg("--trace")
        .arg(&trace)
        .output()
        .unwrap();
    assert!(out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["samples"], 7);
    assert_eq!(v["counters"]["total"], 1);
    assert_eq!(v["commits"].as_array().unwrap().len(), 1);
    assert_eq!(v["open_at_end"], false);
}

#[rstest]
fn cli_reports_bad_trace_header() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let trace = write_trace(&dir, "c,r,g,b\n10,2,2,2\n");

    sorter(&cfg)
        .arg("replay")
        .arg("--trace")
        .arg(&trace)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));
}

#[rstest]
fn cli_rejects_invalid_config() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, "[classifier]\nambient_clear = 40\nhigh_band_clear = 30\n").unwrap();

    sorter(&cfg)
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("high_band_clear"));
}

#[test]
fn run_sorts_bottles_from_scripted_key() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = sorter(&cfg)
        .args(["--json", "run", "--max-ticks", "400", "--keys", "1"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["state"], "operation");
    assert!(v["counters"]["total"].as_u64().unwrap() > 0);
}

#[test]
fn emergency_stop_exits_with_code_2() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    sorter(&cfg)
        .args(["--json", "run", "--max-ticks", "400", "--keys", "1*"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("EmergencyStop"));
}
