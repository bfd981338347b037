use std::fs;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::{TempDir, tempdir};

/// Command with an isolated home and no reasoning env overrides.
fn adaptive(home: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("adaptive");
    cmd.env("ADAPTIVE_HOME", home.path())
        .env_remove("ADAPTIVE_REASONING_TAGS")
        .env_remove("ADAPTIVE_LOG");
    cmd
}

fn json_lines(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn test_extract_prints_content_blocks() {
    let home = tempdir().unwrap();

    let output = adaptive(&home)
        .arg("extract")
        .write_stdin("<think>plan</think>answer")
        .output()
        .unwrap();
    assert!(output.status.success());

    let blocks: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        blocks,
        serde_json::json!([
            { "type": "reasoning", "text": "plan" },
            { "type": "text", "text": "answer" }
        ])
    );
}

#[test]
fn test_extract_plain_reads_file() {
    let home = tempdir().unwrap();
    let input = home.path().join("response.txt");
    fs::write(&input, "Intro<reasoning>why</reasoning>Outro").unwrap();

    adaptive(&home)
        .args(["extract", "--plain"])
        .arg(&input)
        .assert()
        .success()
        .stdout("[reasoning]\nwhy\n\n[text]\nIntro\nOutro\n");
}

#[test]
fn test_extract_missing_file_fails() {
    let home = tempdir().unwrap();

    adaptive(&home)
        .args(["extract", "does-not-exist.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read input"));
}

#[test]
fn test_extract_uses_config_tags() {
    let home = tempdir().unwrap();
    fs::write(
        home.path().join("config.toml"),
        "[reasoning]\ntag_patterns = [\"thought\"]\n",
    )
    .unwrap();

    adaptive(&home)
        .args(["extract", "--plain"])
        .write_stdin("<think>kept</think><thought>t</thought>")
        .assert()
        .success()
        .stdout("[reasoning]\nt\n\n[text]\n<think>kept</think>\n");
}

#[test]
fn test_env_tags_override_config() {
    let home = tempdir().unwrap();
    fs::write(
        home.path().join("config.toml"),
        "[reasoning]\ntag_patterns = [\"thought\"]\n",
    )
    .unwrap();

    adaptive(&home)
        .env("ADAPTIVE_REASONING_TAGS", "analysis")
        .args(["extract", "--plain"])
        .write_stdin("<analysis>a</analysis>done")
        .assert()
        .success()
        .stdout("[reasoning]\na\n\n[text]\ndone\n");
}

#[test]
fn test_tags_flag_overrides_env() {
    let home = tempdir().unwrap();

    adaptive(&home)
        .env("ADAPTIVE_REASONING_TAGS", "analysis")
        .args(["extract", "--plain", "--tags", "scratch"])
        .write_stdin("<scratch>s</scratch>done")
        .assert()
        .success()
        .stdout("[reasoning]\ns\n\n[text]\ndone\n");
}

#[test]
fn test_extract_start_with_reasoning() {
    let home = tempdir().unwrap();

    adaptive(&home)
        .args(["extract", "--plain", "--start-with-reasoning"])
        .write_stdin("thinking first</think>then answer")
        .assert()
        .success()
        .stdout("[reasoning]\nthinking first\n\n[text]\nthen answer\n");
}

#[test]
fn test_extract_custom_pattern() {
    let home = tempdir().unwrap();

    adaptive(&home)
        .args(["extract", "--plain", "--pattern", "(?s)<<(.*?)>>"])
        .write_stdin("<<note>>final")
        .assert()
        .success()
        .stdout("[reasoning]\nnote\n\n[text]\nfinal\n");
}

#[test]
fn test_invalid_pattern_fails() {
    let home = tempdir().unwrap();

    adaptive(&home)
        .args(["extract", "--pattern", "(unclosed"])
        .write_stdin("text")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid reasoning pattern"));
}

#[test]
fn test_invalid_config_fails() {
    let home = tempdir().unwrap();
    fs::write(home.path().join("config.toml"), "[reasoning\n").unwrap();

    adaptive(&home)
        .arg("extract")
        .write_stdin("text")
        .assert()
        .failure()
        .stderr(predicate::str::contains("load config"));
}

#[test]
fn test_stream_emits_reasoning_parts() {
    let home = tempdir().unwrap();

    let output = adaptive(&home)
        .args(["stream", "--chunk-size", "3", "--id", "t1"])
        .write_stdin("<think>why</think>ok")
        .output()
        .unwrap();
    assert!(output.status.success());

    let parts = json_lines(&output.stdout);
    let types: Vec<&str> = parts.iter().filter_map(|p| p["type"].as_str()).collect();
    assert_eq!(types.first(), Some(&"stream-start"));
    assert_eq!(types.last(), Some(&"finish"));
    assert!(types.contains(&"reasoning-start"));
    assert!(types.contains(&"reasoning-end"));

    let reasoning: String = parts
        .iter()
        .filter(|p| p["type"] == "reasoning-delta")
        .map(|p| {
            assert_eq!(p["id"], "reasoning-t1-0");
            p["delta"].as_str().unwrap().to_string()
        })
        .collect();
    let text: String = parts
        .iter()
        .filter(|p| p["type"] == "text-delta")
        .map(|p| p["delta"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(reasoning, "why");
    assert_eq!(text, "ok");
}

#[test]
fn test_stream_pattern_mode_passes_text_through() {
    let home = tempdir().unwrap();

    let output = adaptive(&home)
        .args(["stream", "--chunk-size", "4", "--pattern", "(?s)<<(.*?)>>"])
        .write_stdin("<<note>>final")
        .output()
        .unwrap();
    assert!(output.status.success());

    let parts = json_lines(&output.stdout);
    assert!(parts.iter().all(|p| p["type"] != "reasoning-delta"));
    let text: String = parts
        .iter()
        .filter(|p| p["type"] == "text-delta")
        .map(|p| p["delta"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(text, "<<note>>final");
}
