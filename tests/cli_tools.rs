use std::path::PathBuf;
use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_vocal_cli"))
}

fn temp_wav(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("vocal_cli_{}_{}.wav", name, std::process::id()))
}

fn json_lines(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8(stdout.to_vec())
        .expect("stdout UTF-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("JSON line"))
        .collect()
}

#[test]
fn note_maps_frequency() {
    let output = cli()
        .args(["note", "--frequency", "440"])
        .output()
        .expect("failed to run vocal_cli note");
    assert!(output.status.success());

    let json = &json_lines(&output.stdout)[0];
    assert_eq!(json["note"], "A4");
    assert!(json["cents"].as_f64().unwrap().abs() < 0.01);
    assert_eq!(json["band"], "Perfect");
}

#[test]
fn note_maps_name_to_frequency() {
    let output = cli()
        .args(["note", "--name", "C4"])
        .output()
        .expect("failed to run vocal_cli note --name");
    assert!(output.status.success());

    let json = &json_lines(&output.stdout)[0];
    assert_eq!(json["note"], "C4");
    assert!((json["frequency_hz"].as_f64().unwrap() - 261.63).abs() < 0.01);
}

#[test]
fn note_rejects_unknown_name() {
    let output = cli()
        .args(["note", "--name", "H2"])
        .output()
        .expect("failed to run vocal_cli note");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn tone_then_analyze_recovers_pitch() {
    let path = temp_wav("a4");
    let path_arg = path.to_string_lossy().into_owned();

    let output = cli()
        .args(["tone", "--note", "A4", "--duration-ms", "500", "--output", &path_arg])
        .output()
        .expect("failed to run vocal_cli tone");
    assert!(output.status.success(), "tone exited with {:?}", output.status);

    let output = cli()
        .args(["analyze", "--input", &path_arg])
        .output()
        .expect("failed to run vocal_cli analyze");
    assert!(output.status.success());

    let frames = json_lines(&output.stdout);
    // 500 ms at 44.1 kHz holds ten full 2048-sample windows
    assert_eq!(frames.len(), 10);
    let middle = &frames[5];
    assert_eq!(middle["note"], "A4");
    assert!((middle["frequency_hz"].as_f64().unwrap() - 440.0).abs() < 4.4);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn analyze_missing_file_fails() {
    let output = cli()
        .args(["analyze", "--input", "/nonexistent/take.wav"])
        .output()
        .expect("failed to run vocal_cli analyze");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(stderr.contains("take.wav"), "unexpected stderr {stderr}");
}

#[test]
fn exercises_lists_catalog() {
    let output = cli()
        .args(["exercises", "--kind", "vocal"])
        .output()
        .expect("failed to run vocal_cli exercises");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    assert!(stdout.contains("c-major-scale"));
    assert!(!stdout.contains("box-breathing"));

    let output = cli()
        .args(["exercises", "--json"])
        .output()
        .expect("failed to run vocal_cli exercises --json");
    let json: Value = serde_json::from_slice(&output.stdout).expect("catalog JSON");
    assert_eq!(json.as_array().map(Vec::len), Some(8));
}

#[test]
fn simulate_in_tune_singer_passes() {
    let output = cli()
        .args([
            "simulate",
            "--exercise",
            "5-note-warmup",
            "--tempo",
            "600",
            "--settle-ms",
            "0",
            "--gap-ms",
            "0",
        ])
        .output()
        .expect("failed to run vocal_cli simulate");
    assert!(
        output.status.success(),
        "simulate exited with {:?}",
        output.status.code()
    );

    let json: Value = serde_json::from_slice(&output.stdout).expect("results JSON");
    assert_eq!(json["exercise_id"], "5-note-warmup");
    assert_eq!(json["note_results"].as_array().map(Vec::len), Some(5));
    assert!(json["overall_accuracy"].as_f64().unwrap() > 90.0);
}

#[test]
fn simulate_rejects_breathing_exercise() {
    let output = cli()
        .args(["simulate", "--exercise", "box-breathing"])
        .output()
        .expect("failed to run vocal_cli simulate");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn breathe_dry_run_prints_sequence() {
    let output = cli()
        .args(["breathe", "--exercise", "diaphragmatic-breathing", "--dry-run"])
        .output()
        .expect("failed to run vocal_cli breathe");
    assert!(output.status.success());

    let lines = json_lines(&output.stdout);
    let summary = lines.last().unwrap();
    assert_eq!(summary["exercise_id"], "diaphragmatic-breathing");
    assert_eq!(summary["duration_secs"], 65);

    let completions = lines
        .iter()
        .filter(|line| line["type"] == "completed")
        .count();
    assert_eq!(completions, 1);
}

#[test]
fn breathe_unknown_exercise_fails() {
    let output = cli()
        .args(["breathe", "--exercise", "nope", "--dry-run"])
        .output()
        .expect("failed to run vocal_cli breathe");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(stderr.contains("unknown exercise"));
}
