use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;

fn cli(data_dir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_apnea_cli"));
    command.arg("--data-dir").arg(data_dir);
    command
}

fn temp_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("apnea-cli-{}-{}", label, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn run_json(data_dir: &Path, args: &[&str]) -> Value {
    let output = cli(data_dir).args(args).output().expect("run apnea_cli");
    assert!(
        output.status.success(),
        "{:?} exited with {:?}: {}",
        args,
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

fn run_raw(data_dir: &Path, args: &[&str]) -> Output {
    cli(data_dir).args(args).output().expect("run apnea_cli")
}

#[test]
fn full_workflow_on_synthetic_recording() {
    let dir = temp_dir("workflow");
    let data_dir = dir.join("data");
    let wav = dir.join("night.wav");
    let wav_arg = wav.to_str().expect("utf8 path");

    let synth = run_json(
        &data_dir,
        &["synth", "--output", wav_arg, "--minutes", "6", "--apneas", "3"],
    );
    let pauses = synth["pauses"].as_array().expect("pauses");
    assert_eq!(pauses.len(), 3);
    assert_eq!(pauses[0]["start"], 90.0);
    assert!(wav.exists());

    let analyze = run_json(&data_dir, &["analyze", "--input", wav_arg, "--job", "night"]);
    assert_eq!(analyze["duration_secs"], 360.0);
    let candidates = analyze["candidates"].as_array().expect("candidates");
    assert!(candidates.len() >= 3);
    for candidate in &candidates[..3] {
        assert!(candidate["rms_value"].as_f64().unwrap() > 0.2);
        assert_eq!(candidate["status"], "unjudged");
        assert_eq!(candidate["source"], "peak");
        assert!(candidate["apnea_window"]["start"].is_number());
    }

    let envelope = run_json(
        &data_dir,
        &["envelope", "--job", "night", "--max-points", "100"],
    );
    let points = envelope["points"].as_array().expect("points");
    assert!(points.len() <= 100 && points.len() >= 2);
    assert!(envelope["statistics"]["max"].as_f64().unwrap() > 0.2);

    // The three gasps ending the pauses rank first
    let mut gasp_times: Vec<f64> = candidates[..3]
        .iter()
        .map(|c| c["time_offset"].as_f64().unwrap())
        .collect();
    gasp_times.sort_by(|a, b| a.total_cmp(b));
    for (time, pause) in gasp_times.iter().zip(pauses) {
        assert!((time - pause["end"].as_f64().unwrap()).abs() <= 1.5);
    }

    for id in ["0", "1", "2"] {
        run_json(
            &data_dir,
            &["judge", "--job", "night", "--candidate", id, "--status", "apnea"],
        );
    }
    let summary = run_json(&data_dir, &["summary", "--job", "night"]);
    assert_eq!(summary["summary"]["apnea"], 3);
    assert_eq!(
        summary["summary"]["total"].as_u64().unwrap(),
        candidates.len() as u64
    );

    let expand = run_json(&data_dir, &["expand", "--job", "night", "--sigma", "2"]);
    assert_eq!(expand["statistics"]["judged_count"], 3);
    assert!(expand["candidates"].is_array());

    // Fresh calibration from the judgments
    let report = run_json(&data_dir, &["report", "--job", "night"]);
    assert_eq!(report["job"], "night");
    assert_eq!(report["events"].as_array().unwrap().len(), 3);
    assert!((report["sas"]["overall_ahi"].as_f64().unwrap() - 30.0).abs() < 1e-9);
    assert_eq!(report["sas"]["severity"], "Severe");
    assert!(report["parameters"]["resume_multiplier"].as_f64().unwrap() > 1.0);
    assert!(data_dir.join("night").join("events.json").exists());

    let calibrate = run_json(&data_dir, &["calibrate", "--job", "night"]);
    assert_eq!(calibrate["source"], "judgments");
    assert_eq!(calibrate["parameters"], report["parameters"]);

    let stored = run_json(&data_dir, &["report", "--job", "night", "--stored"]);
    assert_eq!(stored["parameters"], calibrate["parameters"]);
    assert_eq!(stored["events"], report["events"]);

    let direct = run_json(&data_dir, &["report", "--job", "night", "--from-judgments"]);
    assert!(direct.get("parameters").is_none());
    let events = direct["events"].as_array().unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0]["duration"], 10.0);
    assert!((direct["sas"]["overall_ahi"].as_f64().unwrap() - 30.0).abs() < 1e-9);

    // Marker calibration replaces the stored parameters
    let markers = run_json(
        &data_dir,
        &["calibrate", "--job", "night", "--from-markers", "90:110"],
    );
    assert_eq!(markers["source"], "markers");
    assert_ne!(markers["parameters"], calibrate["parameters"]);
    let stored = run_json(&data_dir, &["report", "--job", "night", "--stored"]);
    assert_eq!(stored["parameters"], markers["parameters"]);
    assert_eq!(stored["events"].as_array().unwrap().len(), 3);

    let explicit = run_json(
        &data_dir,
        &[
            "report",
            "--job",
            "night",
            "--silence-threshold",
            "0.02",
            "--resume-multiplier",
            "3",
        ],
    );
    assert_eq!(explicit["events"].as_array().unwrap().len(), 3);

    let csv = run_raw(&data_dir, &["report", "--job", "night", "--stored", "--format", "csv"]);
    assert!(csv.status.success());
    let csv = String::from_utf8(csv.stdout).expect("utf8 csv");
    let mut sections = csv.split("\n\n");
    let summary_rows = sections.next().expect("summary rows");
    assert!(summary_rows.starts_with("metric,value\n"));
    assert!(summary_rows.contains("job,night\n"));
    assert!(summary_rows.contains("event_count,3\n"));
    assert!(summary_rows.contains("severity,Severe\n"));
    let event_rows: Vec<&str> = sections.next().expect("event rows").lines().collect();
    assert_eq!(event_rows[0], "start_time,end_time,duration,trough_rms");
    assert_eq!(event_rows.len(), 4);
    assert!(event_rows[1].starts_with("90,110,20,"));

    let jobs = run_json(&data_dir, &["jobs"]);
    assert_eq!(jobs["jobs"], serde_json::json!(["night"]));

    let deleted = run_json(&data_dir, &["delete", "--job", "night"]);
    assert_eq!(deleted["deleted"], true);
    let jobs = run_json(&data_dir, &["jobs"]);
    assert_eq!(jobs["jobs"], serde_json::json!([]));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn report_on_unknown_job_fails() {
    let dir = temp_dir("missing");

    let output = run_raw(&dir, &["report", "--job", "nobody", "--baseline"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nobody"), "unexpected stderr: {stderr}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn stored_report_requires_calibration() {
    let dir = temp_dir("uncalibrated");
    let data_dir = dir.join("data");
    let wav = dir.join("short.wav");
    let wav_arg = wav.to_str().expect("utf8 path");
    run_json(
        &data_dir,
        &["synth", "--output", wav_arg, "--minutes", "2", "--apneas", "1"],
    );
    run_json(&data_dir, &["analyze", "--input", wav_arg, "--job", "short"]);

    let output = run_raw(&data_dir, &["report", "--job", "short", "--stored"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no stored calibration"), "unexpected stderr: {stderr}");

    let output = run_raw(
        &data_dir,
        &["report", "--job", "short", "--stored", "--from-judgments"],
    );
    assert!(!output.status.success());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn broken_local_config_falls_back_to_defaults() {
    let dir = temp_dir("config");
    std::fs::write(dir.join("config.json"), "{ not json").expect("write config");

    let jobs = run_json(&dir, &["jobs"]);
    assert_eq!(jobs["jobs"], serde_json::json!([]));

    let output = run_raw(&dir, &["--config", dir.join("config.json").to_str().unwrap(), "jobs"]);
    assert_eq!(output.status.code(), Some(1));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn judge_rejects_unknown_status() {
    let dir = temp_dir("status");

    let output = run_raw(
        &dir,
        &["judge", "--job", "night", "--candidate", "0", "--status", "maybe"],
    );

    assert!(!output.status.success());
    let _ = std::fs::remove_dir_all(&dir);
}
