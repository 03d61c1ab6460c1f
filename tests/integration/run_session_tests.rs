//! End-to-end tests for one-shot runs against a real interpreter.

use std::time::{Duration, Instant};

use runpad::models::SessionEvent;
use runpad::process::env::ProcessEnv;
use runpad::runner::{self, RunRequest};
use runpad::AppError;
use serial_test::serial;
use tokio::sync::mpsc;

use super::test_helpers::{
    error_text, finished_count, output_text, python, timeouts, wait_finished,
};

fn request(code: &str, interpreter: std::path::PathBuf, dir: &tempfile::TempDir) -> RunRequest {
    RunRequest {
        code: code.to_owned(),
        interpreter,
        working_dir: dir.path().to_path_buf(),
        env: ProcessEnv::for_execution(),
    }
}

#[tokio::test]
#[serial]
async fn prints_output_and_reports_exit_code() {
    let Some(python) = python() else { return };
    let dir = tempfile::tempdir().expect("tempdir");
    let (tx, mut rx) = mpsc::channel(64);

    let handle = runner::start(request("print(\"hi\")\n", python, &dir), &timeouts(), tx)
        .await
        .expect("start");
    let script = handle.script_path().to_path_buf();

    let mut log = Vec::new();
    let exit_code = wait_finished(&mut rx, &mut log).await;

    assert_eq!(log.first(), Some(&SessionEvent::Started));
    assert!(output_text(&log).contains("hi"));
    assert_eq!(exit_code, Some(0));
    assert_eq!(finished_count(&log), 1);
    assert!(!script.exists(), "script should be deleted after the run");
    assert!(!handle.is_running());
}

#[tokio::test]
#[serial]
async fn nonzero_exit_code_is_reported() {
    let Some(python) = python() else { return };
    let dir = tempfile::tempdir().expect("tempdir");
    let (tx, mut rx) = mpsc::channel(64);

    let _handle = runner::start(
        request("import sys\nsys.exit(3)\n", python, &dir),
        &timeouts(),
        tx,
    )
    .await
    .expect("start");

    let mut log = Vec::new();
    assert_eq!(wait_finished(&mut rx, &mut log).await, Some(3));
}

#[tokio::test]
#[serial]
async fn stderr_arrives_as_error_events() {
    let Some(python) = python() else { return };
    let dir = tempfile::tempdir().expect("tempdir");
    let (tx, mut rx) = mpsc::channel(64);

    let _handle = runner::start(
        request("import sys\nsys.stderr.write(\"oops\\n\")\n", python, &dir),
        &timeouts(),
        tx,
    )
    .await
    .expect("start");

    let mut log = Vec::new();
    wait_finished(&mut rx, &mut log).await;
    assert!(error_text(&log).contains("oops"));
    assert!(!output_text(&log).contains("oops"));
}

#[tokio::test]
#[serial]
async fn output_order_is_preserved() {
    let Some(python) = python() else { return };
    let dir = tempfile::tempdir().expect("tempdir");
    let (tx, mut rx) = mpsc::channel(8);

    let _handle = runner::start(
        request("for i in range(500):\n    print(i)\n", python, &dir),
        &timeouts(),
        tx,
    )
    .await
    .expect("start");

    let mut log = Vec::new();
    wait_finished(&mut rx, &mut log).await;

    let expected: String = (0..500).map(|i| format!("{i}\n")).collect();
    assert_eq!(output_text(&log), expected);
}

#[tokio::test]
#[serial]
async fn non_ascii_output_survives_decoding() {
    let Some(python) = python() else { return };
    let dir = tempfile::tempdir().expect("tempdir");
    let (tx, mut rx) = mpsc::channel(64);

    let _handle = runner::start(
        request("print(\"h\\u00e9llo \\u03bb\")\n", python, &dir),
        &timeouts(),
        tx,
    )
    .await
    .expect("start");

    let mut log = Vec::new();
    wait_finished(&mut rx, &mut log).await;
    assert!(output_text(&log).contains("héllo λ"));
}

#[tokio::test]
#[serial]
async fn runs_in_requested_working_dir() {
    let Some(python) = python() else { return };
    let dir = tempfile::tempdir().expect("tempdir");
    let (tx, mut rx) = mpsc::channel(64);

    let _handle = runner::start(
        request("import os\nprint(os.getcwd())\n", python, &dir),
        &timeouts(),
        tx,
    )
    .await
    .expect("start");

    let mut log = Vec::new();
    wait_finished(&mut rx, &mut log).await;

    let expected = dir.path().canonicalize().expect("canonical tempdir");
    let printed = std::path::PathBuf::from(output_text(&log).trim());
    assert_eq!(printed.canonicalize().expect("canonical cwd"), expected);
}

#[tokio::test]
#[serial]
async fn forced_stop_ends_busy_loop() {
    let Some(python) = python() else { return };
    let dir = tempfile::tempdir().expect("tempdir");
    let (tx, mut rx) = mpsc::channel(64);

    let handle = runner::start(
        request("while True:\n    pass\n", python, &dir),
        &timeouts(),
        tx,
    )
    .await
    .expect("start");
    let script = handle.script_path().to_path_buf();
    assert!(handle.is_running());

    handle.stop(true).await;
    assert!(!handle.is_running());
    assert!(!script.exists(), "script should be deleted once stop returns");

    handle.stop(true).await;

    let mut log = Vec::new();
    let exit_code = wait_finished(&mut rx, &mut log).await;
    if cfg!(unix) {
        assert_eq!(exit_code, None, "a killed process has no exit code");
    }
    assert_eq!(finished_count(&log), 1);
}

#[tokio::test]
#[serial]
async fn graceful_stop_ends_sleeping_program_promptly() {
    let Some(python) = python() else { return };
    let dir = tempfile::tempdir().expect("tempdir");
    let (tx, mut rx) = mpsc::channel(64);
    let timeouts = timeouts();

    let handle = runner::start(
        request("import time\ntime.sleep(60)\n", python, &dir),
        &timeouts,
        tx,
    )
    .await
    .expect("start");

    let started = Instant::now();
    handle.stop(false).await;
    let bound = Duration::from_millis(timeouts.graceful_stop_ms + timeouts.kill_ms)
        + Duration::from_secs(2);
    assert!(started.elapsed() < bound, "stop took {:?}", started.elapsed());

    let mut log = Vec::new();
    wait_finished(&mut rx, &mut log).await;
    assert!(!handle.is_running());
}

#[tokio::test]
#[serial]
async fn missing_interpreter_is_start_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (tx, mut rx) = mpsc::channel(64);

    let result = runner::start(
        request(
            "print(1)\n",
            dir.path().join("no-such-python"),
            &dir,
        ),
        &timeouts(),
        tx,
    )
    .await;

    assert!(matches!(result, Err(AppError::StartFailure(_))));
    assert!(rx.try_recv().is_err(), "no events for a run that never started");
}
