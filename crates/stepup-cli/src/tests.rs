use std::fs;
use std::io::Cursor;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::anyhow;
use clap::CommandFactory;
use clap::Parser;
use stepup_core::{
    build_queue, Deployment, DeploymentError, HeaderError, History, HistoryError, QueueError,
    ScriptDescriptor, Settings,
};

use super::{parse_deployment, Cli};
use crate::dispatch::outcome_status;
use crate::error::{render_error_chain, ExitStatus, FatalError};
use crate::log::RunLog;
use crate::prompt::{read_step_decision, StepDecision};
use crate::render::{current_output_style, render_status_line, OutputStyle};
use crate::runner::{run_steps, RunOptions, RunOutcome};
use crate::services::run_service_command;

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_dir(label: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let sequence = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.push(format!(
        "stepup-cli-tests-{}-{}-{}",
        std::process::id(),
        label,
        sequence
    ));
    fs::create_dir_all(&path).expect("must create test dir");
    path
}

fn write_step(dir: &Path, file_name: &str, body: &str) {
    let contents = format!(
        "#!/bin/sh\n# name: {file_name}\n# apply: katello headpin\n# run: once\n{body}"
    );
    let path = dir.join(file_name);
    fs::write(&path, contents).expect("must write step");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("must chmod step");
}

fn test_settings(dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.scripts_dir = dir.to_path_buf();
    settings.history_file = dir.join("history");
    settings.log_file = dir.join("upgrade.log");
    settings.deployment_file = dir.join("deploy.conf");
    settings
}

fn test_log(dir: &Path) -> RunLog {
    let (log, warning) = RunLog::open(&dir.join("upgrade.log"), true, OutputStyle::Plain);
    assert!(warning.is_none(), "log must open in tests");
    log
}

fn queued_steps(settings: &Settings, history: &History) -> Vec<ScriptDescriptor> {
    build_queue(&settings.scripts_dir, Deployment::Katello, history)
        .expect("queue must build")
        .steps
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn cli_parses_all_flags() {
    let cli = Cli::try_parse_from([
        "stepup",
        "--autostop",
        "-y",
        "--dry-run",
        "-q",
        "--describe",
        "--json",
        "--trace",
        "--skip-service-check",
        "--skip-root-check",
        "--deployment",
        "headpin",
        "--config",
        "/tmp/stepup.conf",
    ])
    .expect("flags must parse");
    assert!(cli.autostop);
    assert!(cli.assumeyes);
    assert!(cli.dry_run);
    assert!(cli.quiet);
    assert!(cli.describe);
    assert!(cli.json);
    assert!(cli.trace);
    assert!(cli.skip_service_check);
    assert!(cli.skip_root_check);
    assert_eq!(cli.deployment, Some(Deployment::Headpin));
    assert_eq!(cli.config.as_deref(), Some(Path::new("/tmp/stepup.conf")));
}

#[test]
fn cli_rejects_unknown_flags() {
    Cli::try_parse_from(["stepup", "--bogus"]).expect_err("unknown flag must fail");
}

#[test]
fn deployment_override_values() {
    assert_eq!(parse_deployment("katello"), Ok(Deployment::Katello));
    assert_eq!(parse_deployment("headpin"), Ok(Deployment::Headpin));
    assert_eq!(parse_deployment("sam"), Ok(Deployment::Headpin));
    assert!(parse_deployment("beef").is_err());
}

#[test]
fn exit_codes_are_fixed() {
    assert_eq!(ExitStatus::Success.code(), 0);
    assert_eq!(ExitStatus::Interrupted.code(), 1);
    assert_eq!(ExitStatus::General.code(), 2);
    assert_eq!(ExitStatus::NotRoot.code(), 3);
    assert_eq!(ExitStatus::ServiceStop.code(), 4);
    assert_eq!(ExitStatus::OptionParse.code(), 101);
    assert_eq!(ExitStatus::Validation.code(), 102);
    assert_eq!(ExitStatus::DeploymentDetect.code(), 103);
    assert_eq!(ExitStatus::ExternallyStopped.code(), 127);
}

fn header_error() -> HeaderError {
    HeaderError::MissingField {
        path: PathBuf::from("x"),
        field: "name",
    }
}

#[test]
fn fatal_errors_map_to_their_codes() {
    assert_eq!(FatalError::NotRoot.exit_status(), ExitStatus::NotRoot);
    assert_eq!(
        FatalError::ServiceStop(anyhow!("boom")).exit_status(),
        ExitStatus::ServiceStop
    );
    assert_eq!(
        FatalError::ServicesRunning(anyhow!("boom")).exit_status(),
        ExitStatus::ServiceStop
    );
    assert_eq!(
        FatalError::Validation(header_error()).exit_status(),
        ExitStatus::Validation
    );
    assert_eq!(
        FatalError::DeploymentDetect(DeploymentError::Unreadable {
            path: PathBuf::from("x"),
            source: std::io::Error::other("io"),
        })
        .exit_status(),
        ExitStatus::DeploymentDetect
    );
    assert_eq!(
        FatalError::History(HistoryError::Read {
            path: PathBuf::from("x"),
            source: std::io::Error::other("io"),
        })
        .exit_status(),
        ExitStatus::General
    );
    assert_eq!(
        FatalError::General(anyhow!("boom")).exit_status(),
        ExitStatus::General
    );
}

#[test]
fn queue_errors_split_between_validation_and_general() {
    let validation = FatalError::from(QueueError::Header(header_error()));
    assert_eq!(validation.exit_status(), ExitStatus::Validation);

    let general = FatalError::from(QueueError::ListDir {
        dir: PathBuf::from("x"),
        source: std::io::Error::other("io"),
    });
    assert_eq!(general.exit_status(), ExitStatus::General);
}

#[test]
fn error_chain_includes_sources() {
    let err = FatalError::General(anyhow!("inner").context("outer"));
    let rendered = render_error_chain(&err);
    assert!(rendered.contains("outer"));
    assert!(rendered.contains("inner"));
}

#[test]
fn outcome_maps_to_exit_status() {
    assert_eq!(outcome_status(RunOutcome::Completed), ExitStatus::Success);
    assert_eq!(outcome_status(RunOutcome::Declined), ExitStatus::Interrupted);
    assert_eq!(
        outcome_status(RunOutcome::StepFailed),
        ExitStatus::Interrupted
    );
    assert_eq!(
        outcome_status(RunOutcome::StepKilled),
        ExitStatus::ExternallyStopped
    );
}

fn decide_from(answers: &str) -> StepDecision {
    let mut input = Cursor::new(answers.as_bytes().to_vec());
    let mut output = Vec::new();
    read_step_decision("Upgrade database", &mut input, &mut output)
        .expect("prompt must not fail on in-memory streams")
}

#[test]
fn prompt_accepts_long_and_short_answers() {
    assert_eq!(decide_from("y\n"), StepDecision::Run);
    assert_eq!(decide_from("YES\n"), StepDecision::Run);
    assert_eq!(decide_from("s\n"), StepDecision::Skip);
    assert_eq!(decide_from("skip\n"), StepDecision::Skip);
    assert_eq!(decide_from("n\n"), StepDecision::Abort);
    assert_eq!(decide_from("No\n"), StepDecision::Abort);
}

#[test]
fn prompt_reasks_on_invalid_answer() {
    let mut input = Cursor::new(b"maybe\ny\n".to_vec());
    let mut output = Vec::new();
    let decision = read_step_decision("Upgrade database", &mut input, &mut output)
        .expect("prompt must not fail");
    assert_eq!(decision, StepDecision::Run);
    let prompted = String::from_utf8(output).expect("prompt output must be utf-8");
    assert!(prompted.contains("Upgrade database"));
    assert!(prompted.contains("Please answer"));
    assert_eq!(prompted.matches("[y/s/n]").count(), 2);
}

#[test]
fn prompt_treats_eof_as_abort() {
    assert_eq!(decide_from(""), StepDecision::Abort);
}

#[test]
fn service_command_pass_and_fail() {
    run_service_command(&argv(&["true"])).expect("true must pass");
    run_service_command(&argv(&["false"])).expect_err("false must fail");
    run_service_command(&argv(&[])).expect_err("empty command must fail");
    run_service_command(&argv(&["stepup-no-such-binary"]))
        .expect_err("unknown binary must fail");
}

#[test]
fn run_executes_queue_and_records_once_steps() {
    let dir = test_dir("run-ok");
    write_step(&dir, "01-a", "echo applying a\ntouch marker-a\nexit 0\n");
    write_step(&dir, "02-b", "touch marker-b\nexit 0\n");
    let settings = test_settings(&dir);
    let mut history = History::load(&settings.history_file).expect("must load");
    let steps = queued_steps(&settings, &history);
    assert_eq!(steps.len(), 2);

    let options = RunOptions {
        dry_run: false,
        assume_yes: true,
    };
    let mut log = test_log(&dir);
    let outcome = run_steps(&steps, &mut history, &settings, &options, &mut log, |_| {
        Ok(StepDecision::Run)
    })
    .expect("run must succeed");

    assert_eq!(outcome, RunOutcome::Completed);
    // Steps run from the scripts directory.
    assert!(dir.join("marker-a").exists());
    assert!(dir.join("marker-b").exists());
    assert_eq!(
        fs::read_to_string(&settings.history_file).expect("history must exist"),
        "01-a\n02-b\n"
    );

    // Re-running finds nothing to do.
    let history = History::load(&settings.history_file).expect("must reload");
    assert!(queued_steps(&settings, &history).is_empty());
}

#[test]
fn run_stops_at_first_failing_step() {
    let dir = test_dir("run-fail");
    write_step(&dir, "01-a", "touch marker-a\nexit 0\n");
    write_step(&dir, "02-b", "exit 3\n");
    write_step(&dir, "03-c", "touch marker-c\nexit 0\n");
    let settings = test_settings(&dir);
    let mut history = History::load(&settings.history_file).expect("must load");
    let steps = queued_steps(&settings, &history);

    let options = RunOptions {
        dry_run: false,
        assume_yes: true,
    };
    let mut log = test_log(&dir);
    let outcome = run_steps(&steps, &mut history, &settings, &options, &mut log, |_| {
        Ok(StepDecision::Run)
    })
    .expect("run must not be fatal");

    assert_eq!(outcome, RunOutcome::StepFailed);
    assert!(!dir.join("marker-c").exists(), "later steps must not run");
    // Only the step that completed is recorded.
    assert_eq!(
        fs::read_to_string(&settings.history_file).expect("history must exist"),
        "01-a\n"
    );
}

#[test]
fn run_declined_at_first_prompt_leaves_history_untouched() {
    let dir = test_dir("run-decline");
    write_step(&dir, "01-a", "touch marker-a\nexit 0\n");
    let settings = test_settings(&dir);
    let mut history = History::load(&settings.history_file).expect("must load");
    let steps = queued_steps(&settings, &history);

    let options = RunOptions {
        dry_run: false,
        assume_yes: false,
    };
    let mut log = test_log(&dir);
    let outcome = run_steps(&steps, &mut history, &settings, &options, &mut log, |_| {
        Ok(StepDecision::Abort)
    })
    .expect("run must not be fatal");

    assert_eq!(outcome, RunOutcome::Declined);
    assert!(!dir.join("marker-a").exists());
    assert!(!settings.history_file.exists());
}

#[test]
fn run_skip_continues_without_state_change() {
    let dir = test_dir("run-skip");
    write_step(&dir, "01-a", "touch marker-a\nexit 0\n");
    write_step(&dir, "02-b", "touch marker-b\nexit 0\n");
    let settings = test_settings(&dir);
    let mut history = History::load(&settings.history_file).expect("must load");
    let steps = queued_steps(&settings, &history);

    let mut answers = vec![StepDecision::Skip, StepDecision::Run].into_iter();
    let options = RunOptions {
        dry_run: false,
        assume_yes: false,
    };
    let mut log = test_log(&dir);
    let outcome = run_steps(&steps, &mut history, &settings, &options, &mut log, |_| {
        Ok(answers.next().unwrap_or(StepDecision::Abort))
    })
    .expect("run must succeed");

    assert_eq!(outcome, RunOutcome::Completed);
    assert!(!dir.join("marker-a").exists());
    assert!(dir.join("marker-b").exists());
    assert_eq!(
        fs::read_to_string(&settings.history_file).expect("history must exist"),
        "02-b\n"
    );
}

#[test]
fn dry_run_executes_nothing_and_records_nothing() {
    let dir = test_dir("run-dry");
    write_step(&dir, "01-a", "touch marker-a\nexit 0\n");
    let settings = test_settings(&dir);
    let mut history = History::load(&settings.history_file).expect("must load");
    let steps = queued_steps(&settings, &history);

    let options = RunOptions {
        dry_run: true,
        assume_yes: true,
    };
    let mut log = test_log(&dir);
    let outcome = run_steps(&steps, &mut history, &settings, &options, &mut log, |_| {
        Ok(StepDecision::Run)
    })
    .expect("dry run must succeed");

    assert_eq!(outcome, RunOutcome::Completed);
    assert!(!dir.join("marker-a").exists());
    assert!(!settings.history_file.exists());

    // The queue is unchanged afterwards.
    let history = History::load(&settings.history_file).expect("must reload");
    assert_eq!(queued_steps(&settings, &history).len(), 1);
}

#[test]
fn signal_killed_step_is_externally_stopped() {
    let dir = test_dir("run-killed");
    write_step(&dir, "01-a", "kill -9 $$\n");
    let settings = test_settings(&dir);
    let mut history = History::load(&settings.history_file).expect("must load");
    let steps = queued_steps(&settings, &history);

    let options = RunOptions {
        dry_run: false,
        assume_yes: true,
    };
    let mut log = test_log(&dir);
    let outcome = run_steps(&steps, &mut history, &settings, &options, &mut log, |_| {
        Ok(StepDecision::Run)
    })
    .expect("run must not be fatal");

    assert_eq!(outcome, RunOutcome::StepKilled);
    assert!(!settings.history_file.exists());
}

#[test]
fn run_log_captures_step_output() {
    let dir = test_dir("run-output");
    write_step(&dir, "01-a", "echo out-line\necho err-line >&2\nexit 0\n");
    let settings = test_settings(&dir);
    let mut history = History::load(&settings.history_file).expect("must load");
    let steps = queued_steps(&settings, &history);

    let options = RunOptions {
        dry_run: false,
        assume_yes: true,
    };
    let mut log = test_log(&dir);
    run_steps(&steps, &mut history, &settings, &options, &mut log, |_| {
        Ok(StepDecision::Run)
    })
    .expect("run must succeed");
    drop(log);

    let logged = fs::read_to_string(settings.log_file).expect("log must exist");
    assert!(logged.contains("out-line"));
    assert!(logged.contains("err-line"));
    assert!(logged.contains("sha256:"));
}

#[test]
fn run_log_lines_are_timestamped_and_skip_descriptions() {
    let dir = test_dir("log-format");
    let path = dir.join("upgrade.log");
    let (mut log, warning) = RunLog::open(&path, true, OutputStyle::Plain);
    assert!(warning.is_none());
    log.message("hello world");
    log.status("done", "step one");
    log.description("operator-only text");
    drop(log);

    let logged = fs::read_to_string(&path).expect("log must exist");
    assert!(logged.contains("hello world"));
    assert!(logged.contains("done: step one"));
    assert!(!logged.contains("operator-only text"));
    for line in logged.lines() {
        assert!(line.starts_with('['), "log lines carry a timestamp: {line}");
    }
}

#[test]
fn unopenable_log_degrades_with_warning() {
    let dir = test_dir("log-degraded");
    // A directory at the log path cannot be opened for appending.
    let path = dir.join("upgrade.log");
    fs::create_dir_all(&path).expect("must create blocking dir");
    let (mut log, warning) = RunLog::open(&path, true, OutputStyle::Plain);
    assert!(warning.is_some(), "blocked log file must warn");
    // Logging still works, terminal-only.
    log.message("still alive");
}

#[test]
fn status_lines_render_plain() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "done", "step one"),
        "done: step one"
    );
}

#[test]
fn quiet_forces_plain_output() {
    assert_eq!(current_output_style(true), OutputStyle::Plain);
}
