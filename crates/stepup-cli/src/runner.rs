use std::io::{BufRead, BufReader};
use std::process::{Child, Command, ExitStatus as ProcessStatus, Stdio};

use anyhow::Context;
use indicatif::ProgressBar;
use stepup_core::{sha256_hex_file, History, ScriptDescriptor, Settings};

use crate::error::FatalError;
use crate::log::RunLog;
use crate::prompt::StepDecision;
use crate::render;

/// How a full step loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Operator answered "no"; safe to resume later.
    Declined,
    /// A step exited non-zero; safe to resume later.
    StepFailed,
    /// A step was terminated by a signal.
    StepKilled,
}

pub struct RunOptions {
    pub dry_run: bool,
    pub assume_yes: bool,
}

enum StepStatus {
    Success,
    Failed(i32),
    Killed,
}

/// Describe mode: names, run modes, and descriptions; nothing executes.
pub fn describe_steps(steps: &[ScriptDescriptor], log: &mut RunLog) {
    if steps.is_empty() {
        log.message("Nothing to do: every applicable step has already run.");
        return;
    }
    log.message(&format!("{} pending step(s):", steps.len()));
    for step in steps {
        log.message(&format!(
            "  {} ({}, run {})",
            step.name,
            step.file_name,
            step.run.as_str()
        ));
        if let Some(description) = &step.description {
            for line in description.lines() {
                log.description(line);
            }
        }
    }
}

/// Executes the queue in order, one subprocess at a time.
///
/// `decide` supplies the operator's answer for each step; production passes
/// the stdin prompter, tests inject canned decisions.
pub fn run_steps(
    steps: &[ScriptDescriptor],
    history: &mut History,
    settings: &Settings,
    options: &RunOptions,
    log: &mut RunLog,
    mut decide: impl FnMut(&ScriptDescriptor) -> std::io::Result<StepDecision>,
) -> Result<RunOutcome, FatalError> {
    if steps.is_empty() {
        log.message("Nothing to do: every applicable step has already run.");
        return Ok(RunOutcome::Completed);
    }

    let bar = render::step_progress(log.style(), steps.len() as u64);
    log.attach_progress(bar.clone());
    let result = drive_steps(
        steps,
        history,
        settings,
        options,
        log,
        bar.as_ref(),
        &mut decide,
    );
    log.attach_progress(None);
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    result
}

fn drive_steps(
    steps: &[ScriptDescriptor],
    history: &mut History,
    settings: &Settings,
    options: &RunOptions,
    log: &mut RunLog,
    bar: Option<&ProgressBar>,
    decide: &mut impl FnMut(&ScriptDescriptor) -> std::io::Result<StepDecision>,
) -> Result<RunOutcome, FatalError> {
    for (index, step) in steps.iter().enumerate() {
        if let Some(bar) = bar {
            bar.set_position(index as u64);
            bar.set_message(step.name.clone());
        }
        announce(step, log);

        let decision = if options.assume_yes {
            StepDecision::Run
        } else {
            decide(step).context("failed reading step prompt answer")?
        };
        match decision {
            StepDecision::Skip => {
                log.status("skipped", &step.name);
                continue;
            }
            StepDecision::Abort => {
                log.status(
                    "stopped",
                    &format!("stopping before '{}' at operator request", step.name),
                );
                return Ok(RunOutcome::Declined);
            }
            StepDecision::Run => {}
        }

        if options.dry_run {
            log.status(
                "dry-run",
                &format!("would run '{}' ({})", step.name, step.file_name),
            );
            continue;
        }

        match execute_step(step, settings, log)? {
            StepStatus::Success => {
                history.mark_done(step)?;
                log.status("done", &step.name);
            }
            StepStatus::Failed(code) => {
                log.status(
                    "failed",
                    &format!("'{}' exited with status {code}", step.name),
                );
                return Ok(RunOutcome::StepFailed);
            }
            StepStatus::Killed => {
                log.status(
                    "failed",
                    &format!("'{}' was terminated by a signal", step.name),
                );
                return Ok(RunOutcome::StepKilled);
            }
        }
    }
    if let Some(bar) = bar {
        bar.set_position(steps.len() as u64);
    }
    Ok(RunOutcome::Completed)
}

fn announce(step: &ScriptDescriptor, log: &mut RunLog) {
    log.message(&format!(
        "Next step: {} ({}, run {})",
        step.name,
        step.file_name,
        step.run.as_str()
    ));
    if let Some(description) = &step.description {
        for line in description.lines() {
            log.description(line);
        }
    }
}

/// Runs one step from the scripts directory, streaming combined
/// stdout/stderr into the log line by line.
fn execute_step(
    step: &ScriptDescriptor,
    settings: &Settings,
    log: &mut RunLog,
) -> Result<StepStatus, FatalError> {
    let digest = sha256_hex_file(&step.path)?;
    log.status(
        "running",
        &format!("{} ({} sha256:{})", step.name, step.file_name, &digest[..12]),
    );

    let (reader, writer) = std::io::pipe().context("failed to create step output pipe")?;
    let mut child = {
        let mut command = Command::new(&step.path);
        command
            .current_dir(&settings.scripts_dir)
            .stdin(Stdio::null())
            .stdout(
                writer
                    .try_clone()
                    .context("failed to clone step output pipe")?,
            )
            .stderr(writer);
        command
            .spawn()
            .with_context(|| format!("failed to launch step '{}'", step.path.display()))?
        // The command, and with it the parent's copies of the pipe writer,
        // drops here; the read loop sees EOF once the child exits.
    };

    if let Err(err) = stream_step_output(reader, log) {
        reap(&mut child);
        return Err(FatalError::General(err));
    }
    let status = child
        .wait()
        .with_context(|| format!("failed waiting for step '{}'", step.path.display()))?;
    Ok(step_status(status))
}

fn stream_step_output(reader: std::io::PipeReader, log: &mut RunLog) -> anyhow::Result<()> {
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .context("failed reading step output")?;
        if read == 0 {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&line);
        log.message(text.trim_end_matches(['\r', '\n']));
    }
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn step_status(status: ProcessStatus) -> StepStatus {
    if status.success() {
        StepStatus::Success
    } else if let Some(code) = status.code() {
        StepStatus::Failed(code)
    } else {
        StepStatus::Killed
    }
}
