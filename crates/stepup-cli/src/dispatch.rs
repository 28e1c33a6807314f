use anyhow::Context;
use stepup_core::{build_queue, Deployment, History, Settings};

use crate::error::{render_error_chain, ExitStatus, FatalError};
use crate::log::RunLog;
use crate::prompt;
use crate::render;
use crate::runner::{self, RunOptions, RunOutcome};
use crate::services;
use crate::{completion, Cli};

/// Drives one invocation end to end and yields the exit status:
/// options are already parsed, so this walks root check, queue building,
/// then describe or the service/step phases.
pub fn run(cli: Cli) -> ExitStatus {
    if let Some(shell) = cli.completions {
        completion::print_completions(shell);
        return ExitStatus::Success;
    }

    // Settings and the root check precede log setup; their failures can
    // only go to stderr.
    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => return report_fatal(&FatalError::General(err), None, cli.quiet, cli.trace),
    };
    if !cli.skip_root_check && !nix::unistd::Uid::effective().is_root() {
        return report_fatal(&FatalError::NotRoot, None, cli.quiet, cli.trace);
    }

    let style = render::current_output_style(cli.quiet);
    let (mut log, warning) = RunLog::open(&settings.log_file, cli.quiet, style);
    if let Some(warning) = warning {
        eprintln!("warning: {warning}");
    }

    match run_inner(&cli, &settings, &mut log) {
        Ok(outcome) => outcome_status(outcome),
        Err(err) => report_fatal(&err, Some(&mut log), cli.quiet, cli.trace),
    }
}

fn run_inner(cli: &Cli, settings: &Settings, log: &mut RunLog) -> Result<RunOutcome, FatalError> {
    let deployment = match cli.deployment {
        Some(deployment) => deployment,
        None => Deployment::detect(&settings.deployment_file)?,
    };
    log.message(&format!("Target deployment: {}", deployment.as_str()));

    let mut history = History::load(&settings.history_file)?;
    let report = build_queue(&settings.scripts_dir, deployment, &history)?;
    for entry in &report.skipped {
        log.status(
            "skipping",
            &format!("{} ({})", entry.path.display(), entry.reason.as_str()),
        );
    }

    if cli.describe || cli.json {
        if cli.json {
            // Machine output: straight to stdout, bypassing quiet and the log.
            let rendered = serde_json::to_string_pretty(&report.steps)
                .context("failed to render steps as JSON")?;
            println!("{rendered}");
        } else {
            runner::describe_steps(&report.steps, log);
        }
        return Ok(RunOutcome::Completed);
    }

    if cli.autostop {
        if cli.dry_run {
            log.status("dry-run", "would stop managed services");
        } else {
            log.status("services", "stopping managed services");
            services::run_service_command(&settings.stop_command)
                .map_err(FatalError::ServiceStop)?;
        }
    }
    if !cli.skip_service_check {
        if cli.dry_run {
            log.status("dry-run", "would verify managed services are stopped");
        } else {
            services::run_service_command(&settings.status_command)
                .map_err(FatalError::ServicesRunning)?;
            log.status("services", "all managed services are stopped");
        }
    }

    let options = RunOptions {
        dry_run: cli.dry_run,
        assume_yes: cli.assumeyes,
    };
    runner::run_steps(&report.steps, &mut history, settings, &options, log, |step| {
        prompt::prompt_step_decision(&step.name)
    })
}

pub(crate) fn outcome_status(outcome: RunOutcome) -> ExitStatus {
    match outcome {
        RunOutcome::Completed => ExitStatus::Success,
        RunOutcome::Declined | RunOutcome::StepFailed => ExitStatus::Interrupted,
        RunOutcome::StepKilled => ExitStatus::ExternallyStopped,
    }
}

/// Prints the fixed taxonomy label (always), the human-readable chain
/// (unless quiet), and the debug representation (with --trace).
fn report_fatal(
    err: &FatalError,
    log: Option<&mut RunLog>,
    quiet: bool,
    trace: bool,
) -> ExitStatus {
    let status = err.exit_status();
    eprintln!("stepup: {} (exit {})", status.label(), status.code());
    if !quiet {
        eprintln!("error: {}", render_error_chain(err));
    }
    if trace {
        eprintln!("{err:?}");
    }
    if let Some(log) = log {
        log.record(&format!(
            "fatal: {} ({})",
            status.label(),
            render_error_chain(err)
        ));
    }
    status
}
