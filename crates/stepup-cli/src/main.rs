mod completion;
mod dispatch;
mod error;
mod log;
mod prompt;
mod render;
mod runner;
mod services;

use std::path::PathBuf;
use std::process;

use clap::error::ErrorKind;
use clap::Parser;
use clap_complete::Shell;
use stepup_core::Deployment;

use crate::error::ExitStatus;

#[derive(Parser, Debug)]
#[command(name = "stepup")]
#[command(about = "Sequential upgrade step runner", long_about = None)]
pub(crate) struct Cli {
    /// Stop managed services before executing steps
    #[arg(long)]
    autostop: bool,
    /// Answer yes to every step prompt (unattended mode)
    #[arg(long, short = 'y')]
    assumeyes: bool,
    /// Plan the run without executing any step
    #[arg(long)]
    dry_run: bool,
    /// Suppress terminal output; fatal codes still print
    #[arg(long, short = 'q')]
    quiet: bool,
    /// List pending steps and exit without executing
    #[arg(long)]
    describe: bool,
    /// Print pending steps as JSON and exit
    #[arg(long)]
    json: bool,
    /// Print the full error representation on fatal errors
    #[arg(long)]
    trace: bool,
    /// Do not verify that managed services are stopped
    #[arg(long)]
    skip_service_check: bool,
    /// Do not require running as root
    #[arg(long)]
    skip_root_check: bool,
    /// Force the target deployment instead of detecting it
    #[arg(long, value_parser = parse_deployment, value_name = "DEPLOYMENT")]
    deployment: Option<Deployment>,
    /// Read settings from this file instead of the default
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Print a completion script for the given shell and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
}

fn parse_deployment(value: &str) -> Result<Deployment, String> {
    Deployment::parse(value)
        .ok_or_else(|| format!("unknown deployment '{value}': expected katello, headpin, or sam"))
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let status = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitStatus::Success,
                _ => ExitStatus::OptionParse,
            };
            let _ = err.print();
            process::exit(status.code());
        }
    };
    process::exit(dispatch::run(cli).code());
}

#[cfg(test)]
mod tests;
