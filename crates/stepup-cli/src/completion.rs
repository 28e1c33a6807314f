use clap::CommandFactory;
use clap_complete::Shell;

use crate::Cli;

/// Prints a completion script for `shell` on stdout.
pub fn print_completions(shell: Shell) {
    let mut command = Cli::command();
    clap_complete::generate(shell, &mut command, "stepup", &mut std::io::stdout());
}
