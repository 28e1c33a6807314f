use std::process::Command;

use anyhow::{anyhow, bail, Context, Result};

/// Runs a configured service-control command as an opaque pass/fail step.
pub fn run_service_command(argv: &[String]) -> Result<()> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow!("service command is empty"))?;
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed launching '{}'", argv.join(" ")))?;
    if !output.status.success() {
        bail!(
            "'{}' failed: {}",
            argv.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}
