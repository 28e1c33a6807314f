use std::io::{self, BufRead, Write};

/// Operator's answer for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDecision {
    Run,
    Skip,
    Abort,
}

/// Asks until one of y/yes, s/skip, n/no arrives. EOF counts as "no": an
/// unattended pipe must not silently run every step.
pub fn read_step_decision(
    step_name: &str,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> io::Result<StepDecision> {
    loop {
        write!(output, "Run step '{step_name}'? [y/s/n] ")?;
        output.flush()?;
        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            writeln!(output)?;
            return Ok(StepDecision::Abort);
        }
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(StepDecision::Run),
            "s" | "skip" => return Ok(StepDecision::Skip),
            "n" | "no" => return Ok(StepDecision::Abort),
            _ => writeln!(output, "Please answer y(es), s(kip), or n(o).")?,
        }
    }
}

/// The production prompter: stdin for answers, stderr for the question so
/// prompts stay out of redirected stdout.
pub fn prompt_step_decision(step_name: &str) -> io::Result<StepDecision> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stderr().lock();
    read_step_decision(step_name, &mut input, &mut output)
}
