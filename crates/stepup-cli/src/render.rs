use std::io::IsTerminal;

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

pub fn current_output_style(quiet: bool) -> OutputStyle {
    if !quiet && std::io::stdout().is_terminal() {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

fn status_style(status: &str) -> Style {
    let color = match status {
        "done" | "services" => AnsiColor::Green,
        "running" | "dry-run" => AnsiColor::Cyan,
        "skipped" | "skipping" | "stopped" => AnsiColor::Yellow,
        "failed" => AnsiColor::Red,
        _ => return Style::new(),
    };
    Style::new().fg_color(Some(color.into())).effects(Effects::BOLD)
}

pub fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

pub fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => format!("{status}: {message}"),
        OutputStyle::Rich => format!("{}: {message}", colorize(status_style(status), status)),
    }
}

/// A step counter for the execute loop; `None` outside rich mode so plain
/// and quiet runs stay line-oriented.
pub fn step_progress(style: OutputStyle, total: u64) -> Option<ProgressBar> {
    if style != OutputStyle::Rich {
        return None;
    }
    let bar = ProgressBar::new(total.max(1));
    if let Ok(template) =
        ProgressStyle::with_template("{msg:<24} [{bar:20.cyan/blue}] {pos:>2}/{len:2}")
    {
        bar.set_style(template.progress_chars("=>-"));
    }
    Some(bar)
}
