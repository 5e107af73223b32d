//! Terminal output
//!
//! Every write ignores I/O errors: a closed pipe or terminal must not stop
//! a batch half way through.

use colored::Colorize;
use declarative::{BatchReport, Identity, Operation, Outcome, Planned, StatusSink};
use std::io::{self, Stderr, Stdout, Write};

/// Print a plain line to stdout
pub fn line(msg: &str) {
    let _ = writeln!(io::stdout().lock(), "{msg}");
}

/// Print an info message
pub fn info(msg: &str) {
    line(&format!("{} {}", "ℹ".blue(), msg));
}

/// Print a warning message
pub fn warn(msg: &str) {
    line(&format!("{} {}", "⚠".yellow(), msg));
}

/// Print an error message
pub fn error(msg: &str) {
    let _ = writeln!(io::stderr().lock(), "{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    line(&format!("  {}", msg.dimmed()));
}

/// Print a header/title
pub fn header(title: &str) {
    let _ = write_header(&mut io::stdout().lock(), title);
}

fn write_header(out: &mut dyn Write, title: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", title.bold())?;
    writeln!(out, "{}", "─".repeat(title.chars().count()).dimmed())
}

/// Glyph for one outcome
pub fn outcome_glyph(outcome: &Outcome) -> colored::ColoredString {
    match outcome {
        Outcome::Created | Outcome::Updated | Outcome::Deleted => "✓".green(),
        Outcome::AlreadyPresent | Outcome::AlreadyAbsent => "=".dimmed(),
        Outcome::Skipped { .. } => "○".yellow(),
        Outcome::Failed { .. } => "✗".red(),
    }
}

/// Glyph for one planned action
pub fn planned_glyph(planned: Planned) -> colored::ColoredString {
    match planned {
        Planned::Create => "+".green(),
        Planned::Update => "~".yellow(),
        Planned::Delete => "-".red(),
        Planned::Skip => "○".yellow(),
        Planned::NoOp => "=".dimmed(),
    }
}

/// Prints engine progress; failures and the failure summary go to `err`.
pub struct ConsoleStatus<O: Write = Stdout, E: Write = Stderr> {
    quiet: bool,
    out: O,
    err: E,
}

impl ConsoleStatus {
    pub fn new(quiet: bool) -> Self {
        Self::with_writers(quiet, io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> ConsoleStatus<O, E> {
    pub fn with_writers(quiet: bool, out: O, err: E) -> Self {
        Self { quiet, out, err }
    }
}

impl<O: Write + Send, E: Write + Send> StatusSink for ConsoleStatus<O, E> {
    fn on_batch_start(&mut self, operation: Operation, count: usize) {
        if !self.quiet {
            let _ = write_header(&mut self.out, &format!("{operation}: {count} resources"));
        }
    }

    fn on_resource_complete(&mut self, identity: &Identity, outcome: &Outcome) {
        let failed = matches!(outcome, Outcome::Failed { .. });
        if self.quiet && !failed {
            return;
        }
        let line = format!("  {} {}", outcome_glyph(outcome), outcome.status_line(identity));
        let _ = if failed {
            writeln!(self.err, "{line}")
        } else {
            writeln!(self.out, "{line}")
        };
    }

    fn on_batch_complete(&mut self, report: &BatchReport) {
        let summary = report.summary();
        if report.is_success() {
            if !self.quiet {
                let _ = writeln!(self.out, "\n  {} {summary}", "✓".green().bold());
            }
        } else {
            let _ = writeln!(
                self.err,
                "\n  {} {} of {} resources failed ({summary})",
                "✗".red().bold(),
                summary.failed,
                report.total()
            );
        }
    }
}
