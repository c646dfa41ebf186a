use std::sync::Mutex;

use colored::Colorize;

/// Diagnostic channel the controllers log to. Network and server failures go
/// here; local validation errors never do.
pub trait DiagnosticSink: Send + Sync {
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
}

/// Colored stderr output, matching the `:: label : value` terminal style of
/// the CLI.
pub struct TerminalSink {
    pub verbose: bool,
}

impl DiagnosticSink for TerminalSink {
    fn warn(&self, message: &str) {
        eprintln!(
            "{}{}{} {}",
            "[".bold().white(),
            "WRN".bold().yellow(),
            "]".bold().white(),
            message
        );
    }

    fn info(&self, message: &str) {
        if self.verbose {
            eprintln!(
                "{}{}{} {}",
                "[".bold().white(),
                "INF".bold().blue(),
                "]".bold().white(),
                message
            );
        }
    }
}

/// Captures diagnostics in memory for assertions.
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().expect("diagnostics lock").clone()
    }
}

impl DiagnosticSink for MemorySink {
    fn warn(&self, message: &str) {
        self.entries
            .lock()
            .expect("diagnostics lock")
            .push(format!("warn: {message}"));
    }

    fn info(&self, message: &str) {
        self.entries
            .lock()
            .expect("diagnostics lock")
            .push(format!("info: {message}"));
    }
}
