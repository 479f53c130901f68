//! Process-wide output, prompting, and exit-code mediation.
//!
//! All console writes and user interaction go through one injected
//! [`LifecycleManager`] so output honours the configured format and level,
//! and tests can substitute a silent or pre-answered instance at
//! construction time.

use std::io::{BufRead, Write};
use std::sync::Mutex;

use serde_json::Value;

use crate::options::{OutputLevel, OutputType};

/// Answer to a yes/no prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptReply {
    Yes,
    No,
}

/// User-interaction seam. The real prompter reads stdin; tests and
/// non-interactive runs inject a preset reply.
pub trait Prompter: Send + Sync {
    fn ask(&self, question: &str) -> PromptReply;
}

/// Reads one line from stdin; `y`/`yes` (any case) is affirmative.
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn ask(&self, question: &str) -> PromptReply {
        let mut out = std::io::stderr();
        let _ = write!(out, "{question} (y/n) ");
        let _ = out.flush();
        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line).is_err() {
            return PromptReply::No;
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => PromptReply::Yes,
            _ => PromptReply::No,
        }
    }
}

/// Always answers with a fixed reply. Used when stdin is not a terminal and
/// by tests.
pub struct PresetPrompter(pub PromptReply);

impl Prompter for PresetPrompter {
    fn ask(&self, _question: &str) -> PromptReply {
        self.0
    }
}

/// Process exit disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Success,
    Error,
    NoTransfers,
    Cancelled,
}

impl ExitKind {
    pub fn code(&self) -> i32 {
        match self {
            ExitKind::Success => 0,
            ExitKind::Error => 1,
            ExitKind::NoTransfers => 2,
            ExitKind::Cancelled => 3,
        }
    }
}

/// Mediates stdout/stderr, prompts, and the final exit disposition.
pub struct LifecycleManager {
    output: OutputType,
    level: OutputLevel,
    prompter: Box<dyn Prompter>,
    exit: Mutex<ExitKind>,
}

impl LifecycleManager {
    pub fn new(output: OutputType, level: OutputLevel, prompter: Box<dyn Prompter>) -> Self {
        Self {
            output,
            level,
            prompter,
            exit: Mutex::new(ExitKind::Success),
        }
    }

    pub fn output_type(&self) -> OutputType {
        self.output
    }

    /// Informational line; shown only at the default level.
    pub fn info(&self, message: &str) {
        if self.level == OutputLevel::Default {
            println!("{message}");
        }
    }

    /// Line the user asked for (summaries, results); hidden only when quiet.
    pub fn essential(&self, message: &str) {
        if self.level != OutputLevel::Quiet {
            println!("{message}");
        }
    }

    /// One output item, such as an enumerated object or a dry-run order.
    /// Text mode prints the preformatted line, JSON mode prints the record
    /// as NDJSON.
    pub fn item(&self, text: &str, json: &Value) {
        if self.level == OutputLevel::Quiet {
            return;
        }
        match self.output {
            OutputType::Text => println!("{text}"),
            OutputType::Json => match serde_json::to_string(json) {
                Ok(line) => println!("{line}"),
                Err(err) => tracing::warn!(error = %err, "failed to encode output record"),
            },
        }
    }

    /// Error line; always shown, on stderr.
    pub fn error_line(&self, message: &str) {
        eprintln!("{message}");
    }

    pub fn prompt(&self, question: &str) -> PromptReply {
        self.prompter.ask(question)
    }

    /// Record the exit disposition. Later, worse dispositions win over
    /// earlier, better ones; success never overwrites an error.
    pub fn signal_exit(&self, kind: ExitKind) {
        let mut current = self.exit.lock().unwrap_or_else(|e| e.into_inner());
        let keep = matches!(
            (*current, kind),
            (ExitKind::Error, _)
                | (ExitKind::Cancelled, ExitKind::Success)
                | (ExitKind::Cancelled, ExitKind::NoTransfers)
                | (ExitKind::NoTransfers, ExitKind::Success)
        );
        if !keep {
            *current = kind;
        }
    }

    pub fn exit_kind(&self) -> ExitKind {
        *self.exit.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A quiet manager that answers prompts with a preset reply. Test helper.
    pub fn silent(reply: PromptReply) -> Self {
        Self::new(
            OutputType::Text,
            OutputLevel::Quiet,
            Box::new(PresetPrompter(reply)),
        )
    }
}
